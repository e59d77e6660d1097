// A compiled engine statement owned outright, so its cursor can stay open
// between steps. rusqlite ties a prepared statement to a borrow of the
// connection, which cannot be kept in the registry next to the connection it
// borrows; this handle is the raw `sqlite3_stmt` instead. The registry
// finalizes every handle before its connection is closed.

use crate::error::{Result, StoreError};
use crate::value::Value;
use rusqlite::ffi;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::ffi::{c_char, c_int, CStr};
use std::ptr::{self, NonNull};

/// Result of an engine call that failed with the engine's message.
pub(crate) type EngineResult<T> = std::result::Result<T, String>;

pub(crate) struct CompiledStatement {
    stmt: NonNull<ffi::sqlite3_stmt>,
}

// SAFETY: a compiled statement is only reached through the `Database` that
// owns it together with its connection, so it never moves to another thread
// without that connection.
unsafe impl Send for CompiledStatement {}

impl CompiledStatement {
    /// Compile `sql`. `Ok(None)` when the text holds no statement at all,
    /// e.g. blank text or only comments. Text with more than one statement is
    /// rejected.
    pub(crate) fn prepare(conn: &Connection, sql: &str) -> Result<Option<Self>> {
        let (first, consumed) = prepare_one(conn, sql)?;
        let rest = sql.get(consumed..).unwrap_or_default();
        if !rest.trim().is_empty() && prepare_one(conn, rest)?.0.is_some() {
            return Err(StoreError::Compile(
                "Multiple statements provided".to_string(),
            ));
        }
        Ok(first)
    }

    pub(crate) fn parameter_count(&self) -> usize {
        // SAFETY: `stmt` stays valid until `drop`.
        let count = unsafe { ffi::sqlite3_bind_parameter_count(self.stmt.as_ptr()) };
        usize::try_from(count).unwrap_or_default()
    }

    pub(crate) fn column_names(&self) -> Vec<String> {
        let stmt = self.stmt.as_ptr();
        // SAFETY: `stmt` stays valid until `drop`; each name is copied before
        // the next engine call.
        unsafe {
            (0..ffi::sqlite3_column_count(stmt))
                .map(|i| owned_string(ffi::sqlite3_column_name(stmt, i)))
                .collect()
        }
    }

    /// Bind `values` to parameters 1..=N. Only valid while the statement is
    /// reset.
    pub(crate) fn bind_all(&self, values: &[Value]) -> EngineResult<()> {
        for (i, value) in values.iter().enumerate() {
            let rc = match c_int::try_from(i + 1) {
                Ok(index) => self.bind(index, value),
                Err(_) => ffi::SQLITE_RANGE,
            };
            if rc != ffi::SQLITE_OK {
                return Err(error_string(rc));
            }
        }
        Ok(())
    }

    fn bind(&self, index: c_int, value: &Value) -> c_int {
        let stmt = self.stmt.as_ptr();
        // SAFETY: `stmt` stays valid until `drop`. Text is copied by the
        // engine (`SQLITE_TRANSIENT`) so `value` may go away afterwards.
        unsafe {
            match value {
                Value::Null => ffi::sqlite3_bind_null(stmt, index),
                Value::Integer(n) => ffi::sqlite3_bind_int64(stmt, index, *n),
                Value::Boolean(b) => ffi::sqlite3_bind_int64(stmt, index, i64::from(*b)),
                Value::Real(f) => ffi::sqlite3_bind_double(stmt, index, *f),
                Value::Text(s) => match c_int::try_from(s.len()) {
                    Ok(len) => ffi::sqlite3_bind_text(
                        stmt,
                        index,
                        s.as_ptr().cast::<c_char>(),
                        len,
                        ffi::SQLITE_TRANSIENT(),
                    ),
                    Err(_) => ffi::SQLITE_TOOBIG,
                },
            }
        }
    }

    /// Advance by one row. `Ok(true)` when a row is available.
    pub(crate) fn step(&self) -> EngineResult<bool> {
        // SAFETY: `stmt` stays valid until `drop`.
        match unsafe { ffi::sqlite3_step(self.stmt.as_ptr()) } {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            _ => Err(self.last_error()),
        }
    }

    /// Value of column `index` in the current row, as the engine stored it.
    /// The caller checks that a row is available and `index` is in range.
    pub(crate) fn column_value(&self, index: usize) -> SqlValue {
        let Ok(i) = c_int::try_from(index) else {
            return SqlValue::Null;
        };
        let stmt = self.stmt.as_ptr();
        // SAFETY: `stmt` is positioned on a row. Text and blob pointers are
        // read together with their length and copied right away.
        unsafe {
            match ffi::sqlite3_column_type(stmt, i) {
                ffi::SQLITE_INTEGER => SqlValue::Integer(ffi::sqlite3_column_int64(stmt, i)),
                ffi::SQLITE_FLOAT => SqlValue::Real(ffi::sqlite3_column_double(stmt, i)),
                ffi::SQLITE_TEXT => {
                    let text = ffi::sqlite3_column_text(stmt, i).cast::<u8>();
                    let bytes = column_bytes(text, ffi::sqlite3_column_bytes(stmt, i));
                    SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
                }
                ffi::SQLITE_BLOB => {
                    let blob = ffi::sqlite3_column_blob(stmt, i).cast::<u8>();
                    SqlValue::Blob(column_bytes(blob, ffi::sqlite3_column_bytes(stmt, i)).to_vec())
                }
                _ => SqlValue::Null,
            }
        }
    }

    /// Rewind so the next step runs the statement from the start. Bindings
    /// are left in place.
    pub(crate) fn reset(&self) {
        // SAFETY: `stmt` stays valid until `drop`. The return code repeats
        // the last step's error, which was already reported.
        unsafe {
            ffi::sqlite3_reset(self.stmt.as_ptr());
        }
    }

    fn last_error(&self) -> String {
        // SAFETY: a live statement always belongs to a live connection.
        unsafe { owned_string(ffi::sqlite3_errmsg(ffi::sqlite3_db_handle(self.stmt.as_ptr()))) }
    }
}

impl Drop for CompiledStatement {
    fn drop(&mut self) {
        // SAFETY: the registry drops every handle before closing the
        // connection, and nothing uses `stmt` after this.
        unsafe {
            ffi::sqlite3_finalize(self.stmt.as_ptr());
        }
    }
}

/// Compile the first statement of `sql`. Also returns how many bytes of
/// `sql` it consumed.
fn prepare_one(conn: &Connection, sql: &str) -> Result<(Option<CompiledStatement>, usize)> {
    let len = c_int::try_from(sql.len())
        .map_err(|_| StoreError::Compile(error_string(ffi::SQLITE_TOOBIG)))?;
    let mut stmt = ptr::null_mut();
    let mut tail: *const c_char = ptr::null();
    // SAFETY: the connection handle is live for the duration of `conn`, and
    // `sql` is passed with its length so nothing past its end is read. A
    // failed prepare leaves `stmt` null.
    unsafe {
        let db = conn.handle();
        let rc = ffi::sqlite3_prepare_v2(db, sql.as_ptr().cast(), len, &mut stmt, &mut tail);
        if rc != ffi::SQLITE_OK {
            return Err(StoreError::Compile(owned_string(ffi::sqlite3_errmsg(db))));
        }
    }

    let consumed = if tail.is_null() {
        sql.len()
    } else {
        (tail as usize).saturating_sub(sql.as_ptr() as usize).min(sql.len())
    };
    Ok((NonNull::new(stmt).map(|stmt| CompiledStatement { stmt }), consumed))
}

/// # Safety
/// `text` is null or points at a NUL-terminated string.
unsafe fn owned_string(text: *const c_char) -> String {
    if text.is_null() {
        String::new()
    } else {
        CStr::from_ptr(text).to_string_lossy().into_owned()
    }
}

/// # Safety
/// `data` is null or points at `len` readable bytes that outlive the result.
unsafe fn column_bytes<'a>(data: *const u8, len: c_int) -> &'a [u8] {
    match usize::try_from(len) {
        Ok(len) if len > 0 && !data.is_null() => std::slice::from_raw_parts(data, len),
        _ => &[],
    }
}

fn error_string(rc: c_int) -> String {
    // SAFETY: sqlite3_errstr returns a static string for any code.
    unsafe { owned_string(ffi::sqlite3_errstr(rc)) }
}
