mod engine;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::value::{Value, ValueType};
use rusqlite::types::Value as SqlValue;

pub(crate) use engine::CompiledStatement;

/// Identifies a statement in its database's registry. Only valid for the
/// connection generation it was built under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StatementId {
    pub(crate) slot: u64,
    pub(crate) generation: u64,
}

/// Outcome of a successful [`Statement::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A row is available through [`Statement::fetch_column`].
    Row,
    /// Execution finished; there are no more rows.
    Done,
}

/// Registry entry for one statement: the compiled statement, its current
/// bindings, and where execution stands.
pub(crate) struct StatementSlot {
    /// `None` when the text compiled to nothing (blank or only comments).
    compiled: Option<CompiledStatement>,
    columns: Vec<String>,
    bindings: Vec<Value>,
    cursor: Cursor,
}

enum Cursor {
    Ready,
    Row,
    Done,
    Failed(String),
}

impl StatementSlot {
    pub(crate) fn new(compiled: Option<CompiledStatement>) -> Self {
        let (columns, parameter_count) = compiled
            .as_ref()
            .map(|c| (c.column_names(), c.parameter_count()))
            .unwrap_or_default();
        StatementSlot {
            compiled,
            columns,
            bindings: vec![Value::Null; parameter_count],
            cursor: Cursor::Ready,
        }
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<()> {
        let count = self.bindings.len();
        let slot = self
            .bindings
            .get_mut(index)
            .ok_or(StoreError::ParameterIndex { index, count })?;
        *slot = value;
        Ok(())
    }

    /// Ask the engine for the next row. Bindings are applied when a run
    /// starts.
    fn step(&mut self) -> Result<Step> {
        let Some(compiled) = &self.compiled else {
            return Ok(Step::Done);
        };
        let outcome = match &self.cursor {
            Cursor::Done => return Ok(Step::Done),
            Cursor::Failed(msg) => return Err(StoreError::Execution(msg.clone())),
            Cursor::Ready => compiled
                .bind_all(&self.bindings)
                .and_then(|()| compiled.step()),
            Cursor::Row => compiled.step(),
        };

        match outcome {
            Ok(true) => {
                self.cursor = Cursor::Row;
                Ok(Step::Row)
            }
            Ok(false) => {
                self.cursor = Cursor::Done;
                Ok(Step::Done)
            }
            Err(msg) => {
                self.cursor = Cursor::Failed(msg.clone());
                Err(StoreError::Execution(msg))
            }
        }
    }

    fn reset(&mut self) {
        if let Some(compiled) = &self.compiled {
            compiled.reset();
        }
        self.cursor = Cursor::Ready;
    }

    fn current_column(&self, index: usize) -> Result<SqlValue> {
        let (Some(compiled), Cursor::Row) = (&self.compiled, &self.cursor) else {
            return Err(StoreError::NoRow);
        };
        let count = self.columns.len();
        if index >= count {
            return Err(StoreError::ColumnIndex { index, count });
        }
        Ok(compiled.column_value(index))
    }
}

/// A compiled query bound to one [`Database`].
///
/// Lifecycle: bind parameters, step until [`Step::Done`], optionally
/// [`reset`](Statement::reset) and go again. Each step asks the engine for
/// exactly one row. Dropping the statement finalizes it. Once the database
/// is reopened, closed, or has a snapshot installed, every operation returns
/// [`StoreError::StatementInvalidated`].
pub struct Statement<'db> {
    db: &'db Database,
    id: StatementId,
}

impl<'db> Statement<'db> {
    pub(crate) fn new(db: &'db Database, id: StatementId) -> Self {
        Statement { db, id }
    }

    /// Names of the result columns, empty for statements that return no rows.
    pub fn column_names(&self) -> Result<Vec<String>> {
        self.db
            .with_statement(self.id, |slot| Ok(slot.columns.clone()))
    }

    /// Bind one positional parameter. `index` is 0-based; rebinding replaces
    /// the previous value.
    pub fn bind_parameter(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.db
            .with_statement(self.id, |slot| slot.bind(index, value))
    }

    /// Bind parameters 0..N-1 in order.
    pub fn bind_parameters(&mut self, values: &[Value]) -> Result<()> {
        self.db.with_statement(self.id, |slot| {
            for (index, value) in values.iter().enumerate() {
                slot.bind(index, value.clone())?;
            }
            Ok(())
        })
    }

    /// Advance execution by one row.
    ///
    /// Rows produced before a failure are delivered first. The failure then
    /// surfaces as [`StoreError::Execution`] carrying the engine's message,
    /// and the statement keeps reporting it until reset. Stepping after
    /// [`Step::Done`] keeps returning `Done` until reset. Text that compiled
    /// to no statement at all is `Done` straight away.
    pub fn step(&mut self) -> Result<Step> {
        self.db.with_statement(self.id, StatementSlot::step)
    }

    /// Read column `index` of the row the last step produced. A NULL column
    /// is [`Value::Null`] whatever `expected` says.
    pub fn fetch_column(&self, index: usize, expected: ValueType) -> Result<Value> {
        self.db.with_statement(self.id, |slot| {
            let stored = slot.current_column(index)?;
            Ok(Value::from_engine(&stored, expected))
        })
    }

    /// Read column `index` of the current row as whatever the engine stored:
    /// integer, real, or text (blobs read as lossy UTF-8 text).
    pub fn fetch_stored_column(&self, index: usize) -> Result<Value> {
        self.db.with_statement(self.id, |slot| {
            let stored = slot.current_column(index)?;
            Ok(Value::from_stored((&stored).into(), None))
        })
    }

    /// Make the statement ready to step again without compiling it again.
    /// Bindings are kept; rebind whatever should change.
    pub fn reset(&mut self) -> Result<()> {
        self.db.with_statement(self.id, |slot| {
            slot.reset();
            Ok(())
        })
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        self.db.release_statement(self.id);
    }
}
