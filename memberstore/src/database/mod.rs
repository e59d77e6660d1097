use crate::config::StoreOptions;
use crate::error::{engine_message, Result, StoreError};
use crate::metadata::{self, MetadataCache};
use crate::schema::{TableDefinition, TableDefinitions};
use crate::statement::{CompiledStatement, Statement, StatementId, StatementSlot};
use log::{debug, warn};
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One cluster member's private store.
///
/// Exactly one connection is open at a time. Statements built from the
/// database borrow it and are tracked in a registry keyed by the connection
/// generation, so reopening the store or installing a snapshot invalidates
/// every outstanding statement instead of leaving it dangling.
///
/// The database is meant for a single owner on a single thread; it is not
/// `Sync` and does no locking of its own.
pub struct Database {
    options: StoreOptions,
    state: RefCell<State>,
}

pub(crate) struct State {
    path: Option<PathBuf>,
    // Declared before `conn`: compiled statements must be finalized before
    // their connection closes.
    statements: HashMap<u64, StatementSlot>,
    conn: Option<Connection>,
    generation: u64,
    next_statement: u64,
    pub(crate) metadata: Option<MetadataCache>,
}

impl State {
    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(StoreError::NotOpen)
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(StoreError::NotOpen)
    }

    /// Finalize every statement registered against the connection, then
    /// close it.
    pub(crate) fn disconnect(&mut self) {
        self.statements.clear();
        self.metadata = None;
        self.generation += 1;
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                warn!("Closing database connection failed: {e}");
            }
        }
    }

    /// Current table definitions, reloaded when the cache was invalidated or
    /// the engine's schema version moved since it was filled.
    pub(crate) fn tables(&mut self) -> Result<TableDefinitions> {
        let conn = self.connection()?;
        let version = metadata::schema_version(conn)?;
        if let Some(cache) = &self.metadata {
            if cache.schema_version == version {
                return Ok(cache.tables.clone());
            }
        }
        let tables = metadata::read_metadata(conn)?;
        self.metadata = Some(MetadataCache {
            schema_version: version,
            tables: tables.clone(),
        });
        Ok(tables)
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::new(StoreOptions::default())
    }
}

impl Database {
    /// Create a database handle with no store open yet.
    pub fn new(options: StoreOptions) -> Self {
        Database {
            options,
            state: RefCell::new(State {
                path: None,
                statements: HashMap::new(),
                conn: None,
                generation: 0,
                next_statement: 0,
                metadata: None,
            }),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Open or create the store at `path`, replacing any connection that was
    /// already open. Statements built before the call are invalidated.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.borrow_mut();
        state.disconnect();
        state.path = Some(path.clone());

        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        self.configure(&conn)?;
        let cache = MetadataCache {
            schema_version: metadata::schema_version(&conn)?,
            tables: metadata::read_metadata(&conn)?,
        };
        debug!("Opened store at {}", path.display());
        state.conn = Some(conn);
        state.metadata = Some(cache);
        Ok(())
    }

    fn configure(&self, conn: &Connection) -> Result<()> {
        conn.set_prepared_statement_cache_capacity(self.options.statement_cache_capacity);
        conn.busy_timeout(Duration::from_millis(self.options.busy_timeout_ms))?;
        conn.pragma_update(None, "foreign_keys", self.options.foreign_keys)?;
        Ok(())
    }

    /// Close the store. Outstanding statements are invalidated.
    pub fn close(&self) {
        let mut state = self.state.borrow_mut();
        if state.conn.is_some() {
            debug!("Closing store");
        }
        state.disconnect();
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().conn.is_some()
    }

    /// Path of the store last passed to [`Database::open`], open or not.
    pub fn path(&self) -> Option<PathBuf> {
        self.state.borrow().path.clone()
    }

    /// Compile `sql` into a reusable statement.
    ///
    /// Statement text the engine rejects, including references to missing
    /// tables or columns, yields [`StoreError::Compile`] with the engine's
    /// message. So does text holding more than one statement. Text holding
    /// none (blank, or only comments) builds a statement that is done as
    /// soon as it is stepped.
    pub fn build_statement(&self, sql: &str) -> Result<Statement<'_>> {
        let mut state = self.state.borrow_mut();
        let compiled = CompiledStatement::prepare(state.connection()?, sql)?;

        let slot = state.next_statement;
        state.next_statement += 1;
        state.statements.insert(slot, StatementSlot::new(compiled));
        let id = StatementId {
            slot,
            generation: state.generation,
        };
        debug!("Built statement {slot}: {sql}");
        Ok(Statement::new(self, id))
    }

    /// Run `sql` to completion, discarding any rows it produces.
    pub fn execute_statement(&self, sql: &str) -> Result<()> {
        let state = self.state.borrow();
        state
            .connection()?
            .execute_batch(sql)
            .map_err(|e| StoreError::Execution(engine_message(&e)))
    }

    /// Every table in the store with its columns in declaration order.
    pub fn describe_tables(&self) -> Result<TableDefinitions> {
        self.state.borrow_mut().tables()
    }

    /// Columns of one table, or `None` when the store has no such table.
    pub fn describe_table(&self, name: &str) -> Result<Option<TableDefinition>> {
        Ok(self.describe_tables()?.remove(name))
    }

    /// Discard the cached schema and read it again from the engine.
    pub fn refresh_metadata(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.metadata = None;
        state.tables()?;
        Ok(())
    }

    pub(crate) fn state(&self) -> std::cell::RefMut<'_, State> {
        self.state.borrow_mut()
    }

    /// Run `f` against a live statement slot.
    pub(crate) fn with_statement<T>(
        &self,
        id: StatementId,
        f: impl FnOnce(&mut StatementSlot) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.borrow_mut();
        if id.generation != state.generation || state.conn.is_none() {
            return Err(StoreError::StatementInvalidated);
        }
        let slot = state
            .statements
            .get_mut(&id.slot)
            .ok_or(StoreError::StatementInvalidated)?;
        f(slot)
    }

    pub(crate) fn release_statement(&self, id: StatementId) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            if state.generation == id.generation {
                state.statements.remove(&id.slot);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn live_statements(&self) -> usize {
        self.state.borrow().statements.len()
    }
}
