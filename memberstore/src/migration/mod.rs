//! Schema migration primitives.
//!
//! SQLite has no general "drop column" for key or constrained columns, so
//! [`Database::destroy_column`] rebuilds the table: copy the surviving
//! columns out to a temporary table, drop and recreate the original, and copy
//! the rows back, all inside one transaction.

use crate::database::Database;
use crate::error::{engine_message, Result, StoreError};
use crate::schema::{check_type_name, quote_identifier, ColumnDefinition, TableDefinition};
use log::{debug, info, warn};

impl Database {
    /// Create `name` with the columns of `definition` in order.
    pub fn create_table(&self, name: &str, definition: &TableDefinition) -> Result<()> {
        let sql = create_table_sql(name, definition)?;
        self.migrate(&sql)?;
        info!("Created table '{name}'");
        Ok(())
    }

    pub fn rename_table(&self, old_name: &str, new_name: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_identifier(old_name)?,
            quote_identifier(new_name)?
        );
        self.migrate(&sql)?;
        info!("Renamed table '{old_name}' to '{new_name}'");
        Ok(())
    }

    /// Append a column. The engine may refuse a key column on a table that
    /// already has rows; that refusal is returned as-is.
    pub fn add_column(&self, table: &str, column: &ColumnDefinition) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(table)?,
            column_sql(column, column.is_key)?
        );
        self.migrate(&sql)?;
        info!("Added column '{}.{}'", table, column.name);
        Ok(())
    }

    /// Remove one column from a table, keeping every row and the data of
    /// every other column.
    ///
    /// Unknown tables and unknown columns are left alone. Removing the last
    /// column of a table is refused since a table needs at least one.
    pub fn destroy_column(&self, table: &str, column: &str) -> Result<()> {
        let Some(definition) = self.describe_table(table)? else {
            debug!("destroy_column: no table '{table}', nothing to do");
            return Ok(());
        };
        if !definition.iter().any(|c| c.name == column) {
            debug!("destroy_column: table '{table}' has no column '{column}', nothing to do");
            return Ok(());
        }
        let kept: TableDefinition = definition
            .into_iter()
            .filter(|c| c.name != column)
            .collect();
        if kept.is_empty() {
            return Err(StoreError::Migration(format!(
                "cannot destroy '{table}.{column}', it is the only column"
            )));
        }

        let plan = rebuild_statements(table, &kept)?;

        let mut state = self.state();
        {
            let conn = state.connection_mut()?;
            let tx = conn.transaction()?;
            for sql in &plan {
                if let Err(e) = tx.execute_batch(sql) {
                    warn!("Rebuild of '{table}' failed at `{sql}`, rolling back: {e}");
                    return Err(StoreError::Execution(engine_message(&e)));
                }
            }
            tx.commit()?;
        }
        state.metadata = None;
        info!("Destroyed column '{table}.{column}'");
        Ok(())
    }

    pub fn destroy_table(&self, name: &str) -> Result<()> {
        let sql = format!("DROP TABLE {}", quote_identifier(name)?);
        self.migrate(&sql)?;
        info!("Destroyed table '{name}'");
        Ok(())
    }

    /// Run one schema-changing statement and invalidate the metadata cache.
    fn migrate(&self, sql: &str) -> Result<()> {
        let mut state = self.state();
        let result = state
            .connection()?
            .execute_batch(sql)
            .map_err(|e| StoreError::Execution(engine_message(&e)));
        state.metadata = None;
        result
    }
}

/// Render one column definition. `inline_key` adds `PRIMARY KEY` to it.
fn column_sql(column: &ColumnDefinition, inline_key: bool) -> Result<String> {
    let mut sql = quote_identifier(&column.name)?;
    let column_type = check_type_name(&column.column_type)?;
    if !column_type.is_empty() {
        sql.push(' ');
        sql.push_str(column_type);
    }
    if inline_key {
        sql.push_str(" PRIMARY KEY");
    }
    Ok(sql)
}

/// `CREATE TABLE` text for `definition`. A single key column is annotated
/// inline; several keys become a table-level `PRIMARY KEY (...)`.
pub(crate) fn create_table_sql(name: &str, definition: &TableDefinition) -> Result<String> {
    let keys: Vec<&ColumnDefinition> = definition.iter().filter(|c| c.is_key).collect();
    let single_key = keys.len() == 1;

    let mut parts = definition
        .iter()
        .map(|c| column_sql(c, single_key && c.is_key))
        .collect::<Result<Vec<_>>>()?;
    if keys.len() > 1 {
        let names = keys
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Result<Vec<_>>>()?;
        parts.push(format!("PRIMARY KEY ({})", names.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_identifier(name)?,
        parts.join(", ")
    ))
}

/// The statements of a column-removal rebuild, in order. The caller runs
/// them inside one transaction.
pub(crate) fn rebuild_statements(table: &str, kept: &TableDefinition) -> Result<Vec<String>> {
    let original = quote_identifier(table)?;
    let temporary = quote_identifier(&format!("{table}__rebuild"))?;
    let columns = kept
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(vec![
        format!("CREATE TEMPORARY TABLE {temporary} ({columns})"),
        format!("INSERT INTO {temporary} ({columns}) SELECT {columns} FROM {original}"),
        format!("DROP TABLE {original}"),
        create_table_sql(table, kept)?,
        format!("INSERT INTO {original} ({columns}) SELECT {columns} FROM {temporary}"),
        format!("DROP TABLE {temporary}"),
    ])
}
