use crate::error::Result;
use crate::schema::{ColumnDefinition, TableDefinitions};
use rusqlite::{params, Connection};

/// In-memory mirror of the store's schema, tagged with the engine's
/// `schema_version` at the time it was read.
#[derive(Debug, Clone)]
pub(crate) struct MetadataCache {
    pub(crate) schema_version: i64,
    pub(crate) tables: TableDefinitions,
}

/// The engine bumps this counter on every schema change.
pub(crate) fn schema_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row("PRAGMA schema_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Read every user table and its columns from the system catalog.
///
/// Columns come back in declaration order. The column query goes through the
/// `pragma_table_info` table-valued function so the table name is bound as a
/// parameter rather than spliced into the statement text.
pub(crate) fn read_metadata(conn: &Connection) -> Result<TableDefinitions> {
    let mut tables_stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND substr(name, 1, 7) != 'sqlite_'
         ORDER BY name",
    )?;
    let names = tables_stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut columns_stmt =
        conn.prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let mut tables = TableDefinitions::new();
    for name in names {
        let columns = columns_stmt
            .query_map(params![name], |row| {
                Ok(ColumnDefinition {
                    name: row.get(0)?,
                    column_type: row.get(1)?,
                    is_key: row.get::<_, i64>(2)? > 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        tables.insert(name, columns);
    }
    Ok(tables)
}
