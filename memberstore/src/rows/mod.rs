//! Row-level create/retrieve/update/destroy over a single table.
//!
//! Rows are chosen with a [`RowSelector`]: a conjunction of equality tests,
//! where a `Null` value matches NULL. Values are always bound as
//! parameters; only validated identifiers appear in the generated text.

use crate::database::Database;
use crate::error::{engine_message, Result, StoreError};
use crate::schema::{quote_identifier, TableDefinition};
use crate::value::{Value, ValueType};
use rusqlite::params_from_iter;
use serde::Serialize;

/// A column name paired with the value to write or match.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub value: Value,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        ColumnDescriptor {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Which rows an operation applies to. The default selects every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSelector {
    conditions: Vec<ColumnDescriptor>,
}

impl RowSelector {
    pub fn all() -> Self {
        RowSelector::default()
    }

    /// Also require `column` to equal `value`.
    pub fn column_equals(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(ColumnDescriptor::new(column, value));
        self
    }

    /// ` WHERE ...` (or nothing) plus the values to bind for it.
    fn where_clause(&self) -> Result<(String, Vec<&Value>)> {
        if self.conditions.is_empty() {
            return Ok((String::new(), Vec::new()));
        }
        let tests = self
            .conditions
            .iter()
            .map(|c| Ok(format!("{} IS ?", quote_identifier(&c.name)?)))
            .collect::<Result<Vec<_>>>()?;
        let values = self.conditions.iter().map(|c| &c.value).collect();
        Ok((format!(" WHERE {}", tests.join(" AND ")), values))
    }
}

/// Which columns a retrieval returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ColumnSelector {
    /// Every column in declaration order.
    #[default]
    All,
    Columns(Vec<String>),
}

/// Result of [`Database::retrieve_rows`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at `row` in the column named `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }
}

/// Map a declared column type to the value type its contents read back as,
/// following the engine's affinity rules. BOOLEAN-like declarations read as
/// booleans.
fn declared_value_type(declared: &str) -> Option<ValueType> {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("BOOL") {
        Some(ValueType::Boolean)
    } else if upper.contains("INT") {
        Some(ValueType::Integer)
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        Some(ValueType::Text)
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        Some(ValueType::Real)
    } else {
        None
    }
}

fn compile_error(e: rusqlite::Error) -> StoreError {
    StoreError::Compile(engine_message(&e))
}

fn execution_error(e: rusqlite::Error) -> StoreError {
    StoreError::Execution(engine_message(&e))
}

impl Database {
    /// Insert one row. Columns not named take their defaults.
    pub fn create_row(&self, table: &str, columns: &[ColumnDescriptor]) -> Result<()> {
        let table_sql = quote_identifier(table)?;
        let sql = if columns.is_empty() {
            format!("INSERT INTO {table_sql} DEFAULT VALUES")
        } else {
            let names = columns
                .iter()
                .map(|c| quote_identifier(&c.name))
                .collect::<Result<Vec<_>>>()?;
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {table_sql} ({}) VALUES ({placeholders})",
                names.join(", ")
            )
        };

        let state = self.state();
        let mut stmt = state.connection()?.prepare_cached(&sql).map_err(compile_error)?;
        stmt.execute(params_from_iter(columns.iter().map(|c| &c.value)))
            .map_err(execution_error)?;
        Ok(())
    }

    /// Read the selected columns of every row matching `rows`.
    ///
    /// Values are typed from each column's declared type when the column is
    /// known, otherwise from how the engine stored them.
    pub fn retrieve_rows(
        &self,
        table: &str,
        rows: &RowSelector,
        columns: &ColumnSelector,
    ) -> Result<DataSet> {
        let definition: TableDefinition = self.describe_table(table)?.unwrap_or_default();
        let select_list = match columns {
            ColumnSelector::All => "*".to_string(),
            ColumnSelector::Columns(names) => names
                .iter()
                .map(|n| quote_identifier(n))
                .collect::<Result<Vec<_>>>()?
                .join(", "),
        };
        let (where_sql, where_values) = rows.where_clause()?;
        let sql = format!(
            "SELECT {select_list} FROM {}{where_sql}",
            quote_identifier(table)?
        );

        let state = self.state();
        let mut stmt = state.connection()?.prepare_cached(&sql).map_err(compile_error)?;
        let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let hints: Vec<Option<ValueType>> = column_names
            .iter()
            .map(|name| {
                definition
                    .iter()
                    .find(|c| &c.name == name)
                    .and_then(|c| declared_value_type(&c.column_type))
            })
            .collect();

        let mut data = DataSet {
            columns: column_names,
            rows: Vec::new(),
        };
        let mut result = stmt
            .query(params_from_iter(where_values))
            .map_err(execution_error)?;
        while let Some(row) = result.next().map_err(execution_error)? {
            let mut values = Vec::with_capacity(hints.len());
            for (i, hint) in hints.iter().enumerate() {
                values.push(Value::from_stored(row.get_ref(i)?, *hint));
            }
            data.rows.push(values);
        }
        Ok(data)
    }

    /// Set `columns` on every row matching `rows`. Returns how many rows changed.
    pub fn update_rows(
        &self,
        table: &str,
        rows: &RowSelector,
        columns: &[ColumnDescriptor],
    ) -> Result<usize> {
        if columns.is_empty() {
            return Ok(0);
        }
        let assignments = columns
            .iter()
            .map(|c| Ok(format!("{} = ?", quote_identifier(&c.name)?)))
            .collect::<Result<Vec<_>>>()?;
        let (where_sql, where_values) = rows.where_clause()?;
        let sql = format!(
            "UPDATE {} SET {}{where_sql}",
            quote_identifier(table)?,
            assignments.join(", ")
        );

        let values = columns.iter().map(|c| &c.value).chain(where_values);
        let state = self.state();
        let mut stmt = state.connection()?.prepare_cached(&sql).map_err(compile_error)?;
        stmt.execute(params_from_iter(values)).map_err(execution_error)
    }

    /// Delete every row matching `rows`. Returns how many rows were deleted.
    pub fn destroy_rows(&self, table: &str, rows: &RowSelector) -> Result<usize> {
        let (where_sql, where_values) = rows.where_clause()?;
        let sql = format!("DELETE FROM {}{where_sql}", quote_identifier(table)?);

        let state = self.state();
        let mut stmt = state.connection()?.prepare_cached(&sql).map_err(compile_error)?;
        stmt.execute(params_from_iter(where_values))
            .map_err(execution_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retrieve_all_rows_typed_by_declaration() {
        let fx = Fixture::new();

        let data = fx
            .db
            .retrieve_rows("quests", &RowSelector::all(), &ColumnSelector::All)
            .unwrap();

        assert_eq!(data.columns, vec!["npc", "quest", "completed"]);
        assert_eq!(
            data.rows,
            vec![
                vec![Value::Integer(1), Value::Integer(42), Value::Boolean(false)],
                vec![Value::Integer(1), Value::Integer(43), Value::Null],
                vec![Value::Integer(2), Value::Integer(43), Value::Boolean(true)],
            ]
        );
    }

    #[test]
    fn test_retrieve_selected_columns() {
        let fx = Fixture::new();

        let data = fx
            .db
            .retrieve_rows(
                "npcs",
                &RowSelector::all().column_equals("entity", 1),
                &ColumnSelector::Columns(vec!["time".into(), "name".into()]),
            )
            .unwrap();

        assert_eq!(data.len(), 1);
        assert_eq!(data.get(0, "name"), Some(&Value::from("Alex")));
        assert_eq!(data.get(0, "time"), Some(&Value::Real(4.321)));
        assert_eq!(data.get(0, "job"), None);
    }

    #[test]
    fn test_selector_conditions_combine_and_match_null() {
        let fx = Fixture::new();

        let data = fx
            .db
            .retrieve_rows(
                "quests",
                &RowSelector::all()
                    .column_equals("npc", 1)
                    .column_equals("completed", Value::Null),
                &ColumnSelector::Columns(vec!["quest".into()]),
            )
            .unwrap();

        assert_eq!(data.rows, vec![vec![Value::Integer(43)]]);
    }

    #[test]
    fn test_create_row() {
        let fx = Fixture::new();
        let comparison = fx.reconstruct_with(&["INSERT INTO kv (key, value) VALUES ('hello', 'world')"]);

        fx.db
            .create_row(
                "kv",
                &[
                    ColumnDescriptor::new("key", "hello"),
                    ColumnDescriptor::new("value", "world"),
                ],
            )
            .unwrap();

        fx.verify_serialization(&comparison);
    }

    #[test]
    fn test_create_row_constraint_violation() {
        let fx = Fixture::new();

        let err = fx
            .db
            .create_row("kv", &[ColumnDescriptor::new("key", "foo")])
            .unwrap_err();

        assert!(matches!(err, StoreError::Execution(_)));
        fx.verify_no_changes();
    }

    #[test]
    fn test_update_rows() {
        let fx = Fixture::new();

        let changed = fx
            .db
            .update_rows(
                "quests",
                &RowSelector::all().column_equals("npc", 1),
                &[ColumnDescriptor::new("completed", true)],
            )
            .unwrap();

        assert_eq!(changed, 2);
        let data = fx
            .db
            .retrieve_rows(
                "quests",
                &RowSelector::all().column_equals("completed", true),
                &ColumnSelector::All,
            )
            .unwrap();
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_update_without_columns_is_a_noop() {
        let fx = Fixture::new();
        assert_eq!(fx.db.update_rows("kv", &RowSelector::all(), &[]).unwrap(), 0);
        fx.verify_no_changes();
    }

    #[test]
    fn test_destroy_rows() {
        let fx = Fixture::new();

        let deleted = fx
            .db
            .destroy_rows("quests", &RowSelector::all().column_equals("quest", 43))
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(
            fx.db
                .retrieve_rows("quests", &RowSelector::all(), &ColumnSelector::All)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_unknown_table_or_column() {
        let fx = Fixture::new();

        assert!(matches!(
            fx.db.retrieve_rows("guilds", &RowSelector::all(), &ColumnSelector::All),
            Err(StoreError::Compile(_))
        ));
        assert!(matches!(
            fx.db.destroy_rows("kv", &RowSelector::all().column_equals("nope", 1)),
            Err(StoreError::Compile(_))
        ));
        assert!(matches!(
            fx.db.destroy_rows("kv", &RowSelector::all().column_equals("bad name", 1)),
            Err(StoreError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_declared_value_type() {
        assert_eq!(declared_value_type("BOOLEAN"), Some(ValueType::Boolean));
        assert_eq!(declared_value_type("int"), Some(ValueType::Integer));
        assert_eq!(declared_value_type("VARCHAR(20)"), Some(ValueType::Text));
        assert_eq!(declared_value_type("DOUBLE PRECISION"), Some(ValueType::Real));
        assert_eq!(declared_value_type("BLOB"), None);
        assert_eq!(declared_value_type(""), None);
    }
}
