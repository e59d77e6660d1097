pub mod config;
pub mod database;
pub mod error;
mod metadata;
mod migration;
pub mod rows;
pub mod schema;
pub mod snapshot;
pub mod statement;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use config::StoreOptions;
pub use database::Database;
pub use error::{Result, StoreError};
pub use rows::{ColumnDescriptor, ColumnSelector, DataSet, RowSelector};
pub use schema::{ColumnDefinition, TableDefinition, TableDefinitions};
pub use snapshot::Blob;
pub use statement::{Statement, Step};
pub use value::{Value, ValueType};
