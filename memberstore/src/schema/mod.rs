pub mod identifier;
pub mod types;

pub use identifier::{check_type_name, quote_identifier};
pub use types::*;
