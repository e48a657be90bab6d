mod error;
mod schema;
mod validation;

pub use error::SchemaError;
pub use schema::{Schema, SchemaKind};
pub use validation::{validate, validate_value};
