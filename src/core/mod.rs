pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, StorageError};
pub use types::{Column, Row, Schema};
pub use value::{DataType, Value};
