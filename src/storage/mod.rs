pub mod catalog;
pub mod engine;
pub mod table;

pub use catalog::Catalog;
pub use engine::StorageEngine;
pub use table::{Table, TableSchema, ID_COLUMN, PARENT_ID_COLUMN};
