pub mod element;
pub mod types;

pub use element::{ElementDef, FormDef, SimpleType};
pub use types::{Dialect, SchemaType};
