//! Typed records with a raw storage form and a tensor compute form.
//!
//! A [Record] is an instance of a [RecordSchema]. Every schema is paired with
//! a counterpart schema in the other form, resolved through the global
//! [registry]. Records can be converted between forms, batched, repeated,
//! moved across devices, lazily loaded and flattened into table rows.

mod common;

pub mod batch;
pub mod config;
pub mod convert;
pub mod device;
pub mod encoding;
pub mod error;
pub mod field;
pub mod file_path;
pub mod json;
pub mod load;
pub mod record;
pub mod registry;
pub mod repeat;
pub mod schema;
pub mod table;
pub mod types;
pub mod value;
mod visit;

pub use config::Config;
pub use error::{DataModelError, ResolutionError};
pub use field::{BatchPolicy, ColumnType, FieldSpec, FieldType, KindClass, RowCodec, TensorSpec};
pub use load::{ContentLoader, DefaultLoader, ResourceHooks};
pub use record::{BatchState, LoadState, Record};
pub use schema::{RecordForm, RecordSchema};
pub use table::{Row, SchemaNode, TableSchema};
pub use value::FieldValue;
