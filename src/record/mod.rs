mod error;
mod record;
mod schema;
mod value;

pub use error::{RecordError, RecordResult};
pub use record::{FileId, PageId, Record, TupleId};
pub use schema::{Field, Schema};
pub use value::{FieldType, Value};
