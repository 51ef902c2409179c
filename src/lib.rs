pub mod catalog;
pub mod config;
pub mod engine;
pub mod file;
pub mod page;
pub mod record;

pub use catalog::{Catalog, CatalogError, CatalogResult, RelationMetadata};
pub use config::{ConfigError, StorageConfig, DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE, MIN_PAGE_SIZE};
pub use engine::{StorageEngine, StorageError, StorageResult};
pub use file::{BufferPool, FileError, FileHeader, FileManager, FileResult, PagedFile, StorageFile};
pub use page::{Page, PageError, PageFormat, PageHeader, PageLayout, PageResult};
pub use record::{
    Field, FieldType, FileId, PageId, Record, RecordError, RecordResult, Schema, TupleId, Value,
};
