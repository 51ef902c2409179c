mod buffer_pool;
mod error;
mod file_manager;
mod header;
mod paged_file;
mod storage_file;

pub use buffer_pool::BufferPool;
pub use error::{FileError, FileResult};
pub use file_manager::FileManager;
pub use header::FileHeader;
pub use paged_file::PagedFile;
pub use storage_file::{DirectPageIter, HeaderIter, PageIter, StorageFile, TupleIter};
