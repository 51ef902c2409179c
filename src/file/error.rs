use std::io;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::page::{PageError, PageLayout};
use crate::record::{FileId, PageId, RecordError, TupleId};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Unknown file: file_id={0}")]
    UnknownFile(FileId),

    #[error("Invalid page id: {0}")]
    InvalidPageId(PageId),

    #[error("Invalid tuple id: {0}")]
    InvalidTupleId(TupleId),

    #[error("Corrupt file header: {0}")]
    CorruptHeader(String),

    #[error("Page layout mismatch: file uses {expected}, page is {actual}")]
    LayoutMismatch {
        expected: PageLayout,
        actual: PageLayout,
    },

    #[error("Schema mismatch: file tuples are {expected} bytes, page holds {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Buffer pool of {pool_size} bytes cannot hold a {page_size}-byte page")]
    InvalidPoolSize { pool_size: usize, page_size: usize },

    #[error("Buffer pool exhausted: every frame is pinned")]
    PoolExhausted,

    #[error("Page not in buffer pool: {0}")]
    PageNotCached(PageId),

    #[error("Page is pinned: {0}")]
    PagePinned(PageId),

    #[error("Invalid relation name: {0:?}")]
    InvalidRelationName(String),
}

pub type FileResult<T> = Result<T, FileError>;
