use thiserror::Error;

use super::PageLayout;
use crate::record::{PageId, TupleId};

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Invalid tuple id: {0}")]
    InvalidTupleId(TupleId),

    #[error("Page full: page_id={0}")]
    PageFull(PageId),

    #[error("Tuple of {tuple_size} bytes does not fit a {page_size}-byte page")]
    TupleTooLarge { tuple_size: usize, page_size: usize },

    #[error("Tuple size mismatch: expected {expected}, got {actual}")]
    TupleSizeMismatch { expected: usize, actual: usize },

    #[error("Unsupported page size: {0}")]
    UnsupportedPageSize(usize),

    #[error("Corrupt page: {0}")]
    Corrupt(String),

    #[error("Column access is not supported by the {0} layout")]
    NoColumnAccess(PageLayout),

    #[error("Unknown field index: {0}")]
    UnknownField(usize),
}

pub type PageResult<T> = Result<T, PageError>;
