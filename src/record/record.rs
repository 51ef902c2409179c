use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Identifier of a relation's backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A page within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId {
    pub file_id: FileId,
    pub page_index: u32,
}

impl PageId {
    pub fn new(file_id: FileId, page_index: u32) -> Self {
        Self {
            file_id,
            page_index,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_index)
    }
}

/// Physical identifier of a tuple (page + position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TupleId {
    pub page_id: PageId,
    pub tuple_index: u32,
}

impl TupleId {
    pub fn new(page_id: PageId, tuple_index: u32) -> Self {
        Self {
            page_id,
            tuple_index,
        }
    }
}

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id, self.tuple_index)
    }
}

/// A single tuple with typed values
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_display() {
        let page_id = PageId::new(FileId(3), 12);
        let tuple_id = TupleId::new(page_id, 5);
        assert_eq!(page_id.to_string(), "3:12");
        assert_eq!(tuple_id.to_string(), "3:12:5");
    }

    #[test]
    fn test_page_id_ordering() {
        let a = PageId::new(FileId(0), 9);
        let b = PageId::new(FileId(1), 0);
        let c = PageId::new(FileId(1), 2);
        assert!(a < b);
        assert!(b < c);
    }
}
