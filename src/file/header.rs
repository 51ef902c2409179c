use std::io::Read;

use super::error::{FileError, FileResult};
use crate::page::PageLayout;
use crate::record::Schema;

/// Header written once at the start of every storage file.
///
/// On disk (little-endian):
/// `header_len u16 | page_size u16 | tag_len u16 | schema_len u16 | tag | schema json`
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    page_size: u16,
    layout: PageLayout,
    schema: Schema,
    schema_payload: Vec<u8>,
}

impl FileHeader {
    /// Bytes of the four length fields preceding the tag
    pub const PREFIX_SIZE: usize = 8;

    pub fn new(page_size: usize, layout: PageLayout, schema: Schema) -> FileResult<Self> {
        let page_size = u16::try_from(page_size)
            .ok()
            .filter(|&size| size > 0)
            .ok_or(FileError::InvalidPageSize {
                expected: u16::MAX as usize,
                actual: page_size,
            })?;
        let schema_payload = schema.to_json()?;

        let header = Self {
            page_size,
            layout,
            schema,
            schema_payload,
        };
        if header.size() > u16::MAX as usize {
            return Err(FileError::CorruptHeader(format!(
                "header of {} bytes exceeds the u16 length field",
                header.size()
            )));
        }
        Ok(header)
    }

    /// Total header length including the schema payload
    pub fn size(&self) -> usize {
        Self::PREFIX_SIZE + self.layout.tag().len() + self.schema_payload.len()
    }

    pub fn page_size(&self) -> usize {
        self.page_size as usize
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn pack(&self) -> Vec<u8> {
        let tag = self.layout.tag().as_bytes();
        let mut bytes = Vec::with_capacity(self.size());
        bytes.extend_from_slice(&(self.size() as u16).to_le_bytes());
        bytes.extend_from_slice(&self.page_size.to_le_bytes());
        bytes.extend_from_slice(&(tag.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(self.schema_payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(tag);
        bytes.extend_from_slice(&self.schema_payload);
        bytes
    }

    /// Decode the length fields, returning `(header_len, page_size, tag_len, schema_len)`
    fn unpack_prefix(bytes: &[u8]) -> FileResult<[usize; 4]> {
        if bytes.len() < Self::PREFIX_SIZE {
            return Err(FileError::CorruptHeader(format!(
                "{} bytes is too short for a file header",
                bytes.len()
            )));
        }

        let mut fields = [0usize; 4];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]) as usize;
        }
        if fields.contains(&0) {
            return Err(FileError::CorruptHeader(format!(
                "zero length field in {:?}",
                fields
            )));
        }

        let [header_len, _, tag_len, schema_len] = fields;
        if header_len != Self::PREFIX_SIZE + tag_len + schema_len {
            return Err(FileError::CorruptHeader(format!(
                "header length {} disagrees with tag {} and schema {}",
                header_len, tag_len, schema_len
            )));
        }
        Ok(fields)
    }

    pub fn unpack(bytes: &[u8]) -> FileResult<Self> {
        let [header_len, page_size, tag_len, _] = Self::unpack_prefix(bytes)?;
        if bytes.len() < header_len {
            return Err(FileError::CorruptHeader(format!(
                "expected {} header bytes, found {}",
                header_len,
                bytes.len()
            )));
        }

        let tag_end = Self::PREFIX_SIZE + tag_len;
        let layout = std::str::from_utf8(&bytes[Self::PREFIX_SIZE..tag_end])
            .ok()
            .and_then(PageLayout::from_tag)
            .ok_or_else(|| FileError::CorruptHeader("unknown page layout tag".to_string()))?;
        let schema = Schema::from_json(&bytes[tag_end..header_len])
            .map_err(|e| FileError::CorruptHeader(format!("undecodable schema: {}", e)))?;

        Ok(Self {
            page_size: page_size as u16,
            layout,
            schema,
            schema_payload: bytes[tag_end..header_len].to_vec(),
        })
    }

    /// Read a header from the start of a stream: the fixed prefix first, then
    /// as many bytes as it announces
    pub fn from_reader<R: Read>(reader: &mut R) -> FileResult<Self> {
        let mut bytes = vec![0u8; Self::PREFIX_SIZE];
        reader
            .read_exact(&mut bytes)
            .map_err(|e| FileError::CorruptHeader(format!("truncated header: {}", e)))?;

        let [header_len, ..] = Self::unpack_prefix(&bytes)?;
        bytes.resize(header_len, 0);
        reader
            .read_exact(&mut bytes[Self::PREFIX_SIZE..])
            .map_err(|e| FileError::CorruptHeader(format!("truncated header: {}", e)))?;

        Self::unpack(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn schema(fields: usize) -> Schema {
        let names: Vec<String> = (0..fields).map(|i| format!("f{}", i)).collect();
        let pairs: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "int")).collect();
        Schema::from_pairs("t", &pairs).unwrap()
    }

    #[test]
    fn test_round_trip_many_schemas() {
        for fields in 1..=12 {
            for layout in [PageLayout::Contiguous, PageLayout::Slotted, PageLayout::Columnar] {
                let header = FileHeader::new(4096, layout, schema(fields)).unwrap();
                let bytes = header.pack();
                assert_eq!(bytes.len(), header.size());
                assert_eq!(FileHeader::unpack(&bytes).unwrap(), header);
                assert_eq!(
                    FileHeader::from_reader(&mut Cursor::new(&bytes)).unwrap(),
                    header
                );
            }
        }
    }

    #[test]
    fn test_prefix_layout() {
        let header = FileHeader::new(4096, PageLayout::Slotted, schema(1)).unwrap();
        let bytes = header.pack();
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]) as usize, bytes.len());
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 4096);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 7);
        assert_eq!(&bytes[8..15], b"slotted");
    }

    #[test]
    fn test_zero_length_field_is_corrupt() {
        let mut bytes = FileHeader::new(4096, PageLayout::Slotted, schema(2))
            .unwrap()
            .pack();
        bytes[2] = 0;
        bytes[3] = 0;
        assert!(matches!(
            FileHeader::unpack(&bytes),
            Err(FileError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_bad_payload_is_corrupt() {
        let mut bytes = FileHeader::new(4096, PageLayout::Columnar, schema(2))
            .unwrap()
            .pack();
        let last = bytes.len() - 1;
        bytes[last] = b'#';
        assert!(matches!(
            FileHeader::unpack(&bytes),
            Err(FileError::CorruptHeader(_))
        ));

        let mut bytes = FileHeader::new(4096, PageLayout::Columnar, schema(2))
            .unwrap()
            .pack();
        bytes[8] = b'X';
        assert!(matches!(
            FileHeader::unpack(&bytes),
            Err(FileError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_truncated_stream_is_corrupt() {
        let bytes = FileHeader::new(4096, PageLayout::Slotted, schema(3))
            .unwrap()
            .pack();
        let result = FileHeader::from_reader(&mut Cursor::new(&bytes[..bytes.len() - 4]));
        assert!(matches!(result, Err(FileError::CorruptHeader(_))));
    }

    #[test]
    fn test_page_size_must_fit() {
        assert!(matches!(
            FileHeader::new(70000, PageLayout::Slotted, schema(1)),
            Err(FileError::InvalidPageSize { .. })
        ));
        assert!(FileHeader::new(0, PageLayout::Slotted, schema(1)).is_err());
    }
}
