use super::{
    DIRTY_FLAG, PageError, PageFormat, PageLayout, PageResult, check_page_size, read_u16,
    write_u16,
};
use crate::record::Schema;

/// Header of a contiguous page: tuples are packed back to back starting
/// right after the header, and `free_space_offset` marks the end of the
/// last one.
///
/// Serialized as `flags u8 | pad u8 | tuple_size u16 | free_space_offset u16 | page_capacity u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousHeader {
    flags: u8,
    tuple_size: u16,
    free_space_offset: u16,
    page_capacity: u16,
}

impl ContiguousHeader {
    pub const SIZE: usize = 8;

    pub fn free_space_offset(&self) -> usize {
        self.free_space_offset as usize
    }

    pub fn page_capacity(&self) -> usize {
        self.page_capacity as usize
    }

    fn tuple_offset(&self, index: usize) -> usize {
        Self::SIZE + index * self.tuple_size()
    }
}

impl PageFormat for ContiguousHeader {
    const LAYOUT: PageLayout = PageLayout::Contiguous;

    fn initialize(data: &mut [u8], schema: &Schema) -> PageResult<Self> {
        let page_capacity = check_page_size(data.len())?;
        let too_large = PageError::TupleTooLarge {
            tuple_size: schema.size(),
            page_size: data.len(),
        };
        if data.len() < Self::SIZE || (data.len() - Self::SIZE) / schema.size() == 0 {
            return Err(too_large);
        }
        let tuple_size = u16::try_from(schema.size()).map_err(|_| too_large)?;

        let header = Self {
            flags: 0,
            tuple_size,
            free_space_offset: Self::SIZE as u16,
            page_capacity,
        };
        header.pack(data);
        Ok(header)
    }

    fn unpack(data: &[u8]) -> PageResult<Self> {
        if data.len() < Self::SIZE {
            return Err(PageError::Corrupt(format!(
                "{} bytes is too short for a contiguous page header",
                data.len()
            )));
        }

        let header = Self {
            flags: data[0],
            tuple_size: read_u16(data, 2),
            free_space_offset: read_u16(data, 4),
            page_capacity: read_u16(data, 6),
        };

        let tuple_size = header.tuple_size();
        let offset = header.free_space_offset();
        if tuple_size == 0
            || header.page_capacity() != data.len()
            || offset < Self::SIZE
            || offset > header.page_capacity()
            || (offset - Self::SIZE) % tuple_size != 0
        {
            return Err(PageError::Corrupt(format!(
                "inconsistent contiguous header: tuple_size={} free_space_offset={} page_capacity={} buffer={}",
                tuple_size,
                offset,
                header.page_capacity,
                data.len()
            )));
        }
        Ok(header)
    }

    fn pack(&self, data: &mut [u8]) {
        data[0] = self.flags;
        data[1] = 0;
        write_u16(data, 2, self.tuple_size);
        write_u16(data, 4, self.free_space_offset);
        write_u16(data, 6, self.page_capacity);
    }

    fn header_size(&self) -> usize {
        Self::SIZE
    }

    fn tuple_size(&self) -> usize {
        self.tuple_size as usize
    }

    fn capacity(&self) -> usize {
        (self.page_capacity() - Self::SIZE) / self.tuple_size()
    }

    fn num_tuples(&self) -> usize {
        (self.free_space_offset() - Self::SIZE) / self.tuple_size()
    }

    fn has_free_tuple(&self) -> bool {
        self.free_space_offset() + self.tuple_size() <= self.page_capacity()
    }

    fn is_occupied(&self, index: usize) -> bool {
        index < self.num_tuples()
    }

    fn next_occupied(&self, from: usize) -> Option<usize> {
        (from < self.num_tuples()).then_some(from)
    }

    fn allocate(&mut self) -> Option<usize> {
        if !self.has_free_tuple() {
            return None;
        }
        let index = self.num_tuples();
        self.free_space_offset += self.tuple_size;
        Some(index)
    }

    fn remove(&mut self, data: &mut [u8], index: usize) {
        if !self.is_occupied(index) {
            return;
        }
        let start = self.tuple_offset(index);
        let end = self.free_space_offset();
        let size = self.tuple_size();

        // Shift the tail down over the removed tuple
        data.copy_within(start + size..end, start);
        data[end - size..end].fill(0);
        self.free_space_offset -= self.tuple_size;
    }

    fn read(&self, data: &[u8], index: usize, out: &mut [u8]) {
        let start = self.tuple_offset(index);
        out.copy_from_slice(&data[start..start + self.tuple_size()]);
    }

    fn write(&self, data: &mut [u8], index: usize, tuple: &[u8]) {
        let start = self.tuple_offset(index);
        data[start..start + self.tuple_size()].copy_from_slice(tuple);
    }

    fn is_dirty(&self) -> bool {
        self.flags & DIRTY_FLAG != 0
    }

    fn set_dirty(&mut self, dirty: bool) {
        if dirty {
            self.flags |= DIRTY_FLAG;
        } else {
            self.flags &= !DIRTY_FLAG;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use crate::record::{FileId, PageId, TupleId};

    fn schema_16() -> Schema {
        Schema::from_pairs("wide", &[("a", "int"), ("b", "char(12)")]).unwrap()
    }

    fn new_page(page_size: usize) -> Page {
        Page::initialize(
            PageId::new(FileId(1), 0),
            PageLayout::Contiguous,
            &schema_16(),
            vec![0u8; page_size].into_boxed_slice(),
        )
        .unwrap()
    }

    fn tuple(n: u8) -> Vec<u8> {
        vec![n; 16]
    }

    #[test]
    fn test_fill_4096_page() {
        let mut page = new_page(4096);
        assert_eq!(page.header_size(), 8);
        assert_eq!(page.capacity(), 255);

        page.insert_tuple(&tuple(1)).unwrap();
        assert_eq!(page.used_space(), 16);

        while page.has_free_tuple() {
            page.insert_tuple(&tuple(2)).unwrap();
        }
        assert_eq!(page.num_tuples(), 255);
        assert!(matches!(
            page.insert_tuple(&tuple(3)),
            Err(PageError::PageFull(_))
        ));
    }

    #[test]
    fn test_tuple_offsets_follow_header() {
        let mut page = new_page(4096);
        for i in 0..3u8 {
            let id = page.insert_tuple(&tuple(i + 1)).unwrap();
            assert_eq!(id.tuple_index, i as u32);
        }
        let bytes = page.pack();
        assert_eq!(&bytes[8..24], &tuple(1)[..]);
        assert_eq!(&bytes[24..40], &tuple(2)[..]);
        assert_eq!(&bytes[40..56], &tuple(3)[..]);
        assert_eq!(read_u16(bytes, 4), 56);
    }

    #[test]
    fn test_delete_compacts() {
        let mut page = new_page(4096);
        let first = page.insert_tuple(&tuple(1)).unwrap();
        page.insert_tuple(&tuple(2)).unwrap();
        page.insert_tuple(&tuple(3)).unwrap();

        page.delete_tuple(first).unwrap();
        assert_eq!(page.num_tuples(), 2);
        assert_eq!(page.used_space(), 32);

        // Later tuples moved one position toward the front
        let id = |i| TupleId::new(page.id(), i);
        assert_eq!(page.get_tuple(id(0)).unwrap(), tuple(2));
        assert_eq!(page.get_tuple(id(1)).unwrap(), tuple(3));
        assert!(page.get_tuple(id(2)).is_err());

        let bytes = page.pack();
        assert_eq!(read_u16(bytes, 4), 8 + 32);
        assert_eq!(&bytes[40..56], &[0u8; 16]);
    }

    #[test]
    fn test_unpack_rejects_inconsistent_header() {
        let mut page = new_page(256);
        page.insert_tuple(&tuple(1)).unwrap();
        let mut bytes = page.pack().to_vec();

        // Free-space offset not on a tuple boundary
        write_u16(&mut bytes, 4, 13);
        assert!(matches!(
            ContiguousHeader::unpack(&bytes),
            Err(PageError::Corrupt(_))
        ));

        // Capacity disagrees with the buffer
        write_u16(&mut bytes, 4, 24);
        write_u16(&mut bytes, 6, 512);
        assert!(matches!(
            ContiguousHeader::unpack(&bytes),
            Err(PageError::Corrupt(_))
        ));

        assert!(ContiguousHeader::unpack(&[0u8; 4]).is_err());
        assert!(ContiguousHeader::unpack(&[0u8; 256]).is_err());
    }

    #[test]
    fn test_page_size_limit() {
        let result = Page::initialize(
            PageId::new(FileId(1), 0),
            PageLayout::Contiguous,
            &schema_16(),
            vec![0u8; 70000].into_boxed_slice(),
        );
        assert!(matches!(result, Err(PageError::UnsupportedPageSize(70000))));
    }
}
