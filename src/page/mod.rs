//! Fixed-size pages holding fixed-width tuples.
//!
//! Three layouts share one contract through [`PageFormat`]:
//! - [`ContiguousHeader`]: tuples packed front to back behind a free-space
//!   offset; deletes compact the tail, so tuple ids are positional.
//! - [`SlottedHeader`]: an occupancy bitmap and stable slot numbers.
//! - [`ColumnarHeader`]: the slotted directory with one sub-array per field
//!   (PAX), which also supports scanning a single column.
//!
//! A [`Page`] owns its byte buffer and the decoded header; the header is
//! written back into the buffer by [`Page::pack`].

mod columnar;
mod contiguous;
mod error;
mod slots;
mod slotted;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use columnar::ColumnarHeader;
pub use contiguous::ContiguousHeader;
pub use error::{PageError, PageResult};
pub use slotted::SlottedHeader;

use crate::record::{PageId, Schema, TupleId};

/// Bit in a header's flags byte marking the page as modified
pub(crate) const DIRTY_FLAG: u8 = 0b1;

pub(crate) fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

pub(crate) fn write_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn check_page_size(page_size: usize) -> PageResult<u16> {
    u16::try_from(page_size).map_err(|_| PageError::UnsupportedPageSize(page_size))
}

/// Page layout, persisted in the file header as a short tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageLayout {
    Contiguous,
    Slotted,
    Columnar,
}

impl PageLayout {
    pub fn tag(&self) -> &'static str {
        match self {
            PageLayout::Contiguous => "contiguous",
            PageLayout::Slotted => "slotted",
            PageLayout::Columnar => "columnar",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "contiguous" => Some(PageLayout::Contiguous),
            "slotted" => Some(PageLayout::Slotted),
            "columnar" | "pax" => Some(PageLayout::Columnar),
            _ => None,
        }
    }
}

impl fmt::Display for PageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PageLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageLayout::from_tag(&s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown page layout '{}'", s))
    }
}

/// Header bookkeeping shared by every page layout.
///
/// Implementations own occupancy state only; tuple bytes live in the page
/// buffer passed to each call. Indices are positions in `0..capacity()`.
pub trait PageFormat: Sized {
    const LAYOUT: PageLayout;

    /// Build the header of an empty page spanning `data` and serialize it.
    /// Fails with `TupleTooLarge` when not even one tuple fits.
    fn initialize(data: &mut [u8], schema: &Schema) -> PageResult<Self>;

    /// Rebuild a header from a serialized page
    fn unpack(data: &[u8]) -> PageResult<Self>;

    /// Serialize the header into the front of `data`
    fn pack(&self, data: &mut [u8]);

    fn header_size(&self) -> usize;
    fn tuple_size(&self) -> usize;
    fn capacity(&self) -> usize;
    fn num_tuples(&self) -> usize;
    fn has_free_tuple(&self) -> bool;
    fn is_occupied(&self, index: usize) -> bool;

    /// First occupied index at or after `from`
    fn next_occupied(&self, from: usize) -> Option<usize>;

    /// Reserve a free position, returning its index
    fn allocate(&mut self) -> Option<usize>;

    /// Free an occupied position
    fn remove(&mut self, data: &mut [u8], index: usize);

    fn read(&self, data: &[u8], index: usize, out: &mut [u8]);
    fn write(&self, data: &mut [u8], index: usize, tuple: &[u8]);

    fn is_dirty(&self) -> bool;
    fn set_dirty(&mut self, dirty: bool);

    /// Bytes taken by live tuples
    fn used_space(&self) -> usize {
        self.num_tuples() * self.tuple_size()
    }

    /// Bytes still available for tuples
    fn free_space(&self) -> usize {
        (self.capacity() - self.num_tuples()) * self.tuple_size()
    }
}

/// Decoded header of any layout
#[derive(Debug, Clone)]
pub enum PageHeader {
    Contiguous(ContiguousHeader),
    Slotted(SlottedHeader),
    Columnar(ColumnarHeader),
}

macro_rules! dispatch {
    ($header:expr, $h:ident => $body:expr) => {
        match $header {
            PageHeader::Contiguous($h) => $body,
            PageHeader::Slotted($h) => $body,
            PageHeader::Columnar($h) => $body,
        }
    };
}

impl PageHeader {
    pub fn initialize(layout: PageLayout, data: &mut [u8], schema: &Schema) -> PageResult<Self> {
        Ok(match layout {
            PageLayout::Contiguous => PageHeader::Contiguous(ContiguousHeader::initialize(data, schema)?),
            PageLayout::Slotted => PageHeader::Slotted(SlottedHeader::initialize(data, schema)?),
            PageLayout::Columnar => PageHeader::Columnar(ColumnarHeader::initialize(data, schema)?),
        })
    }

    pub fn unpack(layout: PageLayout, data: &[u8]) -> PageResult<Self> {
        Ok(match layout {
            PageLayout::Contiguous => PageHeader::Contiguous(ContiguousHeader::unpack(data)?),
            PageLayout::Slotted => PageHeader::Slotted(SlottedHeader::unpack(data)?),
            PageLayout::Columnar => PageHeader::Columnar(ColumnarHeader::unpack(data)?),
        })
    }

    pub fn pack(&self, data: &mut [u8]) {
        dispatch!(self, h => h.pack(data))
    }

    pub fn layout(&self) -> PageLayout {
        match self {
            PageHeader::Contiguous(_) => ContiguousHeader::LAYOUT,
            PageHeader::Slotted(_) => SlottedHeader::LAYOUT,
            PageHeader::Columnar(_) => ColumnarHeader::LAYOUT,
        }
    }

    pub fn header_size(&self) -> usize {
        dispatch!(self, h => h.header_size())
    }

    pub fn tuple_size(&self) -> usize {
        dispatch!(self, h => h.tuple_size())
    }

    pub fn capacity(&self) -> usize {
        dispatch!(self, h => h.capacity())
    }

    pub fn num_tuples(&self) -> usize {
        dispatch!(self, h => h.num_tuples())
    }

    pub fn has_free_tuple(&self) -> bool {
        dispatch!(self, h => h.has_free_tuple())
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        dispatch!(self, h => h.is_occupied(index))
    }

    pub fn next_occupied(&self, from: usize) -> Option<usize> {
        dispatch!(self, h => h.next_occupied(from))
    }

    pub fn used_space(&self) -> usize {
        dispatch!(self, h => h.used_space())
    }

    pub fn free_space(&self) -> usize {
        dispatch!(self, h => h.free_space())
    }

    pub fn is_dirty(&self) -> bool {
        dispatch!(self, h => h.is_dirty())
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        dispatch!(self, h => h.set_dirty(dirty))
    }

    fn allocate(&mut self) -> Option<usize> {
        dispatch!(self, h => h.allocate())
    }

    fn remove(&mut self, data: &mut [u8], index: usize) {
        dispatch!(self, h => h.remove(data, index))
    }

    fn read(&self, data: &[u8], index: usize, out: &mut [u8]) {
        dispatch!(self, h => h.read(data, index, out))
    }

    fn write(&self, data: &mut [u8], index: usize, tuple: &[u8]) {
        dispatch!(self, h => h.write(data, index, tuple))
    }
}

/// A page-sized buffer together with its decoded header
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    header: PageHeader,
    buffer: Box<[u8]>,
}

impl Page {
    /// Format `buffer` as an empty page of the given layout
    pub fn initialize(
        id: PageId,
        layout: PageLayout,
        schema: &Schema,
        mut buffer: Box<[u8]>,
    ) -> PageResult<Self> {
        buffer.fill(0);
        let header = PageHeader::initialize(layout, &mut buffer, schema)?;
        Ok(Self { id, header, buffer })
    }

    /// Reconstruct a page from its serialized bytes
    pub fn unpack(id: PageId, layout: PageLayout, buffer: Box<[u8]>) -> PageResult<Self> {
        let header = PageHeader::unpack(layout, &buffer)?;
        Ok(Self { id, header, buffer })
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn layout(&self) -> PageLayout {
        self.header.layout()
    }

    pub fn page_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn header_size(&self) -> usize {
        self.header.header_size()
    }

    pub fn tuple_size(&self) -> usize {
        self.header.tuple_size()
    }

    pub fn capacity(&self) -> usize {
        self.header.capacity()
    }

    pub fn num_tuples(&self) -> usize {
        self.header.num_tuples()
    }

    pub fn has_free_tuple(&self) -> bool {
        self.header.has_free_tuple()
    }

    pub fn used_space(&self) -> usize {
        self.header.used_space()
    }

    pub fn free_space(&self) -> usize {
        self.header.free_space()
    }

    pub fn is_dirty(&self) -> bool {
        self.header.is_dirty()
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.header.set_dirty(dirty);
    }

    fn check_size(&self, tuple: &[u8]) -> PageResult<()> {
        if tuple.len() != self.tuple_size() {
            return Err(PageError::TupleSizeMismatch {
                expected: self.tuple_size(),
                actual: tuple.len(),
            });
        }
        Ok(())
    }

    /// Resolve a tuple id to an occupied index on this page
    fn locate(&self, tuple_id: TupleId) -> PageResult<usize> {
        let index = tuple_id.tuple_index as usize;
        if tuple_id.page_id != self.id || !self.header.is_occupied(index) {
            return Err(PageError::InvalidTupleId(tuple_id));
        }
        Ok(index)
    }

    fn tuple_id(&self, index: usize) -> TupleId {
        TupleId::new(self.id, index as u32)
    }

    /// Copy a tuple into a free position
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> PageResult<TupleId> {
        self.check_size(tuple)?;
        let index = self
            .header
            .allocate()
            .ok_or(PageError::PageFull(self.id))?;
        self.header.write(&mut self.buffer, index, tuple);
        self.set_dirty(true);
        Ok(self.tuple_id(index))
    }

    pub fn get_tuple(&self, tuple_id: TupleId) -> PageResult<Vec<u8>> {
        let index = self.locate(tuple_id)?;
        let mut out = vec![0u8; self.tuple_size()];
        self.header.read(&self.buffer, index, &mut out);
        Ok(out)
    }

    /// Overwrite an existing tuple in place
    pub fn put_tuple(&mut self, tuple_id: TupleId, tuple: &[u8]) -> PageResult<()> {
        self.check_size(tuple)?;
        let index = self.locate(tuple_id)?;
        self.header.write(&mut self.buffer, index, tuple);
        self.set_dirty(true);
        Ok(())
    }

    /// Zero a tuple's bytes without freeing its position
    pub fn clear_tuple(&mut self, tuple_id: TupleId) -> PageResult<()> {
        let index = self.locate(tuple_id)?;
        let zeros = vec![0u8; self.tuple_size()];
        self.header.write(&mut self.buffer, index, &zeros);
        self.set_dirty(true);
        Ok(())
    }

    /// Free a tuple's position. On contiguous pages later tuples shift down.
    pub fn delete_tuple(&mut self, tuple_id: TupleId) -> PageResult<()> {
        let index = self.locate(tuple_id)?;
        self.header.remove(&mut self.buffer, index);
        self.set_dirty(true);
        Ok(())
    }

    /// Occupied tuples in position order
    pub fn tuples(&self) -> Tuples<'_> {
        Tuples {
            page: self,
            next: 0,
        }
    }

    /// Ids of occupied tuples in position order
    pub fn tuple_ids(&self) -> impl Iterator<Item = TupleId> + '_ {
        let mut next = 0;
        std::iter::from_fn(move || {
            let index = self.header.next_occupied(next)?;
            next = index + 1;
            Some(self.tuple_id(index))
        })
    }

    /// Values of one field across all occupied slots. Columnar pages only.
    pub fn column(&self, field: usize) -> PageResult<Column<'_>> {
        let PageHeader::Columnar(header) = &self.header else {
            return Err(PageError::NoColumnAccess(self.layout()));
        };
        if field >= header.num_fields() {
            return Err(PageError::UnknownField(field));
        }
        Ok(Column {
            header,
            data: &self.buffer,
            field,
            next: 0,
        })
    }

    /// Refresh the serialized header and return the whole page
    pub fn pack(&mut self) -> &[u8] {
        self.header.pack(&mut self.buffer);
        &self.buffer
    }

    /// Give the buffer back, e.g. to a buffer pool frame
    pub fn into_buffer(self) -> Box<[u8]> {
        self.buffer
    }
}

/// Iterator over a page's occupied tuples
pub struct Tuples<'a> {
    page: &'a Page,
    next: usize,
}

impl Iterator for Tuples<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.page.header.next_occupied(self.next)?;
        self.next = index + 1;
        let mut out = vec![0u8; self.page.tuple_size()];
        self.page.header.read(&self.page.buffer, index, &mut out);
        Some(out)
    }
}

/// Iterator over one field of a columnar page, borrowing the column bytes
pub struct Column<'a> {
    header: &'a ColumnarHeader,
    data: &'a [u8],
    field: usize,
    next: usize,
}

impl<'a> Iterator for Column<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.header.next_occupied(self.next)?;
        self.next = slot + 1;
        let data = self.data;
        Some(&data[self.header.field_range(self.field, slot)])
    }
}
