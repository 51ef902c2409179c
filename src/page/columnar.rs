use std::ops::Range;

use super::slots::SlotDirectory;
use super::{
    DIRTY_FLAG, PageError, PageFormat, PageLayout, PageResult, check_page_size, read_u16,
    write_u16,
};
use crate::record::Schema;

/// Header of a columnar (PAX) page. The slot directory matches the slotted
/// layout, but the tuple region is split into one sub-array per field:
/// field `f` of slot `s` lives at `column_offset(f) + s * width(f)`.
///
/// Serialized as
/// `flags u8 | pad u8 | num_slots u16 | num_fields u16 | width u16 (per field) | bitmap`.
#[derive(Debug, Clone)]
pub struct ColumnarHeader {
    flags: u8,
    widths: Vec<u16>,
    column_offsets: Vec<usize>,
    tuple_size: usize,
    slots: SlotDirectory,
}

impl ColumnarHeader {
    fn fixed_size(num_fields: usize) -> usize {
        6 + 2 * num_fields
    }

    fn new(flags: u8, widths: Vec<u16>, slots: SlotDirectory) -> Self {
        let header_size =
            Self::fixed_size(widths.len()) + SlotDirectory::bitmap_size(slots.num_slots());
        let mut column_offsets = Vec::with_capacity(widths.len());
        let mut offset = header_size;
        for width in &widths {
            column_offsets.push(offset);
            offset += *width as usize * slots.num_slots();
        }
        let tuple_size = widths.iter().map(|w| *w as usize).sum();

        Self {
            flags,
            widths,
            column_offsets,
            tuple_size,
            slots,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.slots.num_slots()
    }

    pub fn num_fields(&self) -> usize {
        self.widths.len()
    }

    pub fn width(&self, field: usize) -> usize {
        self.widths[field] as usize
    }

    pub fn column_offset(&self, field: usize) -> usize {
        self.column_offsets[field]
    }

    /// Byte range of one field of one slot
    pub fn field_range(&self, field: usize, slot: usize) -> Range<usize> {
        let width = self.width(field);
        let start = self.column_offset(field) + slot * width;
        start..start + width
    }
}

impl PageFormat for ColumnarHeader {
    const LAYOUT: PageLayout = PageLayout::Columnar;

    fn initialize(data: &mut [u8], schema: &Schema) -> PageResult<Self> {
        check_page_size(data.len())?;
        let too_large = || PageError::TupleTooLarge {
            tuple_size: schema.size(),
            page_size: data.len(),
        };

        let widths = schema
            .field_sizes()
            .into_iter()
            .map(|w| u16::try_from(w).map_err(|_| too_large()))
            .collect::<PageResult<Vec<_>>>()?;
        let available = data.len().saturating_sub(Self::fixed_size(widths.len()));
        let num_slots = SlotDirectory::slot_count(available, schema.size());
        if num_slots == 0 {
            return Err(too_large());
        }

        let header = Self::new(0, widths, SlotDirectory::new(num_slots));
        header.pack(data);
        Ok(header)
    }

    fn unpack(data: &[u8]) -> PageResult<Self> {
        let corrupt = |reason: &str| {
            PageError::Corrupt(format!("inconsistent columnar header: {}", reason))
        };
        if data.len() < Self::fixed_size(0) {
            return Err(corrupt("buffer too short"));
        }

        let num_slots = read_u16(data, 2) as usize;
        let num_fields = read_u16(data, 4) as usize;
        let fixed = Self::fixed_size(num_fields);
        let header_size = fixed + SlotDirectory::bitmap_size(num_slots);
        if num_slots == 0 || num_fields == 0 || header_size > data.len() {
            return Err(corrupt("bad slot or field count"));
        }

        let widths: Vec<u16> = (0..num_fields).map(|f| read_u16(data, 6 + 2 * f)).collect();
        let tuple_size: usize = widths.iter().map(|w| *w as usize).sum();
        if widths.contains(&0) || header_size + num_slots * tuple_size > data.len() {
            return Err(corrupt("columns overflow the page"));
        }

        let slots = SlotDirectory::from_bitmap(num_slots, &data[fixed..header_size]);
        Ok(Self::new(data[0], widths, slots))
    }

    fn pack(&self, data: &mut [u8]) {
        data[0] = self.flags;
        data[1] = 0;
        write_u16(data, 2, self.num_slots() as u16);
        write_u16(data, 4, self.num_fields() as u16);
        for (f, width) in self.widths.iter().enumerate() {
            write_u16(data, 6 + 2 * f, *width);
        }
        let fixed = Self::fixed_size(self.num_fields());
        data[fixed..self.header_size()].copy_from_slice(self.slots.bitmap());
    }

    fn header_size(&self) -> usize {
        Self::fixed_size(self.num_fields()) + SlotDirectory::bitmap_size(self.num_slots())
    }

    fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    fn capacity(&self) -> usize {
        self.num_slots()
    }

    fn num_tuples(&self) -> usize {
        self.slots.used()
    }

    fn has_free_tuple(&self) -> bool {
        self.slots.has_free()
    }

    fn is_occupied(&self, index: usize) -> bool {
        self.slots.is_occupied(index)
    }

    fn next_occupied(&self, from: usize) -> Option<usize> {
        self.slots.next_occupied(from)
    }

    fn allocate(&mut self) -> Option<usize> {
        self.slots.acquire()
    }

    fn remove(&mut self, _data: &mut [u8], index: usize) {
        self.slots.release(index);
    }

    fn read(&self, data: &[u8], index: usize, out: &mut [u8]) {
        let mut offset = 0;
        for field in 0..self.num_fields() {
            let width = self.width(field);
            out[offset..offset + width].copy_from_slice(&data[self.field_range(field, index)]);
            offset += width;
        }
    }

    fn write(&self, data: &mut [u8], index: usize, tuple: &[u8]) {
        let mut offset = 0;
        for field in 0..self.num_fields() {
            let width = self.width(field);
            data[self.field_range(field, index)].copy_from_slice(&tuple[offset..offset + width]);
            offset += width;
        }
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
