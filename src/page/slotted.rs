use super::slots::SlotDirectory;
use super::{
    DIRTY_FLAG, PageError, PageFormat, PageLayout, PageResult, check_page_size, read_u16,
    write_u16,
};
use crate::record::Schema;

/// Header of a slotted page: a fixed slot count, an occupancy bitmap and a
/// FIFO queue of free slots. Slot numbers never move.
///
/// Serialized as `flags u8 | pad u8 | num_slots u16 | tuple_size u16 | bitmap`.
#[derive(Debug, Clone)]
pub struct SlottedHeader {
    flags: u8,
    tuple_size: u16,
    slots: SlotDirectory,
}

impl SlottedHeader {
    /// Header bytes before the bitmap
    pub const FIXED_SIZE: usize = 6;

    pub fn num_slots(&self) -> usize {
        self.slots.num_slots()
    }

    pub fn slot_offset(&self, slot: usize) -> usize {
        self.header_size() + slot * self.tuple_size()
    }
}

impl PageFormat for SlottedHeader {
    const LAYOUT: PageLayout = PageLayout::Slotted;

    fn initialize(data: &mut [u8], schema: &Schema) -> PageResult<Self> {
        check_page_size(data.len())?;
        let available = data.len().saturating_sub(Self::FIXED_SIZE);
        let num_slots = SlotDirectory::slot_count(available, schema.size());
        if num_slots == 0 {
            return Err(PageError::TupleTooLarge {
                tuple_size: schema.size(),
                page_size: data.len(),
            });
        }

        let header = Self {
            flags: 0,
            // A tuple wider than u16 cannot produce a nonzero slot count
            tuple_size: schema.size() as u16,
            slots: SlotDirectory::new(num_slots),
        };
        header.pack(data);
        Ok(header)
    }

    fn unpack(data: &[u8]) -> PageResult<Self> {
        if data.len() < Self::FIXED_SIZE {
            return Err(PageError::Corrupt(format!(
                "{} bytes is too short for a slotted page header",
                data.len()
            )));
        }

        let num_slots = read_u16(data, 2) as usize;
        let tuple_size = read_u16(data, 4);
        let header_size = Self::FIXED_SIZE + SlotDirectory::bitmap_size(num_slots);
        if num_slots == 0
            || tuple_size == 0
            || header_size + num_slots * tuple_size as usize > data.len()
        {
            return Err(PageError::Corrupt(format!(
                "inconsistent slotted header: num_slots={} tuple_size={} buffer={}",
                num_slots,
                tuple_size,
                data.len()
            )));
        }

        Ok(Self {
            flags: data[0],
            tuple_size,
            slots: SlotDirectory::from_bitmap(num_slots, &data[Self::FIXED_SIZE..header_size]),
        })
    }

    fn pack(&self, data: &mut [u8]) {
        data[0] = self.flags;
        data[1] = 0;
        write_u16(data, 2, self.num_slots() as u16);
        write_u16(data, 4, self.tuple_size);
        data[Self::FIXED_SIZE..self.header_size()].copy_from_slice(self.slots.bitmap());
    }

    fn header_size(&self) -> usize {
        Self::FIXED_SIZE + SlotDirectory::bitmap_size(self.num_slots())
    }

    fn tuple_size(&self) -> usize {
        self.tuple_size as usize
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
        let start = self.slot_offset(index);
        out.copy_from_slice(&data[start..start + self.tuple_size()]);
    }

    fn write(&self, data: &mut [u8], index: usize, tuple: &[u8]) {
        let start = self.slot_offset(index);
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
