use std::collections::VecDeque;

/// Occupancy bitmap plus FIFO queue of free slots.
///
/// The queue is always derivable from the bitmap: `from_bitmap` lists free
/// slots in ascending order, and releases append to the back.
#[derive(Debug, Clone)]
pub(crate) struct SlotDirectory {
    num_slots: usize,
    bitmap: Vec<u8>,
    free: VecDeque<usize>,
}

impl SlotDirectory {
    /// Number of slots that fit in `available` bytes when every slot costs
    /// `tuple_size` bytes plus one bitmap bit
    pub fn slot_count(available: usize, tuple_size: usize) -> usize {
        if tuple_size == 0 {
            return 0;
        }
        ((available * 8) / (tuple_size * 8 + 1)).min(u16::MAX as usize)
    }

    pub fn bitmap_size(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    pub fn new(num_slots: usize) -> Self {
        Self {
            num_slots,
            bitmap: vec![0u8; Self::bitmap_size(num_slots)],
            free: (0..num_slots).collect(),
        }
    }

    pub fn from_bitmap(num_slots: usize, bitmap: &[u8]) -> Self {
        let mut bitmap = bitmap[..Self::bitmap_size(num_slots)].to_vec();
        // Ignore stray bits past the last slot
        if num_slots % 8 != 0
            && let Some(last) = bitmap.last_mut()
        {
            *last &= (1u8 << (num_slots % 8)) - 1;
        }

        let mut directory = Self {
            num_slots,
            bitmap,
            free: VecDeque::new(),
        };
        directory.free = (0..num_slots)
            .filter(|&slot| !directory.is_occupied(slot))
            .collect();
        directory
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn used(&self) -> usize {
        self.num_slots - self.free.len()
    }

    pub fn has_free(&self) -> bool {
        !self.free.is_empty()
    }

    pub fn bitmap(&self) -> &[u8] {
        &self.bitmap
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        slot < self.num_slots && self.bitmap[slot / 8] & (1 << (slot % 8)) != 0
    }

    pub fn next_occupied(&self, from: usize) -> Option<usize> {
        (from..self.num_slots).find(|&slot| self.is_occupied(slot))
    }

    /// Take the slot at the head of the free queue
    pub fn acquire(&mut self) -> Option<usize> {
        let slot = self.free.pop_front()?;
        self.bitmap[slot / 8] |= 1 << (slot % 8);
        Some(slot)
    }

    /// Return an occupied slot to the back of the free queue
    pub fn release(&mut self, slot: usize) {
        if self.is_occupied(slot) {
            self.bitmap[slot / 8] &= !(1 << (slot % 8));
            self.free.push_back(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_count_fits_bitmap() {
        // Every (available, tuple_size) pair must leave room for the bitmap
        for available in [1usize, 7, 8, 9, 63, 64, 100, 4092, 4096, 8190] {
            for tuple_size in 1usize..=64 {
                let n = SlotDirectory::slot_count(available, tuple_size);
                assert!(
                    n * tuple_size + SlotDirectory::bitmap_size(n) <= available,
                    "available={} tuple_size={} slots={}",
                    available,
                    tuple_size,
                    n
                );
            }
        }
    }

    #[test]
    fn test_slot_count_boundary() {
        assert_eq!(SlotDirectory::slot_count(4092, 16), 253);
        assert_eq!(253 * 16 + SlotDirectory::bitmap_size(253), 4080);
        // 15 one-byte tuples and a rounded-up 2-byte bitmap fill 17 bytes exactly
        assert_eq!(SlotDirectory::slot_count(17, 1), 15);
        assert_eq!(15 + SlotDirectory::bitmap_size(15), 17);
        // 15 bytes: one 14-byte tuple plus one bitmap byte is exact
        assert_eq!(SlotDirectory::slot_count(15, 14), 1);
        assert_eq!(SlotDirectory::slot_count(14, 14), 0);
    }

    #[test]
    fn test_fifo_reuse() {
        let mut slots = SlotDirectory::new(4);
        assert_eq!(slots.acquire(), Some(0));
        assert_eq!(slots.acquire(), Some(1));
        slots.release(0);
        assert_eq!(slots.acquire(), Some(2));
        assert_eq!(slots.acquire(), Some(3));
        assert_eq!(slots.acquire(), Some(0));
        assert_eq!(slots.acquire(), None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut slots = SlotDirectory::new(2);
        let slot = slots.acquire().unwrap();
        slots.release(slot);
        slots.release(slot);
        assert_eq!(slots.used(), 0);
        assert_eq!(slots.acquire(), Some(1));
        assert_eq!(slots.acquire(), Some(0));
    }

    #[test]
    fn test_rebuild_from_bitmap() {
        let mut slots = SlotDirectory::new(10);
        for _ in 0..10 {
            slots.acquire();
        }
        slots.release(7);
        slots.release(2);

        let rebuilt = SlotDirectory::from_bitmap(10, slots.bitmap());
        assert_eq!(rebuilt.used(), 8);
        assert!(!rebuilt.is_occupied(2));
        assert!(!rebuilt.is_occupied(7));
        assert_eq!(rebuilt.next_occupied(2), Some(3));

        let mut rebuilt = rebuilt;
        assert_eq!(rebuilt.acquire(), Some(2));
        assert_eq!(rebuilt.acquire(), Some(7));
    }

    #[test]
    fn test_stray_bits_ignored() {
        let rebuilt = SlotDirectory::from_bitmap(3, &[0xff]);
        assert_eq!(rebuilt.used(), 3);
        assert_eq!(rebuilt.bitmap(), &[0b111]);
    }
}
