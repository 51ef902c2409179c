use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use tracing::{debug, warn};

use super::error::{FileError, FileResult};
use super::paged_file::PagedFile;
use crate::page::Page;
use crate::record::{FileId, PageId};

type FrameId = usize;

/// One page-sized slot of the pool
struct Frame {
    /// The cached page, which owns the frame's buffer while mapped
    page: Option<Page>,
    /// The frame's buffer while unmapped
    buffer: Option<Box<[u8]>>,
    pin_count: u32,
}

impl Frame {
    fn take_buffer(&mut self, page_size: usize) -> Box<[u8]> {
        self.buffer
            .take()
            .unwrap_or_else(|| vec![0u8; page_size].into_boxed_slice())
    }

    fn unmap(&mut self) {
        if let Some(page) = self.page.take() {
            self.buffer = Some(page.into_buffer());
        }
        self.pin_count = 0;
    }
}

/// Bounded page cache with exact LRU eviction among unpinned frames.
///
/// Frame buffers are allocated once, when the pool is built, and recycled as
/// pages come and go. Misses and write-backs go to the [`PagedFile`]s
/// registered with the pool.
pub struct BufferPool {
    page_size: usize,
    frames: Vec<Frame>,
    free_frames: Vec<FrameId>,
    /// Cached pages ordered by `get_page` recency
    page_table: LruCache<PageId, FrameId>,
    files: HashMap<FileId, Rc<PagedFile>>,
}

impl BufferPool {
    /// Create a pool of `pool_size / page_size` frames
    pub fn new(page_size: usize, pool_size: usize) -> FileResult<Self> {
        let num_frames = if page_size == 0 { 0 } else { pool_size / page_size };
        let capacity = NonZeroUsize::new(num_frames).ok_or(FileError::InvalidPoolSize {
            pool_size,
            page_size,
        })?;

        let frames = (0..num_frames)
            .map(|_| Frame {
                page: None,
                buffer: Some(vec![0u8; page_size].into_boxed_slice()),
                pin_count: 0,
            })
            .collect();

        debug!(page_size, num_frames, "created buffer pool");

        Ok(Self {
            page_size,
            frames,
            // Hand out low frames first
            free_frames: (0..num_frames).rev().collect(),
            page_table: LruCache::new(capacity),
            files: HashMap::new(),
        })
    }

    /// Make a file's pages loadable through the pool
    pub fn register_file(&mut self, file: Rc<PagedFile>) -> FileResult<()> {
        if file.page_size() != self.page_size {
            return Err(FileError::InvalidPageSize {
                expected: self.page_size,
                actual: file.page_size(),
            });
        }
        self.files.insert(file.file_id(), file);
        Ok(())
    }

    /// Drop every cached page of a file without writing it back, then forget
    /// the file. Fails if one of its pages is pinned.
    pub fn discard_file(&mut self, file_id: FileId) -> FileResult<()> {
        let cached: Vec<PageId> = self
            .page_table
            .iter()
            .map(|(page_id, _)| *page_id)
            .filter(|page_id| page_id.file_id == file_id)
            .collect();

        if let Some(pinned) = cached
            .iter()
            .find(|page_id| self.pin_count(**page_id).unwrap_or(0) > 0)
        {
            return Err(FileError::PagePinned(*pinned));
        }

        for page_id in cached {
            self.discard_page(page_id)?;
        }
        self.files.remove(&file_id);
        Ok(())
    }

    fn file(&self, file_id: FileId) -> FileResult<&Rc<PagedFile>> {
        self.files
            .get(&file_id)
            .ok_or(FileError::UnknownFile(file_id))
    }

    /// Get a page, loading it on a miss. Marks the page most recently used.
    pub fn get_page(&mut self, page_id: PageId) -> FileResult<&mut Page> {
        let cached = self.page_table.get(&page_id).copied();
        let frame = match cached {
            Some(frame) => frame,
            None => self.load_page(page_id)?,
        };

        self.frames[frame]
            .page
            .as_mut()
            .ok_or(FileError::PageNotCached(page_id))
    }

    /// Peek at a cached page without touching recency
    pub fn cached_page(&self, page_id: PageId) -> Option<&Page> {
        let frame = *self.page_table.peek(&page_id)?;
        self.frames[frame].page.as_ref()
    }

    fn load_page(&mut self, page_id: PageId) -> FileResult<FrameId> {
        let file = Rc::clone(self.file(page_id.file_id)?);
        file.check_page_id(page_id)?;

        let frame = self.acquire_frame()?;
        let buffer = self.frames[frame].take_buffer(self.page_size);
        match file.read_page(page_id, buffer) {
            Ok(page) => {
                self.frames[frame].page = Some(page);
                self.frames[frame].pin_count = 0;
                self.page_table.put(page_id, frame);
                Ok(frame)
            }
            Err(e) => {
                self.free_frames.push(frame);
                Err(e)
            }
        }
    }

    /// Find a frame for a new page: a free one, else the least recently used
    /// unpinned one
    fn acquire_frame(&mut self) -> FileResult<FrameId> {
        if let Some(frame) = self.free_frames.pop() {
            return Ok(frame);
        }

        let victim = self
            .page_table
            .iter()
            .rev()
            .find(|(_, frame)| self.frames[**frame].pin_count == 0)
            .map(|(page_id, frame)| (*page_id, *frame));
        let (page_id, frame) = victim.ok_or(FileError::PoolExhausted)?;

        self.evict(page_id, frame)?;
        Ok(frame)
    }

    fn evict(&mut self, page_id: PageId, frame: FrameId) -> FileResult<()> {
        if let Some(page) = self.frames[frame].page.as_mut()
            && page.is_dirty()
        {
            let file = self
                .files
                .get(&page_id.file_id)
                .ok_or(FileError::UnknownFile(page_id.file_id))?;
            debug!(page = %page_id, "writing back dirty page on eviction");
            file.write_page(page)?;
        }

        debug!(page = %page_id, frame, "evicted page");
        self.page_table.pop(&page_id);
        self.frames[frame].unmap();
        Ok(())
    }

    fn frame_of(&self, page_id: PageId) -> FileResult<FrameId> {
        self.page_table
            .peek(&page_id)
            .copied()
            .ok_or(FileError::PageNotCached(page_id))
    }

    /// Protect a cached page from eviction
    pub fn pin_page(&mut self, page_id: PageId) -> FileResult<()> {
        let frame = self.frame_of(page_id)?;
        self.frames[frame].pin_count += 1;
        Ok(())
    }

    pub fn unpin_page(&mut self, page_id: PageId) -> FileResult<()> {
        let frame = self.frame_of(page_id)?;
        let pin_count = &mut self.frames[frame].pin_count;
        *pin_count = pin_count.saturating_sub(1);
        Ok(())
    }

    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame = *self.page_table.peek(&page_id)?;
        Some(self.frames[frame].pin_count)
    }

    /// Drop a page without writing it back. Returns whether it was cached.
    pub fn discard_page(&mut self, page_id: PageId) -> FileResult<bool> {
        let Some(frame) = self.page_table.peek(&page_id).copied() else {
            return Ok(false);
        };
        if self.frames[frame].pin_count > 0 {
            return Err(FileError::PagePinned(page_id));
        }
        if self.frames[frame].page.as_ref().is_some_and(Page::is_dirty) {
            warn!(page = %page_id, "discarding dirty page");
        }

        self.page_table.pop(&page_id);
        self.frames[frame].unmap();
        self.free_frames.push(frame);
        Ok(true)
    }

    /// Write a cached page back whether or not it is dirty. Returns whether it
    /// was cached.
    pub fn flush_page(&mut self, page_id: PageId) -> FileResult<bool> {
        let Some(frame) = self.page_table.peek(&page_id).copied() else {
            return Ok(false);
        };
        if let Some(page) = self.frames[frame].page.as_mut() {
            let file = self
                .files
                .get(&page_id.file_id)
                .ok_or(FileError::UnknownFile(page_id.file_id))?;
            file.write_page(page)?;
        }
        Ok(true)
    }

    /// Write back every dirty page and sync the registered files
    pub fn flush_all(&mut self) -> FileResult<()> {
        for frame in &mut self.frames {
            if let Some(page) = frame.page.as_mut()
                && page.is_dirty()
            {
                let file = self
                    .files
                    .get(&page.id().file_id)
                    .ok_or(FileError::UnknownFile(page.id().file_id))?;
                file.write_page(page)?;
            }
        }

        for file in self.files.values() {
            file.sync()?;
        }
        Ok(())
    }

    pub fn has_page(&self, page_id: PageId) -> bool {
        self.page_table.contains(&page_id)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of frames
    pub fn num_pages(&self) -> usize {
        self.frames.len()
    }

    pub fn num_free_pages(&self) -> usize {
        self.free_frames.len()
    }

    /// Total bytes of frame memory
    pub fn size(&self) -> usize {
        self.frames.len() * self.page_size
    }

    pub fn free_space(&self) -> usize {
        self.num_free_pages() * self.page_size
    }

    pub fn used_space(&self) -> usize {
        self.page_table.len() * self.page_size
    }

    pub fn pinned_page_count(&self) -> usize {
        self.frames.iter().filter(|f| f.pin_count > 0).count()
    }

    pub fn dirty_page_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.page.as_ref().is_some_and(Page::is_dirty))
            .count()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Flush all dirty pages when the pool is dropped
        if let Err(e) = self.flush_all() {
            warn!(error = %e, "failed to flush buffer pool on drop");
        }
    }
}
