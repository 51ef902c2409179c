use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, warn};

use super::buffer_pool::BufferPool;
use super::error::{FileError, FileResult};
use super::header::FileHeader;
use super::paged_file::PagedFile;
use crate::page::{Page, PageHeader, PageLayout};
use crate::record::{FileId, PageId, Schema, TupleId};

/// A relation's backing file: the paged file plus the set of pages that still
/// have room for a tuple.
///
/// Tuple operations go through the buffer pool and write the touched page
/// back immediately.
pub struct StorageFile {
    file: Rc<PagedFile>,
    free_pages: BTreeSet<PageId>,
}

impl StorageFile {
    /// Create a new, empty storage file
    pub fn create<P: AsRef<Path>>(
        file_id: FileId,
        path: P,
        page_size: usize,
        layout: PageLayout,
        schema: Schema,
    ) -> FileResult<Self> {
        let header = FileHeader::new(page_size, layout, schema)?;
        let file = PagedFile::create(file_id, path, header)?;
        Ok(Self {
            file: Rc::new(file),
            free_pages: BTreeSet::new(),
        })
    }

    /// Open an existing storage file, rebuilding the free-page set from the
    /// page headers on disk
    pub fn open<P: AsRef<Path>>(file_id: FileId, path: P) -> FileResult<Self> {
        let file = PagedFile::open(file_id, path)?;

        let mut free_pages = BTreeSet::new();
        for page_index in 0..file.num_pages() {
            let page_id = file.page_id(page_index);
            if file.read_page_header(page_id)?.has_free_tuple() {
                free_pages.insert(page_id);
            }
        }

        Ok(Self {
            file: Rc::new(file),
            free_pages,
        })
    }

    /// The shared paged file, for registering with a buffer pool
    pub fn paged_file(&self) -> &Rc<PagedFile> {
        &self.file
    }

    pub fn file_id(&self) -> FileId {
        self.file.file_id()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn header(&self) -> &FileHeader {
        self.file.header()
    }

    pub fn schema(&self) -> &Schema {
        self.file.schema()
    }

    pub fn layout(&self) -> PageLayout {
        self.file.layout()
    }

    pub fn page_size(&self) -> usize {
        self.file.page_size()
    }

    /// Length of the file header in bytes
    pub fn header_size(&self) -> usize {
        self.file.header().size()
    }

    pub fn num_pages(&self) -> u32 {
        self.file.num_pages()
    }

    pub fn size(&self) -> FileResult<u64> {
        self.file.size()
    }

    pub fn page_id(&self, page_index: u32) -> PageId {
        self.file.page_id(page_index)
    }

    pub fn page_offset(&self, page_id: PageId) -> u64 {
        self.file.page_offset(page_id)
    }

    pub fn valid_page_id(&self, page_id: PageId) -> bool {
        self.file.valid_page_id(page_id)
    }

    /// Pages with at least one free tuple position, in page order
    pub fn free_pages(&self) -> impl Iterator<Item = PageId> + '_ {
        self.free_pages.iter().copied()
    }

    /// Read a page header straight from disk
    pub fn read_page_header(&self, page_id: PageId) -> FileResult<PageHeader> {
        self.file.read_page_header(page_id)
    }

    /// Write only a page's header region
    pub fn write_page_header(&self, page: &mut Page) -> FileResult<()> {
        self.file.write_page_header(page)
    }

    /// Read a page straight from disk, bypassing any cached copy
    pub fn read_page(&self, page_id: PageId) -> FileResult<Page> {
        let buffer = vec![0u8; self.page_size()].into_boxed_slice();
        self.file.read_page(page_id, buffer)
    }

    pub fn write_page(&self, page: &mut Page) -> FileResult<()> {
        self.file.write_page(page)
    }

    /// Append a freshly initialized page and register it as free
    pub fn allocate_page(&mut self) -> FileResult<PageId> {
        let page_id = self.file.append_page()?;
        self.free_pages.insert(page_id);
        Ok(page_id)
    }

    /// First page with room for a tuple, allocating one if none has room
    pub fn available_page(&mut self) -> FileResult<PageId> {
        match self.free_pages.first() {
            Some(page_id) => Ok(*page_id),
            None => self.allocate_page(),
        }
    }

    fn check_tuple(&self, tuple: &[u8]) -> FileResult<()> {
        if tuple.len() != self.schema().size() {
            return Err(FileError::SchemaMismatch {
                expected: self.schema().size(),
                actual: tuple.len(),
            });
        }
        Ok(())
    }

    fn check_tuple_id(&self, tuple_id: TupleId) -> FileResult<()> {
        if tuple_id.page_id.file_id != self.file_id() {
            return Err(FileError::InvalidTupleId(tuple_id));
        }
        self.file.check_page_id(tuple_id.page_id)
    }

    /// Keep the free-page set in step with a page's occupancy
    fn sync_free_page(&mut self, page_id: PageId, has_free: bool) {
        if has_free {
            self.free_pages.insert(page_id);
        } else {
            self.free_pages.remove(&page_id);
        }
    }

    pub fn insert_tuple(&mut self, pool: &mut BufferPool, tuple: &[u8]) -> FileResult<TupleId> {
        self.check_tuple(tuple)?;

        loop {
            let page_id = self.available_page()?;
            let page = pool.get_page(page_id)?;
            if !page.has_free_tuple() {
                // Stale entry, drop it and look again
                self.free_pages.remove(&page_id);
                continue;
            }

            let tuple_id = page.insert_tuple(tuple)?;
            self.write_through(pool, page_id)?;
            return Ok(tuple_id);
        }
    }

    pub fn get_tuple(&self, pool: &mut BufferPool, tuple_id: TupleId) -> FileResult<Vec<u8>> {
        self.check_tuple_id(tuple_id)?;
        let page = pool.get_page(tuple_id.page_id)?;
        Ok(page.get_tuple(tuple_id)?)
    }

    pub fn delete_tuple(&mut self, pool: &mut BufferPool, tuple_id: TupleId) -> FileResult<()> {
        self.check_tuple_id(tuple_id)?;
        let page = pool.get_page(tuple_id.page_id)?;
        page.delete_tuple(tuple_id)?;
        self.write_through(pool, tuple_id.page_id)
    }

    pub fn update_tuple(
        &mut self,
        pool: &mut BufferPool,
        tuple_id: TupleId,
        tuple: &[u8],
    ) -> FileResult<()> {
        self.check_tuple(tuple)?;
        self.check_tuple_id(tuple_id)?;
        pool.get_page(tuple_id.page_id)?.put_tuple(tuple_id, tuple)?;
        self.write_through(pool, tuple_id.page_id)
    }

    /// Write a page just changed in the pool back to disk and bring the
    /// free-page set in line with it.
    ///
    /// If the write fails the cached copy is dropped, so neither the pool nor
    /// the free-page set keeps a change the caller was told had failed. A
    /// pinned page cannot be dropped; it stays cached and dirty and the
    /// free-page set follows the cached copy.
    fn write_through(&mut self, pool: &mut BufferPool, page_id: PageId) -> FileResult<()> {
        let has_free = pool
            .cached_page(page_id)
            .ok_or(FileError::PageNotCached(page_id))?
            .has_free_tuple();

        if let Err(e) = pool.flush_page(page_id) {
            if let Err(discard) = pool.discard_page(page_id) {
                warn!(page = %page_id, error = %discard, "keeping unwritten page in pool");
                self.sync_free_page(page_id, has_free);
            }
            return Err(e);
        }
        self.sync_free_page(page_id, has_free);
        Ok(())
    }

    /// Page headers in page order, taken from the pool when cached
    pub fn headers<'a>(&'a self, pool: &'a BufferPool) -> HeaderIter<'a> {
        HeaderIter {
            file: &self.file,
            pool,
            next: 0,
        }
    }

    /// Snapshots of every page, loaded through the pool.
    ///
    /// The yielded pages are read-only copies: changing one does not touch
    /// the cached page. Use [`StorageFile::for_each_page`] to work on the
    /// pool's copy in place.
    pub fn pages<'a>(&'a self, pool: &'a mut BufferPool) -> PageIter<'a> {
        PageIter {
            file: &self.file,
            pool,
            next: 0,
        }
    }

    /// Visit every page in place, in page order, through the pool.
    ///
    /// Pages changed by `visit` stay dirty in the pool until they are evicted
    /// or flushed; the free-page set is brought up to date after each visit.
    pub fn for_each_page<F>(&mut self, pool: &mut BufferPool, mut visit: F) -> FileResult<()>
    where
        F: FnMut(PageId, &mut Page) -> FileResult<()>,
    {
        for page_index in 0..self.num_pages() {
            let page_id = self.page_id(page_index);
            let page = pool.get_page(page_id)?;
            let result = visit(page_id, &mut *page);
            let has_free = page.has_free_tuple();
            self.sync_free_page(page_id, has_free);
            result?;
        }
        Ok(())
    }

    /// Every page read straight from disk
    pub fn direct_pages(&self) -> DirectPageIter<'_> {
        DirectPageIter {
            file: &self.file,
            next: 0,
        }
    }

    /// Every tuple of the file in page order
    pub fn tuples<'a>(&'a self, pool: &'a mut BufferPool) -> TupleIter<'a> {
        TupleIter {
            file: &self.file,
            pool,
            next_page: 0,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Write back this file's cached pages and sync it to disk
    pub fn flush(&self, pool: &mut BufferPool) -> FileResult<()> {
        for page_index in 0..self.num_pages() {
            let page_id = self.page_id(page_index);
            if pool.cached_page(page_id).is_some_and(Page::is_dirty) {
                pool.flush_page(page_id)?;
            }
        }
        self.file.sync()?;
        debug!(file_id = %self.file_id(), "flushed storage file");
        Ok(())
    }
}

/// Iterator over page headers
pub struct HeaderIter<'a> {
    file: &'a PagedFile,
    pool: &'a BufferPool,
    next: u32,
}

impl Iterator for HeaderIter<'_> {
    type Item = FileResult<(PageId, PageHeader)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.file.num_pages() {
            return None;
        }
        let page_id = self.file.page_id(self.next);
        self.next += 1;

        let header = match self.pool.cached_page(page_id) {
            Some(page) => Ok(page.header().clone()),
            None => self.file.read_page_header(page_id),
        };
        Some(header.map(|h| (page_id, h)))
    }
}

/// Iterator over pages loaded through the buffer pool
pub struct PageIter<'a> {
    file: &'a PagedFile,
    pool: &'a mut BufferPool,
    next: u32,
}

impl Iterator for PageIter<'_> {
    type Item = FileResult<(PageId, Page)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.file.num_pages() {
            return None;
        }
        let page_id = self.file.page_id(self.next);
        self.next += 1;

        Some(
            self.pool
                .get_page(page_id)
                .map(|page| (page_id, page.clone())),
        )
    }
}

/// Iterator over pages read without the buffer pool
pub struct DirectPageIter<'a> {
    file: &'a PagedFile,
    next: u32,
}

impl Iterator for DirectPageIter<'_> {
    type Item = FileResult<(PageId, Page)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.file.num_pages() {
            return None;
        }
        let page_id = self.file.page_id(self.next);
        self.next += 1;

        let buffer = vec![0u8; self.file.page_size()].into_boxed_slice();
        Some(self.file.read_page(page_id, buffer).map(|page| (page_id, page)))
    }
}

/// Iterator over tuples, fetching one page at a time through the pool
pub struct TupleIter<'a> {
    file: &'a PagedFile,
    pool: &'a mut BufferPool,
    next_page: u32,
    pending: VecDeque<Vec<u8>>,
    done: bool,
}

impl Iterator for TupleIter<'_> {
    type Item = FileResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tuple) = self.pending.pop_front() {
                return Some(Ok(tuple));
            }
            if self.done || self.next_page >= self.file.num_pages() {
                return None;
            }

            let page_id = self.file.page_id(self.next_page);
            self.next_page += 1;
            match self.pool.get_page(page_id) {
                Ok(page) => self.pending.extend(page.tuples()),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
