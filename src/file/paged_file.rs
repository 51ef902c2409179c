use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{FileError, FileResult};
use super::header::FileHeader;
use crate::page::{Page, PageHeader, PageLayout};
use crate::record::{FileId, PageId, Schema};

/// A header-prefixed sequence of fixed-size pages on disk.
///
/// All I/O goes through `&File`, so a `PagedFile` can be shared between a
/// storage file and the buffer pool. The page count is the only state that
/// changes after open.
#[derive(Debug)]
pub struct PagedFile {
    file_id: FileId,
    path: PathBuf,
    file: File,
    header: FileHeader,
    num_pages: Cell<u32>,
}

impl PagedFile {
    /// Create a new file and write its header
    pub fn create<P: AsRef<Path>>(file_id: FileId, path: P, header: FileHeader) -> FileResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&header.pack())?;
        file.sync_all()?;

        debug!(file_id = %file_id, path = %path.display(), layout = %header.layout(), "created paged file");

        Ok(Self {
            file_id,
            path: path.to_path_buf(),
            file,
            header,
            num_pages: Cell::new(0),
        })
    }

    /// Open an existing file and read its header
    pub fn open<P: AsRef<Path>>(file_id: FileId, path: P) -> FileResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FileError::FileNotFound(path.display().to_string()));
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let header = FileHeader::from_reader(&mut file)?;

        let len = file.metadata()?.len() as usize;
        let num_pages = len.saturating_sub(header.size()) / header.page_size();
        let num_pages = u32::try_from(num_pages)
            .map_err(|_| FileError::CorruptHeader(format!("{} pages exceed u32", num_pages)))?;

        debug!(file_id = %file_id, path = %path.display(), num_pages, "opened paged file");

        Ok(Self {
            file_id,
            path: path.to_path_buf(),
            file,
            header,
            num_pages: Cell::new(num_pages),
        })
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn schema(&self) -> &Schema {
        self.header.schema()
    }

    pub fn layout(&self) -> PageLayout {
        self.header.layout()
    }

    pub fn page_size(&self) -> usize {
        self.header.page_size()
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.get()
    }

    /// Bytes currently on disk
    pub fn size(&self) -> FileResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn page_id(&self, page_index: u32) -> PageId {
        PageId::new(self.file_id, page_index)
    }

    pub fn page_offset(&self, page_id: PageId) -> u64 {
        self.header.size() as u64 + self.page_size() as u64 * page_id.page_index as u64
    }

    pub fn valid_page_id(&self, page_id: PageId) -> bool {
        page_id.file_id == self.file_id && page_id.page_index < self.num_pages()
    }

    pub fn check_page_id(&self, page_id: PageId) -> FileResult<()> {
        if !self.valid_page_id(page_id) {
            return Err(FileError::InvalidPageId(page_id));
        }
        Ok(())
    }

    /// Check that a page belongs here and matches the file's layout and schema
    fn check_page(&self, page: &Page) -> FileResult<()> {
        self.check_page_id(page.id())?;
        if page.layout() != self.layout() {
            return Err(FileError::LayoutMismatch {
                expected: self.layout(),
                actual: page.layout(),
            });
        }
        if page.tuple_size() != self.schema().size() {
            return Err(FileError::SchemaMismatch {
                expected: self.schema().size(),
                actual: page.tuple_size(),
            });
        }
        if page.page_size() != self.page_size() {
            return Err(FileError::InvalidPageSize {
                expected: self.page_size(),
                actual: page.page_size(),
            });
        }
        Ok(())
    }

    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> FileResult<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buffer)?;
        Ok(())
    }

    fn write_at(&self, offset: u64, buffer: &[u8]) -> FileResult<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buffer)?;
        Ok(())
    }

    /// Read a page into `buffer` and decode it
    pub fn read_page(&self, page_id: PageId, mut buffer: Box<[u8]>) -> FileResult<Page> {
        self.check_page_id(page_id)?;
        if buffer.len() != self.page_size() {
            return Err(FileError::InvalidPageSize {
                expected: self.page_size(),
                actual: buffer.len(),
            });
        }

        self.read_at(self.page_offset(page_id), &mut buffer)?;
        Ok(Page::unpack(page_id, self.layout(), buffer)?)
    }

    /// Decode only the header of a page on disk
    pub fn read_page_header(&self, page_id: PageId) -> FileResult<PageHeader> {
        let buffer = vec![0u8; self.page_size()].into_boxed_slice();
        let page = self.read_page(page_id, buffer)?;
        Ok(page.header().clone())
    }

    /// Write a whole page. The page is marked clean once the bytes are out.
    pub fn write_page(&self, page: &mut Page) -> FileResult<()> {
        self.check_page(page)?;
        let offset = self.page_offset(page.id());

        let was_dirty = page.is_dirty();
        page.set_dirty(false);
        if let Err(e) = self.write_at(offset, page.pack()) {
            page.set_dirty(was_dirty);
            return Err(e);
        }
        Ok(())
    }

    /// Write only the serialized header region of a page
    pub fn write_page_header(&self, page: &mut Page) -> FileResult<()> {
        self.check_page(page)?;
        let offset = self.page_offset(page.id());
        let header_size = page.header_size();
        self.write_at(offset, &page.pack()[..header_size])
    }

    /// Append a freshly initialized page and return its id
    pub fn append_page(&self) -> FileResult<PageId> {
        let page_id = self.page_id(self.num_pages());
        let buffer = vec![0u8; self.page_size()].into_boxed_slice();
        let mut page = Page::initialize(page_id, self.layout(), self.schema(), buffer)?;

        self.write_at(self.page_offset(page_id), page.pack())?;
        self.num_pages.set(self.num_pages() + 1);

        debug!(page = %page_id, "allocated page");
        Ok(page_id)
    }

    /// Flush OS buffers for this file
    pub fn sync(&self) -> FileResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn header(layout: PageLayout) -> FileHeader {
        let schema = Schema::from_pairs("t", &[("id", "int"), ("age", "int")]).unwrap();
        FileHeader::new(512, layout, schema).unwrap()
    }

    #[test]
    fn test_create_file_already_exists() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("t.rel");

        PagedFile::create(FileId(0), &path, header(PageLayout::Slotted)).unwrap();
        let result = PagedFile::create(FileId(0), &path, header(PageLayout::Slotted));
        assert!(matches!(result, Err(FileError::FileAlreadyExists(_))));
    }

    #[test]
    fn test_open_nonexistent_file() {
        let temp_dir = setup_test_dir();
        let result = PagedFile::open(FileId(0), temp_dir.path().join("missing.rel"));
        assert!(matches!(result, Err(FileError::FileNotFound(_))));
    }

    #[test]
    fn test_open_reads_header_and_page_count() {
        let temp_dir = setup_test_dir();
        let path = temp_dir.path().join("nested/dir/t.rel");

        let file = PagedFile::create(FileId(3), &path, header(PageLayout::Columnar)).unwrap();
        file.append_page().unwrap();
        file.append_page().unwrap();
        let header_size = file.header().size() as u64;
        assert_eq!(file.size().unwrap(), header_size + 2 * 512);
        drop(file);

        let file = PagedFile::open(FileId(3), &path).unwrap();
        assert_eq!(file.num_pages(), 2);
        assert_eq!(file.layout(), PageLayout::Columnar);
        assert_eq!(file.page_size(), 512);
        assert_eq!(file.page_offset(file.page_id(1)), header_size + 512);
    }

    #[test]
    fn test_read_write_page() {
        let temp_dir = setup_test_dir();
        let file = PagedFile::create(
            FileId(0),
            temp_dir.path().join("t.rel"),
            header(PageLayout::Slotted),
        )
        .unwrap();
        let page_id = file.append_page().unwrap();

        let buffer = vec![0u8; 512].into_boxed_slice();
        let mut page = file.read_page(page_id, buffer).unwrap();
        let tuple_id = page.insert_tuple(&[7u8; 8]).unwrap();
        assert!(page.is_dirty());
        file.write_page(&mut page).unwrap();
        assert!(!page.is_dirty());

        let buffer = vec![0u8; 512].into_boxed_slice();
        let page = file.read_page(page_id, buffer).unwrap();
        assert_eq!(page.get_tuple(tuple_id).unwrap(), vec![7u8; 8]);
        assert_eq!(file.read_page_header(page_id).unwrap().num_tuples(), 1);
    }

    #[test]
    fn test_invalid_page_id() {
        let temp_dir = setup_test_dir();
        let file = PagedFile::create(
            FileId(0),
            temp_dir.path().join("t.rel"),
            header(PageLayout::Slotted),
        )
        .unwrap();
        file.append_page().unwrap();

        let beyond = file.page_id(1);
        let buffer = vec![0u8; 512].into_boxed_slice();
        assert!(matches!(
            file.read_page(beyond, buffer),
            Err(FileError::InvalidPageId(_))
        ));

        let foreign = PageId::new(FileId(9), 0);
        assert!(!file.valid_page_id(foreign));
    }

    #[test]
    fn test_write_rejects_foreign_layout() {
        let temp_dir = setup_test_dir();
        let file = PagedFile::create(
            FileId(0),
            temp_dir.path().join("t.rel"),
            header(PageLayout::Slotted),
        )
        .unwrap();
        let page_id = file.append_page().unwrap();

        let buffer = vec![0u8; 512].into_boxed_slice();
        let mut page =
            Page::initialize(page_id, PageLayout::Contiguous, file.schema(), buffer).unwrap();
        assert!(matches!(
            file.write_page(&mut page),
            Err(FileError::LayoutMismatch { .. })
        ));

        let other = Schema::from_pairs("o", &[("x", "float")]).unwrap();
        let buffer = vec![0u8; 512].into_boxed_slice();
        let mut page = Page::initialize(page_id, PageLayout::Slotted, &other, buffer).unwrap();
        assert!(matches!(
            file.write_page(&mut page),
            Err(FileError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_write_page_header_only() {
        let temp_dir = setup_test_dir();
        let file = PagedFile::create(
            FileId(0),
            temp_dir.path().join("t.rel"),
            header(PageLayout::Slotted),
        )
        .unwrap();
        let page_id = file.append_page().unwrap();

        let buffer = vec![0u8; 512].into_boxed_slice();
        let mut page = file.read_page(page_id, buffer).unwrap();
        let tuple_id = page.insert_tuple(&[5u8; 8]).unwrap();
        file.write_page_header(&mut page).unwrap();

        // Occupancy reached disk, tuple bytes did not
        let buffer = vec![0u8; 512].into_boxed_slice();
        let reread = file.read_page(page_id, buffer).unwrap();
        assert_eq!(reread.num_tuples(), 1);
        assert_eq!(reread.get_tuple(tuple_id).unwrap(), vec![0u8; 8]);
    }
}
