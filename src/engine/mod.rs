//! Storage engine facade: one buffer pool shared by every relation's file.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, StorageConfig};
use crate::file::{BufferPool, FileError, FileManager, PageIter, StorageFile, TupleIter};
use crate::page::PageLayout;
use crate::record::{FileId, PageId, Record, RecordError, Schema, TupleId};


#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("File error: {0}")]
    FileError(#[from] FileError),

    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub struct StorageEngine {
    config: StorageConfig,
    pool: BufferPool,
    files: FileManager,
}

impl StorageEngine {
    pub fn open(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let mut pool = BufferPool::new(config.page_size, config.pool_size)?;
        let files = FileManager::open(&config.data_dir, &mut pool)?;

        info!(
            data_dir = %config.data_dir.display(),
            page_size = config.page_size,
            frames = pool.num_pages(),
            "opened storage engine"
        );

        Ok(Self {
            config,
            pool,
            files,
        })
    }

    /// Open a data directory with default settings
    pub fn open_dir<P: AsRef<Path>>(data_dir: P) -> StorageResult<Self> {
        Self::open(StorageConfig::new(data_dir))
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Create a relation with the configured default layout
    pub fn create_relation(&mut self, name: &str, schema: Schema) -> StorageResult<()> {
        let layout = self.config.default_layout;
        self.create_relation_with_layout(name, schema, layout)
    }

    pub fn create_relation_with_layout(
        &mut self,
        name: &str,
        schema: Schema,
        layout: PageLayout,
    ) -> StorageResult<()> {
        self.files
            .create_relation(&mut self.pool, name, schema, layout)?;
        Ok(())
    }

    pub fn remove_relation(&mut self, name: &str) -> StorageResult<()> {
        self.files.remove_relation(&mut self.pool, name)?;
        Ok(())
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.files.has_relation(name)
    }

    pub fn relations(&self) -> Vec<String> {
        self.files.relations().map(String::from).collect()
    }

    pub fn schema(&self, relation: &str) -> StorageResult<&Schema> {
        let (_, file) = self.relation_file(relation)?;
        Ok(file.schema())
    }

    pub fn insert_tuple(&mut self, relation: &str, tuple: &[u8]) -> StorageResult<TupleId> {
        Ok(self.files.insert_tuple(&mut self.pool, relation, tuple)?)
    }

    pub fn delete_tuple(&mut self, tuple_id: TupleId) -> StorageResult<()> {
        self.files.delete_tuple(&mut self.pool, tuple_id)?;
        Ok(())
    }

    pub fn update_tuple(&mut self, tuple_id: TupleId, tuple: &[u8]) -> StorageResult<()> {
        self.files.update_tuple(&mut self.pool, tuple_id, tuple)?;
        Ok(())
    }

    pub fn get_tuple(&mut self, tuple_id: TupleId) -> StorageResult<Vec<u8>> {
        Ok(self.files.get_tuple(&mut self.pool, tuple_id)?)
    }

    /// Encode a record with the relation's schema and insert it
    pub fn insert_record(&mut self, relation: &str, record: &Record) -> StorageResult<TupleId> {
        let tuple = self.schema(relation)?.pack(record)?;
        self.insert_tuple(relation, &tuple)
    }

    pub fn get_record(&mut self, tuple_id: TupleId) -> StorageResult<Record> {
        let tuple = self.get_tuple(tuple_id)?;
        let file = self.files.file(tuple_id.page_id.file_id)?;
        Ok(file.schema().unpack(&tuple)?)
    }

    /// Every tuple of a relation in page order
    pub fn tuples(&mut self, relation: &str) -> StorageResult<TupleIter<'_>> {
        Ok(self.files.tuples(&mut self.pool, relation)?)
    }

    pub fn pages(&mut self, relation: &str) -> StorageResult<PageIter<'_>> {
        Ok(self.files.pages(&mut self.pool, relation)?)
    }

    /// A relation's file id and storage file, for page-level access
    pub fn relation_file(&self, relation: &str) -> StorageResult<(FileId, &StorageFile)> {
        Ok(self.files.relation_file(relation)?)
    }

    /// A relation's file together with the pool its pages go through
    pub fn relation_file_mut(
        &mut self,
        relation: &str,
    ) -> StorageResult<(&mut StorageFile, &mut BufferPool)> {
        let (_, file) = self.files.relation_file_mut(relation)?;
        Ok((file, &mut self.pool))
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn buffer_pool_mut(&mut self) -> &mut BufferPool {
        &mut self.pool
    }

    pub fn pin_page(&mut self, page_id: PageId) -> StorageResult<()> {
        self.pool.pin_page(page_id)?;
        Ok(())
    }

    pub fn unpin_page(&mut self, page_id: PageId) -> StorageResult<()> {
        self.pool.unpin_page(page_id)?;
        Ok(())
    }

    pub fn discard_page(&mut self, page_id: PageId) -> StorageResult<bool> {
        Ok(self.pool.discard_page(page_id)?)
    }

    pub fn flush_page(&mut self, page_id: PageId) -> StorageResult<bool> {
        Ok(self.pool.flush_page(page_id)?)
    }

    /// Free frames in the buffer pool
    pub fn num_free_pages(&self) -> usize {
        self.pool.num_free_pages()
    }

    pub fn flush(&mut self) -> StorageResult<()> {
        self.pool.flush_all()?;
        Ok(())
    }
}
