use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::info;

use super::buffer_pool::BufferPool;
use super::error::{FileError, FileResult};
use super::storage_file::{PageIter, StorageFile, TupleIter};
use crate::catalog::{Catalog, CatalogError};
use crate::page::PageLayout;
use crate::record::{FileId, Schema, TupleId};

/// Maps relations onto storage files inside one data directory
pub struct FileManager {
    data_dir: PathBuf,
    page_size: usize,
    catalog: Catalog,
    files: HashMap<FileId, StorageFile>,
}

impl FileManager {
    /// Open (or initialize) a data directory and register every relation's
    /// file with the pool
    pub fn open<P: AsRef<Path>>(data_dir: P, pool: &mut BufferPool) -> FileResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let catalog = if Catalog::exists(&data_dir) {
            Catalog::load(&data_dir)?
        } else {
            let catalog = Catalog::new();
            catalog.save(&data_dir)?;
            catalog
        };

        let mut files = HashMap::new();
        for relation in catalog.relations() {
            let file = StorageFile::open(relation.file_id, data_dir.join(&relation.file_name))?;
            if file.layout() != relation.layout {
                return Err(FileError::LayoutMismatch {
                    expected: relation.layout,
                    actual: file.layout(),
                });
            }
            pool.register_file(Rc::clone(file.paged_file()))?;
            files.insert(relation.file_id, file);
        }

        info!(data_dir = %data_dir.display(), relations = files.len(), "opened file manager");

        Ok(Self {
            data_dir,
            page_size: pool.page_size(),
            catalog,
            files,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Relation names in sorted order
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.catalog.relations().map(|r| r.name.as_str())
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.catalog.has_relation(name)
    }

    fn check_name(name: &str) -> FileResult<()> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(FileError::InvalidRelationName(name.to_string()));
        }
        Ok(())
    }

    pub fn create_relation(
        &mut self,
        pool: &mut BufferPool,
        name: &str,
        schema: Schema,
        layout: PageLayout,
    ) -> FileResult<FileId> {
        Self::check_name(name)?;
        if self.catalog.has_relation(name) {
            return Err(CatalogError::RelationExists(name.to_string()).into());
        }

        let mut catalog = self.catalog.clone();
        let relation = catalog.add_relation(name, layout)?.clone();
        let path = self.data_dir.join(&relation.file_name);
        let file = StorageFile::create(relation.file_id, &path, self.page_size, layout, schema)?;
        pool.register_file(Rc::clone(file.paged_file()))?;

        // Undo the new file if the catalog cannot record it
        if let Err(e) = catalog.save(&self.data_dir) {
            pool.discard_file(relation.file_id)?;
            drop(file);
            std::fs::remove_file(&path)?;
            return Err(e.into());
        }
        self.catalog = catalog;
        self.files.insert(relation.file_id, file);

        info!(relation = name, file_id = %relation.file_id, layout = %layout, "created relation");
        Ok(relation.file_id)
    }

    /// Drop a relation's cached pages, forget it, and delete its file
    pub fn remove_relation(&mut self, pool: &mut BufferPool, name: &str) -> FileResult<()> {
        let relation = self.catalog.get_relation(name)?.clone();
        pool.discard_file(relation.file_id)?;

        self.catalog.remove_relation(name)?;
        self.catalog.save(&self.data_dir)?;
        if let Some(file) = self.files.remove(&relation.file_id) {
            let path = file.path().to_path_buf();
            drop(file);
            std::fs::remove_file(path)?;
        }

        info!(relation = name, file_id = %relation.file_id, "removed relation");
        Ok(())
    }

    pub fn file(&self, file_id: FileId) -> FileResult<&StorageFile> {
        self.files
            .get(&file_id)
            .ok_or(FileError::UnknownFile(file_id))
    }

    pub fn file_mut(&mut self, file_id: FileId) -> FileResult<&mut StorageFile> {
        self.files
            .get_mut(&file_id)
            .ok_or(FileError::UnknownFile(file_id))
    }

    /// The storage file behind a relation
    pub fn relation_file(&self, name: &str) -> FileResult<(FileId, &StorageFile)> {
        let file_id = self.catalog.get_relation(name)?.file_id;
        Ok((file_id, self.file(file_id)?))
    }

    pub fn relation_file_mut(&mut self, name: &str) -> FileResult<(FileId, &mut StorageFile)> {
        let file_id = self.catalog.get_relation(name)?.file_id;
        Ok((file_id, self.file_mut(file_id)?))
    }

    pub fn insert_tuple(
        &mut self,
        pool: &mut BufferPool,
        relation: &str,
        tuple: &[u8],
    ) -> FileResult<TupleId> {
        let (_, file) = self.relation_file_mut(relation)?;
        file.insert_tuple(pool, tuple)
    }

    pub fn get_tuple(&self, pool: &mut BufferPool, tuple_id: TupleId) -> FileResult<Vec<u8>> {
        self.tuple_file(tuple_id)?.get_tuple(pool, tuple_id)
    }

    pub fn delete_tuple(&mut self, pool: &mut BufferPool, tuple_id: TupleId) -> FileResult<()> {
        self.tuple_file_mut(tuple_id)?.delete_tuple(pool, tuple_id)
    }

    pub fn update_tuple(
        &mut self,
        pool: &mut BufferPool,
        tuple_id: TupleId,
        tuple: &[u8],
    ) -> FileResult<()> {
        self.tuple_file_mut(tuple_id)?
            .update_tuple(pool, tuple_id, tuple)
    }

    fn tuple_file(&self, tuple_id: TupleId) -> FileResult<&StorageFile> {
        self.files
            .get(&tuple_id.page_id.file_id)
            .ok_or(FileError::InvalidTupleId(tuple_id))
    }

    fn tuple_file_mut(&mut self, tuple_id: TupleId) -> FileResult<&mut StorageFile> {
        self.files
            .get_mut(&tuple_id.page_id.file_id)
            .ok_or(FileError::InvalidTupleId(tuple_id))
    }

    pub fn tuples<'a>(&'a self, pool: &'a mut BufferPool, relation: &str) -> FileResult<TupleIter<'a>> {
        let (_, file) = self.relation_file(relation)?;
        Ok(file.tuples(pool))
    }

    pub fn pages<'a>(&'a self, pool: &'a mut BufferPool, relation: &str) -> FileResult<PageIter<'a>> {
        let (_, file) = self.relation_file(relation)?;
        Ok(file.pages(pool))
    }
}
