//! Relation to file mapping, persisted as `catalog.json` in the data directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::page::PageLayout;
use crate::record::FileId;

pub const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Relation {0} not found")]
    RelationNotFound(String),

    #[error("Relation {0} already exists")]
    RelationExists(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMetadata {
    pub name: String,
    pub file_id: FileId,
    pub file_name: String,
    pub layout: PageLayout,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    next_file_id: u32,
    relations: BTreeMap<String, RelationMetadata>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(CATALOG_FILE).exists()
    }

    pub fn load(data_dir: &Path) -> CatalogResult<Self> {
        let content = fs::read_to_string(data_dir.join(CATALOG_FILE))?;
        let catalog = serde_json::from_str(&content)?;
        Ok(catalog)
    }

    pub fn save(&self, data_dir: &Path) -> CatalogResult<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(data_dir.join(CATALOG_FILE), content)?;
        Ok(())
    }

    /// Register a relation under a fresh file id
    pub fn add_relation(&mut self, name: &str, layout: PageLayout) -> CatalogResult<&RelationMetadata> {
        if self.relations.contains_key(name) {
            return Err(CatalogError::RelationExists(name.to_string()));
        }

        let metadata = RelationMetadata {
            name: name.to_string(),
            file_id: FileId(self.next_file_id),
            file_name: format!("{}.rel", name),
            layout,
        };
        self.next_file_id += 1;
        Ok(self.relations.entry(name.to_string()).or_insert(metadata))
    }

    pub fn remove_relation(&mut self, name: &str) -> CatalogResult<RelationMetadata> {
        self.relations
            .remove(name)
            .ok_or_else(|| CatalogError::RelationNotFound(name.to_string()))
    }

    pub fn get_relation(&self, name: &str) -> CatalogResult<&RelationMetadata> {
        self.relations
            .get(name)
            .ok_or_else(|| CatalogError::RelationNotFound(name.to_string()))
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Relations in name order
    pub fn relations(&self) -> impl Iterator<Item = &RelationMetadata> {
        self.relations.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let mut catalog = Catalog::new();
        let first = catalog.add_relation("employee", PageLayout::Slotted).unwrap().file_id;
        let second = catalog.add_relation("dept", PageLayout::Columnar).unwrap().file_id;
        assert_ne!(first, second);
        assert_eq!(catalog.get_relation("employee").unwrap().file_name, "employee.rel");

        assert!(matches!(
            catalog.add_relation("employee", PageLayout::Slotted),
            Err(CatalogError::RelationExists(_))
        ));

        catalog.remove_relation("employee").unwrap();
        assert!(!catalog.has_relation("employee"));
        assert!(matches!(
            catalog.remove_relation("employee"),
            Err(CatalogError::RelationNotFound(_))
        ));

        // File ids are never reused
        let third = catalog.add_relation("employee", PageLayout::Slotted).unwrap().file_id;
        assert_ne!(third, first);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new();
        catalog.add_relation("b", PageLayout::Contiguous).unwrap();
        catalog.add_relation("a", PageLayout::Columnar).unwrap();

        assert!(!Catalog::exists(temp_dir.path()));
        catalog.save(temp_dir.path()).unwrap();
        assert!(Catalog::exists(temp_dir.path()));

        let loaded = Catalog::load(temp_dir.path()).unwrap();
        let names: Vec<&str> = loaded.relations().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(loaded.get_relation("a").unwrap().layout, PageLayout::Columnar);

        let content = fs::read_to_string(temp_dir.path().join(CATALOG_FILE)).unwrap();
        assert!(content.contains("\"columnar\""));
    }
}
