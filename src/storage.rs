use crate::backend::IndexSettings;
use crate::document::Document;
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;

const INDEXES_TREE: &str = "indexes";
const DOCUMENTS_TREE_PREFIX: &str = "documents:";

type Result<T> = std::result::Result<T, BackendError>;

/// Index definition as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredIndex {
    pub uid: String,
    pub primary_key: String,
    pub settings: IndexSettings,
}

/// Handles are cheap to clone and share the same database
#[derive(Clone)]
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open or create a storage database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Create a database that is discarded on drop
    pub fn in_memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn documents_tree(&self, uid: &str) -> Result<sled::Tree> {
        Ok(self.db.open_tree(format!("{DOCUMENTS_TREE_PREFIX}{uid}"))?)
    }

    // ========== Index Operations ==========

    /// Save an index definition
    pub fn save_index(&self, index: &StoredIndex) -> Result<()> {
        let tree = self.db.open_tree(INDEXES_TREE)?;
        tree.insert(index.uid.as_bytes(), bincode::serialize(index)?)?;
        tree.flush()?;
        Ok(())
    }

    /// Load every index definition
    pub fn load_indexes(&self) -> Result<Vec<StoredIndex>> {
        let tree = self.db.open_tree(INDEXES_TREE)?;
        let mut indexes = Vec::new();

        for item in tree.iter() {
            let (_, value) = item?;
            indexes.push(bincode::deserialize(&value)?);
        }

        Ok(indexes)
    }

    // ========== Document Operations ==========

    /// Save `(primary key, document)` pairs in one batch
    pub fn save_documents<'a, I>(&self, uid: &str, documents: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Document)>,
    {
        let tree = self.documents_tree(uid)?;
        let mut batch = sled::Batch::default();
        for (key, doc) in documents {
            batch.insert(key.as_bytes(), bincode::serialize(doc)?);
        }
        tree.apply_batch(batch)?;
        tree.flush()?;
        Ok(())
    }

    /// Get a document by ID
    pub fn get_document(&self, uid: &str, id: &str) -> Result<Option<Document>> {
        let tree = self.documents_tree(uid)?;
        match tree.get(id.as_bytes())? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    /// Get all documents of an index
    pub fn load_documents(&self, uid: &str) -> Result<Vec<Document>> {
        let tree = self.documents_tree(uid)?;
        let mut docs = Vec::new();

        for item in tree.iter() {
            let (_, value) = item?;
            docs.push(bincode::deserialize(&value)?);
        }

        Ok(docs)
    }

    /// Count documents of an index
    pub fn count_documents(&self, uid: &str) -> Result<usize> {
        Ok(self.documents_tree(uid)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_documents() -> Result<()> {
        let storage = Storage::in_memory()?;
        let doc = Document::new("/a".to_string(), "Test".to_string(), "Content".to_string());

        storage.save_documents("docs", [("/a", &doc)])?;
        assert_eq!(storage.get_document("docs", "/a")?, Some(doc));
        assert_eq!(storage.get_document("other", "/a")?, None);
        assert_eq!(storage.count_documents("docs")?, 1);

        let updated = Document::new("/a".to_string(), "New".to_string(), "Body".to_string());
        storage.save_documents("docs", [("/a", &updated)])?;
        let docs = storage.load_documents("docs")?;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "New");
        Ok(())
    }

    #[test]
    fn test_storage_indexes() -> Result<()> {
        let storage = Storage::in_memory()?;
        let mut index = StoredIndex {
            uid: "docs".to_string(),
            primary_key: "id".to_string(),
            settings: IndexSettings::default(),
        };
        storage.save_index(&index)?;

        index.settings.searchable_attributes = vec!["title".to_string()];
        storage.save_index(&index)?;
        assert_eq!(storage.load_indexes()?, vec![index]);
        Ok(())
    }
}
