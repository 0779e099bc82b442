use super::core::Collection;
use crate::errors::DbError;
use crate::index::{IndexDescriptor, IndexSpec};

impl Collection {
    /// Declares an index and builds it from the current documents.
    /// Re-declaring an existing key set returns the existing name.
    ///
    /// # Errors
    /// Returns an error if the key specification is invalid.
    pub fn create_index(&self, spec: IndexSpec) -> Result<String, DbError> {
        let store = self.store.read();
        let mut mgr = self.indexes.write();
        let (name, created) = mgr.create_index(spec)?;
        if !created {
            return Ok(name);
        }
        let start = std::time::Instant::now();
        if let Some(idx) = mgr.indexes.get_mut(&name) {
            for doc in store.by_seq.values() {
                idx.insert(&doc.data, &doc.id);
            }
            idx.stats.build_time_ms = start.elapsed().as_millis();
        }
        log::info!("collection {} built index {name} over {} documents", self.name_str(), store.by_seq.len());
        Ok(name)
    }

    pub fn drop_index(&self, name: &str) -> bool {
        self.indexes.write().drop_index(name)
    }

    pub fn list_indexes(&self) -> Vec<IndexDescriptor> {
        self.indexes.read().descriptors()
    }
}
