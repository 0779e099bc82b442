use crate::collection::Collection;
use crate::errors::DbError;
use crate::types::CollectionName;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory registry of named collections.
#[derive(Debug, Default)]
pub struct Engine {
    pub(crate) collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named collection, creating it if it does not exist.
    pub fn create_collection(&self, name: CollectionName) -> Arc<Collection> {
        let mut cols = self.collections.write();
        if let Some(existing) = cols.get(&name) {
            return Arc::clone(existing);
        }
        log::info!("creating collection {name}");
        let col = Arc::new(Collection::new(name.clone()));
        cols.insert(name, Arc::clone(&col));
        col
    }

    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        let removed = self.collections.write().remove(name).is_some();
        if removed {
            log::info!("dropped collection {name}");
        }
        removed
    }

    /// Names in lexicographic order.
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// # Errors
    /// Fails if `old` does not exist or `new` is already taken.
    pub fn rename_collection(&self, old: &str, new: &str) -> Result<(), DbError> {
        let mut cols = self.collections.write();
        if cols.contains_key(new) {
            return Err(DbError::CollectionAlreadyExists(new.to_string()));
        }
        let col = cols.remove(old).ok_or_else(|| DbError::NoSuchCollection(old.to_string()))?;
        col.set_name(new.to_string());
        cols.insert(new.to_string(), col);
        log::info!("renamed collection {old} -> {new}");
        Ok(())
    }
}
