use super::core::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::index::{index_insert_all, index_remove_all};
use crate::query::telemetry;
use crate::types::DocumentId;
use std::collections::HashSet;

impl Collection {
    /// # Errors
    /// Returns an error if the collection validator rejects the document.
    pub fn insert_document(&self, document: Document) -> Result<DocumentId, DbError> {
        self.validate(&document.data)?;
        let doc_id = document.id.clone();
        {
            let mut store = self.store.write();
            index_insert_all(&mut self.indexes.write(), &document.data, &doc_id);
            store.push(document);
        }
        telemetry::log_audit("insert", &self.name_str(), &doc_id.to_string());
        Ok(doc_id)
    }

    /// Inserts the whole batch or nothing: every document is validated before any is stored.
    ///
    /// # Errors
    /// Returns the first validation failure, naming the offending batch position.
    pub fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<DocumentId>, DbError> {
        for (i, d) in documents.iter().enumerate() {
            self.validate(&d.data).map_err(|e| match e {
                DbError::InvalidDocument(msg) => {
                    DbError::InvalidDocument(format!("batch position {i}: {msg}"))
                }
                other => other,
            })?;
        }
        let mut ids = Vec::with_capacity(documents.len());
        {
            let mut store = self.store.write();
            let mut indexes = self.indexes.write();
            for d in documents {
                index_insert_all(&mut indexes, &d.data, &d.id);
                ids.push(d.id.clone());
                store.push(d);
            }
        }
        let name = self.name_str();
        for id in &ids {
            telemetry::log_audit("insert", &name, &id.to_string());
        }
        Ok(ids)
    }

    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.store.read().get(id).cloned()
    }

    /// Replaces the body of `id` with the body of `new_document`, keeping identity.
    /// Returns `Ok(false)` if no such document exists.
    ///
    /// # Errors
    /// Returns an error if the validator rejects the new body.
    pub fn update_document(&self, id: &DocumentId, new_document: Document) -> Result<bool, DbError> {
        let mut store = self.store.write();
        let Some(existing) = store.get_mut(id) else {
            return Ok(false);
        };
        let mut next = existing.clone();
        next.update(new_document.data);
        self.validate(&next.data)?;
        {
            let mut indexes = self.indexes.write();
            index_remove_all(&mut indexes, &existing.data, id);
            index_insert_all(&mut indexes, &next.data, id);
        }
        *existing = next;
        drop(store);
        telemetry::log_audit("update", &self.name_str(), &id.to_string());
        Ok(true)
    }

    pub fn delete_document(&self, id: &DocumentId) -> bool {
        let removed = {
            let mut store = self.store.write();
            let removed = store.remove(id);
            if let Some(old) = &removed {
                index_remove_all(&mut self.indexes.write(), &old.data, id);
            }
            removed
        };
        if removed.is_some() {
            telemetry::log_audit("delete", &self.name_str(), &id.to_string());
        }
        removed.is_some()
    }

    /// All live documents in natural (insertion) order.
    pub fn get_all_documents(&self) -> Vec<Document> {
        self.store.read().by_seq.values().cloned().collect()
    }

    /// Return only the IDs of all documents, in natural order, without cloning each document.
    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.store.read().by_seq.values().map(|d| d.id.clone()).collect()
    }

    /// Fetches `ids` and returns the live ones in natural order.
    pub fn documents_by_ids(&self, ids: &[DocumentId]) -> Vec<Document> {
        let wanted: HashSet<&DocumentId> = ids.iter().collect();
        let store = self.store.read();
        let mut seqs: Vec<u64> =
            wanted.iter().filter_map(|id| store.seq_of.get(*id).copied()).collect();
        seqs.sort_unstable();
        seqs.into_iter().filter_map(|s| store.by_seq.get(&s).cloned()).collect()
    }

    pub fn len(&self) -> usize {
        self.store.read().by_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
