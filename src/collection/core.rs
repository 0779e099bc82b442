use crate::document::Document;
use crate::errors::DbError;
use crate::index::IndexManager;
use bson::Document as BsonDocument;
use crate::types::DocumentId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Document check run on every insert and on the result of every update.
pub type Validator = Arc<dyn Fn(&BsonDocument) -> Result<(), DbError> + Send + Sync>;

/// Live documents keyed by insertion sequence; iteration order is natural order.
#[derive(Debug, Default)]
pub(crate) struct DocStore {
    pub(crate) next_seq: u64,
    pub(crate) by_seq: BTreeMap<u64, Document>,
    pub(crate) seq_of: HashMap<DocumentId, u64>,
}

impl DocStore {
    pub(crate) fn push(&mut self, doc: Document) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_of.insert(doc.id.clone(), seq);
        self.by_seq.insert(seq, doc);
    }

    pub(crate) fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.seq_of.get(id).and_then(|s| self.by_seq.get(s))
    }

    pub(crate) fn get_mut(&mut self, id: &DocumentId) -> Option<&mut Document> {
        let seq = *self.seq_of.get(id)?;
        self.by_seq.get_mut(&seq)
    }

    pub(crate) fn remove(&mut self, id: &DocumentId) -> Option<Document> {
        let seq = self.seq_of.remove(id)?;
        self.by_seq.remove(&seq)
    }
}

pub struct Collection {
    pub name: Arc<RwLock<String>>,
    pub(crate) store: RwLock<DocStore>,
    pub indexes: RwLock<IndexManager>,
    pub(crate) validator: RwLock<Option<Validator>>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name_str())
            .field("docs", &self.store.read().by_seq.len())
            .field("validated", &self.validator.read().is_some())
            .finish_non_exhaustive()
    }
}

impl Collection {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name: Arc::new(RwLock::new(name)),
            store: RwLock::new(DocStore::default()),
            indexes: RwLock::new(IndexManager::new()),
            validator: RwLock::new(None),
        }
    }

    pub fn set_name(&self, new_name: String) {
        *self.name.write() = new_name;
    }

    pub fn set_validator(&self, validator: Validator) {
        *self.validator.write() = Some(validator);
    }

    pub(crate) fn validate(&self, data: &BsonDocument) -> Result<(), DbError> {
        match self.validator.read().as_ref() {
            Some(v) => v(data),
            None => Ok(()),
        }
    }

    /// Returns the collection's name as a String (cloned), hiding the `RwLock`.
    pub fn name_str(&self) -> String {
        self.name.read().clone()
    }
}
