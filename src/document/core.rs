use crate::document::types::Metadata;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

/// Field name under which the store-assigned identifier is exposed.
pub const ID_FIELD: &str = "_id";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    /// Wraps `data` under a fresh identifier. Any caller-supplied `_id` is replaced;
    /// identifiers are owned by the store.
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        let id = DocumentId::new();
        Self { data: with_id(&id, data), id, metadata: Metadata::new() }
    }

    /// Replaces the body while keeping identity, re-stamping `_id`.
    pub fn update(&mut self, new_data: BsonDocument) {
        self.data = with_id(&self.id, new_data);
        self.metadata.touch();
    }

    /// The body without the `_id` field.
    #[must_use]
    pub fn body(&self) -> BsonDocument {
        let mut out = self.data.clone();
        out.remove(ID_FIELD);
        out
    }
}

fn with_id(id: &DocumentId, data: BsonDocument) -> BsonDocument {
    let mut out = BsonDocument::new();
    out.insert(ID_FIELD, Bson::String(id.to_string()));
    for (k, v) in data {
        if k != ID_FIELD {
            out.insert(k, v);
        }
    }
    out
}
