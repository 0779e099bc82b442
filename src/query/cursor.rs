use crate::document::Document;
use bson::Document as BsonDocument;

/// Forward-only sequence over the result of one find.
#[derive(Debug, Clone)]
pub struct Cursor {
    pub(crate) docs: Vec<Document>,
    pub(crate) pos: usize,
}

impl Cursor {
    pub(crate) const fn new(docs: Vec<Document>) -> Self {
        Self { docs, pos: 0 }
    }

    pub fn advance(&mut self) -> Option<Document> {
        let d = self.docs.get(self.pos).cloned()?;
        self.pos += 1;
        Some(d)
    }

    /// Remaining documents.
    #[must_use]
    pub fn to_vec(mut self) -> Vec<Document> {
        self.docs.split_off(self.pos.min(self.docs.len()))
    }

    /// Remaining result views as plain BSON documents.
    #[must_use]
    pub fn into_bson(self) -> Vec<BsonDocument> {
        self.to_vec().into_iter().map(|d| d.data).collect()
    }
}

impl Iterator for Cursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
