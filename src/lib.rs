pub mod aggregate;
pub mod catalog;
pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod index;
pub mod logger;
pub mod query;
pub mod types;

use crate::aggregate::Pipeline;
use crate::collection::Collection;
use crate::document::Document;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::index::{IndexDescriptor, IndexSpec};
use crate::query::{Cursor, DeleteReport, ExplainReport, Filter, FindOptions, UpdateDoc, UpdateReport};
use crate::types::DocumentId;
use bson::Document as BsonDocument;
use std::sync::Arc;

/// The main database struct.
#[derive(Debug)]
pub struct Database {
    name: String,
    engine: Arc<Engine>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Creates a new, empty in-memory database.
    #[must_use]
    pub fn new() -> Self {
        Self::with_name("plp_bookstore")
    }

    #[must_use]
    pub fn with_name(name: &str) -> Self {
        Self { name: name.to_string(), engine: Arc::new(Engine::new()) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a new collection with the given name, or returns the existing one.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        self.engine.create_collection(name.to_string())
    }

    /// Retrieves a collection by its name.
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.engine.get_collection(name)
    }

    /// Deletes a collection by its name.
    pub fn delete_collection(&self, name: &str) -> bool {
        self.engine.delete_collection(name)
    }

    /// Lists the names of all collections.
    pub fn list_collection_names(&self) -> Vec<String> {
        self.engine.list_collection_names()
    }

    /// Rename a collection.
    ///
    /// # Errors
    /// Fails if `old` is missing or `new` already exists.
    pub fn rename_collection(&self, old: &str, new: &str) -> Result<(), DbError> {
        self.engine.rename_collection(old, new)
    }

    fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.engine.get_collection(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    /// Inserts a document into the specified collection.
    ///
    /// # Errors
    /// Fails if the collection is missing or the document is rejected by its validator.
    pub fn insert_document(&self, collection_name: &str, document: Document) -> Result<DocumentId, DbError> {
        self.collection(collection_name)?.insert_document(document)
    }

    /// Inserts every document or none of them.
    ///
    /// # Errors
    /// Fails if the collection is missing or any document is rejected.
    pub fn insert_many(&self, collection_name: &str, documents: Vec<Document>) -> Result<Vec<DocumentId>, DbError> {
        self.collection(collection_name)?.insert_many(documents)
    }

    /// Replaces a document in the specified collection.
    ///
    /// # Errors
    /// Fails if the collection is missing or the new body is rejected.
    pub fn update_document(&self, collection_name: &str, document_id: &DocumentId, new_document: Document) -> Result<bool, DbError> {
        self.collection(collection_name)?.update_document(document_id, new_document)
    }

    /// Deletes a document from the specified collection by its ID.
    ///
    /// # Errors
    /// Fails if the collection is missing.
    pub fn delete_document(&self, collection_name: &str, document_id: &DocumentId) -> Result<bool, DbError> {
        Ok(self.collection(collection_name)?.delete_document(document_id))
    }

    /// # Errors
    /// Fails if the collection is missing or holds no document with this ID.
    pub fn get_document(&self, collection_name: &str, document_id: &DocumentId) -> Result<Document, DbError> {
        self.collection(collection_name)?
            .find_document(document_id)
            .ok_or_else(|| DbError::NoSuchDocument(document_id.to_string()))
    }

    // --- Query API (façade over query module) ---

    /// # Errors
    /// Fails if the collection is missing or the hint names an unknown index.
    pub fn find(&self, collection_name: &str, filter: &Filter, opts: &FindOptions) -> Result<Cursor, DbError> {
        query::find_docs(&self.collection(collection_name)?, filter, opts)
    }

    /// # Errors
    /// Fails if the collection is missing.
    pub fn count(&self, collection_name: &str, filter: &Filter) -> Result<usize, DbError> {
        Ok(query::count_docs(&self.collection(collection_name)?, filter))
    }

    /// # Errors
    /// Fails if the collection is missing or the update is invalid.
    pub fn update_one(&self, collection_name: &str, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
        query::update_one(&self.collection(collection_name)?, filter, update)
    }

    /// # Errors
    /// Fails if the collection is missing or the update is invalid.
    pub fn update_many(&self, collection_name: &str, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
        query::update_many(&self.collection(collection_name)?, filter, update)
    }

    /// # Errors
    /// Fails if the collection is missing.
    pub fn delete_one(&self, collection_name: &str, filter: &Filter) -> Result<DeleteReport, DbError> {
        Ok(query::delete_one(&self.collection(collection_name)?, filter))
    }

    /// # Errors
    /// Fails if the collection is missing.
    pub fn delete_many(&self, collection_name: &str, filter: &Filter) -> Result<DeleteReport, DbError> {
        Ok(query::delete_many(&self.collection(collection_name)?, filter))
    }

    /// # Errors
    /// Fails if the collection is missing or a stage fails.
    pub fn aggregate(&self, collection_name: &str, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, DbError> {
        aggregate::aggregate(&self.collection(collection_name)?, pipeline)
    }

    // --- Index API ---

    /// # Errors
    /// Fails if the collection is missing or the key spec is invalid.
    pub fn create_index(&self, collection_name: &str, spec: IndexSpec) -> Result<String, DbError> {
        self.collection(collection_name)?.create_index(spec)
    }

    /// # Errors
    /// Fails if the collection is missing.
    pub fn drop_index(&self, collection_name: &str, index_name: &str) -> Result<bool, DbError> {
        Ok(self.collection(collection_name)?.drop_index(index_name))
    }

    /// # Errors
    /// Fails if the collection is missing.
    pub fn list_indexes(&self, collection_name: &str) -> Result<Vec<IndexDescriptor>, DbError> {
        Ok(self.collection(collection_name)?.list_indexes())
    }

    /// # Errors
    /// Fails if the collection is missing or the hint names an unknown index.
    pub fn explain(&self, collection_name: &str, filter: &Filter, opts: &FindOptions) -> Result<ExplainReport, DbError> {
        query::explain(&self.collection(collection_name)?, filter, opts)
    }
}

/// Initializes logging from `BOOKSTORE_LOG_*` environment variables.
///
/// # Errors
/// Returns an error if the log configuration cannot be built.
pub fn init() -> Result<(), DbError> {
    logger::configure_from_env()
}
