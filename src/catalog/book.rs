use crate::collection::Validator;
use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument, doc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One catalog entry. `_id` is not part of the model; the store assigns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
    pub pages: i32,
    pub publisher: String,
}

impl Book {
    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        doc! {
            "title": &self.title,
            "author": &self.author,
            "genre": &self.genre,
            "published_year": self.published_year,
            "price": self.price,
            "in_stock": self.in_stock,
            "pages": self.pages,
            "publisher": &self.publisher,
        }
    }

    /// Decodes a stored document. Extra fields (including `_id`) are ignored.
    ///
    /// # Errors
    /// Returns `InvalidDocument` if a field is missing or has the wrong type.
    pub fn from_document(d: &BsonDocument) -> Result<Self, DbError> {
        validate_book(d)?;
        Ok(Self {
            title: string_field(d, "title")?,
            author: string_field(d, "author")?,
            genre: string_field(d, "genre")?,
            published_year: int_field(d, "published_year")?,
            price: number_field(d, "price")?,
            in_stock: bool_field(d, "in_stock")?,
            pages: int_field(d, "pages")?,
            publisher: string_field(d, "publisher")?,
        })
    }
}

fn invalid(msg: String) -> DbError {
    DbError::InvalidDocument(msg)
}

fn field<'a>(d: &'a BsonDocument, name: &str) -> Result<&'a Bson, DbError> {
    match d.get(name) {
        None | Some(Bson::Null) => Err(invalid(format!("missing field `{name}`"))),
        Some(v) => Ok(v),
    }
}

fn string_field(d: &BsonDocument, name: &str) -> Result<String, DbError> {
    match field(d, name)? {
        Bson::String(s) => Ok(s.clone()),
        other => Err(invalid(format!("`{name}` must be a string, got {:?}", other.element_type()))),
    }
}

fn bool_field(d: &BsonDocument, name: &str) -> Result<bool, DbError> {
    match field(d, name)? {
        Bson::Boolean(b) => Ok(*b),
        other => Err(invalid(format!("`{name}` must be a boolean, got {:?}", other.element_type()))),
    }
}

fn number_field(d: &BsonDocument, name: &str) -> Result<f64, DbError> {
    match field(d, name)? {
        Bson::Double(f) => Ok(*f),
        Bson::Int32(i) => Ok(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Ok(*i as f64),
        other => Err(invalid(format!("`{name}` must be a number, got {:?}", other.element_type()))),
    }
}

/// Integral values of any numeric BSON type that fit in `i32`.
#[allow(clippy::cast_possible_truncation)]
fn int_field(d: &BsonDocument, name: &str) -> Result<i32, DbError> {
    let wide = match field(d, name)? {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.fract() == 0.0 && f.abs() <= f64::from(i32::MAX) => Some(*f as i64),
        _ => None,
    };
    wide.and_then(|i| i32::try_from(i).ok())
        .ok_or_else(|| invalid(format!("`{name}` must be an integer")))
}

/// Checks that all eight Book fields are present with their declared types,
/// `price >= 0` and `pages > 0`.
///
/// # Errors
/// Returns `InvalidDocument` describing the first problem found.
pub fn validate_book(d: &BsonDocument) -> Result<(), DbError> {
    for name in ["title", "author", "genre", "publisher"] {
        string_field(d, name)?;
    }
    int_field(d, "published_year")?;
    bool_field(d, "in_stock")?;
    let price = number_field(d, "price")?;
    if !(price >= 0.0) {
        return Err(invalid(format!("`price` must be >= 0, got {price}")));
    }
    let pages = int_field(d, "pages")?;
    if pages <= 0 {
        return Err(invalid(format!("`pages` must be > 0, got {pages}")));
    }
    Ok(())
}

/// `validate_book` packaged for [`crate::collection::Collection::set_validator`].
#[must_use]
pub fn book_validator() -> Validator {
    Arc::new(validate_book)
}
