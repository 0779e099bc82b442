//! The catalog query set: every statement is a declarative filter, find option set or
//! pipeline handed to the engine, with results decoded into typed rows.

use crate::Database;
use crate::aggregate::{Accumulator, Expr, Pipeline, ProjectField, Stage};
use crate::errors::DbError;
use crate::index::IndexSpec;
use crate::query::{
    Cursor, DeleteReport, ExplainReport, Filter, FindOptions, Order, Projection, SortSpec,
    UpdateDoc, UpdateReport, get_path,
};
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

use super::book::Book;

pub const DEFAULT_COLLECTION: &str = "books";
pub const DEFAULT_PAGE_SIZE: usize = 5;
pub const TITLE_INDEX: &str = "title_1";

/// Row of [`Catalog::title_author_price`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,
    pub author: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreAverage {
    pub genre: String,
    #[serde(rename = "avgPrice")]
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub author: String,
    #[serde(rename = "bookCount")]
    pub book_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecadeCount {
    pub decade: i32,
    #[serde(rename = "bookCount")]
    pub book_count: i64,
}

/// Named queries over one collection of books.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    db: &'a Database,
    collection: &'a str,
    page_size: usize,
}

impl<'a> Catalog<'a> {
    #[must_use]
    pub const fn new(db: &'a Database, collection: &'a str) -> Self {
        Self { db, collection, page_size: DEFAULT_PAGE_SIZE }
    }

    /// Zero is clamped to one.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = if page_size == 0 { 1 } else { page_size };
        self
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub const fn db(&self) -> &'a Database {
        self.db
    }

    #[must_use]
    pub const fn collection(&self) -> &str {
        self.collection
    }

    fn find_books(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<Book>, DbError> {
        decode_books(self.db.find(self.collection, filter, opts)?)
    }

    /// # Errors
    /// Fails if the collection does not exist.
    pub fn count_all(&self) -> Result<usize, DbError> {
        self.db.count(self.collection, &Filter::True)
    }

    // --- filters ---

    /// # Errors
    /// Fails if the collection does not exist.
    pub fn books_by_genre(&self, genre: &str) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::eq("genre", genre), &FindOptions::default())
    }

    /// Strictly after `year`.
    ///
    /// # Errors
    /// Fails if the collection does not exist.
    pub fn published_after(&self, year: i32) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::gt("published_year", year), &FindOptions::default())
    }

    /// # Errors
    /// Fails if the collection does not exist.
    pub fn by_author(&self, author: &str) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::eq("author", author), &FindOptions::default())
    }

    /// # Errors
    /// Fails if the collection does not exist.
    pub fn in_stock_published_after(&self, year: i32) -> Result<Vec<Book>, DbError> {
        let filter = Filter::And(vec![Filter::eq("in_stock", true), Filter::gt("published_year", year)]);
        self.find_books(&filter, &FindOptions::default())
    }

    /// # Errors
    /// Fails if the collection does not exist.
    pub fn by_title(&self, title: &str) -> Result<Vec<Book>, DbError> {
        self.find_books(&title_filter(title), &FindOptions::default())
    }

    // --- projection, sorting, paging ---

    /// Every book as `{title, author, price}` without `_id`.
    ///
    /// # Errors
    /// Fails if the collection does not exist or a row lacks one of the fields.
    pub fn title_author_price(&self) -> Result<Vec<BookSummary>, DbError> {
        let opts = FindOptions::default()
            .project(Projection::include(&["title", "author", "price"]).without_id());
        self.db
            .find(self.collection, &Filter::True, &opts)?
            .into_bson()
            .iter()
            .map(|d| {
                Ok(BookSummary {
                    title: str_at(d, "title")?,
                    author: str_at(d, "author")?,
                    price: f64_at(d, "price")?,
                })
            })
            .collect()
    }

    /// # Errors
    /// Fails if the collection does not exist.
    pub fn by_price(&self, order: Order) -> Result<Vec<Book>, DbError> {
        let sort = SortSpec { field: "price".into(), order };
        self.find_books(&Filter::True, &FindOptions::sorted(vec![sort]))
    }

    /// Page `n` (0-indexed) of the catalog sorted by title.
    ///
    /// # Errors
    /// Fails if the collection does not exist.
    pub fn page(&self, n: usize) -> Result<Vec<Book>, DbError> {
        let opts = FindOptions::sorted(vec![SortSpec::asc("title")])
            .page(n.saturating_mul(self.page_size), self.page_size);
        self.find_books(&Filter::True, &opts)
    }

    // --- mutations ---

    /// Sets the price of the first book (in natural order) with this exact title.
    ///
    /// # Errors
    /// Fails if the collection does not exist or the new price is rejected.
    pub fn update_price(&self, title: &str, price: f64) -> Result<UpdateReport, DbError> {
        self.db.update_one(self.collection, &title_filter(title), &UpdateDoc::set("price", price))
    }

    /// Removes the first book with this exact title.
    ///
    /// # Errors
    /// Fails if the collection does not exist.
    pub fn delete_by_title(&self, title: &str) -> Result<DeleteReport, DbError> {
        self.db.delete_one(self.collection, &title_filter(title))
    }

    // --- aggregation ---

    /// # Errors
    /// Fails if the collection does not exist or the pipeline fails.
    pub fn avg_price_by_genre(&self) -> Result<Vec<GenreAverage>, DbError> {
        self.db
            .aggregate(self.collection, &avg_price_pipeline())?
            .iter()
            .map(|d| Ok(GenreAverage { genre: str_at(d, "_id")?, avg_price: f64_at(d, "avgPrice")? }))
            .collect()
    }

    /// Author with the most books; ties go to the author that appears first.
    ///
    /// # Errors
    /// Fails if the collection does not exist or the pipeline fails.
    pub fn top_author(&self) -> Result<Option<AuthorCount>, DbError> {
        let rows = self.db.aggregate(self.collection, &top_author_pipeline())?;
        rows.first()
            .map(|d| -> Result<AuthorCount, DbError> {
                Ok(AuthorCount { author: str_at(d, "_id")?, book_count: i64_at(d, "bookCount")? })
            })
            .transpose()
    }

    /// Book counts per decade, ascending.
    ///
    /// # Errors
    /// Fails if the collection does not exist or the pipeline fails.
    pub fn decade_histogram(&self) -> Result<Vec<DecadeCount>, DbError> {
        self.db
            .aggregate(self.collection, &decade_pipeline())?
            .iter()
            .map(|d| {
                let decade = i32::try_from(i64_at(d, "decade")?)
                    .map_err(|_| DbError::PipelineError("decade out of range".into()))?;
                Ok(DecadeCount { decade, book_count: i64_at(d, "bookCount")? })
            })
            .collect()
    }

    // --- indexes & explain ---

    /// # Errors
    /// Fails if the collection does not exist.
    pub fn create_title_index(&self) -> Result<String, DbError> {
        self.db.create_index(self.collection, IndexSpec::single("title"))
    }

    /// # Errors
    /// Fails if the collection does not exist.
    pub fn create_author_year_index(&self) -> Result<String, DbError> {
        self.db.create_index(self.collection, IndexSpec::compound(&["author", "published_year"]))
    }

    /// Explains an exact title lookup; with `hinted`, the title index is forced.
    ///
    /// # Errors
    /// Fails if the collection does not exist, or if `hinted` is set before the title
    /// index has been created.
    pub fn explain_title_lookup(&self, title: &str, hinted: bool) -> Result<ExplainReport, DbError> {
        let opts = if hinted { FindOptions::default().hint(TITLE_INDEX) } else { FindOptions::default() };
        self.db.explain(self.collection, &title_filter(title), &opts)
    }
}

fn title_filter(title: &str) -> Filter {
    Filter::eq("title", title)
}

#[must_use]
pub fn avg_price_pipeline() -> Pipeline {
    Pipeline::new(vec![Stage::Group {
        id: Expr::field("genre"),
        fields: vec![("avgPrice".into(), Accumulator::Avg(Expr::field("price")))],
    }])
}

#[must_use]
pub fn top_author_pipeline() -> Pipeline {
    Pipeline::new(vec![
        Stage::Group {
            id: Expr::field("author"),
            fields: vec![("bookCount".into(), Accumulator::Sum(Expr::lit(1)))],
        },
        Stage::Sort(vec![SortSpec::desc("bookCount")]),
        Stage::Limit(1),
    ])
}

/// `floor(published_year / 10) * 10` per book, counted and sorted ascending.
#[must_use]
pub fn decade_pipeline() -> Pipeline {
    let bucket = Expr::Floor(Box::new(Expr::Divide(
        Box::new(Expr::field("published_year")),
        Box::new(Expr::lit(10)),
    )));
    Pipeline::new(vec![
        Stage::Group { id: bucket, fields: vec![("bookCount".into(), Accumulator::Sum(Expr::lit(1)))] },
        Stage::Project(vec![
            ("decade".into(), ProjectField::Computed(Expr::Multiply(vec![Expr::field("_id"), Expr::lit(10)]))),
            ("bookCount".into(), ProjectField::Include),
            ("_id".into(), ProjectField::Exclude),
        ]),
        Stage::Sort(vec![SortSpec::asc("decade")]),
    ])
}

fn decode_books(cursor: Cursor) -> Result<Vec<Book>, DbError> {
    cursor.map(|d| Book::from_document(&d.data)).collect()
}

fn missing(field: &str) -> DbError {
    DbError::InvalidDocument(format!("result row has no usable `{field}`"))
}

fn str_at(d: &BsonDocument, field: &str) -> Result<String, DbError> {
    match get_path(d, field) {
        Some(Bson::String(s)) => Ok(s.clone()),
        _ => Err(missing(field)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn f64_at(d: &BsonDocument, field: &str) -> Result<f64, DbError> {
    match get_path(d, field) {
        Some(Bson::Double(f)) => Ok(*f),
        Some(Bson::Int32(i)) => Ok(f64::from(*i)),
        Some(Bson::Int64(i)) => Ok(*i as f64),
        _ => Err(missing(field)),
    }
}

/// Integral doubles (e.g. a floored decade) are accepted.
#[allow(clippy::cast_possible_truncation)]
fn i64_at(d: &BsonDocument, field: &str) -> Result<i64, DbError> {
    match get_path(d, field) {
        Some(Bson::Int32(i)) => Ok(i64::from(*i)),
        Some(Bson::Int64(i)) => Ok(*i),
        Some(Bson::Double(f)) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
        _ => Err(missing(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::seed_sample;

    fn seeded() -> Database {
        let db = Database::new();
        seed_sample(&db, DEFAULT_COLLECTION).unwrap();
        db
    }

    #[test]
    fn average_price_rows_follow_first_appearance() {
        let db = seeded();
        let rows = Catalog::new(&db, DEFAULT_COLLECTION).avg_price_by_genre().unwrap();
        assert_eq!(rows[0].genre, "Fiction");
        let fantasy = rows.iter().find(|r| r.genre == "Fantasy").unwrap();
        assert!((fantasy.avg_price - 17.49).abs() < 1e-9);
        assert_eq!(rows.len(), 7);
    }

    #[test]
    fn page_size_zero_is_clamped() {
        let db = seeded();
        let c = Catalog::new(&db, DEFAULT_COLLECTION).with_page_size(0);
        assert_eq!(c.page(0).unwrap().len(), 1);
    }
}
