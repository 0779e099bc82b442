//! Bookstore catalog: the Book model, the sample data set and the named queries.

mod book;
mod queries;
mod seed;

pub use book::{Book, book_validator, validate_book};
pub use queries::{
    AuthorCount, BookSummary, Catalog, DEFAULT_COLLECTION, DEFAULT_PAGE_SIZE, DecadeCount,
    GenreAverage, TITLE_INDEX, avg_price_pipeline, decade_pipeline, top_author_pipeline,
};
pub use seed::{load_ndjson, read_ndjson, sample_books, seed_books, seed_sample};
