use crate::Database;
use crate::document::Document;
use crate::errors::DbError;
use crate::types::DocumentId;
use bson::Document as BsonDocument;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use super::book::{Book, book_validator};

#[allow(clippy::too_many_arguments)]
fn book(
    title: &str,
    author: &str,
    genre: &str,
    published_year: i32,
    price: f64,
    in_stock: bool,
    pages: i32,
    publisher: &str,
) -> Book {
    Book {
        title: title.into(),
        author: author.into(),
        genre: genre.into(),
        published_year,
        price,
        in_stock,
        pages,
        publisher: publisher.into(),
    }
}

/// The fixed sample catalog, in insertion order.
#[must_use]
pub fn sample_books() -> Vec<Book> {
    vec![
        book("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 12.99, true, 336, "J. B. Lippincott & Co."),
        book("1984", "George Orwell", "Dystopian", 1949, 10.99, true, 328, "Secker & Warburg"),
        book("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 1925, 9.99, true, 180, "Charles Scribner's Sons"),
        book("Brave New World", "Aldous Huxley", "Dystopian", 1932, 11.50, false, 311, "Chatto & Windus"),
        book("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 14.99, true, 310, "George Allen & Unwin"),
        book("The Catcher in the Rye", "J.D. Salinger", "Fiction", 1951, 8.99, true, 224, "Little, Brown and Company"),
        book("Pride and Prejudice", "Jane Austen", "Romance", 1813, 7.99, true, 432, "T. Egerton, Whitehall"),
        book("The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", 1954, 19.99, true, 1178, "Allen & Unwin"),
        book("Animal Farm", "George Orwell", "Political Satire", 1945, 8.50, false, 112, "Secker & Warburg"),
        book("The Alchemist", "Paulo Coelho", "Fiction", 1988, 10.99, true, 197, "HarperOne"),
        book("Moby Dick", "Herman Melville", "Adventure", 1851, 12.50, false, 635, "Harper & Brothers"),
        book("Wuthering Heights", "Emily Brontë", "Gothic Fiction", 1847, 9.99, true, 342, "Thomas Cautley Newby"),
    ]
}

/// Inserts `books` into `collection` as one batch, installing the Book validator first.
/// Nothing is inserted if any book is malformed.
///
/// # Errors
/// Returns `InvalidDocument` naming the first rejected batch position.
pub fn seed_books(db: &Database, collection: &str, books: &[Book]) -> Result<Vec<DocumentId>, DbError> {
    let col = db.create_collection(collection);
    col.set_validator(book_validator());
    let docs = books.iter().map(|b| Document::new(b.to_document())).collect();
    let ids = col.insert_many(docs)?;
    log::info!("seeded {} books into {collection}", ids.len());
    Ok(ids)
}

/// Seeds `collection` with [`sample_books`].
///
/// # Errors
/// Propagates insertion failures.
pub fn seed_sample(db: &Database, collection: &str) -> Result<Vec<DocumentId>, DbError> {
    seed_books(db, collection, &sample_books())
}

/// Reads one Book JSON object per line; blank lines are skipped.
///
/// # Errors
/// Fails on I/O errors or on the first malformed line, reporting its line number.
pub fn read_ndjson<R: Read>(reader: R) -> Result<Vec<Book>, DbError> {
    let mut books = Vec::new();
    for (i, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<BsonDocument>(line)
            .map_err(|e| DbError::InvalidDocument(format!("line {}: {e}", i + 1)))
            .and_then(|d| Book::from_document(&d));
        match parsed {
            Ok(b) => books.push(b),
            Err(DbError::InvalidDocument(msg)) if !msg.starts_with("line ") => {
                return Err(DbError::InvalidDocument(format!("line {}: {msg}", i + 1)));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(books)
}

/// # Errors
/// Fails if the file cannot be opened or any line is malformed.
pub fn load_ndjson(path: &Path) -> Result<Vec<Book>, DbError> {
    let file = File::open(path).map_err(|e| DbError::Io(format!("{}: {e}", path.display())))?;
    read_ndjson(file)
}
