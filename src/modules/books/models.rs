use serde::{Deserialize, Serialize};

/// A catalog entry, keyed by ISBN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    /// Primary key; immutable after creation
    pub isbn: String,
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    /// Page count, always positive
    pub pages: i32,
    pub publisher: String,
    pub title: String,
    pub year: i32,
}

/// The mutable fields of a book, as accepted by the update operation.
///
/// Updates are full replacements: every field here overwrites the stored
/// column, and the validator requires all of them to be present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookChanges {
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    pub pages: i32,
    pub publisher: String,
    pub title: String,
    pub year: i32,
}

impl BookChanges {
    /// Combine the changes with an existing key into a full record.
    pub fn into_book(self, isbn: String) -> Book {
        Book {
            isbn,
            amazon_url: self.amazon_url,
            author: self.author,
            language: self.language,
            pages: self.pages,
            publisher: self.publisher,
            title: self.title,
            year: self.year,
        }
    }
}

/// Response envelope for the list operation.
#[derive(Debug, Serialize, Deserialize)]
pub struct BooksResponse {
    pub books: Vec<Book>,
}

/// Response envelope for single-book operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub book: Book,
}

/// Response envelope for the delete operation.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
