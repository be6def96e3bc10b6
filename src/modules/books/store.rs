//! Persistence for the books resource.
//!
//! Every operation is a single SQL statement; the row-level atomicity of
//! the store is the only consistency mechanism, and writes are never
//! retried.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

use bookshelf_http::error::AppError;

use super::models::{Book, BookChanges};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("book {0} not found")]
    NotFound(String),

    #[error("book {0} already exists")]
    Conflict(String),

    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(isbn) => AppError::not_found(format!("book {isbn} not found")),
            StoreError::Conflict(isbn) => AppError::conflict(
                vec![json!({"field": "isbn", "error": "already exists"})],
                format!("book {isbn} already exists"),
            ),
            StoreError::Database(err) => AppError::Internal(err.into()),
        }
    }
}

/// Persistence operations backing the books routes.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// All books, ordered by title.
    async fn list_all(&self) -> Result<Vec<Book>, StoreError>;

    /// The book with the given key, or `NotFound`.
    async fn find_by_isbn(&self, isbn: &str) -> Result<Book, StoreError>;

    /// Write a new row; `Conflict` if the key is already taken.
    async fn insert(&self, book: Book) -> Result<Book, StoreError>;

    /// Replace every mutable field of the row; `NotFound` if absent.
    async fn update(&self, isbn: &str, changes: BookChanges) -> Result<Book, StoreError>;

    /// Delete the row; `NotFound` if absent.
    async fn remove(&self, isbn: &str) -> Result<(), StoreError>;
}

const BOOK_COLUMNS: &str = "isbn, amazon_url, author, language, pages, publisher, title, year";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgBookStore {
    pool: PgPool,
}

impl PgBookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY title"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Book, StoreError> {
        sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE isbn = $1"
        ))
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(isbn.to_string()))
    }

    async fn insert(&self, book: Book) -> Result<Book, StoreError> {
        sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books ({BOOK_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&book.isbn)
        .bind(&book.amazon_url)
        .bind(&book.author)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.publisher)
        .bind(&book.title)
        .bind(book.year)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(book.isbn.clone())
            }
            _ => StoreError::Database(err),
        })
    }

    async fn update(&self, isbn: &str, changes: BookChanges) -> Result<Book, StoreError> {
        sqlx::query_as::<_, Book>(&format!(
            "UPDATE books
             SET amazon_url = $2, author = $3, language = $4, pages = $5,
                 publisher = $6, title = $7, year = $8
             WHERE isbn = $1
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(isbn)
        .bind(&changes.amazon_url)
        .bind(&changes.author)
        .bind(&changes.language)
        .bind(changes.pages)
        .bind(&changes.publisher)
        .bind(&changes.title)
        .bind(changes.year)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(isbn.to_string()))
    }

    async fn remove(&self, isbn: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE isbn = $1")
            .bind(isbn)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(isbn.to_string()));
        }

        Ok(())
    }
}

/// In-memory store with the same observable contract as the Postgres one.
///
/// Backs the route tests; also usable for local experiments without a
/// database.
#[derive(Default)]
pub struct InMemoryBookStore {
    books: Mutex<BTreeMap<String, Book>>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let books = self.books.lock().expect("book store lock poisoned");
        let mut all: Vec<Book> = books.values().cloned().collect();
        all.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(all)
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Book, StoreError> {
        let books = self.books.lock().expect("book store lock poisoned");
        books
            .get(isbn)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(isbn.to_string()))
    }

    async fn insert(&self, book: Book) -> Result<Book, StoreError> {
        let mut books = self.books.lock().expect("book store lock poisoned");
        if books.contains_key(&book.isbn) {
            return Err(StoreError::Conflict(book.isbn.clone()));
        }
        books.insert(book.isbn.clone(), book.clone());
        Ok(book)
    }

    async fn update(&self, isbn: &str, changes: BookChanges) -> Result<Book, StoreError> {
        let mut books = self.books.lock().expect("book store lock poisoned");
        if !books.contains_key(isbn) {
            return Err(StoreError::NotFound(isbn.to_string()));
        }
        let book = changes.into_book(isbn.to_string());
        books.insert(isbn.to_string(), book.clone());
        Ok(book)
    }

    async fn remove(&self, isbn: &str) -> Result<(), StoreError> {
        let mut books = self.books.lock().expect("book store lock poisoned");
        books
            .remove(isbn)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(isbn.to_string()))
    }
}
