//! HTTP handlers for the books resource.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use bookshelf_http::error::AppError;

use super::models::{BookResponse, BooksResponse, MessageResponse};
use super::schema::{self, Violation};
use super::store::BookStore;

type Store = Arc<dyn BookStore>;

/// Build the books router with the injected store as state.
pub fn router(store: Store) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route(
            "/{isbn}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(store)
}

async fn list_books(State(store): State<Store>) -> Result<Json<BooksResponse>, AppError> {
    let books = store.list_all().await?;
    Ok(Json(BooksResponse { books }))
}

async fn get_book(
    State(store): State<Store>,
    Path(isbn): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let book = store.find_by_isbn(&isbn).await?;
    Ok(Json(BookResponse { book }))
}

async fn create_book(
    State(store): State<Store>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let book = schema::validate_create(&payload).map_err(reject)?;
    let book = store.insert(book).await?;
    Ok((StatusCode::CREATED, Json(BookResponse { book })))
}

async fn update_book(
    State(store): State<Store>,
    Path(isbn): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<BookResponse>, AppError> {
    let changes = schema::validate_update(&payload).map_err(reject)?;
    let book = store.update(&isbn, changes).await?;
    Ok(Json(BookResponse { book }))
}

async fn delete_book(
    State(store): State<Store>,
    Path(isbn): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    store.remove(&isbn).await?;
    Ok(Json(MessageResponse {
        message: "Book deleted".to_string(),
    }))
}

/// Fold every violation into a single validation error response.
fn reject(violations: Vec<Violation>) -> AppError {
    let summary = violations
        .iter()
        .map(|v| format!("{} {}", v.field, v.error))
        .collect::<Vec<_>>()
        .join("; ");
    let details = violations.iter().map(Violation::to_detail).collect();

    AppError::validation(details, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::Book;
    use crate::modules::books::store::InMemoryBookStore;
    use axum::body::Body;
    use axum::http::{header, Request, Response};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    async fn seeded_store() -> Store {
        let store = InMemoryBookStore::new();
        let book = Book {
            isbn: "123456789".to_string(),
            amazon_url: "https://amazon.com/dog".to_string(),
            author: "Billy".to_string(),
            language: "English".to_string(),
            pages: 123,
            publisher: "No publisher".to_string(),
            title: "The dog book".to_string(),
            year: 2001,
        };
        store.insert(book).await.unwrap();
        Arc::new(store)
    }

    async fn send(store: &Store, request: Request<Body>) -> Response<Body> {
        router(store.clone()).oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn valid_create_payload() -> Value {
        json!({
            "isbn": "12345678",
            "amazon_url": "https://example.com",
            "author": "Mr Example",
            "language": "english",
            "pages": 1000,
            "publisher": "Example press",
            "title": "The example book",
            "year": 2009
        })
    }

    #[tokio::test]
    async fn list_returns_seeded_books() {
        let store = seeded_store().await;
        let response = send(&store, Request::get("/").body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let books = body["books"].as_array().unwrap();
        assert_eq!(books.len(), 1);
        assert!(books[0].get("isbn").is_some());
        assert!(books[0].get("amazon_url").is_some());
    }

    #[tokio::test]
    async fn get_returns_a_book_by_isbn() {
        let store = seeded_store().await;
        let response = send(
            &store,
            Request::get("/123456789").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["book"]["isbn"], "123456789");
    }

    #[tokio::test]
    async fn get_of_missing_isbn_is_404() {
        let store = seeded_store().await;
        let response = send(&store, Request::get("/123").body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_returns_201_and_the_book() {
        let store = seeded_store().await;
        let response = send(&store, json_request("POST", "/", valid_create_payload())).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["book"]["isbn"], "12345678");
    }

    #[tokio::test]
    async fn created_book_reads_back_identically() {
        let store = seeded_store().await;
        let payload = valid_create_payload();
        send(&store, json_request("POST", "/", payload.clone())).await;

        let response = send(
            &store,
            Request::get("/12345678").body(Body::empty()).unwrap(),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["book"], payload);
    }

    #[tokio::test]
    async fn create_missing_title_is_400_and_writes_nothing() {
        let store = seeded_store().await;
        let response = send(&store, json_request("POST", "/", json!({"year": 2003}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // No partial write happened.
        let response = send(&store, Request::get("/").body(Body::empty()).unwrap()).await;
        let body = body_json(response).await;
        assert_eq!(body["books"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_lists_every_violation() {
        let store = seeded_store().await;
        let response = send(&store, json_request("POST", "/", json!({"year": 2003}))).await;

        let body = body_json(response).await;
        let details = body["error"]["details"].as_array().unwrap();
        assert_eq!(details.len(), 7);
        assert!(details
            .iter()
            .any(|d| d["field"] == "title" && d["error"] == "is required"));
    }

    #[tokio::test]
    async fn duplicate_create_is_409() {
        let store = seeded_store().await;
        let mut payload = valid_create_payload();
        payload["isbn"] = json!("123456789");

        let response = send(&store, json_request("POST", "/", payload)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn update_replaces_the_mutable_fields() {
        let store = seeded_store().await;
        let mut payload = valid_create_payload();
        payload.as_object_mut().unwrap().remove("isbn");
        payload["title"] = json!("Updated Book");

        let response = send(&store, json_request("PUT", "/123456789", payload.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["book"]["isbn"], "123456789");
        assert_eq!(body["book"]["title"], "Updated Book");
        assert_eq!(body["book"]["author"], payload["author"]);
        assert_eq!(body["book"]["pages"], payload["pages"]);
    }

    #[tokio::test]
    async fn update_with_unknown_field_is_400_and_changes_nothing() {
        let store = seeded_store().await;
        let mut payload = valid_create_payload();
        payload.as_object_mut().unwrap().remove("isbn");
        payload["partner"] = json!("yes");

        let response = send(&store, json_request("PUT", "/123456789", payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &store,
            Request::get("/123456789").body(Body::empty()).unwrap(),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["book"]["title"], "The dog book");
    }

    #[tokio::test]
    async fn update_carrying_isbn_is_400() {
        let store = seeded_store().await;
        let response = send(
            &store,
            json_request("PUT", "/123456789", valid_create_payload()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        let details = body["error"]["details"].as_array().unwrap();
        assert!(details.iter().any(|d| d["field"] == "isbn"));
    }

    #[tokio::test]
    async fn update_of_missing_isbn_is_404() {
        let store = seeded_store().await;
        let mut payload = valid_create_payload();
        payload.as_object_mut().unwrap().remove("isbn");

        let response = send(&store, json_request("PUT", "/123", payload)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_confirms_and_the_book_is_gone() {
        let store = seeded_store().await;
        let response = send(
            &store,
            Request::delete("/123456789").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Book deleted");

        let response = send(
            &store,
            Request::get("/123456789").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_of_missing_isbn_is_404() {
        let store = seeded_store().await;
        let response = send(
            &store,
            Request::delete("/123").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
