pub mod models;
pub mod routes;
pub mod schema;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use sqlx::PgPool;

use bookshelf_kernel::{InitCtx, Migration, Module};

use store::{BookStore, PgBookStore};

/// The books resource module: CRUD over the `books` table.
pub struct BooksModule {
    store: Arc<dyn BookStore>,
}

impl BooksModule {
    /// Construct the module with an explicit store handle.
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.store.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "All books, ordered by title",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "books": {
                                                    "type": "array",
                                                    "items": {
                                                        "$ref": "#/components/schemas/Book"
                                                    }
                                                }
                                            },
                                            "required": ["books"]
                                        }
                                    }
                                }
                            },
                            "500": {
                                "description": "Internal server error",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "$ref": "#/components/schemas/Book"
                                    }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "The created book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/BookEnvelope"
                                        }
                                    }
                                }
                            },
                            "400": {
                                "description": "Payload failed schema validation",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            },
                            "409": {
                                "description": "A book with this ISBN already exists",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
                "/{isbn}": {
                    "get": {
                        "summary": "Get a book by ISBN",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "isbn",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "string" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "The requested book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/BookEnvelope"
                                        }
                                    }
                                }
                            },
                            "404": {
                                "description": "No book with this ISBN",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "put": {
                        "summary": "Replace a book's mutable fields",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "isbn",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "string" }
                            }
                        ],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "$ref": "#/components/schemas/BookChanges"
                                    }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "The updated book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/BookEnvelope"
                                        }
                                    }
                                }
                            },
                            "400": {
                                "description": "Payload failed schema validation (including an isbn or unrecognized field)",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            },
                            "404": {
                                "description": "No book with this ISBN",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "isbn",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "string" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Deletion confirmation",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "message": { "type": "string" }
                                            },
                                            "required": ["message"]
                                        }
                                    }
                                }
                            },
                            "404": {
                                "description": "No book with this ISBN",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "isbn": {
                                "type": "string",
                                "description": "Primary key; immutable after creation"
                            },
                            "amazon_url": { "type": "string" },
                            "author": { "type": "string" },
                            "language": { "type": "string" },
                            "pages": {
                                "type": "integer",
                                "minimum": 1
                            },
                            "publisher": { "type": "string" },
                            "title": { "type": "string" },
                            "year": { "type": "integer" }
                        },
                        "required": ["isbn", "amazon_url", "author", "language", "pages", "publisher", "title", "year"]
                    },
                    "BookChanges": {
                        "type": "object",
                        "properties": {
                            "amazon_url": { "type": "string" },
                            "author": { "type": "string" },
                            "language": { "type": "string" },
                            "pages": {
                                "type": "integer",
                                "minimum": 1
                            },
                            "publisher": { "type": "string" },
                            "title": { "type": "string" },
                            "year": { "type": "integer" }
                        },
                        "required": ["amazon_url", "author", "language", "pages", "publisher", "title", "year"]
                    },
                    "BookEnvelope": {
                        "type": "object",
                        "properties": {
                            "book": {
                                "$ref": "#/components/schemas/Book"
                            }
                        },
                        "required": ["book"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_create_books",
            up: "CREATE TABLE IF NOT EXISTS books (
                    isbn TEXT PRIMARY KEY,
                    amazon_url TEXT NOT NULL,
                    author TEXT NOT NULL,
                    language TEXT NOT NULL,
                    pages INTEGER NOT NULL CHECK (pages > 0),
                    publisher TEXT NOT NULL,
                    title TEXT NOT NULL,
                    year INTEGER NOT NULL
                )",
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module backed by the shared Postgres pool.
pub fn create_module(pool: &PgPool) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(Arc::new(PgBookStore::new(pool.clone()))))
}
