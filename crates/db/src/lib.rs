//! Postgres pool factory and migration tooling for the bookshelf service.

use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::Migration;

/// Establish the shared connection pool from database settings.
///
/// The pool is created once at process start and closed at shutdown; callers
/// hand out cheap clones of the returned handle.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_millis(settings.acquire_timeout_ms))
        .connect(&settings.url)
        .await
        .with_context(|| "failed to connect to Postgres")?;

    tracing::info!(
        max_connections = settings.max_connections,
        "database pool established"
    );

    Ok(pool)
}

/// Apply module-contributed migrations that have not run yet.
///
/// Applied migrations are recorded in `schema_migrations`, keyed by module
/// name and migration id, so re-running at every boot is safe. Each pending
/// migration executes inside its own transaction.
pub async fn apply_migrations(
    pool: &PgPool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<()> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            module TEXT NOT NULL,
            id TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (module, id)
        )",
    )
    .execute(pool)
    .await
    .with_context(|| "failed to create schema_migrations table")?;

    for (module, migration) in migrations {
        let mut tx = pool
            .begin()
            .await
            .with_context(|| "failed to begin migration transaction")?;

        let applied: Option<(String,)> =
            sqlx::query_as("SELECT id FROM schema_migrations WHERE module = $1 AND id = $2")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(&mut *tx)
                .await
                .with_context(|| "failed to query schema_migrations")?;

        if applied.is_some() {
            tracing::debug!(module = %module, id = migration.id, "migration already applied");
            continue;
        }

        tracing::info!(module = %module, id = migration.id, "applying migration");

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to apply migration '{}/{}'", module, migration.id))?;

        sqlx::query("INSERT INTO schema_migrations (module, id) VALUES ($1, $2)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .with_context(|| "failed to record applied migration")?;

        tx.commit()
            .await
            .with_context(|| "failed to commit migration transaction")?;
    }

    Ok(())
}
