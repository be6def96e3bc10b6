mod modules;

use anyhow::Context;
use clap::{Parser, Subcommand};

use bookshelf_kernel::settings::Settings;
use bookshelf_kernel::{InitCtx, ModuleRegistry};

#[derive(Parser)]
#[command(name = "bookshelf", about = "Book catalog CRUD service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and serve HTTP traffic (the default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;

    bookshelf_telemetry::init(&settings.telemetry)
        .with_context(|| "failed to initialize telemetry")?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookshelf bootstrap starting"
    );

    let pool = bookshelf_db::connect(&settings.database).await?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &pool);

    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_modules(&ctx).await?;

    bookshelf_db::apply_migrations(&pool, &registry.collect_migrations()).await?;

    if matches!(cli.command, Some(Command::Migrate)) {
        tracing::info!("migrations applied");
        pool.close().await;
        return Ok(());
    }

    registry.start_modules(&ctx).await?;

    bookshelf_http::start_server(&registry, &settings).await?;

    registry.stop_modules().await?;
    pool.close().await;

    tracing::info!("bookshelf shutdown complete");
    Ok(())
}
