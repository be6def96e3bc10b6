pub mod books;

use sqlx::PgPool;

use bookshelf_kernel::ModuleRegistry;

/// Register all resource modules with the registry, handing each its
/// store built on the shared pool.
pub fn register_all(registry: &mut ModuleRegistry, pool: &PgPool) {
    registry.register(books::create_module(pool));
}
