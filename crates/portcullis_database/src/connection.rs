//! Connection pool and migration utilities.

use crate::DatabaseResult;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use portcullis_error::{DatabaseError, DatabaseErrorKind};
use tracing::{debug, info};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Pooled PostgreSQL connections.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Build a connection pool and check out one connection to verify it.
///
/// # Errors
///
/// Returns an error if the pool cannot be built or the database is unreachable.
pub fn establish_pool(database_url: &str, pool_size: u32) -> DatabaseResult<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(pool_size)
        .build(manager)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))?;

    // Warm up the pool
    {
        let _conn = pool.get()?;
    }

    debug!(pool_size, "Database pool ready");
    Ok(pool)
}

/// Run pending migrations.
pub fn run_migrations(pool: &PgPool) -> DatabaseResult<usize> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))?;

    for version in &applied {
        info!(%version, "Applied migration");
    }
    Ok(applied.len())
}
