//! PostgreSQL persistence for Portcullis.
//!
//! This crate provides the diesel schema, row models and embedded
//! migrations for the gateway tables, plus two [`GatewayStore`]
//! implementations:
//!
//! - [`PgGatewayStore`] over an r2d2 connection pool
//! - [`MemoryGatewayStore`] for tests and database-less runs
//!
//! # Example
//!
//! ```rust,ignore
//! use portcullis_database::{establish_pool, run_migrations, PgGatewayStore};
//!
//! let pool = establish_pool(&std::env::var("DATABASE_URL")?, 10)?;
//! run_migrations(&pool)?;
//! let store = PgGatewayStore::new(pool);
//! ```
//!
//! [`GatewayStore`]: portcullis_interface::GatewayStore

mod connection;
mod memory_store;
mod models;
mod pg_store;

pub mod schema;

pub use connection::{PgPool, establish_pool, run_migrations};
pub use memory_store::MemoryGatewayStore;
pub use pg_store::{LAST_COMMIT_KEY, PgGatewayStore};

use portcullis_error::DatabaseError;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
