//! Database layer
//!
//! SQLite (default, single file) or MySQL, selected by configuration. On top
//! of the pool sits a small document store that keeps the `users`, `posts`,
//! and `comments` collections as JSON documents.
//!
//! ```ignore
//! use syncvote::config::DatabaseConfig;
//! use syncvote::db::{create_pool, migrations, SqlxDocumentStore};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! let store = SqlxDocumentStore::boxed(pool);
//! ```

pub mod migrations;
pub mod pool;
pub mod store;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
pub use store::{
    to_fields, Collection, Document, DocumentStore, Fields, Filter, Snapshot, SqlxDocumentStore,
};
