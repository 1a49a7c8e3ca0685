//! SQLite storage implementation for the promo-code service.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the repository traits defined in `promocode-core` and contains:
//! - Database configuration, connection pooling and management
//! - Diesel migrations
//! - The single-writer actor that serialises writes
//! - Repository implementations and their database model types
//!
//! ```text
//!        core (domain)
//!              │
//!              ▼
//!   storage-sqlite (this crate)
//!              │
//!              ▼
//!          SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;

// Repository implementations
pub mod partners;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConfig,
    DbConnection, DbPool, WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from promocode-core for convenience
pub use promocode_core::errors::{DatabaseError, Error, Result};
