//! Passage outline engine.
//!
//! A passage is partitioned into columns, each column into colored sections
//! and each section into segments. Every tier is anchored on a [`WordId`]
//! rather than on array offsets, so the passage text can be re-fetched from
//! any translation without invalidating the outline.

#[macro_use]
extern crate diesel;

use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;

/// Type of a pooled SQLite connection manager.
pub type SqliteConnectionManager = r2d2::ConnectionManager<SqliteConnection>;

/// Type for a SQLite connection pool.
pub type SqliteConnectionPool = r2d2::Pool<SqliteConnectionManager>;

pub type DbConnection = SqliteConnection;

/// Migrations bundled into the binary, so that the CLI can run from any
/// working directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Error, Debug, PartialEq)]
pub enum DbError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("User not authorized to update this segment")]
    SegmentUnauthorized,

    #[error("Cannot insert column at the beginning of an existing column")]
    ColumnBoundary,

    #[error("Cannot insert section at the beginning of an existing section")]
    SectionBoundary,

    #[error("Cannot insert segment at the beginning of a section")]
    SegmentAtSectionStart,

    #[error("Cannot insert segment at the beginning of an existing segment")]
    SegmentBoundary,

    #[error("Invalid insertion point")]
    InvalidInsertionPoint,

    #[error("{} not found or does not belong to this passage", entity)]
    NotInPassage { entity: &'static str },

    #[error("Segment not found")]
    SegmentNotFound,

    #[error("Column not found")]
    ColumnNotFound,

    #[error("Passage '{}' was not found.", passage)]
    PassageNotFound { passage: String },

    #[error("Study '{}' was not found.", study)]
    StudyNotFound { study: String },

    #[error("'{}' was not found.", book)]
    BookNotFound { book: String },

    #[error("Passage '{}' already has a structure", passage)]
    StructureExists { passage: String },

    #[error("Invalid color. Must be one of: red, orange, yellow, green, aqua, blue, purple, pink")]
    InvalidColor { color: String },

    #[error("Note exceeds {max} character limit", max = models::NOTE_MAX_CHARS)]
    NoteTooLong { length: usize },

    #[error("Invalid headingType. Must be one, two, or three")]
    InvalidHeadingType { heading: String },

    #[error("'{}' is not a valid word ID.", word_id)]
    InvalidWordId { word_id: String },

    #[error("'{}' is not a valid Bible reference.", reference)]
    InvalidReference { reference: String },

    #[error("There was a connection pool error. Root cause: {:?}.", cause)]
    ConnectionPool { cause: String },

    #[error("There was a database error. Root cause: {:?}.", cause)]
    Other { cause: String },

    #[error("There was a database migration error. Root cause: {:?}.", cause)]
    Migration { cause: String },
}

impl From<diesel::result::Error> for DbError {
    fn from(e: diesel::result::Error) -> Self {
        DbError::Other {
            cause: e.to_string(),
        }
    }
}

impl From<r2d2::PoolError> for DbError {
    fn from(e: r2d2::PoolError) -> Self {
        DbError::ConnectionPool {
            cause: e.to_string(),
        }
    }
}

/// Per-connection settings applied whenever the pool hands out a connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub busy_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: BUSY_TIMEOUT,
        }
    }
}

impl ConnectionOptions {
    fn apply(&self, conn: &mut SqliteConnection) -> QueryResult<()> {
        // Cascading deletes from a passage rely on foreign key enforcement,
        // which SQLite leaves off for every new connection.
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ))
    }
}

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        self.apply(conn).map_err(r2d2::Error::QueryError)
    }
}

/// Builds a SQLite connection pool with the given URL.
pub fn build_pool(db_url: &str) -> Result<SqliteConnectionPool, DbError> {
    r2d2::Pool::builder()
        .max_size(15)
        .connection_customizer(Box::new(ConnectionOptions::default()))
        .build(SqliteConnectionManager::new(db_url))
        .map_err(DbError::from)
}

/// Establishes a non-pooled SQLite connection.
pub fn establish_connection(db_url: &str) -> Result<SqliteConnection, DbError> {
    let mut conn = SqliteConnection::establish(db_url).map_err(|e| DbError::ConnectionPool {
        cause: format!("Error connecting to {db_url}: {e}"),
    })?;
    ConnectionOptions::default().apply(&mut conn)?;
    Ok(conn)
}

/// Run any pending Diesel migrations.
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), DbError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| DbError::Migration {
            cause: e.to_string(),
        })
}

pub mod loader;
pub mod locator;
pub mod metadata;
pub mod models;
pub mod outliner;
mod schema;
pub mod store;
pub mod studies;

pub use metadata::{prefetch_bible_metadata, BibleMetadata};
pub use models::{Color, HeadingType, WordId};
pub use outliner::{Outliner, PassageStructure};
