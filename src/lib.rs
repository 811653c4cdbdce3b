//! Storage layer for omikuji (fortune-slip) and plain message records.
//!
//! The surrounding bot submits records, adjusts their vote counts and lists
//! or draws them back out; everything else (command parsing, photo handling,
//! payload format) lives with those collaborators. See [`RecordStore`].

use diesel_migrations::{embed_migrations, EmbeddedMigrations};

pub mod error;
pub mod models;
pub mod payload;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use models::{
    ListFilter, MessageRecord, NewRecord, Omikuji, Record, RecordKind, HIDE_THRESHOLD,
};
pub use store::{ListIter, RecordStore};

pub(crate) const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
