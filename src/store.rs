use std::collections::VecDeque;
use std::env;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::MigrationHarness;
use dotenv::dotenv;
use rand::{thread_rng, Rng};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{
    ListFilter, MessageRecord, NewMessageRow, NewOmikujiRow, NewRecord, Omikuji, Record,
    RecordKind, HIDE_THRESHOLD,
};
use crate::schema;
use crate::MIGRATIONS;

/// Page size used by [`RecordStore::iter`].
const ITER_PAGE_SIZE: i64 = 64;

/// Durable store for omikuji and message records.
///
/// A single guarded connection serializes all callers, so every operation is
/// one atomic statement from the outside. The connection is cheap to share
/// behind an `Arc` across threads.
pub struct RecordStore {
    conn: Mutex<SqliteConnection>,
}

//
// Connection management
//

impl RecordStore {
    /// Opens (creating if necessary) the database at `database_url` and runs
    /// any pending migrations.
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        let mut conn = SqliteConnection::establish(database_url)?;
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;",
        )?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        if !applied.is_empty() {
            info!("applied {} pending migrations", applied.len());
        }
        info!(database_url, "record store opened");
        Ok(RecordStore {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory store. Contents vanish on drop.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    /// Opens the store at `DATABASE_URL`, loading `.env` first.
    pub fn from_env() -> Result<Self, StoreError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| StoreError::Config("DATABASE_URL must be set".into()))?;
        Self::open(&database_url)
    }

    fn conn(&self) -> MutexGuard<'_, SqliteConnection> {
        // A poisoned lock still holds a usable connection.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

//
// Record operations
//

impl RecordStore {
    /// Persists a new record and returns it fully populated: fresh unique
    /// id, `vote_count` of zero and `created_at == updated_at`.
    pub fn create(&self, new: NewRecord<'_>) -> Result<Record, StoreError> {
        new.validate()?;
        let now = Utc::now().naive_utc();
        let conn = &mut *self.conn();
        let record = match new {
            NewRecord::Message {
                message,
                tg_id,
                tg_name,
            } => {
                let row = NewMessageRow {
                    message,
                    tg_id,
                    tg_name,
                    created_at: now,
                    updated_at: now,
                };
                let stored = diesel::insert_into(schema::messages::table)
                    .values(&row)
                    .returning(MessageRecord::as_returning())
                    .get_result(conn)?;
                Record::Message(stored)
            }
            NewRecord::Omikuji {
                message,
                tg_id,
                tg_name,
                photo,
            } => {
                let row = NewOmikujiRow {
                    photo,
                    message,
                    tg_id,
                    tg_name,
                    created_at: now,
                    updated_at: now,
                };
                let stored = diesel::insert_into(schema::omikujis::table)
                    .values(&row)
                    .returning(Omikuji::as_returning())
                    .get_result(conn)?;
                Record::Omikuji(stored)
            }
        };
        debug!(kind = %record.kind(), id = record.id(), "record created");
        Ok(record)
    }

    /// Fetches a record by id.
    pub fn get(&self, kind: RecordKind, id: i32) -> Result<Record, StoreError> {
        let conn = &mut *self.conn();
        Self::fetch(conn, kind, id)
    }

    /// Atomically applies `vote_count += delta` and refreshes `updated_at`,
    /// returning the updated record. The timestamp refreshes even for a zero
    /// delta. No floor or ceiling is applied; the hide threshold is read-side
    /// policy only.
    pub fn adjust_vote(
        &self,
        kind: RecordKind,
        id: i32,
        delta: i32,
    ) -> Result<Record, StoreError> {
        let now = Utc::now().naive_utc();
        let conn = &mut *self.conn();
        let updated = match kind {
            RecordKind::Message => {
                use schema::messages::dsl;
                diesel::update(dsl::messages.find(id))
                    .set((
                        dsl::vote_count.eq(dsl::vote_count + delta),
                        dsl::updated_at.eq(now),
                    ))
                    .execute(conn)?
            }
            RecordKind::Omikuji => {
                use schema::omikujis::dsl;
                diesel::update(dsl::omikujis.find(id))
                    .set((
                        dsl::vote_count.eq(dsl::vote_count + delta),
                        dsl::updated_at.eq(now),
                    ))
                    .execute(conn)?
            }
        };
        if updated == 0 {
            return Err(StoreError::NotFound { kind, id });
        }
        debug!(%kind, id, delta, "vote adjusted");
        Self::fetch(conn, kind, id)
    }

    /// Returns records matching `filter`, ordered by id ascending.
    pub fn list(&self, kind: RecordKind, filter: &ListFilter) -> Result<Vec<Record>, StoreError> {
        let conn = &mut *self.conn();
        Self::page(conn, kind, filter)
    }

    /// Lazy sequence over all records matching `filter`, fetched in fixed
    /// size pages so no lock is held between pulls. `filter.limit` is
    /// ignored; stop consuming instead. Rebuilding the iterator restarts
    /// the scan.
    pub fn iter(&self, kind: RecordKind, filter: ListFilter) -> ListIter<'_> {
        ListIter {
            store: self,
            kind,
            filter,
            buf: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Picks a uniformly random record that is not hidden, or `None` when
    /// every record is hidden or the table is empty.
    pub fn draw_random(&self, kind: RecordKind) -> Result<Option<Record>, StoreError> {
        let conn = &mut *self.conn();
        match kind {
            RecordKind::Message => {
                use schema::messages::dsl;
                let count: i64 = dsl::messages
                    .filter(dsl::vote_count.gt(HIDE_THRESHOLD))
                    .count()
                    .get_result(conn)?;
                if count == 0 {
                    return Ok(None);
                }
                let offset = thread_rng().gen_range(0..count);
                let record = dsl::messages
                    .filter(dsl::vote_count.gt(HIDE_THRESHOLD))
                    .order(dsl::id.asc())
                    .limit(1)
                    .offset(offset)
                    .select(MessageRecord::as_select())
                    .get_result(conn)?;
                Ok(Some(Record::Message(record)))
            }
            RecordKind::Omikuji => {
                use schema::omikujis::dsl;
                let count: i64 = dsl::omikujis
                    .filter(dsl::vote_count.gt(HIDE_THRESHOLD))
                    .count()
                    .get_result(conn)?;
                if count == 0 {
                    return Ok(None);
                }
                let offset = thread_rng().gen_range(0..count);
                let record = dsl::omikujis
                    .filter(dsl::vote_count.gt(HIDE_THRESHOLD))
                    .order(dsl::id.asc())
                    .limit(1)
                    .offset(offset)
                    .select(Omikuji::as_select())
                    .get_result(conn)?;
                Ok(Some(Record::Omikuji(record)))
            }
        }
    }

    fn fetch(
        conn: &mut SqliteConnection,
        kind: RecordKind,
        id: i32,
    ) -> Result<Record, StoreError> {
        let record = match kind {
            RecordKind::Message => schema::messages::table
                .find(id)
                .select(MessageRecord::as_select())
                .first(conn)
                .optional()?
                .map(Record::Message),
            RecordKind::Omikuji => schema::omikujis::table
                .find(id)
                .select(Omikuji::as_select())
                .first(conn)
                .optional()?
                .map(Record::Omikuji),
        };
        record.ok_or(StoreError::NotFound { kind, id })
    }

    fn page(
        conn: &mut SqliteConnection,
        kind: RecordKind,
        filter: &ListFilter,
    ) -> Result<Vec<Record>, StoreError> {
        match kind {
            RecordKind::Message => {
                use schema::messages::dsl;
                let mut query = dsl::messages
                    .select(MessageRecord::as_select())
                    .order(dsl::id.asc())
                    .into_boxed();
                if let Some(actor) = filter.tg_id {
                    query = query.filter(dsl::tg_id.eq(actor));
                }
                if filter.visible_only {
                    query = query.filter(dsl::vote_count.gt(HIDE_THRESHOLD));
                }
                if let Some(cursor) = filter.after_id {
                    query = query.filter(dsl::id.gt(cursor));
                }
                if let Some(limit) = filter.limit {
                    query = query.limit(limit);
                }
                Ok(query
                    .load(conn)?
                    .into_iter()
                    .map(Record::Message)
                    .collect())
            }
            RecordKind::Omikuji => {
                use schema::omikujis::dsl;
                let mut query = dsl::omikujis
                    .select(Omikuji::as_select())
                    .order(dsl::id.asc())
                    .into_boxed();
                if let Some(actor) = filter.tg_id {
                    query = query.filter(dsl::tg_id.eq(actor));
                }
                if filter.visible_only {
                    query = query.filter(dsl::vote_count.gt(HIDE_THRESHOLD));
                }
                if let Some(cursor) = filter.after_id {
                    query = query.filter(dsl::id.gt(cursor));
                }
                if let Some(limit) = filter.limit {
                    query = query.limit(limit);
                }
                Ok(query
                    .load(conn)?
                    .into_iter()
                    .map(Record::Omikuji)
                    .collect())
            }
        }
    }
}

/// See [`RecordStore::iter`].
pub struct ListIter<'a> {
    store: &'a RecordStore,
    kind: RecordKind,
    filter: ListFilter,
    buf: VecDeque<Record>,
    exhausted: bool,
}

impl Iterator for ListIter<'_> {
    type Item = Result<Record, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() && !self.exhausted {
            let mut page_filter = self.filter.clone();
            page_filter.limit = Some(ITER_PAGE_SIZE);
            match self.store.list(self.kind, &page_filter) {
                Ok(page) => {
                    if (page.len() as i64) < ITER_PAGE_SIZE {
                        self.exhausted = true;
                    }
                    if let Some(last) = page.last() {
                        self.filter.after_id = Some(last.id());
                    }
                    self.buf.extend(page);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buf.pop_front().map(Ok)
    }
}
