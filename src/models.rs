use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use strum_macros::Display;

use crate::error::StoreError;
use crate::schema::{messages, omikujis};

/// Records whose vote count falls to this value or below are hidden by
/// convention of the surrounding application. The store never enforces it;
/// readers opt in through [`ListFilter::visible_only`] or
/// [`crate::RecordStore::draw_random`].
pub const HIDE_THRESHOLD: i32 = -3;

/// Upper bound on the submitter display name, in characters.
pub const MAX_TG_NAME_LEN: usize = 32;

/// Upper bound on the photo file reference, in characters.
pub const MAX_PHOTO_LEN: usize = 32;

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = omikujis)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Omikuji {
    pub id: i32,
    pub photo: Option<String>,
    pub message: String,
    pub vote_count: i32,
    pub tg_id: i64,
    pub tg_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Same shape as [`Omikuji`] minus the photo reference.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MessageRecord {
    pub id: i32,
    pub message: String,
    pub vote_count: i32,
    pub tg_id: i64,
    pub tg_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Omikuji {
    pub fn is_hidden(&self) -> bool {
        self.vote_count <= HIDE_THRESHOLD
    }
}

impl MessageRecord {
    pub fn is_hidden(&self) -> bool {
        self.vote_count <= HIDE_THRESHOLD
    }
}

#[derive(Insertable)]
#[diesel(table_name = omikujis)]
pub(crate) struct NewOmikujiRow<'a> {
    pub photo: Option<&'a str>,
    pub message: &'a str,
    pub tg_id: i64,
    pub tg_name: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
pub(crate) struct NewMessageRow<'a> {
    pub message: &'a str,
    pub tg_id: i64,
    pub tg_name: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The two record tables the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecordKind {
    Message,
    Omikuji,
}

/// A stored record of either kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Record {
    Message(MessageRecord),
    Omikuji(Omikuji),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Message(_) => RecordKind::Message,
            Record::Omikuji(_) => RecordKind::Omikuji,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Record::Message(m) => m.id,
            Record::Omikuji(o) => o.id,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Record::Message(m) => &m.message,
            Record::Omikuji(o) => &o.message,
        }
    }

    pub fn vote_count(&self) -> i32 {
        match self {
            Record::Message(m) => m.vote_count,
            Record::Omikuji(o) => o.vote_count,
        }
    }

    pub fn tg_id(&self) -> i64 {
        match self {
            Record::Message(m) => m.tg_id,
            Record::Omikuji(o) => o.tg_id,
        }
    }

    pub fn tg_name(&self) -> &str {
        match self {
            Record::Message(m) => &m.tg_name,
            Record::Omikuji(o) => &o.tg_name,
        }
    }

    /// Photo file reference, if this record kind carries one.
    pub fn photo(&self) -> Option<&str> {
        match self {
            Record::Message(_) => None,
            Record::Omikuji(o) => o.photo.as_deref(),
        }
    }

    pub fn created_at(&self) -> NaiveDateTime {
        match self {
            Record::Message(m) => m.created_at,
            Record::Omikuji(o) => o.created_at,
        }
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        match self {
            Record::Message(m) => m.updated_at,
            Record::Omikuji(o) => o.updated_at,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.vote_count() <= HIDE_THRESHOLD
    }
}

/// A submission about to be persisted. The photo capability only exists on
/// the omikuji variant, so a plain message with a photo is unrepresentable.
#[derive(Debug, Clone, Copy)]
pub enum NewRecord<'a> {
    Message {
        message: &'a str,
        tg_id: i64,
        tg_name: &'a str,
    },
    Omikuji {
        message: &'a str,
        tg_id: i64,
        tg_name: &'a str,
        photo: Option<&'a str>,
    },
}

impl NewRecord<'_> {
    pub fn kind(&self) -> RecordKind {
        match self {
            NewRecord::Message { .. } => RecordKind::Message,
            NewRecord::Omikuji { .. } => RecordKind::Omikuji,
        }
    }

    /// Checked before any write is attempted.
    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        let (message, tg_name, photo) = match *self {
            NewRecord::Message {
                message, tg_name, ..
            } => (message, tg_name, None),
            NewRecord::Omikuji {
                message,
                tg_name,
                photo,
                ..
            } => (message, tg_name, photo),
        };
        if message.is_empty() {
            return Err(StoreError::Validation("message must not be empty".into()));
        }
        if tg_name.is_empty() {
            return Err(StoreError::Validation("tg_name must not be empty".into()));
        }
        if tg_name.chars().count() > MAX_TG_NAME_LEN {
            return Err(StoreError::Validation(format!(
                "tg_name exceeds {} characters",
                MAX_TG_NAME_LEN
            )));
        }
        if let Some(photo) = photo {
            if photo.chars().count() > MAX_PHOTO_LEN {
                return Err(StoreError::Validation(format!(
                    "photo reference exceeds {} characters",
                    MAX_PHOTO_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Predicate for [`crate::RecordStore::list`]. Defaults to "everything".
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Only records submitted by this actor.
    pub tg_id: Option<i64>,
    /// Skip records at or below [`HIDE_THRESHOLD`].
    pub visible_only: bool,
    /// Keyset cursor: only records with an id strictly greater than this.
    pub after_id: Option<i32>,
    /// Maximum number of records to return.
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(message: &'static str, tg_name: &'static str) -> NewRecord<'static> {
        NewRecord::Message {
            message,
            tg_id: 1,
            tg_name,
        }
    }

    #[test]
    fn accepts_well_formed_submissions() {
        assert!(plain("fortune:1", "alice").validate().is_ok());
        let with_photo = NewRecord::Omikuji {
            message: "fortune:2",
            tg_id: 1,
            tg_name: "bob",
            photo: Some("AgACAgUAAxkBAAIB"),
        };
        assert!(with_photo.validate().is_ok());
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(matches!(
            plain("", "alice").validate(),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            plain("fortune:1", "").validate(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn name_cap_counts_characters_not_bytes() {
        // 32 multibyte characters are fine even though they exceed 32 bytes.
        let name = "大".repeat(32);
        let record = NewRecord::Message {
            message: "fortune:1",
            tg_id: 1,
            tg_name: &name,
        };
        assert!(record.validate().is_ok());

        let too_long = "x".repeat(33);
        let record = NewRecord::Message {
            message: "fortune:1",
            tg_id: 1,
            tg_name: &too_long,
        };
        assert!(matches!(
            record.validate(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn rejects_oversized_photo_reference() {
        let photo = "p".repeat(33);
        let record = NewRecord::Omikuji {
            message: "fortune:1",
            tg_id: 1,
            tg_name: "alice",
            photo: Some(&photo),
        };
        assert!(matches!(
            record.validate(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn hidden_threshold_is_inclusive() {
        let mut record = MessageRecord {
            id: 1,
            message: "fortune:1".into(),
            vote_count: -2,
            tg_id: 1,
            tg_name: "alice".into(),
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
        };
        assert!(!record.is_hidden());
        record.vote_count = -3;
        assert!(record.is_hidden());
    }
}
