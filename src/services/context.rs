use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::StoreError;
use crate::models::{BookingPatch, BookingState, ContextRecord};

/// Several top-level context fields changed in one persisted write.
#[derive(Debug, Clone, Default)]
pub struct ContextUpdate {
    pub display_name: Option<Option<String>>,
    pub last_mentioned_movie: Option<Option<String>>,
    pub awaiting_confirmation: Option<bool>,
    pub awaiting_name: Option<bool>,
}

/// One user's conversation state. Every mutator persists before returning.
pub struct ConversationContext {
    db: Arc<Mutex<Connection>>,
    record: ContextRecord,
    version: i64,
}

impl ConversationContext {
    /// Loads the stored context or creates a fresh one. A booking sub-state
    /// that does not parse or breaks its stage invariants is reset and the
    /// repaired document is written back straight away.
    pub fn load(db: Arc<Mutex<Connection>>, user_id: &str) -> anyhow::Result<Self> {
        let stored = {
            let conn = lock(&db)?;
            queries::get_context(&conn, user_id)?
        };

        let Some(stored) = stored else {
            let mut ctx = Self {
                db,
                record: ContextRecord::new(user_id),
                version: 0,
            };
            ctx.save()?;
            return Ok(ctx);
        };

        let (record, repaired) = repair(user_id, stored.document);
        let mut ctx = Self {
            db,
            record,
            version: stored.version,
        };
        if repaired {
            ctx.save()?;
        }
        Ok(ctx)
    }

    pub fn record(&self) -> &ContextRecord {
        &self.record
    }

    pub fn user_id(&self) -> &str {
        &self.record.user_id
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn display_name(&self) -> Option<&str> {
        self.record.display_name.as_deref()
    }

    pub fn last_mentioned_movie(&self) -> Option<&str> {
        self.record.last_mentioned_movie.as_deref()
    }

    pub fn awaiting_confirmation(&self) -> bool {
        self.record.awaiting_confirmation
    }

    pub fn awaiting_name(&self) -> bool {
        self.record.awaiting_name
    }

    pub fn preference(&self, key: &str) -> Option<&serde_json::Value> {
        self.record.preferences.get(key)
    }

    pub fn set_preference(&mut self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
        self.record.preferences.insert(key.to_string(), value);
        self.save()
    }

    pub fn set_display_name(&mut self, name: &str) -> anyhow::Result<()> {
        self.update(ContextUpdate {
            display_name: Some(Some(name.to_string())),
            ..Default::default()
        })
    }

    pub fn set_awaiting_confirmation(&mut self, awaiting: bool) -> anyhow::Result<()> {
        self.update(ContextUpdate {
            awaiting_confirmation: Some(awaiting),
            ..Default::default()
        })
    }

    pub fn set_awaiting_name(&mut self, awaiting: bool) -> anyhow::Result<()> {
        self.update(ContextUpdate {
            awaiting_name: Some(awaiting),
            ..Default::default()
        })
    }

    pub fn update(&mut self, update: ContextUpdate) -> anyhow::Result<()> {
        if let Some(name) = update.display_name {
            self.record.display_name = name;
        }
        if let Some(movie) = update.last_mentioned_movie {
            self.record.last_mentioned_movie = movie;
        }
        if let Some(awaiting) = update.awaiting_confirmation {
            self.record.awaiting_confirmation = awaiting;
        }
        if let Some(awaiting) = update.awaiting_name {
            self.record.awaiting_name = awaiting;
        }
        self.save()
    }

    pub fn get_booking_state(&self) -> &BookingState {
        &self.record.booking_state
    }

    /// Merges `patch` into the booking sub-state. A patch that would leave the
    /// state inconsistent is rejected and nothing changes.
    pub fn update_booking_state(&mut self, patch: BookingPatch) -> anyhow::Result<()> {
        let mut next = self.record.booking_state.clone();
        next.apply(patch);
        next.check()?;
        self.record.booking_state = next;
        self.save()
    }

    /// Drops any booking in progress and the pending yes/no question.
    pub fn reset_booking(&mut self) -> anyhow::Result<()> {
        self.record.booking_state = BookingState::default();
        self.record.awaiting_confirmation = false;
        self.save()
    }

    pub fn add_to_history(&mut self, user_text: &str, bot_text: Option<&str>) -> anyhow::Result<()> {
        self.record.push_history(user_text, bot_text);
        self.save()
    }

    pub fn booking_progress(&self) -> u8 {
        self.record.booking_state.progress()
    }

    pub fn is_in_booking(&self) -> bool {
        self.record.booking_state.is_active()
    }

    /// Stamps `last_active` and rewrites the whole document. Fails with
    /// [`StoreError::StaleContext`] if another session saved in between.
    pub fn save(&mut self) -> anyhow::Result<()> {
        self.record.last_active = Utc::now().naive_utc();
        let conn = lock(&self.db)?;
        self.version = queries::save_context(&conn, &self.record, self.version)?;
        Ok(())
    }

    /// Replaces the context with a fresh one for the same user.
    pub fn clear(&mut self) -> anyhow::Result<()> {
        {
            let conn = lock(&self.db)?;
            queries::delete_context(&conn, &self.record.user_id)?;
        }
        self.record = ContextRecord::new(&self.record.user_id);
        self.version = 0;
        self.save()
    }
}

fn lock(db: &Arc<Mutex<Connection>>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    db.lock().map_err(|_| StoreError::Poisoned)
}

/// Parses a stored document leniently. Returns the record and whether
/// anything had to be discarded.
fn repair(user_id: &str, mut document: serde_json::Value) -> (ContextRecord, bool) {
    let booking_value = document
        .as_object_mut()
        .and_then(|obj| obj.remove("booking_state"));

    let mut repaired = false;
    let mut record = match serde_json::from_value::<ContextRecord>(document) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "stored context unreadable, starting fresh");
            repaired = true;
            ContextRecord::new(user_id)
        }
    };
    if record.user_id != user_id {
        record.user_id = user_id.to_string();
        repaired = true;
    }

    let booking_state = match booking_value {
        None | Some(serde_json::Value::Null) => BookingState::default(),
        Some(value) => match serde_json::from_value::<BookingState>(value) {
            Ok(state) => match state.check() {
                Ok(()) => state,
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "corrupt booking state reset");
                    repaired = true;
                    BookingState::default()
                }
            },
            Err(e) => {
                tracing::warn!(user_id, error = %e, "unparsable booking state reset");
                repaired = true;
                BookingState::default()
            }
        },
    };
    record.booking_state = booking_state;
    (record, repaired)
}
