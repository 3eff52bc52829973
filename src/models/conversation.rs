use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::booking::Seat;
use crate::config::{MAX_TICKETS, MIN_TICKETS};

/// Most recent turns kept in a persisted context.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Time,
    Tickets,
    Seats,
    Confirm,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [Stage::Time, Stage::Tickets, Stage::Seats, Stage::Confirm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Time => "time",
            Stage::Tickets => "tickets",
            Stage::Seats => "seats",
            Stage::Confirm => "confirm",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Stage::Time => 0,
            Stage::Tickets => 1,
            Stage::Seats => 2,
            Stage::Confirm => 3,
        }
    }

    /// The stage one step back, `None` from the first stage.
    pub fn previous(&self) -> Option<Stage> {
        match self.index() {
            0 => None,
            i => Some(Self::ORDER[i - 1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingStateError {
    #[error("stage {0:?} has no movie")]
    MissingMovie(Stage),
    #[error("stage {0:?} has no showtime")]
    MissingTime(Stage),
    #[error("stage {0:?} has no ticket count")]
    MissingTickets(Stage),
    #[error("ticket count {0} is outside {min}-{max}", min = MIN_TICKETS, max = MAX_TICKETS)]
    TicketsOutOfRange(u32),
    #[error("confirm stage holds {seats} seats for {tickets} tickets")]
    SeatCountMismatch { seats: usize, tickets: u32 },
}

/// Booking sub-state of a conversation. `stage == None` means no booking in progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingState {
    pub stage: Option<Stage>,
    pub movie: Option<String>,
    pub time: Option<String>,
    pub tickets: Option<u32>,
    #[serde(default)]
    pub seats: Vec<Seat>,
}

impl BookingState {
    pub fn is_active(&self) -> bool {
        self.stage.is_some()
    }

    /// Percentage through the workflow: 25 per completed-or-current stage.
    pub fn progress(&self) -> u8 {
        match self.stage {
            Some(stage) => ((stage.index() + 1) * 100 / Stage::ORDER.len()) as u8,
            None => 0,
        }
    }

    /// Checks that every field the current stage depends on is populated.
    pub fn check(&self) -> Result<(), BookingStateError> {
        let Some(stage) = self.stage else {
            return Ok(());
        };

        if self.movie.is_none() {
            return Err(BookingStateError::MissingMovie(stage));
        }
        if stage.index() >= Stage::Tickets.index() && self.time.is_none() {
            return Err(BookingStateError::MissingTime(stage));
        }
        if stage.index() >= Stage::Seats.index() && self.tickets.is_none() {
            return Err(BookingStateError::MissingTickets(stage));
        }
        if let Some(tickets) = self.tickets {
            if !(MIN_TICKETS..=MAX_TICKETS).contains(&tickets) {
                return Err(BookingStateError::TicketsOutOfRange(tickets));
            }
        }
        if stage == Stage::Confirm {
            let tickets = self.tickets.unwrap_or(0);
            if self.seats.len() != tickets as usize {
                return Err(BookingStateError::SeatCountMismatch {
                    seats: self.seats.len(),
                    tickets,
                });
            }
        }
        Ok(())
    }

    /// Shallow merge: only the fields present in the patch are replaced.
    pub fn apply(&mut self, patch: BookingPatch) {
        if let Some(stage) = patch.stage {
            self.stage = stage;
        }
        if let Some(movie) = patch.movie {
            self.movie = movie;
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        if let Some(tickets) = patch.tickets {
            self.tickets = tickets;
        }
        if let Some(seats) = patch.seats {
            self.seats = seats;
        }
    }
}

/// Partial update for [`BookingState`]. The outer `Option` says "touch this field",
/// the inner one is the new value (`None` clears it).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    pub stage: Option<Option<Stage>>,
    pub movie: Option<Option<String>>,
    pub time: Option<Option<String>>,
    pub tickets: Option<Option<u32>>,
    pub seats: Option<Vec<Seat>>,
}

impl BookingPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(Some(stage));
        self
    }

    pub fn movie(mut self, key: impl Into<String>) -> Self {
        self.movie = Some(Some(key.into()));
        self
    }

    pub fn time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(Some(time.into()));
        self
    }

    pub fn tickets(mut self, tickets: u32) -> Self {
        self.tickets = Some(Some(tickets));
        self
    }

    pub fn seats(mut self, seats: Vec<Seat>) -> Self {
        self.seats = Some(seats);
        self
    }

    pub fn clear_time(mut self) -> Self {
        self.time = Some(None);
        self
    }

    pub fn clear_tickets(mut self) -> Self {
        self.tickets = Some(None);
        self
    }

    pub fn clear_seats(mut self) -> Self {
        self.seats = Some(Vec::new());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: NaiveDateTime,
    pub user_text: String,
    pub bot_text: Option<String>,
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// The persisted document for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextRecord {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub booking_state: BookingState,
    #[serde(default)]
    pub last_mentioned_movie: Option<String>,
    #[serde(default)]
    pub awaiting_confirmation: bool,
    #[serde(default)]
    pub awaiting_name: bool,
    #[serde(default = "now")]
    pub session_start: NaiveDateTime,
    #[serde(default = "now")]
    pub last_active: NaiveDateTime,
}

impl ContextRecord {
    pub fn new(user_id: &str) -> Self {
        let now = now();
        Self {
            user_id: user_id.to_string(),
            display_name: None,
            preferences: BTreeMap::new(),
            conversation_history: Vec::new(),
            booking_state: BookingState::default(),
            last_mentioned_movie: None,
            awaiting_confirmation: false,
            awaiting_name: false,
            session_start: now,
            last_active: now,
        }
    }

    /// Appends a turn and evicts the oldest entries beyond [`HISTORY_LIMIT`].
    pub fn push_history(&mut self, user_text: &str, bot_text: Option<&str>) {
        self.conversation_history.push(HistoryEntry {
            timestamp: now(),
            user_text: user_text.to_string(),
            bot_text: bot_text.map(str::to_string),
        });
        if self.conversation_history.len() > HISTORY_LIMIT {
            let excess = self.conversation_history.len() - HISTORY_LIMIT;
            self.conversation_history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(stage: Option<Stage>) -> BookingState {
        BookingState {
            stage,
            movie: Some("dune2".to_string()),
            time: Some("13:00".to_string()),
            tickets: Some(2),
            seats: vec![Seat::new('A', 1), Seat::new('A', 2)],
        }
    }

    #[test]
    fn test_progress_per_stage() {
        assert_eq!(BookingState::default().progress(), 0);
        assert_eq!(state(Some(Stage::Time)).progress(), 25);
        assert_eq!(state(Some(Stage::Tickets)).progress(), 50);
        assert_eq!(state(Some(Stage::Seats)).progress(), 75);
        assert_eq!(state(Some(Stage::Confirm)).progress(), 100);
    }

    #[test]
    fn test_previous_stage() {
        assert_eq!(Stage::Time.previous(), None);
        assert_eq!(Stage::Tickets.previous(), Some(Stage::Time));
        assert_eq!(Stage::Confirm.previous(), Some(Stage::Seats));
    }

    #[test]
    fn test_check_detects_missing_movie() {
        let mut s = state(Some(Stage::Time));
        s.movie = None;
        assert_eq!(s.check(), Err(BookingStateError::MissingMovie(Stage::Time)));
    }

    #[test]
    fn test_check_confirm_requires_matching_seat_count() {
        let mut s = state(Some(Stage::Confirm));
        assert!(s.check().is_ok());
        s.seats.pop();
        assert_eq!(
            s.check(),
            Err(BookingStateError::SeatCountMismatch { seats: 1, tickets: 2 })
        );
    }

    #[test]
    fn test_check_rejects_ticket_count_out_of_range() {
        let mut s = state(Some(Stage::Seats));
        s.seats.clear();
        s.tickets = Some(0);
        assert_eq!(s.check(), Err(BookingStateError::TicketsOutOfRange(0)));
        s.tickets = Some(MAX_TICKETS + 1);
        assert_eq!(
            s.check(),
            Err(BookingStateError::TicketsOutOfRange(MAX_TICKETS + 1))
        );
        s.tickets = Some(MAX_TICKETS);
        assert!(s.check().is_ok());
    }

    #[test]
    fn test_patch_is_shallow() {
        let mut s = state(Some(Stage::Seats));
        s.apply(BookingPatch::new().stage(Stage::Tickets).clear_tickets().clear_seats());
        assert_eq!(s.stage, Some(Stage::Tickets));
        assert_eq!(s.movie.as_deref(), Some("dune2"));
        assert_eq!(s.time.as_deref(), Some("13:00"));
        assert_eq!(s.tickets, None);
        assert!(s.seats.is_empty());
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let mut record = ContextRecord::new("u1");
        for i in 0..(HISTORY_LIMIT + 7) {
            record.push_history(&format!("msg {i}"), Some("ok"));
        }
        assert_eq!(record.conversation_history.len(), HISTORY_LIMIT);
        assert_eq!(record.conversation_history[0].user_text, "msg 7");
        assert_eq!(
            record.conversation_history.last().unwrap().user_text,
            format!("msg {}", HISTORY_LIMIT + 6)
        );
    }

    #[test]
    fn test_null_stage_round_trips() {
        let json = serde_json::to_value(BookingState::default()).unwrap();
        assert!(json["stage"].is_null());
        assert_eq!(json["seats"], serde_json::json!([]));
    }
}
