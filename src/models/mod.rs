pub mod booking;
pub mod conversation;
pub mod intent;
pub mod movie;

pub use booking::{format_seats, Booking, NewBooking, Seat};
pub use conversation::{
    BookingPatch, BookingState, BookingStateError, ContextRecord, HistoryEntry, Stage,
    HISTORY_LIMIT,
};
pub use intent::{Intent, IntentMatch};
pub use movie::Movie;
