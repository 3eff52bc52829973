use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Farewell,
    GiveName,
    ChangeName,
    AskName,
    SmallTalkPositive,
    SmallTalkThanks,
    ShowMovies,
    MovieInfo,
    BookTickets,
    ViewBookings,
    Help,
    AskPrice,
    AskTime,
    Praise,
    Complaint,
    ConfirmBooking,
    CancelBooking,
    GoBack,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::GiveName => "give_name",
            Intent::ChangeName => "change_name",
            Intent::AskName => "ask_name",
            Intent::SmallTalkPositive => "small_talk_positive",
            Intent::SmallTalkThanks => "small_talk_thanks",
            Intent::ShowMovies => "show_movies",
            Intent::MovieInfo => "movie_info",
            Intent::BookTickets => "book_tickets",
            Intent::ViewBookings => "view_bookings",
            Intent::Help => "help",
            Intent::AskPrice => "ask_price",
            Intent::AskTime => "ask_time",
            Intent::Praise => "praise",
            Intent::Complaint => "complaint",
            Intent::ConfirmBooking => "confirm_booking",
            Intent::CancelBooking => "cancel_booking",
            Intent::GoBack => "go_back",
            Intent::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "greeting" => Intent::Greeting,
            "farewell" => Intent::Farewell,
            "give_name" => Intent::GiveName,
            "change_name" => Intent::ChangeName,
            "ask_name" => Intent::AskName,
            "small_talk_positive" => Intent::SmallTalkPositive,
            "small_talk_thanks" | "thanks" => Intent::SmallTalkThanks,
            "show_movies" => Intent::ShowMovies,
            "movie_info" => Intent::MovieInfo,
            "book_tickets" => Intent::BookTickets,
            "view_bookings" => Intent::ViewBookings,
            "help" => Intent::Help,
            "ask_price" => Intent::AskPrice,
            "ask_time" => Intent::AskTime,
            "praise" => Intent::Praise,
            "complaint" => Intent::Complaint,
            "confirm_booking" => Intent::ConfirmBooking,
            "cancel_booking" => Intent::CancelBooking,
            "go_back" => Intent::GoBack,
            _ => Intent::Unknown,
        }
    }
}

/// A resolved intent and the confidence behind it, in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IntentMatch {
    pub intent: Intent,
    pub confidence: f64,
}

impl IntentMatch {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn certain(intent: Intent) -> Self {
        Self::new(intent, 1.0)
    }

    pub fn unknown() -> Self {
        Self::new(Intent::Unknown, 0.0)
    }
}
