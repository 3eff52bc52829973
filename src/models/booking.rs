use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single seat, serialised as a `["A", 1]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(char, u32)", into = "(char, u32)")]
pub struct Seat {
    pub row: char,
    pub number: u32,
}

impl Seat {
    pub fn new(row: char, number: u32) -> Self {
        Self {
            row: row.to_ascii_uppercase(),
            number,
        }
    }
}

impl From<(char, u32)> for Seat {
    fn from((row, number): (char, u32)) -> Self {
        Seat::new(row, number)
    }
}

impl From<Seat> for (char, u32) {
    fn from(seat: Seat) -> Self {
        (seat.row, seat.number)
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.number)
    }
}

pub fn format_seats(seats: &[Seat]) -> String {
    seats
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A confirmed booking. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub reference: String,
    pub user_id: String,
    pub user_name: String,
    pub movie_key: String,
    pub movie_title: String,
    pub showtime: String,
    pub tickets: u32,
    pub seats: Vec<Seat>,
    pub total: Decimal,
    pub created_at: NaiveDateTime,
}

/// Everything needed to reserve seats; the repository assigns id, reference and timestamp.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub user_name: String,
    pub movie_key: String,
    pub movie_title: String,
    pub showtime: String,
    pub tickets: u32,
    pub seats: Vec<Seat>,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_serialises_as_pair() {
        let json = serde_json::to_string(&Seat::new('a', 3)).unwrap();
        assert_eq!(json, r#"["A",3]"#);
        let seat: Seat = serde_json::from_str(r#"["B",7]"#).unwrap();
        assert_eq!(seat, Seat::new('B', 7));
    }

    #[test]
    fn test_format_seats() {
        let seats = vec![Seat::new('A', 1), Seat::new('C', 10)];
        assert_eq!(format_seats(&seats), "A1, C10");
        assert_eq!(format_seats(&[]), "");
    }
}
