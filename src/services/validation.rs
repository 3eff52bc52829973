use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::BookingRules;
use crate::models::Seat;
use crate::services::text;

static CLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+)(?:\s*[:;]\s*(\d{2}))?\s*(am|pm)?").expect("valid clock pattern")
});

#[derive(Debug, Clone, PartialEq)]
pub enum SeatIssue {
    RowOutOfRange { first: char, last: char },
    NumberOutOfRange { max: u32 },
    Taken,
    Duplicate,
}

impl std::fmt::Display for SeatIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeatIssue::RowOutOfRange { first, last } => write!(f, "Row must be {first}-{last}"),
            SeatIssue::NumberOutOfRange { max } => write!(f, "Seat must be 1-{max}"),
            SeatIssue::Taken => write!(f, "taken"),
            SeatIssue::Duplicate => write!(f, "duplicate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeatProblem {
    pub seat: Seat,
    pub issue: SeatIssue,
}

/// A user-correctable rejection. The `Display` text is shown to the user as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    UnknownShowtime { available: Vec<String> },
    NotANumber { min: u32, max: u32 },
    TooFewTickets { min: u32 },
    TooManyTickets { max: u32 },
    NoSeats,
    InvalidSeats {
        needed: u32,
        accepted: usize,
        problems: Vec<SeatProblem>,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::UnknownShowtime { available } => write!(
                f,
                "Sorry, that isn't one of the showtimes. Please choose from: {}",
                available.join(", ")
            ),
            ValidationError::NotANumber { min, max } => {
                write!(f, "Please enter a valid number of tickets ({min}-{max}).")
            }
            ValidationError::TooFewTickets { min } => {
                write!(f, "Minimum {min} ticket{}.", if *min == 1 { "" } else { "s" })
            }
            ValidationError::TooManyTickets { max } => write!(f, "Maximum {max} tickets."),
            ValidationError::NoSeats => write!(f, "Invalid format. Use format like: A1, B5, C3"),
            ValidationError::InvalidSeats {
                needed,
                accepted,
                problems,
            } => {
                let mut lines = Vec::new();
                if *accepted != *needed as usize {
                    lines.push(format!("Selected {accepted} but need {needed}."));
                }
                if !problems.is_empty() {
                    let listed = problems
                        .iter()
                        .map(|p| format!("{} ({})", p.seat, p.issue))
                        .collect::<Vec<_>>()
                        .join(", ");
                    lines.push(format!("Problems: {listed}"));
                }
                write!(f, "{}", lines.join("\n"))
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Reads a clock time out of free text as (hour, minute, has_meridiem).
fn parse_clock(input: &str) -> Option<(u32, u32, bool)> {
    let lowered = input.to_lowercase().replace('.', "");
    let caps = CLOCK_PATTERN.captures(&lowered)?;
    let digits = caps.get(1)?.as_str();
    let (mut hour, minute) = match caps.get(2) {
        Some(minutes) if digits.len() <= 2 => (digits.parse().ok()?, minutes.as_str().parse().ok()?),
        Some(_) => return None,
        None => match digits.len() {
            1 | 2 => (digits.parse().ok()?, 0),
            3 => (digits[..1].parse().ok()?, digits[1..].parse().ok()?),
            4 => (digits[..2].parse().ok()?, digits[2..].parse().ok()?),
            _ => return None,
        },
    };
    let meridiem = caps.get(3).map(|m| m.as_str());
    match meridiem {
        Some("pm") if hour < 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute, meridiem.is_some()))
}

/// Matches "14:00", "1400", "2pm" or "2" against the published times and
/// returns the canonical entry.
pub fn match_showtime(input: &str, times: &[String]) -> Option<String> {
    let (hour, minute, has_meridiem) = parse_clock(input)?;
    let find = |h: u32| {
        times
            .iter()
            .find(|t| matches!(parse_clock(t), Some((th, tm, _)) if th == h && tm == minute))
            .cloned()
    };
    find(hour).or_else(|| {
        if !has_meridiem && (1..12).contains(&hour) {
            find(hour + 12)
        } else {
            None
        }
    })
}

pub fn validate_showtime(input: &str, times: &[String]) -> Result<String, ValidationError> {
    match_showtime(input, times).ok_or_else(|| ValidationError::UnknownShowtime {
        available: times.to_vec(),
    })
}

pub fn validate_ticket_count(input: &str, rules: &BookingRules) -> Result<u32, ValidationError> {
    let count = text::extract_number(input).ok_or(ValidationError::NotANumber {
        min: rules.min_tickets,
        max: rules.max_tickets,
    })?;
    if count < rules.min_tickets {
        return Err(ValidationError::TooFewTickets {
            min: rules.min_tickets,
        });
    }
    if count > rules.max_tickets {
        return Err(ValidationError::TooManyTickets {
            max: rules.max_tickets,
        });
    }
    Ok(count)
}

/// Accepts a seat list only if every seat is in bounds, free and distinct,
/// and the count equals `needed`.
pub fn validate_seats(
    input: &str,
    rules: &BookingRules,
    taken: &HashSet<Seat>,
    needed: u32,
) -> Result<Vec<Seat>, ValidationError> {
    let requested = text::parse_seats(input);
    if requested.is_empty() {
        return Err(ValidationError::NoSeats);
    }

    let mut accepted = Vec::new();
    let mut seen = HashSet::new();
    let mut problems = Vec::new();

    for seat in requested {
        let issue = if !rules.rows.contains(&seat.row) {
            Some(SeatIssue::RowOutOfRange {
                first: rules.first_row(),
                last: rules.last_row(),
            })
        } else if seat.number < 1 || seat.number > rules.seats_per_row {
            Some(SeatIssue::NumberOutOfRange {
                max: rules.seats_per_row,
            })
        } else if !seen.insert(seat) {
            Some(SeatIssue::Duplicate)
        } else if taken.contains(&seat) {
            Some(SeatIssue::Taken)
        } else {
            None
        };

        match issue {
            Some(issue) => problems.push(SeatProblem { seat, issue }),
            None => accepted.push(seat),
        }
    }

    if !problems.is_empty() || accepted.len() != needed as usize {
        return Err(ValidationError::InvalidSeats {
            needed,
            accepted: accepted.len(),
            problems,
        });
    }
    Ok(accepted)
}
