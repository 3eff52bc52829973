use std::str::FromStr;

use chrono::{NaiveDateTime, Timelike, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use rust_decimal::Decimal;

use crate::errors::StoreError;
use crate::models::{Booking, ContextRecord, NewBooking, Seat};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Contexts ──

/// A context document as stored, before any validation.
pub struct StoredContext {
    pub document: serde_json::Value,
    pub version: i64,
}

pub fn get_context(conn: &Connection, user_id: &str) -> anyhow::Result<Option<StoredContext>> {
    let row = conn
        .query_row(
            "SELECT document, version FROM contexts WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    Ok(row.map(|(document, version)| StoredContext {
        document: serde_json::from_str(&document).unwrap_or(serde_json::Value::Null),
        version,
    }))
}

/// Rewrites the whole document if the stored version still equals `expected_version`
/// (0 means "not stored yet"). Returns the new version.
pub fn save_context(
    conn: &Connection,
    record: &ContextRecord,
    expected_version: i64,
) -> anyhow::Result<i64> {
    let document = serde_json::to_string(record)?;
    let now = Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string();

    let count = if expected_version == 0 {
        conn.execute(
            "INSERT INTO contexts (user_id, document, version, updated_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(user_id) DO NOTHING",
            params![record.user_id, document, now],
        )?
    } else {
        conn.execute(
            "UPDATE contexts SET document = ?1, version = version + 1, updated_at = ?2
             WHERE user_id = ?3 AND version = ?4",
            params![document, now, record.user_id, expected_version],
        )?
    };

    if count == 0 {
        return Err(StoreError::StaleContext {
            user_id: record.user_id.clone(),
        }
        .into());
    }
    Ok(expected_version + 1)
}

pub fn delete_context(conn: &Connection, user_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM contexts WHERE user_id = ?1", params![user_id])?;
    Ok(count > 0)
}

// ── Bookings ──

pub fn reference_exists(conn: &Connection, reference: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE reference = ?1",
        params![reference],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Inserts the booking and one `booked_seats` row per seat in a single transaction.
/// Any seat already reserved for the same movie and showtime aborts the whole insert.
pub fn insert_booking(
    conn: &mut Connection,
    booking: &NewBooking,
    reference: &str,
) -> anyhow::Result<Booking> {
    let now = Utc::now().naive_utc();
    let created_at = now.with_nanosecond(0).unwrap_or(now);
    let seats_json = serde_json::to_string(&booking.seats)?;
    let tx = conn.transaction()?;

    for seat in &booking.seats {
        let taken: i64 = tx.query_row(
            "SELECT COUNT(*) FROM booked_seats
             WHERE movie_key = ?1 AND showtime = ?2 AND seat_row = ?3 AND seat_number = ?4",
            params![
                booking.movie_key,
                booking.showtime,
                seat.row.to_string(),
                seat.number
            ],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(seat_taken(booking, seat).into());
        }
    }

    tx.execute(
        "INSERT INTO bookings (reference, user_id, user_name, movie_key, movie_title, showtime, tickets, seats, total, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            reference,
            booking.user_id,
            booking.user_name,
            booking.movie_key,
            booking.movie_title,
            booking.showtime,
            booking.tickets,
            seats_json,
            booking.total.to_string(),
            created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    let id = tx.last_insert_rowid();

    for seat in &booking.seats {
        let inserted = tx.execute(
            "INSERT INTO booked_seats (booking_id, movie_key, showtime, seat_row, seat_number)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                booking.movie_key,
                booking.showtime,
                seat.row.to_string(),
                seat.number
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(seat_taken(booking, seat).into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    tx.commit()?;

    Ok(Booking {
        id,
        reference: reference.to_string(),
        user_id: booking.user_id.clone(),
        user_name: booking.user_name.clone(),
        movie_key: booking.movie_key.clone(),
        movie_title: booking.movie_title.clone(),
        showtime: booking.showtime.clone(),
        tickets: booking.tickets,
        seats: booking.seats.clone(),
        total: booking.total,
        created_at,
    })
}

fn seat_taken(booking: &NewBooking, seat: &Seat) -> StoreError {
    StoreError::SeatTaken {
        movie_key: booking.movie_key.clone(),
        showtime: booking.showtime.clone(),
        seat: seat.to_string(),
    }
}

const BOOKING_COLUMNS: &str =
    "id, reference, user_id, user_name, movie_key, movie_title, showtime, tickets, seats, total, created_at";

pub fn get_all_bookings(conn: &Connection) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_booking_by_reference(
    conn: &Connection,
    reference: &str,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE reference = ?1"),
        params![reference],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_taken_seats(
    conn: &Connection,
    movie_key: &str,
    showtime: &str,
) -> anyhow::Result<Vec<Seat>> {
    let mut stmt = conn.prepare(
        "SELECT seat_row, seat_number FROM booked_seats
         WHERE movie_key = ?1 AND showtime = ?2 ORDER BY seat_row, seat_number",
    )?;
    let rows = stmt.query_map(params![movie_key, showtime], |row| {
        let seat_row: String = row.get(0)?;
        let number: u32 = row.get(1)?;
        Ok((seat_row, number))
    })?;

    let mut seats = vec![];
    for row in rows {
        let (seat_row, number) = row?;
        if let Some(r) = seat_row.chars().next() {
            seats.push(Seat::new(r, number));
        }
    }
    Ok(seats)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: i64 = row.get(0)?;
    let reference: String = row.get(1)?;
    let user_id: String = row.get(2)?;
    let user_name: String = row.get(3)?;
    let movie_key: String = row.get(4)?;
    let movie_title: String = row.get(5)?;
    let showtime: String = row.get(6)?;
    let tickets: u32 = row.get(7)?;
    let seats_json: String = row.get(8)?;
    let total_str: String = row.get(9)?;
    let created_at_str: String = row.get(10)?;

    let seats: Vec<Seat> = serde_json::from_str(&seats_json)?;
    let total = Decimal::from_str(&total_str)?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Booking {
        id,
        reference,
        user_id,
        user_name,
        movie_key,
        movie_title,
        showtime,
        tickets,
        seats,
        total,
        created_at,
    })
}
