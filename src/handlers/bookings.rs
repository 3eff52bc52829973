use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::Booking;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    reference: String,
    user_id: String,
    user_name: String,
    movie_key: String,
    movie_title: String,
    showtime: String,
    tickets: u32,
    seats: Vec<String>,
    total: String,
    created_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            reference: b.reference,
            user_id: b.user_id,
            user_name: b.user_name,
            movie_key: b.movie_key,
            movie_title: b.movie_title,
            showtime: b.showtime,
            tickets: b.tickets,
            seats: b.seats.iter().map(|s| s.to_string()).collect(),
            total: format!("{:.2}", b.total),
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// GET /api/bookings/:reference
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let reference = reference.trim().to_uppercase();
    match state.engine.bookings.get_by_reference(&reference)? {
        Some(booking) => Ok(Json(booking.into())),
        None => Err(AppError::NotFound(format!("booking {reference}"))),
    }
}

// GET /api/users/:user_id/bookings
pub async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.engine.bookings.get_by_user(&user_id)?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}
