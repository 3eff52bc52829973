use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::StoreError;
use crate::models::{Booking, NewBooking, Seat};

pub const MAX_REFERENCE_ATTEMPTS: usize = 50;

/// Seats reserved per (movie, showtime). Derived from the booking rows and
/// rebuilt from them whenever it may have drifted.
#[derive(Debug, Default)]
pub struct TakenSeatIndex {
    seats: HashMap<(String, String), HashSet<Seat>>,
}

impl TakenSeatIndex {
    pub fn from_bookings(bookings: &[Booking]) -> Self {
        let mut index = Self::default();
        for booking in bookings {
            index.insert(booking);
        }
        index
    }

    pub fn insert(&mut self, booking: &Booking) {
        self.seats
            .entry((booking.movie_key.clone(), booking.showtime.clone()))
            .or_default()
            .extend(booking.seats.iter().copied());
    }

    pub fn get(&self, movie_key: &str, showtime: &str) -> HashSet<Seat> {
        self.seats
            .get(&(movie_key.to_string(), showtime.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

pub struct BookingRepository {
    db: Arc<Mutex<Connection>>,
    index: Mutex<TakenSeatIndex>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl BookingRepository {
    pub fn new(db: Arc<Mutex<Connection>>) -> anyhow::Result<Self> {
        Self::with_rng(db, Box::new(StdRng::from_entropy()))
    }

    /// Uses `rng` to draw booking references.
    pub fn with_rng(
        db: Arc<Mutex<Connection>>,
        rng: Box<dyn RngCore + Send>,
    ) -> anyhow::Result<Self> {
        let repo = Self {
            db,
            index: Mutex::new(TakenSeatIndex::default()),
            rng: Mutex::new(rng),
        };
        repo.rebuild_index()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn rebuild_index(&self) -> anyhow::Result<()> {
        let bookings = {
            let db = self.conn()?;
            queries::get_all_bookings(&db)?
        };
        let rebuilt = TakenSeatIndex::from_bookings(&bookings);
        *self.index.lock().map_err(|_| StoreError::Poisoned)? = rebuilt;
        tracing::debug!(bookings = bookings.len(), "taken-seat index rebuilt");
        Ok(())
    }

    fn next_reference(&self) -> Result<String, StoreError> {
        let mut rng = self.rng.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(format!("BK{}", rng.gen_range(10000u32..=99999)))
    }

    /// Stores the booking under a fresh `BK#####` reference. Fails with
    /// [`StoreError::SeatTaken`] if any seat was reserved in the meantime.
    pub fn add(&self, booking: &NewBooking) -> anyhow::Result<Booking> {
        let result = {
            let mut db = self.conn()?;
            let mut reference = None;
            for _ in 0..MAX_REFERENCE_ATTEMPTS {
                let candidate = self.next_reference()?;
                if !queries::reference_exists(&db, &candidate)? {
                    reference = Some(candidate);
                    break;
                }
                tracing::debug!(reference = %candidate, "booking reference collision, redrawing");
            }
            let reference = reference.ok_or(StoreError::ReferenceExhausted {
                attempts: MAX_REFERENCE_ATTEMPTS,
            })?;
            queries::insert_booking(&mut db, booking, &reference)
        };

        match result {
            Ok(created) => {
                self.index
                    .lock()
                    .map_err(|_| StoreError::Poisoned)?
                    .insert(&created);
                tracing::info!(
                    reference = %created.reference,
                    user_id = %created.user_id,
                    movie = %created.movie_key,
                    showtime = %created.showtime,
                    tickets = created.tickets,
                    "booking created"
                );
                Ok(created)
            }
            Err(e) => {
                if matches!(e.downcast_ref::<StoreError>(), Some(StoreError::SeatTaken { .. })) {
                    self.rebuild_index()?;
                }
                Err(e)
            }
        }
    }

    pub fn get_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Booking>> {
        let db = self.conn()?;
        queries::get_bookings_for_user(&db, user_id)
    }

    pub fn get_by_reference(&self, reference: &str) -> anyhow::Result<Option<Booking>> {
        let db = self.conn()?;
        queries::get_booking_by_reference(&db, reference)
    }

    pub fn get_taken_seats(&self, movie_key: &str, showtime: &str) -> anyhow::Result<HashSet<Seat>> {
        let index = self.index.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(index.get(movie_key, showtime))
    }
}
