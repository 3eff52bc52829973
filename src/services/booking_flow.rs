use rust_decimal::Decimal;

use crate::errors::StoreError;
use crate::models::{BookingPatch, Movie, NewBooking, Stage};
use crate::services::context::ConversationContext;
use crate::services::dialogue::DialogueEngine;
use crate::services::intent::{contains_word, is_command, BACK_COMMANDS, CANCEL_COMMANDS};
use crate::services::responses::{self, Responder};
use crate::services::validation;

const CONFIRM_WORDS: &[&str] = &["yes", "confirm", "ok", "okay", "yeah", "yep", "sure"];
const DECLINE_WORDS: &[&str] = &["no", "cancel", "nope", "nah"];

pub const CONFIRM_REPROMPT: &str = "Please type 'yes' to confirm or 'no' to cancel the booking.";
pub const AT_FIRST_STEP: &str = "Already at the first step. Type 'cancel' to start over.";
pub const NOTHING_TO_GO_BACK_TO: &str = "Nothing to go back to.";

/// Drives one user's booking through time, tickets, seats and confirm.
/// Every transition is validated and persisted through the context.
pub struct BookingStateMachine<'a> {
    engine: &'a DialogueEngine,
    context: &'a mut ConversationContext,
    responder: &'a mut Responder,
}

impl<'a> BookingStateMachine<'a> {
    pub fn new(
        engine: &'a DialogueEngine,
        context: &'a mut ConversationContext,
        responder: &'a mut Responder,
    ) -> Self {
        Self {
            engine,
            context,
            responder,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        self.context.get_booking_state().stage
    }

    /// Enters the time stage for `movie_key`. Unknown keys leave the state untouched.
    pub fn start(&mut self, movie_key: &str) -> anyhow::Result<String> {
        let Some(movie) = self.engine.catalog.get(movie_key) else {
            return Ok(format!(
                "Sorry, I couldn't find that movie.\n\n{}",
                self.responder.movie_list(self.engine.catalog.get_all())
            ));
        };

        self.context.update_booking_state(
            BookingPatch::new()
                .stage(Stage::Time)
                .movie(movie_key)
                .clear_time()
                .clear_tickets()
                .clear_seats(),
        )?;
        tracing::info!(user_id = %self.context.user_id(), movie = movie_key, "booking started");
        Ok(self.responder.booking_start(movie))
    }

    /// Handles one utterance while a booking is in progress.
    pub fn handle(&mut self, text: &str) -> anyhow::Result<String> {
        if is_command(text, BACK_COMMANDS) {
            return self.go_back();
        }
        if is_command(text, CANCEL_COMMANDS) {
            return self.cancel();
        }
        if text.trim() == "?" || is_command(text, &["help"]) {
            return Ok(self.stage_help());
        }

        match self.stage() {
            Some(Stage::Time) => self.select_time(text),
            Some(Stage::Tickets) => self.select_tickets(text),
            Some(Stage::Seats) => self.select_seats(text),
            Some(Stage::Confirm) => self.confirm(text),
            None => Ok(self.responder.not_understood()),
        }
    }

    pub fn stage_help(&self) -> String {
        self.responder.help(self.stage(), &self.engine.rules)
    }

    /// The movie being booked. A key that vanished from the catalog ends the booking.
    fn current_movie(&mut self) -> anyhow::Result<Option<(String, &'a Movie)>> {
        let engine = self.engine;
        let key = self.context.get_booking_state().movie.clone().unwrap_or_default();
        match engine.catalog.get(&key) {
            Some(movie) => Ok(Some((key, movie))),
            None => {
                tracing::warn!(user_id = %self.context.user_id(), movie = %key, "booked movie missing from catalog");
                self.context.reset_booking()?;
                Ok(None)
            }
        }
    }

    fn movie_gone(&mut self) -> String {
        format!(
            "Sorry, that movie is no longer showing, so I've cancelled this booking.\n\n{}",
            self.responder.how_can_help()
        )
    }

    fn select_time(&mut self, text: &str) -> anyhow::Result<String> {
        let Some((_, movie)) = self.current_movie()? else {
            return Ok(self.movie_gone());
        };
        match validation::validate_showtime(text, &movie.times) {
            Ok(time) => {
                self.context
                    .update_booking_state(BookingPatch::new().stage(Stage::Tickets).time(&time))?;
                Ok(self.responder.time_selected(&time, &self.engine.rules))
            }
            Err(e) => Ok(e.to_string()),
        }
    }

    fn select_tickets(&mut self, text: &str) -> anyhow::Result<String> {
        let tickets = match validation::validate_ticket_count(text, &self.engine.rules) {
            Ok(n) => n,
            Err(e) => return Ok(e.to_string()),
        };
        let map = self.seat_map()?;
        self.context.update_booking_state(
            BookingPatch::new()
                .stage(Stage::Seats)
                .tickets(tickets)
                .clear_seats(),
        )?;
        Ok(self.responder.tickets_selected(tickets, &map))
    }

    fn select_seats(&mut self, text: &str) -> anyhow::Result<String> {
        let Some((key, movie)) = self.current_movie()? else {
            return Ok(self.movie_gone());
        };
        let state = self.context.get_booking_state().clone();
        let time = state.time.unwrap_or_default();
        let tickets = state.tickets.unwrap_or_default();
        let taken = self.engine.bookings.get_taken_seats(&key, &time)?;

        match validation::validate_seats(text, &self.engine.rules, &taken, tickets) {
            Ok(seats) => {
                self.context.update_booking_state(
                    BookingPatch::new().stage(Stage::Confirm).seats(seats.clone()),
                )?;
                let total = movie.price * Decimal::from(tickets);
                Ok(self
                    .responder
                    .booking_summary(movie, &time, tickets, &seats, total))
            }
            Err(e) => Ok(e.to_string()),
        }
    }

    fn confirm(&mut self, text: &str) -> anyhow::Result<String> {
        if contains_word(text, CONFIRM_WORDS) {
            return self.create_booking();
        }
        if contains_word(text, DECLINE_WORDS) {
            return self.cancel();
        }
        Ok(CONFIRM_REPROMPT.to_string())
    }

    fn create_booking(&mut self) -> anyhow::Result<String> {
        let Some((key, movie)) = self.current_movie()? else {
            return Ok(self.movie_gone());
        };
        let state = self.context.get_booking_state().clone();
        let tickets = state.tickets.unwrap_or_default();
        let new_booking = NewBooking {
            user_id: self.context.user_id().to_string(),
            user_name: self.context.display_name().unwrap_or("Guest").to_string(),
            movie_key: key,
            movie_title: movie.title.clone(),
            showtime: state.time.unwrap_or_default(),
            tickets,
            seats: state.seats,
            total: movie.price * Decimal::from(tickets),
        };

        match self.engine.bookings.add(&new_booking) {
            Ok(booking) => {
                self.context.reset_booking()?;
                Ok(self.responder.booking_confirmed(&booking))
            }
            Err(e) => {
                let seat = match e.downcast_ref::<StoreError>() {
                    Some(StoreError::SeatTaken { seat, .. }) => seat.clone(),
                    _ => return Err(e),
                };
                tracing::info!(user_id = %self.context.user_id(), seat = %seat, "seat lost at confirmation");
                self.context
                    .update_booking_state(BookingPatch::new().stage(Stage::Seats).clear_seats())?;
                let map = self.seat_map()?;
                Ok(format!(
                    "Sorry, seat {seat} was just booked by someone else.\n\n{map}\n\nPlease select your {tickets} seat(s)."
                ))
            }
        }
    }

    /// Steps back one stage, clearing whatever the abandoned stages collected.
    pub fn go_back(&mut self) -> anyhow::Result<String> {
        let Some(stage) = self.stage() else {
            return Ok(NOTHING_TO_GO_BACK_TO.to_string());
        };
        let Some(previous) = stage.previous() else {
            return Ok(AT_FIRST_STEP.to_string());
        };

        let prompt = match previous {
            Stage::Time => {
                self.context.update_booking_state(
                    BookingPatch::new()
                        .stage(Stage::Time)
                        .clear_time()
                        .clear_tickets()
                        .clear_seats(),
                )?;
                let Some((_, movie)) = self.current_movie()? else {
                    return Ok(self.movie_gone());
                };
                format!("Which showtime? Available: {}", movie.times_list())
            }
            Stage::Tickets => {
                self.context.update_booking_state(
                    BookingPatch::new()
                        .stage(Stage::Tickets)
                        .clear_tickets()
                        .clear_seats(),
                )?;
                format!(
                    "How many tickets? ({}-{})",
                    self.engine.rules.min_tickets, self.engine.rules.max_tickets
                )
            }
            Stage::Seats => {
                self.context
                    .update_booking_state(BookingPatch::new().stage(Stage::Seats).clear_seats())?;
                let tickets = self.context.get_booking_state().tickets.unwrap_or_default();
                format!(
                    "{}\n\nPlease select your {tickets} seat(s).",
                    self.seat_map()?
                )
            }
            Stage::Confirm => return Ok(NOTHING_TO_GO_BACK_TO.to_string()),
        };
        tracing::debug!(user_id = %self.context.user_id(), from = stage.as_str(), to = previous.as_str(), "booking stepped back");
        Ok(self.responder.went_back(&prompt))
    }

    pub fn cancel(&mut self) -> anyhow::Result<String> {
        self.context.reset_booking()?;
        tracing::info!(user_id = %self.context.user_id(), "booking cancelled");
        Ok(self.responder.cancelled())
    }

    fn seat_map(&self) -> anyhow::Result<String> {
        let state = self.context.get_booking_state();
        let taken = self.engine.bookings.get_taken_seats(
            state.movie.as_deref().unwrap_or_default(),
            state.time.as_deref().unwrap_or_default(),
        )?;
        Ok(responses::seat_map(&self.engine.rules, &taken))
    }
}
