use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::{AppConfig, BookingRules};
use crate::errors::StoreError;
use crate::models::{ContextRecord, Intent, Stage};
use crate::services::booking_flow::BookingStateMachine;
use crate::services::bookings::BookingRepository;
use crate::services::catalog::MovieCatalog;
use crate::services::context::{ContextUpdate, ConversationContext};
use crate::services::intent::{contains_word, IntentResolver};
use crate::services::knowledge::{self, KnowledgeBase};
use crate::services::responses::{self, format_price, Responder};
use crate::services::text;

pub const QUIT_PHRASES: &[&str] = &["quit", "exit", "bye", "goodbye"];
pub const EMPTY_INPUT_REPLY: &str = "I didn't catch that. Could you say that again?";
pub const APOLOGY: &str = "Sorry, something went wrong on my side. Please try that again.";

const START_BOOKING_WORDS: &[&str] = &["yes", "yeah", "yep", "sure", "ok", "okay", "book"];
const DECLINE_WORDS: &[&str] = &["no", "nope", "nah", "cancel"];

/// Collaborators shared by every session.
pub struct DialogueEngine {
    pub db: Arc<Mutex<Connection>>,
    pub catalog: MovieCatalog,
    pub bookings: BookingRepository,
    pub resolver: IntentResolver,
    pub knowledge: KnowledgeBase,
    pub rules: BookingRules,
}

impl DialogueEngine {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        catalog: MovieCatalog,
        resolver: IntentResolver,
        knowledge: KnowledgeBase,
        rules: BookingRules,
    ) -> anyhow::Result<Self> {
        let bookings = BookingRepository::new(db.clone())?;
        Ok(Self {
            db,
            catalog,
            bookings,
            resolver,
            knowledge,
            rules,
        })
    }

    pub fn from_config(config: &AppConfig, db: Arc<Mutex<Connection>>) -> anyhow::Result<Self> {
        let catalog = MovieCatalog::load(config.movies_file.as_deref().map(Path::new))?;
        let resolver = IntentResolver::from_config(config)?;
        let knowledge = KnowledgeBase::with_defaults(config.similarity_threshold);
        tracing::info!(
            movies = catalog.get_all().len(),
            faq = knowledge.len(),
            "dialogue engine ready"
        );
        Self::new(db, catalog, resolver, knowledge, config.rules.clone())
    }

    pub fn session(self: &Arc<Self>, user_id: &str) -> anyhow::Result<Session> {
        self.session_with_responder(user_id, Responder::default())
    }

    pub fn session_with_responder(
        self: &Arc<Self>,
        user_id: &str,
        responder: Responder,
    ) -> anyhow::Result<Session> {
        let context = ConversationContext::load(self.db.clone(), user_id)?;
        Ok(Session {
            engine: Arc::clone(self),
            context,
            responder,
            stats: SessionStats::new(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub started_at: NaiveDateTime,
    pub last_active: NaiveDateTime,
    pub turns: u32,
}

impl SessionStats {
    fn new() -> Self {
        let now = Utc::now().naive_utc();
        Self {
            session_id: Uuid::new_v4(),
            started_at: now,
            last_active: now,
            turns: 0,
        }
    }
}

/// One user's conversation: the turn interface over a persisted context.
pub struct Session {
    engine: Arc<DialogueEngine>,
    context: ConversationContext,
    responder: Responder,
    stats: SessionStats,
}

impl Session {
    pub fn context(&self) -> &ContextRecord {
        self.context.record()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn stage(&self) -> Option<Stage> {
        self.context.get_booking_state().stage
    }

    pub fn progress(&self) -> u8 {
        self.context.booking_progress()
    }

    /// Opening line. Asks for a name when none is known yet.
    pub fn greet(&mut self) -> String {
        match self.try_greet() {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(user_id = %self.context.user_id(), error = %e, "greeting failed");
                APOLOGY.to_string()
            }
        }
    }

    fn try_greet(&mut self) -> anyhow::Result<String> {
        if self.context.is_in_booking() {
            self.context.set_awaiting_name(false)?;
            let help = self.flow().stage_help();
            return Ok(format!("Welcome back! You have a booking in progress.\n\n{help}"));
        }
        let name = self.context.display_name().map(str::to_string);
        self.context.set_awaiting_name(name.is_none())?;
        Ok(self.responder.welcome(name.as_deref()))
    }

    /// Handles one user utterance. `None` means the session should end.
    pub fn respond(&mut self, input: &str) -> Option<String> {
        self.stats.turns += 1;
        self.stats.last_active = Utc::now().naive_utc();

        match self.turn(input) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(user_id = %self.context.user_id(), error = %e, "turn failed");
                if matches!(e.downcast_ref::<StoreError>(), Some(StoreError::StaleContext { .. })) {
                    self.reload();
                }
                Some(APOLOGY.to_string())
            }
        }
    }

    fn reload(&mut self) {
        let user_id = self.context.user_id().to_string();
        match ConversationContext::load(self.engine.db.clone(), &user_id) {
            Ok(context) => self.context = context,
            Err(e) => tracing::error!(user_id = %user_id, error = %e, "context reload failed"),
        }
    }

    fn turn(&mut self, input: &str) -> anyhow::Result<Option<String>> {
        let text = input.trim();
        let reply = if text.is_empty() {
            Some(EMPTY_INPUT_REPLY.to_string())
        } else if QUIT_PHRASES.contains(&text.to_lowercase().as_str()) {
            None
        } else {
            self.route(text)?
        };
        self.context.add_to_history(input, reply.as_deref())?;
        Ok(reply)
    }

    fn flow(&mut self) -> BookingStateMachine<'_> {
        BookingStateMachine::new(&self.engine, &mut self.context, &mut self.responder)
    }

    fn route(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        if self.context.awaiting_name() && !self.context.is_in_booking() {
            if let Some(reply) = self.take_name(text)? {
                return Ok(Some(reply));
            }
        }
        if self.context.awaiting_name() {
            self.context.set_awaiting_name(false)?;
        }

        if self.context.is_in_booking() {
            return self.flow().handle(text).map(Some);
        }

        if self.context.awaiting_confirmation() {
            if let Some(reply) = self.answer_booking_offer(text)? {
                return Ok(Some(reply));
            }
        }

        let resolved = self.engine.resolver.resolve(text, self.context.record());
        tracing::info!(
            user_id = %self.context.user_id(),
            intent = resolved.intent.as_str(),
            confidence = resolved.confidence,
            "routing turn"
        );
        self.dispatch(resolved.intent, text)
    }

    fn take_name(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        let Some(name) = text::extract_name(text).or_else(|| text::short_reply_name(text)) else {
            return Ok(None);
        };
        self.context.update(ContextUpdate {
            display_name: Some(Some(name.clone())),
            awaiting_name: Some(false),
            ..Default::default()
        })?;
        Ok(Some(self.responder.welcome(Some(&name))))
    }

    /// Yes/no after movie details were shown. Anything else drops the
    /// question and is handled as a normal utterance.
    fn answer_booking_offer(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        if contains_word(text, START_BOOKING_WORDS) {
            let movie = self.context.last_mentioned_movie().map(str::to_string);
            self.context.set_awaiting_confirmation(false)?;
            return match movie {
                Some(key) => self.flow().start(&key).map(Some),
                None => Ok(Some(self.which_movie("Which movie would you like to book?"))),
            };
        }
        if contains_word(text, DECLINE_WORDS) {
            self.context.set_awaiting_confirmation(false)?;
            return Ok(Some(format!("Okay. {}", self.responder.how_can_help())));
        }
        self.context.set_awaiting_confirmation(false)?;
        Ok(None)
    }

    fn dispatch(&mut self, intent: Intent, text: &str) -> anyhow::Result<Option<String>> {
        let reply = match intent {
            Intent::Greeting => match self.context.display_name().map(str::to_string) {
                Some(name) => format!("Hello again, {name}! {}", self.responder.how_can_help()),
                None => self.try_greet()?,
            },
            Intent::Farewell => return Ok(None),
            Intent::GiveName => match text::extract_name(text) {
                Some(name) => {
                    self.context.set_display_name(&name)?;
                    self.responder.welcome(Some(&name))
                }
                None => "Sorry, I didn't catch your name. Could you repeat it?".to_string(),
            },
            Intent::ChangeName => {
                self.context.set_awaiting_name(true)?;
                "Sure! What would you like me to call you?".to_string()
            }
            Intent::AskName => match self.context.display_name() {
                Some(name) => format!("Your name is {name}."),
                None => "You haven't told me your name yet.".to_string(),
            },
            Intent::SmallTalkPositive => self.responder.small_talk(),
            Intent::SmallTalkThanks => self.responder.thanks(),
            Intent::ShowMovies => match self.engine.catalog.resolve(text) {
                Some(key) => self.show_movie(&key)?,
                None => self.responder.movie_list(self.engine.catalog.get_all()),
            },
            Intent::MovieInfo => match self.engine.catalog.resolve(text) {
                Some(key) => {
                    let answer = self
                        .engine
                        .catalog
                        .get(&key)
                        .and_then(|movie| knowledge::movie_answer(text, movie));
                    match answer {
                        Some(answer) => answer,
                        None => self.show_movie(&key)?,
                    }
                }
                None => self.which_movie("Which movie would you like to know about?"),
            },
            Intent::BookTickets => match self.engine.catalog.resolve(text) {
                Some(key) => self.flow().start(&key)?,
                None => self.which_movie("Which movie would you like to book?"),
            },
            Intent::ViewBookings => {
                let bookings = self.engine.bookings.get_by_user(self.context.user_id())?;
                let name = self.context.display_name().unwrap_or("Guest");
                self.responder.bookings_list(&bookings, name)
            }
            Intent::Help => self.responder.help(None, &self.engine.rules),
            Intent::AskPrice => self.price_answer(text),
            Intent::AskTime => match self.engine.catalog.resolve(text).and_then(|k| self.engine.catalog.get(&k)) {
                Some(movie) => format!("{} is showing at: {}", movie.title, movie.times_list()),
                None => "Showtimes vary by movie. Which movie are you interested in?".to_string(),
            },
            Intent::Praise => "Thank you! I'm glad you're enjoying the experience!".to_string(),
            Intent::Complaint => {
                "I'm sorry you're experiencing issues. Please contact our support team at support@savoybot.com".to_string()
            }
            Intent::GoBack => "Nothing to go back to.".to_string(),
            Intent::CancelBooking => {
                "There's no booking in progress to cancel. What would you like to do?".to_string()
            }
            Intent::ConfirmBooking | Intent::Unknown => self.fallback(text)?,
        };
        Ok(Some(reply))
    }

    /// Free-text fallbacks: FAQ first, then a movie named in the text.
    fn fallback(&mut self, text: &str) -> anyhow::Result<String> {
        if let Some(answer) = self.engine.knowledge.find_answer(text) {
            return Ok(answer.to_string());
        }
        if let Some(key) = self.engine.catalog.resolve(text) {
            return self.show_movie(&key);
        }
        Ok(responses::NOT_SURE.to_string())
    }

    fn show_movie(&mut self, key: &str) -> anyhow::Result<String> {
        let engine = Arc::clone(&self.engine);
        let Some(movie) = engine.catalog.get(key) else {
            return Ok("Sorry, I couldn't find that movie.".to_string());
        };
        self.context.update(ContextUpdate {
            last_mentioned_movie: Some(Some(key.to_string())),
            awaiting_confirmation: Some(true),
            ..Default::default()
        })?;
        Ok(self.responder.movie_info(movie))
    }

    fn which_movie(&self, question: &str) -> String {
        format!(
            "{question}\n\n{}",
            self.responder.movie_list(self.engine.catalog.get_all())
        )
    }

    fn price_answer(&self, text: &str) -> String {
        let catalog = &self.engine.catalog;
        if let Some(movie) = catalog.resolve(text).and_then(|k| catalog.get(&k)) {
            return format!("Tickets for {} cost {} each.", movie.title, format_price(movie.price));
        }
        let prices = catalog.get_all().values().map(|m| m.price);
        match (prices.clone().min(), prices.max()) {
            (Some(low), Some(high)) if low != high => format!(
                "Tickets cost between {} and {} depending on the film. Which movie are you interested in?",
                format_price(low),
                format_price(high)
            ),
            (Some(price), _) => format!("Tickets are {} each.", format_price(price)),
            _ => "We have no films listed right now.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{IntentMatch, Seat};
    use crate::services::booking_flow::{AT_FIRST_STEP, CONFIRM_REPROMPT};
    use crate::services::intent::{ClassifierError, IntentModel};

    /// Keyword stand-in for the trained classifier.
    struct KeywordModel;

    impl IntentModel for KeywordModel {
        fn predict(&self, normalized: &str) -> Result<IntentMatch, ClassifierError> {
            let intent = if normalized.contains("hello") {
                Intent::Greeting
            } else if normalized.contains("my name") {
                Intent::AskName
            } else if normalized.contains("price") {
                Intent::AskPrice
            } else {
                Intent::Unknown
            };
            Ok(IntentMatch::new(intent, 0.9))
        }
    }

    fn engine() -> Arc<DialogueEngine> {
        let conn = Arc::new(Mutex::new(db::init_db(":memory:").unwrap()));
        let engine = DialogueEngine::new(
            conn,
            MovieCatalog::embedded().unwrap(),
            IntentResolver::new(Box::new(KeywordModel), 0.5),
            KnowledgeBase::with_defaults(0.25),
            BookingRules::default(),
        )
        .unwrap();
        Arc::new(engine)
    }

    fn session(engine: &Arc<DialogueEngine>, user_id: &str) -> Session {
        engine
            .session_with_responder(user_id, Responder::seeded(7))
            .unwrap()
    }

    fn say(session: &mut Session, text: &str) -> String {
        session.respond(text).expect("session ended unexpectedly")
    }

    fn to_seats(session: &mut Session) {
        say(session, "book dune");
        say(session, "13:00");
        say(session, "2");
        assert_eq!(session.stage(), Some(Stage::Seats));
    }

    #[test]
    fn test_full_booking_flow() {
        let engine = engine();
        let mut s = session(&engine, "u1");

        let reply = say(&mut s, "book dune");
        assert!(reply.contains("Dune: Part Two"));
        assert_eq!(s.stage(), Some(Stage::Time));

        say(&mut s, "13:00");
        assert_eq!(s.stage(), Some(Stage::Tickets));
        assert_eq!(s.context().booking_state.time.as_deref(), Some("13:00"));

        let reply = say(&mut s, "2");
        assert!(reply.contains("SCREEN"));
        assert_eq!(s.progress(), 75);

        let reply = say(&mut s, "A1, A2");
        assert_eq!(s.stage(), Some(Stage::Confirm));
        assert!(reply.contains("£25.00"));

        let reply = say(&mut s, "yes");
        assert!(s.stage().is_none());
        let bookings = engine.bookings.get_by_user("u1").unwrap();
        assert_eq!(bookings.len(), 1);
        assert!(reply.contains(&bookings[0].reference));
        assert_eq!(bookings[0].seats, vec![Seat::new('A', 1), Seat::new('A', 2)]);
        assert_eq!(bookings[0].user_name, "Guest");
    }

    #[test]
    fn test_seat_count_mismatch_stays_in_seats() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        to_seats(&mut s);

        let reply = say(&mut s, "A1");
        assert!(reply.contains("Selected 1 but need 2."));
        assert_eq!(s.stage(), Some(Stage::Seats));
        assert!(s.context().booking_state.seats.is_empty());
    }

    #[test]
    fn test_taken_seats_rejected_per_showtime() {
        let engine = engine();
        let mut first = session(&engine, "u1");
        to_seats(&mut first);
        say(&mut first, "A1 A2");
        say(&mut first, "yes");

        let mut second = session(&engine, "u2");
        to_seats(&mut second);
        let reply = say(&mut second, "A2 A3");
        assert!(reply.contains("A2 (taken)"));
        assert_eq!(second.stage(), Some(Stage::Seats));

        let mut third = session(&engine, "u3");
        say(&mut third, "book dune");
        say(&mut third, "16:30");
        say(&mut third, "2");
        say(&mut third, "A1 A2");
        assert_eq!(third.stage(), Some(Stage::Confirm));
    }

    #[test]
    fn test_back_from_seats_clears_tickets() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        to_seats(&mut s);

        let reply = say(&mut s, "back");
        assert!(reply.contains("How many tickets?"));
        let state = &s.context().booking_state;
        assert_eq!(state.stage, Some(Stage::Tickets));
        assert!(state.tickets.is_none());
        assert_eq!(state.time.as_deref(), Some("13:00"));

        say(&mut s, "back");
        assert_eq!(s.stage(), Some(Stage::Time));
        assert!(s.context().booking_state.time.is_none());

        assert_eq!(say(&mut s, "back"), AT_FIRST_STEP);
        assert_eq!(s.stage(), Some(Stage::Time));
    }

    #[test]
    fn test_cancel_from_every_stage() {
        let engine = engine();
        let inputs = [vec!["book dune"], vec!["book dune", "13:00"], vec!["book dune", "13:00", "2"]];
        for steps in inputs {
            let mut s = session(&engine, "u1");
            for step in steps {
                say(&mut s, step);
            }
            assert!(s.stage().is_some());
            say(&mut s, "cancel");
            assert!(s.stage().is_none());
            assert!(!s.context().awaiting_confirmation);
            assert_eq!(s.progress(), 0);
        }
        assert!(engine.bookings.get_by_user("u1").unwrap().is_empty());
    }

    #[test]
    fn test_confirm_reprompts_and_declines() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        to_seats(&mut s);
        say(&mut s, "B3 B4");

        assert_eq!(say(&mut s, "hmm"), CONFIRM_REPROMPT);
        assert_eq!(s.stage(), Some(Stage::Confirm));

        say(&mut s, "no");
        assert!(s.stage().is_none());
        assert!(engine.bookings.get_by_user("u1").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_showtime_lists_options() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        say(&mut s, "book dune");
        let reply = say(&mut s, "14:00");
        assert!(reply.contains("13:00"));
        assert_eq!(s.stage(), Some(Stage::Time));
    }

    #[test]
    fn test_greeting_asks_for_name_and_remembers_it() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        s.greet();
        assert!(s.context().awaiting_name);

        let reply = say(&mut s, "Sam");
        assert!(reply.contains("Sam"));
        assert_eq!(s.context().display_name.as_deref(), Some("Sam"));
        assert!(!s.context().awaiting_name);

        assert_eq!(say(&mut s, "what is my name"), "Your name is Sam.");
        assert!(say(&mut s, "hello").starts_with("Hello again, Sam!"));

        let mut again = session(&engine, "u1");
        again.greet();
        assert!(!again.context().awaiting_name);
    }

    #[test]
    fn test_name_prompt_skipped_by_command() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        s.greet();
        say(&mut s, "book dune");
        assert_eq!(s.stage(), Some(Stage::Time));
        assert!(s.context().display_name.is_none());
        assert!(!s.context().awaiting_name);
    }

    #[test]
    fn test_greeting_mid_booking_keeps_stage_replies() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        say(&mut s, "book dune");
        say(&mut s, "13:00");
        say(&mut s, "1");
        say(&mut s, "A1");
        assert_eq!(s.stage(), Some(Stage::Confirm));
        drop(s);

        let mut resumed = session(&engine, "u1");
        let reply = resumed.greet();
        assert!(reply.contains("booking in progress"));
        assert!(!resumed.context().awaiting_name);

        say(&mut resumed, "ok");
        assert!(resumed.stage().is_none());
        assert!(resumed.context().display_name.is_none());
        assert_eq!(engine.bookings.get_by_user("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_pending_name_prompt_ignored_during_booking() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        s.greet();
        assert!(s.context().awaiting_name);
        s.flow().start("dune2").unwrap();

        say(&mut s, "13:00");
        say(&mut s, "three");
        assert_eq!(s.stage(), Some(Stage::Seats));
        assert_eq!(s.context().booking_state.tickets, Some(3));
        assert!(s.context().display_name.is_none());
        assert!(!s.context().awaiting_name);
    }

    #[test]
    fn test_seat_lost_at_confirmation_returns_to_seats() {
        let engine = engine();
        let mut slow = session(&engine, "u1");
        to_seats(&mut slow);
        say(&mut slow, "A1 A2");
        assert_eq!(slow.stage(), Some(Stage::Confirm));

        let mut fast = session(&engine, "u2");
        to_seats(&mut fast);
        say(&mut fast, "A2 A3");
        say(&mut fast, "yes");
        assert_eq!(engine.bookings.get_by_user("u2").unwrap().len(), 1);

        let reply = say(&mut slow, "yes");
        assert!(reply.contains("Sorry, seat A2 was just booked"));
        assert!(reply.contains("[X]"));
        let state = &slow.context().booking_state;
        assert_eq!(state.stage, Some(Stage::Seats));
        assert!(state.seats.is_empty());
        assert_eq!(state.tickets, Some(2));
        assert!(engine.bookings.get_by_user("u1").unwrap().is_empty());

        say(&mut slow, "A4 A5");
        say(&mut slow, "yes");
        let bookings = engine.bookings.get_by_user("u1").unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].seats, vec![Seat::new('A', 4), Seat::new('A', 5)]);
    }

    #[test]
    fn test_back_from_confirm_then_new_ticket_count() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        to_seats(&mut s);
        say(&mut s, "B1 B2");
        assert_eq!(s.stage(), Some(Stage::Confirm));

        say(&mut s, "back");
        let state = &s.context().booking_state;
        assert_eq!(state.stage, Some(Stage::Seats));
        assert!(state.seats.is_empty());
        assert_eq!(state.tickets, Some(2));

        say(&mut s, "back");
        assert_eq!(s.stage(), Some(Stage::Tickets));
        say(&mut s, "3");
        let state = &s.context().booking_state;
        assert_eq!(state.stage, Some(Stage::Seats));
        assert_eq!(state.tickets, Some(3));
        assert!(state.seats.is_empty());

        say(&mut s, "B1 B2 B3");
        assert_eq!(s.stage(), Some(Stage::Confirm));
        assert_eq!(s.context().booking_state.seats.len(), 3);
    }

    #[test]
    fn test_movie_mention_offers_booking() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        let reply = say(&mut s, "paddington");
        assert!(reply.contains("Would you like to book tickets"));
        assert!(s.context().awaiting_confirmation);
        assert_eq!(s.context().last_mentioned_movie.as_deref(), Some("paddington3"));

        say(&mut s, "yes please");
        assert_eq!(s.stage(), Some(Stage::Time));
        assert_eq!(s.context().booking_state.movie.as_deref(), Some("paddington3"));
        assert!(!s.context().awaiting_confirmation);
    }

    #[test]
    fn test_price_range_without_movie() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        let reply = say(&mut s, "what is the price");
        assert!(reply.contains("£10.00"));
        assert!(reply.contains("£12.50"));
    }

    #[test]
    fn test_quit_and_empty_input() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        assert_eq!(say(&mut s, "   "), EMPTY_INPUT_REPLY);
        assert!(s.respond("quit").is_none());
        let history = &s.context().conversation_history;
        assert_eq!(history.len(), 2);
        assert!(history[1].bot_text.is_none());
        assert_eq!(s.stats().turns, 2);
    }

    #[test]
    fn test_history_is_capped() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        for i in 0..60 {
            s.respond(&format!("message {i}"));
        }
        let history = &s.context().conversation_history;
        assert_eq!(history.len(), 50);
        assert_eq!(history.last().unwrap().user_text, "message 59");
    }

    #[test]
    fn test_booking_state_survives_new_session() {
        let engine = engine();
        let mut s = session(&engine, "u1");
        to_seats(&mut s);
        drop(s);

        let mut resumed = session(&engine, "u1");
        assert_eq!(resumed.stage(), Some(Stage::Seats));
        say(&mut resumed, "C5 C6");
        assert_eq!(resumed.stage(), Some(Stage::Confirm));
    }

    #[test]
    fn test_stale_context_recovers() {
        let engine = engine();
        let mut stale = session(&engine, "u1");
        let mut fresh = session(&engine, "u1");
        say(&mut fresh, "book dune");

        assert_eq!(say(&mut stale, "book dune"), APOLOGY);
        say(&mut stale, "13:00");
        assert_eq!(stale.stage(), Some(Stage::Tickets));
    }
}
