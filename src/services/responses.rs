use std::collections::{BTreeMap, HashSet};

use chrono::{Local, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rust_decimal::Decimal;

use crate::config::BookingRules;
use crate::models::{format_seats, Booking, Movie, Seat, Stage};

const WELCOME: &[&str] = &[
    "{greeting}. Welcome to SavoyBot!",
    "{greeting}! Welcome to SavoyBot, your movie booking assistant!",
    "{greeting}. Thanks for choosing SavoyBot!",
    "{greeting}. SavoyBot here, ready to help you book a great film!",
];

const ASK_NAME: &[&str] = &[
    "What's your name?",
    "May I have your name, please?",
    "What should I call you?",
    "Could you tell me your name?",
];

const GREET_USER: &[&str] = &[
    "Nice to meet you, {name}!",
    "Hello, {name}! Great to meet you!",
    "Welcome, {name}!",
    "Pleasure to meet you, {name}!",
];

const HOW_CAN_HELP: &[&str] = &[
    "How can I help you today?",
    "What can I do for you?",
    "How may I assist you?",
    "What would you like to do today?",
];

const MOVIE_INFO_INTRO: &[&str] = &[
    "Here's what I know about {title}:",
    "Let me tell you about {title}:",
    "{title}, here are the details:",
];

const BOOKING_START: &[&str] = &[
    "Great! Let's book {title} for you.",
    "Excellent choice! Booking {title}.",
    "Perfect! Let's get you tickets for {title}.",
];

const ASK_TIME: &[&str] = &[
    "Which showtime works for you?",
    "What time would you prefer?",
    "Which time slot would you like?",
];

const ASK_TICKETS: &[&str] = &[
    "How many tickets do you need?",
    "How many tickets would you like?",
    "How many seats should I reserve?",
];

const ASK_SEATS: &[&str] = &[
    "Please select your {count} seat(s).",
    "Choose your {count} seat(s) please.",
    "Pick {count} seat(s) from the map above.",
];

const CONFIRMATION_PROMPT: &[&str] = &[
    "Does this look good to you?",
    "Ready to confirm?",
    "Shall I confirm this booking?",
];

const BOOKING_CONFIRMED: &[&str] = &[
    "Booking confirmed! Your reference is {ref}.",
    "All set! Here's your booking reference: {ref}.",
    "Done! Your booking reference is {ref}.",
];

const THANKS: &[&str] = &[
    "You're welcome!",
    "Happy to help!",
    "My pleasure!",
    "Anytime!",
];

const NOT_UNDERSTOOD: &[&str] = &[
    "Sorry, I didn't quite get that.",
    "I'm not sure I understand.",
    "Could you rephrase that?",
];

const SMALL_TALK: &[&str] = &[
    "I'm doing well, thank you!",
    "I'm great, thanks for asking!",
    "Doing fantastic!",
];

const CANCELLED: &[&str] = &[
    "Booking cancelled. No charges made.",
    "Alright, booking cancelled.",
    "No problem, I've cancelled that for you.",
];

const GO_BACK: &[&str] = &[
    "Going back...",
    "Okay, let's go back.",
    "Taking you back to the previous step.",
];

pub const NOT_SURE: &str =
    "I'm not sure what you mean. Type 'help' for options or 'show movies' to see what's playing.";

const GENERAL_HELP: &str = "Available commands:

  'show movies' - See what's playing
  'tell me about [movie]' - Get movie information
  'book [movie]' - Book tickets
  'what is my name' - I'll tell you your name
  'my bookings' - View booking history
  'help' - Show this message
  'quit' - Exit

You can also type naturally! Just tell me what you want.";

fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

pub fn greeting_for_hour(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}

pub fn format_price(amount: Decimal) -> String {
    format!("£{:.2}", amount.round_dp(2))
}

/// Grid of rows and seat numbers, `[X]` for taken seats.
pub fn seat_map(rules: &BookingRules, taken: &HashSet<Seat>) -> String {
    let mut out = String::from("        SCREEN\n\n   ");
    for n in 1..=rules.seats_per_row {
        out.push_str(&format!("{n:>3}"));
    }
    out.push('\n');
    for &row in &rules.rows {
        out.push(row);
        out.push_str("  ");
        for n in 1..=rules.seats_per_row {
            let cell = if taken.contains(&Seat::new(row, n)) { "[X]" } else { "[ ]" };
            out.push_str(cell);
        }
        out.push('\n');
    }
    out.push_str("\n[ ] = Available  [X] = Taken");
    out
}

/// Renders bot replies, choosing among phrasing variants with an owned RNG.
pub struct Responder {
    rng: Box<dyn RngCore + Send>,
}

impl Default for Responder {
    fn default() -> Self {
        Self::new(Box::new(StdRng::from_entropy()))
    }
}

impl Responder {
    pub fn new(rng: Box<dyn RngCore + Send>) -> Self {
        Self { rng }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(StdRng::seed_from_u64(seed)))
    }

    fn pick(&mut self, variants: &[&'static str]) -> &'static str {
        variants.choose(&mut self.rng).copied().unwrap_or_default()
    }

    pub fn welcome(&mut self, name: Option<&str>) -> String {
        let greeting = greeting_for_hour(Local::now().hour());
        let welcome = fill(self.pick(WELCOME), &[("greeting", greeting)]);
        match name {
            Some(name) => format!(
                "{welcome}\n{} {}\n\nYou can:\n- Ask about movies\n- Book tickets\n- Type 'help' for more options",
                fill(self.pick(GREET_USER), &[("name", name)]),
                self.pick(HOW_CAN_HELP)
            ),
            None => format!("{welcome}\n{}", self.pick(ASK_NAME)),
        }
    }

    pub fn how_can_help(&mut self) -> String {
        self.pick(HOW_CAN_HELP).to_string()
    }

    pub fn thanks(&mut self) -> String {
        self.pick(THANKS).to_string()
    }

    pub fn small_talk(&mut self) -> String {
        format!("{} Ready to help you book some great movies!", self.pick(SMALL_TALK))
    }

    pub fn not_understood(&mut self) -> String {
        self.pick(NOT_UNDERSTOOD).to_string()
    }

    pub fn movie_list(&self, movies: &BTreeMap<String, Movie>) -> String {
        let mut out = String::from("Currently showing:\n\n");
        for (i, movie) in movies.values().enumerate() {
            out.push_str(&format!("{}. {} ({})\n", i + 1, movie.title, movie.rating));
            out.push_str(&format!(
                "   Genre: {}, Duration: {}\n",
                crate::services::text::capitalize(&movie.genre),
                movie.duration
            ));
            out.push_str(&format!("   Price: {}\n", format_price(movie.price)));
        }
        out.push_str("\nWhat would you like to know more about?");
        out
    }

    pub fn movie_info(&mut self, movie: &Movie) -> String {
        let intro = fill(self.pick(MOVIE_INFO_INTRO), &[("title", movie.title.as_str())]);
        format!(
            "{intro}\n\nTitle: {}\nGenre: {}\nRating: {}\nDuration: {}\nDirector: {}\nCast: {}\n\n{}\n\nShowtimes: {}\nPrice: {} per ticket\n\nWould you like to book tickets for this movie?",
            movie.title,
            crate::services::text::capitalize(&movie.genre),
            movie.rating,
            movie.duration,
            movie.director,
            movie.cast.join(", "),
            movie.description,
            movie.times_list(),
            format_price(movie.price),
        )
    }

    pub fn booking_start(&mut self, movie: &Movie) -> String {
        format!(
            "{}\n\nAvailable times: {}\n\n{}",
            fill(self.pick(BOOKING_START), &[("title", movie.title.as_str())]),
            movie.times_list(),
            self.pick(ASK_TIME)
        )
    }

    pub fn time_selected(&mut self, time: &str, rules: &BookingRules) -> String {
        format!(
            "Perfect! {time} showing selected.\n\n{} ({}-{})",
            self.pick(ASK_TICKETS),
            rules.min_tickets,
            rules.max_tickets
        )
    }

    pub fn tickets_selected(&mut self, tickets: u32, map: &str) -> String {
        let count = tickets.to_string();
        format!(
            "{map}\n\nYou're booking {tickets} ticket(s).\n{}\nFormat: A1, B5, C3",
            fill(self.pick(ASK_SEATS), &[("count", count.as_str())])
        )
    }

    pub fn booking_summary(
        &mut self,
        movie: &Movie,
        time: &str,
        tickets: u32,
        seats: &[Seat],
        total: Decimal,
    ) -> String {
        let rule = "=".repeat(40);
        format!(
            "{rule}\n            BOOKING SUMMARY\n{rule}\n\nMovie: {}\nTime: {time}\nTickets: {tickets}\nSeats: {}\nPrice: {} x {tickets} = {}\n\n{rule}\n\n{}\n\nType 'yes' to confirm or 'no' to cancel.",
            movie.title,
            format_seats(seats),
            format_price(movie.price),
            format_price(total),
            self.pick(CONFIRMATION_PROMPT)
        )
    }

    pub fn booking_confirmed(&mut self, booking: &Booking) -> String {
        let rule = "=".repeat(40);
        format!(
            "{rule}\n           BOOKING CONFIRMED!\n{rule}\n\n{}\nCustomer: {}\n\nMovie: {}\nTime: {}\nSeats: {}\nTickets: {}\nTotal: {}\n\n{rule}\n\nPlease show this reference at the cinema. Enjoy your movie!\n\n{}",
            fill(self.pick(BOOKING_CONFIRMED), &[("ref", booking.reference.as_str())]),
            booking.user_name,
            booking.movie_title,
            booking.showtime,
            format_seats(&booking.seats),
            booking.tickets,
            format_price(booking.total),
            self.pick(HOW_CAN_HELP)
        )
    }

    pub fn cancelled(&mut self) -> String {
        format!("{}\n\n{}", self.pick(CANCELLED), self.pick(HOW_CAN_HELP))
    }

    pub fn went_back(&mut self, prompt: &str) -> String {
        format!("{}\n\n{prompt}", self.pick(GO_BACK))
    }

    pub fn help(&self, stage: Option<Stage>, rules: &BookingRules) -> String {
        let Some(stage) = stage else {
            return GENERAL_HELP.to_string();
        };
        let step = match stage {
            Stage::Time => "Select a showtime from the available times shown above.".to_string(),
            Stage::Tickets => format!(
                "Enter the number of tickets you need ({}-{}).",
                rules.min_tickets, rules.max_tickets
            ),
            Stage::Seats => "Select seats using format: A1, B5, C3".to_string(),
            Stage::Confirm => "Type 'yes' to confirm your booking or 'no' to cancel.".to_string(),
        };
        format!("Current step: {step}\n\nType 'back' to go to the previous step\nType 'cancel' to cancel the booking")
    }

    pub fn bookings_list(&self, bookings: &[Booking], name: &str) -> String {
        if bookings.is_empty() {
            return format!("You don't have any bookings yet, {name}.\n\nWould you like to book a movie?");
        }
        let mut out = format!("Your Booking History ({} booking(s)):\n\n", bookings.len());
        for (i, booking) in bookings.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}\n   Reference: {}\n   Time: {}\n   Seats: {}\n   Tickets: {}\n   Total: {}\n   Booked: {}\n\n",
                i + 1,
                booking.movie_title,
                booking.reference,
                booking.showtime,
                format_seats(&booking.seats),
                booking.tickets,
                format_price(booking.total),
                format_timestamp(&booking.created_at),
            ));
        }
        out.trim_end().to_string()
    }
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%d %b %Y %H:%M").to_string()
}
