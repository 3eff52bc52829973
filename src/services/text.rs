use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

use crate::models::Seat;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("valid punctuation pattern"));

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:my name is|my name's|i am|i'm|im|call me|this is)\s+([a-z][a-z'-]*)")
        .expect("valid name pattern")
});

static SEAT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z])-?(\d{1,3})\b").expect("valid seat pattern"));

/// Words that follow "i am"/"i'm" without being a name ("i'm looking for...").
const NOT_NAMES: &[&str] = &[
    "a", "an", "the", "so", "very", "not", "just", "looking", "going", "trying", "here",
    "fine", "good", "great", "ok", "okay", "well", "back", "ready", "done", "sure",
    "interested", "wondering", "after", "new", "happy", "sorry", "confused", "bored",
];

/// Replies that are commands rather than a short name.
const NAME_STOP_WORDS: &[&str] = &[
    "what", "show", "help", "movie", "movies", "book", "list", "cancel", "back", "yes",
    "no", "hello", "hi", "hey", "thanks", "ok", "okay", "sure", "yeah", "yep", "nope", "nah",
    "confirm", "stop", "quit", "undo", "previous", "one", "two", "three", "four", "five",
    "six", "seven", "eight", "nine", "ten", "eleven", "twelve", "single", "couple", "pair",
];

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("a couple", 2),
    ("a pair", 2),
    ("single", 1),
    ("just me", 1),
];

/// Lowercases and strips everything but ASCII letters, digits and whitespace.
pub fn clean(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_ALPHANUMERIC.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokenize(text: &str) -> Vec<String> {
    clean(text).split(' ').filter(|t| !t.is_empty()).map(String::from).collect()
}

/// Stemming normaliser shared by classifier training and inference.
pub struct TextNormalizer {
    stemmer: Stemmer,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    pub fn normalize(&self, text: &str) -> String {
        tokenize(text)
            .iter()
            .map(|token| self.stemmer.stem(token).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pulls a display name out of phrases like "my name is sam" or "call me sam".
pub fn extract_name(text: &str) -> Option<String> {
    let lowered = text.trim().to_lowercase();
    let captures = NAME_PATTERN.captures(&lowered)?;
    let candidate = captures.get(1)?.as_str().trim_matches(|c| c == '\'' || c == '-');
    if candidate.is_empty() || NOT_NAMES.contains(&candidate) {
        return None;
    }
    Some(capitalize(candidate))
}

/// Treats a bare one or two word reply as a name when the user was just asked for one.
pub fn short_reply_name(text: &str) -> Option<String> {
    let tokens = tokenize(text);
    if tokens.is_empty() || tokens.len() > 2 {
        return None;
    }
    if tokens
        .iter()
        .any(|t| NAME_STOP_WORDS.contains(&t.as_str()) || t.chars().any(|c| c.is_ascii_digit()))
    {
        return None;
    }
    Some(
        tokens
            .iter()
            .map(|t| capitalize(t))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// First integer in the text, as digits or as a number word.
pub fn extract_number(text: &str) -> Option<u32> {
    let cleaned = clean(text);
    for token in cleaned.split(' ') {
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            return Some(token.parse().unwrap_or(u32::MAX));
        }
    }
    let padded = format!(" {} ", cleaned);
    NUMBER_WORDS
        .iter()
        .filter_map(|(word, value)| padded.find(&format!(" {} ", word)).map(|pos| (pos, *value)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, value)| value)
}

/// Every row-letter + number token in the text, in order of appearance.
pub fn parse_seats(text: &str) -> Vec<Seat> {
    let upper = text.to_uppercase();
    SEAT_PATTERN
        .captures_iter(&upper)
        .filter_map(|caps| {
            let row = caps.get(1)?.as_str().chars().next()?;
            let number = caps.get(2)?.as_str().parse().ok()?;
            Some(Seat::new(row, number))
        })
        .collect()
}
