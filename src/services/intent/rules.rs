use crate::models::Intent;
use crate::services::text;

/// A deterministic check evaluated before the classifier. Predicates see the
/// lowercased, trimmed utterance.
#[derive(Clone, Copy)]
pub struct IntentRule {
    pub name: &'static str,
    pub intent: Intent,
    pub predicate: fn(&str) -> bool,
}

impl IntentRule {
    pub fn matches(&self, text: &str) -> bool {
        (self.predicate)(text)
    }
}

impl std::fmt::Debug for IntentRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentRule")
            .field("name", &self.name)
            .field("intent", &self.intent)
            .finish()
    }
}

const LIST_MOVIES_PHRASES: &[&str] = &[
    "show movies",
    "list movies",
    "show films",
    "list films",
    "movies",
    "films",
    "whats on",
    "whats playing",
    "what is playing",
];

const BOOKINGS_PHRASES: &[&str] = &[
    "my bookings",
    "bookings",
    "view bookings",
    "show bookings",
    "show my bookings",
    "view my bookings",
    "my tickets",
];

fn is_help(text: &str) -> bool {
    text == "?" || text::clean(text) == "help"
}

fn is_list_movies(text: &str) -> bool {
    LIST_MOVIES_PHRASES.contains(&text::clean(text).as_str())
}

fn is_bookings(text: &str) -> bool {
    BOOKINGS_PHRASES.contains(&text::clean(text).as_str())
}

fn is_booking_request(text: &str) -> bool {
    matches!(
        text::tokenize(text).first().map(String::as_str),
        Some("book") | Some("reserve")
    )
}

/// The rule table, in evaluation order.
pub fn default_rules() -> Vec<IntentRule> {
    vec![
        IntentRule {
            name: "help_command",
            intent: Intent::Help,
            predicate: is_help,
        },
        IntentRule {
            name: "list_movies_command",
            intent: Intent::ShowMovies,
            predicate: is_list_movies,
        },
        IntentRule {
            name: "bookings_command",
            intent: Intent::ViewBookings,
            predicate: is_bookings,
        },
        IntentRule {
            name: "booking_request",
            intent: Intent::BookTickets,
            predicate: is_booking_request,
        },
    ]
}

pub fn first_match<'a>(rules: &'a [IntentRule], text: &str) -> Option<&'a IntentRule> {
    rules.iter().find(|rule| rule.matches(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_fire_on_commands() {
        let rules = default_rules();
        let cases = [
            ("help", Intent::Help),
            ("?", Intent::Help),
            ("help!", Intent::Help),
            ("show movies", Intent::ShowMovies),
            ("what's playing?", Intent::ShowMovies),
            ("my bookings", Intent::ViewBookings),
            ("book dune", Intent::BookTickets),
            ("reserve seats for joker", Intent::BookTickets),
        ];
        for (text, expected) in cases {
            let rule = first_match(&rules, text).unwrap_or_else(|| panic!("no rule for {text}"));
            assert_eq!(rule.intent, expected, "{text}");
        }
    }

    #[test]
    fn test_rules_are_disjoint() {
        let rules = default_rules();
        for text in ["help", "show movies", "my bookings", "book dune"] {
            let hits = rules.iter().filter(|r| r.matches(text)).count();
            assert_eq!(hits, 1, "{text} matched {hits} rules");
        }
    }

    #[test]
    fn test_rules_ignore_paraphrase() {
        let rules = default_rules();
        assert!(first_match(&rules, "can you help me pick a film").is_none());
        assert!(first_match(&rules, "i want to book").is_none());
        assert!(first_match(&rules, "booking").is_none());
    }
}
