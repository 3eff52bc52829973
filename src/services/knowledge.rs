use crate::models::Movie;
use crate::services::intent::classifier::{dot, SparseVector, TfidfVectorizer};
use crate::services::responses::format_price;
use crate::services::text;

const FAQ: &[(&str, &str)] = &[
    ("what is your name", "I'm SavoyBot, your movie booking assistant!"),
    ("who are you", "I'm SavoyBot, your movie booking assistant!"),
    ("what can you do", "I can help you browse movies, book tickets, check showtimes, view your bookings, and answer questions about our cinema."),
    ("how do i book tickets", "Just tell me which movie you'd like to watch, and I'll guide you through selecting a time, number of tickets, and seats!"),
    ("can i cancel my booking", "Bookings can't be cancelled through the chat. Please contact the cinema at 0115-123-4567."),
    ("can i change my booking", "Bookings can be modified up to 1 hour before the showing. Contact us at 0115-123-4567."),
    ("where is the cinema located", "Our cinema is at 123 Movie Street, Nottingham, NG1 1AA."),
    ("do you have parking", "Yes! We have free parking for all customers in our underground car park."),
    ("are there any discounts", "We offer student discounts (20% off with valid ID) and family deals (4 tickets for £40)."),
    ("what is your refund policy", "Tickets can be refunded up to 2 hours before the showing."),
    ("do you serve food and drinks", "Yes! Our concessions stand has popcorn, nachos, hot dogs, sweets, and drinks."),
    ("can i bring my own food", "Outside food and drinks are not permitted, but we have a great selection at our concessions!"),
    ("what time do you open", "We open 30 minutes before the first showing each day."),
    ("what time do you close", "We close 30 minutes after the last showing ends."),
    ("do you have 3d movies", "All our showings are currently in 2D."),
    ("is there wheelchair access", "Yes, we have full wheelchair access and accessible seating in all screens."),
    ("do you sell gift cards", "Gift cards are available at the box office from £10 to £100."),
    ("what payment methods do you accept", "We accept all major credit and debit cards, contactless payments, and mobile wallets."),
];

/// Keyword groups for movie attribute questions, checked in order.
const ATTRIBUTE_KEYWORDS: &[(MovieAttribute, &[&str])] = &[
    (MovieAttribute::Genre, &["genre", "type", "kind", "category"]),
    (MovieAttribute::Director, &["director", "directed", "who made", "filmmaker"]),
    (MovieAttribute::Cast, &["star", "cast", "actor", "actress", "who is in"]),
    (MovieAttribute::Times, &["time", "when", "showtime", "screening"]),
    (MovieAttribute::Price, &["price", "cost", "much", "expensive"]),
    (MovieAttribute::Rating, &["rating", "rated", "age", "certificate"]),
    (MovieAttribute::Duration, &["long", "duration", "runtime", "length"]),
    (MovieAttribute::Plot, &["about", "plot", "story", "synopsis"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieAttribute {
    Genre,
    Director,
    Cast,
    Times,
    Price,
    Rating,
    Duration,
    Plot,
}

pub fn detect_attribute(query: &str) -> Option<MovieAttribute> {
    let padded = format!(" {} ", text::clean(query));
    ATTRIBUTE_KEYWORDS
        .iter()
        .find(|(_, words)| {
            words
                .iter()
                .any(|w| padded.contains(&format!(" {w}")))
        })
        .map(|(attr, _)| *attr)
}

/// One-line answer about a single movie attribute, if the query asks for one.
pub fn movie_answer(query: &str, movie: &Movie) -> Option<String> {
    let answer = match detect_attribute(query)? {
        MovieAttribute::Genre => format!("{} is a {} film.", movie.title, movie.genre),
        MovieAttribute::Director => format!("{} was directed by {}.", movie.title, movie.director),
        MovieAttribute::Cast => format!("{} stars {}.", movie.title, movie.cast.join(", ")),
        MovieAttribute::Times => format!("{} is showing at: {}.", movie.title, movie.times_list()),
        MovieAttribute::Price => format!(
            "Tickets for {} cost {} each.",
            movie.title,
            format_price(movie.price)
        ),
        MovieAttribute::Rating => format!("{} is rated {}.", movie.title, movie.rating),
        MovieAttribute::Duration => format!("{} runs for {}.", movie.title, movie.duration),
        MovieAttribute::Plot => format!("{}: {}", movie.title, movie.description),
    };
    Some(answer)
}

/// FAQ retrieval by TF-IDF cosine similarity over the stored questions.
pub struct KnowledgeBase {
    entries: Vec<(String, String)>,
    vectorizer: TfidfVectorizer,
    vectors: Vec<SparseVector>,
    threshold: f64,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<(String, String)>, threshold: f64) -> Self {
        let questions: Vec<String> = entries.iter().map(|(q, _)| text::clean(q)).collect();
        let vectorizer = TfidfVectorizer::fit(&questions, 1, usize::MAX, false);
        let vectors = questions.iter().map(|q| vectorizer.transform(q)).collect();
        Self {
            entries,
            vectorizer,
            vectors,
            threshold,
        }
    }

    pub fn with_defaults(threshold: f64) -> Self {
        let entries = FAQ
            .iter()
            .map(|(q, a)| (q.to_string(), a.to_string()))
            .collect();
        Self::new(entries, threshold)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-matching answer and its score, if the score clears the threshold.
    pub fn retrieve(&self, query: &str) -> Option<(&str, f64)> {
        let cleaned = text::clean(query);
        if cleaned.is_empty() || self.entries.is_empty() {
            return None;
        }
        let q = self.vectorizer.transform(&cleaned);
        let (best, score) = self
            .vectors
            .iter()
            .map(|v| dot(&q, v))
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        tracing::debug!(score, question = %self.entries[best].0, "knowledge lookup");
        if score > self.threshold {
            Some((self.entries[best].1.as_str(), score))
        } else {
            None
        }
    }

    pub fn find_answer(&self, query: &str) -> Option<&str> {
        self.retrieve(query).map(|(answer, _)| answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::MovieCatalog;

    #[test]
    fn test_faq_lookup() {
        let kb = KnowledgeBase::with_defaults(0.25);
        let answer = kb.find_answer("Is parking available?").unwrap();
        assert!(answer.contains("free parking"));
        let answer = kb.find_answer("do you accept contactless payment methods").unwrap();
        assert!(answer.contains("contactless"));
    }

    #[test]
    fn test_unrelated_query_below_threshold() {
        let kb = KnowledgeBase::with_defaults(0.25);
        assert!(kb.find_answer("purple elephants").is_none());
        assert!(kb.find_answer("").is_none());
    }

    #[test]
    fn test_movie_attribute_answers() {
        let catalog = MovieCatalog::embedded().unwrap();
        let dune = catalog.get("dune2").unwrap();
        assert_eq!(
            movie_answer("who directed dune", dune).unwrap(),
            "Dune: Part Two was directed by Denis Villeneuve."
        );
        assert_eq!(
            movie_answer("how much is dune", dune).unwrap(),
            "Tickets for Dune: Part Two cost £12.50 each."
        );
        assert!(movie_answer("who is in dune", dune).unwrap().contains("Zendaya"));
        assert!(movie_answer("dune", dune).is_none());
    }
}
