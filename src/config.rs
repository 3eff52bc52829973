use std::env;

pub const SEATS_PER_ROW: u32 = 10;
pub const ROWS: [char; 5] = ['A', 'B', 'C', 'D', 'E'];
pub const MIN_TICKETS: u32 = 1;
pub const MAX_TICKETS: u32 = 10;
pub const INTENT_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const SIMILARITY_THRESHOLD: f64 = 0.25;

/// Auditorium and ticket limits consumed by the validators.
#[derive(Clone, Debug, PartialEq)]
pub struct BookingRules {
    pub rows: Vec<char>,
    pub seats_per_row: u32,
    pub min_tickets: u32,
    pub max_tickets: u32,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            rows: ROWS.to_vec(),
            seats_per_row: SEATS_PER_ROW,
            min_tickets: MIN_TICKETS,
            max_tickets: MAX_TICKETS,
        }
    }
}

impl BookingRules {
    pub fn first_row(&self) -> char {
        self.rows.first().copied().unwrap_or('A')
    }

    pub fn last_row(&self) -> char {
        self.rows.last().copied().unwrap_or('A')
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub movies_file: Option<String>,
    pub intent_training_file: Option<String>,
    pub intent_model_file: Option<String>,
    pub intent_confidence_threshold: f64,
    pub similarity_threshold: f64,
    pub rules: BookingRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "savoybot.db".to_string(),
            movies_file: None,
            intent_training_file: None,
            intent_model_file: None,
            intent_confidence_threshold: INTENT_CONFIDENCE_THRESHOLD,
            similarity_threshold: SIMILARITY_THRESHOLD,
            rules: BookingRules::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            movies_file: non_empty_var("MOVIES_FILE"),
            intent_training_file: non_empty_var("INTENT_TRAINING_FILE"),
            intent_model_file: non_empty_var("INTENT_MODEL_FILE"),
            intent_confidence_threshold: env::var("INTENT_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.intent_confidence_threshold),
            similarity_threshold: env::var("SIMILARITY_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.similarity_threshold),
            rules: BookingRules::default(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
