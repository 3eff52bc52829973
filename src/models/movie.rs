use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub title: String,
    pub genre: String,
    pub rating: String,
    pub duration: String,
    pub description: String,
    pub director: String,
    #[serde(default)]
    pub cast: Vec<String>,
    pub times: Vec<String>,
    pub price: Decimal,
    pub release_year: u16,
}

impl Movie {
    /// Text matched by catalog search: title, genre, description, director and cast.
    pub fn searchable_text(&self, key: &str) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.title,
            key,
            self.genre,
            self.description,
            self.director,
            self.cast.join(" ")
        )
        .to_lowercase()
    }

    pub fn times_list(&self) -> String {
        self.times.join(", ")
    }
}
