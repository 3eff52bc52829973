use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;

use crate::models::Movie;
use crate::services::text;

const DEFAULT_CATALOG: &str = include_str!("../../data/movies.json");

/// Title words too common to identify a movie on their own.
const TITLE_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "of", "in", "on", "part", "one", "two", "three", "to", "for",
    "with", "my", "de", "deux", "folie",
];

/// Read-only movie listings keyed by movie key.
#[derive(Debug, Clone)]
pub struct MovieCatalog {
    movies: BTreeMap<String, Movie>,
}

impl MovieCatalog {
    pub fn new(movies: BTreeMap<String, Movie>) -> Self {
        Self { movies }
    }

    pub fn embedded() -> anyhow::Result<Self> {
        let movies = serde_json::from_str(DEFAULT_CATALOG).context("parsing embedded catalog")?;
        Ok(Self { movies })
    }

    /// Loads the catalog from `path`, or the embedded listings when no path
    /// is given or the file is empty.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Self::embedded();
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let movies: BTreeMap<String, Movie> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        if movies.is_empty() {
            tracing::warn!(path = %path.display(), "catalog file is empty, using defaults");
            return Self::embedded();
        }
        tracing::info!(path = %path.display(), movies = movies.len(), "catalog loaded");
        Ok(Self { movies })
    }

    pub fn get(&self, key: &str) -> Option<&Movie> {
        self.movies.get(key)
    }

    pub fn get_all(&self) -> &BTreeMap<String, Movie> {
        &self.movies
    }

    /// Movies whose title, key, genre, description, director or cast contain `query`.
    pub fn search(&self, query: &str) -> Vec<(&str, &Movie)> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.movies
            .iter()
            .filter(|(key, movie)| movie.searchable_text(key).contains(&needle))
            .map(|(key, movie)| (key.as_str(), movie))
            .collect()
    }

    /// The movie key a free-text utterance refers to, if any.
    pub fn resolve(&self, utterance: &str) -> Option<String> {
        let cleaned = text::clean(utterance);
        if cleaned.is_empty() {
            return None;
        }
        let tokens: Vec<&str> = cleaned.split(' ').collect();
        let padded = format!(" {cleaned} ");

        if let Some(key) = self.movies.keys().find(|k| tokens.contains(&k.as_str())) {
            return Some(key.clone());
        }

        for (key, movie) in &self.movies {
            let title = text::clean(&movie.title);
            if !title.is_empty() && padded.contains(&format!(" {title} ")) {
                return Some(key.clone());
            }
        }

        for (key, movie) in &self.movies {
            let title = text::clean(&movie.title);
            let distinctive = title
                .split(' ')
                .filter(|w| w.len() > 2 && !TITLE_STOP_WORDS.contains(w));
            if distinctive.into_iter().any(|w| tokens.contains(&w)) {
                return Some(key.clone());
            }
        }

        if cleaned.len() < 4 {
            return None;
        }
        self.search(&cleaned).first().map(|(key, _)| key.to_string())
    }
}
