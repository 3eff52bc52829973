use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::dialogue::DialogueEngine;

pub struct AppState {
    pub engine: Arc<DialogueEngine>,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Arc<Mutex<Connection>>) -> anyhow::Result<Self> {
        let engine = Arc::new(DialogueEngine::from_config(config, db)?);
        Ok(Self { engine })
    }
}
