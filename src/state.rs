use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::estimator::{DurationHistory, EstimateSessions, RuleBook, SqliteHistory};
use crate::services::reservation::ClaimLocks;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub rules: Arc<RuleBook>,
    pub history: Box<dyn DurationHistory>,
    pub sessions: EstimateSessions,
    pub claim_locks: ClaimLocks,
}

impl AppState {
    /// State backed by SQLite for both bookings and duration history.
    pub fn new(conn: Connection, config: AppConfig, rules: RuleBook) -> Self {
        let db = Arc::new(Mutex::new(conn));
        let sessions = EstimateSessions::with_capacity(config.estimate_sessions_max);
        Self {
            history: Box::new(SqliteHistory::new(Arc::clone(&db))),
            db,
            config,
            rules: Arc::new(rules),
            sessions,
            claim_locks: ClaimLocks::new(),
        }
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_millis(self.config.claim_timeout_ms)
    }
}
