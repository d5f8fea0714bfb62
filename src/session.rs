//! Per-caller session state
//!
//! Each WebSocket connection (or CLI invocation) owns exactly one session,
//! so the sandbox limit is never shared between callers.

use chrono::{DateTime, Utc};

use crate::filesystem::security::Sandbox;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub sandbox: Sandbox,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            sandbox: Sandbox::unrestricted(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
