use std::env;

use admatch_client::SessionInfo;
use uuid::Uuid;

/// Builds the session context from the local machine.
pub struct ContextManager {
    pub os_type: String,
    pub username: String,
}

impl ContextManager {
    pub fn new() -> Self {
        let os_type = if cfg!(target_os = "windows") {
            "windows".to_string()
        } else if cfg!(target_os = "macos") {
            "macos".to_string()
        } else if cfg!(target_os = "linux") {
            "linux".to_string()
        } else {
            "unknown".to_string()
        };

        let username = env::var("USER")
            .or_else(|_| env::var("USERNAME"))
            .unwrap_or_else(|_| "user".to_string());

        Self { os_type, username }
    }

    pub fn session_info(&self, user_id: Option<&str>, platform: &str) -> SessionInfo {
        SessionInfo::new(
            Uuid::new_v4().to_string(),
            user_id.unwrap_or(&self.username),
            platform,
        )
        .with_metadata("os", &self.os_type)
    }
}
