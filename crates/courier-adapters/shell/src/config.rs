//! Configuration for the shell adapter.
//!
//! ```toml
//! [adapters.shell]
//! user_name = "ann"
//! channel_name = "terminal"
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Name of the user typing. Defaults to `$USER`.
    pub user_name: String,

    /// Channel reported in every envelope.
    pub channel_name: String,

    /// When false, stdin is not read; output is still printed.
    pub enabled: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            user_name: std::env::var("USER")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "shell".to_string()),
            channel_name: "shell".to_string(),
            enabled: true,
        }
    }
}
