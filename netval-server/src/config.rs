// netval-server/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Runtime settings loaded from the environment.
// Purpose: Centralize ports, paths, pool sizes, and AI provider settings.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Settings load from `NETVAL_`-prefixed environment variables with defaults
//! matching the shipped deployment: loopback port 8742, database under
//! `~/.netval/netval.db`, five concurrent SSH sessions, and a 24 h plan
//! rollback retention window. AI provider settings are mutable at runtime
//! through the settings routes; everything else is fixed at startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: AI Settings
// ============================================================================

/// Mutable AI bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSettings {
    /// Provider keyword: ollama, gemini, openai, mistral, or anthropic.
    pub provider: String,
    /// Model name for the provider.
    pub model: String,
    /// Base URL, meaningful for self-hosted providers.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key, when the provider requires one.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.2:3b".to_string(),
            base_url: Some("http://localhost:11434".to_string()),
            api_key: None,
        }
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Immutable runtime settings resolved at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Loopback port the server binds.
    pub port: u16,
    /// Path of the embedded database file.
    pub db_path: PathBuf,
    /// Concurrent SSH session cap.
    pub max_ssh_connections: usize,
    /// Hours an applied plan stays eligible for rollback.
    pub plan_retention_hours: i64,
    /// Origins the local UI is served from.
    pub ui_origins: Vec<String>,
    /// Log filter directive for the tracing subscriber.
    pub log_filter: String,
    /// Initial AI bridge settings.
    pub ai: AiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8742,
            db_path: default_db_path(),
            max_ssh_connections: 5,
            plan_retention_hours: 24,
            ui_origins: vec!["http://localhost:5173".to_string(), "app://netval".to_string()],
            log_filter: "info".to_string(),
            ai: AiSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("NETVAL_PORT").unwrap_or(defaults.port),
            db_path: std::env::var("NETVAL_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            max_ssh_connections: env_parse("NETVAL_MAX_SSH_CONNECTIONS")
                .unwrap_or(defaults.max_ssh_connections),
            plan_retention_hours: env_parse("NETVAL_PLAN_RETENTION_HOURS")
                .unwrap_or(defaults.plan_retention_hours),
            ui_origins: defaults.ui_origins,
            log_filter: std::env::var("NETVAL_LOG").unwrap_or(defaults.log_filter),
            ai: AiSettings {
                provider: std::env::var("NETVAL_LLM_PROVIDER").unwrap_or(defaults.ai.provider),
                model: std::env::var("NETVAL_LLM_MODEL").unwrap_or(defaults.ai.model),
                base_url: std::env::var("NETVAL_LLM_BASE_URL").ok().or(defaults.ai.base_url),
                api_key: std::env::var("NETVAL_LLM_API_KEY").ok(),
            },
        }
    }
}

/// Parses one environment variable, ignoring unset or malformed values.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

/// Returns the default database path under the user's home directory.
fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));
    home.join(".netval").join("netval.db")
}
