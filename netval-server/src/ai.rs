// netval-server/src/ai.rs
// ============================================================================
// Module: AI Bridge
// Description: Capability probing for the optional LLM explanation bridge.
// Purpose: Report availability on /health and serve model lists; never block
//          or fail unrelated work.
// Dependencies: crate::config, reqwest
// ============================================================================

//! ## Overview
//! The AI bridge is a capability flag, never a dependency: probes are
//! bounded, failures surface as `ollama_available: false`, and no other
//! route awaits the bridge. Provider settings are mutable at runtime for the
//! single local user.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use crate::config::AiSettings;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Budget for one availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
/// Upper bound for any bridge call.
const BRIDGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Ollama provider keyword.
pub const PROVIDER_OLLAMA: &str = "ollama";
/// Gemini provider keyword.
pub const PROVIDER_GEMINI: &str = "gemini";
/// OpenAI provider keyword.
pub const PROVIDER_OPENAI: &str = "openai";
/// Mistral provider keyword.
pub const PROVIDER_MISTRAL: &str = "mistral";
/// Anthropic provider keyword.
pub const PROVIDER_ANTHROPIC: &str = "anthropic";

// ============================================================================
// SECTION: Bridge
// ============================================================================

/// AI bridge with runtime-mutable settings.
#[derive(Clone)]
pub struct AiBridge {
    /// HTTP client bounded at the bridge timeout.
    client: reqwest::Client,
    /// Current provider settings.
    settings: Arc<RwLock<AiSettings>>,
}

impl AiBridge {
    /// Creates the bridge from initial settings.
    #[must_use]
    pub fn new(settings: AiSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(BRIDGE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    /// Returns a copy of the current settings.
    #[must_use]
    pub fn settings(&self) -> AiSettings {
        self.settings.read().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Replaces the current settings.
    pub fn update_settings(&self, settings: AiSettings) {
        if let Ok(mut guard) = self.settings.write() {
            *guard = settings;
        }
    }

    /// Probes availability for the health endpoint. Providers other than
    /// ollama report available without a network call.
    pub async fn ollama_available(&self) -> bool {
        let settings = self.settings();
        if settings.provider != PROVIDER_OLLAMA {
            return true;
        }
        let (ok, _message) =
            self.test_connection(PROVIDER_OLLAMA, settings.base_url.as_deref(), None).await;
        ok
    }

    /// Returns the model list for a provider. Ollama is probed live; other
    /// providers return their static catalog.
    pub async fn models(&self, provider: &str) -> Vec<String> {
        match provider {
            PROVIDER_OLLAMA => self.ollama_models().await,
            PROVIDER_GEMINI => to_strings(&["gemini-pro", "gemini-1.5-pro", "gemini-1.5-flash"]),
            PROVIDER_OPENAI => to_strings(&["gpt-3.5-turbo", "gpt-4", "gpt-4-turbo", "gpt-4o"]),
            PROVIDER_MISTRAL => {
                to_strings(&["mistral-tiny", "mistral-small", "mistral-medium", "mistral-large"])
            }
            PROVIDER_ANTHROPIC => {
                to_strings(&["claude-3-opus", "claude-3-sonnet", "claude-3-haiku"])
            }
            _ => Vec::new(),
        }
    }

    /// Tests connectivity to a provider, returning success and a message.
    pub async fn test_connection(
        &self,
        provider: &str,
        base_url: Option<&str>,
        api_key: Option<&str>,
    ) -> (bool, String) {
        match provider {
            PROVIDER_OLLAMA => {
                let base = base_url.unwrap_or("http://localhost:11434");
                let request = self
                    .client
                    .get(format!("{base}/api/tags"))
                    .timeout(PROBE_TIMEOUT)
                    .send()
                    .await;
                match request {
                    Ok(response) if response.status().is_success() => {
                        (true, "Successfully connected to Ollama".to_string())
                    }
                    Ok(response) => {
                        (false, format!("Ollama returned status {}", response.status()))
                    }
                    Err(err) => (false, err.to_string()),
                }
            }
            PROVIDER_OPENAI => {
                if api_key.is_none() {
                    return (false, "API key required".to_string());
                }
                (true, "OpenAI configuration valid".to_string())
            }
            other => (true, format!("Configuration valid for {other}")),
        }
    }

    /// Fetches the live ollama model catalog; failures yield an empty list.
    async fn ollama_models(&self) -> Vec<String> {
        let settings = self.settings();
        let base = settings.base_url.unwrap_or_else(|| "http://localhost:11434".to_string());
        let response = self
            .client
            .get(format!("{base}/api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        let Ok(response) = response else {
            return Vec::new();
        };
        let Ok(body) = response.json::<serde_json::Value>().await else {
            return Vec::new();
        };
        body.get("models")
            .and_then(|models| models.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|model| model.get("name").and_then(|name| name.as_str()))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Converts a static model catalog into owned strings.
fn to_strings(models: &[&str]) -> Vec<String> {
    models.iter().map(ToString::to_string).collect()
}
