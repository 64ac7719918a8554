use std::path::PathBuf;

use crate::errors::AppError;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_STATIC_DIR: &str = "frontend/dist";

/// Which model backend the relay forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Local Ollama server speaking newline-delimited JSON.
    Ollama { base_url: String, model: String },
    /// Cloud Gemini model reached through the rig provider client.
    Gemini { api_key: String, model: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub backend: BackendConfig,
    pub static_dir: PathBuf,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, so tests don't touch the real env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("PORT must be a port number, got '{raw}'")))?,
            None => DEFAULT_PORT,
        };

        let backend = match get("CHAT_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("ollama") => BackendConfig::Ollama {
                base_url: get("OLLAMA_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
                model: get("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            },
            Some("gemini") => BackendConfig::Gemini {
                api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")).ok_or_else(|| {
                    AppError::Config("GEMINI_API_KEY must be set for the gemini backend".to_string())
                })?,
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            },
            Some(other) => {
                return Err(AppError::Config(format!(
                    "CHAT_BACKEND must be 'ollama' or 'gemini', got '{other}'"
                )));
            }
        };

        let static_dir = PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()));

        Ok(Self { port, backend, static_dir })
    }
}
