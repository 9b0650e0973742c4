use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai::interaction::chat_completion::ChatProtocol;
use crate::constants::{DEFAULT_API_URL, DEFAULT_MODEL};

/// Errors raised while loading the configuration file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Application settings.
///
/// Loaded from `config.yaml` under the platform config directory, with
/// `CHATPANE_PROTOCOL`, `CHATPANE_API_URL`, `CHATPANE_MODEL` and
/// `CHATPANE_API_KEY` environment overrides. A missing file means defaults;
/// a malformed file is an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Wire protocol of the chat service, `ollama` or `openai`.
    pub protocol: ChatProtocol,
    /// Base URL of the chat service.
    pub api_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Optional bearer token, for OpenAI-compatible servers that require one.
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol: ChatProtocol::Ollama,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl Settings {
    /// Loads settings from the default config path and applies environment
    /// overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_from(Self::config_path().as_deref())?;
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Loads settings from the given file, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&content)?)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Applies environment overrides via the given lookup function.
    fn apply_env_overrides(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        if let Some(protocol) = get("CHATPANE_PROTOCOL") {
            self.protocol = ChatProtocol::from_str(&protocol).map_err(SettingsError::Invalid)?;
        }
        if let Some(api_url) = get("CHATPANE_API_URL") {
            self.api_url = api_url;
        }
        if let Some(model) = get("CHATPANE_MODEL") {
            self.model = model;
        }
        if let Some(api_key) = get("CHATPANE_API_KEY") {
            self.api_key = Some(api_key);
        }
        Ok(())
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatpane").join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_missing() {
        let settings = Settings::load_from(Some(Path::new("/nonexistent/config.yaml"))).unwrap();
        assert_eq!(settings.protocol, ChatProtocol::Ollama);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "protocol: openai").unwrap();
        writeln!(file, "api_url: http://localhost:8080/v1").unwrap();
        writeln!(file, "model: qwen2.5-coder").unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.protocol, ChatProtocol::OpenAI);
        assert_eq!(settings.api_url, "http://localhost:8080/v1");
        assert_eq!(settings.model, "qwen2.5-coder");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "protocol: [not, a, string]").unwrap();

        assert!(matches!(
            Settings::load_from(Some(&path)),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut settings = Settings::default();
        settings
            .apply_env_overrides(|key| match key {
                "CHATPANE_PROTOCOL" => Some("openai".to_string()),
                "CHATPANE_MODEL" => Some("llama3.2".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.protocol, ChatProtocol::OpenAI);
        assert_eq!(settings.model, "llama3.2");
        assert_eq!(settings.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn invalid_protocol_override_is_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_env_overrides(|key| match key {
            "CHATPANE_PROTOCOL" => Some("gopher".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(SettingsError::Invalid(_))));
    }
}
