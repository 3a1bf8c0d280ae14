use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SafeSprintError};

/// Top-level configuration for SafeSprint.
///
/// Loaded from `~/.safesprint/config.toml` by default. Every section falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeSprintConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub interview: InterviewConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl SafeSprintConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SafeSprintConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SafeSprintError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.safesprint/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Text completion backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of the generative language REST API.
    pub api_base: String,
    /// Model name inserted into the `generateContent` path.
    pub model: String,
    /// Environment variable holding the API key. The key itself is never
    /// written to the config file.
    pub api_key_env: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Interview settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    /// Maximum characters accepted in one participant turn.
    pub max_message_chars: usize,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 2000,
        }
    }
}

/// Session setup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum problem-context length so the AI has something to work with.
    pub min_context_chars: usize,
    /// Upper bound on role slots per session.
    pub max_roles: usize,
    /// Attempts per participant before access code generation gives up.
    pub access_code_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_context_chars: 20,
            max_roles: 50,
            access_code_attempts: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SafeSprintConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 3040);
        assert_eq!(config.completion.model, "gemini-2.0-flash");
        assert_eq!(config.completion.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.interview.max_message_chars, 2000);
        assert_eq!(config.session.min_context_chars, 20);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config(
            r#"
[server]
port = 8080

[completion]
model = "gemini-1.5-flash"
"#,
        );
        let config = SafeSprintConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.completion.model, "gemini-1.5-flash");
        assert_eq!(config.completion.timeout_secs, 30);
        assert_eq!(config.session.max_roles, 50);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SafeSprintConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.server.port, 3040);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is not [valid toml");
        let result = SafeSprintConfig::load(file.path());
        assert!(matches!(result, Err(SafeSprintError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SafeSprintConfig::default();
        config.server.port = 9999;
        config.session.min_context_chars = 40;
        config.save(&path).unwrap();

        let loaded = SafeSprintConfig::load(&path).unwrap();
        assert_eq!(loaded.server.port, 9999);
        assert_eq!(loaded.session.min_context_chars, 40);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = SafeSprintConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "~/.safesprint/data");
        assert_eq!(config.session.access_code_attempts, 16);
    }
}
