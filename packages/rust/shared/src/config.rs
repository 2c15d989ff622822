//! Application configuration for SourceChat.
//!
//! User config lives at `~/.sourcechat/sourcechat.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceChatError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sourcechat.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sourcechat";

/// Environment variable that overrides the configured Gemini model.
pub const MODEL_OVERRIDE_ENV: &str = "GENAI_MODEL";

// ---------------------------------------------------------------------------
// Config structs (matching sourcechat.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Grounding source limits and HTTP settings.
    #[serde(default)]
    pub sources: SourcesSection,

    /// Context assembly settings.
    #[serde(default)]
    pub context: ContextSection,

    /// Speech synthesis settings.
    #[serde(default)]
    pub speech: SpeechSection,
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for answers.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// REST endpoint root.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            base_url: default_gemini_base_url(),
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesSection {
    /// Characters of PDF text passed on to the context.
    #[serde(default = "default_pdf_max_chars")]
    pub pdf_max_chars: usize,

    /// Characters of web page text passed on to the context.
    #[serde(default = "default_web_max_chars")]
    pub web_max_chars: usize,

    /// Timeout for the single page GET, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// User-Agent header sent when fetching pages.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language header sent when fetching pages.
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Maximum number of parsed documents kept in memory.
    #[serde(default = "default_pdf_cache_capacity")]
    pub pdf_cache_capacity: usize,
}

impl Default for SourcesSection {
    fn default() -> Self {
        Self {
            pdf_max_chars: default_pdf_max_chars(),
            web_max_chars: default_web_max_chars(),
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            pdf_cache_capacity: default_pdf_cache_capacity(),
        }
    }
}

fn default_pdf_max_chars() -> usize {
    4000
}
fn default_web_max_chars() -> usize {
    3000
}
fn default_fetch_timeout() -> u64 {
    5
}
fn default_user_agent() -> String {
    "Mozilla/5.0".into()
}
fn default_accept_language() -> String {
    "en-US,en;q=0.9".into()
}
fn default_pdf_cache_capacity() -> usize {
    32
}

/// `[context]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    /// Number of recent exchanges (user + assistant pairs) included as history.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    6
}

/// `[speech]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSection {
    /// Whether answers are spoken unless the caller says otherwise.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Language code passed to the synthesizer.
    #[serde(default = "default_language")]
    pub language: String,

    /// Directory receiving generated audio files.
    #[serde(default = "default_speech_dir")]
    pub output_dir: PathBuf,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            enabled: true,
            language: default_language(),
            output_dir: default_speech_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_language() -> String {
    "en".into()
}
fn default_speech_dir() -> PathBuf {
    std::env::temp_dir().join("sourcechat-tts")
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings for the source loader and fetcher.
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    pub pdf_max_chars: usize,
    pub web_max_chars: usize,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub accept_language: String,
    pub pdf_cache_capacity: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SourcesConfig {
    fn from(config: &AppConfig) -> Self {
        let s = &config.sources;
        Self {
            pdf_max_chars: s.pdf_max_chars,
            web_max_chars: s.web_max_chars,
            fetch_timeout: Duration::from_secs(s.fetch_timeout_secs),
            user_agent: s.user_agent.clone(),
            accept_language: s.accept_language.clone(),
            pdf_cache_capacity: s.pdf_cache_capacity,
        }
    }
}

/// Runtime settings for the answer orchestrator.
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub pdf_max_chars: usize,
    pub web_max_chars: usize,
    pub max_turns: usize,
    pub speech_language: String,
    pub speech_dir: PathBuf,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AnswerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            pdf_max_chars: config.sources.pdf_max_chars,
            web_max_chars: config.sources.web_max_chars,
            max_turns: config.context.max_turns,
            speech_language: config.speech.language.clone(),
            speech_dir: config.speech.output_dir.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sourcechat/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SourceChatError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sourcechat/sourcechat.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
///
/// A non-empty `GENAI_MODEL` environment variable overrides `gemini.model`.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    if let Ok(model) = std::env::var(MODEL_OVERRIDE_ENV) {
        if !model.trim().is_empty() {
            tracing::debug!(%model, "model overridden from environment");
            config.gemini.model = model.trim().to_string();
        }
    }

    config.validate()?;
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SourceChatError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SourceChatError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SourceChatError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SourceChatError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SourceChatError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sources.pdf_cache_capacity == 0 {
            return Err(SourceChatError::validation(
                "sources.pdf_cache_capacity must be at least 1",
            ));
        }
        if self.sources.fetch_timeout_secs == 0 {
            return Err(SourceChatError::validation(
                "sources.fetch_timeout_secs must be at least 1",
            ));
        }
        if !(0.0..=2.0).contains(&self.gemini.temperature) {
            return Err(SourceChatError::validation(format!(
                "gemini.temperature {} is outside 0.0..=2.0",
                self.gemini.temperature
            )));
        }
        Ok(())
    }

    /// Read the Gemini API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        let var_name = &self.gemini.api_key_env;
        match std::env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
            _ => Err(SourceChatError::config(format!(
                "Gemini API key not found. Set the {var_name} environment variable.\n\
                 Get a key at https://aistudio.google.com/apikey"
            ))),
        }
    }
}

/// Check that the Gemini API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    config.api_key().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("pdf_max_chars"));
        assert!(toml_str.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.sources.pdf_max_chars, 4000);
        assert_eq!(parsed.sources.web_max_chars, 3000);
        assert_eq!(parsed.context.max_turns, 6);
        assert_eq!(parsed.gemini.model, "gemini-2.5-flash");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[gemini]
model = "gemini-2.0-pro"

[speech]
enabled = false
output_dir = "/tmp/voices"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.gemini.model, "gemini-2.0-pro");
        assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");
        assert!(!config.speech.enabled);
        assert_eq!(config.speech.language, "en");
        assert_eq!(config.speech.output_dir, PathBuf::from("/tmp/voices"));
        assert_eq!(config.sources.fetch_timeout_secs, 5);
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();
        let sources = SourcesConfig::from(&app);
        assert_eq!(sources.fetch_timeout, Duration::from_secs(5));
        assert_eq!(sources.user_agent, "Mozilla/5.0");
        assert_eq!(sources.accept_language, "en-US,en;q=0.9");

        let answer = AnswerConfig::from(&app);
        assert_eq!(answer.max_turns, 6);
        assert_eq!(answer.speech_language, "en");
    }

    #[test]
    fn validation_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.sources.pdf_cache_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pdf_cache_capacity"));
    }

    #[test]
    fn validation_rejects_bad_temperature() {
        let mut config = AppConfig::default();
        config.gemini.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.gemini.api_key_env = "SC_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
