use npc_core::Persona;
use npc_core::transcript::DEFAULT_MAX_ENTRIES;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub game_id: String,
    pub tts: bool,
    pub max_chat_entries: usize,
    pub tick_hz: u32,
    pub scene_path: Option<PathBuf>,
    pub persona: Persona,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let base_url = std::env::var("PLAYER2_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:4315/v1".to_string());

        let game_id = std::env::var("PLAYER2_GAME_ID")
            .map_err(|_| ConfigError::MissingVar("PLAYER2_GAME_ID".to_string()))?;

        let tts = parse_var("PLAYER2_TTS", false)?;
        let max_chat_entries = parse_var("NPC_MAX_CHAT_ENTRIES", DEFAULT_MAX_ENTRIES)?;

        let tick_hz: u32 = parse_var("NPC_TICK_HZ", 30)?;
        if tick_hz == 0 {
            return Err(ConfigError::InvalidValue(
                "NPC_TICK_HZ".to_string(),
                "tick rate must be greater than zero".to_string(),
            ));
        }

        let scene_path = std::env::var("NPC_SCENE_PATH").ok().map(PathBuf::from);

        let defaults = Persona::default();
        let persona = Persona {
            short_name: std::env::var("NPC_SHORT_NAME").unwrap_or(defaults.short_name),
            full_name: std::env::var("NPC_FULL_NAME").unwrap_or(defaults.full_name),
            character_description: std::env::var("NPC_DESCRIPTION")
                .unwrap_or(defaults.character_description),
            system_prompt: std::env::var("NPC_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            voice_id: std::env::var("NPC_VOICE_ID").unwrap_or(defaults.voice_id),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            base_url,
            game_id,
            tts,
            max_chat_entries,
            tick_hz,
            scene_path,
            persona,
            log_level,
        })
    }
}

/// Parses an optional variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e))),
        Err(_) => Ok(default),
    }
}
