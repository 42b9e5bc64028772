//! Shell configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use termshell_chat::application::view::DEFAULT_DISPLAY_DELAY;

use crate::error::AppError;

const ENV_DISPLAY_DELAY_MS: &str = "SHELL_DISPLAY_DELAY_MS";
const ENV_BOOT_DELAY_MS: &str = "SHELL_BOOT_DELAY_MS";
const ENV_STORAGE_PATH: &str = "SHELL_STORAGE_PATH";
const ENV_NPC_FILE: &str = "SHELL_NPC_FILE";
const ENV_CHAT_LOREBOOK: &str = "SHELL_CHAT_LOREBOOK";
const ENV_TEST_MODE: &str = "SHELL_TEST_MODE";
const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

const DEFAULT_BOOT_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_STORAGE_PATH: &str = "termshell-storage.json";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Everything the binary needs to know before wiring the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Pause between two delivered chat messages.
    pub display_delay: Duration,
    /// Pause between a `POWERING_*` state and the settled state.
    pub boot_delay: Duration,
    /// JSON file backing the key/value store.
    pub storage_path: PathBuf,
    /// YAML NPC roster; the built-in roster is used when unset.
    pub npc_file: Option<PathBuf>,
    /// Name of the chat lorebook.
    pub chat_lorebook: Option<String>,
    /// Forwarded as `testMode` in power events.
    pub test_mode: bool,
    /// Log line format.
    pub log_format: LogFormat,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            display_delay: DEFAULT_DISPLAY_DELAY,
            boot_delay: DEFAULT_BOOT_DELAY,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            npc_file: None,
            chat_lorebook: None,
            test_mode: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ShellConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`; unset and blank variables
    /// fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            display_delay: match get(ENV_DISPLAY_DELAY_MS) {
                Some(value) => parse_millis(ENV_DISPLAY_DELAY_MS, &value)?,
                None => defaults.display_delay,
            },
            boot_delay: match get(ENV_BOOT_DELAY_MS) {
                Some(value) => parse_millis(ENV_BOOT_DELAY_MS, &value)?,
                None => defaults.boot_delay,
            },
            storage_path: get(ENV_STORAGE_PATH).map_or(defaults.storage_path, PathBuf::from),
            npc_file: get(ENV_NPC_FILE).map(PathBuf::from),
            chat_lorebook: get(ENV_CHAT_LOREBOOK),
            test_mode: match get(ENV_TEST_MODE) {
                Some(value) => parse_flag(ENV_TEST_MODE, &value)?,
                None => defaults.test_mode,
            },
            log_format: match get(ENV_LOG_FORMAT) {
                Some(value) => parse_log_format(&value)?,
                None => defaults.log_format,
            },
        })
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, AppError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| AppError::Config(format!("{key} must be a whole number of milliseconds: {e}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Config(format!("{key} must be a boolean, got `{other}`"))),
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pretty" | "text" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(AppError::Config(format!(
            "{ENV_LOG_FORMAT} must be `pretty` or `json`, got `{other}`"
        ))),
    }
}
