//! Configuration loading.
//!
//! Two sources, read once at startup and never mutated afterwards:
//! - an optional TOML file with generation defaults, paths and schedules
//! - the process environment (plus `.env`) for secrets and path overrides
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::delivery::{SessionCredentials, Target};
use crate::providers::openai::OPENAI_API_BASE;

// ── File config ─────────────────────────────────────────────────

/// Configuration loaded from `lowpulse.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion defaults for posts.
    pub generation: GenerationConfig,
    /// Persona, schedule and history file locations.
    pub paths: PathsConfig,
    /// Telegram transport settings.
    pub telegram: TelegramConfig,
    /// Chat bot and daily post settings.
    pub bot: BotConfig,
    /// News digest settings.
    pub digest: DigestConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
    /// OpenAI endpoint settings.
    pub openai: OpenAiConfig,
}

impl Config {
    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error when the TOML is malformed or has wrong types.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Apply environment overrides for file locations and session naming.
    ///
    /// Takes a resolver so tests do not have to touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = non_empty(&env, "IDENTITY_FILE") {
            self.paths.identity = PathBuf::from(v);
        }
        if let Some(v) = non_empty(&env, "THEME_SCHEDULE_FILE") {
            self.paths.theme_schedule = PathBuf::from(v);
        }
        if let Some(v) = non_empty(&env, "POST_HISTORY_FILE") {
            self.paths.post_history = PathBuf::from(v);
        }
        if let Some(v) = non_empty(&env, "LAST_POST_FILE") {
            self.paths.last_post = PathBuf::from(v);
        }
        if let Some(v) = first_non_empty(&env, &["TELEGRAM_SESSION_NAME", "SESSION_NAME"]) {
            self.telegram.session_name = v;
        }
        if let Some(v) = non_empty(&env, "OPENAI_MODEL") {
            self.generation.model = v;
        }
    }
}

/// Completion defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model used for posts.
    pub model: String,
    /// Sampling temperature for posts.
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_owned(),
            temperature: 0.9,
        }
    }
}

/// Locations of the text files the bot reads and writes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persona text used as the system prompt.
    pub identity: PathBuf,
    /// `weekday: theme` schedule.
    pub theme_schedule: PathBuf,
    /// Append-only history of sent posts.
    pub post_history: PathBuf,
    /// Snapshot of the most recent post.
    pub last_post: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            identity: PathBuf::from("identity.txt"),
            theme_schedule: PathBuf::from("theme_schedule.txt"),
            post_history: PathBuf::from("post_history.txt"),
            last_post: PathBuf::from("last_post.txt"),
        }
    }
}

/// Telegram transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Session label used in logs.
    pub session_name: String,
    /// Self-hosted Bot API server root, if any.
    pub api_url: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            session_name: "lowpulse_session".to_owned(),
            api_url: None,
        }
    }
}

/// Chat bot settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Cron expression (seconds field first, local time) for the daily post.
    pub daily_post_cron: String,
    /// Model for chat replies; falls back to `generation.model`.
    pub chat_model: Option<String>,
    /// Sampling temperature for chat replies.
    pub chat_temperature: f32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            daily_post_cron: "0 0 10 * * *".to_owned(),
            chat_model: None,
            chat_temperature: 0.8,
        }
    }
}

/// Weekly news digest settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// RSS feed to summarise.
    pub feed_url: String,
    /// Number of feed items to include.
    pub limit: usize,
    /// Instructions appended to the news items.
    pub prompt_file: PathBuf,
    /// Where the generated digest is saved.
    pub output_file: PathBuf,
    /// Where the preview goes; falls back to the default target.
    pub preview_target: Option<String>,
    /// Model used for the digest.
    pub model: String,
    /// Sampling temperature for the digest.
    pub temperature: f32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://swimswam.com/feed/".to_owned(),
            limit: 5,
            prompt_file: PathBuf::from("prompts/news.txt"),
            output_file: PathBuf::from("last_news_digest.txt"),
            preview_target: None,
            model: "gpt-4".to_owned(),
            temperature: 1.0,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling JSON logs in bot mode.
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

/// OpenAI endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_API_BASE.to_owned(),
        }
    }
}

// ── Resolved settings ───────────────────────────────────────────

/// Everything the process needs, resolved once at startup.
#[derive(Clone)]
pub struct Settings {
    /// File config with env overrides applied.
    pub config: Config,
    /// Completion provider key, if set.
    pub openai_api_key: Option<String>,
    /// Messaging session credentials, if configured.
    pub telegram: Option<SessionCredentials>,
    /// Default send target (`TARGET_CHANNEL_ID`, else `TARGET_CHAT_ID`).
    pub default_target: Option<Target>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("config", &self.config)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("telegram", &self.telegram)
            .field("default_target", &self.default_target)
            .finish()
    }
}

impl Settings {
    /// Resolve settings from a config and an environment resolver.
    ///
    /// `API_ID`, `API_HASH` and `SESSION_NAME` are read when the `TELEGRAM_`
    /// names are unset.
    ///
    /// # Errors
    ///
    /// Returns an error when a present variable is malformed: a non-numeric
    /// app id, a bot token without `id:secret` shape, or an
    /// unparseable target.
    pub fn resolve(mut config: Config, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        config.apply_overrides(&env);

        let openai_api_key =
            non_empty(&env, "OPENAI_API_KEY").or_else(|| non_empty(&env, "OPENAI_KEY"));

        let session_name = config.telegram.session_name.clone();
        let telegram = match (
            first_non_empty(&env, &["TELEGRAM_APP_ID", "API_ID"]),
            first_non_empty(&env, &["TELEGRAM_APP_SECRET", "API_HASH"]),
            non_empty(&env, "TELEGRAM_BOT_TOKEN"),
        ) {
            (Some(id), Some(secret), _) => {
                let app_id = id
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("Telegram app id is not numeric: {id:?}"))?;
                Some(SessionCredentials::new(session_name, app_id, secret))
            }
            (_, _, Some(token)) => Some(
                SessionCredentials::from_bot_token(session_name, &token).ok_or_else(|| {
                    anyhow::anyhow!("TELEGRAM_BOT_TOKEN must look like '<app id>:<secret>'")
                })?,
            ),
            _ => None,
        };

        let default_target = non_empty(&env, "TARGET_CHANNEL_ID")
            .or_else(|| non_empty(&env, "TARGET_CHAT_ID"))
            .map(|raw| raw.parse::<Target>())
            .transpose()
            .context("invalid default target")?;

        Ok(Self {
            config,
            openai_api_key,
            telegram,
            default_target,
        })
    }
}

/// Load `.env`, the config file, and the environment.
///
/// `explicit` (from `--config`) must exist. Otherwise `$LOWPULSE_CONFIG`,
/// `./lowpulse.toml`, then `~/.lowpulse/config.toml` are tried, and
/// defaults are used when none exists.
///
/// # Errors
///
/// Returns an error if a config file cannot be read or parsed, or the
/// environment holds malformed values.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env");
        }
    }

    let config = match resolve_config_path(explicit, |key| std::env::var(key).ok())? {
        Some(path) => load_config(&path)?,
        None => {
            tracing::debug!("no config file found, using defaults");
            Config::default()
        }
    };

    Settings::resolve(config, |key| std::env::var(key).ok())
}

/// Load a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    tracing::info!(path = %path.display(), "loading config from file");
    Config::from_toml(&contents).with_context(|| format!("invalid config at {}", path.display()))
}

/// Pick the config file to load, if any.
///
/// # Errors
///
/// Returns an error when an explicitly requested file does not exist.
pub fn resolve_config_path(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("config file does not exist: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(path) = non_empty(&env, "LOWPULSE_CONFIG") {
        let path = PathBuf::from(path);
        if !path.exists() {
            anyhow::bail!("LOWPULSE_CONFIG points to a missing file: {}", path.display());
        }
        return Ok(Some(path));
    }

    let local = PathBuf::from("lowpulse.toml");
    if local.exists() {
        return Ok(Some(local));
    }

    if let Ok(dir) = config_dir() {
        let home = dir.join("config.toml");
        if home.exists() {
            return Ok(Some(home));
        }
    }
    Ok(None)
}

/// Resolve the per-user config directory (`~/.lowpulse/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".lowpulse"))
}

fn non_empty(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

fn first_non_empty(env: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty(env, key))
}
