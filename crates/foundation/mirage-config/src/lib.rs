//! Mirage configuration
//!
//! Every knob is read from the process environment (optionally seeded from a
//! `.env` file). Values are parsed strictly: a variable that is present but
//! malformed is an error, never silently replaced by the default.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `RESULTS_MAX_FILES` | 10000 |
//! | `RESULTS_HISTORY_PAGE_SIZE` | 50 |
//! | `RESULTS_CLEANUP_INTERVAL` (ms) | 900000 |
//! | `RESULTS_CLEANUP_DEBOUNCE` (ms) | 10000 |
//! | `PUBLIC_DIR` | `./public` |
//! | `RESULTS_DIR` | `$PUBLIC_DIR/results` |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | 80 |
//! | `OPENAI_MODEL` | `o3-mini` |
//! | `OPENAI_BASE_URL` | `https://api.openai.com/v1` |
//! | `OPENAI_TIMEOUT` (ms) | 120000 |
//! | `SYSTEM_PROMPT_PATH` | bundled prompt |
//! | `RATE_LIMIT_WINDOW` (ms) | 300000 |
//! | `RATE_LIMIT_MAX` | 250 |

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MAX_FILES: usize = 10_000;
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 50;
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 15 * 60 * 1000;
pub const DEFAULT_CLEANUP_DEBOUNCE_MS: u64 = 10 * 1000;
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_OPENAI_MODEL: &str = "o3-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_TIMEOUT_MS: u64 = 120 * 1000;
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 250;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Cannot load env file {}: {reason}", path.display())]
    EnvFile { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Result store and retention settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsConfig {
    /// Directory holding one `<identifier>.html` per generated page
    pub dir: PathBuf,
    /// Retention cap; the visible history window is 70% of this
    pub max_files: usize,
    /// Entries per `POST /history` page
    pub history_page_size: usize,
    /// Periodic eviction interval
    pub cleanup_interval: Duration,
    /// Quiet period after the last directory change before evicting
    pub cleanup_debounce: Duration,
}

/// Upstream chat-completion settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Overrides the bundled system prompt when set
    pub system_prompt_path: Option<PathBuf>,
}

/// Per-client fixed-window request limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Root of the static file tree
    pub public_dir: PathBuf,
    pub results: ResultsConfig,
    pub openai: OpenAiConfig,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an explicit env file, then the process environment.
    ///
    /// Unlike the implicit `.env`, a named file must exist and parse.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        dotenvy::from_path(path).map_err(|e| ConfigError::EnvFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loaded env file");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let public_dir = get("PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./public"));

        let results = ResultsConfig {
            dir: get("RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| public_dir.join("results")),
            max_files: parse_positive(&get, "RESULTS_MAX_FILES", DEFAULT_MAX_FILES)?,
            history_page_size: parse_positive(
                &get,
                "RESULTS_HISTORY_PAGE_SIZE",
                DEFAULT_HISTORY_PAGE_SIZE,
            )?,
            cleanup_interval: parse_millis(
                &get,
                "RESULTS_CLEANUP_INTERVAL",
                DEFAULT_CLEANUP_INTERVAL_MS,
            )?,
            cleanup_debounce: parse_millis(
                &get,
                "RESULTS_CLEANUP_DEBOUNCE",
                DEFAULT_CLEANUP_DEBOUNCE_MS,
            )?,
        };

        let openai = OpenAiConfig {
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            timeout: parse_millis(&get, "OPENAI_TIMEOUT", DEFAULT_OPENAI_TIMEOUT_MS)?,
            system_prompt_path: get("SYSTEM_PROMPT_PATH").map(PathBuf::from),
        };

        let rate_limit = RateLimitConfig {
            window: parse_millis(&get, "RATE_LIMIT_WINDOW", DEFAULT_RATE_LIMIT_WINDOW_MS)?,
            max_requests: parse_positive(&get, "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_value(&get, "PORT", DEFAULT_PORT)?,
            public_dir,
            results,
            openai,
            rate_limit,
        })
    }

    /// `host:port` suitable for `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_value<T, G>(get: &G, key: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_positive<T, G>(get: &G, key: &'static str, default: T) -> Result<T>
where
    T: FromStr + PartialEq + Default,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    let value = parse_value(get, key, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: get(key).unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_millis<G>(get: &G, key: &'static str, default_ms: u64) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    parse_positive(get, key, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.results.max_files, 10_000);
        assert_eq!(config.results.cleanup_interval, Duration::from_secs(900));
        assert_eq!(config.results.cleanup_debounce, Duration::from_secs(10));
        assert_eq!(config.results.dir, PathBuf::from("./public").join("results"));
        assert_eq!(config.openai.model, "o3-mini");
        assert_eq!(config.rate_limit.max_requests, 250);
        assert_eq!(config.bind_addr(), "0.0.0.0:80");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("RESULTS_MAX_FILES", "10"),
            ("RESULTS_HISTORY_PAGE_SIZE", " 5 "),
            ("RESULTS_CLEANUP_INTERVAL", "1000"),
            ("PUBLIC_DIR", "/srv/www"),
            ("PORT", "8080"),
            ("OPENAI_BASE_URL", "http://localhost:9000/v1/"),
        ])
        .unwrap();

        assert_eq!(config.results.max_files, 10);
        assert_eq!(config.results.history_page_size, 5);
        assert_eq!(config.results.cleanup_interval, Duration::from_secs(1));
        assert_eq!(config.results.dir, PathBuf::from("/srv/www/results"));
        assert_eq!(config.openai.base_url, "http://localhost:9000/v1");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_results_dir_override_wins() {
        let config = config_from(&[("PUBLIC_DIR", "/srv"), ("RESULTS_DIR", "/data/pages")]).unwrap();
        assert_eq!(config.results.dir, PathBuf::from("/data/pages"));
        assert_eq!(config.public_dir, PathBuf::from("/srv"));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let config = config_from(&[("PORT", "")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_malformed_values_rejected() {
        let err = config_from(&[("RESULTS_MAX_FILES", "ten")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RESULTS_MAX_FILES", .. }));

        assert!(config_from(&[("RESULTS_HISTORY_PAGE_SIZE", "-1")]).is_err());
        assert!(config_from(&[("PORT", "70000")]).is_err());
    }

    #[test]
    fn test_zero_rejected() {
        let err = config_from(&[("RESULTS_MAX_FILES", "0")]).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
        assert!(config_from(&[("RESULTS_CLEANUP_DEBOUNCE", "0")]).is_err());
    }

    #[test]
    fn test_missing_env_file_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("missing.env");

        let err = Config::from_env_file(&path).unwrap_err();
        assert!(matches!(&err, ConfigError::EnvFile { path: p, .. } if p == &path));
        assert!(err.to_string().contains("missing.env"));
    }

    #[test]
    fn test_env_file_is_loaded() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("mirage.env");
        std::fs::write(&path, "MIRAGE_CONFIG_TEST_MARKER=loaded\n").unwrap();

        assert!(Config::from_env_file(&path).is_ok());
        assert_eq!(
            std::env::var("MIRAGE_CONFIG_TEST_MARKER").as_deref(),
            Ok("loaded")
        );
    }
}
