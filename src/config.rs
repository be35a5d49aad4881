// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_DURATION_SEC: i64 = 3600;
const DEFAULT_PASS_RATE: f64 = 0.7;
const DEFAULT_QUESTION_BANK: &str = "data/questions.json";
const DEFAULT_TITLE: &str = "Exam";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("PUBLIC_BASE_URL is not a valid URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("EXAM_STORE must be `postgres` or `memory`, got `{0}`")]
    UnknownStore(String),
}

/// Where exam state is kept.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Postgres { database_url: String },
    /// Volatile, lost on restart. Only selected with `EXAM_STORE=memory`.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub admin_secret: String,
    pub public_base_url: Url,
    pub exam_duration_sec: i64,
    /// Absolute pass threshold in points. Takes precedence over `pass_rate`.
    pub pass_score: Option<u32>,
    pub pass_rate: f64,
    pub question_bank_path: PathBuf,
    pub exam_title: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Numeric values that fail to parse fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let admin_secret = non_empty("ADMIN_SECRET").ok_or(ConfigError::Missing("ADMIN_SECRET"))?;

        let store = match non_empty("EXAM_STORE").map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("postgres") => StoreConfig::Postgres {
                database_url: non_empty("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            Some("memory") => StoreConfig::Memory,
            Some(other) => return Err(ConfigError::UnknownStore(other.to_string())),
        };

        let public_base_url =
            Url::parse(&non_empty("PUBLIC_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()))?;

        let exam_duration_sec = parse_or("EXAM_DURATION_SEC", non_empty("EXAM_DURATION_SEC"), DEFAULT_DURATION_SEC)
            .max(1);

        let pass_score = non_empty("PASS_SCORE").and_then(|raw| match raw.trim().parse::<u32>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(value = %raw, "PASS_SCORE is not a non-negative integer, ignoring");
                None
            }
        });

        let mut pass_rate = parse_or("PASS_RATE", non_empty("PASS_RATE"), DEFAULT_PASS_RATE);
        if !(0.0..=1.0).contains(&pass_rate) {
            tracing::warn!(pass_rate, "PASS_RATE outside [0, 1], using default");
            pass_rate = DEFAULT_PASS_RATE;
        }

        Ok(Self {
            store,
            admin_secret,
            public_base_url,
            exam_duration_sec,
            pass_score,
            pass_rate,
            question_bank_path: non_empty("QUESTION_BANK_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_QUESTION_BANK)),
            exam_title: non_empty("EXAM_TITLE").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            port: parse_or("PORT", non_empty("PORT"), DEFAULT_PORT),
            rust_log: non_empty("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Candidate-facing link for an issued exam.
    pub fn exam_url(&self, token: &str) -> String {
        let base = self.public_base_url.as_str().trim_end_matches('/');
        format!("{}/exam/{}", base, token)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Malformed value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("ADMIN_SECRET", "s3cret"), ("DATABASE_URL", "postgres://localhost/exam")])
            .unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Postgres {
                database_url: "postgres://localhost/exam".into()
            }
        );
        assert_eq!(config.exam_duration_sec, 3600);
        assert_eq!(config.pass_score, None);
        assert_eq!(config.pass_rate, 0.7);
        assert_eq!(config.port, 3000);
        assert_eq!(config.exam_title, "Exam");
    }

    #[test]
    fn test_admin_secret_required() {
        assert!(matches!(
            config_from(&[]),
            Err(ConfigError::Missing("ADMIN_SECRET"))
        ));
        assert!(config_from(&[("ADMIN_SECRET", "  ")]).is_err());
    }

    #[test]
    fn test_database_required_unless_memory_opt_in() {
        assert!(matches!(
            config_from(&[("ADMIN_SECRET", "x")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
        assert!(matches!(
            config_from(&[("ADMIN_SECRET", "x"), ("EXAM_STORE", "postgres")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
        assert!(matches!(
            config_from(&[("ADMIN_SECRET", "x"), ("EXAM_STORE", "redis")]),
            Err(ConfigError::UnknownStore(_))
        ));

        let config = config_from(&[("ADMIN_SECRET", "x"), ("EXAM_STORE", "Memory")]).unwrap();
        assert_eq!(config.store, StoreConfig::Memory);
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = config_from(&[
            ("ADMIN_SECRET", "x"),
            ("EXAM_STORE", "memory"),
            ("EXAM_DURATION_SEC", "soon"),
            ("PASS_RATE", "1.5"),
            ("PASS_SCORE", "-3"),
        ])
        .unwrap();
        assert_eq!(config.exam_duration_sec, 3600);
        assert_eq!(config.pass_rate, 0.7);
        assert_eq!(config.pass_score, None);
    }

    #[test]
    fn test_exam_url_strips_trailing_slash() {
        let config = config_from(&[
            ("ADMIN_SECRET", "x"),
            ("EXAM_STORE", "memory"),
            ("PUBLIC_BASE_URL", "https://exams.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.exam_url("abc"), "https://exams.example.com/exam/abc");
    }
}
