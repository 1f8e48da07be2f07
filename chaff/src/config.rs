// chaff/src/config.rs
//
// Configuration loading: defaults ← JSON options file ← CHAFF_* environment
// overrides. Validation is strict and fatal: a daemon that silently runs
// with a mangled intensity or a negative session length is worse than one
// that refuses to start.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::pattern::timing::Intensity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path:   PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path:   PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub intensity:               Intensity,
    pub enable_search_noise:     bool,
    pub enable_browse_noise:     bool,
    pub enable_dns_noise:        bool,
    pub max_concurrent_sessions: usize,
    pub session_length_mean:     f64,
    pub obsession_probability:   f64,
    pub api_port:                u16,
    #[serde(skip_serializing)] // never echo the key back out
    pub api_key:                 Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            intensity:               Intensity::Medium,
            enable_search_noise:     true,
            enable_browse_noise:     true,
            enable_dns_noise:        true,
            max_concurrent_sessions: 2,
            session_length_mean:     15.0,
            obsession_probability:   0.05,
            api_port:                8099,
            api_key:                 None,
        }
    }
}

impl Config {
    /// Load with priority: options file > env > defaults. Any invalid value
    /// anywhere is fatal.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.to_path_buf(),
                    source,
                })?;
                serde_json::from_str::<Config>(&raw).map_err(|source| ConfigError::Parse {
                    path: p.to_path_buf(),
                    source,
                })?
            }
            None => Config::default(),
        };

        config.apply_env()?;
        config.validate()?;

        info!(
            intensity = %config.intensity,
            search = config.enable_search_noise,
            browse = config.enable_browse_noise,
            dns = config.enable_dns_noise,
            "config loaded"
        );
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("CHAFF_INTENSITY") {
            self.intensity = Intensity::parse(&v).ok_or_else(|| ConfigError::Invalid {
                field:  "intensity",
                reason: format!("unknown level {v:?}"),
            })?;
        }
        if let Ok(v) = std::env::var("CHAFF_ENABLE_SEARCH_NOISE") {
            self.enable_search_noise = parse_bool("enable_search_noise", &v)?;
        }
        if let Ok(v) = std::env::var("CHAFF_ENABLE_BROWSE_NOISE") {
            self.enable_browse_noise = parse_bool("enable_browse_noise", &v)?;
        }
        if let Ok(v) = std::env::var("CHAFF_ENABLE_DNS_NOISE") {
            self.enable_dns_noise = parse_bool("enable_dns_noise", &v)?;
        }
        if let Ok(v) = std::env::var("CHAFF_MAX_CONCURRENT_SESSIONS") {
            self.max_concurrent_sessions = parse_num("max_concurrent_sessions", &v)?;
        }
        if let Ok(v) = std::env::var("CHAFF_SESSION_LENGTH_MEAN") {
            self.session_length_mean = parse_num("session_length_mean", &v)?;
        }
        if let Ok(v) = std::env::var("CHAFF_OBSESSION_PROBABILITY") {
            self.obsession_probability = parse_num("obsession_probability", &v)?;
        }
        if let Ok(v) = std::env::var("CHAFF_API_PORT") {
            self.api_port = parse_num("api_port", &v)?;
        }
        if let Ok(v) = std::env::var("CHAFF_API_KEY") {
            self.api_key = Some(v);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_sessions < 1 {
            return Err(ConfigError::Invalid {
                field:  "max_concurrent_sessions",
                reason: "must be at least 1".into(),
            });
        }
        if !self.session_length_mean.is_finite() || self.session_length_mean <= 0.0 {
            return Err(ConfigError::Invalid {
                field:  "session_length_mean",
                reason: format!("{} is not a positive number", self.session_length_mean),
            });
        }
        if !(0.0..=1.0).contains(&self.obsession_probability) {
            return Err(ConfigError::Invalid {
                field:  "obsession_probability",
                reason: format!("{} is outside [0, 1]", self.obsession_probability),
            });
        }
        Ok(())
    }
}

fn parse_bool(field: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::Invalid {
            field,
            reason: format!("{other:?} is not a boolean"),
        }),
    }
}

fn parse_num<T: std::str::FromStr>(field: &'static str, v: &str) -> Result<T, ConfigError> {
    v.parse().map_err(|_| ConfigError::Invalid {
        field,
        reason: format!("{v:?} is not a valid number"),
    })
}
