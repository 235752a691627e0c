// ⚙️ Configuration - environment variables with defaults

use crate::cannibalization::DEFAULT_INFLUENCE_RADIUS_KM;
use crate::error::{AtmError, AtmResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AtmError::Config(format!(
                "ATM_LOG_FORMAT must be `pretty` or `json`, got `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Persisted ATM snapshot (JSON array)
    pub data_file: PathBuf,
    pub server_addr: String,
    pub refresh_interval: Duration,
    pub influence_radius_km: f64,
    pub status_flip_probability: f64,
    pub growth_probability: f64,
    /// `*` allows any origin
    pub allowed_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_file: PathBuf::from("data.json"),
            server_addr: "0.0.0.0:8000".to_string(),
            refresh_interval: Duration::from_secs(1800),
            influence_radius_km: DEFAULT_INFLUENCE_RADIUS_KM,
            status_flip_probability: 0.05,
            growth_probability: 0.2,
            allowed_origins: vec!["*".to_string()],
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> AtmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> AtmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let data_file = lookup("ATM_DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_file);

        let mut server_addr = lookup("ATM_SERVER_ADDR").unwrap_or(defaults.server_addr);
        if let Some(port) = lookup("PORT") {
            let port: u16 = parse("PORT", &port)?;
            let host = server_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| server_addr.clone());
            server_addr = format!("{}:{}", host, port);
        }

        let refresh_interval = match lookup("ATM_REFRESH_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = parse("ATM_REFRESH_INTERVAL_SECS", &raw)?;
                if secs == 0 {
                    return Err(AtmError::Config(
                        "ATM_REFRESH_INTERVAL_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.refresh_interval,
        };

        let influence_radius_km = match lookup("ATM_INFLUENCE_RADIUS_KM") {
            Some(raw) => {
                let radius: f64 = parse("ATM_INFLUENCE_RADIUS_KM", &raw)?;
                if !radius.is_finite() || radius <= 0.0 {
                    return Err(AtmError::Config(format!(
                        "ATM_INFLUENCE_RADIUS_KM must be positive, got {}",
                        radius
                    )));
                }
                radius
            }
            None => defaults.influence_radius_km,
        };

        let status_flip_probability = match lookup("ATM_STATUS_FLIP_PROBABILITY") {
            Some(raw) => probability("ATM_STATUS_FLIP_PROBABILITY", &raw)?,
            None => defaults.status_flip_probability,
        };

        let growth_probability = match lookup("ATM_GROWTH_PROBABILITY") {
            Some(raw) => probability("ATM_GROWTH_PROBABILITY", &raw)?,
            None => defaults.growth_probability,
        };

        let allowed_origins = match lookup("ALLOWED_ORIGINS") {
            Some(raw) => {
                let origins: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect();
                if origins.is_empty() {
                    defaults.allowed_origins
                } else {
                    origins
                }
            }
            None => defaults.allowed_origins,
        };

        let log_format = match lookup("ATM_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.log_format,
        };

        Ok(Config {
            data_file,
            server_addr,
            refresh_interval,
            influence_radius_km,
            status_flip_probability,
            growth_probability,
            allowed_origins,
            log_format,
        })
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> AtmResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AtmError::Config(format!("{}=`{}`: {}", key, raw, e)))
}

fn probability(key: &str, raw: &str) -> AtmResult<f64> {
    let p: f64 = parse(key, raw)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(AtmError::Config(format!("{} must be within [0, 1], got {}", key, p)));
    }
    Ok(p)
}
