//! Layered settings.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `DISRUPTWATCH_*` environment variables (nested keys joined with
//! `__`, e.g. `DISRUPTWATCH_TARGET__URL`). Command-line flags are applied on
//! top by the binary.
//!
//! ```toml
//! report_dir = "_output/junit"
//! sample_interval = "1s"
//! tolerance = 0.02
//!
//! [target.cluster]
//! api_server = "https://api.cluster.example.com:6443"
//! namespace = "e2e-k8s-service-lb-available"
//! service = "service-test"
//!
//! [upgrade]
//! command = ["oc", "adm", "upgrade", "--to-latest"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::disruption::MIN_COUNTED_INTERVAL;
use crate::duration::{format_seconds, parse_duration};

const ENV_PREFIX: &str = "DISRUPTWATCH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Where JUnit and summary files go. Nothing is written when unset.
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
    #[serde(deserialize_with = "de_duration")]
    pub sample_interval: Duration,
    #[serde(deserialize_with = "de_duration")]
    pub probe_timeout: Duration,
    #[serde(deserialize_with = "de_duration")]
    pub continuing_period: Duration,
    /// How long to keep sampling after the disruption ends.
    #[serde(deserialize_with = "de_duration")]
    pub settle_period: Duration,
    /// Fraction of the sampling window the target may be down, in [0, 1].
    pub tolerance: f64,
    /// Consecutive successes required before sampling starts.
    pub min_success_count: u32,
    #[serde(deserialize_with = "de_duration")]
    pub reachability_timeout: Duration,
    #[serde(default)]
    pub target: TargetSettings,
    #[serde(default)]
    pub upgrade: UpgradeSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetSettings {
    /// Probe this URL directly instead of resolving a Service.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub cluster: Option<ClusterSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterSettings {
    pub api_server: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    pub namespace: String,
    #[serde(default = "default_service")]
    pub service: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpgradeSettings {
    /// External command performing the disruption. Without one the runner
    /// just waits for `duration`.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de_opt_duration")]
    pub duration: Option<Duration>,
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn default_service() -> String {
    "service-test".to_string()
}

fn de_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn de_opt_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_duration(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl Settings {
    /// Load settings from defaults, `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("sample_interval", "1s")?
            .set_default("probe_timeout", "10s")?
            .set_default("continuing_period", "10s")?
            .set_default("settle_period", "15s")?
            .set_default("tolerance", 0.02)?
            .set_default("min_success_count", 30)?
            .set_default("reachability_timeout", "10m")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder.add_source(env).build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(ConfigError::Invalid {
                key: "tolerance",
                reason: format!("{} is outside [0, 1]", self.tolerance),
            });
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "sample_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "probe_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.continuing_period < MIN_COUNTED_INTERVAL {
            return Err(ConfigError::Invalid {
                key: "continuing_period",
                reason: format!("must be at least {}", format_seconds(MIN_COUNTED_INTERVAL)),
            });
        }
        if self.min_success_count == 0 {
            return Err(ConfigError::Invalid {
                key: "min_success_count",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
