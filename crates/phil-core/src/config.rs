//! phil.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{GroupSizeBounds, InstanceGroupRef};

/// Default compute API endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://compute.googleapis.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhilConfig {
    #[serde(default)]
    pub log: LogConfig,
    pub gcloud: GcloudConfig,
    pub will: WillConfig,
    pub autoscale: AutoscaleConfig,
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcloudConfig {
    pub project_id: String,
    pub api_endpoint: Option<String>,
    /// Pre-issued bearer token. Obtaining one is left to the deployment.
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WillConfig {
    pub instance_group_zone: String,
    pub instance_group_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscaleConfig {
    pub minimum_number_of_instances: u32,
    pub maximum_number_of_instances: u32,
    /// Seconds between cycles.
    pub load_check_interval: u64,
    #[serde(default = "default_upper_bound")]
    pub upper_bound_usage: f64,
    #[serde(default = "default_lower_bound")]
    pub lower_bound_usage: f64,
    /// Seconds a single adapter call may take before the cycle is failed.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout: u64,
}

fn default_upper_bound() -> f64 {
    0.9
}

fn default_lower_bound() -> f64 {
    0.5
}

fn default_stage_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl PhilConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: PhilConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        let a = &self.autoscale;
        if a.minimum_number_of_instances > a.maximum_number_of_instances {
            return Err(ConfigError::Invalid(format!(
                "autoscale.minimumNumberOfInstances ({}) exceeds autoscale.maximumNumberOfInstances ({})",
                a.minimum_number_of_instances, a.maximum_number_of_instances
            )));
        }
        if a.load_check_interval == 0 {
            return Err(ConfigError::Invalid(
                "autoscale.loadCheckInterval must be at least 1 second".to_string(),
            ));
        }
        if a.stage_timeout == 0 {
            return Err(ConfigError::Invalid(
                "autoscale.stageTimeout must be at least 1 second".to_string(),
            ));
        }
        for (key, value) in [
            ("autoscale.upperBoundUsage", a.upper_bound_usage),
            ("autoscale.lowerBoundUsage", a.lower_bound_usage),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be a non-negative number, got {value}"
                )));
            }
        }
        if a.lower_bound_usage >= a.upper_bound_usage {
            return Err(ConfigError::Invalid(format!(
                "autoscale.lowerBoundUsage ({}) must be below autoscale.upperBoundUsage ({})",
                a.lower_bound_usage, a.upper_bound_usage
            )));
        }
        for (key, value) in [
            ("gcloud.projectId", &self.gcloud.project_id),
            ("will.instanceGroupZone", &self.will.instance_group_zone),
            ("will.instanceGroupName", &self.will.instance_group_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn bounds(&self) -> GroupSizeBounds {
        GroupSizeBounds {
            minimum: self.autoscale.minimum_number_of_instances,
            maximum: self.autoscale.maximum_number_of_instances,
            upper_bound_usage: self.autoscale.upper_bound_usage,
            lower_bound_usage: self.autoscale.lower_bound_usage,
            interval: Duration::from_secs(self.autoscale.load_check_interval),
        }
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.autoscale.stage_timeout)
    }

    pub fn group(&self) -> InstanceGroupRef {
        InstanceGroupRef {
            zone: self.will.instance_group_zone.clone(),
            name: self.will.instance_group_name.clone(),
        }
    }

    pub fn api_endpoint(&self) -> &str {
        self.gcloud
            .api_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_API_ENDPOINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[log]
level = "debug"

[gcloud]
projectId = "phil-test"

[will]
instanceGroupZone = "europe-west1-b"
instanceGroupName = "will"

[autoscale]
minimumNumberOfInstances = 2
maximumNumberOfInstances = 10
loadCheckInterval = 60
upperBoundUsage = 0.8
lowerBoundUsage = 0.3

[datastore]
path = "/tmp/phil.redb"
"#;

    #[test]
    fn test_parse_full() {
        let config = PhilConfig::from_toml_str(FULL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.group().to_string(), "europe-west1-b/will");

        let bounds = config.bounds();
        assert_eq!(bounds.minimum, 2);
        assert_eq!(bounds.maximum, 10);
        assert_eq!(bounds.upper_bound_usage, 0.8);
        assert_eq!(bounds.lower_bound_usage, 0.3);
        assert_eq!(bounds.interval, Duration::from_secs(60));
        assert_eq!(config.stage_timeout(), Duration::from_secs(30));
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api_endpoint(), DEFAULT_API_ENDPOINT);
    }

    #[test]
    fn test_usage_bounds_default_to_fixed_cutoffs() {
        let toml_str = FULL
            .replace("upperBoundUsage = 0.8\n", "")
            .replace("lowerBoundUsage = 0.3\n", "");
        let config = PhilConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(config.autoscale.upper_bound_usage, 0.9);
        assert_eq!(config.autoscale.lower_bound_usage, 0.5);
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let toml_str = FULL.replace("[will]", "[other]");
        let err = PhilConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let toml_str = FULL.replace("minimumNumberOfInstances = 2", "minimumNumberOfInstances = 11");
        let config = PhilConfig::from_toml_str(&toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("minimumNumberOfInstances"));
    }

    #[test]
    fn test_inverted_usage_bounds_rejected() {
        let toml_str = FULL.replace("lowerBoundUsage = 0.3", "lowerBoundUsage = 0.8");
        let config = PhilConfig::from_toml_str(&toml_str).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let toml_str = FULL.replace("loadCheckInterval = 60", "loadCheckInterval = 0");
        let config = PhilConfig::from_toml_str(&toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_group_name_rejected() {
        let toml_str = FULL.replace("instanceGroupName = \"will\"", "instanceGroupName = \" \"");
        let config = PhilConfig::from_toml_str(&toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("will.instanceGroupName"));
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phil.toml");
        let config = PhilConfig::from_toml_str(FULL).unwrap();
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let reloaded = PhilConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.bounds(), config.bounds());
    }

    #[test]
    fn test_from_missing_file() {
        let err = PhilConfig::from_file(Path::new("/nonexistent/phil.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
