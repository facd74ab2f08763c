//! Telemetry configuration.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variables (the same names hosting platforms already set)
//! - A JSON file with camelCase keys

use std::path::Path;

use clap::{Parser, ValueEnum};
use opentelemetry::KeyValue;
use serde::Deserialize;

use crate::error::{Result, TelemetryError};
use crate::instrumentation::DEFAULT_VERSION;

pub const DEFAULT_HOST_TYPE: &str = "WebApp";
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 10;

/// Output format of the log layer.
#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Resource identity and exporter settings for one process.
#[derive(Parser, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Component (service) name reported on every span and metric
    #[arg(long, env = "RESOURCE_COMPONENT", default_value = "")]
    pub component: String,

    /// Component version
    #[arg(
        id = "component_version",
        long = "component-version",
        env = "RESOURCE_VERSION",
        default_value = DEFAULT_VERSION
    )]
    pub version: String,

    /// Deployment environment (e.g. dev, prod)
    #[arg(long, env = "RESOURCE_ENVIRONMENT", default_value = "")]
    pub environment: String,

    /// Cloud region
    #[arg(long, env = "REGION_NAME", default_value = "")]
    pub region: String,

    /// Hosting site name
    #[arg(long, env = "WEBSITE_SITE_NAME", default_value = "")]
    pub website_name: String,

    /// Hosting instance id
    #[arg(long, env = "WEBSITE_INSTANCE_ID", default_value = "")]
    pub website_instance: String,

    /// Kind of host (WebApp, Function, Console, ...)
    #[arg(long, env = "RESOURCE_HOST_TYPE", default_value = DEFAULT_HOST_TYPE)]
    pub host_type: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OpenTelemetry collector endpoint (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// Metric export interval in seconds
    #[arg(
        long,
        env = "OTEL_METRIC_EXPORT_INTERVAL_SECS",
        default_value_t = DEFAULT_METRICS_INTERVAL_SECS
    )]
    pub metrics_interval_secs: u64,
}

impl TelemetryConfig {
    /// Defaults for `component`, with nothing read from the environment.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// Missing keys take their defaults. The result is validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        if self.component.is_empty() {
            return Err(TelemetryError::empty("component"));
        }
        if self.version.is_empty() {
            return Err(TelemetryError::empty("version"));
        }
        if self.metrics_interval_secs == 0 {
            return Err(TelemetryError::Config(
                "metrics interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Attributes describing this process, attached to the SDK resource.
    ///
    /// Empty optional fields are left out.
    pub fn resource_attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new("service.name", self.component.clone()),
            KeyValue::new("service.version", self.version.clone()),
        ];

        let tags = [
            ("component", &self.component),
            ("version", &self.version),
            ("environment", &self.environment),
            ("region", &self.region),
            ("websiteName", &self.website_name),
            ("websiteInstance", &self.website_instance),
            ("hostType", &self.host_type),
        ];
        attributes.extend(
            tags.into_iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(key, value)| KeyValue::new(key, value.clone())),
        );

        attributes
    }

    /// Create a configuration for testing.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            log_level: "debug".into(),
            environment: "test".into(),
            ..Self::new("test-component")
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            component: String::new(),
            version: DEFAULT_VERSION.into(),
            environment: String::new(),
            region: String::new(),
            website_name: String::new(),
            website_instance: String::new(),
            host_type: DEFAULT_HOST_TYPE.into(),
            log_level: "info".into(),
            log_format: LogFormat::Text,
            otel_endpoint: None,
            metrics_interval_secs: DEFAULT_METRICS_INTERVAL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.host_type, "WebApp");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.otel_endpoint.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_from_args() {
        let config = TelemetryConfig::parse_from([
            "telemetry",
            "--component",
            "orders",
            "--component-version",
            "2.1.0",
            "--log-format",
            "json",
        ]);
        assert_eq!(config.component, "orders");
        assert_eq!(config.version, "2.1.0");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resource_attributes_skip_empty() {
        let config = TelemetryConfig::test_config();
        let attributes = config.resource_attributes();
        let keys: Vec<&str> = attributes.iter().map(|kv| kv.key.as_str()).collect();

        assert_eq!(
            keys,
            vec![
                "service.name",
                "service.version",
                "component",
                "version",
                "environment",
                "hostType"
            ]
        );
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"component": "billing", "region": "westeurope", "websiteName": "billing-app", "logFormat": "json"}}"#
        )
        .unwrap();

        let config = TelemetryConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.component, "billing");
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.region, "westeurope");
        assert_eq!(config.website_name, "billing-app");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.metrics_interval_secs, DEFAULT_METRICS_INTERVAL_SECS);
    }

    #[test]
    fn test_from_json_file_requires_component() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": "3.0.0"}}"#).unwrap();

        assert!(matches!(
            TelemetryConfig::from_json_file(file.path()),
            Err(TelemetryError::InvalidArgument {
                name: "component",
                ..
            })
        ));
    }

    #[test]
    fn test_from_json_file_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(matches!(
            TelemetryConfig::from_json_file(file.path()),
            Err(TelemetryError::Json(_))
        ));
    }

    #[test]
    fn test_from_json_file_missing() {
        assert!(matches!(
            TelemetryConfig::from_json_file("/nonexistent/telemetry.json"),
            Err(TelemetryError::Io(_))
        ));
    }
}
