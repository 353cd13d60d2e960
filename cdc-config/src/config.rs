use cdc_model::error::{Error, Result};
use cdc_model::TransformRule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Replication server flavor (spec §6). Affects only the handshake the
/// Binlog Source performs; row/event decoding is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Mysql,
    Mariadb,
}

impl Default for Flavor {
    fn default() -> Self {
        Flavor::Mysql
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub server_id: u32,
    #[serde(default)]
    pub flavor: Flavor,
    #[serde(default)]
    pub use_gtid: bool,
    /// SPEC_FULL §4: optional `db.table` glob allow/deny lists so the
    /// Source can skip Schema Resolver lookups for tables nobody wants.
    #[serde(default)]
    pub include_tables: Vec<String>,
    #[serde(default)]
    pub exclude_tables: Vec<String>,
}

fn default_port() -> u16 {
    3306
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionConfig {
    pub file_path: PathBuf,
    #[serde(default = "default_start_offset")]
    pub start_offset: u64,
    #[serde(default)]
    pub start_timestamp: Option<i64>,
}

fn default_start_offset() -> u64 {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub url: String,
    pub subject: String,
    #[serde(default = "default_max_reconnect")]
    pub max_reconnect: i32,
    #[serde(default = "default_reconnect_wait_secs")]
    pub reconnect_wait_secs: u64,
}

fn default_max_reconnect() -> i32 {
    60
}

fn default_reconnect_wait_secs() -> u64 {
    2
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub script: Option<PathBuf>,
    #[serde(default)]
    pub rules: Option<Vec<TransformRule>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    /// When set, logs additionally roll daily into this directory (ambient
    /// addition, teacher's `TracingFactory` behavior).
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub position: PositionConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub transformer: TransformerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("cannot read config file {:?}: {e}", path.as_ref()))
        })?;
        let config: AppConfig = serde_yaml::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Config-time validation (spec §6). Checks that don't require a live
    /// connection to the source server; those live in the Pipeline's
    /// preflight stage instead (spec §6 items 2-4).
    pub fn validate(&self) -> Result<()> {
        if self.source.server_id == 0 {
            return Err(Error::Config("source.server_id must be nonzero".into()));
        }
        if self.source.use_gtid {
            // Open Question in spec §9: the teacher's own code accepts
            // `use_gtid` but silently ignores it and keeps using
            // file+offset. That is almost certainly a bug, not a feature to
            // preserve (see DESIGN.md); we fail fast instead of silently
            // falling back so operators don't get surprised by a position
            // file format they didn't ask for.
            return Err(Error::Config(
                "source.use_gtid=true is not supported by this build; GTID-based positioning \
                 is not implemented, remove the flag to use file+offset positioning"
                    .into(),
            ));
        }
        match (&self.transformer.script, &self.transformer.rules) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "transformer.script and transformer.rules are mutually exclusive".into(),
                ))
            }
            (None, None) if self.transformer.enabled => {
                return Err(Error::Config(
                    "transformer.enabled=true requires either script or rules".into(),
                ))
            }
            _ => {}
        }
        if let Some(rules) = &self.transformer.rules {
            cdc_model::transform_rule::validate_rules(rules)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
source:
  host: 127.0.0.1
  port: 3306
  user: repl
  password: secret
  server_id: 1001
sink:
  url: "nats://localhost:4222"
  subject: "mysql.cdc.events"
position:
  file_path: /var/lib/cdc/position
"#
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let config: AppConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.source.flavor, Flavor::Mysql);
        assert_eq!(config.position.start_offset, 4);
        assert_eq!(config.sink.reconnect_wait_secs, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_server_id() {
        let mut config: AppConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.source.server_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_use_gtid() {
        let mut config: AppConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.source.use_gtid = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_script_and_rules_together() {
        let mut config: AppConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.transformer.enabled = true;
        config.transformer.script = Some(PathBuf::from("t.js"));
        config.transformer.rules = Some(vec![]);
        assert!(config.validate().is_err());
    }
}
