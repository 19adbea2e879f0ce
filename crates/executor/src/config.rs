//! Server configuration via `veneer.toml`
//!
//! The daemon reads one TOML file at startup. A default file is written on
//! first start; to change settings, edit the file and restart.

use serde::{Deserialize, Serialize};
use std::path::Path;
use veneer_core::{CodecOptions, DisplayZone, TimeFormat, DEFAULT_TIME_PATTERN};
use veneer_engine::MemoryEngineConfig;

use crate::appender::AppendOptions;
use crate::{Error, Result};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "veneer.toml";

/// Display settings for timestamps returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// `ns`, `us`, `ms`, `s` or a strftime pattern.
    #[serde(default)]
    pub format: TimeFormat,
    /// `UTC`, `Local` or a fixed offset like `+09:00`.
    #[serde(default)]
    pub zone: DisplayZone,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            format: TimeFormat::Nanos,
            zone: DisplayZone::Utc,
        }
    }
}

/// Defaults for append sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendConfig {
    /// Consecutive failures after which a session fails fast. 0 disables.
    #[serde(default)]
    pub error_check_count: u32,
    /// Format of timestamp values passed to `append`.
    #[serde(default = "default_append_time_format")]
    pub time_format: TimeFormat,
    /// Tag name prepended to tag-table rows that omit name and time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_tag_name: Option<String>,
}

fn default_append_time_format() -> TimeFormat {
    TimeFormat::Pattern(DEFAULT_TIME_PATTERN.to_string())
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            error_check_count: 0,
            time_format: default_append_time_format(),
            default_tag_name: None,
        }
    }
}

/// Settings of the bundled in-memory engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Rows buffered by an append session before an implicit commit.
    #[serde(default = "default_append_batch_size")]
    pub append_batch_size: usize,
}

fn default_append_batch_size() -> usize {
    MemoryEngineConfig::default().append_batch_size
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            append_batch_size: default_append_batch_size(),
        }
    }
}

/// Server configuration loaded from `veneer.toml`.
///
/// # Example
///
/// ```toml
/// listen = "127.0.0.1:5656"
/// log_level = "info"
/// default_timeout_ms = 30000
///
/// [time]
/// format = "ms"
/// zone = "+09:00"
///
/// [append]
/// error_check_count = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the JSON-lines transport binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Deadline applied to requests without their own. 0 means none.
    #[serde(default)]
    pub default_timeout_ms: u64,
    /// Timestamp display.
    #[serde(default)]
    pub time: TimeConfig,
    /// Append session defaults.
    #[serde(default)]
    pub append: AppendConfig,
    /// In-memory engine settings.
    #[serde(default)]
    pub engine: EngineSection,
}

fn default_listen() -> String {
    "127.0.0.1:5656".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
            default_timeout_ms: 0,
            time: TimeConfig::default(),
            append: AppendConfig::default(),
            engine: EngineSection::default(),
        }
    }
}

impl ServerConfig {
    /// Codec options for values returned to callers.
    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions::new(self.time.format.clone(), self.time.zone)
    }

    /// Append options before per-session overrides.
    pub fn append_options(&self) -> AppendOptions {
        AppendOptions {
            error_check_count: self.append.error_check_count,
            time_format: self.append.time_format.clone(),
            zone: self.time.zone,
            default_tag_name: self.append.default_tag_name.clone(),
        }
    }

    /// Memory engine settings.
    pub fn engine_config(&self) -> MemoryEngineConfig {
        MemoryEngineConfig {
            append_batch_size: self.engine.append_batch_size,
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Veneer server configuration

# Address of the JSON-lines transport
listen = "127.0.0.1:5656"

# Log filter when RUST_LOG is unset: error, warn, info, debug, trace
log_level = "info"

# Deadline for requests that do not carry their own, in ms (0 = none)
default_timeout_ms = 0

[time]
# Timestamp display: "ns", "us", "ms", "s" or a strftime pattern
format = "ns"
# Zone for pattern formats: "UTC", "Local" or an offset like "+09:00"
zone = "UTC"

[append]
# Fail fast after this many consecutive append failures (0 = never)
error_check_count = 0
# Format of timestamps passed to append
time_format = "%Y-%m-%d %H:%M:%S"
# Tag name used when a tag-table row omits name and time
# default_tag_name = "sensor-1"

[engine]
# Rows buffered per append session before an implicit commit
append_batch_size = 512
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Internal {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        let config: ServerConfig = toml::from_str(&content).map_err(|e| Error::InvalidInput {
            reason: format!("Failed to parse config file '{}': {}", path.display(), e),
        })?;
        if config.engine.append_batch_size == 0 {
            return Err(Error::InvalidInput {
                reason: "append_batch_size must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| Error::Internal {
                reason: format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ),
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Internal {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| Error::Internal {
            reason: format!("Failed to write config file '{}': {}", path.display(), e),
        })
    }
}
