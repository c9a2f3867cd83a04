use crate::error::{Result, ShpError};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// What the DBF writer does with a value wider than its field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverflowPolicy {
    /// Keep the leftmost characters and record a warning
    #[default]
    Truncate,
    /// Fail the write
    Fail,
}

/// Default DBF text encoding; the format has no in-band declaration
pub const DEFAULT_CHARSET: &str = "ISO-8859-1";

/// Delay between lock acquisition attempts
pub const DEFAULT_LOCK_RETRY_MS: u64 = 200;

/// Layered configuration for the shapefile store
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub charset: ConfigValue<String>,
    pub overflow: ConfigValue<OverflowPolicy>,
    pub lock_retry_ms: ConfigValue<u64>,
    pub use_index: ConfigValue<bool>,
    pub write_cpg: ConfigValue<bool>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            charset: ConfigValue::new(DEFAULT_CHARSET.to_string(), ConfigSource::Default),
            overflow: ConfigValue::new(OverflowPolicy::Truncate, ConfigSource::Default),
            lock_retry_ms: ConfigValue::new(DEFAULT_LOCK_RETRY_MS, ConfigSource::Default),
            use_index: ConfigValue::new(true, ConfigSource::Default),
            write_cpg: ConfigValue::new(true, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ShpError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to read config file: {}", e),
        })?;

        let file_config: FileConfig = toml::from_str(&content).map_err(|e| ShpError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to parse TOML: {}", e),
        })?;

        if let Some(charset) = file_config.charset {
            resolve_charset(&charset)?;
            self.charset.update(charset, ConfigSource::File);
        }

        if let Some(overflow) = file_config.overflow {
            self.overflow.update(overflow, ConfigSource::File);
        }

        if let Some(lock_retry_ms) = file_config.lock_retry_ms {
            self.lock_retry_ms.update(lock_retry_ms, ConfigSource::File);
        }

        if let Some(use_index) = file_config.use_index {
            self.use_index.update(use_index, ConfigSource::File);
        }

        if let Some(write_cpg) = file_config.write_cpg {
            self.write_cpg.update(write_cpg, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // GEOSHP_CHARSET
        if let Ok(charset) = env::var("GEOSHP_CHARSET") {
            match resolve_charset(&charset) {
                Ok(_) => self.charset.update(charset, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOSHP_CHARSET value '{}': not a known encoding label",
                    charset
                ),
            }
        }

        // GEOSHP_OVERFLOW
        if let Ok(overflow_str) = env::var("GEOSHP_OVERFLOW") {
            match parse_overflow_policy(&overflow_str) {
                Ok(overflow) => self.overflow.update(overflow, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOSHP_OVERFLOW value '{}': expected truncate or fail",
                    overflow_str
                ),
            }
        }

        // GEOSHP_LOCK_RETRY_MS
        if let Ok(retry_str) = env::var("GEOSHP_LOCK_RETRY_MS") {
            match retry_str.parse::<u64>() {
                Ok(ms) => self.lock_retry_ms.update(ms, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid GEOSHP_LOCK_RETRY_MS value '{}': expected milliseconds",
                    retry_str
                ),
            }
        }

        // GEOSHP_USE_INDEX
        if let Ok(flag) = env::var("GEOSHP_USE_INDEX") {
            match parse_bool(&flag) {
                Some(value) => self.use_index.update(value, ConfigSource::Environment),
                None => tracing::warn!("Invalid GEOSHP_USE_INDEX value '{}': expected true or false", flag),
            }
        }

        // GEOSHP_WRITE_CPG
        if let Ok(flag) = env::var("GEOSHP_WRITE_CPG") {
            match parse_bool(&flag) {
                Some(value) => self.write_cpg.update(value, ConfigSource::Environment),
                None => tracing::warn!("Invalid GEOSHP_WRITE_CPG value '{}': expected true or false", flag),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(charset) = overrides.charset {
            self.charset.update(charset, ConfigSource::Cli);
        }

        if let Some(overflow) = overrides.overflow {
            self.overflow.update(overflow, ConfigSource::Cli);
        }

        if let Some(lock_retry_ms) = overrides.lock_retry_ms {
            self.lock_retry_ms.update(lock_retry_ms, ConfigSource::Cli);
        }

        if let Some(use_index) = overrides.use_index {
            self.use_index.update(use_index, ConfigSource::Cli);
        }
    }

    /// Resolve the layered values into the options the store consumes
    pub fn store_options(&self) -> Result<StoreOptions> {
        Ok(StoreOptions {
            encoding: resolve_charset(&self.charset.value)?,
            charset_is_default: self.charset.source == ConfigSource::Default,
            overflow: self.overflow.value,
            lock_retry: Duration::from_millis(self.lock_retry_ms.value.max(1)),
            use_index: self.use_index.value,
            write_cpg: self.write_cpg.value,
        })
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert("charset".to_string(), (self.charset.value.clone(), self.charset.source));
        map.insert(
            "overflow".to_string(),
            (format!("{:?}", self.overflow.value), self.overflow.source),
        );
        map.insert(
            "lock_retry_ms".to_string(),
            (self.lock_retry_ms.value.to_string(), self.lock_retry_ms.source),
        );
        map.insert("use_index".to_string(), (self.use_index.value.to_string(), self.use_index.source));
        map.insert("write_cpg".to_string(), (self.write_cpg.value.to_string(), self.write_cpg.source));

        map
    }
}

/// Resolved store settings
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// DBF text encoding
    pub encoding: &'static Encoding,
    /// True when no layer overrode the charset, so a `.cpg` sidecar may choose it
    pub charset_is_default: bool,
    pub overflow: OverflowPolicy,
    /// Polling interval while waiting for a file lock
    pub lock_retry: Duration,
    /// Use the `.shx` index for random access
    pub use_index: bool,
    /// Write a `.cpg` sidecar next to new DBF files
    pub write_cpg: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            encoding: encoding_rs::WINDOWS_1252,
            charset_is_default: true,
            overflow: OverflowPolicy::Truncate,
            lock_retry: Duration::from_millis(DEFAULT_LOCK_RETRY_MS),
            use_index: true,
            write_cpg: true,
        }
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    charset: Option<String>,
    overflow: Option<OverflowPolicy>,
    lock_retry_ms: Option<u64>,
    use_index: Option<bool>,
    write_cpg: Option<bool>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub charset: Option<String>,
    pub overflow: Option<OverflowPolicy>,
    pub lock_retry_ms: Option<u64>,
    pub use_index: Option<bool>,
}

/// Resolve a charset label such as `UTF-8` or `ISO-8859-1`
pub fn resolve_charset(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| ShpError::ConfigInvalid {
        key: "charset".to_string(),
        reason: format!("Unknown charset: {}", label),
    })
}

/// Parse overflow policy from string
pub fn parse_overflow_policy(s: &str) -> Result<OverflowPolicy> {
    match s.to_lowercase().as_str() {
        "truncate" | "lenient" => Ok(OverflowPolicy::Truncate),
        "fail" | "strict" => Ok(OverflowPolicy::Fail),
        _ => Err(ShpError::ConfigInvalid {
            key: "overflow".to_string(),
            reason: format!("Invalid overflow policy: {}. Use truncate or fail", s),
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.charset.value, "ISO-8859-1");
        assert_eq!(config.charset.source, ConfigSource::Default);
        assert_eq!(config.overflow.value, OverflowPolicy::Truncate);
        assert_eq!(config.lock_retry_ms.value, 200);
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
charset = "UTF-8"
overflow = "Fail"
lock_retry_ms = 50
use_index = false
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.charset.value, "UTF-8");
        assert_eq!(config.charset.source, ConfigSource::File);
        assert_eq!(config.overflow.value, OverflowPolicy::Fail);
        assert_eq!(config.lock_retry_ms.value, 50);
        assert!(!config.use_index.value);
        assert_eq!(config.write_cpg.source, ConfigSource::Default);
    }

    #[test]
    fn test_file_with_unknown_charset() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "charset = \"KLINGON-1\"").unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(ShpError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_store_options() {
        let mut config = LayeredConfig::with_defaults();
        config.update_from_cli(CliConfigOverrides {
            charset: Some("utf-8".to_string()),
            lock_retry_ms: Some(10),
            ..Default::default()
        });

        let options = config.store_options().unwrap();
        assert_eq!(options.encoding, encoding_rs::UTF_8);
        assert!(!options.charset_is_default);
        assert_eq!(options.lock_retry, Duration::from_millis(10));
    }

    #[test]
    fn test_parse_overflow_policy() {
        assert_eq!(parse_overflow_policy("strict").unwrap(), OverflowPolicy::Fail);
        assert_eq!(parse_overflow_policy("TRUNCATE").unwrap(), OverflowPolicy::Truncate);
        assert!(parse_overflow_policy("maybe").is_err());
    }
}
