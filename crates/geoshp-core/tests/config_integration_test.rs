//! Integration tests for layered configuration
//!
//! Precedence: CLI arguments > Environment variables > Config file > Defaults

use geoshp_core::config::{CliConfigOverrides, ConfigSource, LayeredConfig, OverflowPolicy};
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn clear_env() {
    env::remove_var("GEOSHP_CHARSET");
    env::remove_var("GEOSHP_OVERFLOW");
    env::remove_var("GEOSHP_LOCK_RETRY_MS");
    env::remove_var("GEOSHP_USE_INDEX");
    env::remove_var("GEOSHP_WRITE_CPG");
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    env::set_var("GEOSHP_CHARSET", "UTF-8");
    env::set_var("GEOSHP_OVERFLOW", "fail");

    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
charset = "windows-1252"
overflow = "Truncate"
lock_retry_ms = 75
"#
    )
    .unwrap();

    let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap().load_from_env();

    assert_eq!(config.charset.value, "UTF-8");
    assert_eq!(config.charset.source, ConfigSource::Environment);
    assert_eq!(config.overflow.value, OverflowPolicy::Fail);
    assert_eq!(config.overflow.source, ConfigSource::Environment);
    // Not set in the environment, so the file value stays
    assert_eq!(config.lock_retry_ms.value, 75);
    assert_eq!(config.lock_retry_ms.source, ConfigSource::File);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_environment_values_are_ignored() {
    clear_env();
    env::set_var("GEOSHP_CHARSET", "not-a-charset");
    env::set_var("GEOSHP_LOCK_RETRY_MS", "soon");
    env::set_var("GEOSHP_USE_INDEX", "perhaps");

    let config = LayeredConfig::with_defaults().load_from_env();

    assert_eq!(config.charset.source, ConfigSource::Default);
    assert_eq!(config.lock_retry_ms.value, 200);
    assert!(config.use_index.value);

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_environment() {
    clear_env();
    env::set_var("GEOSHP_LOCK_RETRY_MS", "500");
    env::set_var("GEOSHP_WRITE_CPG", "false");

    let mut config = LayeredConfig::with_defaults().load_from_env();
    config.update_from_cli(CliConfigOverrides { lock_retry_ms: Some(20), ..Default::default() });

    assert_eq!(config.lock_retry_ms.value, 20);
    assert_eq!(config.lock_retry_ms.source, ConfigSource::Cli);
    assert!(!config.write_cpg.value);
    assert_eq!(config.write_cpg.source, ConfigSource::Environment);

    let map = config.to_inspection_map();
    assert_eq!(map["lock_retry_ms"], ("20".to_string(), ConfigSource::Cli));

    clear_env();
}
