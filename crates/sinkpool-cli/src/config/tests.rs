use std::io::Write;
use std::time::Duration;

use super::*;

#[test]
fn test_empty_file_uses_defaults() {
    let config = SinkpoolConfig::from_toml_str("").expect("parse");
    assert_eq!(config, SinkpoolConfig::default());
    assert_eq!(config.pool.max_size(), 10);
    assert_eq!(config.sink.address(), "127.0.0.1:9999");
    assert_eq!(config.retry.max_attempts(), 3);
}

#[test]
fn test_partial_tables() {
    let config = SinkpoolConfig::from_toml_str(
        r#"
        [pool]
        max_size = 4
        idle_timeout_ms = 30000

        [sink]
        address = "10.0.0.5:7000"

        [retry]
        max_attempts = 5
        initial_backoff_ms = 250

        [logging]
        filter = "debug"
        "#,
    )
    .expect("parse");

    assert_eq!(config.pool.max_size(), 4);
    assert_eq!(config.pool.idle_timeout(), Duration::from_secs(30));
    assert_eq!(config.pool.acquire_timeout(), Duration::from_secs(30));
    assert_eq!(config.sink.address(), "10.0.0.5:7000");
    assert!(config.sink.nodelay());
    assert_eq!(config.retry.max_attempts(), 5);
    assert_eq!(config.retry.initial_backoff(), Duration::from_millis(250));
    assert_eq!(config.retry.max_backoff(), Duration::from_secs(30));
    assert_eq!(config.logging.filter, "debug");
    assert!(config.logging.console);
}

#[test]
fn test_invalid_values_are_rejected() {
    let err = SinkpoolConfig::from_toml_str("[pool]\nmax_size = 0\n").unwrap_err();
    assert!(format!("{err:#}").contains("[pool]"));

    let err = SinkpoolConfig::from_toml_str("[sink]\naddress = \"\"\n").unwrap_err();
    assert!(format!("{err:#}").contains("[sink]"));

    assert!(SinkpoolConfig::from_toml_str("[pool]\nmax_size = \"four\"\n").is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[sink]\naddress = \"sink.internal:9000\"").expect("write");

    let config = SinkpoolConfig::load(file.path()).expect("load");
    assert_eq!(config.sink.address(), "sink.internal:9000");

    let config = SinkpoolConfig::load_or_default(Some(file.path())).expect("load");
    assert_eq!(config.sink.address(), "sink.internal:9000");
}

#[test]
fn test_load_missing_file_names_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing.toml");

    let err = SinkpoolConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("missing.toml"));
}

#[test]
fn test_serialized_config_loads_back() {
    let config = SinkpoolConfig::from_toml_str("[pool]\nmax_size = 3\nmax_lifetime_ms = 60000\n")
        .expect("parse");
    let text = config.to_toml_string().expect("serialize");
    assert_eq!(SinkpoolConfig::from_toml_str(&text).expect("reparse"), config);
}
