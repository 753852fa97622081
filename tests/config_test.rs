use std::io::Write;

use workq::config::Config;
use workq::{Error, Limit, WorkQueue};

#[test]
fn config_from_env_reads_queue_settings() {
    // Single test touches the environment to avoid races between tests.
    unsafe {
        std::env::set_var("WORKQ_CONCURRENCY", "3");
        std::env::set_var("WORKQ_WAIT_FOR_FIRST", "false");
        std::env::remove_var("LOG_LEVEL");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.concurrency, Limit::from(3usize));
    assert!(!config.wait_for_first_submission);
    assert_eq!(config.log_level, "info");
    assert_eq!(WorkQueue::from_config(&config).concurrency_limit(), 3);

    unsafe {
        std::env::set_var("WORKQ_CONCURRENCY", "-1");
    }
    assert_eq!(Config::from_env().unwrap().concurrency, Limit::Default);

    unsafe {
        std::env::set_var("WORKQ_CONCURRENCY", "lots");
    }
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    unsafe {
        std::env::remove_var("WORKQ_CONCURRENCY");
        std::env::set_var("WORKQ_WAIT_FOR_FIRST", "maybe");
    }
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    unsafe {
        std::env::remove_var("WORKQ_WAIT_FOR_FIRST");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.concurrency, Limit::Default);
    assert!(config.wait_for_first_submission);
}

#[test]
fn config_from_toml_uses_defaults_for_missing_keys() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config, Config::default());

    let config = Config::from_toml_str(
        r#"
        [queue]
        concurrency = 8

        [telemetry]
        log_level = "workq=debug"
        "#,
    )
    .unwrap();
    assert_eq!(config.concurrency, Limit::from(8usize));
    assert!(config.wait_for_first_submission);
    assert_eq!(config.log_level, "workq=debug");
    assert!(config.otel_endpoint.is_none());
}

#[test]
fn config_from_toml_rejects_unknown_keys() {
    let result = Config::from_toml_str("[queue]\nconcurency = 2\n");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn config_load_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[queue]
concurrency = 0
wait_for_first_submission = false

[telemetry]
endpoint = "http://localhost:4317"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.concurrency, Limit::Default);
    assert!(!config.wait_for_first_submission);
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
}

#[test]
fn config_load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(&dir.path().join("missing.toml"));
    assert!(matches!(result, Err(Error::Config(_))));
}
