#![allow(clippy::expect_used, clippy::indexing_slicing, missing_docs)]

use std::{env, fs};

use opentelemetry::Context;
use serde_json::{Value, json};
use serial_test::serial;
use service_logger::{Config, Format, Level, Logger, Output, resolve_format};

const VARIABLES: &[&str] = &[
    "LOGGER_SERVICE_NAME",
    "LOGGER_OUTPUT",
    "LOGGER_OUTPUT_FILE_PATH",
    "LOGGER_OUTPUT_FORMAT",
    "LOGGER_FILE_FORMAT",
    "LOGGER_LEVEL",
    "LOGGER_ROTATE_ENABLED",
];

fn clear() {
    for variable in VARIABLES {
        env::remove_var(variable);
    }
}

#[test]
#[serial]
fn stdout_and_file_from_environment() {
    clear();
    let dir = tempfile::tempdir().expect("failed to create temporary directory");
    let path = dir.path().join("logs/env.log");
    env::set_var("LOGGER_SERVICE_NAME", "env-service");
    env::set_var("LOGGER_OUTPUT", "stdout, file");
    env::set_var("LOGGER_OUTPUT_FILE_PATH", &path);
    env::set_var("LOGGER_FILE_FORMAT", "json");
    env::set_var("LOGGER_LEVEL", "info");

    let logger = Logger::new(Config::from_env());
    clear();
    let logger = logger.expect("environment configuration must build");

    let config = logger.config();
    assert_eq!(config.output, vec![Output::Stdout, Output::File]);
    assert_eq!(config.level(), Level::Info);
    assert_eq!(
        resolve_format(config, Output::Stdout).ok(),
        Some(Format::LogfmtNoColor)
    );
    assert_eq!(resolve_format(config, Output::File).ok(), Some(Format::Json));

    logger.info(&Context::new(), "configured from environment", ());
    logger.debug(&Context::new(), "below the level", ());
    logger.close().expect("closing releases the file");

    let contents = fs::read_to_string(&path).expect("log file must be readable");
    let records: Vec<Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("file records are JSON"))
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["service"], json!("env-service"));
    assert_eq!(records[0]["message"], json!("configured from environment"));
}

#[test]
#[serial]
fn malformed_variable_fails_construction() {
    clear();
    env::set_var("LOGGER_LEVEL", "verbose");

    let result = Logger::new(Config::from_env());
    clear();

    let error = result.expect_err("unknown level must be rejected");
    assert!(error.to_string().contains("LOGGER_LEVEL"), "{error}");
}

#[test]
#[serial]
fn explicit_fields_are_fallbacks_for_absent_variables() {
    clear();
    env::set_var("LOGGER_OUTPUT_FORMAT", "json");

    let mut config = Config::from_env();
    config.service_name = "fallback".to_owned();
    config.level = Some(Level::Error);
    let logger = Logger::new(config);
    clear();
    let logger = logger.expect("configuration must build");

    assert_eq!(logger.service_name(), Some("fallback"));
    assert_eq!(logger.config().level(), Level::Error);
    assert_eq!(logger.config().output_format, Some(Format::Json));
}

#[test]
#[serial]
fn default_configuration_ignores_the_environment() {
    clear();
    env::set_var("LOGGER_SERVICE_NAME", "from-env");

    let logger = Logger::new(Config::default());
    clear();
    let logger = logger.expect("configuration must build");

    assert_eq!(logger.service_name(), Some("unnamed-service"));
}
