//! Overlay of `LOGGER_*` environment variables onto a [`Config`].

use std::{env, fmt, str::FromStr};

use super::{Config, Output};
use crate::LoggerError;

const SERVICE_NAME: &str = "LOGGER_SERVICE_NAME";
const OUTPUT: &str = "LOGGER_OUTPUT";
const OUTPUT_FILE_PATH: &str = "LOGGER_OUTPUT_FILE_PATH";
const OUTPUT_FORMAT: &str = "LOGGER_OUTPUT_FORMAT";
const STDOUT_FORMAT: &str = "LOGGER_STDOUT_FORMAT";
const STDERR_FORMAT: &str = "LOGGER_STDERR_FORMAT";
const FILE_FORMAT: &str = "LOGGER_FILE_FORMAT";
const LEVEL: &str = "LOGGER_LEVEL";
const ROTATE_ENABLED: &str = "LOGGER_ROTATE_ENABLED";
const ROTATE_MAX_SIZE_MB: &str = "LOGGER_ROTATE_MAX_SIZE_MB";
const ROTATE_MAX_BACKUPS: &str = "LOGGER_ROTATE_MAX_BACKUPS";
const ROTATE_MAX_AGE_DAYS: &str = "LOGGER_ROTATE_MAX_AGE_DAYS";
const ROTATE_COMPRESS: &str = "LOGGER_ROTATE_COMPRESS";
const INJECT_TRACE_INFO: &str = "LOGGER_INJECT_TRACE_INFO";
const TERMINATE_ON_FATAL: &str = "LOGGER_TERMINATE_ON_FATAL";

/// Overwrites every field whose environment variable is set to a non-empty value.
pub(super) fn apply(config: &mut Config) -> Result<(), LoggerError> {
    if let Some(service_name) = lookup(SERVICE_NAME)? {
        config.service_name = service_name;
    }
    if let Some(output) = parse_list::<Output>(OUTPUT)? {
        config.output = output;
    }
    if let Some(path) = env::var_os(OUTPUT_FILE_PATH).filter(|path| !path.is_empty()) {
        config.output_file_path = path.into();
    }

    overlay(&mut config.output_format, parse(OUTPUT_FORMAT)?);
    overlay(&mut config.stdout_format, parse(STDOUT_FORMAT)?);
    overlay(&mut config.stderr_format, parse(STDERR_FORMAT)?);
    overlay(&mut config.file_format, parse(FILE_FORMAT)?);
    overlay(&mut config.level, parse(LEVEL)?);

    overlay(&mut config.rotate_enabled, parse_bool(ROTATE_ENABLED)?);
    overlay(&mut config.rotate_max_size_mb, parse(ROTATE_MAX_SIZE_MB)?);
    overlay(&mut config.rotate_max_backups, parse(ROTATE_MAX_BACKUPS)?);
    overlay(&mut config.rotate_max_age_days, parse(ROTATE_MAX_AGE_DAYS)?);
    overlay(&mut config.rotate_compress, parse_bool(ROTATE_COMPRESS)?);

    overlay(&mut config.inject_trace_info, parse_bool(INJECT_TRACE_INFO)?);
    overlay(&mut config.terminate_on_fatal, parse_bool(TERMINATE_ON_FATAL)?);

    Ok(())
}

fn overlay<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}

/// Absent and empty variables are both treated as unset.
fn lookup(variable: &'static str) -> Result<Option<String>, LoggerError> {
    match env::var(variable) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(value)) => Err(LoggerError::Environment {
            variable,
            value: value.to_string_lossy().into_owned(),
            reason: "value is not valid unicode".to_owned(),
        }),
    }
}

fn parse<T>(variable: &'static str) -> Result<Option<T>, LoggerError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(variable)?
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|error| malformed(variable, &value, error))
        })
        .transpose()
}

fn parse_list<T>(variable: &'static str) -> Result<Option<Vec<T>>, LoggerError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(variable)?
        .map(|value| {
            value
                .split(',')
                .map(|item| {
                    item.trim()
                        .parse::<T>()
                        .map_err(|error| malformed(variable, &value, error))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
}

/// Accepts the same spellings as Go's `strconv.ParseBool`, which operators tend to reach for.
fn parse_bool(variable: &'static str) -> Result<Option<bool>, LoggerError> {
    lookup(variable)?
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            _ => Err(malformed(variable, &value, "expected a boolean")),
        })
        .transpose()
}

fn malformed(variable: &'static str, value: &str, reason: impl fmt::Display) -> LoggerError {
    LoggerError::Environment {
        variable,
        value: value.to_owned(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::{Format, Level};

    const ALL: [&str; 15] = [
        SERVICE_NAME,
        OUTPUT,
        OUTPUT_FILE_PATH,
        OUTPUT_FORMAT,
        STDOUT_FORMAT,
        STDERR_FORMAT,
        FILE_FORMAT,
        LEVEL,
        ROTATE_ENABLED,
        ROTATE_MAX_SIZE_MB,
        ROTATE_MAX_BACKUPS,
        ROTATE_MAX_AGE_DAYS,
        ROTATE_COMPRESS,
        INJECT_TRACE_INFO,
        TERMINATE_ON_FATAL,
    ];

    fn with_env(vars: &[(&str, &str)], test: impl FnOnce()) {
        for variable in ALL {
            env::remove_var(variable);
        }
        for (variable, value) in vars {
            env::set_var(variable, value);
        }
        test();
        for variable in ALL {
            env::remove_var(variable);
        }
    }

    #[test]
    #[serial]
    fn every_variable_is_applied() {
        with_env(
            &[
                (SERVICE_NAME, "orders"),
                (OUTPUT, "stdout, stderr,file"),
                (OUTPUT_FILE_PATH, "/var/log/orders.log"),
                (OUTPUT_FORMAT, "json"),
                (STDOUT_FORMAT, "logfmt"),
                (STDERR_FORMAT, "logfmt_no_color"),
                (FILE_FORMAT, "json"),
                (LEVEL, "warning"),
                (ROTATE_ENABLED, "false"),
                (ROTATE_MAX_SIZE_MB, "50"),
                (ROTATE_MAX_BACKUPS, "7"),
                (ROTATE_MAX_AGE_DAYS, "14"),
                (ROTATE_COMPRESS, "F"),
                (INJECT_TRACE_INFO, "0"),
                (TERMINATE_ON_FATAL, "TRUE"),
            ],
            || {
                let mut config = Config::default();
                apply(&mut config).expect("all variables are well formed");

                assert_eq!(config.service_name, "orders");
                assert_eq!(
                    config.output,
                    vec![Output::Stdout, Output::Stderr, Output::File]
                );
                assert_eq!(
                    config.output_file_path,
                    std::path::PathBuf::from("/var/log/orders.log")
                );
                assert_eq!(config.output_format, Some(Format::Json));
                assert_eq!(config.stdout_format, Some(Format::Logfmt));
                assert_eq!(config.stderr_format, Some(Format::LogfmtNoColor));
                assert_eq!(config.file_format, Some(Format::Json));
                assert_eq!(config.level, Some(Level::Warning));
                assert_eq!(config.rotate_enabled, Some(false));
                assert_eq!(config.rotate_max_size_mb, Some(50));
                assert_eq!(config.rotate_max_backups, Some(7));
                assert_eq!(config.rotate_max_age_days, Some(14));
                assert_eq!(config.rotate_compress, Some(false));
                assert_eq!(config.inject_trace_info, Some(false));
                assert_eq!(config.terminate_on_fatal, Some(true));
            },
        );
    }

    #[test]
    #[serial]
    fn absent_and_empty_variables_keep_programmatic_values() {
        with_env(&[(LEVEL, ""), (SERVICE_NAME, "from-env")], || {
            let mut config = Config {
                level: Some(Level::Error),
                output: vec![Output::Stderr],
                ..Config::default()
            };
            apply(&mut config).expect("no malformed variables");

            assert_eq!(config.level, Some(Level::Error));
            assert_eq!(config.output, vec![Output::Stderr]);
            assert_eq!(config.service_name, "from-env");
        });
    }

    #[test]
    #[serial]
    fn malformed_values_name_the_variable() {
        with_env(&[(ROTATE_MAX_BACKUPS, "three")], || {
            let error = apply(&mut Config::default()).expect_err("`three` is not an integer");
            assert!(matches!(
                error,
                LoggerError::Environment {
                    variable: ROTATE_MAX_BACKUPS,
                    ..
                }
            ));
        });

        with_env(&[(INJECT_TRACE_INFO, "maybe")], || {
            assert!(apply(&mut Config::default()).is_err());
        });

        with_env(&[(OUTPUT, "stdout,,file")], || {
            let error = apply(&mut Config::default()).expect_err("empty list item");
            assert!(error.to_string().contains(OUTPUT));
        });

        with_env(&[(LEVEL, "verbose")], || {
            let error = apply(&mut Config::default()).expect_err("unknown level");
            assert!(error.to_string().contains("invalid level: verbose"));
        });
    }

    #[test]
    #[serial]
    fn overlay_only_runs_for_env_configs() {
        with_env(&[(LEVEL, "error")], || {
            let plain = Config::default()
                .finalize()
                .expect("defaults are valid");
            assert_eq!(plain.level(), Level::Debug);

            let from_env = Config::from_env()
                .finalize()
                .expect("environment is valid");
            assert_eq!(from_env.level(), Level::Error);
        });
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn file_path_may_be_any_os_string() {
        use std::{ffi::OsString, os::unix::ffi::OsStringExt, path::PathBuf};

        let path = OsString::from_vec(b"/var/log/caf\xe9.log".to_vec());
        with_env(&[], || {
            env::set_var(OUTPUT_FILE_PATH, &path);
            let mut config = Config::default();
            apply(&mut config).expect("non-unicode paths are accepted");

            assert_eq!(config.output_file_path, PathBuf::from(path.clone()));
        });
    }

    #[test]
    #[serial]
    fn zero_rotation_size_from_env_fails_validation() {
        with_env(&[(ROTATE_MAX_SIZE_MB, "0")], || {
            assert!(matches!(
                Config::from_env().finalize(),
                Err(LoggerError::InvalidValue { .. })
            ));
        });
    }
}
