//! User-facing logger configuration: the knobs, their defaults and validation.

mod env;

use std::{fmt, io, path::PathBuf, str::FromStr, sync::Arc};

use serde::Serialize;

use crate::LoggerError;

const DEFAULT_SERVICE_NAME: &str = "unnamed-service";
const DEFAULT_OUTPUT_FILE_PATH: &str = "./app.log";
const DEFAULT_OUTPUT_FORMAT: Format = Format::LogfmtNoColor;
const DEFAULT_LEVEL: Level = Level::Debug;
const DEFAULT_ROTATE_ENABLED: bool = true;
const DEFAULT_ROTATE_MAX_SIZE_MB: u64 = 10;
const DEFAULT_ROTATE_MAX_BACKUPS: u64 = 3;
const DEFAULT_ROTATE_MAX_AGE_DAYS: u64 = 28;
const DEFAULT_ROTATE_COMPRESS: bool = true;
const DEFAULT_INJECT_TRACE_INFO: bool = true;
const DEFAULT_TERMINATE_ON_FATAL: bool = true;

/// A destination for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    /// Standard output.
    Stdout,

    /// Standard error.
    Stderr,

    /// The file at [`Config::output_file_path`].
    File,
}

impl Output {
    const EXPECTED: &'static str = "stdout, stderr, file";

    /// The configuration spelling of this output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::File => "file",
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Output {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            "file" => Ok(Self::File),
            other => Err(invalid_value("output", other, Self::EXPECTED)),
        }
    }
}

/// How records are rendered for a given output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Human-readable `key=value` console rendering with ANSI colors.
    Logfmt,

    /// Human-readable `key=value` console rendering without colors.
    LogfmtNoColor,

    /// One compact JSON object per line.
    Json,
}

impl Format {
    const EXPECTED: &'static str = "logfmt, logfmt_no_color, json";

    /// The configuration spelling of this format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logfmt => "logfmt",
            Self::LogfmtNoColor => "logfmt_no_color",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logfmt" => Ok(Self::Logfmt),
            "logfmt_no_color" => Ok(Self::LogfmtNoColor),
            "json" => Ok(Self::Json),
            other => Err(invalid_value("format", other, Self::EXPECTED)),
        }
    }
}

/// The minimum level a logger emits.
///
/// Levels are totally ordered, `Disabled` being the lowest. A logger configured with `Disabled`
/// emits nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Suppress all output.
    Disabled,
    /// Very fine-grained diagnostics.
    Trace,
    /// Diagnostics useful while developing.
    Debug,
    /// Normal operational events.
    Info,
    /// Unexpected but recoverable conditions.
    Warning,
    /// Failed operations.
    Error,
    /// Unrecoverable failures; terminates the process after emitting.
    Fatal,
    /// Unrecoverable failures; panics after emitting.
    Panic,
}

impl Level {
    const EXPECTED: &'static str = "disabled, trace, debug, info, warning, error, fatal, panic";

    /// The configuration spelling of this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            "panic" => Ok(Self::Panic),
            other => Err(invalid_value("level", other, Self::EXPECTED)),
        }
    }
}

/// Callback invoked with every error raised while writing a record.
///
/// Logging calls never return errors; this hook is the way to observe dropped records.
#[derive(Clone)]
pub struct WriteErrorHook(Arc<dyn Fn(&io::Error) + Send + Sync>);

impl WriteErrorHook {
    /// Wraps `hook` so that it can be stored in a [`Config`].
    pub fn new(hook: impl Fn(&io::Error) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub(crate) fn call(&self, error: &io::Error) {
        (self.0)(error)
    }
}

impl fmt::Debug for WriteErrorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WriteErrorHook(..)")
    }
}

/// Comprehensive configuration for a [`Logger`](crate::Logger).
///
/// Every field may be left unset (empty string, empty list or `None`); unset fields receive
/// their documented default when the logger is built.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Service name added to every record as `service`.
    /// Default: `"unnamed-service"`.
    pub service_name: String,

    /// Destinations records are written to. Duplicates each get their own sink.
    /// Default: `[stdout]`.
    pub output: Vec<Output>,

    /// Path of the log file, used only when [`Output::File`] is among the outputs.
    /// Default: `"./app.log"`.
    pub output_file_path: PathBuf,

    /// Format used for outputs without a specific format.
    /// Default: [`Format::LogfmtNoColor`].
    pub output_format: Option<Format>,

    /// Format for stdout. Falls back to [`Config::output_format`] if `None`.
    pub stdout_format: Option<Format>,

    /// Format for stderr. Falls back to [`Config::output_format`] if `None`.
    pub stderr_format: Option<Format>,

    /// Format for the log file. Falls back to [`Config::output_format`] if `None`.
    pub file_format: Option<Format>,

    /// Minimum level emitted. Default: [`Level::Debug`].
    pub level: Option<Level>,

    /// Whether the log file is rotated. Default: `true`.
    pub rotate_enabled: Option<bool>,

    /// Size in megabytes at which the log file is rotated. Must be at least 1. Default: `10`.
    pub rotate_max_size_mb: Option<u64>,

    /// Number of rotated files to keep. Must be at least 1. Default: `3`.
    pub rotate_max_backups: Option<u64>,

    /// Age in days after which rotated files are removed. Must be at least 1. Default: `28`.
    pub rotate_max_age_days: Option<u64>,

    /// Whether rotated files are gzip-compressed. Default: `true`.
    pub rotate_compress: Option<bool>,

    /// Whether `trace_id` and `span_id` are added to records. Default: `true`.
    pub inject_trace_info: Option<bool>,

    /// Whether `fatal` exits the process and `panic` panics after emitting. Default: `true`.
    pub terminate_on_fatal: Option<bool>,

    /// Observer for write errors. If `None`, write errors are reported through `tracing`.
    pub on_write_error: Option<WriteErrorHook>,

    pub(crate) parse_env: bool,
}

impl Config {
    /// A configuration that is overlaid with the `LOGGER_*` environment variables when the
    /// logger is built.
    ///
    /// Variables that are absent or empty leave the corresponding field untouched, so fields set
    /// on the returned value act as fallbacks.
    pub fn from_env() -> Self {
        Self {
            parse_env: true,
            ..Self::default()
        }
    }

    /// Applies the environment overlay (if requested), fills in defaults and validates the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Environment`] if an environment variable is malformed, or
    /// [`LoggerError::InvalidValue`] if validation fails.
    pub fn finalize(mut self) -> Result<Self, LoggerError> {
        if self.parse_env {
            env::apply(&mut self)?;
        }
        self.set_defaults();
        self.validate()?;
        Ok(self)
    }

    /// The effective minimum level.
    pub fn level(&self) -> Level {
        self.level.unwrap_or(DEFAULT_LEVEL)
    }

    /// Whether log file rotation is in effect.
    pub fn rotate_enabled(&self) -> bool {
        self.rotate_enabled.unwrap_or(DEFAULT_ROTATE_ENABLED)
    }

    /// Whether trace and span IDs are injected.
    pub fn inject_trace_info(&self) -> bool {
        self.inject_trace_info.unwrap_or(DEFAULT_INJECT_TRACE_INFO)
    }

    /// Whether `fatal` and `panic` terminate after emitting.
    pub fn terminate_on_fatal(&self) -> bool {
        self.terminate_on_fatal.unwrap_or(DEFAULT_TERMINATE_ON_FATAL)
    }

    pub(crate) fn rotate_max_size_mb(&self) -> u64 {
        self.rotate_max_size_mb.unwrap_or(DEFAULT_ROTATE_MAX_SIZE_MB)
    }

    pub(crate) fn rotate_max_backups(&self) -> u64 {
        self.rotate_max_backups.unwrap_or(DEFAULT_ROTATE_MAX_BACKUPS)
    }

    pub(crate) fn rotate_max_age_days(&self) -> u64 {
        self.rotate_max_age_days.unwrap_or(DEFAULT_ROTATE_MAX_AGE_DAYS)
    }

    pub(crate) fn rotate_compress(&self) -> bool {
        self.rotate_compress.unwrap_or(DEFAULT_ROTATE_COMPRESS)
    }

    pub(crate) fn set_defaults(&mut self) {
        if self.service_name.is_empty() {
            self.service_name = DEFAULT_SERVICE_NAME.to_owned();
        }
        if self.output.is_empty() {
            self.output = vec![Output::Stdout];
        }
        if self.output_file_path.as_os_str().is_empty() {
            self.output_file_path = PathBuf::from(DEFAULT_OUTPUT_FILE_PATH);
        }
        self.output_format.get_or_insert(DEFAULT_OUTPUT_FORMAT);
        self.level.get_or_insert(DEFAULT_LEVEL);
        self.rotate_enabled.get_or_insert(DEFAULT_ROTATE_ENABLED);
        self.rotate_max_size_mb.get_or_insert(DEFAULT_ROTATE_MAX_SIZE_MB);
        self.rotate_max_backups.get_or_insert(DEFAULT_ROTATE_MAX_BACKUPS);
        self.rotate_max_age_days.get_or_insert(DEFAULT_ROTATE_MAX_AGE_DAYS);
        self.rotate_compress.get_or_insert(DEFAULT_ROTATE_COMPRESS);
        self.inject_trace_info.get_or_insert(DEFAULT_INJECT_TRACE_INFO);
        self.terminate_on_fatal.get_or_insert(DEFAULT_TERMINATE_ON_FATAL);
    }

    /// Fails on the first violation.
    ///
    /// Outputs, formats and the level are closed enums and were checked when parsed, which leaves
    /// the rotation bounds.
    pub(crate) fn validate(&self) -> Result<(), LoggerError> {
        at_least_one("rotate max size mb", self.rotate_max_size_mb)?;
        at_least_one("rotate max backups", self.rotate_max_backups)?;
        at_least_one("rotate max age days", self.rotate_max_age_days)?;
        Ok(())
    }
}

fn at_least_one(field: &'static str, value: Option<u64>) -> Result<(), LoggerError> {
    match value {
        Some(value) if value < 1 => Err(invalid_value(field, &value.to_string(), ">= 1")),
        _ => Ok(()),
    }
}

fn invalid_value(field: &'static str, value: &str, expected: &'static str) -> LoggerError {
    LoggerError::InvalidValue {
        field,
        value: value.to_owned(),
        expected,
    }
}
