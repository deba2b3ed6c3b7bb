//! Construction of the byte sinks a logger writes to.

mod console;
mod fanout;
mod file;
mod rotation;

use std::io::{self, Write};

pub(crate) use self::file::SharedFile;
pub use self::{
    console::ConsoleWriter,
    fanout::FanOutWriter,
    rotation::{RotatingFile, RotationPolicy},
};
use crate::{Config, Format, LoggerError, Output};

/// A single destination of the fan-out writer.
pub(crate) type Sink = Box<dyn Write + Send>;

/// The format `target` is rendered with: its own override if set, otherwise the global
/// [`Config::output_format`].
///
/// # Errors
///
/// Returns [`LoggerError::UnresolvedFormat`] if neither is set. [`Config::finalize`] always sets
/// the global format, so this only happens for configurations that skipped it.
pub fn resolve_format(config: &Config, target: Output) -> Result<Format, LoggerError> {
    let target_format = match target {
        Output::Stdout => config.stdout_format,
        Output::Stderr => config.stderr_format,
        Output::File => config.file_format,
    };

    target_format
        .or(config.output_format)
        .ok_or(LoggerError::UnresolvedFormat { target })
}

fn with_format<W>(format: Format, writer: W) -> Sink
where
    W: Write + Send + 'static,
{
    match format {
        Format::Logfmt => Box::new(ConsoleWriter::new(writer, true)),
        Format::LogfmtNoColor => Box::new(ConsoleWriter::new(writer, false)),
        Format::Json => Box::new(writer),
    }
}

/// Builds one sink per configured output, in order, and the log file handle if a file output is
/// configured.
///
/// The log file is opened once, however many times [`Output::File`] is listed.
pub(crate) fn build_writers(
    config: &Config,
) -> Result<(FanOutWriter, Option<SharedFile>), LoggerError> {
    let mut sinks = Vec::with_capacity(config.output.len());
    let mut log_file: Option<SharedFile> = None;

    for &target in &config.output {
        let format = resolve_format(config, target)?;
        let sink = match target {
            Output::Stdout => with_format(format, io::stdout()),
            Output::Stderr => with_format(format, io::stderr()),
            Output::File => {
                let file = match log_file.clone() {
                    Some(file) => file,
                    None => {
                        let opened = SharedFile::open(config)?;
                        log_file = Some(opened.clone());
                        opened
                    }
                };
                with_format(format, file)
            }
        };
        sinks.push(sink);
    }

    Ok((FanOutWriter::new(sinks), log_file))
}
