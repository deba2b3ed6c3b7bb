use std::io::{self, Write};

use serde_json::{Map, Value};

use crate::keys;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "1";
const RED: &str = "31";
const BOLD_RED: &str = "1;31";
const GREEN: &str = "32";
const YELLOW: &str = "33";
const MAGENTA: &str = "35";
const CYAN: &str = "36";
const GRAY: &str = "90";

/// Renders JSON lines as human readable `key=value` lines, optionally with ANSI colors.
///
/// Each write must contain exactly one JSON object, as produced by the logger. The rendered line
/// has the shape `TIME LVL caller > message key=value ...`, with the remaining keys sorted by name.
#[derive(Debug)]
pub struct ConsoleWriter<W> {
    out: W,
    color: bool,
}

impl<W: Write> ConsoleWriter<W> {
    /// Creates a writer rendering into `out`.
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&self, event: &Map<String, Value>) -> String {
        let mut parts = Vec::with_capacity(event.len().saturating_add(1));

        if let Some(time) = event.get(keys::TIME) {
            parts.push(self.paint(GRAY, &bare(time)));
        }
        parts.push(self.level(event.get(keys::LEVEL)));
        if let Some(caller) = event.get(keys::CALLER) {
            parts.push(format!(
                "{} {}",
                self.paint(BOLD, &bare(caller)),
                self.paint(CYAN, ">")
            ));
        }
        if let Some(message) = event.get(keys::MESSAGE).map(bare) {
            if !message.is_empty() {
                parts.push(message);
            }
        }

        let mut fields: Vec<_> = event
            .iter()
            .filter(|(key, _)| {
                ![keys::LEVEL, keys::TIME, keys::CALLER, keys::MESSAGE].contains(&key.as_str())
            })
            .collect();
        fields.sort_by(|(left, _), (right, _)| left.cmp(right));

        for (key, value) in fields {
            let value = quoted(value);
            if key == keys::ERROR {
                parts.push(format!(
                    "{}{}",
                    self.paint(RED, &format!("{key}=")),
                    self.paint(BOLD_RED, &value)
                ));
            } else {
                parts.push(format!("{}{value}", self.paint(CYAN, &format!("{key}="))));
            }
        }

        let mut line = parts.join(" ");
        line.push('\n');
        line
    }

    fn level(&self, level: Option<&Value>) -> String {
        let (abbreviation, color) = match level.and_then(Value::as_str) {
            Some("trace") => ("TRC", MAGENTA),
            Some("debug") => ("DBG", YELLOW),
            Some("info") => ("INF", GREEN),
            Some("warn") => ("WRN", RED),
            Some("error") => ("ERR", BOLD_RED),
            Some("fatal") => ("FTL", BOLD_RED),
            Some("panic") => ("PNC", BOLD_RED),
            _ => ("???", BOLD),
        };
        self.paint(color, abbreviation)
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{color}m{text}{RESET}")
        } else {
            text.to_owned()
        }
    }
}

/// Strings without their JSON quotes, anything else as JSON text.
fn bare(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Like [`bare`], but strings that would be ambiguous unquoted keep their quotes.
fn quoted(value: &Value) -> String {
    match value {
        Value::String(text) if needs_quote(text) => value.to_string(),
        other => bare(other),
    }
}

fn needs_quote(text: &str) -> bool {
    text.is_empty()
        || text
            .chars()
            .any(|c| !(' '..='~').contains(&c) || matches!(c, ' ' | '\\' | '"'))
}

impl<W: Write> Write for ConsoleWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let event: Map<String, Value> = serde_json::from_slice(buf)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
        let line = self.render(&event);
        self.out.write_all(line.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
