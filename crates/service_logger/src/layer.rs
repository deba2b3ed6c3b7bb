//! A [`tracing_subscriber::Layer`] ([`LoggerLayer`]) forwarding `tracing` events to a [`Logger`].

use std::{fmt, sync::Arc};

use serde_json::Value;
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

use crate::{
    Fields, Logger,
    engine::{Caller, Severity},
    keys,
};

/// Forwards every `tracing` event to a [`Logger`].
///
/// The record gets the event's target as the `target` field, its fields in declaration order and
/// its `message` as the message. Trace IDs are taken from the current OpenTelemetry context.
///
/// Events emitted by this crate itself are ignored, so that a logger reporting its own write
/// failures through `tracing` cannot recurse into itself.
#[derive(Clone, Debug)]
pub struct LoggerLayer {
    logger: Arc<Logger>,
}

impl LoggerLayer {
    /// Creates a layer writing to `logger`.
    pub fn new(logger: impl Into<Arc<Logger>>) -> Self {
        Self {
            logger: logger.into(),
        }
    }
}

/// Fields and message of a single event.
#[derive(Debug, Default)]
struct EventFields {
    fields: Fields,
    message: Option<String>,
}

impl EventFields {
    fn record_value(&mut self, field: &Field, value: Value) {
        match field.name() {
            // Skip fields which are already handled
            name if name.starts_with("log.") => (),
            name => {
                let name = name.strip_prefix("r#").unwrap_or(name);
                self.fields.push(name, value);
            }
        }
    }

    fn record_message(&mut self, message: impl FnOnce() -> String) {
        if self.message.is_none() {
            self.message = Some(message());
        }
    }
}

impl Visit for EventFields {
    fn record_f64(&mut self, field: &Field, value: f64) {
        if field.name() == keys::MESSAGE {
            self.record_message(|| value.to_string());
        } else {
            self.record_value(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == keys::MESSAGE {
            self.record_message(|| value.to_string());
        } else {
            self.record_value(field, Value::from(value));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == keys::MESSAGE {
            self.record_message(|| value.to_string());
        } else {
            self.record_value(field, Value::from(value));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == keys::MESSAGE {
            self.record_message(|| value.to_string());
        } else {
            self.record_value(field, Value::from(value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == keys::MESSAGE {
            // `record_str()` is preferred for `message`
            self.message = Some(value.to_owned());
        } else {
            self.record_value(field, Value::from(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == keys::MESSAGE {
            self.record_message(|| format!("{value:?}"));
        } else {
            self.record_value(field, Value::from(format!("{value:?}")));
        }
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let mut visitor = EventFields::default();
        visitor.fields.push(keys::TARGET, metadata.target());
        event.record(&mut visitor);

        let caller = metadata
            .file()
            .zip(metadata.line())
            .map(|(file, line)| Caller::new(file, line));

        self.logger.log_with_caller(
            Severity::from(*metadata.level()),
            caller,
            &opentelemetry::Context::current(),
            visitor.message.as_deref().unwrap_or_default(),
            visitor.fields,
        );
    }
}
