//! Builds a logger from `LOGGER_*` environment variables and exercises it.
//!
//! ```text
//! LOGGER_OUTPUT=stdout,file LOGGER_FILE_FORMAT=json LOGGER_OUTPUT_FILE_PATH=./logs/demo.log \
//!     cargo run -p env_overlay
//! ```

use std::sync::Arc;

use opentelemetry::{
    Context,
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
};
use serde_json::json;
use service_logger::{
    Config, Fields, Logger, LoggerError, LoggerLayer, default_logger, set_default,
};
use tracing_subscriber::layer::SubscriberExt;

fn request_context() -> Context {
    let span_context = SpanContext::new(
        TraceId::from_bytes(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736_u128.to_be_bytes()),
        SpanId::from_bytes(0x00f0_67aa_0ba9_02b7_u64.to_be_bytes()),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    Context::new().with_remote_span_context(span_context)
}

fn main() -> Result<(), LoggerError> {
    // `LOGGER_SERVICE_NAME` takes precedence over this fallback.
    let mut config = Config::from_env();
    config.service_name = "env-overlay-demo".to_owned();
    let logger = Arc::new(Logger::new(config)?);
    set_default(Arc::clone(&logger));

    let subscriber = tracing_subscriber::registry().with(LoggerLayer::new(default_logger()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let cx = request_context();
    let checkout = default_logger().sub("checkout");
    checkout.info(
        &cx,
        "cart priced",
        [("items", json!(3)), ("total_cents", json!(4_250))],
    );
    checkout.sub("payments").warn(
        &cx,
        "card declined, retrying",
        Fields::new()
            .with("attempt", 1)
            .with("reason", "insufficient funds"),
    );
    checkout.debug(&Context::new(), "no active span here", ());

    tracing::info!(target: "inventory", sku = "sku_123", reserved = 2, "stock reserved");

    logger.close()
}
