use std::env::var;

use tracing::{Subscriber, level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, Registry,
    filter::EnvFilter,
    layer::{Identity, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

pub fn init_tracing() {
    init_tracing_with(Identity::new());
}

/// Initialize tracing with the default output plus one extra layer, e.g. a
/// layer that persists log events.
pub fn init_tracing_with<L>(extra: L)
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    tracing_subscriber::registry().with(extra).with(output_layer(LevelFilter::INFO)).init();
}

/// Build the stdout layer. `RUST_LOG` overrides the default level and
/// `RUST_LOG_FORMAT=json` switches to structured output.
fn output_layer<S>(level: LevelFilter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT")
        .inspect_err(|error| {
            warn!("Failed to read RUST_LOG_FORMAT, falling back to default: {error}")
        })
        .unwrap_or_default();

    match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    }
}
