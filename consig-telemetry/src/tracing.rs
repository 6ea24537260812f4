use std::sync::Once;

use consig_config::Environment;
use thiserror::Error;
use tracing::{Span, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

static INIT_TEST_TRACING: Once = Once::new();

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Installs the global subscriber for a binary.
///
/// Logs are human readable in `dev` and JSON lines in `prod`, where they are shipped from the
/// cron host. JSON lines list the enclosing spans, so events emitted inside [`app_span`] carry
/// the `app` name.
pub fn init_tracing(app_name: &'static str, environment: Environment) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{DEFAULT_LOG_FILTER},{app_name}=info")));

    let registry = tracing_subscriber::registry().with(filter);

    match environment {
        Environment::Dev => registry.with(fmt::layer().with_target(false)).try_init()?,
        Environment::Prod => registry.with(json_layer(std::io::stdout)).try_init()?,
    }

    tracing::info!(app = app_name, %environment, "tracing initialized");

    Ok(())
}

/// Root span of a process. Enter it, or instrument the top-level future with it, so that every
/// event of the run is tagged with `app`.
pub fn app_span(app_name: &'static str) -> Span {
    tracing::info_span!("app", app = app_name)
}

fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(writer)
}

/// Installs a test writer subscriber once per test binary.
///
/// Honors `RUST_LOG`; logs stay silent otherwise so passing tests produce no noise.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
