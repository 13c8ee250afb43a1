//! # vitt-telemetry
//!
//! Logging setup shared by the VittSaar binaries and tests.
//!
//! - [`init_telemetry`] installs a human-readable `fmt` subscriber.
//! - [`init_json_telemetry`] installs a JSON-lines subscriber for log
//!   shippers.
//! - [`capture`] records events in memory so tests can assert on them.
//!
//! Both initialisers honour `RUST_LOG`; without it they default to `info`
//! for the VittSaar crates and `warn` elsewhere. Calling either a second
//! time is a no-op that returns an error.

pub mod capture;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

pub use capture::{CaptureLayer, CapturedEvent, CapturedEvents};

fn default_filter(service_name: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let service = service_name.replace('-', "_");
        EnvFilter::new(format!("warn,{service}=info,vitt_rag=info,vitt_report=info"))
    })
}

/// Install a human-readable subscriber writing to stderr.
///
/// stdout is left to program output (e.g. JSON reports from the CLI).
pub fn init_telemetry(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(default_filter(service_name))
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()?;
    tracing::debug!(service = service_name, "telemetry initialised");
    Ok(())
}

/// Install a subscriber that writes one JSON object per event to stderr.
pub fn init_json_telemetry(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(default_filter(service_name))
        .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
        .try_init()?;
    tracing::debug!(service = service_name, "json telemetry initialised");
    Ok(())
}
