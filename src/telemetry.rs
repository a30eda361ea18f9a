//! Telemetry initialization.
//!
//! Controlled by two environment variables:
//! - `RECAP_LOG` → an `EnvFilter` directive (default `warn`)
//! - `RECAP_LOG_FORMAT` → `json` for JSON events with span-close records,
//!   anything else for human-readable lines
//!
//! Everything is written to stderr so command output on stdout stays clean.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter directive variable.
pub const LOG_ENV: &str = "RECAP_LOG";

/// Output format variable.
pub const FORMAT_ENV: &str = "RECAP_LOG_FORMAT";

const DEFAULT_DIRECTIVE: &str = "warn";

/// How log events are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single lines.
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Interpret the value of `RECAP_LOG_FORMAT`.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Install the global subscriber. Call once, early in `main()`.
///
/// A second call (or a subscriber installed elsewhere) is ignored.
pub fn init() {
    let format = LogFormat::from_env_value(std::env::var(FORMAT_ENV).ok().as_deref());
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("warning: telemetry already initialized: {e}");
    }
}
