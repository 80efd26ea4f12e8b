//! Structured logging setup.
//!
//! The engine only emits `tracing` events and spans. Installing a
//! subscriber is left to the embedding application; these helpers cover
//! the common case.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install a global subscriber filtered by `RUST_LOG`, or `default_filter`
/// when `RUST_LOG` is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(?format, "tracing initialized");
    }
    installed.is_ok()
}

/// Span wrapping one event submission.
pub fn transition_span(session_key: &str, event: &str) -> tracing::Span {
    tracing::info_span!("transition", session.key = session_key, event = event)
}
