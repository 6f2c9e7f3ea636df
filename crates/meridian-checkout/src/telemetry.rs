//! Tracing setup for binaries. Libraries only emit events.

use tracing::Subscriber;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,meridian=debug";

/// The fmt subscriber, gated only by `filter`.
fn subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish()
}

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`]. Calling this twice is harmless;
/// the second install is ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = subscriber(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_filter_controls_verbosity() {
        let quiet = subscriber(EnvFilter::new("error"));
        tracing::subscriber::with_default(quiet, || {
            assert!(tracing::enabled!(Level::ERROR));
            assert!(!tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::TRACE));
        });
    }

    #[test]
    fn test_default_filter_hides_trace() {
        let default = subscriber(EnvFilter::new(DEFAULT_FILTER));
        tracing::subscriber::with_default(default, || {
            assert!(tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::TRACE));
        });
    }
}
