//! Tracing subscriber setup for the `dockhand` binary and embedders.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `json`, each line is a
/// JSON object. Only the first call in a process has any effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).compact())
            .try_init()
            .ok();
    }
}

/// Parse a level name (`trace`..`error`, case-insensitive).
pub fn parse_level(name: &str) -> Option<Level> {
    name.trim().parse::<Level>().ok()
}
