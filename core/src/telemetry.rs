//! # Telemetry
//!
//! Every actor setup and execution runs inside an `actor` span carrying the
//! actor's dotted path, so log lines emitted by actors are attributed to
//! their position in the tree.

use crate::settings::LoggingSettings;
use anyhow::anyhow;
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Installs the global subscriber described by `settings`.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&settings.filter)
        .map_err(|e| anyhow!("invalid log filter '{}': {e}", settings.filter))?;

    let registry = Registry::default().with(filter);
    if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}

pub(crate) fn actor_span(path: &str, actor_type: &str) -> Span {
    tracing::info_span!("actor", actor = %path, actor.type = %actor_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_reported() {
        let settings = LoggingSettings {
            filter: "info,[[[".to_string(),
            json: false,
        };
        assert!(init(&settings).is_err());
    }
}
