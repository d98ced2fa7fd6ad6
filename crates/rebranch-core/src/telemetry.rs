//! Tracing setup for the `rebranch` binary.
//!
//! Logs go to stderr; stdout carries prompts and results.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested verbosity. Everything else
/// (HTTP stack included) stays at `warn` unless `RUST_LOG` says otherwise.
const LOG_TARGETS: [&str; 3] = ["rebranch", "rebranch_core", "rebranch_remote"];

/// Install the global subscriber, as text or newline-delimited JSON.
///
/// `RUST_LOG` overrides `level` when set. Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let text = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let json = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .ok();
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(LOG_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_own_crates() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,rebranch=debug,rebranch_core=debug,rebranch_remote=debug"
        );
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(default_directives(Level::INFO)
            .parse::<EnvFilter>()
            .is_ok());
    }
}
