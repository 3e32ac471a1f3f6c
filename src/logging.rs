// ABOUTME: Tracing subscriber setup for the CLI
// ABOUTME: RUST_LOG wins; otherwise info, or debug with --debug; logs go to stderr

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "notion_mirror=debug,info"
    } else {
        "info"
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(debug)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_thread_ids(debug)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
        info!("logging initialised");
        warn!("still fine");
    }
}
