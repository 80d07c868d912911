use tracing_subscriber::EnvFilter;

/// Level used when nothing else picks one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Filter directive to use, by priority: `RUST_LOG` > `--debug` > config
/// level > [`DEFAULT_LOG_LEVEL`]. `None` means "read `RUST_LOG`".
pub fn filter_directive(
    rust_log_set: bool,
    debug_flag: bool,
    config_level: Option<&str>,
) -> Option<String> {
    if rust_log_set {
        None
    } else if debug_flag {
        Some("debug".to_string())
    } else {
        Some(config_level.unwrap_or(DEFAULT_LOG_LEVEL).to_string())
    }
}

/// Install the global `tracing` subscriber, writing to stderr.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(debug_flag: bool, config_level: Option<&str>) {
    let rust_log_set = std::env::var("RUST_LOG").is_ok();
    let filter = match filter_directive(rust_log_set, debug_flag, config_level) {
        None => EnvFilter::from_default_env(),
        Some(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|e| {
            eprintln!("Invalid log level '{}': {}; using {}", directive, e, DEFAULT_LOG_LEVEL);
            EnvFilter::new(DEFAULT_LOG_LEVEL)
        }),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .compact()
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            app = env!("CARGO_PKG_NAME"),
            version = env!("CARGO_PKG_VERSION"),
            "Logging initialised"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        assert_eq!(filter_directive(true, true, Some("warn")), None);
    }

    #[test]
    fn test_debug_flag_beats_config() {
        assert_eq!(
            filter_directive(false, true, Some("warn")).as_deref(),
            Some("debug")
        );
    }

    #[test]
    fn test_config_level_then_default() {
        assert_eq!(
            filter_directive(false, false, Some("warn")).as_deref(),
            Some("warn")
        );
        assert_eq!(
            filter_directive(false, false, None).as_deref(),
            Some(DEFAULT_LOG_LEVEL)
        );
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false, Some("error"));
        init(true, None);
    }
}
