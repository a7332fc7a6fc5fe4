use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding a `tracing` filter directive, e.g. `moin=debug`.
pub const LOG_ENV: &str = "MOIN_LOG";

/// Filter used when `MOIN_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Install the stderr subscriber. `MOIN_LOG` wins over `verbose`. Safe to call
/// more than once; only the first call has an effect.
pub fn init(verbose: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .try_init();
    });
}
