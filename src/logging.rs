//! Tracing setup for the `beacon` binary.

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Default filter for a `-v` count. `RUST_LOG` takes precedence.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "beacon=warn",
        1 => "beacon=info",
        2 => "beacon=debug",
        _ => "beacon=trace",
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbosity: u8) {
    INITIALIZED.get_or_init(|| {
        let result = tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_filter(verbosity).into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();

        if let Err(e) = result {
            eprintln!("[Beacon] Failed to initialize logging: {e}");
        }
    });
}
