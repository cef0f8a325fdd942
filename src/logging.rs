//! Tracing subscriber setup for benchmark binaries and demos

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

static INITIALISED: OnceLock<bool> = OnceLock::new();

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Safe to call repeatedly. Returns `false` when another global subscriber was
/// already installed by someone else.
pub fn init_tracing() -> bool {
    *INITIALISED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr);
        Registry::default()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    })
}
