// 14.0 logging.rs: tracing subscriber setup for the simulation binary.
// the library itself only emits through `tracing` macros.

use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `log_level` is a bare level ("debug") or a full filter ("info,perps_custody=trace").
/// RUST_LOG wins when set. returns false if a global subscriber was already installed.
pub fn setup_logging(log_level: &str, json_format: bool) -> bool {
    let filter_spec = std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.trim().to_string());
    let filter = EnvFilter::from_str(&filter_spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = if json_format {
        let json_layer = fmt::layer().json().with_target(false).with_current_span(false);
        subscriber.with(json_layer).try_init().is_ok()
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        subscriber.with(fmt_layer).try_init().is_ok()
    };

    if installed {
        tracing::info!(
            filter = %filter_spec,
            format = if json_format { "json" } else { "compact" },
            "logging initialized"
        );
    }
    installed
}
