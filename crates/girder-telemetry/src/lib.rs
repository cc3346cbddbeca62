pub mod capture;

pub use capture::{capture_subscriber, CaptureLayer, CapturedLog, LogBuffer};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by the RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "girder_client::pool" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines instead of human-readable output.
    pub json_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json_output: false,
        }
    }
}

/// Build the env-filter directive string from a config. RUST_LOG, when set,
/// wins over this.
fn filter_directives(config: &TelemetryConfig) -> String {
    let mut directives = config.log_level.to_string().to_lowercase();
    for (module, level) in &config.module_levels {
        directives.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    directives
}

/// Initialize the tracing subscriber. Call once at startup; embedding
/// applications that install their own subscriber should skip this.
pub fn init_telemetry(config: TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config)));

    if config.json_output {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}
