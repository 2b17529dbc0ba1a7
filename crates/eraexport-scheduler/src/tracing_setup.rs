//! Tracing / logging initialisation.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eraexport_core::config::ExporterConfig;

/// Build the filter directive string, e.g. `"info,eraexport_core=debug"`.
pub fn filter_directives(config: &ExporterConfig) -> String {
    let mut directives = config.effective_log_level().to_string();
    let mut components: Vec<_> = config.log.components.iter().collect();
    components.sort();
    for (component, level) in components {
        directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
    }
    directives
}

/// Initialise tracing from the exporter config.
/// Should be called once at application startup.
pub fn init_tracing(config: &ExporterConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_new(filter_directives(config))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    }
}
