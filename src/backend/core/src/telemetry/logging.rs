//! Log output for the agent.
//!
//! JSON lines by default; `pretty` and `compact` for a terminal.

use serde::Deserialize;
use std::collections::HashMap;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

/// `[observability.logging]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default level or filter directive, falls back to `RUST_LOG` then `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json`, `pretty` or `compact`
    #[serde(default)]
    pub format: LogFormat,

    /// Level overrides keyed by module path, e.g. `todolist_core::watch`
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Emit source file and line
    #[serde(default = "default_include_location")]
    pub include_location: bool,

    /// Emit the event target
    #[serde(default = "default_include_target")]
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: default_include_location(),
            include_target: default_include_target(),
        }
    }
}

/// Output encoding.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_include_location() -> bool {
    false
}

fn default_include_target() -> bool {
    true
}

/// Global level plus one directive per `module_levels` entry.
pub fn build_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    config
        .module_levels
        .iter()
        .try_fold(EnvFilter::try_new(&config.level)?, |filter, (module, level)| {
            Ok(filter.add_directive(format!("{}={}", module, level).parse()?))
        })
}

fn format_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_target);

    match config.format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// Install the global subscriber.
///
/// Fails if a directive does not parse or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(config)?;

    tracing_subscriber::registry()
        .with(format_layer(config))
        .with(filter)
        .try_init()?;

    Ok(())
}
