//! Tracing / logging initialisation.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The `log:` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for every target without its own entry.
    #[serde(default = "default_level")]
    pub level: String,
    /// Crate name to level, e.g. `tezbot-rpc: debug`. Dashes are accepted.
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// One JSON object per line instead of the text formatter.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Directive string: `"info,tezbot_rpc=debug"` etc.
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self
            .components
            .iter()
            .map(|(component, level)| (component.replace('-', "_"), level))
            .collect();
        components.sort();
        components
            .into_iter()
            .fold(self.level.clone(), |mut directives, (target, level)| {
                directives.push_str(&format!(",{target}={level}"));
                directives
            })
    }
}

/// Initialise tracing. `RUST_LOG`, when set, replaces the configured levels.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    installed.map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}
