//! YAML configuration file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tezbot_core::ListenerConfig;

use crate::logging::LogConfig;

/// Default node RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://mainnet-tezos.giganode.io";

/// Everything read from `config.yaml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc_url: String,

    #[serde(flatten)]
    pub listener: ListenerConfig,

    /// Empty selects the stdout publisher.
    pub twitter_access_token: String,
    pub twitter_access_token_secret: String,
    #[serde(rename = "twitter_consummer_id", alias = "twitter_consumer_id")]
    pub twitter_consumer_id: String,
    #[serde(rename = "twitter_consummer_key", alias = "twitter_consumer_key")]
    pub twitter_consumer_key: String,

    /// Resolve vanity names through DNS TXT records.
    pub name_lookup: bool,
    /// DNS-over-HTTPS endpoint used for name lookups.
    pub doh_endpoint: String,

    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            listener: ListenerConfig::default(),
            twitter_access_token: String::new(),
            twitter_access_token_secret: String::new(),
            twitter_consumer_id: String::new(),
            twitter_consumer_key: String::new(),
            name_lookup: true,
            doh_endpoint: tezbot_publish::names::DEFAULT_DOH_ENDPOINT.into(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Read `path`. `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&raw)
            .with_context(|| format!("parsing {}", path.display()))
            .map(Some)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Consumer credentials without an access token cannot post.
    pub fn has_partial_twitter_credentials(&self) -> bool {
        self.twitter_access_token.is_empty()
            && !(self.twitter_access_token_secret.is_empty()
                && self.twitter_consumer_id.is_empty()
                && self.twitter_consumer_key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn keys_of_the_bot_config() {
        let raw = r#"
rpc_url: https://rpc.tzbeta.net
chain: main
retry_count: 5
history: true
history_starting_block: 655360
monitor_vote: true
monitor_protocol: false
twitter_access_token: abc
twitter_consummer_key: key
log:
  level: debug
  json: true
"#;
        let cfg = Config::parse(raw).unwrap();
        assert_eq!(cfg.rpc_url, "https://rpc.tzbeta.net");
        assert_eq!(cfg.listener.retry_count, 5);
        assert!(cfg.listener.history);
        assert_eq!(cfg.listener.history_starting_block, 655_360);
        assert!(!cfg.listener.monitor_protocol);
        assert!(cfg.listener.monitor_proposal);
        assert_eq!(cfg.twitter_access_token, "abc");
        assert_eq!(cfg.twitter_consumer_key, "key");
        assert_eq!(cfg.log.level, "debug");
        assert!(cfg.log.json);
        assert!(cfg.name_lookup);
    }

    #[test]
    fn partial_twitter_credentials() {
        let mut cfg = Config::default();
        assert!(!cfg.has_partial_twitter_credentials());
        cfg.twitter_consumer_key = "key".into();
        assert!(cfg.has_partial_twitter_credentials());
        cfg.twitter_access_token = "token".into();
        assert!(!cfg.has_partial_twitter_credentials());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let loaded = Config::load(Path::new("/nonexistent/tezbot/config.yaml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(Config::parse("retry_count: [1, 2").is_err());
    }
}
