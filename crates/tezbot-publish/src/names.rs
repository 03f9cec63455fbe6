//! Vanity-name resolution.
//!
//! Human-readable names for bakers and proposals are published as DNS TXT
//! records under two zones: `<pkh>.tz.tezz.ie` for accounts and
//! `<hash>.proposal.tezz.ie` for proposals and protocols.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Zone holding account names.
pub const ADDRESS_ZONE: &str = "tz.tezz.ie";
/// Zone holding proposal and protocol names.
pub const PROPOSAL_ZONE: &str = "proposal.tezz.ie";

/// Looks up the vanity name of `key` in `zone`.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// `None` when no name is registered or the lookup failed.
    async fn lookup(&self, key: &str, zone: &str) -> Option<String>;
}

/// Never finds a name.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

#[async_trait]
impl NameResolver for NoopResolver {
    async fn lookup(&self, _key: &str, _zone: &str) -> Option<String> {
        None
    }
}

/// A fixed table of names, for tests. Built with the `testing` feature.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    names: std::collections::HashMap<String, String>,
}

#[cfg(any(test, feature = "testing"))]
impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, zone: &str, name: &str) -> Self {
        self.names.insert(fqdn(key, zone), name.to_string());
        self
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl NameResolver for StaticResolver {
    async fn lookup(&self, key: &str, zone: &str) -> Option<String> {
        self.names.get(&fqdn(key, zone)).cloned()
    }
}

fn fqdn(key: &str, zone: &str) -> String {
    format!("{key}.{zone}")
}

// ─── DNS over HTTPS ───────────────────────────────────────────────────────────

/// Default DNS-over-HTTPS JSON endpoint.
pub const DEFAULT_DOH_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

const TXT: u16 = 16;

/// Resolves TXT records through a DNS-over-HTTPS JSON endpoint.
pub struct DnsTxtResolver {
    http: reqwest::Client,
    endpoint: String,
}

impl DnsTxtResolver {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    async fn query(&self, name: &str) -> Result<DohResponse, reqwest::Error> {
        self.http
            .get(&self.endpoint)
            .query(&[("name", name), ("type", "TXT")])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl NameResolver for DnsTxtResolver {
    async fn lookup(&self, key: &str, zone: &str) -> Option<String> {
        let name = fqdn(key, zone);
        match self.query(&name).await {
            Ok(resp) => {
                let found = resp.first_txt();
                if found.is_none() {
                    tracing::debug!(name = %name, status = resp.status, "no TXT record");
                }
                found
            }
            Err(e) => {
                tracing::debug!(name = %name, error = %e, "TXT lookup failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    kind: u16,
    data: String,
}

impl DohResponse {
    /// Text of the first TXT answer, with its character-strings joined.
    fn first_txt(&self) -> Option<String> {
        if self.status != 0 {
            return None;
        }
        self.answer
            .iter()
            .find(|a| a.kind == TXT)
            .map(|a| unquote_txt(&a.data))
            .filter(|s| !s.is_empty())
    }
}

/// `"\"Foo\" \"Bar\""` → `FooBar`.
fn unquote_txt(data: &str) -> String {
    let trimmed = data.trim();
    if !trimmed.starts_with('"') {
        return trimmed.to_string();
    }
    trimmed
        .split('"')
        .skip(1)
        .step_by(2)
        .collect::<Vec<_>>()
        .concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_answer_is_unquoted() {
        let raw = r#"{
            "Status": 0,
            "Answer": [
                {"name": "tz1abc.tz.tezz.ie.", "type": 5, "TTL": 300, "data": "alias."},
                {"name": "tz1abc.tz.tezz.ie.", "type": 16, "TTL": 300, "data": "\"Tezos Baker\""}
            ]
        }"#;
        let resp: DohResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.first_txt().as_deref(), Some("Tezos Baker"));
    }

    #[test]
    fn nxdomain_has_no_name() {
        let resp: DohResponse = serde_json::from_str(r#"{"Status": 3}"#).unwrap();
        assert!(resp.first_txt().is_none());
    }

    #[test]
    fn split_character_strings_are_joined() {
        assert_eq!(unquote_txt(r#""Baby" "lon""#), "Babylon");
        assert_eq!(unquote_txt("plain"), "plain");
    }

    #[tokio::test]
    async fn static_resolver_is_zone_aware() {
        let names = StaticResolver::new().with("PsBaby", PROPOSAL_ZONE, "Babylon");
        assert_eq!(names.lookup("PsBaby", PROPOSAL_ZONE).await.as_deref(), Some("Babylon"));
        assert!(names.lookup("PsBaby", ADDRESS_ZONE).await.is_none());
        assert!(NoopResolver.lookup("PsBaby", PROPOSAL_ZONE).await.is_none());
    }
}
