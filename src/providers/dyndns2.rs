//! dyndns2 protocol client (`/nic/update`), as spoken by Strato and friends.

use super::DynDnsClient;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

/// Default update endpoint.
pub const DEFAULT_BASE_URL: &str = "https://dyndns.strato.com";

/// Body markers that mean the record now holds the requested address.
const SUCCESS_MARKERS: [&str; 2] = ["good", "nochg"];

/// dyndns2 update client.
pub struct Dyndns2Client {
    client: reqwest::Client,
    base_url: String,
}

impl Dyndns2Client {
    /// Create a client for the default endpoint.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), timeout)
    }

    /// Create a client for a custom endpoint.
    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Build `{base}/nic/update?hostname={domain}&myip={ip}` with
    /// `{domain}:{secret}` as userinfo.
    pub fn update_url(&self, domain: &str, ip: &str, secret: &str) -> Result<Url> {
        let invalid = |reason: &str| {
            DdnsError::Config(format!(
                "cannot build update URL for {} on {}: {}",
                domain, self.base_url, reason
            ))
        };

        let mut url = Url::parse(&format!(
            "{}/nic/update",
            self.base_url.trim_end_matches('/')
        ))
        .map_err(|e| invalid(&e.to_string()))?;

        url.set_username(domain)
            .map_err(|_| invalid("URL cannot carry credentials"))?;
        url.set_password(Some(secret))
            .map_err(|_| invalid("URL cannot carry credentials"))?;
        url.query_pairs_mut()
            .append_pair("hostname", domain)
            .append_pair("myip", ip);

        Ok(url)
    }
}

/// Whether a dyndns2 response body reports success.
pub(crate) fn is_success(body: &str) -> bool {
    SUCCESS_MARKERS.iter().any(|marker| body.contains(marker))
}

#[async_trait]
impl DynDnsClient for Dyndns2Client {
    async fn push_update(&self, domain: &str, ip: &str, secret: &str) -> Result<()> {
        let url = self.update_url(domain, ip, secret)?;

        // reqwest moves the userinfo into an Authorization header.
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(domain, status = status.as_u16(), body = %text.trim(), "dyndns response");

        if is_success(&text) {
            Ok(())
        } else {
            Err(DdnsError::ProviderRejected(text))
        }
    }
}
