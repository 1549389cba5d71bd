//! Public IP detection.

use crate::config::IpQueryConfig;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

/// Anonymous endpoint used when no IP query URL is configured.
pub const DEFAULT_IP_SERVICE: &str = "https://api.ipify.org";

/// A public IP address and the endpoint that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIp {
    /// Textual address, IPv4-mapped IPv6 already rewritten to dotted decimal.
    pub ip: String,
    /// Endpoint the address came from, if known.
    pub source: Option<String>,
}

/// Something that can tell us our current public IP.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the current public IP with a single attempt.
    async fn resolve_ip(&self) -> Result<ResolvedIp>;
}

/// Create a resolver from configuration.
pub fn create_resolver(config: &IpQueryConfig) -> Result<Box<dyn IpResolver>> {
    match config {
        IpQueryConfig::Http {
            url,
            username,
            password,
            ..
        } => Ok(Box::new(HttpIpResolver::new(
            url.clone(),
            username.clone(),
            password.clone(),
            config.timeout(),
        )?)),
        IpQueryConfig::Public { url, .. } => Ok(Box::new(PublicIpResolver::with_url(
            url.clone(),
            config.timeout(),
        )?)),
    }
}

/// Parse an IP query response body.
///
/// The body is trimmed and must be a bare IPv4 or IPv6 literal. IPv4-mapped
/// IPv6 addresses (`::ffff:a.b.c.d`) come back in dotted decimal form; every
/// other address is returned as received.
pub fn parse_ip_body(body: &str) -> Result<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(DdnsError::InvalidAddress("empty response".to_string()));
    }

    let ip: IpAddr = trimmed
        .parse()
        .map_err(|_| DdnsError::InvalidAddress(format!("Invalid IP response: {}", trimmed)))?;

    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => Ok(v4.to_string()),
            None => Ok(trimmed.to_string()),
        },
        IpAddr::V4(_) => Ok(trimmed.to_string()),
    }
}

async fn read_ip(response: reqwest::Response) -> Result<String> {
    if response.status() != StatusCode::OK {
        return Err(DdnsError::HttpStatus(response.status().as_u16()));
    }

    let text = response.text().await?;
    parse_ip_body(&text)
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Resolver backed by one configurable endpoint, optionally behind basic auth.
pub struct HttpIpResolver {
    client: reqwest::Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpIpResolver {
    /// Create a new resolver for `url`.
    pub fn new(
        url: String,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url,
            username,
            password,
        })
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve_ip(&self) -> Result<ResolvedIp> {
        let mut request = self
            .client
            .get(&self.url)
            .header(CONTENT_TYPE, "application/text");

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let ip = read_ip(request.send().await?).await?;
        tracing::debug!(ip = %ip, source = %self.url, "resolved public ip");

        Ok(ResolvedIp {
            ip,
            source: Some(self.url.clone()),
        })
    }
}

/// Resolver over one anonymous public service.
pub struct PublicIpResolver {
    client: reqwest::Client,
    url: String,
}

impl PublicIpResolver {
    /// Create a resolver for the default service.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_url(DEFAULT_IP_SERVICE.to_string(), timeout)
    }

    /// Create a resolver for a custom service.
    pub fn with_url(url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url,
        })
    }
}

#[async_trait]
impl IpResolver for PublicIpResolver {
    async fn resolve_ip(&self) -> Result<ResolvedIp> {
        let response = self.client.get(&self.url).send().await?;
        let ip = read_ip(response).await?;
        tracing::debug!(ip = %ip, source = %self.url, "resolved public ip");

        Ok(ResolvedIp {
            ip,
            source: Some(self.url.clone()),
        })
    }
}
