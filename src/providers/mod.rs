//! DynDNS update clients.

mod dyndns2;

pub use dyndns2::{Dyndns2Client, DEFAULT_BASE_URL};

use crate::config::ProviderConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Trait for DynDNS update endpoints.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DynDnsClient: Send + Sync {
    /// Point `domain` at `ip`, authenticating with `secret`.
    ///
    /// Performs no local state changes; callers decide what a success means
    /// for their own bookkeeping.
    async fn push_update(&self, domain: &str, ip: &str, secret: &str) -> Result<()>;
}

/// Create an update client from configuration.
pub fn create_client(config: &ProviderConfig) -> Result<Box<dyn DynDnsClient>> {
    Ok(Box::new(Dyndns2Client::with_base_url(
        config.base_url.clone(),
        config.timeout(),
    )?))
}
