//! Polling loop and per-domain change detection.

use crate::config::{Config, HistoryConfig};
use crate::detector::{create_resolver, IpResolver};
use crate::error::Result;
use crate::providers::{create_client, DynDnsClient};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Outcome of a single push, kept in the update history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Domain that was pushed.
    pub domain: String,
    /// Address sent to the provider.
    pub ip: String,
    /// Whether the provider accepted it.
    pub success: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Timestamp of the update.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickReport {
    /// No address could be resolved; nothing was touched.
    ResolveFailed { error: String },
    /// The address matches the previous tick.
    Unchanged { ip: String },
    /// A new address was seen and domains were processed.
    Changed {
        ip: String,
        pushed: Vec<String>,
        skipped: Vec<String>,
        failed: Vec<String>,
    },
}

/// Keeps a set of domains pointed at the current public IP.
pub struct Updater {
    resolver: Box<dyn IpResolver>,
    client: Box<dyn DynDnsClient>,
    domains: Vec<String>,
    secret: String,
    /// Last address successfully applied per domain.
    status: HashMap<String, String>,
    last_known_ip: Option<String>,
    history: VecDeque<UpdateRecord>,
    history_limit: Option<usize>,
}

impl Updater {
    /// Create an updater over the given resolver and client.
    pub fn new(
        resolver: Box<dyn IpResolver>,
        client: Box<dyn DynDnsClient>,
        domains: Vec<String>,
        secret: String,
    ) -> Self {
        Self {
            resolver,
            client,
            domains,
            secret,
            status: HashMap::new(),
            last_known_ip: None,
            history: VecDeque::new(),
            history_limit: Some(HistoryConfig::default().max_entries),
        }
    }

    /// Build the resolver and client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = create_resolver(&config.ip_query)?;
        let client = create_client(&config.provider)?;

        Ok(Self::new(
            resolver,
            client,
            config.domains.clone(),
            config.password.clone(),
        )
        .with_history(&config.history))
    }

    /// Apply history settings.
    pub fn with_history(mut self, config: &HistoryConfig) -> Self {
        self.history_limit = config.enabled.then_some(config.max_entries);
        self.history.clear();
        self
    }

    /// Last address applied per domain.
    pub fn status(&self) -> &HashMap<String, String> {
        &self.status
    }

    /// Address seen by the most recent successful resolution.
    pub fn last_known_ip(&self) -> Option<&str> {
        self.last_known_ip.as_deref()
    }

    /// Recent pushes, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &UpdateRecord> {
        self.history.iter()
    }

    /// Run one polling cycle.
    ///
    /// When the resolved address equals the one from the previous tick no
    /// domain is looked at, even if an earlier push for it failed. Such a
    /// domain is retried only after the public address changes again.
    pub async fn tick(&mut self) -> TickReport {
        let ip = match self.resolver.resolve_ip().await {
            Ok(resolved) => resolved.ip,
            Err(e) => {
                tracing::error!(error = %e, "retrieving own ip address failed");
                return TickReport::ResolveFailed {
                    error: e.to_string(),
                };
            }
        };

        if self.last_known_ip.as_deref() == Some(ip.as_str()) {
            tracing::info!(ip = %ip, "no changes in ip address");
            return TickReport::Unchanged { ip };
        }

        tracing::info!(ip = %ip, "retrieved new ip address");

        let mut pushed = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();

        for domain in &self.domains {
            let domain = domain.trim();

            if self.status.get(domain).map(String::as_str) == Some(ip.as_str()) {
                tracing::info!(domain, "updating dyndns records skipped");
                skipped.push(domain.to_string());
                continue;
            }

            tracing::info!(domain, "updating dyndns records");

            let result = self.client.push_update(domain, &ip, &self.secret).await;
            let error = match result {
                Ok(()) => {
                    tracing::info!(domain, ip = %ip, "dyndns records updated");
                    self.status.insert(domain.to_string(), ip.clone());
                    pushed.push(domain.to_string());
                    None
                }
                Err(e) => {
                    tracing::error!(domain, error = %e, "updating dyndns records failed");
                    failed.push(domain.to_string());
                    Some(e.to_string())
                }
            };

            record(
                &mut self.history,
                self.history_limit,
                UpdateRecord {
                    domain: domain.to_string(),
                    ip: ip.clone(),
                    success: error.is_none(),
                    error,
                    timestamp: chrono::Utc::now(),
                },
            );
        }

        self.last_known_ip = Some(ip.clone());

        TickReport::Changed {
            ip,
            pushed,
            skipped,
            failed,
        }
    }

    /// Tick immediately and then every `interval` until `shutdown` resolves.
    ///
    /// Ticks never overlap: the next one starts only after the previous one
    /// finished, and late ticks are dropped rather than replayed. Shutdown
    /// also interrupts a tick in flight; domains already pushed stay recorded.
    pub async fn run<F>(&mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::warn!("tick interrupted by shutdown");
                    break;
                }
                _ = self.tick() => {}
            }
        }
    }
}

fn record(history: &mut VecDeque<UpdateRecord>, limit: Option<usize>, entry: UpdateRecord) {
    let Some(limit) = limit else {
        return;
    };

    history.push_back(entry);
    while history.len() > limit {
        history.pop_front();
    }
}
