//! Configuration management for dyndns-updater.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables, so the daemon can run from a file, from the
//! environment alone (containers), or a mix of both.

use crate::detector::DEFAULT_IP_SERVICE;
use crate::error::{DdnsError, Result};
use crate::providers::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Check interval in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_interval")]
    pub check_interval_secs: u64,

    /// Hostnames to keep pointed at the public IP, in update order.
    #[serde(default)]
    pub domains: Vec<String>,

    /// Shared DynDNS secret (or environment variable name if prefixed with $).
    #[serde(default)]
    pub password: String,

    /// DynDNS update endpoint.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// How the public IP is discovered.
    #[serde(default)]
    pub ip_query: IpQueryConfig,

    /// History settings.
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_interval() -> u64 {
    300
}

fn default_provider_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_update_timeout_ms() -> u64 {
    10_000
}

fn default_query_timeout_ms() -> u64 {
    500
}

fn default_ip_service() -> String {
    DEFAULT_IP_SERVICE.to_string()
}

/// DynDNS provider endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Scheme and host of the dyndns2 endpoint; `/nic/update` is appended.
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Timeout for a single update request in milliseconds.
    #[serde(default = "default_update_timeout_ms")]
    pub timeout_ms: u64,
}

impl ProviderConfig {
    /// Timeout for a single update request.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            timeout_ms: default_update_timeout_ms(),
        }
    }
}

/// IP query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpQueryConfig {
    /// A single, possibly authenticated, endpoint.
    #[serde(rename = "http")]
    Http {
        /// Endpoint returning the caller's IP as plain text.
        url: String,
        /// Basic auth user.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        /// Basic auth password (or environment variable name if prefixed with $).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        /// Request timeout in milliseconds.
        #[serde(default = "default_query_timeout_ms")]
        timeout_ms: u64,
    },

    /// An anonymous public service.
    #[serde(rename = "public")]
    Public {
        /// Endpoint returning the caller's IP as plain text.
        #[serde(default = "default_ip_service")]
        url: String,
        /// Request timeout in milliseconds.
        #[serde(default = "default_query_timeout_ms")]
        timeout_ms: u64,
    },
}

impl Default for IpQueryConfig {
    fn default() -> Self {
        IpQueryConfig::Public {
            url: default_ip_service(),
            timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl IpQueryConfig {
    /// Request timeout for IP resolution.
    pub fn timeout(&self) -> Duration {
        match self {
            IpQueryConfig::Http { timeout_ms, .. } | IpQueryConfig::Public { timeout_ms, .. } => {
                Duration::from_millis(*timeout_ms)
            }
        }
    }

    fn set_timeout_ms(&mut self, value: u64) {
        match self {
            IpQueryConfig::Http { timeout_ms, .. } | IpQueryConfig::Public { timeout_ms, .. } => {
                *timeout_ms = value
            }
        }
    }
}

/// History configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Whether to keep update history.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of history entries to keep.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> usize {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 100,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            check_interval_secs: default_interval(),
            domains: Vec::new(),
            password: String::new(),
            provider: ProviderConfig::default(),
            ip_query: IpQueryConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdnsError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("dyndns-updater").join("config.toml"))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file, apply environment overrides, resolve secrets and validate.
    pub fn load_validated(path: &Path) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_env()?;
        config.finalize(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Override values from an environment lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(debug) = lookup("DEBUG") {
            self.debug = parse_bool("DEBUG", &debug)?;
        }

        if let Some(password) = lookup("DYNDNS_PASSWORD").or_else(|| lookup("STRATO_PASSWORD")) {
            self.password = password;
        }

        if let Some(domains) = lookup("DOMAINS") {
            self.domains = domains.split(',').map(str::to_string).collect();
        }

        if let Some(secs) = lookup("CHECK_INTERVAL_SECS") {
            self.check_interval_secs = parse_number("CHECK_INTERVAL_SECS", &secs)?;
        }

        if let Some(url) = lookup("DYNDNS_PROVIDER_URL") {
            self.provider.base_url = url;
        }

        let env_user = lookup("IP_QUERY_USER");
        let env_password = lookup("IP_QUERY_PASSWORD");

        if let Some(url) = lookup("IP_QUERY_URL") {
            let timeout_ms = self.ip_query.timeout().as_millis() as u64;
            let (username, password) = match &self.ip_query {
                IpQueryConfig::Http {
                    username, password, ..
                } => (username.clone(), password.clone()),
                IpQueryConfig::Public { .. } => (None, None),
            };
            self.ip_query = IpQueryConfig::Http {
                url,
                username: env_user.or(username),
                password: env_password.or(password),
                timeout_ms,
            };
        } else if let IpQueryConfig::Http {
            username, password, ..
        } = &mut self.ip_query
        {
            if env_user.is_some() {
                *username = env_user;
            }
            if env_password.is_some() {
                *password = env_password;
            }
        }

        if let Some(ms) = lookup("IP_QUERY_TIMEOUT_MS") {
            self.ip_query
                .set_timeout_ms(parse_number("IP_QUERY_TIMEOUT_MS", &ms)?);
        }

        Ok(())
    }

    /// Trim domains and resolve `$VAR` secret references.
    ///
    /// A reference to an unset variable is a configuration error.
    pub fn finalize<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.domains = self
            .domains
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();

        self.password = resolve_env_with(&self.password, &lookup)?;

        if let IpQueryConfig::Http {
            password: Some(password),
            ..
        } = &mut self.ip_query
        {
            *password = resolve_env_with(password, &lookup)?;
        }

        Ok(())
    }

    /// Check that every required value is present and well-formed.
    pub fn validate(&self) -> Result<()> {
        if self.password.is_empty() {
            return Err(DdnsError::Config(
                "password is required (set DYNDNS_PASSWORD)".to_string(),
            ));
        }

        if self.domains.is_empty() {
            return Err(DdnsError::Config(
                "at least one domain is required (set DOMAINS)".to_string(),
            ));
        }

        if self.check_interval_secs == 0 {
            return Err(DdnsError::Config(
                "check_interval_secs must be greater than 0".to_string(),
            ));
        }

        check_url("provider.base_url", &self.provider.base_url)?;
        if self.provider.timeout_ms == 0 {
            return Err(DdnsError::Config(
                "provider.timeout_ms must be greater than 0".to_string(),
            ));
        }

        match &self.ip_query {
            IpQueryConfig::Http { url, .. } | IpQueryConfig::Public { url, .. } => {
                check_url("ip_query.url", url)?
            }
        }

        if self.ip_query.timeout().is_zero() {
            return Err(DdnsError::Config(
                "ip_query.timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Polling interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            debug: false,
            check_interval_secs: 300,
            domains: vec!["home.example.com".to_string(), "vpn.example.com".to_string()],
            password: "$DYNDNS_PASSWORD".to_string(),
            provider: ProviderConfig::default(),
            ip_query: IpQueryConfig::Http {
                url: "https://ip.example.net/".to_string(),
                username: Some("router".to_string()),
                password: Some("$IP_QUERY_PASSWORD".to_string()),
                timeout_ms: default_query_timeout_ms(),
            },
            history: HistoryConfig::default(),
        }
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DdnsError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        DdnsError::Config(format!("{} must be a number, got '{}'", name, value))
    })
}

fn check_url(field: &str, value: &str) -> Result<()> {
    if !value.starts_with("https://") && !value.starts_with("http://") {
        return Err(DdnsError::Config(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|e| DdnsError::Config(format!("{} is not a valid URL: {}", field, e)))
}

/// Resolve environment variable references (values starting with $).
pub(crate) fn resolve_env_with<F>(value: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match value.strip_prefix('$') {
        Some(var_name) => lookup(var_name).ok_or_else(|| {
            DdnsError::Config(format!("environment variable {} not set", var_name))
        }),
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn valid_config() -> Config {
        Config {
            domains: vec!["a.example".to_string()],
            password: "s3cret".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.check_interval_secs, 300);
        assert_eq!(config.provider.base_url, "https://dyndns.strato.com");
        assert_eq!(config.ip_query.timeout(), Duration::from_millis(500));
        assert!(matches!(
            config.ip_query,
            IpQueryConfig::Public { ref url, .. } if url == "https://api.ipify.org"
        ));
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            debug = true
            check_interval_secs = 60
            domains = ["a.example", "b.example"]
            password = "s3cret"

            [ip_query]
            type = "http"
            url = "https://ip.example.net/"
            username = "router"
            password = "pw"
            "#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.domains.len(), 2);
        match config.ip_query {
            IpQueryConfig::Http {
                url,
                username,
                timeout_ms,
                ..
            } => {
                assert_eq!(url, "https://ip.example.net/");
                assert_eq!(username.as_deref(), Some("router"));
                assert_eq!(timeout_ms, 500);
            }
            other => panic!("unexpected ip_query: {:?}", other),
        }
    }

    #[test]
    fn test_example_config_renders() {
        let rendered = Config::example().to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.domains, Config::example().domains);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_with(env(&[
                ("DEBUG", "true"),
                ("STRATO_PASSWORD", "from-env"),
                ("DOMAINS", " a.example, b.example ,,"),
                ("IP_QUERY_URL", "https://ip.example.net/"),
                ("IP_QUERY_USER", "router"),
                ("IP_QUERY_PASSWORD", "pw"),
                ("IP_QUERY_TIMEOUT_MS", "750"),
            ]))
            .unwrap();
        config.finalize(env(&[])).unwrap();

        assert!(config.debug);
        assert_eq!(config.password, "from-env");
        assert_eq!(config.domains, vec!["a.example", "b.example"]);
        assert_eq!(config.ip_query.timeout(), Duration::from_millis(750));
        assert!(matches!(
            config.ip_query,
            IpQueryConfig::Http { ref username, .. } if username.as_deref() == Some("router")
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dyndns_password_wins_over_alias() {
        let mut config = Config::default();
        config
            .apply_env_with(env(&[
                ("DYNDNS_PASSWORD", "primary"),
                ("STRATO_PASSWORD", "alias"),
            ]))
            .unwrap();
        assert_eq!(config.password, "primary");
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = Config::default();
        assert!(config.apply_env_with(env(&[("DEBUG", "maybe")])).is_err());
        assert!(config
            .apply_env_with(env(&[("CHECK_INTERVAL_SECS", "soon")]))
            .is_err());
    }

    #[test]
    fn test_secret_indirection() {
        let mut config = valid_config();
        config.password = "$MY_SECRET".to_string();
        config.finalize(env(&[("MY_SECRET", "resolved")])).unwrap();
        assert_eq!(config.password, "resolved");
    }

    #[test]
    fn test_unset_secret_variable_is_fatal() {
        let mut config = valid_config();
        config.password = "$DYNDNS_PASSWORD".to_string();

        let err = config.finalize(env(&[])).unwrap_err();
        assert!(matches!(err, DdnsError::Config(ref m) if m.contains("DYNDNS_PASSWORD")));
        assert_eq!(config.password, "$DYNDNS_PASSWORD");
    }

    #[test]
    fn test_unset_ip_query_password_is_fatal() {
        let mut config = Config::example();
        let result = config.finalize(env(&[("DYNDNS_PASSWORD", "s3cret")]));
        assert!(matches!(result, Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_resolve_env_plain_and_missing() {
        assert_eq!(
            resolve_env_with("plain_value", &env(&[])).unwrap(),
            "plain_value"
        );
        assert!(resolve_env_with("$NONEXISTENT_VAR_12345", &env(&[])).is_err());
    }

    #[test]
    fn test_validate_requires_password() {
        let config = Config {
            password: String::new(),
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_validate_requires_domains() {
        let mut config = Config {
            domains: vec!["  ".to_string()],
            ..valid_config()
        };
        config.finalize(env(&[])).unwrap();
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let mut config = valid_config();
        config.provider.base_url = "ftp://dyndns.example".to_string();
        assert!(config.validate().is_err());

        let config = Config {
            ip_query: IpQueryConfig::Http {
                url: "not a url".to_string(),
                username: None,
                password: None,
                timeout_ms: 500,
            },
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config {
            check_interval_secs: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.ip_query.set_timeout_ms(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/dyndns-updater.toml")).unwrap();
        assert!(config.domains.is_empty());
    }
}
