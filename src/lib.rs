//! # dyndns-updater
//!
//! Keeps dynamic DNS hostnames pointed at a changing public IP.
//!
//! ## Features
//!
//! - Public IP discovery from an authenticated endpoint or a public service
//! - dyndns2 (`/nic/update`) updates, Strato by default
//! - Per-domain change detection, only stale domains are pushed
//! - Daemon mode with configurable check interval and graceful shutdown
//!
//! ## Usage
//!
//! ```bash
//! # Run the updater loop
//! DYNDNS_PASSWORD=secret DOMAINS=home.example.com dyndns-updater
//!
//! # Single pass with a JSON report
//! dyndns-updater once --json
//!
//! # Check current IP
//! dyndns-updater status
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod providers;
pub mod updater;

pub use config::Config;
pub use detector::{IpResolver, ResolvedIp};
pub use error::{DdnsError, Result};
pub use providers::DynDnsClient;
pub use updater::{TickReport, Updater};
