//! Network Monitor for Zentinel
//!
//! Counts the host's TCP connections and tracks which HTTP clients are known
//! automated agents (search crawlers, AI data collectors, SEO tools).
//!
//! # Features
//!
//! - Vendor pattern catalog with a fixed, documented match order
//! - User-agent classification with a bounded LRU cache
//! - Per-client request ledger with history and client-count limits
//! - TCP connection enumeration via `ss` or `/proc/net/tcp`
//! - Summary, bot breakdown, and connection count queries over HTTP
//!
//! # Example
//!
//! ```ignore
//! use zentinel_network_monitor::{Catalog, NetworkMonitor, NetworkMonitorConfig};
//!
//! let monitor = NetworkMonitor::new(NetworkMonitorConfig::default(), Catalog::builtin());
//! monitor.observe("203.0.113.7", "Mozilla/5.0 (compatible; GPTBot/1.1)", "/");
//! let summary = monitor.summarize().await;
//! ```

pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod connections;
pub mod error;
pub mod ledger;
pub mod monitor;
pub mod server;
pub mod stats;

pub use catalog::{Catalog, VendorPattern};
pub use classifier::{AgentClassifier, ClassificationResult};
pub use config::NetworkMonitorConfig;
pub use connections::{ConnectionSource, ConnectionTuple};
pub use error::{CatalogError, EnumerationError};
pub use ledger::{RequestEvent, RequestLedger};
pub use monitor::NetworkMonitor;
pub use stats::{BotBreakdown, ConnectionCount, SummaryStats, VendorBreakdown};
