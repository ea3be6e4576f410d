//! Network monitor: owns the classifier, ledger, and connection source and
//! answers summary queries by combining them.

use crate::catalog::Catalog;
use crate::classifier::{AgentClassifier, ClassificationResult};
use crate::config::NetworkMonitorConfig;
use crate::connections::{self, ConnectionSource, ConnectionTuple};
use crate::error::EnumerationError;
use crate::ledger::{LedgerSnapshot, RequestLedger};
use crate::stats::{BotBreakdown, ConnectionCount, SummaryStats, VendorBreakdown};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared state behind the query API.
pub struct NetworkMonitor {
    /// Configuration
    config: NetworkMonitorConfig,
    /// User-agent classifier
    classifier: AgentClassifier,
    /// Per-client request history
    ledger: RequestLedger,
    /// OS connection table
    source: Box<dyn ConnectionSource>,
    /// Local ports counted as web traffic
    web_ports: HashSet<u16>,
    /// Enumeration time limit
    enumeration_timeout: Duration,
}

impl NetworkMonitor {
    /// Create a monitor using the connection source named in `config`.
    pub fn new(config: NetworkMonitorConfig, catalog: Catalog) -> Self {
        let source = connections::source_from_config(&config.connections);
        Self::with_source(config, catalog, source)
    }

    /// Create a monitor with an explicit connection source.
    pub fn with_source(
        config: NetworkMonitorConfig,
        catalog: Catalog,
        source: Box<dyn ConnectionSource>,
    ) -> Self {
        let classifier = AgentClassifier::new(Arc::new(catalog), config.classifier.cache_size);
        let ledger = RequestLedger::new(
            config.ledger.max_events_per_client,
            config.ledger.max_clients,
        );

        info!(
            patterns = classifier.catalog().len(),
            vendors = classifier.catalog().vendors().len(),
            source = source.name(),
            web_ports = ?config.connections.web_ports,
            "Network monitor initialized"
        );

        Self {
            web_ports: config.connections.web_port_set(),
            enumeration_timeout: config.connections.timeout(),
            config,
            classifier,
            ledger,
            source,
        }
    }

    /// Create with default configuration and the built-in catalog.
    pub fn with_defaults() -> Self {
        Self::new(NetworkMonitorConfig::default(), Catalog::builtin())
    }

    /// Record one inbound request and classify its user agent.
    pub fn observe(&self, client_id: &str, user_agent: &str, path: &str) -> ClassificationResult {
        self.ledger.record(client_id, user_agent, path);
        let result = self.classifier.classify(user_agent);

        if let Some(vendor) = &result.vendor {
            debug!(
                client = %client_id,
                vendor = %vendor,
                path = %path,
                user_agent = %user_agent,
                "Bot request recorded"
            );
        }

        result
    }

    /// Current TCP connections, bounded by the configured timeout.
    pub async fn list_connections(&self) -> Result<Vec<ConnectionTuple>, EnumerationError> {
        connections::list_with_timeout(self.source.as_ref(), self.enumeration_timeout).await
    }

    /// Number of active TCP connections.
    pub async fn connection_count(&self) -> Result<ConnectionCount, EnumerationError> {
        let connections = self.list_connections().await?;
        Ok(ConnectionCount {
            active_connections: connections.len(),
        })
    }

    /// Build the full network summary.
    ///
    /// Enumeration failures degrade the result instead of failing it.
    pub async fn summarize(&self) -> SummaryStats {
        let (total_connections, web_connections, connection_error) =
            match self.list_connections().await {
                Ok(all) => {
                    let web = connections::filter_web(&all, &self.web_ports);
                    (Some(all.len()), Some(web.len()), None)
                }
                Err(e) => {
                    warn!(error = %e, source = self.source.name(), "Connection enumeration failed");
                    (None, None, Some(e.to_string()))
                }
            };

        let snapshot = self.ledger.snapshot();
        let vendors = self.vendors_by_agent(&snapshot);
        let bots: BTreeMap<String, usize> = snapshot
            .iter()
            .map(|(client, events)| {
                let count = events
                    .iter()
                    .filter(|e| vendors[e.user_agent.as_str()].is_some())
                    .count();
                (client.clone(), count)
            })
            .collect();

        SummaryStats {
            total_connections,
            web_connections,
            total_web_requests: snapshot.total_events(),
            bots,
            connection_error,
        }
    }

    /// Bot/legit split over all ledger requests.
    pub fn bot_breakdown(&self) -> BotBreakdown {
        let snapshot = self.ledger.snapshot();
        let vendors = self.vendors_by_agent(&snapshot);
        let bots = snapshot
            .iter()
            .flat_map(|(_, events)| events.iter())
            .filter(|e| vendors[e.user_agent.as_str()].is_some())
            .count();

        BotBreakdown::new(snapshot.total_events(), bots)
    }

    /// Ledger requests per vendor.
    pub fn vendor_breakdown(&self) -> VendorBreakdown {
        let snapshot = self.ledger.snapshot();
        let by_agent = self.vendors_by_agent(&snapshot);

        let mut vendors: BTreeMap<String, usize> = BTreeMap::new();
        for (_, events) in snapshot.iter() {
            for event in events {
                if let Some(vendor) = &by_agent[event.user_agent.as_str()] {
                    match vendors.get_mut(vendor) {
                        Some(count) => *count += 1,
                        None => {
                            vendors.insert(vendor.clone(), 1);
                        }
                    }
                }
            }
        }

        VendorBreakdown { vendors }
    }

    /// Classify each distinct user agent in a snapshot once.
    fn vendors_by_agent<'a>(&self, snapshot: &'a LedgerSnapshot) -> HashMap<&'a str, Option<String>> {
        let mut vendors = HashMap::new();
        for (_, events) in snapshot.iter() {
            for event in events {
                vendors
                    .entry(event.user_agent.as_str())
                    .or_insert_with(|| self.classifier.identify(&event.user_agent));
            }
        }
        vendors
    }

    pub fn classifier(&self) -> &AgentClassifier {
        &self.classifier
    }

    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    pub fn config(&self) -> &NetworkMonitorConfig {
        &self.config
    }

    pub fn web_ports(&self) -> &HashSet<u16> {
        &self.web_ports
    }
}
