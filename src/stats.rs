//! Query result types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full network summary.
///
/// When the connection table could not be read, the connection counts are
/// `None` and `connection_error` says why. Request statistics are still filled
/// in from the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// All TCP connections in the OS table
    pub total_connections: Option<usize>,

    /// Connections on a web port
    pub web_connections: Option<usize>,

    /// Requests currently held in the ledger
    pub total_web_requests: usize,

    /// Bot requests per client (clients without bot traffic report 0)
    pub bots: BTreeMap<String, usize>,

    /// Connection enumeration failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_error: Option<String>,
}

impl SummaryStats {
    /// True when connection counts are missing.
    pub fn is_degraded(&self) -> bool {
        self.connection_error.is_some()
    }

    /// Total bot requests across all clients.
    pub fn total_bot_requests(&self) -> usize {
        self.bots.values().sum()
    }
}

/// Aggregate bot/legit split of ledger requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotBreakdown {
    pub total: usize,
    pub bots: usize,
    pub legit: usize,
}

impl BotBreakdown {
    pub fn new(total: usize, bots: usize) -> Self {
        Self {
            total,
            bots,
            legit: total.saturating_sub(bots),
        }
    }

    /// Share of requests made by bots (0.0 when there are none).
    pub fn bot_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.bots as f64 / self.total as f64
    }
}

/// Ledger requests per bot vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorBreakdown {
    pub vendors: BTreeMap<String, usize>,
}

impl VendorBreakdown {
    pub fn get(&self, vendor: &str) -> usize {
        self.vendors.get(vendor).copied().unwrap_or(0)
    }
}

/// Active connection count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCount {
    pub active_connections: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_breakdown() {
        let breakdown = BotBreakdown::new(10, 3);
        assert_eq!(breakdown.legit, 7);
        assert!((breakdown.bot_ratio() - 0.3).abs() < f64::EPSILON);
        assert_eq!(BotBreakdown::default().bot_ratio(), 0.0);
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = SummaryStats {
            total_connections: Some(5),
            web_connections: Some(2),
            total_web_requests: 3,
            bots: BTreeMap::from([("10.0.0.1".to_string(), 1)]),
            connection_error: None,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "total_connections": 5,
                "web_connections": 2,
                "total_web_requests": 3,
                "bots": {"10.0.0.1": 1}
            })
        );
        assert!(!summary.is_degraded());
    }

    #[test]
    fn test_degraded_summary_json() {
        let summary = SummaryStats {
            connection_error: Some("ss missing".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["total_connections"].is_null());
        assert_eq!(json["connection_error"], "ss missing");
        assert!(summary.is_degraded());
    }

    #[test]
    fn test_vendor_breakdown_is_flat_map() {
        let breakdown = VendorBreakdown {
            vendors: BTreeMap::from([("Google".to_string(), 4)]),
        };
        assert_eq!(serde_json::to_value(&breakdown).unwrap(), serde_json::json!({"Google": 4}));
        assert_eq!(breakdown.get("Bing"), 0);
    }
}
