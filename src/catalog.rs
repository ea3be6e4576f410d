//! Vendor pattern catalog.
//!
//! Maps lowercase user-agent substrings to the vendor that operates the
//! crawler. The catalog is loaded from a `vendor -> [patterns]` source and
//! inverted into an ordered list of `(pattern, vendor)` entries.
//!
//! # Match order
//!
//! Patterns are substrings and may overlap, so a user agent can contain more
//! than one of them. The classifier takes the first entry in catalog order,
//! which is the order patterns were first loaded: vendors in source order,
//! then patterns in list order.
//!
//! If the same pattern is listed under two vendors, the later vendor wins but
//! the entry keeps the position where the pattern first appeared.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Vendor catalog shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("../data/vendors.json");

/// A single inverted catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPattern {
    /// Lowercase substring to look for in the user agent
    pub pattern: String,
    /// Vendor operating the matching agent
    pub vendor: String,
}

/// Immutable, ordered pattern catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    patterns: Vec<VendorPattern>,
}

impl Catalog {
    /// Build a catalog from a `vendor -> patterns` mapping.
    ///
    /// Patterns are lowercased. Empty patterns are dropped since they would
    /// match every user agent.
    pub fn load<I, V, P, S>(vendor_patterns: I) -> Self
    where
        I: IntoIterator<Item = (V, P)>,
        V: Into<String>,
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<VendorPattern> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (vendor, list) in vendor_patterns {
            let vendor = vendor.into();
            for pattern in list {
                let pattern = pattern.as_ref().to_lowercase();
                if pattern.is_empty() {
                    continue;
                }

                match positions.get(&pattern) {
                    Some(&idx) => patterns[idx].vendor = vendor.clone(),
                    None => {
                        positions.insert(pattern.clone(), patterns.len());
                        patterns.push(VendorPattern {
                            pattern,
                            vendor: vendor.clone(),
                        });
                    }
                }
            }
        }

        Self { patterns }
    }

    /// Parse a JSON object of the form `{"Vendor": ["pattern", ...]}`.
    ///
    /// Key order in the document is the catalog order.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;

        let mut entries = Vec::with_capacity(document.len());
        for (vendor, value) in document {
            let list: Vec<String> = serde_json::from_value(value)?;
            entries.push((vendor, list));
        }

        Ok(Self::load(entries))
    }

    /// Load a JSON catalog file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// The catalog bundled in `data/vendors.json`.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_CATALOG).expect("valid built-in vendor catalog")
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Entries in match order.
    pub fn iter(&self) -> impl Iterator<Item = &VendorPattern> {
        self.patterns.iter()
    }

    /// Distinct vendors in order of first appearance.
    pub fn vendors(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.patterns
            .iter()
            .map(|entry| entry.vendor.as_str())
            .filter(|vendor| seen.insert(*vendor))
            .collect()
    }

    /// First vendor whose pattern occurs in an already-lowercased user agent.
    pub(crate) fn find_vendor(&self, ua_lower: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|entry| ua_lower.contains(entry.pattern.as_str()))
            .map(|entry| entry.vendor.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_inverts_and_lowercases() {
        let catalog = Catalog::load([
            ("Google", vec!["Googlebot"]),
            ("Bing", vec!["bingbot", "MSNBot"]),
        ]);

        let entries: Vec<_> = catalog.iter().map(|e| (e.pattern.as_str(), e.vendor.as_str())).collect();
        assert_eq!(
            entries,
            vec![("googlebot", "Google"), ("bingbot", "Bing"), ("msnbot", "Bing")]
        );
    }

    #[test]
    fn test_duplicate_pattern_last_vendor_wins() {
        let catalog = Catalog::load([
            ("First", vec!["sharedbot", "firstbot"]),
            ("Second", vec!["SharedBot"]),
        ]);

        assert_eq!(catalog.len(), 2);
        let first = catalog.iter().next().unwrap();
        assert_eq!(first.pattern, "sharedbot");
        assert_eq!(first.vendor, "Second", "later vendor should win, position kept");
    }

    #[test]
    fn test_empty_patterns_ignored() {
        let catalog = Catalog::load([("Vendor", vec!["", "realbot"])]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.find_vendor("anything"), None);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::load(Vec::<(String, Vec<String>)>::new());
        assert!(catalog.is_empty());
        assert_eq!(catalog.find_vendor("googlebot"), None);
    }

    #[test]
    fn test_from_json_preserves_document_order() {
        let catalog = Catalog::from_json(r#"{"Zeta": ["bot"], "Alpha": ["alphabot"]}"#).unwrap();
        assert_eq!(catalog.vendors(), vec!["Zeta", "Alpha"]);
        // "bot" is scanned first even though "alphabot" is more specific
        assert_eq!(catalog.find_vendor("alphabot/1.0"), Some("Zeta"));
    }

    #[test]
    fn test_vendors_listed_once_in_first_appearance_order() {
        let catalog = Catalog::load([
            ("Alpha", vec!["a1"]),
            ("Beta", vec!["b1"]),
            ("Alpha", vec!["a2", "a3"]),
        ]);
        assert_eq!(catalog.vendors(), vec!["Alpha", "Beta"]);

        let builtin = Catalog::builtin();
        let distinct: HashSet<_> = builtin.iter().map(|e| e.vendor.as_str()).collect();
        assert_eq!(builtin.vendors().len(), distinct.len());
    }

    #[test]
    fn test_from_json_rejects_bad_shape() {
        assert!(Catalog::from_json(r#"["googlebot"]"#).is_err());
        assert!(Catalog::from_json(r#"{"Google": "googlebot"}"#).is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = Catalog::from_file(Path::new("/nonexistent/vendors.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin();
        assert!(!catalog.is_empty());
        assert_eq!(catalog.find_vendor("mozilla/5.0 (compatible; googlebot/2.1)"), Some("Google"));
        assert_eq!(catalog.find_vendor("gptbot/1.1"), Some("OpenAI"));
        assert_eq!(catalog.find_vendor("mozilla/5.0 firefox/120.0"), None);
    }
}
