//! Coach personality attribute catalog.
//!
//! The catalog maps attribute keys to the instruction text spliced into the
//! system prompt. Users select a subset of keys; every new user starts with
//! the default starter set.

use std::collections::BTreeMap;
use std::path::Path;

/// Starter attribute set materialized for every new user.
pub const DEFAULT_ATTRIBUTES: &[&str] = &["loves-citations", "no-bs", "hard-core"];

/// Placeholder instruction for a selected key missing from the catalog.
pub const UNKNOWN_ATTRIBUTE: &str = "Unknown attribute";

/// Global attribute catalog: attribute key -> instruction text.
#[derive(Debug, Clone)]
pub struct AttributeCatalog {
    entries: BTreeMap<String, String>,
}

impl Default for AttributeCatalog {
    fn default() -> Self {
        let entries = [
            (
                "loves-citations",
                "You back up every recommendation with citations to peer-reviewed \
                 research, naming the journal and year.",
            ),
            (
                "no-bs",
                "You are blunt and direct. No hedging, no pleasantries, no filler.",
            ),
            (
                "hard-core",
                "You push the user hard. Treat every excuse as a training opportunity.",
            ),
            (
                "moar-fish",
                "You believe most diets are short on omega-3 fatty acids and look for \
                 opportunities to recommend seafood.",
            ),
            (
                "sexy-time",
                "You are playful and flirtatious in tone while keeping the advice \
                 strictly professional.",
            ),
        ];
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl AttributeCatalog {
    /// Load the catalog from `attribute_catalog.json` under the data root,
    /// falling back to the built-in catalog when the file is absent or
    /// unreadable.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let path = data_dir.join("attribute_catalog.json");
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => {
                    tracing::info!(path = %path.display(), count = entries.len(), "Attribute catalog loaded");
                    Self { entries }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt attribute catalog, using built-in");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Instruction text for a key, degrading to a placeholder for unknown keys.
    pub fn instruction(&self, key: &str) -> &str {
        self.entries
            .get(key)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_ATTRIBUTE)
    }

    /// All attribute keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// The default starter selection.
    pub fn default_selection() -> Vec<String> {
        DEFAULT_ATTRIBUTES.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_covers_starter_set() {
        let catalog = AttributeCatalog::default();
        for key in DEFAULT_ATTRIBUTES {
            assert_ne!(catalog.instruction(key), UNKNOWN_ATTRIBUTE, "missing {key}");
        }
    }

    #[test]
    fn test_unknown_key_degrades_to_placeholder() {
        let catalog = AttributeCatalog::default();
        assert_eq!(catalog.instruction("does-not-exist"), UNKNOWN_ATTRIBUTE);
    }

    #[test]
    fn test_corrupt_catalog_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("attribute_catalog.json"), "{not json").unwrap();
        let catalog = AttributeCatalog::load_or_default(dir.path());
        assert_ne!(catalog.instruction("no-bs"), UNKNOWN_ATTRIBUTE);
    }
}
