//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page size applied to `Load` requests that carry no paging.
    pub default_page_size: usize,

    /// Upper bound for any requested page size.
    pub max_page_size: usize,

    /// Optional accumulation checkpoint for group steps: emit after this many input rows.
    pub aggregate_batch_rows: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 1000,
            aggregate_batch_rows: None,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ROWSTEP_DEFAULT_PAGE_SIZE`: page size for requests without paging
    /// - `ROWSTEP_MAX_PAGE_SIZE`: cap for requested page sizes
    /// - `ROWSTEP_AGGREGATE_BATCH_ROWS`: accumulation checkpoint for group steps
    pub fn from_env() -> Self {
        Self::default().with_lookup(|k| std::env::var(k).ok())
    }

    fn with_lookup(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = get("ROWSTEP_DEFAULT_PAGE_SIZE").and_then(|s| s.parse::<usize>().ok()) {
            self.default_page_size = v;
        }

        if let Some(v) = get("ROWSTEP_MAX_PAGE_SIZE").and_then(|s| s.parse::<usize>().ok()) {
            self.max_page_size = v;
        }

        if let Some(v) = get("ROWSTEP_AGGREGATE_BATCH_ROWS").and_then(|s| s.parse::<usize>().ok()) {
            self.aggregate_batch_rows = (v > 0).then_some(v);
        }

        self
    }

    /// Clamp a requested page size; `0` (unbounded) is capped to `max_page_size`.
    pub fn page_limit(&self, requested: usize) -> usize {
        if requested == 0 || requested > self.max_page_size {
            self.max_page_size
        } else {
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_overrides_defaults() {
        let cfg = EngineConfig::default().with_lookup(|k| match k {
            "ROWSTEP_DEFAULT_PAGE_SIZE" => Some("50".into()),
            "ROWSTEP_AGGREGATE_BATCH_ROWS" => Some("0".into()),
            "ROWSTEP_MAX_PAGE_SIZE" => Some("nope".into()),
            _ => None,
        });
        assert_eq!(cfg.default_page_size, 50);
        assert_eq!(cfg.max_page_size, 1000);
        assert_eq!(cfg.aggregate_batch_rows, None);
    }

    #[test]
    fn page_limit_is_capped() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.page_limit(10), 10);
        assert_eq!(cfg.page_limit(0), 1000);
        assert_eq!(cfg.page_limit(5000), 1000);
    }
}
