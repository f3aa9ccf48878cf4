use serde::{Deserialize, Serialize};

pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 4096;

/// Knobs for building and serving indexes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Build indexes on a worker thread. When disabled, `load_dataset` builds inline and the
    /// engine is `Ready` (or `Failed`) as soon as it returns.
    pub background_build: bool,
    /// Build per-column indexes on the rayon pool. Ignored unless the `parallel` feature is on.
    pub parallel_build: bool,
    /// How many rows the builder processes between checks of its cancellation flag.
    pub cancel_check_interval: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            background_build: true,
            parallel_build: false,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

impl EngineOptions {
    pub fn synchronous() -> Self {
        Self {
            background_build: false,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `CROSSFILTER_BACKGROUND_BUILD`, `CROSSFILTER_PARALLEL_BUILD` and
    /// `CROSSFILTER_CANCEL_CHECK_INTERVAL`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("CROSSFILTER_BACKGROUND_BUILD").and_then(|v| parse_bool(&v)) {
            self.background_build = v;
        }
        if let Some(v) = lookup("CROSSFILTER_PARALLEL_BUILD").and_then(|v| parse_bool(&v)) {
            self.parallel_build = v;
        }
        if let Some(v) = lookup("CROSSFILTER_CANCEL_CHECK_INTERVAL")
            .and_then(|v| v.replace('_', "").parse::<usize>().ok())
            .filter(|&v| v > 0)
        {
            self.cancel_check_interval = v;
        }
        self
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
