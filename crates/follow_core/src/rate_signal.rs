/// Phrases the platform shows when it throttles or blocks an account.
///
/// Only distinctive multi-word phrases; generic ones such as "please wait"
/// show up in ordinary pages and would stop the run for nothing.
pub const DEFAULT_MARKERS: &[&str] = &[
    "try again later",
    "action blocked",
    "protecting our community",
    "we restrict certain activity",
    "please slow down",
    "please wait a few minutes",
    "too many requests",
];

/// Stateless scan of page or response content for rate-limit markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSignalMonitor {
    markers: Vec<String>,
}

impl Default for RateSignalMonitor {
    fn default() -> Self {
        Self::with_markers(DEFAULT_MARKERS.iter().copied())
    }
}

impl RateSignalMonitor {
    /// Build from custom markers. Single-word markers are dropped.
    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| m.split_whitespace().count() >= 2)
            .collect();
        Self { markers }
    }

    pub fn detect(&self, content: &str) -> bool {
        self.matched(content).is_some()
    }

    /// The first marker found in `content`, compared case-insensitively.
    pub fn matched(&self, content: &str) -> Option<&str> {
        if content.is_empty() {
            return None;
        }
        let haystack = content.to_lowercase();
        self.markers
            .iter()
            .find(|marker| haystack.contains(marker.as_str()))
            .map(String::as_str)
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}
