use std::env;
use std::str::FromStr;

use concordance_types::DEFAULT_CONTEXT_WORDS;

use crate::export::JsonStyle;
use crate::scan::{ScanOptions, available_jobs};
use crate::source::SourceLimits;

pub const ENV_CONTEXT_WORDS: &str = "CONCORDANCE_CONTEXT_WORDS";
pub const ENV_MAX_LINE_BYTES: &str = "CONCORDANCE_MAX_LINE_BYTES";
pub const ENV_JOBS: &str = "CONCORDANCE_JOBS";
pub const DEFAULT_JOBS: usize = 1;

/// Tunables for one indexing run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexerConfig {
    pub context_words: usize,
    pub limits: SourceLimits,
    pub jobs: usize,
    pub style: JsonStyle,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            context_words: DEFAULT_CONTEXT_WORDS,
            limits: SourceLimits::default(),
            jobs: DEFAULT_JOBS,
            style: JsonStyle::default(),
        }
    }
}

impl IndexerConfig {
    /// Defaults overridden by `CONCORDANCE_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unparsable or zero values are ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(context_words) = positive(lookup(ENV_CONTEXT_WORDS)) {
            self.context_words = context_words;
        }
        if let Some(max_line_bytes) = positive(lookup(ENV_MAX_LINE_BYTES)) {
            self.limits.max_line_bytes = max_line_bytes;
        }
        if let Some(jobs) = positive(lookup(ENV_JOBS)) {
            self.jobs = jobs;
        }
        self
    }

    /// Scan settings with `jobs` capped at the host's parallelism.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            context_words: self.context_words,
            jobs: self.jobs.clamp(1, available_jobs()),
        }
    }
}

fn positive<T>(raw: Option<String>) -> Option<T>
where
    T: FromStr + Default + PartialOrd,
{
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = IndexerConfig::default().with_env(env_of(&[]));
        assert_eq!(config, IndexerConfig::default());
        assert_eq!(config.context_words, 10);
        assert_eq!(config.scan_options().jobs, 1);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = IndexerConfig::default().with_env(env_of(&[
            (ENV_CONTEXT_WORDS, "3"),
            (ENV_MAX_LINE_BYTES, " 4096 "),
            (ENV_JOBS, "8"),
        ]));
        assert_eq!(config.context_words, 3);
        assert_eq!(config.limits.max_line_bytes, 4096);
        assert_eq!(config.jobs, 8);
    }

    #[test]
    fn caps_jobs_at_available_parallelism() {
        let config = IndexerConfig {
            jobs: usize::MAX,
            ..IndexerConfig::default()
        };
        let jobs = config.scan_options().jobs;
        assert!(jobs >= 1);
        assert_eq!(jobs, available_jobs());
    }

    #[test]
    fn ignores_invalid_or_zero_values() {
        let config = IndexerConfig::default().with_env(env_of(&[
            (ENV_CONTEXT_WORDS, "many"),
            (ENV_JOBS, "0"),
        ]));
        assert_eq!(config, IndexerConfig::default());
    }
}
