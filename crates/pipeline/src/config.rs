use std::str::FromStr;
use std::time::Duration;

/// Limits and retention for the batch engine.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Process-wide cap on concurrently processing jobs (default: `5`).
    pub max_concurrent_jobs: usize,
    /// Per-job cap on concurrently generating items (default: `3`).
    pub max_concurrent_items: usize,
    /// Age after completion at which jobs are removed (default: `24`).
    pub job_retention_hours: i64,
    /// Interval of the retention sweep in seconds (default: `3600`).
    pub cleanup_interval_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            max_concurrent_items: 3,
            job_retention_hours: 24,
            cleanup_interval_secs: 3600,
        }
    }
}

impl BatchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `MAX_CONCURRENT_JOBS`       | `5`     |
    /// | `MAX_CONCURRENT_ITEMS`      | `3`     |
    /// | `JOB_RETENTION_HOURS`       | `24`    |
    /// | `JOB_CLEANUP_INTERVAL_SECS` | `3600`  |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: parse_or(&lookup, "MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs)
                .max(1),
            max_concurrent_items: parse_or(&lookup, "MAX_CONCURRENT_ITEMS", defaults.max_concurrent_items)
                .max(1),
            job_retention_hours: parse_or(&lookup, "JOB_RETENTION_HOURS", defaults.job_retention_hours),
            cleanup_interval_secs: parse_or(
                &lookup,
                "JOB_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval_secs,
            )
            .max(1),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_use_defaults() {
        assert_eq!(BatchConfig::from_lookup(|_| None), BatchConfig::default());
    }

    #[test]
    fn zero_capacities_are_clamped() {
        let config = BatchConfig::from_lookup(|key| match key {
            "MAX_CONCURRENT_JOBS" | "MAX_CONCURRENT_ITEMS" => Some("0".into()),
            "JOB_RETENTION_HOURS" => Some("48".into()),
            _ => None,
        });
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.max_concurrent_items, 1);
        assert_eq!(config.job_retention_hours, 48);
    }

    #[test]
    fn unparsable_value_falls_back() {
        let config = BatchConfig::from_lookup(|key| {
            (key == "MAX_CONCURRENT_ITEMS").then(|| "many".to_string())
        });
        assert_eq!(config.max_concurrent_items, 3);
    }
}
