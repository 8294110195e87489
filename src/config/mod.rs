use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for job queue
    pub redis_url: String,

    /// Days a job stays cached after its last access
    #[serde(default = "default_job_cache_time_days")]
    pub job_cache_time_days: i64,

    /// Seconds between cleanup sweeps
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Serve equivalent finished jobs instead of recomputing
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_job_cache_time_days() -> i64 {
    7
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_use_cache() -> bool {
    true
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn job_cache_time(&self) -> chrono::Duration {
        chrono::Duration::days(self.job_cache_time_days)
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/proteins_plus"),
            ("REDIS_URL", "redis://localhost"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.job_cache_time(), chrono::Duration::days(7));
        assert_eq!(config.cleanup_interval(), std::time::Duration::from_secs(3600));
        assert!(config.use_cache);
    }

    #[test]
    fn test_overrides() {
        let config: AppConfig = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/proteins_plus"),
            ("REDIS_URL", "redis://localhost"),
            ("JOB_CACHE_TIME_DAYS", "1"),
            ("USE_CACHE", "false"),
        ]))
        .unwrap();

        assert_eq!(config.job_cache_time(), chrono::Duration::days(1));
        assert!(!config.use_cache);
    }

    #[test]
    fn test_missing_database_url_is_an_error() {
        let result: Result<AppConfig, _> =
            envy::from_iter(vars(&[("REDIS_URL", "redis://localhost")]));
        assert!(result.is_err());
    }
}
