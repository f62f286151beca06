//! Worker configuration loaded from environment variables.

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `WORKER_CONCURRENCY` — orders processed in parallel (default: `3`)
/// - `BUS_CAPACITY` — event dispatch queue size (default: `256`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: usize,
    pub bus_capacity: usize,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            concurrency: std::env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            bus_capacity: std::env::var("BUS_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 3,
            bus_capacity: 256,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.bus_capacity, 256);
        assert_eq!(config.log_level, "info");
    }
}
