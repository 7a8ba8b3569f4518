//! Server-level settings that don't belong to a single store

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};

use crate::audit::DEFAULT_QUEUE_CAPACITY;

/// Every ten minutes, on the minute
pub const DEFAULT_PURGE_SCHEDULE: &str = "0 */10 * * * *";

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub audit_queue_capacity: usize,
    /// Lifetime of `user:{username}` cache entries, in seconds
    pub user_cache_ttl: u64,
    /// Six-field cron expression for the revocation purge
    pub purge_schedule: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            audit_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            user_cache_ttl: 300,
            purge_schedule: DEFAULT_PURGE_SCHEDULE.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from environment variables
    ///
    /// # Environment Variables
    /// - `BIND_ADDR`: Listen address (default: 0.0.0.0:5000)
    /// - `AUDIT_QUEUE_CAPACITY`: Buffered audit entries (default: 1024)
    /// - `USER_CACHE_TTL`: User cache lifetime in seconds (default: 300)
    /// - `PURGE_SCHEDULE`: Cron schedule of the purge job (default: every 10 minutes)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid BIND_ADDR: {}", raw))?,
            Err(_) => defaults.bind_addr,
        };

        Ok(Self {
            bind_addr,
            audit_queue_capacity: env::var("AUDIT_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.audit_queue_capacity),
            user_cache_ttl: env::var("USER_CACHE_TTL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.user_cache_ttl),
            purge_schedule: env::var("PURGE_SCHEDULE").unwrap_or(defaults.purge_schedule),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "BIND_ADDR",
            "AUDIT_QUEUE_CAPACITY",
            "USER_CACHE_TTL",
            "PURGE_SCHEDULE",
        ] {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_server_config_defaults() {
        clear_env();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.audit_queue_capacity, 1024);
        assert_eq!(config.user_cache_ttl, 300);
        assert_eq!(config.purge_schedule, DEFAULT_PURGE_SCHEDULE);
    }

    #[test]
    #[serial]
    fn test_server_config_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("BIND_ADDR", "127.0.0.1:8080");
            std::env::set_var("USER_CACHE_TTL", "60");
            std::env::set_var("AUDIT_QUEUE_CAPACITY", "not-a-number");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.user_cache_ttl, 60);
        assert_eq!(config.audit_queue_capacity, 1024);

        unsafe {
            std::env::set_var("BIND_ADDR", "nowhere");
        }
        assert!(ServerConfig::from_env().is_err());

        clear_env();
    }
}
