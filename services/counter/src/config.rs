//! Counter service configuration

use anyhow::{Result, bail};
use serde::Deserialize;
use session_store::{
    CookieOptions, DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_MAX_AGE, DEFAULT_TABLE_NAME,
    StoreOptions,
};

/// Service settings read from `SESSION_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Address to bind the HTTP listener to
    pub listen_addr: String,
    /// Secret used to sign session cookies
    pub secret: String,
    /// Secret from before the last rotation, still accepted on read
    #[serde(default)]
    pub previous_secret: Option<String>,
    /// Secret used to encrypt session cookies (optional)
    #[serde(default)]
    pub encryption_key: Option<String>,
    /// Table holding the sessions
    pub table_name: String,
    /// Do not create the table on startup
    pub skip_create_table: bool,
    /// Maximum encoded payload size in bytes
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Session lifetime in seconds
    pub max_age: i64,
    /// Mark session cookies `Secure`
    pub cookie_secure: bool,
    /// Seconds between cleanup passes
    pub cleanup_interval_secs: u64,
}

impl ServiceConfig {
    /// Create a new ServiceConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_SECRET`: cookie signing secret (required)
    /// - `SESSION_PREVIOUS_SECRET`: previous signing secret (optional)
    /// - `SESSION_ENCRYPTION_KEY`: cookie encryption secret (optional)
    /// - `SESSION_LISTEN_ADDR`: listen address (default: 0.0.0.0:3002)
    /// - `SESSION_TABLE_NAME`: session table (default: sessions)
    /// - `SESSION_SKIP_CREATE_TABLE`: skip table creation (default: false)
    /// - `SESSION_MAX_LENGTH`: payload size limit in bytes (default: unlimited)
    /// - `SESSION_MAX_AGE`: session lifetime in seconds (default: 30 days)
    /// - `SESSION_COOKIE_SECURE`: send cookies over HTTPS only (default: false)
    /// - `SESSION_CLEANUP_INTERVAL_SECS`: sweep interval (default: 300)
    pub fn from_env() -> Result<Self> {
        let settings = ::config::Config::builder()
            .set_default("listen_addr", "0.0.0.0:3002")?
            .set_default("table_name", DEFAULT_TABLE_NAME)?
            .set_default("skip_create_table", false)?
            .set_default("max_age", DEFAULT_MAX_AGE)?
            .set_default("cookie_secure", false)?
            .set_default("cleanup_interval_secs", DEFAULT_CLEANUP_INTERVAL_SECS as i64)?
            .add_source(::config::Environment::with_prefix("SESSION").try_parsing(true))
            .build()?;

        let config: ServiceConfig = settings.try_deserialize()?;

        if config.secret.is_empty() {
            bail!("SESSION_SECRET must not be empty");
        }
        if config.cleanup_interval_secs == 0 {
            bail!("SESSION_CLEANUP_INTERVAL_SECS must be at least 1");
        }

        Ok(config)
    }

    /// Store options derived from this configuration
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            table_name: self.table_name.clone(),
            skip_create_table: self.skip_create_table,
            max_length: self.max_length,
            session: CookieOptions {
                max_age: self.max_age,
                secure: self.cookie_secure,
                http_only: true,
                ..CookieOptions::default()
            },
            encryption_keys: self
                .encryption_key
                .iter()
                .filter(|key| !key.is_empty())
                .map(|key| key.as_bytes().to_vec())
                .collect(),
        }
    }

    /// Signing keys, current first
    pub fn keys(&self) -> Vec<Vec<u8>> {
        std::iter::once(&self.secret)
            .chain(self.previous_secret.iter())
            .filter(|secret| !secret.is_empty())
            .map(|secret| secret.as_bytes().to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 10] = [
        "SESSION_SECRET",
        "SESSION_PREVIOUS_SECRET",
        "SESSION_ENCRYPTION_KEY",
        "SESSION_LISTEN_ADDR",
        "SESSION_TABLE_NAME",
        "SESSION_SKIP_CREATE_TABLE",
        "SESSION_MAX_LENGTH",
        "SESSION_MAX_AGE",
        "SESSION_COOKIE_SECURE",
        "SESSION_CLEANUP_INTERVAL_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_service_config_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("SESSION_SECRET", "secret");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3002");
        assert_eq!(config.table_name, "sessions");
        assert!(!config.skip_create_table);
        assert_eq!(config.max_length, None);
        assert_eq!(config.max_age, DEFAULT_MAX_AGE);
        assert_eq!(config.cleanup_interval_secs, 300);
        assert_eq!(config.keys(), vec![b"secret".to_vec()]);
        assert!(config.store_options().encryption_keys.is_empty());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_service_config_with_custom_values() {
        clear_env();
        unsafe {
            std::env::set_var("SESSION_SECRET", "new");
            std::env::set_var("SESSION_PREVIOUS_SECRET", "old");
            std::env::set_var("SESSION_ENCRYPTION_KEY", "block");
            std::env::set_var("SESSION_TABLE_NAME", "abc");
            std::env::set_var("SESSION_SKIP_CREATE_TABLE", "true");
            std::env::set_var("SESSION_MAX_LENGTH", "4096");
            std::env::set_var("SESSION_MAX_AGE", "60");
            std::env::set_var("SESSION_COOKIE_SECURE", "true");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.keys(), vec![b"new".to_vec(), b"old".to_vec()]);

        let options = config.store_options();
        assert_eq!(options.table_name, "abc");
        assert!(options.skip_create_table);
        assert_eq!(options.max_length, Some(4096));
        assert_eq!(options.session.max_age, 60);
        assert!(options.session.secure);
        assert!(options.session.http_only);
        assert_eq!(options.encryption_keys, vec![b"block".to_vec()]);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_service_config_requires_secret() {
        clear_env();
        assert!(ServiceConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_service_config_rejects_zero_interval() {
        clear_env();
        unsafe {
            std::env::set_var("SESSION_SECRET", "secret");
            std::env::set_var("SESSION_CLEANUP_INTERVAL_SECS", "0");
        }

        assert!(ServiceConfig::from_env().is_err());

        clear_env();
    }
}
