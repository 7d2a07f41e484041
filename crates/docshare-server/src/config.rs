// ABOUTME: Configuration loading and validation for the docshare server.
// ABOUTME: Reads DOCSHARE_* environment variables and refuses unsafe remote setups.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DOCSHARE_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("DOCSHARE_BIND {0} is not a loopback address; set DOCSHARE_ALLOW_REMOTE=true to listen on it")]
    RemoteBindNotAllowed(SocketAddr),

    #[error("DOCSHARE_ALLOW_REMOTE is true but DOCSHARE_AUTH_TOKEN is not set; refusing to start without authentication")]
    RemoteWithoutToken,

    #[error("DOCSHARE_MAX_PAGE_SIZE must be an integer between 1 and 10000, got {0:?}")]
    InvalidPageSize(String),

    #[error("DOCSHARE_EXPORT_RETENTION_SECS must be a non-negative integer, got {0:?}")]
    InvalidRetention(String),

    #[error("DOCSHARE_DEFAULT_PROTOCOL must not be blank")]
    BlankProtocol,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DocshareConfig {
    pub home: PathBuf,
    pub bind: SocketAddr,
    pub allow_remote: bool,
    pub auth_token: Option<String>,
    pub default_protocol: String,
    pub max_page_size: u32,
    /// How long finished export tasks stay queryable.
    pub export_retention: Duration,
}

impl DocshareConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - DOCSHARE_HOME: data directory (default: ~/.docshare)
    /// - DOCSHARE_BIND: socket address to bind (default: 127.0.0.1:7341)
    /// - DOCSHARE_ALLOW_REMOTE: allow non-loopback binds (default: false)
    /// - DOCSHARE_AUTH_TOKEN: bearer token for share management routes (optional)
    /// - DOCSHARE_DEFAULT_PROTOCOL: protocol every org can see (default: HTTP)
    /// - DOCSHARE_MAX_PAGE_SIZE: largest accepted page size (default: 500)
    /// - DOCSHARE_EXPORT_RETENTION_SECS: lifetime of finished export tasks (default: 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = std::env::var("DOCSHARE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".docshare")
            });

        let bind_str =
            std::env::var("DOCSHARE_BIND").unwrap_or_else(|_| "127.0.0.1:7341".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let allow_remote = std::env::var("DOCSHARE_ALLOW_REMOTE")
            .map(|v| v == "true" || v == "1" || v == "yes")
            .unwrap_or(false);

        let auth_token = std::env::var("DOCSHARE_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let default_protocol =
            std::env::var("DOCSHARE_DEFAULT_PROTOCOL").unwrap_or_else(|_| "HTTP".to_string());
        if default_protocol.trim().is_empty() {
            return Err(ConfigError::BlankProtocol);
        }

        let max_page_size = match std::env::var("DOCSHARE_MAX_PAGE_SIZE") {
            Ok(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=10_000).contains(n))
                .ok_or(ConfigError::InvalidPageSize(raw))?,
            Err(_) => 500,
        };

        let export_retention = match std::env::var("DOCSHARE_EXPORT_RETENTION_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidRetention(raw))?,
            Err(_) => docshare_core::DEFAULT_TASK_RETENTION,
        };

        if allow_remote && auth_token.is_none() {
            return Err(ConfigError::RemoteWithoutToken);
        }
        if !allow_remote && !bind.ip().is_loopback() {
            return Err(ConfigError::RemoteBindNotAllowed(bind));
        }

        Ok(Self {
            home,
            bind,
            allow_remote,
            auth_token,
            default_protocol,
            max_page_size,
            export_retention,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.home.join("docshare.db")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.home.join("exports")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 7] = [
        "DOCSHARE_HOME",
        "DOCSHARE_BIND",
        "DOCSHARE_ALLOW_REMOTE",
        "DOCSHARE_AUTH_TOKEN",
        "DOCSHARE_DEFAULT_PROTOCOL",
        "DOCSHARE_MAX_PAGE_SIZE",
        "DOCSHARE_EXPORT_RETENTION_SECS",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // SAFETY: test-only code, serialized by ENV_LOCK
        unsafe {
            for var in VARS {
                std::env::remove_var(var);
            }
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
        }
        let result = f();
        // SAFETY: test-only code, serialized by ENV_LOCK
        unsafe {
            for var in VARS {
                std::env::remove_var(var);
            }
        }
        result
    }

    #[test]
    fn config_loads_defaults() {
        let config = with_env(&[], DocshareConfig::from_env).unwrap();

        assert_eq!(config.bind, "127.0.0.1:7341".parse::<SocketAddr>().unwrap());
        assert!(!config.allow_remote);
        assert!(config.auth_token.is_none());
        assert_eq!(config.default_protocol, "HTTP");
        assert_eq!(config.max_page_size, 500);
        assert_eq!(config.export_retention, Duration::from_secs(3600));
        assert!(config.home.to_string_lossy().contains(".docshare"));
        assert!(config.db_path().ends_with("docshare.db"));
    }

    #[test]
    fn config_rejects_remote_without_token() {
        let err = with_env(&[("DOCSHARE_ALLOW_REMOTE", "true")], DocshareConfig::from_env)
            .unwrap_err();
        assert!(
            err.to_string().contains("DOCSHARE_AUTH_TOKEN"),
            "error should mention auth token: {}",
            err
        );
    }

    #[test]
    fn config_rejects_public_bind_without_opt_in() {
        let err = with_env(&[("DOCSHARE_BIND", "0.0.0.0:7341")], DocshareConfig::from_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::RemoteBindNotAllowed(_)));

        let config = with_env(
            &[
                ("DOCSHARE_BIND", "0.0.0.0:7341"),
                ("DOCSHARE_ALLOW_REMOTE", "true"),
                ("DOCSHARE_AUTH_TOKEN", "secret"),
            ],
            DocshareConfig::from_env,
        )
        .unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn config_rejects_bad_values() {
        let err = with_env(&[("DOCSHARE_BIND", "not-an-addr")], DocshareConfig::from_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBind(_)));

        for raw in ["0", "abc", "20000"] {
            let err = with_env(&[("DOCSHARE_MAX_PAGE_SIZE", raw)], DocshareConfig::from_env)
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPageSize(_)));
        }

        let config = with_env(&[("DOCSHARE_MAX_PAGE_SIZE", "50")], DocshareConfig::from_env)
            .unwrap();
        assert_eq!(config.max_page_size, 50);

        let err = with_env(
            &[("DOCSHARE_EXPORT_RETENTION_SECS", "-1")],
            DocshareConfig::from_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRetention(_)));

        let config = with_env(
            &[("DOCSHARE_EXPORT_RETENTION_SECS", "0")],
            DocshareConfig::from_env,
        )
        .unwrap();
        assert_eq!(config.export_retention, Duration::ZERO);
    }
}
