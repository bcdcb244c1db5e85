/// Configuration management for the group gate
use crate::error::{GateError, GateResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "group_gate=info,tower_http=info";

/// Default external enrollment lookup endpoint
pub const DEFAULT_VERIFY_URL: &str = "https://entry.nottingham.edu.cn/result.php";

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub content: ContentConfig,
    pub cache: CacheSettings,
    pub verification: VerificationConfig,
    pub token: TokenConfig,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Where identity and locale content lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Root holding one directory per identity. `None` means unconfigured.
    pub user_data_root: Option<PathBuf>,
    /// Directory of home-page locale files
    pub default_locales_dir: PathBuf,
}

/// Cache TTLs and maintenance periods, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub identity_config_ttl: u64,
    pub identity_list_ttl: u64,
    pub default_locales_ttl: u64,
    pub refresh_interval: u64,
    pub cleanup_interval: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            identity_config_ttl: 600,
            identity_list_ttl: 300,
            default_locales_ttl: 900,
            refresh_interval: 120,
            cleanup_interval: 600,
        }
    }
}

/// Outbound verification call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_VERIFY_URL.to_string(),
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (compatible; UNNC-Verify-Gateway)".to_string(),
        }
    }
}

/// Reveal token signing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// HMAC secret; generated at startup when not configured
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub ttl_secs: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub verify_rps: u32,
    pub verify_burst: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives applied when `RUST_LOG` is unset
    pub level: String,
}

/// Parse an env var, falling back to `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Resolve a possibly-relative path against the working directory
fn absolutize(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> GateResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("GATE_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("GATE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| GateError::Validation("Invalid port number".to_string()))?;
        let version = env!("CARGO_PKG_VERSION").to_string();

        // Unset root falls back to the local development directory
        let user_data_root = match env::var("UNNC_VERIFY_USER_DATA_ROOT") {
            Ok(root) if root.trim().is_empty() => None,
            Ok(root) => Some(absolutize(root)),
            Err(_) => Some(absolutize("user-data")),
        };
        let default_locales_dir = absolutize(
            env::var("GATE_DEFAULT_LOCALES_DIR").unwrap_or_else(|_| "locales".to_string()),
        );

        let defaults = CacheSettings::default();
        let cache = CacheSettings {
            identity_config_ttl: env_or("GATE_IDENTITY_CONFIG_TTL", defaults.identity_config_ttl),
            identity_list_ttl: env_or("GATE_IDENTITY_LIST_TTL", defaults.identity_list_ttl),
            default_locales_ttl: env_or("GATE_DEFAULT_LOCALES_TTL", defaults.default_locales_ttl),
            refresh_interval: env_or("GATE_CACHE_REFRESH_INTERVAL", defaults.refresh_interval),
            cleanup_interval: env_or("GATE_CACHE_CLEANUP_INTERVAL", defaults.cleanup_interval),
        };

        let verify_defaults = VerificationConfig::default();
        let verification = VerificationConfig {
            endpoint: env::var("GATE_VERIFY_URL").unwrap_or(verify_defaults.endpoint),
            timeout_secs: env_or("GATE_VERIFY_TIMEOUT", verify_defaults.timeout_secs),
            user_agent: env::var("GATE_VERIFY_USER_AGENT").unwrap_or(verify_defaults.user_agent),
        };

        let token = TokenConfig {
            secret: env::var("GATE_TOKEN_SECRET").ok().filter(|s| !s.is_empty()),
            ttl_secs: env_or("GATE_TOKEN_TTL", 600),
        };

        let rate_limit = RateLimitSettings {
            enabled: env_or("GATE_RATE_LIMITS_ENABLED", true),
            verify_rps: env_or("GATE_VERIFY_RPS", 5),
            verify_burst: env_or("GATE_VERIFY_BURST", 20),
        };

        let log_level = env::var("GATE_LOG_LEVEL")
            .ok()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            content: ContentConfig {
                user_data_root,
                default_locales_dir,
            },
            cache,
            verification,
            token,
            rate_limit,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Configuration rooted at the given directories, everything else default.
    /// Used by tests and embedders that do not read the environment.
    pub fn for_content(user_data_root: Option<PathBuf>, default_locales_dir: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            content: ContentConfig {
                user_data_root,
                default_locales_dir,
            },
            cache: CacheSettings::default(),
            verification: VerificationConfig::default(),
            token: TokenConfig {
                secret: None,
                ttl_secs: 600,
            },
            rate_limit: RateLimitSettings {
                enabled: false,
                verify_rps: 5,
                verify_burst: 20,
            },
            logging: LoggingConfig {
                level: DEFAULT_LOG_FILTER.to_string(),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> GateResult<()> {
        if self.service.hostname.is_empty() {
            return Err(GateError::Validation("Hostname cannot be empty".to_string()));
        }

        if let Some(secret) = &self.token.secret {
            if secret.len() < 32 {
                return Err(GateError::Validation(
                    "Token secret must be at least 32 characters".to_string(),
                ));
            }
        }

        if self.token.ttl_secs == 0 {
            return Err(GateError::Validation("Token TTL must be positive".to_string()));
        }

        if self.cache.refresh_interval == 0 || self.cache.cleanup_interval == 0 {
            return Err(GateError::Validation(
                "Cache maintenance intervals must be positive".to_string(),
            ));
        }

        if !self.verification.endpoint.starts_with("http://")
            && !self.verification.endpoint.starts_with("https://")
        {
            return Err(GateError::Validation(
                "Verification endpoint must be an http(s) URL".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_content_defaults_validate() {
        let config = ServerConfig::for_content(None, PathBuf::from("/tmp/locales"));
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.identity_config_ttl, 600);
        assert_eq!(config.cache.refresh_interval, 120);
        assert_eq!(config.verification.endpoint, DEFAULT_VERIFY_URL);
    }

    #[test]
    fn test_default_log_filter_is_info() {
        let config = ServerConfig::for_content(None, PathBuf::from("/tmp/locales"));
        assert_eq!(config.logging.level, DEFAULT_LOG_FILTER);
        assert!(!config.logging.level.contains("debug"));
        assert!(config.logging.level.contains("group_gate=info"));
    }

    #[test]
    fn test_short_token_secret_rejected() {
        let mut config = ServerConfig::for_content(None, PathBuf::from("/tmp/locales"));
        config.token.secret = Some("too-short".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolutize_keeps_absolute_paths() {
        let abs = PathBuf::from("/srv/user-data");
        assert_eq!(absolutize(&abs), abs);
        assert!(absolutize("user-data").is_absolute());
    }
}
