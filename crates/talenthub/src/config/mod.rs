use std::env;
use std::fmt;
use std::num::NonZeroU32;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub board: BoardConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let board = BoardConfig {
            users_per_page: page_size_var("APP_USERS_PER_PAGE", 10)?,
            jobs_per_page: page_size_var("APP_JOBS_PER_PAGE", 6)?,
            applications_per_page: page_size_var("APP_APPLICATIONS_PER_PAGE", 6)?,
            max_per_page: page_size_var("APP_MAX_PER_PAGE", 100)?,
            throttle: ThrottleConfig {
                anon_per_minute: rate_var(
                    "APP_ANON_THROTTLE_PER_MINUTE",
                    ThrottleConfig::DEFAULT_ANON_PER_MINUTE,
                )?,
                user_per_minute: rate_var(
                    "APP_USER_THROTTLE_PER_MINUTE",
                    ThrottleConfig::DEFAULT_USER_PER_MINUTE,
                )?,
            },
        };
        board.validate()?;

        let storage = StorageConfig {
            resume_dir: optional_var("APP_RESUME_DIR").map(PathBuf::from),
            bootstrap_admin: optional_var("APP_BOOTSTRAP_ADMIN"),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: false,
                ansi: environment == AppEnvironment::Development,
            },
            board,
            storage,
        })
    }
}

fn optional_var(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn page_size_var(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match optional_var(name) {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidPageSize {
                var: name,
                value: raw,
            }),
        },
    }
}

fn rate_var(name: &'static str, default: NonZeroU32) -> Result<NonZeroU32, ConfigError> {
    match optional_var(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<NonZeroU32>()
            .map_err(|_| ConfigError::InvalidThrottleRate {
                var: name,
                value: raw,
            }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
    pub ansi: bool,
}

/// Listing defaults applied when callers omit `perpage`, plus the request
/// budget of the user administration routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    pub users_per_page: usize,
    pub jobs_per_page: usize,
    pub applications_per_page: usize,
    pub max_per_page: usize,
    pub throttle: ThrottleConfig,
}

/// Requests per minute admitted on `/api/v1/admin/users`, counted per
/// authenticated user or per anonymous client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub anon_per_minute: NonZeroU32,
    pub user_per_minute: NonZeroU32,
}

impl ThrottleConfig {
    pub const DEFAULT_ANON_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(20) {
        Some(rate) => rate,
        None => NonZeroU32::MIN,
    };
    pub const DEFAULT_USER_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(120) {
        Some(rate) => rate,
        None => NonZeroU32::MIN,
    };
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            anon_per_minute: Self::DEFAULT_ANON_PER_MINUTE,
            user_per_minute: Self::DEFAULT_USER_PER_MINUTE,
        }
    }
}

impl BoardConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let largest_default = self
            .users_per_page
            .max(self.jobs_per_page)
            .max(self.applications_per_page);
        if largest_default > self.max_per_page {
            return Err(ConfigError::PageSizeAboveMaximum {
                default: largest_default,
                max: self.max_per_page,
            });
        }
        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            users_per_page: 10,
            jobs_per_page: 6,
            applications_per_page: 6,
            max_per_page: 100,
            throttle: ThrottleConfig::default(),
        }
    }
}

/// Collaborator wiring for the service binary.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Directory receiving resume uploads; uploads are refused when unset.
    pub resume_dir: Option<PathBuf>,
    /// Username of a superuser seeded at startup.
    pub bootstrap_admin: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPageSize { var: &'static str, value: String },
    PageSizeAboveMaximum { default: usize, max: usize },
    InvalidThrottleRate { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPageSize { var, value } => {
                write!(f, "{var} must be a positive integer (found '{value}')")
            }
            ConfigError::PageSizeAboveMaximum { default, max } => write!(
                f,
                "default page size {default} exceeds APP_MAX_PER_PAGE ({max})"
            ),
            ConfigError::InvalidThrottleRate { var, value } => {
                write!(f, "{var} must be a positive request count (found '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidPageSize { .. }
            | ConfigError::PageSizeAboveMaximum { .. }
            | ConfigError::InvalidThrottleRate { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_USERS_PER_PAGE",
            "APP_JOBS_PER_PAGE",
            "APP_APPLICATIONS_PER_PAGE",
            "APP_MAX_PER_PAGE",
            "APP_RESUME_DIR",
            "APP_BOOTSTRAP_ADMIN",
            "APP_ANON_THROTTLE_PER_MINUTE",
            "APP_USER_THROTTLE_PER_MINUTE",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.board, BoardConfig::default());
        assert!(config.storage.resume_dir.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_zero_page_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_JOBS_PER_PAGE", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidPageSize { var, .. }) => {
                assert_eq!(var, "APP_JOBS_PER_PAGE")
            }
            other => panic!("expected page size error, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_defaults_above_maximum() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_MAX_PER_PAGE", "5");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::PageSizeAboveMaximum { default: 10, max: 5 })
        ));
        reset_env();
    }

    #[test]
    fn reads_throttle_rates() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_USER_THROTTLE_PER_MINUTE", "30");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.board.throttle.user_per_minute.get(), 30);
        assert_eq!(config.board.throttle.anon_per_minute.get(), 20);

        env::set_var("APP_ANON_THROTTLE_PER_MINUTE", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidThrottleRate { var, .. }) => {
                assert_eq!(var, "APP_ANON_THROTTLE_PER_MINUTE")
            }
            other => panic!("expected throttle rate error, got {other:?}"),
        }
        reset_env();
    }
}
