use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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

    /// Non-production environments talk to provider sandboxes by default.
    pub fn is_sandbox(&self) -> bool {
        !matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub bureau: BureauConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            bureau: BureauConfig::from_env(environment)?,
        })
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
}

/// One Equifax environment: interconnect base URL plus OAuth credentials.
#[derive(Debug, Clone, Default)]
pub struct EquifaxEnvironment {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl EquifaxEnvironment {
    /// Name of the first unset field, if any. Adapters fail closed on it.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.base_url.is_empty() {
            Some("base_url")
        } else if self.token_url.is_empty() {
            Some("token_url")
        } else if self.client_id.is_empty() {
            Some("client_id")
        } else if self.client_secret.is_empty() {
            Some("client_secret")
        } else {
            None
        }
    }
}

/// Sandbox and production credential pairs for the Equifax adapter.
#[derive(Debug, Clone)]
pub struct EquifaxConfig {
    pub production: EquifaxEnvironment,
    pub sandbox: EquifaxEnvironment,
}

impl EquifaxConfig {
    pub fn environment(&self, sandbox: bool) -> &EquifaxEnvironment {
        if sandbox {
            &self.sandbox
        } else {
            &self.production
        }
    }
}

/// BCU adapter settings. Real transport credentials are optional; mock mode
/// serves deterministic data for test and demo environments.
#[derive(Debug, Clone)]
pub struct BcuConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub mock_mode: bool,
}

/// Legacy aggregator ("mym") settings.
#[derive(Debug, Clone)]
pub struct MymConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Everything the score pipeline needs: provider credentials, cache TTL, and
/// the per-call fetch timeout.
#[derive(Debug, Clone)]
pub struct BureauConfig {
    pub equifax: EquifaxConfig,
    pub bcu: BcuConfig,
    pub mym: MymConfig,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_ms: u64,
}

impl BureauConfig {
    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let equifax = EquifaxConfig {
            production: EquifaxEnvironment {
                base_url: env_or("EQUIFAX_BASE_URL", ""),
                token_url: env_or("EQUIFAX_TOKEN_URL", ""),
                client_id: env_or("EQUIFAX_CLIENT_ID", ""),
                client_secret: env_or("EQUIFAX_CLIENT_SECRET", ""),
            },
            sandbox: EquifaxEnvironment {
                base_url: env_or("EQUIFAX_SANDBOX_BASE_URL", "https://api.sandbox.equifax.uy"),
                token_url: env_or(
                    "EQUIFAX_SANDBOX_TOKEN_URL",
                    "https://api.sandbox.equifax.uy/oauth/token",
                ),
                client_id: env_or("EQUIFAX_SANDBOX_CLIENT_ID", ""),
                client_secret: env_or("EQUIFAX_SANDBOX_CLIENT_SECRET", ""),
            },
        };

        let bcu = BcuConfig {
            base_url: env::var("BCU_BASE_URL").ok().filter(|v| !v.is_empty()),
            token: env::var("BCU_TOKEN").ok().filter(|v| !v.is_empty()),
            mock_mode: match env::var("BCU_MOCK").ok() {
                Some(raw) => parse_bool("BCU_MOCK", &raw)?,
                None => environment.is_sandbox(),
            },
        };

        let mym = MymConfig {
            base_url: env_or("MYM_BASE_URL", "https://api.mym.com.uy"),
            api_key: env::var("MYM_API_KEY").ok().filter(|v| !v.is_empty()),
        };

        Ok(Self {
            equifax,
            bcu,
            mym,
            cache_ttl_secs: parse_u64("SCORE_CACHE_TTL_SECS", 1_800)?,
            fetch_timeout_ms: parse_u64("SCORE_FETCH_TIMEOUT_MS", 15_000)?,
        })
    }
}

fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" => Ok(true),
        "0" | "false" | "f" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
    InvalidBool { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a non-negative integer")
            }
            ConfigError::InvalidBool { var } => write!(f, "{var} must be a boolean flag"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
