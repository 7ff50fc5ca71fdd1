mod bcu;
mod equifax;
mod mym;

pub use bcu::BcuAdapter;
#[cfg(test)]
pub(crate) use bcu::mock_payload;
pub use equifax::{EquifaxAdapter, TokenCache};
pub use mym::MymAdapter;

use std::future::Future;
use std::sync::Arc;

use crate::bureau::domain::Provider;
use crate::config::BureauConfig;

/// Default per-call adapter timeout.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 15_000;

/// Options forwarded to every adapter fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub sandbox: bool,
    pub force_refresh: bool,
    pub timeout_ms: u64,
    pub debug: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            sandbox: false,
            force_refresh: false,
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            debug: false,
        }
    }
}

/// Raw provider payload, untouched except for the MyM period merge. `partial`
/// marks a MyM response where one of the two period calls failed.
#[derive(Debug, Clone)]
pub struct RawProviderResponse {
    pub provider: Provider,
    pub documento: String,
    pub payload: serde_json::Value,
    pub partial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub code: u16,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportFailure {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("network failure: {0}")]
    Network(String),
}

/// Transport capability consumed by every adapter. Implementations own the
/// socket-level details; adapters own auth and payload shaping.
pub trait HttpTransport: Send + Sync + 'static {
    fn request(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportFailure>> + Send;
}

/// Typed adapter failures. Adapters never produce business rejections; those
/// belong exclusively to the scoring engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider}: invalid request (HTTP {http_status}): {message}")]
    InvalidRequest {
        provider: Provider,
        http_status: u16,
        message: String,
        response_body: String,
    },
    #[error("{provider}: unauthorized (HTTP {http_status})")]
    Unauthorized {
        provider: Provider,
        http_status: u16,
        response_body: String,
    },
    #[error("{provider}: document not found (HTTP {http_status})")]
    NotFound {
        provider: Provider,
        http_status: u16,
        response_body: String,
    },
    #[error("{provider}: rate limited (HTTP {http_status})")]
    RateLimited {
        provider: Provider,
        http_status: u16,
        response_body: String,
    },
    #[error("{provider}: provider failure (HTTP {http_status}): {message}")]
    Failure {
        provider: Provider,
        http_status: u16,
        message: String,
        response_body: String,
    },
    #[error("{provider}: request timed out after {timeout_ms}ms")]
    Timeout { provider: Provider, timeout_ms: u64 },
    #[error("{provider}: network failure: {detail}")]
    Network { provider: Provider, detail: String },
    #[error("{provider}: configuration incomplete: {detail}")]
    Config { provider: Provider, detail: String },
    #[error("{provider}: token endpoint failure: {detail}")]
    Token { provider: Provider, detail: String },
    #[error("{provider}: malformed payload: {detail}")]
    Malformed { provider: Provider, detail: String },
}

impl ProviderError {
    pub fn provider(&self) -> Provider {
        match self {
            Self::InvalidRequest { provider, .. }
            | Self::Unauthorized { provider, .. }
            | Self::NotFound { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Failure { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Network { provider, .. }
            | Self::Config { provider, .. }
            | Self::Token { provider, .. }
            | Self::Malformed { provider, .. } => *provider,
        }
    }

    /// Stable machine-readable code, e.g. `BCU_CONFIG_ERROR`.
    pub fn code(&self) -> String {
        let kind = match self {
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Failure { .. } => "PROVIDER_FAILURE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Network { .. } => "NETWORK_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Token { .. } => "TOKEN_ERROR",
            Self::Malformed { .. } => "MALFORMED_RESPONSE",
        };
        format!("{}_{kind}", self.provider().tag().to_ascii_uppercase())
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::InvalidRequest { http_status, .. }
            | Self::Unauthorized { http_status, .. }
            | Self::NotFound { http_status, .. }
            | Self::RateLimited { http_status, .. }
            | Self::Failure { http_status, .. } => Some(*http_status),
            _ => None,
        }
    }

    /// Config-class failures are logged distinctly and must never be cached.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Token { .. })
    }

    pub(crate) fn from_transport(provider: Provider, failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Timeout { timeout_ms } => Self::Timeout {
                provider,
                timeout_ms,
            },
            TransportFailure::Network(detail) => Self::Network { provider, detail },
        }
    }

    pub(crate) fn from_status(provider: Provider, http_status: u16, response_body: String) -> Self {
        match http_status {
            400 => Self::InvalidRequest {
                provider,
                http_status,
                message: "request rejected by provider".to_string(),
                response_body,
            },
            401 | 403 => Self::Unauthorized {
                provider,
                http_status,
                response_body,
            },
            404 => Self::NotFound {
                provider,
                http_status,
                response_body,
            },
            429 => Self::RateLimited {
                provider,
                http_status,
                response_body,
            },
            _ => Self::Failure {
                provider,
                http_status,
                message: "unexpected provider status".to_string(),
                response_body,
            },
        }
    }
}

/// The three provider variants behind one dispatch point, selected by the
/// runtime tag.
pub struct ProviderAdapters<T> {
    pub equifax: EquifaxAdapter<T>,
    pub bcu: BcuAdapter<T>,
    pub mym: MymAdapter<T>,
}

impl<T: HttpTransport> ProviderAdapters<T> {
    pub fn new(transport: Arc<T>, config: &BureauConfig) -> Self {
        Self {
            equifax: EquifaxAdapter::new(transport.clone(), config.equifax.clone()),
            bcu: BcuAdapter::new(transport.clone(), config.bcu.clone()),
            mym: MymAdapter::new(transport, config.mym.clone()),
        }
    }

    pub async fn fetch(
        &self,
        provider: Provider,
        documento: &str,
        options: FetchOptions,
    ) -> Result<RawProviderResponse, ProviderError> {
        match provider {
            Provider::Equifax => self.equifax.fetch(documento, options).await,
            Provider::Bcu => self.bcu.fetch(documento, options).await,
            Provider::Mym => self.mym.fetch(documento, options).await,
        }
    }
}
