use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{
    FetchOptions, HttpMethod, HttpRequest, HttpTransport, ProviderError, RawProviderResponse,
};
use crate::bureau::domain::Provider;
use crate::config::{EquifaxConfig, EquifaxEnvironment};

/// Tokens are refreshed this long before their reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
    sandbox: bool,
}

/// In-memory OAuth token slot shared by every Equifax fetch. The slot is
/// keyed by environment, so a sandbox/production switch always re-auths.
#[derive(Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    fn fresh(&self, sandbox: bool) -> Option<String> {
        let guard = self.slot.lock().expect("token cache poisoned");
        guard
            .as_ref()
            .filter(|token| token.sandbox == sandbox)
            .filter(|token| token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN)
            .map(|token| token.access_token.clone())
    }

    fn store(&self, token: CachedToken) {
        *self.slot.lock().expect("token cache poisoned") = Some(token);
    }

    pub fn invalidate(&self) {
        self.slot.lock().expect("token cache poisoned").take();
    }
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    expires_in: u64,
}

/// Equifax interconnect adapter: OAuth2 client-credentials auth with a cached
/// token, sandbox/production selection, and typed status mapping.
pub struct EquifaxAdapter<T> {
    transport: Arc<T>,
    config: EquifaxConfig,
    tokens: TokenCache,
}

impl<T: HttpTransport> EquifaxAdapter<T> {
    pub fn new(transport: Arc<T>, config: EquifaxConfig) -> Self {
        Self {
            transport,
            config,
            tokens: TokenCache::default(),
        }
    }

    /// Drop the cached token so the next fetch re-authenticates.
    pub fn invalidate_token_cache(&self) {
        self.tokens.invalidate();
    }

    pub async fn fetch(
        &self,
        documento: &str,
        options: FetchOptions,
    ) -> Result<RawProviderResponse, ProviderError> {
        let environment = self.config.environment(options.sandbox);
        if let Some(field) = environment.missing_field() {
            return Err(ProviderError::Config {
                provider: Provider::Equifax,
                detail: format!("equifax {field} is not set"),
            });
        }

        let token = self.ensure_token(environment, options).await?;
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: format!(
                "{}/v1/informe-crediticio",
                environment.base_url.trim_end_matches('/')
            ),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {token}")),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: Some(json!({ "documento": documento, "tipoDocumento": "CI" }).to_string()),
            timeout_ms: options.timeout_ms,
        };

        let response = self
            .transport
            .request(request)
            .await
            .map_err(|failure| ProviderError::from_transport(Provider::Equifax, failure))?;

        if !(200..300).contains(&response.code) {
            if response.code == 401 {
                // Stale token; next call re-auths. The current call is not retried.
                self.tokens.invalidate();
            }
            return Err(ProviderError::from_status(
                Provider::Equifax,
                response.code,
                response.body,
            ));
        }

        let payload = serde_json::from_str(&response.body).map_err(|err| {
            ProviderError::Malformed {
                provider: Provider::Equifax,
                detail: err.to_string(),
            }
        })?;

        Ok(RawProviderResponse {
            provider: Provider::Equifax,
            documento: documento.to_string(),
            payload,
            partial: false,
        })
    }

    async fn ensure_token(
        &self,
        environment: &EquifaxEnvironment,
        options: FetchOptions,
    ) -> Result<String, ProviderError> {
        if let Some(token) = self.tokens.fresh(options.sandbox) {
            return Ok(token);
        }

        debug!(sandbox = options.sandbox, "requesting equifax access token");
        let basic = BASE64_STANDARD.encode(format!(
            "{}:{}",
            environment.client_id, environment.client_secret
        ));
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: environment.token_url.clone(),
            headers: vec![
                ("Authorization".to_string(), format!("Basic {basic}")),
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
            ],
            body: Some("grant_type=client_credentials".to_string()),
            timeout_ms: options.timeout_ms,
        };

        let response = self
            .transport
            .request(request)
            .await
            .map_err(|failure| ProviderError::from_transport(Provider::Equifax, failure))?;

        if response.code != 200 {
            return Err(ProviderError::Token {
                provider: Provider::Equifax,
                detail: format!("HTTP {} from token endpoint", response.code),
            });
        }

        let grant: TokenGrant =
            serde_json::from_str(&response.body).map_err(|err| ProviderError::Token {
                provider: Provider::Equifax,
                detail: format!("unparseable grant: {err}"),
            })?;

        self.tokens.store(CachedToken {
            access_token: grant.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(grant.expires_in),
            sandbox: options.sandbox,
        });

        Ok(grant.access_token)
    }
}
