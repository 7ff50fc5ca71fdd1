use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::bureau::cache::ScoreCache;
use crate::bureau::domain::{PeriodData, Provider};
use crate::bureau::legacy::{to_legacy, LegacyScoreResponse};
use crate::bureau::normalizer::{normalize_response, NormalizeError};
use crate::bureau::providers::{FetchOptions, HttpTransport, ProviderAdapters, ProviderError};
use crate::bureau::rules::{RulesError, RulesProvider, RulesSource};
use crate::bureau::scoring::{
    compute_score, ErrorReglas, ScoreMetadata, ScoreResult, ScoringError, Timings,
};
use crate::config::BureauConfig;

/// Per-request options. `sandbox` and `timeout_ms` fall back to the
/// service-level defaults when unset.
#[derive(Debug, Clone, Copy)]
pub struct ScoreOptions {
    pub provider: Provider,
    pub force_refresh: bool,
    pub sandbox: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub debug: bool,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self {
            provider: Provider::Equifax,
            force_refresh: false,
            sandbox: None,
            timeout_ms: None,
            debug: false,
        }
    }
}

/// Anything that can sink the fetch-normalize-score pipeline. Converted at
/// the service boundary into a structured result; callers never see an Err.
#[derive(Debug, thiserror::Error)]
enum PipelineFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl PipelineFailure {
    fn into_result(self, documento: &str, provider: Provider) -> ScoreResult {
        let is_config = matches!(&self, Self::Provider(e) if e.is_config());
        if is_config {
            error!(documento, %provider, error = %self, "score pipeline failed on configuration");
        } else {
            warn!(documento, %provider, error = %self, "score pipeline failed");
        }
        internal_failure(provider, self.to_string())
    }
}

/// Orchestrates the full scoring pipeline behind a TTL cache. Infallible
/// from the caller's view: validation and pipeline failures come back as
/// structured results carrying 400/500 codes.
pub struct ScoreService<T, S, C> {
    adapters: ProviderAdapters<T>,
    rules: RulesProvider<S>,
    cache: Arc<C>,
    cache_ttl: Duration,
    default_timeout_ms: u64,
    sandbox_default: bool,
}

impl<T, S, C> ScoreService<T, S, C>
where
    T: HttpTransport,
    S: RulesSource,
    C: ScoreCache,
{
    pub fn new(
        transport: Arc<T>,
        rules_source: S,
        cache: Arc<C>,
        config: &BureauConfig,
        sandbox_default: bool,
    ) -> Self {
        Self {
            adapters: ProviderAdapters::new(transport, config),
            rules: RulesProvider::new(rules_source),
            cache,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            default_timeout_ms: config.fetch_timeout_ms,
            sandbox_default,
        }
    }

    pub async fn calculate_score(&self, documento: &str, options: ScoreOptions) -> ScoreResult {
        let started = Instant::now();
        let Some(documento) = sanitize_documento(documento) else {
            warn!(documento, "rejected malformed documento");
            return validation_failure(options.provider);
        };

        let cache_key = format!("{documento}:{}", options.provider.tag());
        if !options.force_refresh {
            if let Some(mut hit) = self.cache.get(&cache_key) {
                debug!(%documento, %options.provider, "score served from cache");
                hit.metadata.cached = true;
                return hit;
            }
        }

        match self.compute_fresh(&documento, options, started).await {
            Ok(result) => {
                // Rejections are legitimate outcomes and cache like any
                // success; error results never enter the cache.
                self.cache.put(&cache_key, result.clone(), self.cache_ttl);
                result
            }
            Err(failure) => failure.into_result(&documento, options.provider),
        }
    }

    /// Score and map straight onto the historical flat contract.
    pub async fn score_final(&self, documento: &str, options: ScoreOptions) -> LegacyScoreResponse {
        to_legacy(self.calculate_score(documento, options).await)
    }

    /// Drop the cached rules; the next score reloads them from the source.
    pub fn invalidate_rules_cache(&self) {
        self.rules.invalidate_cache();
    }

    /// Force the Equifax adapter to re-authenticate on its next fetch.
    pub fn invalidate_equifax_token(&self) {
        self.adapters.equifax.invalidate_token_cache();
    }

    async fn compute_fresh(
        &self,
        documento: &str,
        options: ScoreOptions,
        started: Instant,
    ) -> Result<ScoreResult, PipelineFailure> {
        let fetch_options = FetchOptions {
            sandbox: options.sandbox.unwrap_or(self.sandbox_default),
            force_refresh: options.force_refresh,
            timeout_ms: options.timeout_ms.unwrap_or(self.default_timeout_ms),
            debug: options.debug,
        };

        let fetch_start = Instant::now();
        let raw = self
            .adapters
            .fetch(options.provider, documento, fetch_options)
            .await?;
        let fetch_ms = elapsed_ms(fetch_start);

        let normalize_start = Instant::now();
        let document = normalize_response(&raw)?;
        let normalize_ms = elapsed_ms(normalize_start);

        let compute_start = Instant::now();
        let rules = self.rules.get()?;
        let mut result = compute_score(&document, &rules)?;
        let compute_ms = elapsed_ms(compute_start);

        result.metadata.timings = Timings {
            fetch_ms,
            normalize_ms,
            compute_ms,
            total_ms: elapsed_ms(started),
        };
        info!(
            documento,
            %options.provider,
            score = result.score,
            rejected = result.metadata.is_rejected,
            partial = raw.partial,
            total_ms = result.metadata.timings.total_ms,
            "score computed"
        );
        Ok(result)
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Strip the usual cédula punctuation and demand a non-empty digit string.
fn sanitize_documento(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .collect();
    if !cleaned.is_empty() && cleaned.chars().all(|c| c.is_ascii_digit()) {
        Some(cleaned)
    } else {
        None
    }
}

fn failure_result(provider: Provider, code: u16, mensaje: String) -> ScoreResult {
    ScoreResult {
        score: 0,
        calificacion_minima: None,
        contador: 0,
        endeudamiento: 0.0,
        mensaje,
        error_reglas: ErrorReglas::Code(code),
        metadata: ScoreMetadata {
            is_rejected: false,
            rejection_reason: None,
            rejection_message: None,
            provider,
            worst_rating: None,
            nombre: None,
            periodo_t0: None,
            periodo_t6: None,
            cached: false,
            timings: Timings::default(),
        },
        log_txt: String::new(),
        periods: PeriodData::default(),
    }
}

fn validation_failure(provider: Provider) -> ScoreResult {
    failure_result(
        provider,
        400,
        "Documento de identidad inválido".to_string(),
    )
}

fn internal_failure(provider: Provider, detail: String) -> ScoreResult {
    let mut result = failure_result(
        provider,
        500,
        "Error interno al calcular el score".to_string(),
    );
    result.log_txt = format!("error: {detail}");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bureau::cache::InMemoryScoreCache;
    use crate::bureau::providers::{HttpRequest, HttpResponse, TransportFailure};
    use crate::bureau::rules::RulesSourceError;
    use crate::config::{BcuConfig, EquifaxConfig, EquifaxEnvironment, MymConfig};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct BcuTransport {
        calls: AtomicUsize,
        fail: bool,
    }

    impl HttpTransport for BcuTransport {
        fn request(
            &self,
            _request: HttpRequest,
        ) -> impl Future<Output = Result<HttpResponse, TransportFailure>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = if self.fail {
                HttpResponse {
                    code: 503,
                    body: "{}".to_string(),
                }
            } else {
                HttpResponse {
                    code: 200,
                    body: json!({
                        "Nombre": "TITULAR DE PRUEBA",
                        "Fallecido": false,
                        "Periodo": "2026-07",
                        "Entidades": [{
                            "NombreEntidad": "Banco Santander",
                            "Calificacion": "1A",
                            "RubrosValores": [
                                {"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 1000.0}
                            ]
                        }]
                    })
                    .to_string(),
                }
            };
            async move { Ok(response) }
        }
    }

    struct EquifaxTransport {
        token_calls: AtomicUsize,
    }

    impl HttpTransport for EquifaxTransport {
        fn request(
            &self,
            request: HttpRequest,
        ) -> impl Future<Output = Result<HttpResponse, TransportFailure>> + Send {
            let body = if request.url.contains("/oauth/token") {
                self.token_calls.fetch_add(1, Ordering::SeqCst);
                json!({"access_token": "fixture-token", "expires_in": 3600}).to_string()
            } else {
                json!({
                    "interconnectResponse": {
                        "variablesDeSalida": {
                            "infoConsulta": {"nombre": "TITULAR DE PRUEBA", "fallecido": "N"},
                            "bcuT0": {"periodo": "2026-07", "Entidades": []},
                            "bcuT6": {"periodo": "2026-01", "Entidades": []}
                        }
                    }
                })
                .to_string()
            };
            async move { Ok(HttpResponse { code: 200, body }) }
        }
    }

    struct EmptySource;

    impl RulesSource for EmptySource {
        fn lookup_fields(
            &self,
            _record_id: &str,
        ) -> Result<BTreeMap<String, serde_json::Value>, RulesSourceError> {
            Ok(BTreeMap::new())
        }
    }

    fn service(
        fail: bool,
    ) -> (
        ScoreService<BcuTransport, EmptySource, InMemoryScoreCache>,
        Arc<BcuTransport>,
    ) {
        let config = BureauConfig {
            equifax: EquifaxConfig {
                production: EquifaxEnvironment::default(),
                sandbox: EquifaxEnvironment::default(),
            },
            bcu: BcuConfig {
                base_url: Some("https://bcu.test".to_string()),
                token: Some("bcu-token".to_string()),
                mock_mode: false,
            },
            mym: MymConfig {
                base_url: "https://mym.test".to_string(),
                api_key: None,
            },
            cache_ttl_secs: 1800,
            fetch_timeout_ms: 15_000,
        };
        let transport = Arc::new(BcuTransport {
            calls: AtomicUsize::new(0),
            fail,
        });
        let service = ScoreService::new(
            transport.clone(),
            EmptySource,
            Arc::new(InMemoryScoreCache::new()),
            &config,
            false,
        );
        (service, transport)
    }

    fn bcu_options() -> ScoreOptions {
        ScoreOptions {
            provider: Provider::Bcu,
            ..ScoreOptions::default()
        }
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let (service, transport) = service(false);

        let first = service.calculate_score("4.123.456-7", bcu_options()).await;
        assert!(!first.metadata.cached);
        assert_eq!(first.error_reglas, ErrorReglas::Clear);

        let second = service.calculate_score("41234567", bcu_options()).await;
        assert!(second.metadata.cached);
        assert_eq!(second.score, first.score);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_the_cache() {
        let (service, transport) = service(false);

        service.calculate_score("41234567", bcu_options()).await;
        let refreshed = service
            .calculate_score(
                "41234567",
                ScoreOptions {
                    force_refresh: true,
                    ..bcu_options()
                },
            )
            .await;

        assert!(!refreshed.metadata.cached);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_documento_yields_a_400_result() {
        let (service, transport) = service(false);
        let result = service.calculate_score("12A45", bcu_options()).await;
        assert_eq!(result.error_reglas, ErrorReglas::Code(400));
        assert_eq!(result.score, 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn adapter_failure_yields_a_500_result_and_is_not_cached() {
        let (service, transport) = service(true);

        let result = service.calculate_score("41234567", bcu_options()).await;
        assert_eq!(result.error_reglas, ErrorReglas::Code(500));
        assert!(result.log_txt.starts_with("error:"));

        let again = service.calculate_score("41234567", bcu_options()).await;
        assert!(!again.metadata.cached);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_invalidation_forces_reauthentication() {
        let environment = EquifaxEnvironment {
            base_url: "https://api.equifax.test".to_string(),
            token_url: "https://api.equifax.test/oauth/token".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        };
        let config = BureauConfig {
            equifax: EquifaxConfig {
                production: environment,
                sandbox: EquifaxEnvironment::default(),
            },
            bcu: BcuConfig {
                base_url: None,
                token: None,
                mock_mode: true,
            },
            mym: MymConfig {
                base_url: "https://mym.test".to_string(),
                api_key: None,
            },
            cache_ttl_secs: 1800,
            fetch_timeout_ms: 15_000,
        };
        let transport = Arc::new(EquifaxTransport {
            token_calls: AtomicUsize::new(0),
        });
        let service = ScoreService::new(
            transport.clone(),
            EmptySource,
            Arc::new(InMemoryScoreCache::new()),
            &config,
            false,
        );
        let options = ScoreOptions {
            force_refresh: true,
            ..ScoreOptions::default()
        };

        service.calculate_score("41234567", options).await;
        service.calculate_score("41234567", options).await;
        assert_eq!(transport.token_calls.load(Ordering::SeqCst), 1);

        service.invalidate_equifax_token();
        service.calculate_score("41234567", options).await;
        assert_eq!(transport.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn legacy_shape_comes_straight_from_score_final() {
        let (service, _transport) = service(false);
        let legacy = service.score_final("41234567", bcu_options()).await;
        assert!(legacy.score > 0);
        assert_eq!(legacy.periodo_t2.as_deref(), Some("2026-07"));
    }
}
