use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use super::{
    FetchOptions, HttpMethod, HttpRequest, HttpTransport, ProviderError, RawProviderResponse,
};
use crate::bureau::domain::Provider;
use crate::config::MymConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeriodTag {
    T2,
    T6,
}

impl PeriodTag {
    fn query(&self) -> &'static str {
        match self {
            Self::T2 => "t2",
            Self::T6 => "t6",
        }
    }
}

/// Legacy aggregator adapter. The upstream exposes one period per call, so a
/// fetch issues the current ("t2") and six-months-prior ("t6") calls
/// concurrently and merges them into a single payload. One call may fail
/// without sinking the fetch; the result is then marked partial.
pub struct MymAdapter<T> {
    transport: Arc<T>,
    config: MymConfig,
}

impl<T: HttpTransport> MymAdapter<T> {
    pub fn new(transport: Arc<T>, config: MymConfig) -> Self {
        Self { transport, config }
    }

    pub async fn fetch(
        &self,
        documento: &str,
        options: FetchOptions,
    ) -> Result<RawProviderResponse, ProviderError> {
        if self.config.base_url.is_empty() {
            return Err(ProviderError::Config {
                provider: Provider::Mym,
                detail: "MYM_BASE_URL is not set".to_string(),
            });
        }

        let (t2, t6) = tokio::join!(
            self.period_fetch(documento, PeriodTag::T2, options),
            self.period_fetch(documento, PeriodTag::T6, options)
        );

        if let (Err(t2_error), Err(_)) = (&t2, &t6) {
            return Err(t2_error.clone());
        }

        let partial = t2.is_err() || t6.is_err();
        if partial {
            let failed = if t2.is_err() { PeriodTag::T2 } else { PeriodTag::T6 };
            warn!(
                documento,
                period = failed.query(),
                "mym period call failed, continuing with partial data"
            );
        }

        Ok(RawProviderResponse {
            provider: Provider::Mym,
            documento: documento.to_string(),
            payload: json!({ "t2": t2.ok(), "t6": t6.ok() }),
            partial,
        })
    }

    async fn period_fetch(
        &self,
        documento: &str,
        period: PeriodTag,
        options: FetchOptions,
    ) -> Result<Value, ProviderError> {
        let mut headers = Vec::new();
        if let Some(api_key) = &self.config.api_key {
            headers.push(("X-Api-Key".to_string(), api_key.clone()));
        }

        let request = HttpRequest {
            method: HttpMethod::Get,
            url: format!(
                "{}/informes/{documento}?periodo={}",
                self.config.base_url.trim_end_matches('/'),
                period.query()
            ),
            headers,
            body: None,
            timeout_ms: options.timeout_ms,
        };

        let response = self
            .transport
            .request(request)
            .await
            .map_err(|failure| ProviderError::from_transport(Provider::Mym, failure))?;

        if !(200..300).contains(&response.code) {
            return Err(ProviderError::from_status(
                Provider::Mym,
                response.code,
                response.body,
            ));
        }

        serde_json::from_str(&response.body).map_err(|err| ProviderError::Malformed {
            provider: Provider::Mym,
            detail: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    struct PeriodTransport {
        fail_t6: bool,
        fail_t2: bool,
    }

    impl HttpTransport for PeriodTransport {
        fn request(
            &self,
            request: HttpRequest,
        ) -> impl Future<Output = Result<super::super::HttpResponse, super::super::TransportFailure>>
               + Send {
            let is_t6 = request.url.ends_with("periodo=t6");
            let fail = if is_t6 { self.fail_t6 } else { self.fail_t2 };
            let response = if fail {
                super::super::HttpResponse {
                    code: 503,
                    body: "{}".to_string(),
                }
            } else {
                let periodo = if is_t6 { "2026-01" } else { "2026-07" };
                super::super::HttpResponse {
                    code: 200,
                    body: format!("{{\"periodo\":\"{periodo}\",\"entidades\":[]}}"),
                }
            };
            async move { Ok(response) }
        }
    }

    fn adapter(fail_t2: bool, fail_t6: bool) -> MymAdapter<PeriodTransport> {
        MymAdapter::new(
            Arc::new(PeriodTransport { fail_t6, fail_t2 }),
            MymConfig {
                base_url: "https://api.mym.com.uy".to_string(),
                api_key: Some("demo-key".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn merges_both_periods_into_one_payload() {
        let raw = adapter(false, false)
            .fetch("41234567", FetchOptions::default())
            .await
            .expect("fetch");
        assert!(!raw.partial);
        assert_eq!(raw.payload["t2"]["periodo"], "2026-07");
        assert_eq!(raw.payload["t6"]["periodo"], "2026-01");
    }

    #[tokio::test]
    async fn tolerates_a_failed_t6_call() {
        let raw = adapter(false, true)
            .fetch("41234567", FetchOptions::default())
            .await
            .expect("fetch succeeds with partial data");
        assert!(raw.partial);
        assert_eq!(raw.payload["t2"]["periodo"], "2026-07");
        assert!(raw.payload["t6"].is_null());
    }

    #[tokio::test]
    async fn tolerates_a_failed_t2_call() {
        let raw = adapter(true, false)
            .fetch("41234567", FetchOptions::default())
            .await
            .expect("fetch succeeds with partial data");
        assert!(raw.partial);
        assert!(raw.payload["t2"].is_null());
        assert_eq!(raw.payload["t6"]["periodo"], "2026-01");
    }

    #[tokio::test]
    async fn fails_when_both_period_calls_fail() {
        let error = adapter(true, true)
            .fetch("41234567", FetchOptions::default())
            .await
            .expect_err("total failure surfaces");
        assert!(matches!(error, ProviderError::Failure { .. }));
    }
}
