use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crediscore::bureau::cache::InMemoryScoreCache;
use crediscore::bureau::providers::{
    HttpRequest, HttpResponse, HttpTransport, TransportFailure,
};
use crediscore::bureau::rules::{RulesSource, RulesSourceError};
use crediscore::bureau::service::ScoreService;
use crediscore::config::{BcuConfig, BureauConfig, EquifaxConfig, EquifaxEnvironment, MymConfig};
use serde_json::{json, Value};

/// Transport that answers the Equifax token and report endpoints from
/// fixtures. The report varies with the documento so rejection paths can be
/// driven end to end.
pub struct ScriptedTransport {
    pub report_calls: AtomicUsize,
    pub fail_reports: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            report_calls: AtomicUsize::new(0),
            fail_reports: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            report_calls: AtomicUsize::new(0),
            fail_reports: true,
        }
    }
}

impl HttpTransport for ScriptedTransport {
    fn request(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportFailure>> + Send {
        let response = if request.url.contains("/oauth/token") {
            HttpResponse {
                code: 200,
                body: json!({"access_token": "fixture-token", "expires_in": 3600}).to_string(),
            }
        } else if self.fail_reports {
            self.report_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            HttpResponse {
                code: 503,
                body: "{}".to_string(),
            }
        } else {
            self.report_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let documento = request
                .body
                .as_deref()
                .and_then(|body| serde_json::from_str::<Value>(body).ok())
                .and_then(|body| body["documento"].as_str().map(str::to_string))
                .unwrap_or_default();
            HttpResponse {
                code: 200,
                body: equifax_report(&documento).to_string(),
            }
        };
        async move { Ok(response) }
    }
}

/// Fixture report keyed off the documento suffix: `..99` deceased, `..88`
/// deep in arrears, `..77` empty.
pub fn equifax_report(documento: &str) -> Value {
    let fallecido = if documento.ends_with("99") { "S" } else { "N" };
    let entidades = if documento.ends_with("77") {
        json!([])
    } else if documento.ends_with("88") {
        json!([{
            "NombreEntidad": "Banco Santander",
            "Calificacion": "2B",
            "RubrosValores": [
                {"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 10000.0},
                {"Rubro": "CRÉDITOS VENCIDOS", "MnPesos": 9000.0}
            ]
        }])
    } else {
        json!([{
            "NombreEntidad": "Banco Santander",
            "Calificacion": "1A",
            "RubrosValores": [{"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 1000.0}]
        }])
    };

    json!({
        "interconnectResponse": {
            "variablesDeSalida": {
                "infoConsulta": {"nombre": "TITULAR DE PRUEBA", "fallecido": fallecido},
                "bcuT0": {"periodo": "2026-07", "Entidades": entidades},
                "bcuT6": {"periodo": "2026-01", "Entidades": []}
            }
        }
    })
}

/// Rules source exercising the option-wrapper coercion path.
pub struct WrappedFieldSource;

impl RulesSource for WrappedFieldSource {
    fn lookup_fields(&self, _record_id: &str) -> Result<BTreeMap<String, Value>, RulesSourceError> {
        Ok(BTreeMap::from([
            (
                "custrecord_score_intercept".to_string(),
                json!([{"value": "0.21", "text": "0.21"}]),
            ),
            (
                "custrecord_score_t0_santa_binned".to_string(),
                json!("0.00067"),
            ),
            // neutralize the bank-count term so the formula reduces to the
            // two overridden coefficients
            ("custrecord_score_banco_binned".to_string(), json!(0)),
        ]))
    }
}

pub fn bureau_config() -> BureauConfig {
    BureauConfig {
        equifax: EquifaxConfig {
            production: EquifaxEnvironment {
                base_url: "https://api.equifax.test".to_string(),
                token_url: "https://api.equifax.test/oauth/token".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
            },
            sandbox: EquifaxEnvironment::default(),
        },
        bcu: BcuConfig {
            base_url: None,
            token: None,
            mock_mode: true,
        },
        mym: MymConfig {
            base_url: "https://api.mym.test".to_string(),
            api_key: None,
        },
        cache_ttl_secs: 1800,
        fetch_timeout_ms: 15_000,
    }
}

pub fn build_service(
    transport: Arc<ScriptedTransport>,
) -> ScoreService<ScriptedTransport, WrappedFieldSource, InMemoryScoreCache> {
    ScoreService::new(
        transport,
        WrappedFieldSource,
        Arc::new(InMemoryScoreCache::new()),
        &bureau_config(),
        false,
    )
}
