use chrono::{Months, Utc};
use crediscore::bureau::cache::InMemoryScoreCache;
use crediscore::bureau::providers::{
    HttpRequest, HttpResponse, HttpTransport, TransportFailure,
};
use crediscore::bureau::rules::{RulesSource, RulesSourceError};
use crediscore::bureau::service::ScoreService;
use crediscore::config::{
    AppConfig, AppEnvironment, BcuConfig, BureauConfig, EquifaxConfig, EquifaxEnvironment,
    MymConfig, ServerConfig, TelemetryConfig,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Offline transport answering every provider endpoint from fixtures. Real
/// deployments swap in an `HttpTransport` backed by their HTTP client; the
/// binary ships this one so `serve`, `score`, and `demo` work out of the box.
pub(crate) struct DemoTransport;

impl HttpTransport for DemoTransport {
    fn request(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportFailure>> + Send {
        let outcome = if request.url.contains("/oauth/token") {
            Ok(json!({"access_token": "demo-token", "expires_in": 3600}).to_string())
        } else if request.url.contains("/informe-crediticio") {
            let documento = request
                .body
                .as_deref()
                .and_then(|body| serde_json::from_str::<Value>(body).ok())
                .and_then(|body| body["documento"].as_str().map(str::to_string))
                .unwrap_or_default();
            Ok(equifax_fixture(&documento).to_string())
        } else if request.url.contains("/informes/") {
            let t6 = request.url.ends_with("periodo=t6");
            Ok(mym_fixture(t6).to_string())
        } else if request.url.contains("/consulta/") {
            let documento = request
                .url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            Ok(bcu_fixture(&documento).to_string())
        } else {
            Err(TransportFailure::Network(format!(
                "no fixture for {}",
                request.url
            )))
        };
        async move { outcome.map(|body| HttpResponse { code: 200, body }) }
    }
}

fn current_period() -> String {
    Utc::now().format("%Y-%m").to_string()
}

fn prior_period() -> String {
    let now = Utc::now();
    now.checked_sub_months(Months::new(6))
        .unwrap_or(now)
        .format("%Y-%m")
        .to_string()
}

/// Equifax fixture keyed off the documento suffix: `..99` deceased,
/// `..88` in arrears, `..77` no bureau data.
fn equifax_fixture(documento: &str) -> Value {
    let fallecido = if documento.ends_with("99") { "S" } else { "N" };
    let entidades = if documento.ends_with("77") {
        json!([])
    } else if documento.ends_with("88") {
        json!([{
            "NombreEntidad": "Banco Santander",
            "Calificacion": "2B",
            "RubrosValores": [
                {"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 32000.0},
                {"Rubro": "CRÉDITOS VENCIDOS", "MnPesos": 11500.0}
            ]
        }])
    } else {
        json!([
            {
                "NombreEntidad": "Banco Santander",
                "Calificacion": "1A",
                "RubrosValores": [{"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 54000.0}]
            },
            {
                "NombreEntidad": "OCA",
                "Calificacion": "1C",
                "RubrosValores": [{"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 8200.0}]
            }
        ])
    };

    json!({
        "interconnectResponse": {
            "variablesDeSalida": {
                "infoConsulta": {"nombre": "TITULAR DE DEMO", "fallecido": fallecido},
                "bcuT0": {"periodo": current_period(), "Entidades": entidades},
                "bcuT6": {
                    "periodo": prior_period(),
                    "Entidades": [{
                        "NombreEntidad": "Banco Santander",
                        "Calificacion": "1A",
                        "RubrosValores": [{"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 47000.0}]
                    }]
                }
            }
        }
    })
}

fn mym_fixture(t6: bool) -> Value {
    if t6 {
        json!({
            "periodo": prior_period(),
            "nombre": "TITULAR DE DEMO",
            "entidades": [{
                "nombreEntidad": "Creditel",
                "calificacion": "1C",
                "rubrosValores": [{"rubro": "CRÉDITOS VIGENTES", "mnPesos": 6400.0}]
            }]
        })
    } else {
        json!({
            "periodo": current_period(),
            "nombre": "TITULAR DE DEMO",
            "entidades": [
                {
                    "nombreEntidad": "Creditel",
                    "calificacion": "1A",
                    "rubrosValores": [{"rubro": "CRÉDITOS VIGENTES", "mnPesos": 7300.0}]
                },
                {
                    "nombreEntidad": "BROU",
                    "calificacion": "1A",
                    "rubrosValores": [{"rubro": "CRÉDITOS VIGENTES", "mnPesos": 21000.0}]
                }
            ]
        })
    }
}

fn bcu_fixture(documento: &str) -> Value {
    json!({
        "Documento": documento,
        "Nombre": "TITULAR DE DEMO",
        "Fallecido": false,
        "Periodo": current_period(),
        "PeriodoT6": prior_period(),
        "Entidades": [{
            "NombreEntidad": "Banco Itaú",
            "Calificacion": "1A",
            "RubrosValores": [{"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 18000.0}]
        }],
        "EntidadesT6": []
    })
}

/// Rules source mimicking the upstream parameter record, including the
/// `[{value, text}]` wrapping the coercion layer has to unwrap.
pub(crate) struct StaticRulesSource;

impl RulesSource for StaticRulesSource {
    fn lookup_fields(&self, _record_id: &str) -> Result<BTreeMap<String, Value>, RulesSourceError> {
        Ok(BTreeMap::from([
            (
                "custrecord_score_intercept".to_string(),
                json!([{"value": "-0.8690", "text": "-0.8690"}]),
            ),
            ("custrecord_score_banco_binned".to_string(), json!("0.3127")),
            ("custrecord_max_vencido".to_string(), json!(5000)),
            (
                "custrecord_rechazo_calificaciones".to_string(),
                json!("3, 4, 5, 6"),
            ),
        ]))
    }
}

pub(crate) type DemoScoreService = ScoreService<DemoTransport, StaticRulesSource, InMemoryScoreCache>;

/// Self-contained configuration for the `score` and `demo` subcommands; no
/// environment variables required.
pub(crate) fn demo_app_config() -> AppConfig {
    AppConfig {
        environment: AppEnvironment::Development,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        telemetry: TelemetryConfig {
            log_level: "info".to_string(),
        },
        bureau: BureauConfig {
            equifax: EquifaxConfig {
                production: EquifaxEnvironment {
                    base_url: "https://api.equifax.demo".to_string(),
                    token_url: "https://api.equifax.demo/oauth/token".to_string(),
                    client_id: "demo-client".to_string(),
                    client_secret: "demo-secret".to_string(),
                },
                sandbox: EquifaxEnvironment {
                    base_url: "https://api.sandbox.equifax.demo".to_string(),
                    token_url: "https://api.sandbox.equifax.demo/oauth/token".to_string(),
                    client_id: "demo-sandbox-client".to_string(),
                    client_secret: "demo-sandbox-secret".to_string(),
                },
            },
            bcu: BcuConfig {
                base_url: Some("https://bcu.demo".to_string()),
                token: Some("demo-token".to_string()),
                mock_mode: false,
            },
            mym: MymConfig {
                base_url: "https://api.mym.demo".to_string(),
                api_key: Some("demo-key".to_string()),
            },
            cache_ttl_secs: 1800,
            fetch_timeout_ms: 15_000,
        },
    }
}

pub(crate) fn build_score_service(config: &AppConfig) -> Arc<DemoScoreService> {
    Arc::new(ScoreService::new(
        Arc::new(DemoTransport),
        StaticRulesSource,
        Arc::new(InMemoryScoreCache::new()),
        &config.bureau,
        config.environment.is_sandbox(),
    ))
}
