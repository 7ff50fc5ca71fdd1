use std::sync::Arc;

use chrono::{Months, Utc};
use serde_json::{json, Value};

use super::{
    FetchOptions, HttpMethod, HttpRequest, HttpTransport, ProviderError, RawProviderResponse,
};
use crate::bureau::domain::Provider;
use crate::config::BcuConfig;

/// Direct BCU (Central de Riesgos) adapter. Fails closed on missing
/// credentials; in mock mode it serves a deterministic payload so test and
/// demo environments never touch the real endpoint.
pub struct BcuAdapter<T> {
    transport: Arc<T>,
    config: BcuConfig,
}

impl<T: HttpTransport> BcuAdapter<T> {
    pub fn new(transport: Arc<T>, config: BcuConfig) -> Self {
        Self { transport, config }
    }

    pub async fn fetch(
        &self,
        documento: &str,
        options: FetchOptions,
    ) -> Result<RawProviderResponse, ProviderError> {
        if self.config.mock_mode {
            return Ok(RawProviderResponse {
                provider: Provider::Bcu,
                documento: documento.to_string(),
                payload: mock_payload(documento),
                partial: false,
            });
        }

        let base_url = self.config.base_url.as_deref().ok_or_else(|| {
            ProviderError::Config {
                provider: Provider::Bcu,
                detail: "BCU_BASE_URL is not set".to_string(),
            }
        })?;
        let token = self.config.token.as_deref().ok_or_else(|| {
            ProviderError::Config {
                provider: Provider::Bcu,
                detail: "BCU_TOKEN is not set".to_string(),
            }
        })?;

        let request = HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/consulta/{documento}", base_url.trim_end_matches('/')),
            headers: vec![("Authorization".to_string(), format!("Bearer {token}"))],
            body: None,
            timeout_ms: options.timeout_ms,
        };

        let response = self
            .transport
            .request(request)
            .await
            .map_err(|failure| ProviderError::from_transport(Provider::Bcu, failure))?;

        if !(200..300).contains(&response.code) {
            return Err(ProviderError::from_status(
                Provider::Bcu,
                response.code,
                response.body,
            ));
        }

        let payload = serde_json::from_str(&response.body).map_err(|err| {
            ProviderError::Malformed {
                provider: Provider::Bcu,
                detail: err.to_string(),
            }
        })?;

        Ok(RawProviderResponse {
            provider: Provider::Bcu,
            documento: documento.to_string(),
            payload,
            partial: false,
        })
    }
}

/// Deterministic payload derived from the document digits: the same document
/// always yields the same entities, balances, and ratings.
pub(crate) fn mock_payload(documento: &str) -> Value {
    let seed: u32 = documento.chars().filter_map(|c| c.to_digit(10)).sum();
    let now = Utc::now();
    let periodo = now.format("%Y-%m").to_string();
    let periodo_t6 = now
        .checked_sub_months(Months::new(6))
        .unwrap_or(now)
        .format("%Y-%m")
        .to_string();

    let vigente = 40_000.0 + f64::from(seed) * 1_250.0;
    let mut entidades = vec![json!({
        "NombreEntidad": "Banco Santander",
        "Calificacion": "1A",
        "RubrosValores": [{
            "Rubro": "CRÉDITOS VIGENTES",
            "MnPesos": vigente,
            "MePesos": 0.0,
            "MnDolares": 0.0,
            "MeDolares": 0.0
        }]
    })];

    if seed % 3 == 0 {
        entidades.push(json!({
            "NombreEntidad": "OCA",
            "Calificacion": "1C",
            "RubrosValores": [{
                "Rubro": "CRÉDITOS VIGENTES",
                "MnPesos": 12_500.0 + f64::from(seed) * 10.0,
                "MePesos": 0.0,
                "MnDolares": 0.0,
                "MeDolares": 0.0
            }]
        }));
    }

    let entidades_t6 = if seed % 2 == 0 {
        vec![json!({
            "NombreEntidad": "Banco Santander",
            "Calificacion": "1A",
            "RubrosValores": [{
                "Rubro": "CRÉDITOS VIGENTES",
                "MnPesos": vigente * 0.8,
                "MePesos": 0.0,
                "MnDolares": 0.0,
                "MeDolares": 0.0
            }]
        })]
    } else {
        Vec::new()
    };

    json!({
        "Documento": documento,
        "Nombre": "TITULAR DE PRUEBA",
        "Fallecido": false,
        "Periodo": periodo,
        "PeriodoT6": periodo_t6,
        "Entidades": entidades,
        "EntidadesT6": entidades_t6
    })
}
