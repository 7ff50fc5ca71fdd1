use serde::Deserialize;

use super::{build_document, snapshot_from_views, EntidadView, NormalizeError};
use crate::bureau::domain::{PeriodSnapshot, Provider};
use crate::bureau::providers::RawProviderResponse;

#[derive(Debug, Deserialize)]
struct EquifaxEnvelope {
    #[serde(rename = "interconnectResponse")]
    interconnect_response: InterconnectResponse,
}

#[derive(Debug, Deserialize)]
struct InterconnectResponse {
    #[serde(rename = "variablesDeSalida")]
    variables_de_salida: VariablesDeSalida,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct VariablesDeSalida {
    #[serde(rename = "infoConsulta")]
    info_consulta: Option<InfoConsulta>,
    #[serde(rename = "bcuT0")]
    bcu_t0: Option<BcuBlock>,
    #[serde(rename = "bcuT6")]
    bcu_t6: Option<BcuBlock>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct InfoConsulta {
    nombre: Option<String>,
    /// "S" marks a deceased holder; anything else is treated as alive.
    fallecido: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BcuBlock {
    periodo: Option<String>,
    #[serde(rename = "Entidades", alias = "entidades")]
    entidades: Vec<EntidadView>,
}

/// Unwrap the interconnect envelope and lift its t0/t6 blocks into the
/// canonical document. Either block may be absent and becomes an empty
/// snapshot.
pub fn normalize_equifax_response(
    raw: &RawProviderResponse,
) -> Result<crate::bureau::domain::NormalizedCreditData, NormalizeError> {
    let envelope: EquifaxEnvelope =
        serde_json::from_value(raw.payload.clone()).map_err(|err| NormalizeError::Payload {
            provider: Provider::Equifax,
            detail: err.to_string(),
        })?;
    let variables = envelope.interconnect_response.variables_de_salida;

    let info = variables.info_consulta.unwrap_or_default();
    let is_deceased = info.fallecido.as_deref() == Some("S");

    let (t0, periodo_t0) = match variables.bcu_t0 {
        Some(block) => (snapshot_from_views(block.entidades), block.periodo),
        None => (PeriodSnapshot::default(), None),
    };
    let (t6, periodo_t6) = match variables.bcu_t6 {
        Some(block) => (snapshot_from_views(block.entidades), block.periodo),
        None => (PeriodSnapshot::default(), None),
    };

    Ok(build_document(
        Provider::Equifax,
        &raw.documento,
        info.nombre,
        is_deceased,
        t0,
        periodo_t0,
        t6,
        periodo_t6,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(payload: serde_json::Value) -> RawProviderResponse {
        RawProviderResponse {
            provider: Provider::Equifax,
            documento: "41234567".to_string(),
            payload,
            partial: false,
        }
    }

    #[test]
    fn deceased_flag_is_read_from_info_consulta() {
        let document = normalize_equifax_response(&raw(json!({
            "interconnectResponse": {
                "variablesDeSalida": {
                    "infoConsulta": {"nombre": "JUANA PEREZ", "fallecido": "S"},
                    "bcuT0": {"periodo": "2026-07", "Entidades": []}
                }
            }
        })))
        .expect("normalize");

        assert!(document.flags.is_deceased);
        assert_eq!(document.metadata.nombre.as_deref(), Some("JUANA PEREZ"));
        assert_eq!(document.metadata.periodo_t0.as_deref(), Some("2026-07"));
    }

    #[test]
    fn n_flag_and_missing_flag_mean_alive() {
        for info in [json!({"fallecido": "N"}), json!({})] {
            let document = normalize_equifax_response(&raw(json!({
                "interconnectResponse": {"variablesDeSalida": {"infoConsulta": info}}
            })))
            .expect("normalize");
            assert!(!document.flags.is_deceased);
        }
    }

    #[test]
    fn missing_t6_block_becomes_an_empty_snapshot() {
        let document = normalize_equifax_response(&raw(json!({
            "interconnectResponse": {
                "variablesDeSalida": {
                    "bcuT0": {
                        "periodo": "2026-07",
                        "Entidades": [{
                            "NombreEntidad": "Banco Santander",
                            "Calificacion": "1A",
                            "RubrosValores": [
                                {"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 1000.0}
                            ]
                        }]
                    }
                }
            }
        })))
        .expect("normalize");

        assert_eq!(document.periods.t0.entities.len(), 1);
        assert!(document.periods.t6.is_empty());
        assert_eq!(document.metadata.periodo_t6, None);
        assert_eq!(document.metadata.worst_rating.as_deref(), Some("1A"));
    }

    #[test]
    fn envelope_without_interconnect_block_is_rejected() {
        let error = normalize_equifax_response(&raw(json!({"unexpected": true})))
            .expect_err("payload error");
        assert!(matches!(error, NormalizeError::Payload { provider: Provider::Equifax, .. }));
    }
}
