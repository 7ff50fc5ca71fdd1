use serde::Deserialize;

use super::{build_document, snapshot_from_views, EntidadView, NormalizeError};
use crate::bureau::domain::{NormalizedCreditData, Provider};
use crate::bureau::providers::RawProviderResponse;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BcuEnvelope {
    #[serde(rename = "Nombre", alias = "nombre")]
    nombre: Option<String>,
    #[serde(rename = "Fallecido", alias = "fallecido")]
    fallecido: bool,
    #[serde(rename = "Periodo", alias = "periodo")]
    periodo: Option<String>,
    #[serde(rename = "PeriodoT6", alias = "periodoT6")]
    periodo_t6: Option<String>,
    #[serde(rename = "Entidades", alias = "entidades")]
    entidades: Vec<EntidadView>,
    #[serde(rename = "EntidadesT6", alias = "entidadesT6")]
    entidades_t6: Vec<EntidadView>,
}

/// The direct feed already carries both periods side by side, so this is a
/// straight lift into the canonical document.
pub fn normalize_bcu_response(
    raw: &RawProviderResponse,
) -> Result<NormalizedCreditData, NormalizeError> {
    let envelope: BcuEnvelope =
        serde_json::from_value(raw.payload.clone()).map_err(|err| NormalizeError::Payload {
            provider: Provider::Bcu,
            detail: err.to_string(),
        })?;

    Ok(build_document(
        Provider::Bcu,
        &raw.documento,
        envelope.nombre,
        envelope.fallecido,
        snapshot_from_views(envelope.entidades),
        envelope.periodo,
        snapshot_from_views(envelope.entidades_t6),
        envelope.periodo_t6,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bureau::providers::mock_payload;
    use serde_json::json;

    fn raw(payload: serde_json::Value) -> RawProviderResponse {
        RawProviderResponse {
            provider: Provider::Bcu,
            documento: "41234567".to_string(),
            payload,
            partial: false,
        }
    }

    #[test]
    fn both_periods_are_lifted() {
        let document = normalize_bcu_response(&raw(json!({
            "Nombre": "TITULAR DE PRUEBA",
            "Fallecido": false,
            "Periodo": "2026-07",
            "PeriodoT6": "2026-01",
            "Entidades": [{
                "NombreEntidad": "Banco Santander",
                "Calificacion": "1A",
                "RubrosValores": [{"Rubro": "CRÉDITOS VIGENTES", "MnPesos": 5000.0}]
            }],
            "EntidadesT6": [{
                "NombreEntidad": "Banco Santander",
                "Calificacion": "2B",
                "RubrosValores": [{"Rubro": "CRÉDITOS VENCIDOS", "MnPesos": 700.0}]
            }]
        })))
        .expect("normalize");

        assert_eq!(document.periods.t0.entities.len(), 1);
        assert_eq!(document.periods.t6.entities.len(), 1);
        assert_eq!(document.metadata.periodo_t0.as_deref(), Some("2026-07"));
        assert_eq!(document.metadata.periodo_t6.as_deref(), Some("2026-01"));
        assert_eq!(document.metadata.worst_rating.as_deref(), Some("2B"));
        assert!((document.periods.t6.aggregates.vencido.total() - 700.0).abs() < 1e-6);
    }

    #[test]
    fn empty_envelope_normalizes_to_empty_snapshots() {
        let document = normalize_bcu_response(&raw(json!({}))).expect("normalize");
        assert!(document.periods.t0.is_empty());
        assert!(document.periods.t6.is_empty());
        assert!(!document.flags.is_deceased);
    }

    #[test]
    fn mock_payload_round_trips_through_the_normalizer() {
        let document = normalize_bcu_response(&raw(mock_payload("41234567"))).expect("normalize");
        assert!(!document.periods.t0.is_empty());
        assert_eq!(document.metadata.nombre.as_deref(), Some("TITULAR DE PRUEBA"));
    }
}
