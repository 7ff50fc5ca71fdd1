use serde::Deserialize;

use super::{build_document, snapshot_from_views, EntidadView, NormalizeError};
use crate::bureau::domain::{NormalizedCreditData, PeriodSnapshot, Provider};
use crate::bureau::providers::RawProviderResponse;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MymEnvelope {
    t2: Option<MymPeriod>,
    t6: Option<MymPeriod>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MymPeriod {
    periodo: Option<String>,
    nombre: Option<String>,
    fallecido: bool,
    entidades: Vec<EntidadView>,
}

/// The aggregator labels its current period "t2"; internally that maps to t0.
/// A period that failed upstream arrives as null and becomes an empty
/// snapshot.
pub fn normalize_mym_response(
    raw: &RawProviderResponse,
) -> Result<NormalizedCreditData, NormalizeError> {
    let envelope: MymEnvelope =
        serde_json::from_value(raw.payload.clone()).map_err(|err| NormalizeError::Payload {
            provider: Provider::Mym,
            detail: err.to_string(),
        })?;

    let is_deceased = envelope.t2.as_ref().map(|p| p.fallecido).unwrap_or(false)
        || envelope.t6.as_ref().map(|p| p.fallecido).unwrap_or(false);
    let nombre = envelope
        .t2
        .as_ref()
        .and_then(|p| p.nombre.clone())
        .or_else(|| envelope.t6.as_ref().and_then(|p| p.nombre.clone()));

    let (t0, periodo_t0) = match envelope.t2 {
        Some(period) => (snapshot_from_views(period.entidades), period.periodo),
        None => (PeriodSnapshot::default(), None),
    };
    let (t6, periodo_t6) = match envelope.t6 {
        Some(period) => (snapshot_from_views(period.entidades), period.periodo),
        None => (PeriodSnapshot::default(), None),
    };

    Ok(build_document(
        Provider::Mym,
        &raw.documento,
        nombre,
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
            provider: Provider::Mym,
            documento: "41234567".to_string(),
            payload,
            partial: false,
        }
    }

    #[test]
    fn t2_label_maps_to_the_t0_snapshot() {
        let document = normalize_mym_response(&raw(json!({
            "t2": {
                "periodo": "2026-07",
                "nombre": "TITULAR MYM",
                "entidades": [{
                    "nombreEntidad": "OCA",
                    "calificacion": "1C",
                    "rubrosValores": [{"rubro": "CRÉDITOS VIGENTES", "mnPesos": 2500.0}]
                }]
            },
            "t6": null
        })))
        .expect("normalize");

        assert_eq!(document.periods.t0.entities.len(), 1);
        assert!(document.periods.t6.is_empty());
        assert_eq!(document.metadata.periodo_t0.as_deref(), Some("2026-07"));
        assert_eq!(document.metadata.nombre.as_deref(), Some("TITULAR MYM"));
    }

    #[test]
    fn partial_response_with_only_t6_still_normalizes() {
        let document = normalize_mym_response(&raw(json!({
            "t2": null,
            "t6": {"periodo": "2026-01", "entidades": []}
        })))
        .expect("normalize");

        assert!(document.periods.t0.is_empty());
        assert_eq!(document.metadata.periodo_t6.as_deref(), Some("2026-01"));
    }

    #[test]
    fn deceased_marker_in_either_period_is_honored() {
        let document = normalize_mym_response(&raw(json!({
            "t2": {"periodo": "2026-07", "entidades": []},
            "t6": {"periodo": "2026-01", "fallecido": true, "entidades": []}
        })))
        .expect("normalize");
        assert!(document.flags.is_deceased);
    }
}
