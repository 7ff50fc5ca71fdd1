mod bcu;
mod equifax;
mod mym;

pub use bcu::normalize_bcu_response;
pub use equifax::normalize_equifax_response;
pub use mym::normalize_mym_response;

use serde::Deserialize;

use crate::bureau::domain::{
    worst_rating, CreditFlags, CreditMetadata, EntityExposure, NormalizedCreditData, PeriodData,
    PeriodSnapshot, Provider, RubroLine,
};
use crate::bureau::providers::RawProviderResponse;

#[derive(Debug, Clone, thiserror::Error)]
pub enum NormalizeError {
    #[error("{provider}: unexpected payload shape: {detail}")]
    Payload { provider: Provider, detail: String },
}

/// Convert any raw provider response into the canonical document.
pub fn normalize_response(raw: &RawProviderResponse) -> Result<NormalizedCreditData, NormalizeError> {
    match raw.provider {
        Provider::Equifax => normalize_equifax_response(raw),
        Provider::Bcu => normalize_bcu_response(raw),
        Provider::Mym => normalize_mym_response(raw),
    }
}

/// Entity block as reported by the bureau feeds. All three providers carry
/// Central de Riesgos data in this shape, differing only in the wrapping.
#[derive(Debug, Deserialize)]
pub(crate) struct EntidadView {
    #[serde(rename = "NombreEntidad", alias = "nombreEntidad")]
    pub(crate) nombre_entidad: String,
    #[serde(rename = "Calificacion", alias = "calificacion", default)]
    pub(crate) calificacion: Option<String>,
    #[serde(rename = "RubrosValores", alias = "rubrosValores", default)]
    pub(crate) rubros: Vec<RubroView>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RubroView {
    #[serde(rename = "Rubro", alias = "rubro")]
    pub(crate) rubro: String,
    #[serde(rename = "MnPesos", alias = "mnPesos", default)]
    pub(crate) mn_pesos: f64,
    #[serde(rename = "MePesos", alias = "mePesos", default)]
    pub(crate) me_pesos: f64,
    #[serde(rename = "MnDolares", alias = "mnDolares", default)]
    pub(crate) mn_dolares: f64,
    #[serde(rename = "MeDolares", alias = "meDolares", default)]
    pub(crate) me_dolares: f64,
}

pub(crate) fn snapshot_from_views(views: Vec<EntidadView>) -> PeriodSnapshot {
    let entities = views
        .into_iter()
        .map(|view| {
            let rubros = view
                .rubros
                .into_iter()
                .map(|line| RubroLine {
                    rubro: line.rubro,
                    mn_pesos: line.mn_pesos,
                    me_pesos: line.me_pesos,
                    mn_dolares: line.mn_dolares,
                    me_dolares: line.me_dolares,
                })
                .collect();
            EntityExposure::from_rubros(view.nombre_entidad, view.calificacion, rubros)
        })
        .collect::<Vec<_>>();
    PeriodSnapshot::from_entities(entities)
}

/// Assemble the canonical document. The worst rating is resolved here across
/// both periods; whether it is rejectable is decided at score time against
/// the rules in force.
pub(crate) fn build_document(
    provider: Provider,
    documento: &str,
    nombre: Option<String>,
    is_deceased: bool,
    t0: PeriodSnapshot,
    periodo_t0: Option<String>,
    t6: PeriodSnapshot,
    periodo_t6: Option<String>,
) -> NormalizedCreditData {
    let worst = worst_rating(
        t0.entities
            .iter()
            .chain(t6.entities.iter())
            .filter_map(|entity| entity.rating.as_deref()),
    );

    NormalizedCreditData {
        provider,
        documento: documento.to_string(),
        flags: CreditFlags {
            is_deceased,
        },
        metadata: CreditMetadata {
            nombre,
            worst_rating: worst,
            periodo_t0,
            periodo_t6,
            provider,
        },
        periods: PeriodData { t0, t6 },
    }
}
