use serde::{Deserialize, Serialize};

use crate::bureau::domain::PeriodSnapshot;
use crate::bureau::scoring::{ErrorReglas, ScoreResult};

/// Historical flat response. The period snapshots are exposed as `t2`/`t6`
/// even though the current one is internally labelled t0; callers depend on
/// the old labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyScoreResponse {
    pub score: i64,
    #[serde(rename = "calificacionMinima")]
    pub calificacion_minima: Option<String>,
    pub contador: usize,
    pub endeudamiento: f64,
    pub mensaje: String,
    pub error_reglas: ErrorReglas,
    pub nombre: Option<String>,
    #[serde(rename = "logTxt")]
    pub log_txt: String,
    pub t2: PeriodSnapshot,
    pub t6: PeriodSnapshot,
    #[serde(rename = "periodoT2")]
    pub periodo_t2: Option<String>,
    #[serde(rename = "periodoT6")]
    pub periodo_t6: Option<String>,
}

pub fn to_legacy(result: ScoreResult) -> LegacyScoreResponse {
    LegacyScoreResponse {
        score: result.score,
        calificacion_minima: result.calificacion_minima,
        contador: result.contador,
        endeudamiento: result.endeudamiento,
        mensaje: result.mensaje,
        error_reglas: result.error_reglas,
        nombre: result.metadata.nombre,
        log_txt: result.log_txt,
        t2: result.periods.t0,
        t6: result.periods.t6,
        periodo_t2: result.metadata.periodo_t0,
        periodo_t6: result.metadata.periodo_t6,
    }
}
