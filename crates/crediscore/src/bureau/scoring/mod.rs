mod buckets;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use buckets::{bank_entity_count, bucket_indicator, parse_coefficient_key, CoefficientKey, Period};

use crate::bureau::domain::{
    worst_rating, NormalizedCreditData, PeriodData, PeriodSnapshot, Provider,
};
use crate::bureau::rules::ScoringRules;

/// Why a document was rejected before the formula ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    Deceased,
    BadRating,
    OverThreshold,
    NoBcuData,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deceased => "DECEASED",
            Self::BadRating => "BAD_RATING",
            Self::OverThreshold => "OVER_THRESHOLD",
            Self::NoBcuData => "NO_BCU_DATA",
        }
    }

    /// Numeric code historical callers read from `error_reglas`.
    pub fn legacy_code(&self) -> u16 {
        match self {
            Self::NoBcuData => 404,
            _ => 422,
        }
    }
}

/// Legacy rules-outcome field: literal `false` when the document cleared
/// every gate, a numeric code otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReglas {
    Clear,
    Code(u16),
}

impl Serialize for ErrorReglas {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Clear => serializer.serialize_bool(false),
            Self::Code(code) => serializer.serialize_u16(*code),
        }
    }
}

impl<'de> Deserialize<'de> for ErrorReglas {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Bool(false) => Ok(Self::Clear),
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .map(Self::Code)
                .ok_or_else(|| D::Error::custom("error_reglas code out of range")),
            other => Err(D::Error::custom(format!(
                "error_reglas must be false or a numeric code, got {other}"
            ))),
        }
    }
}

/// Stage durations in milliseconds, recorded by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub fetch_ms: u64,
    pub normalize_ms: u64,
    pub compute_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    pub is_rejected: bool,
    pub rejection_reason: Option<RejectionReason>,
    pub rejection_message: Option<String>,
    pub provider: Provider,
    pub worst_rating: Option<String>,
    pub nombre: Option<String>,
    pub periodo_t0: Option<String>,
    pub periodo_t6: Option<String>,
    pub cached: bool,
    pub timings: Timings,
}

/// Full scoring outcome: the score itself, the derived indicators computed
/// regardless of rejection, and the normalized period snapshots for callers
/// that need the underlying exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: i64,
    pub calificacion_minima: Option<String>,
    pub contador: usize,
    pub endeudamiento: f64,
    pub mensaje: String,
    pub error_reglas: ErrorReglas,
    pub metadata: ScoreMetadata,
    pub log_txt: String,
    pub periods: PeriodData,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScoringError {
    #[error("rules carry no intercept")]
    MissingIntercept,
    #[error("coefficient {key} is not finite")]
    NonFiniteCoefficient { key: String },
}

/// Run the rejection gates and, when they clear, the logistic formula.
/// Pure and deterministic: the same document and rules always produce the
/// same result.
pub fn compute_score(
    document: &NormalizedCreditData,
    rules: &ScoringRules,
) -> Result<ScoreResult, ScoringError> {
    let t0 = &document.periods.t0;
    let mut log_lines: Vec<String> = Vec::new();

    let calificacion_minima = worst_rating(
        t0.entities
            .iter()
            .filter_map(|entity| entity.rating.as_deref()),
    );
    let contador = distinct_entity_count(t0);
    let endeudamiento = t0
        .entities
        .iter()
        .map(|entity| entity.vigente + entity.vencido + entity.castigado)
        .sum::<f64>();

    if let Some(reason) = evaluate_gates(document, rules) {
        let mensaje = rejection_message(reason, document.metadata.worst_rating.as_deref());
        log_lines.push(format!("gate: {} ({mensaje})", reason.as_str()));
        return Ok(ScoreResult {
            score: 0,
            calificacion_minima,
            contador,
            endeudamiento,
            mensaje: mensaje.clone(),
            error_reglas: ErrorReglas::Code(reason.legacy_code()),
            metadata: ScoreMetadata {
                is_rejected: true,
                rejection_reason: Some(reason),
                rejection_message: Some(mensaje),
                provider: document.provider,
                worst_rating: document.metadata.worst_rating.clone(),
                nombre: document.metadata.nombre.clone(),
                periodo_t0: document.metadata.periodo_t0.clone(),
                periodo_t6: document.metadata.periodo_t6.clone(),
                cached: false,
                timings: Timings::default(),
            },
            log_txt: log_lines.join("\n"),
            periods: document.periods.clone(),
        });
    }
    log_lines.push("gate: clear".to_string());

    let intercept = *rules
        .binned
        .get("intercept")
        .ok_or(ScoringError::MissingIntercept)?;
    if !intercept.is_finite() {
        return Err(ScoringError::NonFiniteCoefficient {
            key: "intercept".to_string(),
        });
    }
    let mut x = intercept;
    log_lines.push(format!("formula: intercept = {intercept}"));

    for (key, coefficient) in &rules.binned {
        if !coefficient.is_finite() {
            return Err(ScoringError::NonFiniteCoefficient { key: key.clone() });
        }
        let indicator = match parse_coefficient_key(key) {
            CoefficientKey::Intercept => continue,
            CoefficientKey::BancoBinned => bank_entity_count(t0) as f64,
            CoefficientKey::Bucket { period, bucket } => {
                let snapshot = match period {
                    Period::T0 => t0,
                    Period::T6 => &document.periods.t6,
                };
                bucket_indicator(snapshot, bucket)
            }
            CoefficientKey::Unknown => 0.0,
        };
        if indicator != 0.0 {
            let contribution = coefficient * indicator;
            x += contribution;
            log_lines.push(format!("formula: {key} = {coefficient} * {indicator} = {contribution}"));
        }
    }

    let probability = logistic(x);
    let score = scale_score(probability);
    log_lines.push(format!("formula: x = {x}, p = {probability}, score = {score}"));

    Ok(ScoreResult {
        score,
        calificacion_minima,
        contador,
        endeudamiento,
        mensaje: "Score calculado correctamente".to_string(),
        error_reglas: ErrorReglas::Clear,
        metadata: ScoreMetadata {
            is_rejected: false,
            rejection_reason: None,
            rejection_message: None,
            provider: document.provider,
            worst_rating: document.metadata.worst_rating.clone(),
            nombre: document.metadata.nombre.clone(),
            periodo_t0: document.metadata.periodo_t0.clone(),
            periodo_t6: document.metadata.periodo_t6.clone(),
            cached: false,
            timings: Timings::default(),
        },
        log_txt: log_lines.join("\n"),
        periods: document.periods.clone(),
    })
}

/// First matching gate wins; order is fixed.
fn evaluate_gates(document: &NormalizedCreditData, rules: &ScoringRules) -> Option<RejectionReason> {
    let rejection = &rules.rejection;
    if rejection.reject_deceased && document.flags.is_deceased {
        return Some(RejectionReason::Deceased);
    }
    if let Some(rating) = document.metadata.worst_rating.as_deref() {
        if rejection.bad_ratings.contains(&rating.to_uppercase()) {
            return Some(RejectionReason::BadRating);
        }
    }
    let t0 = &document.periods.t0.aggregates;
    if t0.vencido.total() > rejection.max_vencido || t0.castigado.total() > rejection.max_castigado {
        return Some(RejectionReason::OverThreshold);
    }
    if document.periods.t0.is_empty() && document.periods.t6.is_empty() {
        return Some(RejectionReason::NoBcuData);
    }
    None
}

fn rejection_message(reason: RejectionReason, worst_rating: Option<&str>) -> String {
    match reason {
        RejectionReason::Deceased => "Persona registrada como fallecida".to_string(),
        RejectionReason::BadRating => format!(
            "Calificación {} dentro del conjunto de rechazo",
            worst_rating.unwrap_or("desconocida")
        ),
        RejectionReason::OverThreshold => {
            "Endeudamiento vencido o castigado por encima del umbral permitido".to_string()
        }
        RejectionReason::NoBcuData => "Sin datos de endeudamiento en el BCU".to_string(),
    }
}

fn distinct_entity_count(snapshot: &PeriodSnapshot) -> usize {
    snapshot
        .entities
        .iter()
        .map(|entity| crate::bureau::domain::normalize_entity_name(&entity.nombre_entidad))
        .collect::<std::collections::BTreeSet<_>>()
        .len()
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Map the probability onto the legacy 0..=999 integer range.
fn scale_score(probability: f64) -> i64 {
    ((probability * 1_000.0).round() as i64).clamp(0, 999)
}
