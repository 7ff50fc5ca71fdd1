mod provider;
mod source;

pub use provider::RulesProvider;
pub use source::{RulesSource, RulesSourceError, RULES_RECORD_ID};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Hard gates evaluated before any formula work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRules {
    pub reject_deceased: bool,
    /// Ratings that reject outright, compared uppercased.
    pub bad_ratings: BTreeSet<String>,
    /// Maximum tolerated overdue exposure (mn + me), inclusive.
    pub max_vencido: f64,
    /// Maximum tolerated written-off exposure (mn + me), inclusive.
    pub max_castigado: f64,
}

/// Full rule set: rejection gates plus the WOE-binned coefficient table fed
/// into the logistic formula. Coefficient keys follow the
/// `{periodo}_{bucket}_binned` convention, with `intercept` and
/// `banco_binned` as the two specials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub rejection: RejectionRules,
    pub binned: BTreeMap<String, f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error(transparent)]
    Source(#[from] RulesSourceError),
    #[error("rules field {field}: {detail}")]
    Coercion { field: String, detail: String },
    #[error("invalid rules: {0}")]
    Invalid(String),
}

/// Hardcoded fallback used when the dynamic source carries no override for a
/// given field. Values mirror the last calibrated model.
pub fn default_rules() -> ScoringRules {
    let binned = BTreeMap::from([
        ("intercept".to_string(), -0.8690),
        ("banco_binned".to_string(), 0.3127),
        ("t0_santa_binned".to_string(), 0.4872),
        ("t6_santa_binned".to_string(), 0.2214),
        ("t0_oca_binned".to_string(), 0.1986),
        ("t6_oca_binned".to_string(), 0.1342),
        ("t0_brou_binned".to_string(), 0.2551),
        ("t0_creditel_binned".to_string(), -0.3185),
        ("t0_pronto_binned".to_string(), -0.4106),
    ]);

    ScoringRules {
        rejection: RejectionRules {
            reject_deceased: true,
            bad_ratings: ["3", "4", "5", "6"].iter().map(|s| s.to_string()).collect(),
            max_vencido: 5_000.0,
            max_castigado: 0.0,
        },
        binned,
    }
}

/// Structural sanity checks applied after every load.
pub fn validate_rules(rules: &ScoringRules) -> Result<(), RulesError> {
    let intercept = rules
        .binned
        .get("intercept")
        .ok_or_else(|| RulesError::Invalid("binned.intercept is missing".to_string()))?;
    if !intercept.is_finite() {
        return Err(RulesError::Invalid("binned.intercept is not finite".to_string()));
    }
    for (key, value) in &rules.binned {
        if !value.is_finite() {
            return Err(RulesError::Invalid(format!("binned.{key} is not finite")));
        }
    }
    if rules.rejection.max_vencido < 0.0 || rules.rejection.max_castigado < 0.0 {
        return Err(RulesError::Invalid(
            "rejection thresholds must be non-negative".to_string(),
        ));
    }
    if rules.rejection.bad_ratings.is_empty() {
        return Err(RulesError::Invalid(
            "bad_ratings must not be empty while rating rejection is in force".to_string(),
        ));
    }
    Ok(())
}
