use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, info};

use super::{default_rules, validate_rules, RulesError, RulesSource, ScoringRules, RULES_RECORD_ID};

/// Coefficient fields in the dynamic record carry this prefix; the remainder
/// of the field id is the coefficient key (`intercept`, `banco_binned`, ...).
const FIELD_PREFIX: &str = "custrecord_score_";
const FIELD_REJECT_DECEASED: &str = "custrecord_rechazo_fallecido";
const FIELD_BAD_RATINGS: &str = "custrecord_rechazo_calificaciones";
const FIELD_MAX_VENCIDO: &str = "custrecord_max_vencido";
const FIELD_MAX_CASTIGADO: &str = "custrecord_max_castigado";

/// Cached dynamic rules over a pluggable source. The first `get` loads and
/// merges over the hardcoded defaults; later calls are served from the slot
/// until `invalidate_cache`. The load runs outside the lock, so two racing
/// callers may both hit the source; last write wins, which is harmless since
/// both computed the same rules.
pub struct RulesProvider<S> {
    source: S,
    cached: Mutex<Option<Arc<ScoringRules>>>,
}

impl<S: RulesSource> RulesProvider<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Result<Arc<ScoringRules>, RulesError> {
        if let Some(rules) = self.cached.lock().expect("rules cache poisoned").clone() {
            return Ok(rules);
        }

        let rules = Arc::new(self.load()?);
        *self.cached.lock().expect("rules cache poisoned") = Some(rules.clone());
        Ok(rules)
    }

    /// Clear the slot; the next `get` reloads from the source.
    pub fn invalidate_cache(&self) {
        self.cached.lock().expect("rules cache poisoned").take();
        info!("scoring rules cache invalidated");
    }

    fn load(&self) -> Result<ScoringRules, RulesError> {
        let fields = self.source.lookup_fields(RULES_RECORD_ID)?;
        let mut rules = default_rules();

        for (field, value) in fields {
            if let Some(key) = field.strip_prefix(FIELD_PREFIX) {
                let coefficient = coerce_number(&field, &value)?;
                debug!(key, coefficient, "rules override applied");
                rules.binned.insert(key.to_string(), coefficient);
                continue;
            }
            match field.as_str() {
                FIELD_REJECT_DECEASED => {
                    rules.rejection.reject_deceased = coerce_flag(&field, &value)?;
                }
                FIELD_BAD_RATINGS => {
                    rules.rejection.bad_ratings = coerce_string_list(&field, &value)?;
                }
                FIELD_MAX_VENCIDO => {
                    rules.rejection.max_vencido = coerce_number(&field, &value)?;
                }
                FIELD_MAX_CASTIGADO => {
                    rules.rejection.max_castigado = coerce_number(&field, &value)?;
                }
                _ => {}
            }
        }

        validate_rules(&rules)?;
        Ok(rules)
    }
}

/// Unwrap a `[{value, text}]` option wrapper down to its inner value. Scalars
/// pass through untouched.
fn unwrap_option_value(value: &Value) -> &Value {
    match value {
        Value::Array(items) => match items.first() {
            Some(Value::Object(entry)) => entry.get("value").unwrap_or(value),
            Some(first) if items.len() == 1 => first,
            _ => value,
        },
        _ => value,
    }
}

fn coerce_number(field: &str, value: &Value) -> Result<f64, RulesError> {
    let inner = unwrap_option_value(value);
    let parsed = match inner {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| RulesError::Coercion {
            field: field.to_string(),
            detail: format!("expected a number, got {inner}"),
        })
}

fn coerce_flag(field: &str, value: &Value) -> Result<bool, RulesError> {
    let inner = unwrap_option_value(value);
    match inner {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim() {
            "T" | "t" | "true" | "TRUE" => Ok(true),
            "F" | "f" | "false" | "FALSE" => Ok(false),
            other => Err(RulesError::Coercion {
                field: field.to_string(),
                detail: format!("expected a boolean, got {other:?}"),
            }),
        },
        _ => Err(RulesError::Coercion {
            field: field.to_string(),
            detail: format!("expected a boolean, got {inner}"),
        }),
    }
}

fn coerce_string_list(field: &str, value: &Value) -> Result<BTreeSet<String>, RulesError> {
    match value {
        Value::String(s) => Ok(s
            .split(',')
            .map(|item| item.trim().to_uppercase())
            .filter(|item| !item.is_empty())
            .collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| match unwrap_option_value(item) {
                Value::String(s) => Ok(s.trim().to_uppercase()),
                other => Err(RulesError::Coercion {
                    field: field.to_string(),
                    detail: format!("expected a string entry, got {other}"),
                }),
            })
            .collect(),
        other => Err(RulesError::Coercion {
            field: field.to_string(),
            detail: format!("expected a list, got {other}"),
        }),
    }
}
