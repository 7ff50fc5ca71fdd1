use std::collections::BTreeMap;

use serde_json::Value;

/// Record id of the scoring parameter record in the dynamic source.
pub const RULES_RECORD_ID: &str = "1";

#[derive(Debug, thiserror::Error)]
pub enum RulesSourceError {
    #[error("rules source unavailable: {0}")]
    Unavailable(String),
}

/// Dynamic rules backend. Returns the raw field map of one configuration
/// record; values may be scalars, numeric strings, or `[{value, text}]`
/// option wrappers, and coercion happens at the provider layer.
pub trait RulesSource: Send + Sync + 'static {
    fn lookup_fields(&self, record_id: &str) -> Result<BTreeMap<String, Value>, RulesSourceError>;
}
