pub mod cache;
pub mod domain;
pub mod legacy;
pub mod normalizer;
pub mod providers;
pub mod router;
pub mod rules;
pub mod scoring;
pub mod service;

pub use cache::{InMemoryScoreCache, ScoreCache};
pub use domain::{
    EntityExposure, NormalizedCreditData, PeriodData, PeriodSnapshot, Provider, RubroLine,
    RATING_ORDER,
};
pub use legacy::{to_legacy, LegacyScoreResponse};
pub use providers::{FetchOptions, HttpTransport, ProviderError, RawProviderResponse};
pub use router::score_router;
pub use rules::{default_rules, RulesProvider, RulesSource, ScoringRules};
pub use scoring::{compute_score, ErrorReglas, RejectionReason, ScoreResult};
pub use service::{ScoreOptions, ScoreService};
