use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::bureau::cache::ScoreCache;
use crate::bureau::domain::Provider;
use crate::bureau::providers::HttpTransport;
use crate::bureau::rules::RulesSource;
use crate::bureau::service::{ScoreOptions, ScoreService};

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub documento: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub sandbox: Option<bool>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub debug: bool,
}

impl ScoreRequest {
    fn options(&self) -> Result<ScoreOptions, Response> {
        let provider = match self.provider.as_deref() {
            None => Provider::Equifax,
            Some(tag) => Provider::from_tag(tag).ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("unknown provider: {tag}") })),
                )
                    .into_response()
            })?,
        };
        Ok(ScoreOptions {
            provider,
            force_refresh: self.force_refresh,
            sandbox: self.sandbox,
            timeout_ms: self.timeout_ms,
            debug: self.debug,
        })
    }
}

/// Scoring routes, mounted by the API binary alongside its own
/// health/metrics surface.
pub fn score_router<T, S, C>(service: Arc<ScoreService<T, S, C>>) -> Router
where
    T: HttpTransport,
    S: RulesSource,
    C: ScoreCache,
{
    Router::new()
        .route("/api/v1/score", post(score::<T, S, C>))
        .route("/api/v1/score/legacy", post(score_legacy::<T, S, C>))
        .route("/api/v1/rules/reload", post(reload_rules::<T, S, C>))
        .route("/api/v1/token/invalidate", post(invalidate_token::<T, S, C>))
        .with_state(service)
}

async fn score<T, S, C>(
    State(service): State<Arc<ScoreService<T, S, C>>>,
    Json(request): Json<ScoreRequest>,
) -> Response
where
    T: HttpTransport,
    S: RulesSource,
    C: ScoreCache,
{
    match request.options() {
        Ok(options) => {
            let result = service.calculate_score(&request.documento, options).await;
            Json(result).into_response()
        }
        Err(response) => response,
    }
}

async fn score_legacy<T, S, C>(
    State(service): State<Arc<ScoreService<T, S, C>>>,
    Json(request): Json<ScoreRequest>,
) -> Response
where
    T: HttpTransport,
    S: RulesSource,
    C: ScoreCache,
{
    match request.options() {
        Ok(options) => {
            let legacy = service.score_final(&request.documento, options).await;
            Json(legacy).into_response()
        }
        Err(response) => response,
    }
}

async fn reload_rules<T, S, C>(State(service): State<Arc<ScoreService<T, S, C>>>) -> Response
where
    T: HttpTransport,
    S: RulesSource,
    C: ScoreCache,
{
    service.invalidate_rules_cache();
    info!("rules reload requested");
    Json(json!({ "status": "reloaded" })).into_response()
}

async fn invalidate_token<T, S, C>(State(service): State<Arc<ScoreService<T, S, C>>>) -> Response
where
    T: HttpTransport,
    S: RulesSource,
    C: ScoreCache,
{
    service.invalidate_equifax_token();
    info!("token invalidation requested");
    Json(json!({ "status": "invalidated" })).into_response()
}
