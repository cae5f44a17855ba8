//! HTTP handlers module.
//!
//! Provides HTTP endpoints for recommendations and pool inspection.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::models::{ErrorResponse, HealthResponse, MatchQuery, MatchResponse, PoolResponse};
use crate::services::MatchingService;
use crate::store::MemoryProfileStore;

/// Application state shared across handlers.
pub struct AppState {
    pub matching: Arc<MatchingService>,
    pub store: Arc<MemoryProfileStore>,
    pub config: Config,
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "matchwise".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        encoder: state.config.encoder.clone(),
        dimension: state.config.embedding_dimension,
        profiles: state.store.len(),
        endpoints: vec![
            "/health".to_string(),
            "/recommendations/:user_id".to_string(),
            "/recommendations/:user_id/pool".to_string(),
        ],
    })
}

/// Ranked recommendations for a user.
pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<MatchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let limit = effective_limit(&state.config, query.limit);
    info!(user = %user_id, limit, within_km = ?query.within_km, "Recommendation request");

    let result = match query.within_km {
        Some(km) => state.matching.recommend_near(&user_id, limit, km).await,
        None => state.matching.recommend(&user_id, limit).await,
    };

    match result {
        Ok(matches) => Ok(Json(MatchResponse {
            user_id,
            count: matches.len(),
            matches,
        })),
        Err(e) => {
            error!(user = %user_id, "Recommendation failed: {}", e);
            Err(error_response(e))
        }
    }
}

/// The unranked eligible pool for a user.
pub async fn eligible_pool(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<PoolResponse>, (StatusCode, Json<ErrorResponse>)> {
    let limit = effective_limit(&state.config, query.limit);

    match state.matching.eligible_pool(&user_id, limit).await {
        Ok(candidates) => Ok(Json(PoolResponse {
            user_id,
            count: candidates.len(),
            candidates,
        })),
        Err(e) => {
            error!(user = %user_id, "Pool lookup failed: {}", e);
            Err(error_response(e))
        }
    }
}

fn effective_limit(config: &Config, requested: Option<usize>) -> usize {
    requested
        .unwrap_or(config.default_limit)
        .clamp(1, config.max_limit)
}

fn error_response(e: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    let message = e.to_string();
    if message.contains("Profile not found") {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: message,
                code: Some("PROFILE_NOT_FOUND".to_string()),
            }),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: message,
                code: Some("MATCHING_FAILED".to_string()),
            }),
        )
    }
}
