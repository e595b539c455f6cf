/// Liveness, readiness and component health endpoints
///
/// The database is required to serve traffic. The read cache and media
/// directory only degrade the service when they fail.

use crate::{
    context::AppContext,
    error::{MarketError, MarketResult},
    metrics,
};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Overall health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy", "degraded" or "unhealthy"
    pub status: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: Vec<ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health of one dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    /// Build a component report from a check result; failures get `failed_status`
    fn from_check(
        name: &str,
        started: Instant,
        result: MarketResult<()>,
        failed_status: &str,
        details: serde_json::Value,
    ) -> Self {
        let response_time_ms = Some(started.elapsed().as_millis() as u64);
        match result {
            Ok(()) => ComponentHealth {
                name: name.to_string(),
                status: "healthy".to_string(),
                response_time_ms,
                error: None,
                details: Some(details),
            },
            Err(e) => ComponentHealth {
                name: name.to_string(),
                status: failed_status.to_string(),
                response_time_ms,
                error: Some(e.to_string()),
                details: None,
            },
        }
    }
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/health/detailed", get(health_detailed))
}

pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 503 until the database answers
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Err(e) = check_database(&ctx).await {
        tracing::warn!(error = %e, "readiness_probe_failed: database check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

pub async fn health_detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let start = Instant::now();

    let started = Instant::now();
    let database = ComponentHealth::from_check(
        "database",
        started,
        check_database(&ctx).await,
        "unhealthy",
        serde_json::json!({ "type": "sqlite", "pool_size": ctx.db.size() }),
    );

    let started = Instant::now();
    let cache = ComponentHealth::from_check(
        "cache",
        started,
        ctx.cache.ping().await,
        "degraded",
        serde_json::json!({ "backend": ctx.cache.backend_name() }),
    );

    let started = Instant::now();
    let media = ComponentHealth::from_check(
        "media_storage",
        started,
        check_media_directory(&ctx).await,
        "degraded",
        serde_json::json!({ "type": "disk" }),
    );

    let checks = vec![database, cache, media];
    let overall_status = determine_overall_status(&checks);

    let health = HealthStatus {
        status: overall_status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: metrics::update_uptime(),
        checks,
        message: if overall_status == "healthy" {
            None
        } else {
            Some("One or more components are unhealthy".to_string())
        },
    };

    let status_code = match overall_status.as_str() {
        "unhealthy" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    tracing::info!(
        status = %overall_status,
        duration_ms = start.elapsed().as_millis(),
        "health_check_completed"
    );

    (status_code, Json(health))
}

async fn check_database(ctx: &AppContext) -> MarketResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

async fn check_media_directory(ctx: &AppContext) -> MarketResult<()> {
    let dir = &ctx.config.storage.media_directory;
    let metadata = tokio::fs::metadata(dir).await?;
    if !metadata.is_dir() {
        return Err(MarketError::Internal(format!("{:?} is not a directory", dir)));
    }
    Ok(())
}

fn determine_overall_status(checks: &[ComponentHealth]) -> String {
    if checks.iter().any(|c| c.status == "unhealthy") {
        "unhealthy".to_string()
    } else if checks.iter().any(|c| c.status == "degraded") {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, status: &str) -> ComponentHealth {
        ComponentHealth {
            name: name.to_string(),
            status: status.to_string(),
            response_time_ms: Some(1),
            error: None,
            details: None,
        }
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(
            determine_overall_status(&[component("database", "healthy"), component("cache", "healthy")]),
            "healthy"
        );
        assert_eq!(
            determine_overall_status(&[component("database", "healthy"), component("cache", "degraded")]),
            "degraded"
        );
        assert_eq!(
            determine_overall_status(&[component("database", "unhealthy"), component("cache", "degraded")]),
            "unhealthy"
        );
    }

    #[test]
    fn test_failed_check_reports_error() {
        let health = ComponentHealth::from_check(
            "cache",
            Instant::now(),
            Err(MarketError::UpstreamUnavailable("redis down".to_string())),
            "degraded",
            serde_json::Value::Null,
        );

        assert_eq!(health.status, "degraded");
        assert!(health.error.unwrap_or_default().contains("redis down"));
        assert!(health.details.is_none());
    }
}
