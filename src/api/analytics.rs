/// View tracking and analytics endpoints
use crate::{
    analytics::{
        AnalyticsPeriod, AnalyticsQuery, ClickOutcome, ToolAnalytics, TrackClickRequest,
        TrackViewRequest, ViewOutcome, Visitor,
    },
    api::middleware::{client_country, client_ip},
    auth::{AuthUser, OptionalAuthUser},
    context::AppContext,
    error::{MarketError, MarketResult},
};
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Path, Query, State},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use axum_extra::{headers::UserAgent, TypedHeader};
use std::net::SocketAddr;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/tools/:id/view", post(track_view))
        .route("/tools/:id/click", post(track_click))
        .route("/tools/:id/analytics", get(tool_analytics))
}

#[async_trait]
impl FromRequestParts<AppContext> for Visitor {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAuthUser(user) = OptionalAuthUser::from_request_parts(parts, state).await?;

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let user_agent = TypedHeader::<UserAgent>::from_request_parts(parts, state)
            .await
            .map(|TypedHeader(agent)| agent.as_str().to_string())
            .unwrap_or_default();

        Ok(Visitor {
            user,
            ip: client_ip(&parts.headers, peer),
            user_agent,
            country: client_country(&parts.headers),
        })
    }
}

/// Always answers with a success shape unless the tool is unknown
async fn track_view(
    State(ctx): State<AppContext>,
    visitor: Visitor,
    Path(tool_id): Path<String>,
    body: Option<Json<TrackViewRequest>>,
) -> MarketResult<Json<ViewOutcome>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        ctx.analytics.track_view(&tool_id, &visitor, request).await?,
    ))
}

async fn track_click(
    State(ctx): State<AppContext>,
    visitor: Visitor,
    Path(tool_id): Path<String>,
    body: Option<Json<TrackClickRequest>>,
) -> MarketResult<Json<ClickOutcome>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(
        ctx.analytics.track_click(&tool_id, &visitor, request).await?,
    ))
}

async fn tool_analytics(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path(tool_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> MarketResult<Json<ToolAnalytics>> {
    let period = AnalyticsPeriod::parse(query.period.as_deref());
    Ok(Json(ctx.analytics.report(&user, &tool_id, period).await?))
}
