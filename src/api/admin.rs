/// Admin API endpoints: dashboard figures, tool and comment moderation
use crate::{
    admin::AdminStats,
    auth::AdminUser,
    comments::{ModerateRequest, ModerationView},
    context::AppContext,
    db::tool::{Tool, ToolStatus},
    error::MarketResult,
    tools::ToolModeration,
};
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/stats", get(get_stats))
        // Tool queues
        .route("/admin/tools/pending", get(pending_tools))
        .route("/admin/tools/approved", get(approved_tools))
        .route("/admin/tools/rejected", get(rejected_tools))
        .route("/admin/tools/all", get(all_tools))
        .route("/admin/tools/:id", put(moderate_tool).delete(delete_tool))
        // Comment moderation
        .route("/admin/comments/reported", get(reported_comments))
        .route("/admin/comments/:comment_id", get(comment_detail))
        .route("/admin/comments/:comment_id/moderate", put(moderate_comment))
}

async fn get_stats(State(ctx): State<AppContext>, _admin: AdminUser) -> MarketResult<Json<AdminStats>> {
    Ok(Json(ctx.admin.stats().await?))
}

async fn pending_tools(State(ctx): State<AppContext>, _admin: AdminUser) -> MarketResult<Json<Vec<Tool>>> {
    Ok(Json(ctx.tools.list_by_status(Some(ToolStatus::Pending)).await?))
}

async fn approved_tools(State(ctx): State<AppContext>, _admin: AdminUser) -> MarketResult<Json<Vec<Tool>>> {
    Ok(Json(ctx.tools.list_by_status(Some(ToolStatus::Approved)).await?))
}

async fn rejected_tools(State(ctx): State<AppContext>, _admin: AdminUser) -> MarketResult<Json<Vec<Tool>>> {
    Ok(Json(ctx.tools.list_by_status(Some(ToolStatus::Rejected)).await?))
}

async fn all_tools(State(ctx): State<AppContext>, _admin: AdminUser) -> MarketResult<Json<Vec<Tool>>> {
    Ok(Json(ctx.tools.list_by_status(None).await?))
}

async fn moderate_tool(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(decision): Json<ToolModeration>,
) -> MarketResult<Json<Tool>> {
    let tool = ctx.tools.moderate(&id, decision).await?;
    info!("Admin {} set tool {} to {}", admin.user_id, id, tool.status);
    Ok(Json(tool))
}

async fn delete_tool(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> MarketResult<Json<Value>> {
    ctx.tools.delete(&id).await?;
    info!("Admin {} removed tool {}", admin.user_id, id);
    Ok(Json(json!({ "message": "Tool removed" })))
}

async fn reported_comments(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
) -> MarketResult<Json<Vec<ModerationView>>> {
    Ok(Json(ctx.comments.reported().await?))
}

async fn comment_detail(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(comment_id): Path<String>,
) -> MarketResult<Json<ModerationView>> {
    Ok(Json(ctx.comments.detail(&comment_id).await?))
}

async fn moderate_comment(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(comment_id): Path<String>,
    Json(request): Json<ModerateRequest>,
) -> MarketResult<Json<ModerationView>> {
    let comment = ctx.comments.moderate(&comment_id, &request.status).await?;
    info!(
        "Admin {} moderated comment {} to {}",
        admin.user_id, comment_id, request.status
    );
    Ok(Json(comment))
}
