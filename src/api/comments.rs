/// Comment thread endpoints
use crate::{
    auth::{AuthUser, OptionalAuthUser},
    comments::{
        CommentPage, CommentQuery, CommentView, EditComment, NewComment, ReportOutcome,
        ReportRequest, VoteOutcome, VoteRequest,
    },
    context::AppContext,
    error::MarketResult,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/tools/:id/comments", get(list_comments).post(create_comment))
        .route(
            "/tools/:id/comments/:comment_id",
            put(edit_comment).delete(delete_comment),
        )
        .route("/tools/:id/comments/:comment_id/vote", post(vote_comment))
        .route("/tools/:id/comments/:comment_id/report", post(report_comment))
}

async fn list_comments(
    State(ctx): State<AppContext>,
    OptionalAuthUser(viewer): OptionalAuthUser,
    Path(tool_id): Path<String>,
    Query(query): Query<CommentQuery>,
) -> MarketResult<Json<CommentPage>> {
    let page = ctx.comments.list(&tool_id, viewer.as_ref(), &query).await?;
    Ok(Json(page))
}

async fn create_comment(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path(tool_id): Path<String>,
    Json(request): Json<NewComment>,
) -> MarketResult<(StatusCode, Json<CommentView>)> {
    let comment = ctx.comments.create(&user, &tool_id, request).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn edit_comment(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path((tool_id, comment_id)): Path<(String, String)>,
    Json(request): Json<EditComment>,
) -> MarketResult<Json<CommentView>> {
    let comment = ctx
        .comments
        .edit(&user, &tool_id, &comment_id, &request.content)
        .await?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path((tool_id, comment_id)): Path<(String, String)>,
) -> MarketResult<Json<Value>> {
    ctx.comments.delete(&user, &tool_id, &comment_id).await?;
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}

async fn vote_comment(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path((tool_id, comment_id)): Path<(String, String)>,
    Json(request): Json<VoteRequest>,
) -> MarketResult<Json<VoteOutcome>> {
    let outcome = ctx
        .comments
        .vote(&user, &tool_id, &comment_id, &request.vote_type)
        .await?;
    Ok(Json(outcome))
}

async fn report_comment(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path((tool_id, comment_id)): Path<(String, String)>,
    Json(request): Json<ReportRequest>,
) -> MarketResult<Json<ReportOutcome>> {
    let outcome = ctx
        .comments
        .report(&user, &tool_id, &comment_id, request)
        .await?;
    Ok(Json(outcome))
}
