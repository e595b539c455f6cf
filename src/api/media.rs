/// Tool media endpoints
use crate::{
    api::upload::FormData,
    auth::AuthUser,
    context::AppContext,
    db::media::Media,
    error::{MarketError, MarketResult},
    media::{MediaFilter, MediaUpdate, MediaUpload},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/tools/:id/media", get(list_media).post(upload_media))
        .route(
            "/tools/:id/media/:media_id",
            put(update_media).delete(delete_media),
        )
}

async fn list_media(
    State(ctx): State<AppContext>,
    Path(tool_id): Path<String>,
    Query(filter): Query<MediaFilter>,
) -> MarketResult<Json<Vec<Media>>> {
    Ok(Json(ctx.media.list(&tool_id, &filter).await?))
}

/// Multipart upload of a single `media` file with optional descriptive fields
async fn upload_media(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path(tool_id): Path<String>,
    multipart: Multipart,
) -> MarketResult<(StatusCode, Json<Media>)> {
    let mut form = FormData::collect(multipart).await?;

    let file = form
        .take_file("media")
        .ok_or_else(|| MarketError::Validation("No file uploaded".to_string()))?;

    let upload = MediaUpload {
        category: form.text("category"),
        title: form.text("title"),
        description: form.text("description"),
        order: form.integer("order"),
    };

    let media = ctx.media.upload(&user, &tool_id, upload, file).await?;
    Ok((StatusCode::CREATED, Json(media)))
}

async fn update_media(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path((tool_id, media_id)): Path<(String, String)>,
    Json(update): Json<MediaUpdate>,
) -> MarketResult<Json<Media>> {
    Ok(Json(ctx.media.update(&user, &tool_id, &media_id, update).await?))
}

async fn delete_media(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path((tool_id, media_id)): Path<(String, String)>,
) -> MarketResult<Json<Value>> {
    ctx.media.delete(&user, &tool_id, &media_id).await?;
    Ok(Json(json!({ "message": "Media deleted successfully" })))
}
