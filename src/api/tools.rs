/// Tool catalogue endpoints
use crate::{
    api::upload::FormData,
    auth::AuthUser,
    context::AppContext,
    db::tool::Tool,
    error::{MarketError, MarketResult},
    media::{MediaUpload, UploadedFile, LOGO_FOLDER, MAX_SUBMISSION_FILES},
    tools::{parse_tags, parse_visual, NewTool, RateRequest, RatingOutcome, Suggestion, ToolUpdate},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/tools", get(list_tools).post(submit_tool))
        .route("/tools/featured", get(featured_tools))
        .route("/tools/search", get(search_tools))
        .route("/tools/search/suggestions", get(search_suggestions))
        .route("/tools/my-tools", get(my_tools))
        .route("/tools/slug/:slug", get(get_tool_by_slug))
        .route("/tools/:id", get(get_tool).put(update_tool))
        .route("/tools/:id/rate", post(rate_tool))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn list_tools(State(ctx): State<AppContext>) -> MarketResult<Json<Vec<Tool>>> {
    Ok(Json(ctx.tools.list_approved().await?))
}

async fn featured_tools(State(ctx): State<AppContext>) -> MarketResult<Json<Vec<Tool>>> {
    Ok(Json(ctx.tools.featured().await?))
}

async fn search_tools(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> MarketResult<Json<Vec<Tool>>> {
    Ok(Json(ctx.tools.search(&query.q).await?))
}

async fn search_suggestions(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> MarketResult<Json<Vec<Suggestion>>> {
    Ok(Json(ctx.tools.suggestions(&query.q).await?))
}

async fn my_tools(State(ctx): State<AppContext>, user: AuthUser) -> MarketResult<Json<Vec<Tool>>> {
    Ok(Json(ctx.tools.my_tools(&user.user_id).await?))
}

async fn get_tool(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> MarketResult<Json<Tool>> {
    Ok(Json(ctx.tools.get_public(&id).await?))
}

async fn get_tool_by_slug(
    State(ctx): State<AppContext>,
    Path(slug): Path<String>,
) -> MarketResult<Json<Tool>> {
    Ok(Json(ctx.tools.get_by_slug(&slug).await?))
}

/// Multipart submission: tool fields, optional `toolLogo`, up to 10 `mediaFiles`
async fn submit_tool(
    State(ctx): State<AppContext>,
    user: AuthUser,
    multipart: Multipart,
) -> MarketResult<(StatusCode, Json<Tool>)> {
    let mut form = FormData::collect(multipart).await?;

    let media_files = form.take_files("mediaFiles");
    if media_files.len() > MAX_SUBMISSION_FILES {
        return Err(MarketError::Validation(format!(
            "At most {} media files per submission",
            MAX_SUBMISSION_FILES
        )));
    }

    let required = |field: &str| {
        form.text(field)
            .ok_or_else(|| MarketError::Validation("Please fill all required fields".to_string()))
    };

    let mut submission = NewTool {
        name: required("name")?,
        tagline: required("tagline")?,
        description: required("description")?,
        website_url: required("websiteUrl")?,
        app_store_url: form.text("appStoreUrl"),
        play_store_url: form.text("playStoreUrl"),
        tags: form.text("tags").map(|t| parse_tags(&t)).unwrap_or_default(),
        visual: form.text("visual").and_then(|v| parse_visual(&v)),
        logo_url: String::new(),
    };

    if let Some(logo) = form.take_file("toolLogo") {
        submission.logo_url = store_logo(&ctx, logo).await?;
    }

    let tool = ctx.tools.create(&user, submission).await?;

    if media_files.is_empty() {
        return Ok((StatusCode::CREATED, Json(tool)));
    }

    for file in media_files {
        if let Err(e) = ctx
            .media
            .upload(&user, &tool.id, MediaUpload::default(), file)
            .await
        {
            warn!("Submission media for tool {} rejected: {}", tool.id, e);
        }
    }

    Ok((StatusCode::CREATED, Json(ctx.tools.require(&tool.id).await?)))
}

/// Owner edit; absent fields keep their value, `toolLogo` replaces the logo
async fn update_tool(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> MarketResult<Json<Tool>> {
    let mut form = FormData::collect(multipart).await?;

    let mut update = ToolUpdate {
        name: form.text("name"),
        tagline: form.text("tagline"),
        description: form.text("description"),
        website_url: form.text("websiteUrl"),
        app_store_url: form.text("appStoreUrl"),
        play_store_url: form.text("playStoreUrl"),
        tags: form.text("tags").map(|t| parse_tags(&t)),
        visual: form.text("visual").and_then(|v| parse_visual(&v)),
        logo_url: None,
    };

    if let Some(logo) = form.take_file("toolLogo") {
        let existing = ctx.tools.require(&id).await?;
        if existing.submitted_by != user.user_id {
            return Err(MarketError::Forbidden(
                "Tool not found or user not authorized".to_string(),
            ));
        }
        update.logo_url = Some(store_logo(&ctx, logo).await?);
    }

    Ok(Json(ctx.tools.update(&user, &id, update).await?))
}

async fn rate_tool(
    State(ctx): State<AppContext>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<RateRequest>,
) -> MarketResult<Json<RatingOutcome>> {
    Ok(Json(ctx.tools.rate(&user, &id, request.rating).await?))
}

/// Store an uploaded logo image and return its URL
pub(crate) async fn store_logo(ctx: &AppContext, file: UploadedFile) -> MarketResult<String> {
    if !file.content_type.starts_with("image/") {
        return Err(MarketError::Validation("Logo must be an image".to_string()));
    }

    let stored = ctx
        .media_storage
        .store(file.data, &file.content_type, LOGO_FOLDER)
        .await?;
    Ok(stored.url)
}
