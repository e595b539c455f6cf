/// Profile endpoints
use crate::{
    account::{AccountResponse, ProfileUpdate},
    api::{tools::store_logo, upload::FormData},
    auth::AuthUser,
    context::AppContext,
    error::MarketResult,
};
use axum::{
    extract::{Multipart, State},
    routing::get,
    Json, Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/users/profile", get(get_profile).put(update_profile))
}

async fn get_profile(
    State(ctx): State<AppContext>,
    user: AuthUser,
) -> MarketResult<Json<AccountResponse>> {
    Ok(Json(ctx.accounts.profile(&user.user_id).await?))
}

/// Multipart update of company name, email and an optional `companyLogo`
async fn update_profile(
    State(ctx): State<AppContext>,
    user: AuthUser,
    multipart: Multipart,
) -> MarketResult<Json<AccountResponse>> {
    let mut form = FormData::collect(multipart).await?;

    let company_logo_url = match form.take_file("companyLogo") {
        Some(logo) => Some(store_logo(&ctx, logo).await?),
        None => None,
    };

    let update = ProfileUpdate {
        company_name: form.text("companyName"),
        email: form.text("email"),
        company_logo_url,
    };

    Ok(Json(ctx.accounts.update_profile(&user.user_id, update).await?))
}
