/// Sign-up, login and Google sign-in endpoints
use crate::{
    account::{
        AccountResponse, CreateGoogleAccountRequest, GoogleSignIn, GoogleVerifyRequest,
        LoginRequest, SignupRequest,
    },
    context::AppContext,
    error::MarketResult,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/google/verify", post(google_verify))
        .route("/auth/google/create-account", post(google_create_account))
}

async fn signup(
    State(ctx): State<AppContext>,
    Json(request): Json<SignupRequest>,
) -> MarketResult<(StatusCode, Json<AccountResponse>)> {
    let account = ctx.accounts.signup(request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn login(
    State(ctx): State<AppContext>,
    Json(request): Json<LoginRequest>,
) -> MarketResult<Json<AccountResponse>> {
    Ok(Json(ctx.accounts.login(request).await?))
}

async fn admin_login(
    State(ctx): State<AppContext>,
    Json(request): Json<LoginRequest>,
) -> MarketResult<Json<AccountResponse>> {
    Ok(Json(ctx.accounts.admin_login(request).await?))
}

async fn google_verify(
    State(ctx): State<AppContext>,
    Json(request): Json<GoogleVerifyRequest>,
) -> MarketResult<Json<GoogleSignIn>> {
    request.validate()?;
    Ok(Json(ctx.accounts.google_verify(&request.credential).await?))
}

async fn google_create_account(
    State(ctx): State<AppContext>,
    Json(request): Json<CreateGoogleAccountRequest>,
) -> MarketResult<(StatusCode, Json<AccountResponse>)> {
    let account = ctx.accounts.google_create_account(request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}
