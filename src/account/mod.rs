/// Account management
///
/// Handles sign-up, password and Google sign-in, and profile updates.

pub mod google;
mod manager;
pub mod password;

pub use google::{ExternalIdentity, GoogleTokenInfo, IdentityVerifier};
pub use manager::AccountManager;

use crate::db::user::{Role, User};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sign-up request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100, message = "Company name is required"))]
    pub company_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Profile update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub company_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(skip)]
    pub company_logo_url: Option<String>,
}

/// Account details returned by auth and profile endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub company_name: String,
    pub email: String,
    pub role: Role,
    pub company_logo_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AccountResponse {
    pub fn from_user(user: User, token: Option<String>) -> Self {
        Self {
            id: user.id,
            company_name: user.company_name,
            email: user.email,
            role: user.role,
            company_logo_url: user.company_logo_url,
            token,
        }
    }
}

/// Identity held between Google verification and account creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSignup {
    pub email: String,
    pub name: String,
    pub picture: String,
}

/// Outcome of verifying a Google ID token
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GoogleSignIn {
    /// Known email: signed in
    Existing(AccountResponse),
    /// Unknown email: account creation must be completed with a company name
    #[serde(rename_all = "camelCase")]
    Pending {
        needs_account: bool,
        pending_token: String,
        email: String,
        name: String,
    },
}

/// Completes a pending Google sign-up
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoogleAccountRequest {
    #[validate(length(min = 1, message = "Pending token is required"))]
    pub pending_token: String,
    #[validate(length(min = 1, max = 100, message = "Company name is required"))]
    pub company_name: String,
}

/// Google ID token submitted by the client
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GoogleVerifyRequest {
    #[validate(length(min = 1, message = "Google credential is required"))]
    pub credential: String,
}
