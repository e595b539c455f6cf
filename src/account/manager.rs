/// Account manager using runtime queries
use crate::{
    account::{
        password, AccountResponse, CreateGoogleAccountRequest, GoogleSignIn, IdentityVerifier,
        LoginRequest, PendingSignup, ProfileUpdate, SignupRequest,
    },
    auth::TokenAuthority,
    cache::{keys, Cache},
    db::{
        self,
        tool::Source,
        user::{Role, User, USER_COLUMNS},
    },
    error::{MarketError, MarketResult},
    metrics,
};
use chrono::Utc;
use rand::RngCore;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    cache: Cache,
    tokens: TokenAuthority,
    identity: Arc<dyn IdentityVerifier>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AccountManager {
    pub fn new(
        db: SqlitePool,
        cache: Cache,
        tokens: TokenAuthority,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            db,
            cache,
            tokens,
            identity,
        }
    }

    pub async fn find_by_id(&self, id: &str) -> MarketResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(User::from_row).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> MarketResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            USER_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(User::from_row).transpose()
    }

    async fn insert_user(
        &self,
        company_name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        company_logo_url: &str,
    ) -> MarketResult<User> {
        let id = db::new_id();
        let now = Utc::now();
        let email = normalize_email(email);

        sqlx::query(
            "INSERT INTO users (id, company_name, email, password_hash, role, company_logo_url, source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        )
        .bind(&id)
        .bind(company_name.trim())
        .bind(&email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(company_logo_url)
        .bind(Source::Listed.as_str())
        .bind(db::timestamp(now))
        .execute(&self.db)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                MarketError::DuplicateAction("User already exists".to_string())
            } else {
                MarketError::Database(e)
            }
        })?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| MarketError::Internal("Inserted user vanished".to_string()))
    }

    fn signed_in(&self, user: User) -> MarketResult<AccountResponse> {
        let token = self.tokens.issue(&user.id, user.role)?;
        Ok(AccountResponse::from_user(user, Some(token)))
    }

    /// Register a new user
    pub async fn signup(&self, request: SignupRequest) -> MarketResult<AccountResponse> {
        request.validate()?;

        if self.find_by_email(&request.email).await?.is_some() {
            return Err(MarketError::DuplicateAction(
                "User already exists".to_string(),
            ));
        }

        let password_hash = password::hash(&request.password)?;
        let user = self
            .insert_user(
                &request.company_name,
                &request.email,
                &password_hash,
                Role::User,
                "",
            )
            .await?;

        info!("Registered user {} ({})", user.id, user.email);
        metrics::record_account_creation("password");

        self.signed_in(user)
    }

    async fn check_credentials(&self, request: &LoginRequest) -> MarketResult<Option<User>> {
        request.validate()?;

        let Some(user) = self.find_by_email(&request.email).await? else {
            return Ok(None);
        };

        if password::verify(&request.password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Authenticate with email and password
    pub async fn login(&self, request: LoginRequest) -> MarketResult<AccountResponse> {
        let user = self
            .check_credentials(&request)
            .await?
            .ok_or_else(|| MarketError::Authentication("Invalid email or password".to_string()))?;

        self.signed_in(user)
    }

    /// Authenticate an admin; regular users are rejected like bad credentials
    pub async fn admin_login(&self, request: LoginRequest) -> MarketResult<AccountResponse> {
        let user = self
            .check_credentials(&request)
            .await?
            .filter(User::is_admin)
            .ok_or_else(|| {
                MarketError::Authentication("Not authorized as an admin".to_string())
            })?;

        info!("Admin {} signed in", user.id);
        self.signed_in(user)
    }

    pub async fn profile(&self, user_id: &str) -> MarketResult<AccountResponse> {
        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("User not found".to_string()))?;

        Ok(AccountResponse::from_user(user, None))
    }

    /// Update company name, email or logo
    pub async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> MarketResult<AccountResponse> {
        update.validate()?;

        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("User not found".to_string()))?;

        let company_name = update
            .company_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(user.company_name);
        let email = update
            .email
            .map(|s| normalize_email(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or(user.email);
        let logo = update.company_logo_url.unwrap_or(user.company_logo_url);

        sqlx::query(
            "UPDATE users SET company_name = ?2, email = ?3, company_logo_url = ?4, updated_at = ?5
             WHERE id = ?1",
        )
        .bind(user_id)
        .bind(&company_name)
        .bind(&email)
        .bind(&logo)
        .bind(db::timestamp(Utc::now()))
        .execute(&self.db)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                MarketError::DuplicateAction("Email already in use".to_string())
            } else {
                MarketError::Database(e)
            }
        })?;

        self.profile(user_id).await
    }

    /// Verify a Google ID token; unknown emails get a pending sign-up
    pub async fn google_verify(&self, credential: &str) -> MarketResult<GoogleSignIn> {
        let identity = self.identity.verify(credential).await?;

        if let Some(user) = self.find_by_email(&identity.email).await? {
            return Ok(GoogleSignIn::Existing(self.signed_in(user)?));
        }

        let mut bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut bytes);
        let pending_token = hex::encode(bytes);

        let pending = PendingSignup {
            email: normalize_email(&identity.email),
            name: identity.name,
            picture: identity.picture,
        };

        self.cache
            .try_put_json(
                &keys::pending_signup(&pending_token),
                &pending,
                self.cache.pending_signup_ttl(),
            )
            .await
            .map_err(|e| {
                tracing::warn!("Could not store pending sign-up: {}", e);
                MarketError::UpstreamUnavailable("Sign-up temporarily unavailable".to_string())
            })?;

        Ok(GoogleSignIn::Pending {
            needs_account: true,
            pending_token,
            email: pending.email,
            name: pending.name,
        })
    }

    /// Consume a pending Google sign-up and create the account
    pub async fn google_create_account(
        &self,
        request: CreateGoogleAccountRequest,
    ) -> MarketResult<AccountResponse> {
        request.validate()?;

        let pending: PendingSignup = self
            .cache
            .take_json(&keys::pending_signup(&request.pending_token))
            .await
            .map_err(|e| {
                tracing::warn!("Could not read pending sign-up: {}", e);
                MarketError::UpstreamUnavailable("Sign-up temporarily unavailable".to_string())
            })?
            .ok_or_else(|| {
                MarketError::Authentication("Sign-up session expired or invalid".to_string())
            })?;

        let password_hash = password::hash(&password::random_secret())?;
        let user = self
            .insert_user(
                &request.company_name,
                &pending.email,
                &password_hash,
                Role::User,
                &pending.picture,
            )
            .await?;

        info!("Registered Google user {} ({})", user.id, user.email);
        metrics::record_account_creation("google");

        self.signed_in(user)
    }

    /// Create the admin account, or promote and reset an existing one
    pub async fn ensure_admin(&self, email: &str, password_plain: &str) -> MarketResult<User> {
        let password_hash = password::hash(password_plain)?;

        match self.find_by_email(email).await? {
            Some(user) => {
                sqlx::query(
                    "UPDATE users SET role = ?2, password_hash = ?3, updated_at = ?4 WHERE id = ?1",
                )
                .bind(&user.id)
                .bind(Role::Admin.as_str())
                .bind(&password_hash)
                .bind(db::timestamp(Utc::now()))
                .execute(&self.db)
                .await?;

                info!("Promoted {} to admin", user.email);
                self.find_by_id(&user.id)
                    .await?
                    .ok_or_else(|| MarketError::NotFound("User not found".to_string()))
            }
            None => {
                let user = self
                    .insert_user("Admin", email, &password_hash, Role::Admin, "")
                    .await?;
                info!("Created admin {}", user.email);
                Ok(user)
            }
        }
    }
}
