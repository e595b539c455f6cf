/// Application context and dependency injection
use crate::{
    account::{AccountManager, GoogleTokenInfo, IdentityVerifier},
    admin::AdminManager,
    analytics::AnalyticsManager,
    auth::TokenAuthority,
    cache::{Cache, InvalidationCoordinator},
    comments::CommentManager,
    config::ServerConfig,
    db,
    error::{MarketError, MarketResult},
    media::MediaManager,
    media_store::{DiskMediaStorage, MediaStorage},
    rate_limit::RateLimiter,
    tools::ToolManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub cache: Cache,
    pub tokens: TokenAuthority,
    pub accounts: Arc<AccountManager>,
    pub tools: Arc<ToolManager>,
    pub comments: Arc<CommentManager>,
    pub media: Arc<MediaManager>,
    pub analytics: Arc<AnalyticsManager>,
    pub admin: Arc<AdminManager>,
    pub media_storage: Arc<dyn MediaStorage>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> MarketResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let cache = Cache::connect(&config.cache).await?;
        let identity = Arc::new(GoogleTokenInfo::new(
            config.authentication.google_client_id.clone(),
        )?);

        Ok(Self::assemble(config, db, cache, identity))
    }

    /// Wire services around an existing pool and cache
    pub fn assemble(
        config: ServerConfig,
        db: SqlitePool,
        cache: Cache,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let tokens = TokenAuthority::new(
            &config.authentication.jwt_secret,
            config.authentication.token_ttl_days,
        );
        let invalidation = InvalidationCoordinator::new(cache.clone());
        let media_storage: Arc<dyn MediaStorage> = Arc::new(DiskMediaStorage::new(
            config.storage.media_directory.clone(),
            &config.service.public_url,
        ));

        let accounts = Arc::new(AccountManager::new(
            db.clone(),
            cache.clone(),
            tokens.clone(),
            identity,
        ));
        let tools = Arc::new(ToolManager::new(
            db.clone(),
            cache.clone(),
            invalidation.clone(),
            media_storage.clone(),
        ));
        let comments = Arc::new(CommentManager::new(
            db.clone(),
            cache.clone(),
            invalidation.clone(),
        ));
        let media = Arc::new(MediaManager::new(
            db.clone(),
            invalidation.clone(),
            media_storage.clone(),
        ));
        let analytics = Arc::new(AnalyticsManager::new(db.clone(), invalidation));
        let admin = Arc::new(AdminManager::new(db.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config: Arc::new(config),
            db,
            cache,
            tokens,
            accounts,
            tools,
            comments,
            media,
            analytics,
            admin,
            media_storage,
            rate_limiter,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> MarketResult<()> {
        for dir in [&config.storage.data_directory, &config.storage.media_directory] {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    MarketError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> &str {
        &self.config.service.public_url
    }
}
