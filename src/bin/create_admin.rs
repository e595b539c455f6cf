/// Create the admin account, or promote and reset an existing one
///
/// Reads `ADMIN_EMAIL` and `ADMIN_PASSWORD` alongside the usual server
/// configuration.
use anyhow::{bail, Context};
use toolhub::{AppContext, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolhub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("loading configuration")?;

    let email = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
    let password = std::env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD must be set")?;
    if password.len() < 6 {
        bail!("ADMIN_PASSWORD must be at least 6 characters");
    }

    let ctx = AppContext::new(config)
        .await
        .context("initialising storage")?;

    let admin = ctx
        .accounts
        .ensure_admin(&email, &password)
        .await
        .context("creating admin user")?;

    println!("Admin user {} ({}) is ready", admin.email, admin.id);
    Ok(())
}
