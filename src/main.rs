/// Toolhub - tool marketplace backend
use toolhub::{server, AppContext, MarketResult, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> MarketResult<()> {
    // Load configuration first so the log format can follow it
    let config = ServerConfig::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "toolhub=debug,tower_http=debug".into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    print_banner();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  _              _ _           _
 | |_ ___   ___ | | |__  _   _| |__
 | __/ _ \ / _ \| | '_ \| | | | '_ \
 | || (_) | (_) | | | | | |_| | |_) |
  \__\___/ \___/|_|_| |_|\__,_|_.__/

        Tool marketplace backend v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
