/// Aurora Posts - post composition service
///
/// Serves creation, editing, deletion and reading of short text posts with
/// up to a handful of attached images, storing image bytes on local disk.

mod api;
mod auth;
mod blob_store;
mod config;
mod context;
mod db;
mod error;
mod metrics;
mod posts;
mod rate_limit;
mod server;
mod validation;

use config::ServerConfig;
use context::AppContext;
use error::PostResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> PostResult<()> {
    // Load configuration first so RUST_LOG from .env is honoured
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| "aurora_posts=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ___                                   ____             __
   /   | __  ___________  _________ _   / __ \____  _____/ /______
  / /| |/ / / / ___/ __ \/ ___/ __ `/  / /_/ / __ \/ ___/ __/ ___/
 / ___ / /_/ / /  / /_/ / /  / /_/ /  / ____/ /_/ (__  ) /_(__  )
/_/  |_\__,_/_/   \____/_/   \__,_/  /_/    \____/____/\__/____/

        Post service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
