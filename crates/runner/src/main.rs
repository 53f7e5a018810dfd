use std::sync::Arc;

use cloudide_runner::config::Config;
use cloudide_runner::state::AppState;
use cloudide_runner::{http, ws};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env();
    let is_production = std::env::var("CLOUDIDE_ENV").map(|v| v == "production").unwrap_or(false);
    if is_production && config.has_insecure_defaults() {
        anyhow::bail!("refusing to start in production with the default RUNNER_SHARED_SECRET; set a real secret first");
    }
    if config.has_insecure_defaults() {
        tracing::warn!("running with the default RUNNER_SHARED_SECRET; do not use this configuration in production");
    }

    std::fs::create_dir_all(&config.workspaces_dir)?;
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config));

    let app = http::router(state.clone()).merge(ws::router(state));

    tracing::info!(%bind_addr, "starting runner");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json {
        tracing_subscriber::registry().with(filter).with(fmt::layer().json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
    }
}
