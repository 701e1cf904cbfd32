use std::{net::SocketAddr, time::Duration};

use retail_media::{app, config::AppConfig, state::AppState, users::ensure_admin};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "retail_media=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let sweep_every = Duration::from_secs(config.session.sweep_interval_secs);

    let state = AppState::init(config).await?;

    if let Some(seed) = &state.config.admin {
        if let Err(e) = ensure_admin(state.users.as_ref(), seed).await {
            tracing::error!(error = %e, "admin bootstrap failed");
        }
    }

    let sweeper = state.sessions.spawn_sweeper(sweep_every);
    let app = app::build_app(state)?;
    app::serve(app, addr).await?;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(())
}
