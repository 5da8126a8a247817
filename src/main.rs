use std::sync::Arc;

use todoist_mcp_server::{
    build_app, config::Config, logging, session::SessionRegistry,
    todoist_client::TodoistClientFactory, AppState,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    if config.todoist_api_key.is_none() {
        warn!("TODOIST_API_KEY is not set; initialize requests will be refused");
    }

    let factory = TodoistClientFactory::new(
        config.todoist_base_url.clone(),
        config.todoist_timeout,
    )?;
    let bind_socket = config.bind_socket()?;
    let state = AppState::new(
        config.api_token.clone(),
        config.todoist_api_key.clone(),
        Arc::new(factory),
    );
    let sessions = state.sessions.clone();
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        todoist_base_url = %config.todoist_base_url,
        "server starting"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal(sessions: SessionRegistry) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    info!(live_sessions = sessions.len(), "shutdown requested");
    sessions.close_all().await;
}
