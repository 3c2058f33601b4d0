use axum::{routing::get, Router};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

mod config;
mod route;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        )
        .with_target(false)
        .init();
    let config = ServerConfig::from_env();
    let addr = config.listen;
    let app = Router::new()
        .route("/calendar/waste", get(route::calendar::waste::handler))
        .route("/calendar/society", get(route::calendar::society::handler))
        .with_state(config);
    info!(%addr, "listening");
    if let Err(err) = axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
    {
        error!(%err, "server stopped");
    }
}
