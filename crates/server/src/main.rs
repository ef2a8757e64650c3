use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use reader::{demos, ReaderContext};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod auth;
mod config;
mod pages;

use app_state::AppState;
use auth::AuthConfig;
use config::{load_settings, prepare_database_url, Settings};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    if settings.session_secret == Settings::default().session_secret {
        warn!("using the development session secret; set APP__SESSION_SECRET");
    }
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let reader = ReaderContext::new(storage);
    if settings.load_demos {
        let loaded = demos::load_missing_demos(&reader)
            .await
            .map_err(|error| anyhow::anyhow!("failed to load demo explorations: {error}"))?;
        info!(loaded, "demo explorations ready");
    }

    let state = AppState {
        reader,
        auth: AuthConfig {
            secret: settings.session_secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
        admin_emails: settings.admin_emails,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(api::healthz))
        .route("/login", post(api::login))
        .route("/learn/random", get(pages::random_exploration))
        .route("/learn/:exploration_id", get(pages::learn_page))
        .route("/learnhandler/init/:exploration_id", get(api::reader_init))
        .route(
            "/learnhandler/transition/:exploration_id/:state_name",
            post(api::reader_transition),
        )
        .route(
            "/learnhandler/give_feedback/:exploration_id/:state_name",
            post(api::reader_feedback),
        )
        .route("/create/:exploration_id", get(pages::editor_page))
        .route(pages::PREREQUISITES_PAGE, get(pages::prerequisites_page))
        .route(
            "/profile/editor_prerequisites_handler",
            get(api::get_prerequisites).post(api::post_prerequisites),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
