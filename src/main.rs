use anyhow::anyhow;
use axum::http::HeaderName;
use axum::Router;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::propagate_header::PropagateHeaderLayer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapline::app::auth::SessionService;
use snapline::config::AppConfig;
use snapline::infra::db::Db;
use snapline::{http, jobs, AppState};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let db = Db::connect(&config).await?;
    let state = AppState::new(db.clone(), &config);

    let sessions = SessionService::new(db, config.identity_key, config.session_ttl_hours);
    let prune_interval = Duration::from_secs(config.session_prune_interval_seconds);

    match config.app_mode.as_str() {
        "api" => {
            let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
            let app: Router = http::router(state).layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateHeaderLayer::new(request_id)),
            );

            let reaper = tokio::spawn(jobs::session_reaper::run(sessions, prune_interval));

            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            reaper.abort();
        }
        "worker" => {
            tracing::info!("starting worker mode");
            tokio::select! {
                result = jobs::session_reaper::run(sessions, prune_interval) => {
                    result?;
                }
                _ = shutdown_signal() => {}
            }
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
