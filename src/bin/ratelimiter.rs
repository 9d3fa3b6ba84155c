// Admission-control service: every request is checked against the client's
// sliding-window budget before a short success body is returned.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dotenv::dotenv;
use tokio::signal;
use tracing::{error, info};

use limitgate::cancel::CancelToken;
use limitgate::client_ip::client_key;
use limitgate::config::{LimiterSettings, RedisConfig};
use limitgate::limiter::SlidingWindow;
use limitgate::metrics;
use limitgate::storage::RedisStorage;

struct AppState {
    limiter: SlidingWindow<RedisStorage>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    limitgate::init_logging();

    let settings = LimiterSettings::from_env()?;
    info!(
        redis_addr = %settings.redis_addr,
        limit = settings.limit,
        window = ?settings.window,
        "starting rate limiter service"
    );

    let storage = Arc::new(RedisStorage::connect(RedisConfig::new(&settings.redis_addr)).await?);
    storage.ping().await?;
    info!("connected to redis");

    let state = Arc::new(AppState {
        limiter: SlidingWindow::new(storage, settings.window, settings.limit),
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(admit_handler)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "rate limiter service listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("rate limiter service stopped");
    Ok(())
}

async fn admit_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let key = client_key(&headers, peer);

    match state.limiter.allow(&CancelToken::new(), &key).await {
        Ok(true) => {
            metrics::HTTP_REQUESTS_TOTAL.with_label_values(&["200"]).inc();
            (StatusCode::OK, "Request allowed\n")
        }
        Ok(false) => {
            metrics::HTTP_REQUESTS_TOTAL.with_label_values(&["429"]).inc();
            metrics::RATE_LIMIT_HITS_TOTAL.inc();
            (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded\n")
        }
        Err(err) => {
            error!(%key, error = %err, "admission check failed");
            metrics::HTTP_REQUESTS_TOTAL.with_label_values(&["500"]).inc();
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_handler() -> impl IntoResponse {
    metrics::gather()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
