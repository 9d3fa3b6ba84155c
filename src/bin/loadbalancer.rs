// Weighted reverse proxy: admitted traffic is spread across the live
// backends; a per-backend prober keeps the liveness flags current.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use dotenv::dotenv;
use tokio::signal;
use tracing::{info, warn};
use url::Url;

use limitgate::balancer::{spawn_prober, Backend, BackendPool, ProbeConfig};
use limitgate::cancel::CancelToken;
use limitgate::config::BalancerSettings;
use limitgate::error::LimiterError;
use limitgate::metrics;

// Proxied request bodies are buffered; anything bigger is refused.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

struct AppState {
    pool: BackendPool,
    client: reqwest::Client,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    limitgate::init_logging();

    let settings = BalancerSettings::from_env()?;

    let mut backends = Vec::with_capacity(settings.backends.len());
    for member in &settings.backends {
        let url = parse_backend_url(&member.url)?;
        backends.push(Arc::new(Backend::new(url, member.weight)));
    }
    let pool = BackendPool::new(backends);

    info!(backend_count = pool.backends().len(), "starting load balancer");
    for backend in pool.backends() {
        info!(backend = %backend.host(), weight = backend.weight(), "registered backend");
    }

    let client = reqwest::Client::new();
    let probe_config = ProbeConfig {
        interval: settings.probe_interval,
        timeout: settings.probe_timeout,
    };
    let cancel = CancelToken::new();
    for backend in pool.backends() {
        spawn_prober(
            Arc::clone(backend),
            client.clone(),
            probe_config.clone(),
            cancel.clone(),
        );
    }

    let state = Arc::new(AppState { pool, client });

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(proxy_handler)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "load balancer listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    info!("load balancer stopped");
    Ok(())
}

fn parse_backend_url(raw: &str) -> Result<Url, LimiterError> {
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    Url::parse(&with_scheme)
        .map_err(|e| LimiterError::Config(format!("backend url {raw:?}: {e}")))
}

async fn proxy_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let Some(backend) = state.pool.pick() else {
        metrics::LOAD_BALANCER_REQUESTS_TOTAL
            .with_label_values(&["none", "503"])
            .inc();
        return (StatusCode::SERVICE_UNAVAILABLE, "No healthy backends\n").into_response();
    };

    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer request body");
            metrics::LOAD_BALANCER_REQUESTS_TOTAL
                .with_label_values(&[backend.host().as_str(), "400"])
                .inc();
            return (StatusCode::BAD_REQUEST, "Bad Request\n").into_response();
        }
    };

    match forward(&state.client, &backend, parts, body).await {
        Ok(response) => {
            metrics::LOAD_BALANCER_REQUESTS_TOTAL
                .with_label_values(&[backend.host().as_str(), response.status().as_str()])
                .inc();
            response
        }
        Err(err) => {
            warn!(backend = %backend.host(), error = %err, "proxy request failed");
            metrics::LOAD_BALANCER_REQUESTS_TOTAL
                .with_label_values(&[backend.host().as_str(), "502"])
                .inc();
            (StatusCode::BAD_GATEWAY, "Bad Gateway\n").into_response()
        }
    }
}

// Hop-by-hop headers describe one connection, not the request; both legs of
// the buffered forwarding must drop them.
fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    *name == header::CONNECTION
        || *name == header::TRANSFER_ENCODING
        || *name == header::TE
        || *name == header::TRAILER
        || *name == header::UPGRADE
        || *name == header::PROXY_AUTHENTICATE
        || *name == header::PROXY_AUTHORIZATION
        || name.as_str() == "keep-alive"
}

// Replay the request against the chosen backend and buffer the reply back.
async fn forward(
    client: &reqwest::Client,
    backend: &Backend,
    parts: Parts,
    body: Bytes,
) -> Result<Response, reqwest::Error> {
    let mut url = backend.url().clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let mut request = client.request(parts.method, url);
    for (name, value) in &parts.headers {
        if name == header::HOST || is_hop_by_hop(name) {
            continue;
        }
        request = request.header(name, value);
    }

    let upstream = request.body(body).send().await?;

    let status = upstream.status();
    let headers = upstream.headers().clone();
    let bytes = upstream.bytes().await?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    for (name, value) in &headers {
        if is_hop_by_hop(name) {
            continue;
        }
        response.headers_mut().insert(name.clone(), value.clone());
    }

    Ok(response)
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
