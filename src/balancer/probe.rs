// src/balancer/probe.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task;
use tokio::time;
use tracing::{debug, info, warn};

use crate::balancer::Backend;
use crate::cancel::CancelToken;

/// Configuration for backend health probes
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// How often each backend is probed
    pub interval: Duration,
    /// Timeout for a single probe request
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Start the probe loop for one backend.
///
/// Each tick issues `GET {target}/health` with the configured timeout and
/// stores the outcome in the backend's alive flag. Failures are logged and
/// consumed; the next tick is the only retry. The loop exits when the
/// cancellation token fires.
pub fn spawn_prober(
    backend: Arc<Backend>,
    client: reqwest::Client,
    config: ProbeConfig,
    cancel: CancelToken,
) -> task::JoinHandle<()> {
    let mut probe_url = backend.url().clone();
    probe_url.set_path("/health");

    task::spawn(async move {
        let mut ticker = time::interval(config.interval);

        loop {
            ticker.tick().await;

            if cancel.is_cancelled() {
                break;
            }

            let started = Instant::now();
            let healthy = match client
                .get(probe_url.clone())
                .timeout(config.timeout)
                .send()
                .await
            {
                Ok(response) => response.status() == reqwest::StatusCode::OK,
                Err(err) => {
                    debug!(backend = %backend.host(), error = %err, "health probe failed");
                    false
                }
            };

            debug!(
                backend = %backend.host(),
                healthy,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "health probe"
            );

            let was_alive = backend.is_alive();
            backend.set_alive(healthy);

            if was_alive != healthy {
                if healthy {
                    info!(backend = %backend.host(), "backend is now healthy");
                } else {
                    warn!(backend = %backend.host(), "backend is now unhealthy");
                }
            }
        }

        debug!(backend = %backend.host(), "health prober stopped");
    })
}
