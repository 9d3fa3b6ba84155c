// src/balancer/mod.rs

pub mod probe;

#[cfg(test)]
mod tests;

pub use probe::{spawn_prober, ProbeConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use url::Url;

/// One upstream target. Weight is fixed at construction; liveness is owned
/// by the health prober and read by everyone else.
#[derive(Debug)]
pub struct Backend {
    url: Url,
    weight: u32,
    alive: AtomicBool,
}

impl Backend {
    /// Backends start out alive; the first probe corrects that if needed.
    pub fn new(url: Url, weight: u32) -> Self {
        Self {
            url,
            weight,
            alive: AtomicBool::new(true),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host:port` form, used as the metrics label.
    pub fn host(&self) -> String {
        match (self.url.host_str(), self.url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => self.url.to_string(),
        }
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }
}

/// Fixed-at-startup ordered set of backends.
#[derive(Debug, Clone)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
}

impl BackendPool {
    pub fn new(backends: Vec<Arc<Backend>>) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Weighted random pick over the live members, or `None` when nothing is
    /// live. Draws are independent; consecutive picks may hit the same
    /// target.
    pub fn pick(&self) -> Option<Arc<Backend>> {
        let total: u64 = self
            .backends
            .iter()
            .filter(|b| b.is_alive())
            .map(|b| u64::from(b.weight()))
            .sum();
        if total == 0 {
            return None;
        }

        let mut remaining = rand::rng().random_range(0..total);
        let mut last_live = None;

        for backend in &self.backends {
            if !backend.is_alive() {
                continue;
            }
            let weight = u64::from(backend.weight());
            if remaining < weight {
                return Some(Arc::clone(backend));
            }
            remaining -= weight;
            last_live = Some(backend);
        }

        // An alive flag flipped between the sum and the walk, letting the
        // draw run past the end; settle for the last live backend seen.
        last_live.map(Arc::clone)
    }
}
