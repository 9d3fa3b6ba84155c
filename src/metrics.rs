use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Admission decisions of the rate-limiting service, by response status.
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests.",
        &["status"]
    )
    .unwrap();

    /// Denied admissions.
    pub static ref RATE_LIMIT_HITS_TOTAL: IntCounter = register_int_counter!(
        "rate_limit_hits_total",
        "Total number of rate limit hits."
    )
    .unwrap();

    /// Dispatch outcomes of the load balancer, by backend and status.
    pub static ref LOAD_BALANCER_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "load_balancer_requests_total",
        "Total number of requests handled by the load balancer.",
        &["backend", "status"]
    )
    .unwrap();
}

/// Render the default registry in Prometheus text exposition format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
