use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("linkhub_requests_total", "Total number of API requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: CounterVec = register_counter_vec!(
        "linkhub_rate_limited_total",
        "Requests rejected by the rate limiter",
        &["action"]
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: Gauge =
        register_gauge!("linkhub_rate_limit_entries", "Live rate limit buckets").unwrap();
    pub static ref REORDER_APPLIED: Counter =
        register_counter!("linkhub_reorder_batches_total", "Order batches committed").unwrap();
    pub static ref REORDER_REJECTED: Counter = register_counter!(
        "linkhub_reorder_rejected_total",
        "Order batches rejected without changes"
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "linkhub_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
}

// Render the default registry in text exposition format
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| format!("Encode error: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("Encode error: {}", e))
}
