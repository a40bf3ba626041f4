use once_cell::sync::Lazy;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

// Prometheus metrics (default registry)
pub static VOTES_RECORDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("polls_votes_recorded_total", "Total votes persisted")
        .expect("register votes_recorded_total")
});

pub static STORAGE_WRITE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "polls_storage_write_failures_total",
        "Total failed document writes"
    )
    .expect("register storage_write_failures_total")
});

pub static CORRUPT_DOCUMENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "polls_corrupt_document_total",
        "Total reads that found an unparseable or unrecognised document"
    )
    .expect("register corrupt_document_total")
});

pub static POLLS_BACKFILLED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "polls_backfilled_total",
        "Total empty poll entries inserted by repair"
    )
    .expect("register polls_backfilled_total")
});

pub static REVIEWS_SUBMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("reviews_submitted_total", "Total reviews accepted for moderation")
        .expect("register reviews_submitted_total")
});

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    // touch the lazies so every series is exported from the first scrape
    let _ = (
        VOTES_RECORDED_TOTAL.get(),
        STORAGE_WRITE_FAILURES_TOTAL.get(),
        CORRUPT_DOCUMENT_TOTAL.get(),
        POLLS_BACKFILLED_TOTAL.get(),
        REVIEWS_SUBMITTED_TOTAL.get(),
    );
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_poll_series() {
        VOTES_RECORDED_TOTAL.inc();
        let (status, body) = encode_metrics();
        assert_eq!(status, axum::http::StatusCode::OK);
        assert!(body.contains("polls_votes_recorded_total"));
        assert!(body.contains("polls_corrupt_document_total"));
    }
}
