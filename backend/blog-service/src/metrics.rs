//! Prometheus metrics for blog-service.
//!
//! Collectors register against the default registry on first use; `/metrics`
//! renders everything in that registry, page-cache library counters included.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

/// Index page cache outcomes (hit/miss/error).
pub static PAGE_CACHE_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blog_page_cache_events_total",
        "Index page cache lookups segmented by outcome",
        &["event"]
    )
    .expect("failed to register blog_page_cache_events_total")
});

pub static POSTS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("blog_posts_created_total", "Posts created")
        .expect("failed to register blog_posts_created_total")
});

pub static COMMENTS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("blog_comments_created_total", "Comments created")
        .expect("failed to register blog_comments_created_total")
});

/// Follow graph changes (follow/unfollow/noop).
pub static FOLLOW_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blog_follow_events_total",
        "Follow graph requests segmented by effect",
        &["action"]
    )
    .expect("failed to register blog_follow_events_total")
});

pub fn record_cache_event(event: &str) {
    PAGE_CACHE_EVENTS.with_label_values(&[event]).inc();
}

pub fn record_follow_event(action: &str) {
    FOLLOW_EVENTS.with_label_values(&[action]).inc();
}

/// Force registration so `/metrics` lists every series before first use
pub fn init() {
    Lazy::force(&PAGE_CACHE_EVENTS);
    Lazy::force(&POSTS_CREATED);
    Lazy::force(&COMMENTS_CREATED);
    Lazy::force(&FOLLOW_EVENTS);

    if let Err(err) = page_cache::CacheMetrics::register(prometheus::default_registry()) {
        tracing::warn!(error = %err, "page cache metrics already registered");
    }
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
