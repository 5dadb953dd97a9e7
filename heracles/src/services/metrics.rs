use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static VALIDATE_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static RADIUS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static DB_QUERY_DURATION: OnceLock<HistogramVec> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    let validate_total = IntCounterVec::new(
        Opts::new(
            "heracles_validate_total",
            "Realm validation requests by outcome",
        ),
        &["outcome"],
    )?;
    let radius_total = IntCounterVec::new(
        Opts::new("heracles_radius_total", "RADIUS credential checks by outcome"),
        &["outcome"],
    )?;
    let db_query_duration = HistogramVec::new(
        HistogramOpts::new(
            "heracles_db_query_duration_seconds",
            "Database query duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation"],
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(validate_total.clone()))?;
    registry.register(Box::new(radius_total.clone()))?;
    registry.register(Box::new(db_query_duration.clone()))?;

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = VALIDATE_TOTAL.set(validate_total);
    let _ = RADIUS_TOTAL.set(radius_total);
    let _ = DB_QUERY_DURATION.set(db_query_duration);

    Ok(())
}

/// Count one validate decision.
pub fn record_validate(outcome: &str) {
    if let Some(counter) = VALIDATE_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Count one RADIUS verdict.
pub fn record_radius(outcome: &str) {
    if let Some(counter) = RADIUS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Start a query timer; observes on drop.
pub fn db_timer(operation: &str) -> Option<prometheus::HistogramTimer> {
    DB_QUERY_DURATION
        .get()
        .map(|histogram| histogram.with_label_values(&[operation]).start_timer())
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
