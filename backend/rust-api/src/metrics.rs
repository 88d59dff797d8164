use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

use crate::progression::{Score, SkillLevel};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref LESSON_COMPLETIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "lesson_completions_total",
        "Total number of lesson completions",
        &["score_band"]
    )
    .unwrap();

    pub static ref XP_AWARDED_TOTAL: IntCounter = register_int_counter!(
        "xp_awarded_total",
        "Total XP credited to users"
    )
    .unwrap();

    pub static ref LEVEL_UPS_TOTAL: IntCounter = register_int_counter!(
        "level_ups_total",
        "Total number of completions that raised a user's level"
    )
    .unwrap();

    pub static ref BADGES_AWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "badges_awarded_total",
        "Total number of badges awarded",
        &["badge_id"]
    )
    .unwrap();

    pub static ref ASSESSMENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "assessments_total",
        "Total number of assessments submitted",
        &["skill_level"]
    )
    .unwrap();

    // Concurrency Metrics
    pub static ref PERSISTENCE_CONFLICTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "persistence_conflicts_total",
        "Optimistic concurrency conflicts on progression writes",
        &["operation"]
    )
    .unwrap();

    pub static ref COMPLETION_LOCK_WAITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "completion_lock_waits_total",
        "Lesson completion lock acquisitions",
        &["result"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

fn score_band(score: Score) -> &'static str {
    match score.value() {
        80..=100 => "high",
        60..=79 => "passing",
        _ => "low",
    }
}

pub fn record_lesson_completion(score: Score, xp_credited: u32, leveled_up: bool) {
    LESSON_COMPLETIONS_TOTAL
        .with_label_values(&[score_band(score)])
        .inc();
    XP_AWARDED_TOTAL.inc_by(u64::from(xp_credited));
    if leveled_up {
        LEVEL_UPS_TOTAL.inc();
    }
}

pub fn record_badge_awarded(badge_id: &str) {
    BADGES_AWARDED_TOTAL.with_label_values(&[badge_id]).inc();
}

pub fn record_assessment(skill_level: SkillLevel) {
    ASSESSMENTS_TOTAL
        .with_label_values(&[skill_level.as_str()])
        .inc();
}

pub fn record_persistence_conflict(operation: &str) {
    PERSISTENCE_CONFLICTS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn record_lock_wait(acquired: bool) {
    let result = if acquired { "acquired" } else { "busy" };
    COMPLETION_LOCK_WAITS_TOTAL.with_label_values(&[result]).inc();
}
