// Allayr Runner - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the control loop.
//!
//! Gauges mirror the latest tick; counters accumulate over the run.

use allayr::{ShutdownReason, TickOutcome, ZoneRanking};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};

lazy_static! {
    // ============================================================
    // Decision metrics
    // ============================================================

    /// Latest anomaly score (absent during warm-up).
    pub static ref ANOMALY_SCORE: Gauge = register_gauge!(
        "allayr_anomaly_score",
        "Normalized variance of the sliding window"
    ).expect("register allayr_anomaly_score");

    /// Threshold in effect for the latest tick.
    pub static ref THRESHOLD: Gauge = register_gauge!(
        "allayr_threshold",
        "Temperature-adjusted anomaly threshold"
    ).expect("register allayr_threshold");

    /// Window fill ratio (0-1).
    pub static ref WINDOW_FILL: Gauge = register_gauge!(
        "allayr_window_fill_ratio",
        "Sliding window fill ratio (1 = scoring)"
    ).expect("register allayr_window_fill_ratio");

    /// Per-zone magnitude of the latest reading.
    pub static ref ZONE_PRESSURE: GaugeVec = register_gauge_vec!(
        "allayr_zone_pressure",
        "Latest reading magnitude per zone or region",
        &["zone"]
    ).expect("register allayr_zone_pressure");

    /// Compression actions by kind.
    pub static ref ACTIONS_TOTAL: CounterVec = register_counter_vec!(
        "allayr_actions_total",
        "Compression actions issued",
        &["action"]
    ).expect("register allayr_actions_total");

    pub static ref ANOMALIES_TOTAL: Counter = register_counter!(
        "allayr_anomalies_total",
        "Decisions flagged anomalous"
    ).expect("register allayr_anomalies_total");

    pub static ref TICKS_TOTAL: Counter = register_counter!(
        "allayr_ticks_total",
        "Accepted ticks"
    ).expect("register allayr_ticks_total");

    pub static ref REJECTED_INPUTS_TOTAL: Counter = register_counter!(
        "allayr_rejected_inputs_total",
        "Inputs rejected before touching state"
    ).expect("register allayr_rejected_inputs_total");

    pub static ref LOG_FAILURES_TOTAL: Counter = register_counter!(
        "allayr_log_failures_total",
        "Records that could not be persisted"
    ).expect("register allayr_log_failures_total");

    // ============================================================
    // Device metrics
    // ============================================================

    pub static ref BATTERY_LEVEL: Gauge = register_gauge!(
        "allayr_battery_level_percent",
        "Battery charge (0-100)"
    ).expect("register allayr_battery_level_percent");

    pub static ref TEMPERATURE: Gauge = register_gauge!(
        "allayr_body_temperature_celsius",
        "Body temperature"
    ).expect("register allayr_body_temperature_celsius");

    pub static ref SAMPLING_RATE: Gauge = register_gauge!(
        "allayr_sampling_rate_hz",
        "Adapted sampling rate"
    ).expect("register allayr_sampling_rate_hz");

    pub static ref INFERENCE_ENABLED: Gauge = register_gauge!(
        "allayr_inference_enabled",
        "Inference gate (1=enabled)"
    ).expect("register allayr_inference_enabled");

    pub static ref FALLBACK_ENABLED: Gauge = register_gauge!(
        "allayr_fallback_enabled",
        "Fallback mode (1=link or sensor failure)"
    ).expect("register allayr_fallback_enabled");

    // ============================================================
    // Safety metrics
    // ============================================================

    pub static ref SHUTDOWN_REQUIRED: Gauge = register_gauge!(
        "allayr_shutdown_required",
        "Safety verdict of the latest tick (1=shutdown required)"
    ).expect("register allayr_shutdown_required");

    pub static ref SHUTDOWN_REASONS_TOTAL: CounterVec = register_counter_vec!(
        "allayr_shutdown_reasons_total",
        "Ticks on which each shutdown condition tripped",
        &["reason"]
    ).expect("register allayr_shutdown_reasons_total");
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn reason_label(reason: &ShutdownReason) -> &'static str {
    match reason {
        ShutdownReason::CriticalBattery { .. } => "critical_battery",
        ShutdownReason::OverTemperature { .. } => "over_temperature",
        ShutdownReason::UnderTemperature { .. } => "under_temperature",
        ShutdownReason::FallbackActive => "fallback",
    }
}

/// Update every metric from one tick.
pub fn update_from_outcome(outcome: &TickOutcome, ranking: Option<&ZoneRanking>, window_fill: f64) {
    TICKS_TOTAL.inc();
    THRESHOLD.set(outcome.threshold);
    WINDOW_FILL.set(window_fill);

    if let Some(record) = &outcome.record {
        ANOMALY_SCORE.set(record.score);
        ACTIONS_TOTAL
            .with_label_values(&[record.action.kind().as_str()])
            .inc();
        if record.is_anomaly {
            ANOMALIES_TOTAL.inc();
        }
    }

    if let Some(ranking) = ranking {
        for (zone, value) in ranking.entries() {
            ZONE_PRESSURE
                .with_label_values(&[zone.to_string().as_str()])
                .set(*value as f64);
        }
    }

    let device = &outcome.device;
    BATTERY_LEVEL.set(device.battery_level);
    TEMPERATURE.set(device.temperature_c);
    SAMPLING_RATE.set(device.sampling_rate as f64);
    INFERENCE_ENABLED.set(flag(device.inference_enabled));
    FALLBACK_ENABLED.set(flag(device.fallback_enabled));

    SHUTDOWN_REQUIRED.set(flag(outcome.safety.shutdown_required));
    for reason in &outcome.safety.reasons {
        SHUTDOWN_REASONS_TOTAL
            .with_label_values(&[reason_label(reason)])
            .inc();
    }
}

pub fn record_rejection() {
    REJECTED_INPUTS_TOTAL.inc();
}

pub fn record_log_failure() {
    LOG_FAILURES_TOTAL.inc();
}

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
