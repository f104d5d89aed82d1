//! Control loop statistics
//!
//! Running counters over a session: how many ticks ran, how many were
//! spent warming up, and how decisions were distributed.

use crate::policy::ActionKind;
use serde::Serialize;

/// Per-session counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoopStats {
    /// Accepted ticks (warm-up included)
    pub ticks: u64,
    /// Ticks that produced no decision because the window was filling
    pub warmup_ticks: u64,
    /// Ticks that produced an action record
    pub decisions: u64,
    pub increases: u64,
    pub decreases: u64,
    pub maintains: u64,
    /// Decisions flagged anomalous
    pub anomalies: u64,
    /// Ticks whose safety verdict required shutdown
    pub shutdown_ticks: u64,
    /// Inputs rejected before touching state
    pub rejected_inputs: u64,
    /// Records that could not be persisted
    pub log_failures: u64,
    /// Most recent score, if any
    pub last_score: Option<f64>,
}

impl LoopStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted tick
    pub fn record_tick(&mut self, warming_up: bool, shutdown_required: bool) {
        self.ticks += 1;
        if warming_up {
            self.warmup_ticks += 1;
        }
        if shutdown_required {
            self.shutdown_ticks += 1;
        }
    }

    /// Record a decision
    pub fn record_decision(&mut self, kind: ActionKind, score: f64, is_anomaly: bool) {
        self.decisions += 1;
        match kind {
            ActionKind::Increase => self.increases += 1,
            ActionKind::Decrease => self.decreases += 1,
            ActionKind::Maintain => self.maintains += 1,
        }
        if is_anomaly {
            self.anomalies += 1;
        }
        self.last_score = Some(score);
    }

    pub fn record_rejection(&mut self) {
        self.rejected_inputs += 1;
    }

    pub fn record_log_failure(&mut self) {
        self.log_failures += 1;
    }

    /// Fraction of decisions flagged anomalous (0.0 - 1.0)
    pub fn anomaly_rate(&self) -> f64 {
        if self.decisions == 0 {
            return 0.0;
        }
        self.anomalies as f64 / self.decisions as f64
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Allayr Control Loop ===\n\n");
        report.push_str(&format!("Ticks: {}\n", self.ticks));
        report.push_str(&format!("Warm-up ticks: {}\n", self.warmup_ticks));
        report.push_str(&format!("Decisions: {}\n", self.decisions));
        report.push_str(&format!("  Increase: {}\n", self.increases));
        report.push_str(&format!("  Decrease: {}\n", self.decreases));
        report.push_str(&format!("  Maintain: {}\n", self.maintains));
        report.push_str(&format!(
            "Anomalies: {} ({:.1}%)\n",
            self.anomalies,
            self.anomaly_rate() * 100.0
        ));
        report.push_str(&format!("Shutdown verdicts: {}\n", self.shutdown_ticks));
        report.push_str(&format!("Rejected inputs: {}\n", self.rejected_inputs));
        report.push_str(&format!("Log failures: {}\n", self.log_failures));
        if let Some(score) = self.last_score {
            report.push_str(&format!("Last score: {:.4}\n", score));
        }

        report
    }
}
