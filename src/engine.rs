//! ControlLoop - per-tick orchestration of the control pipeline.
//!
//! One tick runs, in order: window update, scoring, environment intake and
//! device adaptation, threshold, action decision, safety evaluation. A tick
//! either completes fully or, for invalid input, leaves every piece of
//! state untouched.

use crate::anomaly::{AnomalyScorer, VarianceScorer};
use crate::config::ControlConfig;
use crate::device::DeviceState;
use crate::error::{ConfigError, ReadingError};
use crate::metrics::LoopStats;
use crate::policy::{ActionPolicy, CompressionAction, ControlMode};
use crate::reading::{Environment, Reading, TickInput};
use crate::record::{ActionRecord, Clock, SystemClock};
use crate::safety::{SafetyMonitor, SafetyVerdict};
use crate::threshold::ThresholdPolicy;
use crate::window::SlidingWindow;
use crate::zone::ZoneRanking;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

/// Everything a tick produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutcome {
    /// 1-based tick index within the session.
    pub tick: u64,
    /// Threshold in effect for this tick (score scale).
    pub threshold: f64,
    /// `None` while the window is still filling.
    pub record: Option<ActionRecord>,
    /// Device state after adaptation.
    pub device: DeviceState,
    pub safety: SafetyVerdict,
}

impl TickOutcome {
    pub fn is_warming_up(&self) -> bool {
        self.record.is_none()
    }

    pub fn shutdown_required(&self) -> bool {
        self.safety.shutdown_required
    }

    pub fn action(&self) -> Option<&CompressionAction> {
        self.record.as_ref().map(|r| &r.action)
    }

    pub fn score(&self) -> Option<f64> {
        self.record.as_ref().map(|r| r.score)
    }
}

/// Sensor-to-decision control loop. Owns the window and the device state.
pub struct ControlLoop {
    config: ControlConfig,
    window: SlidingWindow,
    scorer: Box<dyn AnomalyScorer + Send>,
    threshold: ThresholdPolicy,
    policy: ActionPolicy,
    safety: SafetyMonitor,
    clock: Box<dyn Clock + Send>,
    device: DeviceState,
    mode: ControlMode,

    /// Accepted ticks so far.
    tick: u64,
    stats: LoopStats,
    last_outcome: Option<TickOutcome>,
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("scorer", &self.scorer.name())
            .field("window", &format!("{}/{}", self.window.len(), self.window.capacity()))
            .field("mode", &self.mode)
            .field("tick", &self.tick)
            .field("device", &self.device)
            .finish()
    }
}

impl ControlLoop {
    /// Create a loop for a new session. The configuration is validated first.
    pub fn new(config: ControlConfig, environment: Environment) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            window: SlidingWindow::new(config.window.capacity),
            scorer: Box::new(VarianceScorer::new(&config.scoring)),
            threshold: ThresholdPolicy::new(config.threshold.clone(), &config.scoring),
            policy: ActionPolicy::new(config.zones.layout.clone(), &config.policy),
            safety: SafetyMonitor::new(config.safety.clone()),
            clock: Box::new(SystemClock),
            device: DeviceState::new(&config.device, &environment),
            mode: ControlMode::default(),
            tick: 0,
            stats: LoopStats::new(),
            last_outcome: None,
            config,
        })
    }

    /// Start in the given control mode.
    pub fn with_mode(mut self, mode: ControlMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the anomaly scorer.
    pub fn with_scorer(mut self, scorer: Box<dyn AnomalyScorer + Send>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send>) -> Self {
        self.clock = clock;
        self
    }

    /// Switch control mode; takes effect on the next tick.
    pub fn set_mode(&mut self, mode: ControlMode) {
        if mode != self.mode {
            info!("Control mode: {} -> {}", self.mode, mode);
        }
        self.mode = mode;
    }

    /// Run one tick, stamping the record with the loop's clock.
    pub fn tick(&mut self, input: TickInput) -> Result<TickOutcome, ReadingError> {
        let now = self.clock.now();
        self.tick_at(input, now)
    }

    /// Run one tick with an explicit timestamp.
    pub fn tick_at(
        &mut self,
        input: TickInput,
        timestamp: DateTime<Utc>,
    ) -> Result<TickOutcome, ReadingError> {
        if let Err(e) = self.validate_input(&input) {
            warn!("Rejected input at tick {}: {}", self.tick + 1, e);
            self.stats.record_rejection();
            return Err(e);
        }

        let TickInput {
            reading,
            environment,
        } = input;
        let tick = self.tick + 1;

        self.window.push(reading);
        let score = self.scorer.score(&self.window);

        self.device.apply_environment(&environment);
        self.device.adapt(&self.config.device);

        let threshold = self.threshold.threshold(self.device.temperature_c);

        let record = match (score, self.window.latest()) {
            (Some(score), Some(latest)) => {
                let decision = self.policy.decide(&self.mode, latest, score, threshold);
                if decision.is_anomaly {
                    warn!(
                        "Anomaly at tick {}: score {:.4} > threshold {:.4}, {}",
                        tick, score, threshold, decision.action
                    );
                } else {
                    debug!(
                        "Tick {}: score {:.4}, threshold {:.4}, {}",
                        tick, score, threshold, decision.action
                    );
                }
                Some(ActionRecord {
                    tick,
                    timestamp,
                    reading: latest.clone(),
                    score,
                    threshold,
                    is_anomaly: decision.is_anomaly,
                    action: decision.action,
                })
            }
            _ => None,
        };

        if record.is_some() && self.stats.decisions == 0 {
            info!(
                "Window full after {} ticks ({} scorer), decisions start",
                tick,
                self.scorer.name()
            );
        }

        let safety = self.safety.evaluate(&self.device);
        let was_shutdown = self
            .last_outcome
            .as_ref()
            .map(|o| o.safety.shutdown_required)
            .unwrap_or(false);
        if safety.shutdown_required && !was_shutdown {
            warn!("Tick {}: {}", tick, safety);
        } else if !safety.shutdown_required && was_shutdown {
            info!("Tick {}: safety conditions cleared", tick);
        }

        self.tick = tick;
        self.stats
            .record_tick(record.is_none(), safety.shutdown_required);
        if let Some(r) = &record {
            self.stats
                .record_decision(r.action.kind(), r.score, r.is_anomaly);
        }

        let outcome = TickOutcome {
            tick,
            threshold,
            record,
            device: self.device.clone(),
            safety,
        };
        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    fn validate_input(&self, input: &TickInput) -> Result<(), ReadingError> {
        input.reading.validate(self.config.zones.count)?;
        input.environment.validate()
    }

    /// Rank a reading under the configured zone layout.
    pub fn rank(&self, reading: &Reading) -> ZoneRanking {
        self.policy.rank(reading)
    }

    /// Ranking of the most recent reading, for heat-map style displays.
    pub fn latest_ranking(&self) -> Option<ZoneRanking> {
        self.window.latest().map(|r| self.policy.rank(r))
    }

    /// Start a new session: empty window, fresh device state and counters.
    pub fn reset(&mut self, environment: Environment) {
        self.window.clear();
        self.device = DeviceState::new(&self.config.device, &environment);
        self.tick = 0;
        self.stats.reset();
        self.last_outcome = None;
    }

    pub(crate) fn stats_mut(&mut self) -> &mut LoopStats {
        &mut self.stats
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn last_outcome(&self) -> Option<&TickOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn threshold_policy(&self) -> &ThresholdPolicy {
        &self.threshold
    }

    pub fn safety_monitor(&self) -> &SafetyMonitor {
        &self.safety
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ManualCommand;
    use crate::zone::ZoneTarget;

    fn small_loop(capacity: usize) -> ControlLoop {
        let mut config = ControlConfig::default();
        config.window.capacity = capacity;
        ControlLoop::new(config, Environment::default()).unwrap()
    }

    fn input(values: Vec<i64>) -> TickInput {
        TickInput::new(Reading::new(values), Environment::default())
    }

    #[test]
    fn test_cold_start_has_no_record() {
        let mut control = small_loop(5);
        for i in 1..5 {
            let outcome = control.tick(input(vec![1200; 4])).unwrap();
            assert_eq!(outcome.tick, i);
            assert!(outcome.is_warming_up());
        }
        let outcome = control.tick(input(vec![1200; 4])).unwrap();
        assert!(!outcome.is_warming_up());
        assert_eq!(control.stats().warmup_ticks, 4);
        assert_eq!(control.stats().decisions, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ControlConfig::default();
        config.window.capacity = 0;
        assert!(ControlLoop::new(config, Environment::default()).is_err());
    }

    #[test]
    fn test_rejected_input_mutates_nothing() {
        let mut control = small_loop(3);
        control.tick(input(vec![1200; 4])).unwrap();
        let device_before = control.device().clone();

        let err = control.tick(input(vec![1200; 3])).unwrap_err();
        assert!(matches!(err, ReadingError::ZoneCountMismatch { .. }));

        let bad_env = TickInput::new(Reading::uniform(1200, 4), Environment::new(36.5, 150.0));
        assert!(control.tick(bad_env).is_err());

        assert_eq!(control.tick_count(), 1);
        assert_eq!(control.window().len(), 1);
        assert_eq!(control.device(), &device_before);
        assert_eq!(control.stats().rejected_inputs, 2);
    }

    #[test]
    fn test_manual_mode_switch() {
        let mut control = small_loop(2).with_mode(ControlMode::Manual(ManualCommand::Increase));
        control.tick(input(vec![1200; 4])).unwrap();
        let outcome = control.tick(input(vec![1200; 4])).unwrap();
        assert_eq!(
            outcome.action(),
            Some(&CompressionAction::Increase { zone: None })
        );

        control.set_mode(ControlMode::Autonomous);
        let outcome = control.tick(input(vec![1200; 4])).unwrap();
        assert_eq!(outcome.action(), Some(&CompressionAction::Maintain));
    }

    #[test]
    fn test_anomaly_increases_at_hottest_zone() {
        let mut control = small_loop(4);
        for _ in 0..3 {
            control.tick(input(vec![1200; 4])).unwrap();
        }
        let outcome = control.tick(input(vec![1200, 3000, 1200, 1200])).unwrap();
        let record = outcome.record.unwrap();
        assert!(record.is_anomaly);
        assert_eq!(
            record.action,
            CompressionAction::Increase {
                zone: Some(ZoneTarget::Sensor(1))
            }
        );
    }

    #[test]
    fn test_environment_flows_into_device_state() {
        let mut control = small_loop(3);
        let env = Environment::new(39.0, 15.0).with_link(false);
        let outcome = control
            .tick(TickInput::new(Reading::uniform(1200, 4), env))
            .unwrap();

        assert_eq!(outcome.device.temperature_c, 39.0);
        assert_eq!(outcome.device.sampling_rate, 9);
        assert!(outcome.device.fallback_enabled);
        assert!(outcome.shutdown_required());
        assert_eq!(outcome.threshold, 0.75);
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut control = small_loop(2);
        for _ in 0..3 {
            control.tick(input(vec![1200; 4])).unwrap();
        }
        control.reset(Environment::default());
        assert_eq!(control.tick_count(), 0);
        assert!(control.window().is_empty());
        assert!(control.last_outcome().is_none());
        assert_eq!(control.device().sampling_rate, 10);
    }

    #[test]
    fn test_latest_ranking() {
        let mut control = small_loop(2);
        assert!(control.latest_ranking().is_none());
        control.tick(input(vec![5, 9, 1, 7])).unwrap();
        let ranking = control.latest_ranking().unwrap();
        assert_eq!(ranking.max(), Some(&ZoneTarget::Sensor(1)));
        assert_eq!(ranking.min(), Some(&ZoneTarget::Sensor(2)));
    }
}
