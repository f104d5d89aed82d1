//! Session - a control loop bound to an event log.

use crate::engine::{ControlLoop, TickOutcome};
use crate::error::{AllayrError, Result};
use crate::event_log::EventLog;
use crate::reading::TickInput;
use crate::source::SampleSource;
use log::{error, warn};

/// Runs ticks and persists every decision.
#[derive(Debug)]
pub struct Session<L: EventLog> {
    control: ControlLoop,
    log: L,
}

impl<L: EventLog> Session<L> {
    pub fn new(control: ControlLoop, log: L) -> Self {
        Self { control, log }
    }

    /// Run one tick and append its record, if any.
    ///
    /// A failed append does not undo the tick: the outcome is returned
    /// inside [`AllayrError::LogWriteFailure`].
    pub fn step(&mut self, input: TickInput) -> Result<TickOutcome> {
        let outcome = self.control.tick(input)?;

        if let Some(record) = &outcome.record {
            if let Err(source) = self.log.append(&record.to_entry()) {
                error!("Failed to persist tick {}: {}", outcome.tick, source);
                self.control.stats_mut().record_log_failure();
                return Err(AllayrError::LogWriteFailure {
                    outcome: Box::new(outcome),
                    source,
                });
            }
        }

        Ok(outcome)
    }

    /// Drain a source, stopping after `limit` inputs if given.
    ///
    /// Rejected inputs and failed appends are counted in the loop stats and
    /// the run carries on, as a long-running host would. Returns the number
    /// of inputs consumed.
    pub fn run<S: SampleSource + ?Sized>(&mut self, source: &mut S, limit: Option<u64>) -> Result<u64> {
        let mut ran = 0;
        while limit.map_or(true, |l| ran < l) {
            let Some(input) = source.next_input() else {
                break;
            };
            ran += 1;
            match self.step(input) {
                Ok(_) => {}
                Err(AllayrError::LogWriteFailure { .. }) => {}
                Err(AllayrError::InvalidInput(e)) => warn!("Skipping input {}: {}", ran, e),
                Err(e) => return Err(e),
            }
        }
        Ok(ran)
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut ControlLoop {
        &mut self.control
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn into_parts(self) -> (ControlLoop, L) {
        (self.control, self.log)
    }
}
