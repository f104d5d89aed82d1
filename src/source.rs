//! Tick input sources.

use crate::reading::{Environment, Reading, TickInput};
use std::collections::VecDeque;

/// Produces one input per sampling tick.
pub trait SampleSource {
    /// Next input, or `None` once the source is exhausted.
    fn next_input(&mut self) -> Option<TickInput>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_input(&mut self) -> Option<TickInput> {
        (**self).next_input()
    }
}

/// Replays a fixed list of inputs in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    inputs: VecDeque<TickInput>,
}

impl ScriptedSource {
    pub fn new(inputs: impl IntoIterator<Item = TickInput>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
        }
    }

    /// `count` copies of one reading under one environment.
    pub fn repeat(reading: Reading, environment: Environment, count: usize) -> Self {
        Self::new(std::iter::repeat(TickInput::new(reading, environment)).take(count))
    }

    pub fn push(&mut self, input: TickInput) {
        self.inputs.push_back(input);
    }

    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }
}

impl SampleSource for ScriptedSource {
    fn next_input(&mut self) -> Option<TickInput> {
        self.inputs.pop_front()
    }
}
