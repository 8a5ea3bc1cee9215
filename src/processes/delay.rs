//! Fixed delay line.
//!
//! The `DelayLine` reproduces one signal of its input bus on its output bus
//! a fixed number of ticks later, like a chain of registers.

use std::collections::VecDeque;

use crate::error::SimResult;
use crate::executor::ProcessIo;
use crate::network::NetworkBuilder;
use crate::process::{Resume, Sequential};
use crate::types::{BusId, ProcessId};
use crate::value::Value;

/// A sequential process that delays a signal by `depth` ticks.
///
/// At tick `t` the output carries the value the input had at tick
/// `t - depth`. Until enough history exists, and for ticks where the input
/// had no value yet, the output carries the fill value.
#[derive(Clone, Debug)]
pub struct DelayLine {
    input: BusId,
    output: BusId,
    signal: String,
    depth: usize,
    fill: Value,
    line: VecDeque<Value>,
}

impl DelayLine {
    /// Creates a delay line. A depth below one is raised to one, the
    /// shortest delay a sequential process can produce.
    pub fn new(
        input: BusId,
        output: BusId,
        signal: impl Into<String>,
        depth: usize,
        fill: impl Into<Value>,
    ) -> Self {
        let depth = depth.max(1);
        let fill = fill.into();
        Self {
            input,
            output,
            signal: signal.into(),
            depth,
            line: VecDeque::from(vec![fill.clone(); depth - 1]),
            fill,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Registers the process, declaring its input and output.
    pub fn register(self, net: &mut NetworkBuilder, name: &str) -> SimResult<ProcessId> {
        let (input, output) = (self.input, self.output);
        net.sequential(name, self)
            .input(input)
            .output(output)
            .register()
    }
}

impl Sequential for DelayLine {
    fn init(&mut self) {
        self.line.clear();
        self.line
            .extend(std::iter::repeat(self.fill.clone()).take(self.depth - 1));
    }

    fn resume(&mut self, io: &mut ProcessIo<'_>) -> SimResult<Resume> {
        // Committed input is the value produced on the previous tick.
        let incoming = if io.can_read(self.input, &self.signal) {
            io.read(self.input, &self.signal)?
        } else {
            self.fill.clone()
        };
        self.line.push_back(incoming);
        let outgoing = self.line.pop_front().unwrap_or_else(|| self.fill.clone());
        io.write(self.output, &self.signal, outgoing)?;
        Ok(Resume::Yield)
    }
}
