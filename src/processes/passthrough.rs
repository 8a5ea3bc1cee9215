//! Signal-copying process.
//!
//! A [`Passthrough`] copies a set of signals from its input bus to its output
//! bus. Writing a plain bus makes it a wire; writing a clocked bus makes it a
//! register, whose readers see the copied value on the next tick.

use crate::error::{SimError, SimResult};
use crate::executor::ProcessIo;
use crate::network::NetworkBuilder;
use crate::process::Combinational;
use crate::types::{BusId, ProcessId};

/// Copies signals between two buses with the same signal names.
///
/// # Example
///
/// ```rust
/// use tickwire::prelude::*;
/// use tickwire::processes::Passthrough;
///
/// let word = BusShape::new("Word").signal("data", SignalType::uint(8)).build()?;
/// let reg = BusShape::new("Reg").signal("data", SignalType::uint(8)).clocked().build()?;
///
/// let mut net = NetworkBuilder::new();
/// let d = net.create_bus(&word, Some("d"))?;
/// let q = net.create_bus(&reg, Some("q"))?;
/// net.mark_top_level_input(d)?;
/// Passthrough::new(d, q).register(&mut net, "flop")?;
/// # Ok::<(), tickwire::SimError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Passthrough {
    input: BusId,
    output: BusId,
    /// Signals to copy; every signal of the input shape when empty at registration
    signals: Vec<String>,
}

impl Passthrough {
    pub fn new(input: BusId, output: BusId) -> Self {
        Self {
            input,
            output,
            signals: Vec::new(),
        }
    }

    /// Restricts the copy to the given signals.
    pub fn with_signals<I, S>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signals = signals.into_iter().map(Into::into).collect();
        self
    }

    pub fn input(&self) -> BusId {
        self.input
    }

    pub fn output(&self) -> BusId {
        self.output
    }

    pub fn signals(&self) -> &[String] {
        &self.signals
    }

    /// Registers the process, declaring its input and output.
    pub fn register(mut self, net: &mut NetworkBuilder, name: &str) -> SimResult<ProcessId> {
        if self.signals.is_empty() {
            let input = net.bus(self.input).ok_or_else(|| SimError::InvalidDeclaration {
                process: name.to_string(),
                reason: format!("unknown input bus {}", self.input),
            })?;
            self.signals = input
                .shape()
                .signals
                .iter()
                .map(|desc| desc.name.clone())
                .collect();
        }
        let (input, output) = (self.input, self.output);
        net.combinational(name, self)
            .input(input)
            .output(output)
            .register()
    }
}

impl Combinational for Passthrough {
    fn step(&self, io: &mut ProcessIo<'_>) -> SimResult<()> {
        for signal in &self.signals {
            let value = io.read(self.input, signal)?;
            io.write(self.output, signal, value)?;
        }
        Ok(())
    }
}
