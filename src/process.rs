//! Process definitions and the `Combinational` / `Sequential` traits.
//!
//! Processes are the units of computation in a network. Each one declares the
//! buses it reads and writes; the declaration is what the dependency graph is
//! built from, and the executor refuses any access outside of it.
//!
//! - A **combinational** process is a pure function of its inputs. It may be
//!   evaluated several times per tick while the network settles.
//! - A **sequential** process keeps private state and is resumed exactly once
//!   per tick, before the combinational logic settles. It sees the values
//!   committed at the end of the previous tick.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SimResult;
use crate::executor::ProcessIo;
use crate::types::BusId;

/// The two scheduling categories of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessCategory {
    Combinational,
    Sequential,
}

impl fmt::Display for ProcessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessCategory::Combinational => f.write_str("combinational"),
            ProcessCategory::Sequential => f.write_str("sequential"),
        }
    }
}

/// What a sequential process wants after it has been resumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume {
    /// Suspend until the next tick
    Yield,
    /// Never resume again
    Finished,
}

/// A process whose outputs depend only on the current values of its inputs.
///
/// `step` may run more than once in a tick, so it must not keep state that
/// changes between calls.
pub trait Combinational: Send {
    fn step(&self, io: &mut ProcessIo<'_>) -> SimResult<()>;
}

/// A process with private state, resumed once per tick.
pub trait Sequential: Send {
    /// Called once before tick 0.
    fn init(&mut self) {}

    /// Runs the body for one tick.
    fn resume(&mut self, io: &mut ProcessIo<'_>) -> SimResult<Resume>;
}

/// Adapter turning a closure into a [`Combinational`] process.
pub struct FnCombinational<F>(pub F);

impl<F> Combinational for FnCombinational<F>
where
    F: Fn(&mut ProcessIo<'_>) -> SimResult<()> + Send,
{
    fn step(&self, io: &mut ProcessIo<'_>) -> SimResult<()> {
        (self.0)(io)
    }
}

/// Adapter turning a closure into a [`Sequential`] process.
pub struct FnSequential<F>(pub F);

impl<F> Sequential for FnSequential<F>
where
    F: FnMut(&mut ProcessIo<'_>) -> SimResult<Resume> + Send,
{
    fn resume(&mut self, io: &mut ProcessIo<'_>) -> SimResult<Resume> {
        (self.0)(io)
    }
}

/// Static description of a registered process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDecl {
    /// Process name, unique within the network
    pub name: String,
    pub category: ProcessCategory,
    /// Buses read with same-tick visibility (for combinational processes)
    pub inputs: Vec<BusId>,
    /// Buses read with next-tick visibility
    pub clocked_inputs: Vec<BusId>,
    /// Buses written
    pub outputs: Vec<BusId>,
    /// Private buses, both read and written
    pub internals: Vec<BusId>,
    /// The run ends once every driver has finished
    pub driver: bool,
}

impl ProcessDecl {
    pub fn new(name: impl Into<String>, category: ProcessCategory) -> Self {
        Self {
            name: name.into(),
            category,
            inputs: Vec::new(),
            clocked_inputs: Vec::new(),
            outputs: Vec::new(),
            internals: Vec::new(),
            driver: false,
        }
    }

    pub fn is_combinational(&self) -> bool {
        self.category == ProcessCategory::Combinational
    }

    pub fn may_read(&self, bus: BusId) -> bool {
        self.inputs.contains(&bus)
            || self.clocked_inputs.contains(&bus)
            || self.internals.contains(&bus)
    }

    pub fn may_write(&self, bus: BusId) -> bool {
        self.outputs.contains(&bus) || self.internals.contains(&bus)
    }

    /// Every bus this process reads, paired with whether the read is
    /// declared as clocked.
    pub fn reads(&self) -> impl Iterator<Item = (BusId, bool)> + '_ {
        self.inputs
            .iter()
            .map(|&b| (b, false))
            .chain(self.clocked_inputs.iter().map(|&b| (b, true)))
    }

    /// Every bus this process may write to.
    pub fn writes(&self) -> impl Iterator<Item = BusId> + '_ {
        self.outputs.iter().chain(self.internals.iter()).copied()
    }
}

/// Process behaviour, boxed by category.
pub(crate) enum Behavior {
    Combinational(Box<dyn Combinational>),
    Sequential(Box<dyn Sequential>),
}

impl Behavior {
    pub(crate) fn category(&self) -> ProcessCategory {
        match self {
            Behavior::Combinational(_) => ProcessCategory::Combinational,
            Behavior::Sequential(_) => ProcessCategory::Sequential,
        }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Behavior({})", self.category())
    }
}

/// A registered process: its declaration, behaviour and run state.
#[derive(Debug)]
pub(crate) struct ProcessSlot {
    pub(crate) decl: ProcessDecl,
    pub(crate) behavior: Behavior,
    pub(crate) finished: bool,
}

impl ProcessSlot {
    pub(crate) fn new(decl: ProcessDecl, behavior: Behavior) -> Self {
        Self {
            decl,
            behavior,
            finished: false,
        }
    }
}
