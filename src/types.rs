//! Core type definitions for the simulation kernel.
//!
//! Buses and processes live in arenas owned by the network; everything else
//! refers to them through the small copyable handles defined here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete logical clock value.
///
/// Tick 0 is the first tick executed by a simulation. There is no wall-clock
/// notion of time anywhere in the kernel.
pub type Tick = u64;

/// Handle to a bus in a network's bus arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusId(pub(crate) u32);

impl BusId {
    /// Returns the arena index of this bus.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus#{}", self.0)
    }
}

/// Handle to a process in a network's process arena.
///
/// Handles are assigned in registration order, which is also the tie-break
/// order used when scheduling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub(crate) u32);

impl ProcessId {
    /// Returns the arena index of this process.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process#{}", self.0)
    }
}

/// Identity of whoever wrote a signal.
///
/// Top-level input buses may be driven from outside the network by the
/// harness; those writes are attributed to [`WriterId::External`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriterId {
    /// A registered process
    Process(ProcessId),
    /// The driving harness (see `Simulation::drive`)
    External,
}

impl From<ProcessId> for WriterId {
    fn from(id: ProcessId) -> Self {
        WriterId::Process(id)
    }
}
