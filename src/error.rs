//! Error taxonomy of the simulation kernel.
//!
//! Errors fall into three groups:
//!
//! - **Structural** errors are raised while a network is built and validated,
//!   before tick 0. They describe a defect in the simulated design.
//! - **Runtime** errors abort the run in progress at the offending read or write.
//! - **Internal** errors signal that a kernel invariant was breached.
//!
//! None of them is retried; every one reflects a static defect in the design.

use thiserror::Error;

use crate::types::Tick;

/// Errors produced while building or running a simulation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("combinational loop without a clocked edge through: {}", processes.join(" -> "))]
    UnclockedCycle { processes: Vec<String> },

    #[error("process `{process}` reads bus `{bus}`, but no process writes it and not all of its signals have defaults")]
    NoWritingParents { process: String, bus: String },

    #[error("network has no processes")]
    EmptyNetwork,

    #[error("invalid bus shape `{shape}`: {reason}")]
    InvalidShape { shape: String, reason: String },

    #[error("invalid declaration for process `{process}`: {reason}")]
    InvalidDeclaration { process: String, reason: String },

    #[error("bus `{name}` of shape `{shape}` already exists in scope `{scope}`")]
    DuplicateBus {
        shape: String,
        name: String,
        scope: String,
    },

    #[error("no bus `{name}` of shape `{shape}` is visible from scope `{scope}`")]
    BusNotFound {
        shape: String,
        name: String,
        scope: String,
    },

    #[error("cannot pop the root scope")]
    ScopeUnderflow,

    #[error("bus `{bus}` is {kind} and cannot become {requested}")]
    InvalidBusKind {
        bus: String,
        kind: String,
        requested: String,
    },

    #[error("tick {tick}: signal `{signal}` on bus `{bus}` written by {second} after {first} already drove it")]
    WriteViolation {
        tick: Tick,
        bus: String,
        signal: String,
        first: String,
        second: String,
    },

    #[error("tick {tick}: {reader} read signal `{signal}` on bus `{bus}` before it was ever written")]
    ReadViolation {
        tick: Tick,
        bus: String,
        signal: String,
        reader: String,
    },

    #[error("bus `{bus}` has no signal named `{signal}`")]
    UnknownSignal { bus: String, signal: String },

    #[error("signal `{signal}` on bus `{bus}` expects {expected}, got {found}")]
    TypeMismatch {
        bus: String,
        signal: String,
        expected: String,
        found: String,
    },

    #[error("process `{process}` may not {access} bus `{bus}`: it is not declared for that access")]
    UndeclaredAccess {
        process: String,
        bus: String,
        access: &'static str,
    },

    #[error("bus `{bus}` is not a top-level input and cannot be driven externally")]
    NotTopLevelInput { bus: String },

    #[error("process `{process}` failed at tick {tick}: {message}")]
    ProcessFailed {
        process: String,
        tick: Tick,
        message: String,
    },

    #[error("combinational logic did not settle after {passes} passes in tick {tick}")]
    FixpointDiverged { tick: Tick, passes: usize },

    #[error("run was aborted at tick {tick}: {cause}")]
    RunAborted { tick: Tick, cause: Box<SimError> },
}

impl SimError {
    /// True for errors raised before the first tick.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SimError::UnclockedCycle { .. }
                | SimError::NoWritingParents { .. }
                | SimError::EmptyNetwork
                | SimError::InvalidShape { .. }
                | SimError::InvalidDeclaration { .. }
                | SimError::DuplicateBus { .. }
                | SimError::BusNotFound { .. }
                | SimError::ScopeUnderflow
                | SimError::InvalidBusKind { .. }
        )
    }

    /// True for errors raised while a tick is running.
    pub fn is_runtime(&self) -> bool {
        !self.is_structural() && !matches!(self, SimError::FixpointDiverged { .. })
    }
}

/// Result type for kernel operations.
pub type SimResult<T> = Result<T, SimError>;
