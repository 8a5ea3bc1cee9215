//! Per-tick execution machinery.
//!
//! [`TickExecutor`] owns a validated network and runs one tick at a time:
//! external drives, sequential resumes, combinational settling and commit.
//! Processes never touch buses directly; each invocation receives a
//! [`ProcessIo`] that checks every access against the process declaration
//! and turns bus faults into [`SimError`]s naming the parties involved.

pub mod tick;

use crate::bus::{Bus, SignalFault};
use crate::error::{SimError, SimResult};
use crate::process::ProcessDecl;
use crate::types::{BusId, ProcessId, Tick, WriterId};
use crate::value::Value;

pub use tick::{TickExecutor, TickExecutorStats, TickReport};

/// Human-readable description of a writer for error messages.
pub(crate) fn describe_writer(names: &[String], writer: WriterId) -> String {
    match writer {
        WriterId::Process(id) => match names.get(id.index()) {
            Some(name) => format!("process `{}`", name),
            None => format!("{}", id),
        },
        WriterId::External => "external driver".to_string(),
    }
}

/// Maps a bus fault to the error reported to the user.
pub(crate) fn fault_to_error(
    fault: SignalFault,
    bus: &Bus,
    signal: &str,
    tick: Tick,
    names: &[String],
    actor: WriterId,
) -> SimError {
    match fault {
        SignalFault::Unknown => SimError::UnknownSignal {
            bus: bus.path().to_string(),
            signal: signal.to_string(),
        },
        SignalFault::Type { expected, found } => SimError::TypeMismatch {
            bus: bus.path().to_string(),
            signal: signal.to_string(),
            expected,
            found: found.to_string(),
        },
        SignalFault::Conflict { first } => SimError::WriteViolation {
            tick,
            bus: bus.path().to_string(),
            signal: signal.to_string(),
            first: describe_writer(names, first),
            second: describe_writer(names, actor),
        },
        SignalFault::Unset => SimError::ReadViolation {
            tick,
            bus: bus.path().to_string(),
            signal: signal.to_string(),
            reader: describe_writer(names, actor),
        },
    }
}

/// Bus access handed to a process for one invocation.
///
/// Reads and writes are restricted to the buses the process declared.
/// Combinational processes see same-tick writes on plain buses; sequential
/// processes, clocked inputs and clocked buses see committed values only.
pub struct ProcessIo<'a> {
    pid: ProcessId,
    decl: &'a ProcessDecl,
    buses: &'a mut [Bus],
    names: &'a [String],
    tick: Tick,
    latest: bool,
    pub(crate) stale: bool,
    pub(crate) stop_requested: bool,
}

impl<'a> ProcessIo<'a> {
    pub(crate) fn new(
        pid: ProcessId,
        decl: &'a ProcessDecl,
        buses: &'a mut [Bus],
        names: &'a [String],
        tick: Tick,
        latest: bool,
    ) -> Self {
        Self {
            pid,
            decl,
            buses,
            names,
            tick,
            latest,
            stale: false,
            stop_requested: false,
        }
    }

    /// The tick in progress.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Handle of the running process.
    pub fn process(&self) -> ProcessId {
        self.pid
    }

    /// Name of the running process.
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    fn undeclared(&self, bus: BusId, access: &'static str) -> SimError {
        let bus = self
            .buses
            .get(bus.index())
            .map(|b| b.path().to_string())
            .unwrap_or_else(|| bus.to_string());
        SimError::UndeclaredAccess {
            process: self.decl.name.clone(),
            bus,
            access,
        }
    }

    fn target(&mut self, bus: BusId, access: &'static str) -> SimResult<&mut Bus> {
        let decl = self.decl;
        self.buses
            .get_mut(bus.index())
            .ok_or_else(|| SimError::UndeclaredAccess {
                process: decl.name.clone(),
                bus: bus.to_string(),
                access,
            })
    }

    fn sees_latest(&self, bus: BusId) -> bool {
        self.latest && !self.decl.clocked_inputs.contains(&bus)
    }

    /// Reads a signal from a declared input or internal bus.
    pub fn read(&mut self, bus: BusId, signal: &str) -> SimResult<Value> {
        if !self.decl.may_read(bus) {
            return Err(self.undeclared(bus, "read"));
        }
        let latest = self.sees_latest(bus);
        let (tick, names, actor) = (self.tick, self.names, WriterId::Process(self.pid));
        let target = self.target(bus, "read")?;
        target
            .read(signal, latest)
            .map_err(|fault| fault_to_error(fault, target, signal, tick, names, actor))
    }

    fn decode<T>(
        &mut self,
        bus: BusId,
        signal: &str,
        expected: &str,
        f: impl FnOnce(&Value) -> Option<T>,
    ) -> SimResult<T> {
        let value = self.read(bus, signal)?;
        f(&value).ok_or_else(|| SimError::TypeMismatch {
            bus: self.buses[bus.index()].path().to_string(),
            signal: signal.to_string(),
            expected: expected.to_string(),
            found: value.kind_name().to_string(),
        })
    }

    pub fn read_bool(&mut self, bus: BusId, signal: &str) -> SimResult<bool> {
        self.decode(bus, signal, "bool", Value::as_bool)
    }

    pub fn read_u64(&mut self, bus: BusId, signal: &str) -> SimResult<u64> {
        self.decode(bus, signal, "unsigned integer", Value::as_u64)
    }

    pub fn read_i64(&mut self, bus: BusId, signal: &str) -> SimResult<i64> {
        self.decode(bus, signal, "signed integer", Value::as_i64)
    }

    pub fn read_array(&mut self, bus: BusId, signal: &str) -> SimResult<Vec<Value>> {
        self.decode(bus, signal, "array", |v| v.as_array().map(<[Value]>::to_vec))
    }

    /// True if reading the signal now would succeed.
    pub fn can_read(&self, bus: BusId, signal: &str) -> bool {
        if !self.decl.may_read(bus) {
            return false;
        }
        let latest = self.sees_latest(bus);
        self.buses
            .get(bus.index())
            .map(|b| b.can_read(signal, latest))
            .unwrap_or(false)
    }

    /// Writes a signal on a declared output or internal bus.
    pub fn write(&mut self, bus: BusId, signal: &str, value: impl Into<Value>) -> SimResult<()> {
        if !self.decl.may_write(bus) {
            return Err(self.undeclared(bus, "write"));
        }
        let (tick, names, actor) = (self.tick, self.names, WriterId::Process(self.pid));
        let target = self.target(bus, "write")?;
        let stale = target
            .write(signal, value.into(), actor)
            .map_err(|fault| fault_to_error(fault, target, signal, tick, names, actor))?;
        self.stale |= stale;
        Ok(())
    }

    /// Asks the simulation to stop once the current tick has committed.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Builds the error a process returns when one of its own checks fails.
    pub fn fail(&self, message: impl Into<String>) -> SimError {
        SimError::ProcessFailed {
            process: self.decl.name.clone(),
            tick: self.tick,
            message: message.into(),
        }
    }
}
