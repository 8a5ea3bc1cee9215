//! Tick-driven executor.
//!
//! One call to [`TickExecutor::step_tick`] runs a full tick:
//!
//! 1. apply staged external drives to top-level input buses;
//! 2. **resume** every live sequential process once, in registration order;
//! 3. **stabilize**: evaluate the combinational processes in dependency order,
//!    repeating whole passes while some pass read a value that changed later
//!    in the same pass;
//! 4. **commit** every bus, promoting clocked shadow values and clearing the
//!    per-tick write bookkeeping.
//!
//! Read and write violations surface at the offending access and abort the
//! tick before commit; the aborted tick's writes are discarded.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

use crate::bus::BusKind;
use crate::error::{SimError, SimResult};
use crate::executor::{fault_to_error, ProcessIo};
use crate::network::Network;
use crate::process::{Behavior, ProcessSlot, Resume};
use crate::types::{BusId, ProcessId, Tick, WriterId};
use crate::value::Value;

/// Statistics collected by the tick executor.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TickExecutorStats {
    /// Total number of ticks committed
    pub ticks_executed: u64,
    /// Total number of combinational step calls
    pub comb_invocations: u64,
    /// Total number of sequential resumes
    pub seq_resumes: u64,
    /// Total number of stabilization passes
    pub passes: u64,
    /// Most passes needed by any single tick
    pub max_passes: usize,
    /// External writes applied to top-level inputs
    pub drives_applied: u64,
}

/// Outcome of one committed tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Tick,
    /// Stabilization passes the tick needed
    pub passes: usize,
    /// Some process asked the run to stop
    pub stop_requested: bool,
}

struct Drive {
    bus: BusId,
    signal: String,
    value: Value,
}

/// Runs the ticks of a validated network.
pub struct TickExecutor {
    network: Network,
    pending: Vec<Drive>,
    warn_latches: bool,
    latches: HashSet<(ProcessId, BusId)>,
    stats: TickExecutorStats,
}

impl TickExecutor {
    /// Creates an executor with latch warnings enabled.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            pending: Vec::new(),
            warn_latches: true,
            latches: HashSet::new(),
            stats: TickExecutorStats::default(),
        }
    }

    /// Enables or disables the unwritten-output warning.
    pub fn with_latch_warnings(mut self, enabled: bool) -> Self {
        self.warn_latches = enabled;
        self
    }

    /// Initializes every sequential process. Called once before tick 0.
    pub fn init(&mut self) {
        self.pending.clear();
        self.latches.clear();
        self.stats = TickExecutorStats::default();
        for slot in &mut self.network.processes {
            slot.finished = false;
            if let Behavior::Sequential(process) = &mut slot.behavior {
                process.init();
            }
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn stats(&self) -> &TickExecutorStats {
        &self.stats
    }

    /// Stages an external write, applied at the start of the next tick.
    ///
    /// The value is type-checked now so mistakes surface at the call site.
    pub fn stage_drive(
        &mut self,
        bus: BusId,
        signal: &str,
        value: impl Into<Value>,
        tick: Tick,
    ) -> SimResult<()> {
        let target = self
            .network
            .buses
            .get(bus.index())
            .ok_or_else(|| SimError::NotTopLevelInput {
                bus: bus.to_string(),
            })?;
        if target.kind() != BusKind::TopLevelInput {
            return Err(SimError::NotTopLevelInput {
                bus: target.path().to_string(),
            });
        }
        let value = target.check(signal, value.into()).map_err(|fault| {
            fault_to_error(
                fault,
                target,
                signal,
                tick,
                &self.network.names,
                WriterId::External,
            )
        })?;
        self.pending.push(Drive {
            bus,
            signal: signal.to_string(),
            value,
        });
        Ok(())
    }

    /// True when the network has driver processes and all of them finished.
    pub fn drivers_done(&self) -> bool {
        let mut drivers = self
            .network
            .processes
            .iter()
            .filter(|slot| slot.decl.driver)
            .peekable();
        drivers.peek().is_some() && drivers.all(|slot| slot.finished)
    }

    pub fn has_drivers(&self) -> bool {
        self.network.processes.iter().any(|slot| slot.decl.driver)
    }

    /// Executes a single tick.
    ///
    /// On error nothing is committed: staged drives and every write of the
    /// aborted tick are dropped.
    pub fn step_tick(&mut self, tick: Tick) -> SimResult<TickReport> {
        let result = self.execute(tick);
        if result.is_err() {
            self.pending.clear();
            for bus in &mut self.network.buses {
                bus.discard();
            }
        }
        result
    }

    fn execute(&mut self, tick: Tick) -> SimResult<TickReport> {
        let Network {
            buses,
            processes,
            names,
            graph,
        } = &mut self.network;
        let names: &[String] = names;

        for drive in self.pending.drain(..) {
            let target = &mut buses[drive.bus.index()];
            target
                .write(&drive.signal, drive.value, WriterId::External)
                .map_err(|fault| {
                    fault_to_error(fault, target, &drive.signal, tick, names, WriterId::External)
                })?;
            self.stats.drives_applied += 1;
        }

        let mut stop_requested = false;

        // Resume
        for (i, slot) in processes.iter_mut().enumerate() {
            let ProcessSlot {
                decl,
                behavior,
                finished,
            } = slot;
            let process = match behavior {
                Behavior::Sequential(process) if !*finished => process,
                _ => continue,
            };
            let pid = ProcessId::from_index(i);
            let mut io = ProcessIo::new(pid, decl, buses.as_mut_slice(), names, tick, false);
            trace!(tick, process = %decl.name, "resume");
            let resume = process.resume(&mut io)?;
            stop_requested |= io.stop_requested;
            self.stats.seq_resumes += 1;
            if resume == Resume::Finished {
                debug!(tick, process = %decl.name, "sequential process finished");
                *finished = true;
            }
        }

        // Stabilize
        let bound = processes.len() + 1;
        let mut passes = 0;
        loop {
            passes += 1;
            if passes > bound {
                return Err(SimError::FixpointDiverged {
                    tick,
                    passes: bound,
                });
            }
            for bus in buses.iter_mut() {
                bus.begin_pass();
            }
            let mut stale = false;
            for &pid in graph.order() {
                let slot = &processes[pid.index()];
                if let Behavior::Combinational(process) = &slot.behavior {
                    let mut io =
                        ProcessIo::new(pid, &slot.decl, buses.as_mut_slice(), names, tick, true);
                    trace!(tick, pass = passes, process = %slot.decl.name, "step");
                    process.step(&mut io)?;
                    stale |= io.stale;
                    stop_requested |= io.stop_requested;
                    self.stats.comb_invocations += 1;
                }
            }
            if !stale {
                break;
            }
        }

        if self.warn_latches {
            for &pid in graph.order() {
                let decl = &processes[pid.index()].decl;
                for &bus in &decl.outputs {
                    let target = &buses[bus.index()];
                    if target.is_clocked() {
                        continue;
                    }
                    let missing = target.unwritten_signals();
                    if !missing.is_empty() && self.latches.insert((pid, bus)) {
                        warn!(
                            tick,
                            process = %decl.name,
                            bus = %target.path(),
                            signals = ?missing,
                            "combinational process left output signals unwritten; they keep their previous value"
                        );
                    }
                }
            }
        }

        // Commit
        for bus in buses.iter_mut() {
            bus.commit();
        }

        self.stats.ticks_executed += 1;
        self.stats.passes += passes as u64;
        self.stats.max_passes = self.stats.max_passes.max(passes);
        debug!(tick, passes, "tick committed");

        Ok(TickReport {
            tick,
            passes,
            stop_requested,
        })
    }

    /// Exports executor statistics as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "ticks_executed": self.stats.ticks_executed,
            "comb_invocations": self.stats.comb_invocations,
            "seq_resumes": self.stats.seq_resumes,
            "passes": self.stats.passes,
            "max_passes": self.stats.max_passes,
            "drives_applied": self.stats.drives_applied,
        })
    }
}
