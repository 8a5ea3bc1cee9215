//! Simulation run loop.
//!
//! A [`Simulation`] owns a validated [`Network`] and advances its logical
//! clock one tick at a time until something ends the run:
//!
//! - a process called [`ProcessIo::request_stop`](crate::executor::ProcessIo::request_stop)
//!   or a [`StopHandle`] was triggered;
//! - every process marked as a driver has finished;
//! - the configured tick limit was reached.
//!
//! The tick in progress always completes before the run ends. Any error
//! aborts the run immediately and is returned to the caller; the simulation
//! is then unusable and every later call fails with
//! [`SimError::RunAborted`](crate::error::SimError::RunAborted).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{SimConfig, SimulationParams};
use crate::error::{SimError, SimResult};
use crate::executor::{TickExecutor, TickReport};
use crate::network::{Network, NetworkBuilder};
use crate::observer::{FnObserver, TickObserver, TickView};
use crate::stats::{NetworkStats, SchedulerStats, SimulationStats, Timer};
use crate::types::{BusId, Tick};
use crate::value::Value;
use crate::view::NetworkView;

/// Shared flag that ends a run after the current tick.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A process or a [`StopHandle`] asked for the stop
    Requested,
    /// Every driver process finished
    DriversFinished,
    /// The tick limit was reached
    TickLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Requested => write!(f, "stop requested"),
            StopReason::DriversFinished => write!(f, "drivers finished"),
            StopReason::TickLimit => write!(f, "tick limit"),
        }
    }
}

/// Summary of a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    /// Ticks committed by this run
    pub ticks: u64,
    /// Last committed tick, if any
    pub last_tick: Option<Tick>,
    pub reason: StopReason,
}

/// Drives a validated network.
///
/// # Example
///
/// ```
/// use tickwire::prelude::*;
///
/// let word = BusShape::new("Word").signal("data", SignalType::uint(8)).build()?;
/// let mut net = NetworkBuilder::new();
/// let out = net.create_bus(&word, Some("out"))?;
/// let script = Script::new()
///     .then(move |io| io.write(out, "data", 1u8))
///     .then(move |io| io.write(out, "data", 2u8));
/// net.sequential("count", script).output(out).driver().register()?;
///
/// let mut sim = Simulation::new(net.build()?);
/// let outcome = sim.run()?;
/// assert_eq!(outcome.reason, StopReason::DriversFinished);
/// assert_eq!(sim.value(out, "data"), Some(&Value::UInt(2)));
/// # Ok::<(), tickwire::SimError>(())
/// ```
pub struct Simulation {
    executor: TickExecutor,
    params: SimulationParams,
    observers: Vec<Box<dyn TickObserver>>,
    stop: StopHandle,
    next_tick: Tick,
    last_tick: Option<Tick>,
    started: bool,
    record: SimulationStats,
    wall_time_ms: f64,
    aborted: Option<(Tick, SimError)>,
}

impl Simulation {
    /// Creates a simulation with default parameters.
    pub fn new(network: Network) -> Self {
        Self {
            executor: TickExecutor::new(network),
            params: SimulationParams::default(),
            observers: Vec::new(),
            stop: StopHandle::default(),
            next_tick: 0,
            last_tick: None,
            started: false,
            record: SimulationStats::new(),
            wall_time_ms: 0.0,
            aborted: None,
        }
    }

    /// Validates the builder's network and wraps it.
    pub fn from_builder(builder: NetworkBuilder) -> SimResult<Self> {
        Ok(Self::new(builder.build()?))
    }

    /// Creates a simulation using the run parameters of a configuration.
    pub fn from_config(network: Network, config: &SimConfig) -> Self {
        Self::new(network).with_params(config.simulation.clone())
    }

    pub fn with_params(mut self, params: SimulationParams) -> Self {
        self.executor = self.executor.with_latch_warnings(params.warn_latches);
        self.params = params;
        self
    }

    /// Sets the tick limit.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.params.max_ticks = Some(ticks);
        self
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn add_observer(&mut self, observer: impl TickObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Registers a closure called after every committed tick.
    pub fn on_tick<F>(&mut self, f: F)
    where
        F: FnMut(&TickView<'_>) + Send + 'static,
    {
        self.add_observer(FnObserver(f));
    }

    /// Handle that can end the run from an observer or another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn network(&self) -> &Network {
        self.executor.network()
    }

    pub fn network_view(&self) -> NetworkView {
        self.executor.network().view()
    }

    /// The tick the next call to [`step`](Self::step) will run.
    pub fn current_tick(&self) -> Tick {
        self.next_tick
    }

    pub fn last_tick(&self) -> Option<Tick> {
        self.last_tick
    }

    /// Committed value of a signal.
    pub fn value(&self, bus: BusId, signal: &str) -> Option<&Value> {
        self.executor
            .network()
            .bus(bus)
            .and_then(|b| b.value(signal))
    }

    /// True once a tick failed; the run cannot continue.
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    fn ensure_live(&self) -> SimResult<()> {
        match &self.aborted {
            Some((tick, cause)) => Err(SimError::RunAborted {
                tick: *tick,
                cause: Box::new(cause.clone()),
            }),
            None => Ok(()),
        }
    }

    /// Stages a write to a top-level input bus for the next tick.
    pub fn drive(&mut self, bus: BusId, signal: &str, value: impl Into<Value>) -> SimResult<()> {
        self.ensure_live()?;
        self.executor.stage_drive(bus, signal, value, self.next_tick)
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.executor.init();
        let view = self.executor.network().view();
        for observer in &mut self.observers {
            observer.on_start(&view);
        }
    }

    /// Runs a single tick and notifies the observers.
    pub fn step(&mut self) -> SimResult<TickReport> {
        self.ensure_live()?;
        self.start();
        let tick = self.next_tick;
        let report = match self.executor.step_tick(tick) {
            Ok(report) => report,
            Err(e) => {
                self.aborted = Some((tick, e.clone()));
                return Err(e);
            }
        };

        let view = TickView::new(tick, self.executor.network().buses());
        for observer in &mut self.observers {
            observer.on_tick(&view);
        }

        if report.stop_requested {
            self.stop.stop();
        }
        self.last_tick = Some(tick);
        self.next_tick += 1;
        Ok(report)
    }

    /// Ticks until a stop condition holds.
    pub fn run(&mut self) -> SimResult<RunOutcome> {
        self.ensure_live()?;
        let timer = Timer::start();
        let first_tick = self.next_tick;
        self.record.record_start();

        info!(
            name = %self.params.name,
            processes = self.network().process_count(),
            buses = self.network().bus_count(),
            max_ticks = ?self.params.max_ticks,
            "simulation starting"
        );
        if !self.executor.has_drivers() && self.params.max_ticks.is_none() {
            warn!("no driver processes and no tick limit; the run ends only on an explicit stop");
        }

        self.start();
        let reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Requested;
            }
            if let Some(max) = self.params.max_ticks {
                if self.next_tick >= max {
                    break StopReason::TickLimit;
                }
            }

            if let Err(e) = self.step() {
                error!(tick = self.next_tick, error = %e, "simulation aborted");
                self.wall_time_ms += timer.elapsed_ms();
                return Err(e);
            }

            if self.stop.is_stopped() {
                break StopReason::Requested;
            }
            if self.executor.drivers_done() {
                break StopReason::DriversFinished;
            }
        };

        self.wall_time_ms += timer.elapsed_ms();
        self.record.record_end();
        self.record.metadata.stop_reason = Some(reason.to_string());

        let view = self.executor.network().view();
        for observer in &mut self.observers {
            observer.on_finish(&view, self.last_tick);
        }

        let outcome = RunOutcome {
            ticks: self.next_tick - first_tick,
            last_tick: self.last_tick,
            reason,
        };
        info!(
            ticks = outcome.ticks,
            last_tick = ?outcome.last_tick,
            reason = %reason,
            "simulation finished"
        );
        if self.params.collect_stats {
            info!("\n{}", self.stats().summary());
        }
        Ok(outcome)
    }

    /// Statistics gathered so far.
    pub fn stats(&self) -> SimulationStats {
        let mut stats = self.record.clone().with_name(self.params.name.clone());
        stats.network = NetworkStats::from_network(self.executor.network());
        stats.scheduler = SchedulerStats::from(self.executor.stats());
        stats.compute_timing(self.wall_time_ms);
        stats
    }
}
