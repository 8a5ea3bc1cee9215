//! Tick observers.
//!
//! Observers are called after every commit with a [`TickView`] of the
//! now-stable signal values. Plain buses show the values produced during the
//! tick; clocked buses show the values their readers will see next tick.
//! Observers cannot write to the network.

use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::bus::Bus;
use crate::types::{BusId, Tick};
use crate::value::Value;
use crate::view::NetworkView;

/// Read-only access to bus values at a tick boundary.
pub struct TickView<'a> {
    tick: Tick,
    buses: &'a [Bus],
}

impl<'a> TickView<'a> {
    pub(crate) fn new(tick: Tick, buses: &'a [Bus]) -> Self {
        Self { tick, buses }
    }

    /// The tick that just committed.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn bus(&self, id: BusId) -> Option<&'a Bus> {
        self.buses.get(id.index())
    }

    pub fn buses(&self) -> &'a [Bus] {
        self.buses
    }

    /// Value of a signal, or `None` if it has never been set.
    pub fn read(&self, bus: BusId, signal: &str) -> Option<&'a Value> {
        self.bus(bus).and_then(|b| b.value(signal))
    }
}

/// Hooks called around and during a run.
pub trait TickObserver: Send {
    /// Called once before tick 0.
    fn on_start(&mut self, _network: &NetworkView) {}

    /// Called after every committed tick.
    fn on_tick(&mut self, view: &TickView<'_>);

    /// Called once after the run, with the last committed tick if any.
    fn on_finish(&mut self, _network: &NetworkView, _last_tick: Option<Tick>) {}
}

/// Adapter turning a closure into a [`TickObserver`].
pub struct FnObserver<F>(pub F);

impl<F> TickObserver for FnObserver<F>
where
    F: FnMut(&TickView<'_>) + Send,
{
    fn on_tick(&mut self, view: &TickView<'_>) {
        (self.0)(view)
    }
}

/// One recorded tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceRow {
    pub tick: Tick,
    /// One entry per watched signal, in watch order
    pub values: Vec<Option<Value>>,
}

#[derive(Debug, Default)]
struct Trace {
    columns: Vec<String>,
    rows: Vec<TraceRow>,
}

/// Records selected signals every tick.
///
/// The recorder is moved into the simulation; keep a [`TraceHandle`] to read
/// the trace afterwards.
#[derive(Debug)]
pub struct SignalRecorder {
    watched: Vec<(BusId, String)>,
    trace: Arc<Mutex<Trace>>,
}

impl Default for SignalRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalRecorder {
    pub fn new() -> Self {
        Self {
            watched: Vec::new(),
            trace: Arc::new(Mutex::new(Trace::default())),
        }
    }

    /// Adds a signal to the trace.
    pub fn watch(mut self, bus: BusId, signal: impl Into<String>) -> Self {
        self.watched.push((bus, signal.into()));
        self
    }

    /// Shared handle to the recorded trace.
    pub fn handle(&self) -> TraceHandle {
        TraceHandle {
            trace: self.trace.clone(),
        }
    }
}

impl TickObserver for SignalRecorder {
    fn on_start(&mut self, network: &NetworkView) {
        let mut trace = self.trace.lock();
        trace.rows.clear();
        trace.columns = self
            .watched
            .iter()
            .map(|(bus, signal)| {
                let path = network
                    .buses
                    .get(bus.index())
                    .map(|b| b.path.clone())
                    .unwrap_or_else(|| bus.to_string());
                format!("{}.{}", path, signal)
            })
            .collect();
    }

    fn on_tick(&mut self, view: &TickView<'_>) {
        let values = self
            .watched
            .iter()
            .map(|(bus, signal)| view.read(*bus, signal).cloned())
            .collect();
        self.trace.lock().rows.push(TraceRow {
            tick: view.tick(),
            values,
        });
    }
}

/// Read access to a [`SignalRecorder`]'s trace.
#[derive(Clone, Debug)]
pub struct TraceHandle {
    trace: Arc<Mutex<Trace>>,
}

impl TraceHandle {
    /// Column names, `bus-path.signal`.
    pub fn columns(&self) -> Vec<String> {
        self.trace.lock().columns.clone()
    }

    pub fn rows(&self) -> Vec<TraceRow> {
        self.trace.lock().rows.clone()
    }

    pub fn len(&self) -> usize {
        self.trace.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of one watched signal across all recorded ticks.
    pub fn column(&self, index: usize) -> Vec<Option<Value>> {
        self.trace
            .lock()
            .rows
            .iter()
            .map(|row| row.values.get(index).cloned().flatten())
            .collect()
    }

    /// Exports the trace as CSV, one row per tick. Unset values are empty.
    pub fn to_csv(&self) -> String {
        let trace = self.trace.lock();
        let mut csv = String::from("tick");
        for column in &trace.columns {
            csv.push(',');
            csv.push_str(&escape(column));
        }
        csv.push('\n');

        for row in &trace.rows {
            let _ = write!(csv, "{}", row.tick);
            for value in &row.values {
                csv.push(',');
                if let Some(value) = value {
                    csv.push_str(&escape(&value.to_string()));
                }
            }
            csv.push('\n');
        }
        csv
    }
}

fn escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
