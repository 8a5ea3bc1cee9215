//! Integration tests for the Simulation.
//!
//! These tests verify end-to-end simulation scenarios including:
//! - Run termination (drivers, explicit stop, tick limit)
//! - Deterministic traces across runs
//! - Configuration-driven setup
//! - Network export and statistics

use std::sync::Arc;

use parking_lot::Mutex;
use tickwire::config::SimConfig;
use tickwire::prelude::*;
use tickwire::registry::ShapeRegistry;
use tickwire::{NetworkView, TickObserver};

// ============================================================================
// Test Networks
// ============================================================================

/// A driver counting 0..n into a clocked accumulator through an adder.
fn accumulator(n: u64) -> (NetworkBuilder, BusId, BusId) {
    let word = BusShape::new("Word")
        .signal("data", SignalType::uint(32))
        .build()
        .unwrap();
    let acc = BusShape::new("Acc")
        .signal("data", SignalType::uint(32))
        .clocked()
        .initialized()
        .build()
        .unwrap();

    let mut net = NetworkBuilder::new();
    let stim = net.create_bus(&word, Some("stim")).unwrap();
    let total = net.create_bus(&acc, Some("total")).unwrap();

    let mut script = Script::new();
    for i in 0..n {
        script = script.then(move |io| io.write(stim, "data", i));
    }
    net.sequential("driver", script)
        .output(stim)
        .driver()
        .register()
        .unwrap();

    net.combinational_fn("add", move |io| {
        let sum = io.read_u64(stim, "data")? + io.read_u64(total, "data")?;
        io.write(total, "data", sum)
    })
    .inputs([stim, total])
    .output(total)
    .register()
    .unwrap();

    (net, stim, total)
}

/// Records every observer hook.
#[derive(Default)]
struct Lifecycle {
    events: Arc<Mutex<Vec<String>>>,
}

impl TickObserver for Lifecycle {
    fn on_start(&mut self, network: &NetworkView) {
        self.events
            .lock()
            .push(format!("start {}", network.processes.len()));
    }

    fn on_tick(&mut self, view: &TickView<'_>) {
        self.events.lock().push(format!("tick {}", view.tick()));
    }

    fn on_finish(&mut self, _network: &NetworkView, last_tick: Option<Tick>) {
        self.events.lock().push(format!("finish {:?}", last_tick));
    }
}

// ============================================================================
// Termination
// ============================================================================

#[test]
fn test_run_ends_when_drivers_finish() {
    let (net, _, total) = accumulator(5);
    let mut sim = Simulation::from_builder(net).unwrap();
    let outcome = sim.run().unwrap();

    assert_eq!(outcome.reason, StopReason::DriversFinished);
    assert_eq!(outcome.ticks, 5);
    // 0 + 1 + 2 + 3 + 4
    assert_eq!(sim.value(total, "data"), Some(&Value::UInt(10)));
}

#[test]
fn test_tick_limit_wins_over_drivers() {
    let (net, _, _) = accumulator(100);
    let mut sim = Simulation::from_builder(net).unwrap().with_max_ticks(7);
    let outcome = sim.run().unwrap();
    assert_eq!(outcome.reason, StopReason::TickLimit);
    assert_eq!(outcome.last_tick, Some(6));
}

#[test]
fn test_process_requested_stop() {
    let word = BusShape::new("Word")
        .signal("data", SignalType::uint(8))
        .build()
        .unwrap();
    let mut net = NetworkBuilder::new();
    let out = net.create_bus(&word, Some("out")).unwrap();
    net.sequential_fn("watchdog", move |io| {
        let tick = io.tick();
        io.write(out, "data", tick)?;
        if tick == 3 {
            io.request_stop();
        }
        Ok(Resume::Yield)
    })
    .output(out)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    let outcome = sim.run().unwrap();
    assert_eq!(outcome.reason, StopReason::Requested);
    // The tick that asked for the stop still committed.
    assert_eq!(outcome.last_tick, Some(3));
    assert_eq!(sim.value(out, "data"), Some(&Value::UInt(3)));
}

#[test]
fn test_observer_lifecycle() {
    let (net, _, _) = accumulator(2);
    let mut sim = Simulation::from_builder(net).unwrap();
    let observer = Lifecycle::default();
    let events = observer.events.clone();
    sim.add_observer(observer);
    sim.run().unwrap();

    assert_eq!(
        *events.lock(),
        vec!["start 2", "tick 0", "tick 1", "finish Some(1)"]
    );
}

// ============================================================================
// Determinism
// ============================================================================

fn traced_run() -> String {
    let (net, stim, total) = accumulator(6);
    let mut sim = Simulation::from_builder(net).unwrap();
    let recorder = SignalRecorder::new()
        .watch(stim, "data")
        .watch(total, "data");
    let trace = recorder.handle();
    sim.add_observer(recorder);
    sim.run().unwrap();
    trace.to_csv()
}

#[test]
fn test_runs_are_deterministic() {
    let first = traced_run();
    let second = traced_run();
    assert_eq!(first, second);

    let lines: Vec<&str> = first.lines().collect();
    assert_eq!(lines[0], "tick,root/stim.data,root/total.data");
    assert_eq!(lines[1], "0,0,0");
    assert_eq!(lines[3], "2,2,3");
    assert_eq!(lines.len(), 7);
}

// ============================================================================
// Configuration
// ============================================================================

const CONFIG: &str = r#"
simulation:
  name: config-driven
  max_ticks: 4
  warn_latches: false
  collect_stats: true

shapes:
  - name: Counter
    clocked: true
    initialized: true
    signals:
      - name: count
        ty: { kind: uint, bits: 8 }
  - name: Flag
    signals:
      - name: on
        ty: { kind: bool }
        default: false
"#;

#[test]
fn test_config_driven_simulation() {
    let config = SimConfig::from_yaml(CONFIG).unwrap();
    let shapes = ShapeRegistry::from_config(&config).unwrap();
    let counter = shapes.require("Counter").unwrap();

    let mut net = NetworkBuilder::new();
    let count = net.create_bus(&counter, Some("count")).unwrap();
    net.combinational_fn("tick", move |io| {
        let n = io.read_u64(count, "count")?;
        io.write(count, "count", n + 1)
    })
    .input(count)
    .output(count)
    .register()
    .unwrap();

    let mut sim = Simulation::from_config(net.build().unwrap(), &config);
    assert!(!sim.params().warn_latches);
    let outcome = sim.run().unwrap();
    assert_eq!(outcome.reason, StopReason::TickLimit);
    assert_eq!(sim.value(count, "count"), Some(&Value::UInt(4)));

    let stats = sim.stats();
    assert_eq!(stats.metadata.name, "config-driven");
    assert_eq!(stats.scheduler.ticks_executed, 4);
    assert_eq!(stats.network.combinational_count, 1);
    assert!(stats.to_csv().contains("ticks_executed,4"));
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_network_view_export() {
    let (net, _, _) = accumulator(1);
    let sim = Simulation::from_builder(net).unwrap();
    let view = sim.network_view();

    assert_eq!(view.processes.len(), 2);
    assert_eq!(view.bus("root/total").unwrap().kind, BusKind::Clocked);
    assert_eq!(view.order.len(), 1);

    let json = view.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["processes"][0]["name"], "driver");
    assert_eq!(parsed["processes"][0]["category"], "sequential");
    assert_eq!(parsed["buses"][1]["kind"], "clocked");
}

#[test]
fn test_stats_after_run() {
    let (net, _, _) = accumulator(3);
    let mut sim = Simulation::from_builder(net).unwrap();
    sim.run().unwrap();

    let stats = sim.stats();
    assert_eq!(stats.scheduler.ticks_executed, 3);
    assert_eq!(stats.scheduler.seq_resumes, 3);
    assert_eq!(stats.scheduler.comb_invocations, 3);
    assert_eq!(stats.scheduler.max_passes, 1);
    assert_eq!(stats.network.process_count, 2);
    assert_eq!(stats.metadata.stop_reason.as_deref(), Some("drivers finished"));
    assert!(stats.summary().contains("Ticks executed: 3"));
}
