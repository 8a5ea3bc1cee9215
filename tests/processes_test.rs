//! Tests for the built-in processes.
//!
//! Tests Passthrough, DelayLine, Script and Repeat inside full simulations.

use std::sync::Arc;

use tickwire::prelude::*;

fn word() -> Arc<BusShape> {
    BusShape::new("Word")
        .signal("data", SignalType::uint(8))
        .build()
        .unwrap()
}

fn reg() -> Arc<BusShape> {
    BusShape::new("Reg")
        .signal("data", SignalType::uint(8))
        .clocked()
        .initialized()
        .build()
        .unwrap()
}

fn stimulus(out: BusId, values: &[u8], idle: usize) -> Script {
    let mut script = Script::new();
    for &v in values {
        script = script.then(move |io| io.write(out, "data", v));
    }
    for _ in 0..idle {
        script = script.idle();
    }
    script
}

// ============================================================================
// Passthrough
// ============================================================================

#[test]
fn test_register_chain_matches_delay_line() {
    let mut net = NetworkBuilder::new();
    let src = net.create_bus(&word(), Some("src")).unwrap();
    let r1 = net.create_bus(&reg(), Some("r1")).unwrap();
    let r2 = net.create_bus(&reg(), Some("r2")).unwrap();
    let delayed = net.create_bus(&word(), Some("delayed")).unwrap();

    net.sequential("stim", stimulus(src, &[1, 2, 3, 4], 2))
        .output(src)
        .driver()
        .register()
        .unwrap();
    Passthrough::new(src, r1).register(&mut net, "flop1").unwrap();
    Passthrough::new(r1, r2).register(&mut net, "flop2").unwrap();
    DelayLine::new(src, delayed, "data", 1, 0u8)
        .register(&mut net, "delay")
        .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    let recorder = SignalRecorder::new()
        .watch(r2, "data")
        .watch(delayed, "data");
    let trace = recorder.handle();
    sim.add_observer(recorder);
    let outcome = sim.run().unwrap();

    assert_eq!(outcome.ticks, 6);
    let expected: Vec<Option<Value>> = [0u8, 1, 2, 3, 4, 4]
        .iter()
        .map(|&v| Some(Value::from(v)))
        .collect();
    assert_eq!(trace.column(0), expected);
    assert_eq!(trace.column(1), expected);
}

#[test]
fn test_passthrough_signal_subset() {
    let pair = BusShape::new("Pair")
        .signal("a", SignalType::uint(8))
        .signal("b", SignalType::uint(8))
        .build()
        .unwrap();
    let mut net = NetworkBuilder::new();
    let input = net.create_bus(&pair, Some("in")).unwrap();
    let output = net.create_bus(&pair, Some("out")).unwrap();
    net.mark_top_level_input(input).unwrap();
    Passthrough::new(input, output)
        .with_signals(["b"])
        .register(&mut net, "pick")
        .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    sim.drive(input, "b", 5u8).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.value(output, "a"), None);
    assert_eq!(sim.value(output, "b"), Some(&Value::UInt(5)));
}

// ============================================================================
// DelayLine
// ============================================================================

#[test]
fn test_delay_line_depth() {
    let mut net = NetworkBuilder::new();
    let src = net.create_bus(&word(), Some("src")).unwrap();
    let out = net.create_bus(&word(), Some("out")).unwrap();
    net.sequential("stim", stimulus(src, &[7, 8, 9], 3))
        .output(src)
        .driver()
        .register()
        .unwrap();
    DelayLine::new(src, out, "data", 3, 0u8)
        .register(&mut net, "delay3")
        .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    let recorder = SignalRecorder::new().watch(out, "data");
    let trace = recorder.handle();
    sim.add_observer(recorder);
    sim.run().unwrap();

    let values: Vec<u64> = trace
        .column(0)
        .into_iter()
        .map(|v| v.and_then(|v| v.as_u64()).unwrap_or(u64::MAX))
        .collect();
    assert_eq!(values, vec![0, 0, 0, 7, 8, 9]);
}

// ============================================================================
// Script and Repeat
// ============================================================================

#[test]
fn test_multiple_drivers_all_must_finish() {
    let mut net = NetworkBuilder::new();
    let a = net.create_bus(&word(), Some("a")).unwrap();
    let b = net.create_bus(&word(), Some("b")).unwrap();
    net.sequential("short", stimulus(a, &[1], 0))
        .output(a)
        .driver()
        .register()
        .unwrap();
    net.sequential("long", stimulus(b, &[1, 2, 3, 4], 0))
        .output(b)
        .driver()
        .register()
        .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    let outcome = sim.run().unwrap();
    assert_eq!(outcome.reason, StopReason::DriversFinished);
    assert_eq!(outcome.ticks, 4);
}

#[test]
fn test_repeat_runs_until_limit() {
    let mut net = NetworkBuilder::new();
    let out = net.create_internal_bus(&reg(), Some("count")).unwrap();
    net.sequential(
        "forever",
        Repeat::new(move |io: &mut ProcessIo<'_>| {
            let n = io.read_u64(out, "data")?;
            io.write(out, "data", n + 1)
        }),
    )
    .internal(out)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap().with_max_ticks(12);
    let outcome = sim.run().unwrap();
    assert_eq!(outcome.reason, StopReason::TickLimit);
    assert_eq!(sim.value(out, "data"), Some(&Value::UInt(12)));
}
