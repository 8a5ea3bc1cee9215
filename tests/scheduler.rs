//! Tests for the per-tick scheduler.
//!
//! These tests verify the tick semantics:
//! - Same-tick propagation through plain buses
//! - Next-tick visibility of clocked buses
//! - Write and read violations
//! - Declared-access and type enforcement

use std::sync::Arc;

use tickwire::prelude::*;
use tickwire::TickExecutor;

// ============================================================================
// Helpers
// ============================================================================

fn word(bits: u8) -> Arc<BusShape> {
    BusShape::new(format!("Word{}", bits))
        .signal("data", SignalType::uint(bits))
        .build()
        .unwrap()
}

fn register(bits: u8) -> Arc<BusShape> {
    BusShape::new(format!("Reg{}", bits))
        .signal("data", SignalType::uint(bits))
        .clocked()
        .initialized()
        .build()
        .unwrap()
}

fn data(sim: &Simulation, bus: BusId) -> Option<u64> {
    sim.value(bus, "data").and_then(Value::as_u64)
}

// ============================================================================
// Same-tick propagation
// ============================================================================

#[test]
fn test_reducer_sees_all_inputs_in_one_tick() {
    let operand = BusShape::new("Operand")
        .signal_with_default("valid", SignalType::Bool, false)
        .signal("value", SignalType::uint(32))
        .build()
        .unwrap();
    let bias = BusShape::new("Bias")
        .signal_with_default(
            "values",
            SignalType::array(SignalType::uint(8), 3),
            Value::array([0u8, 1, 2]),
        )
        .build()
        .unwrap();
    let total = word(34);

    let mut net = NetworkBuilder::new();
    let inputs: Vec<BusId> = ["x", "y", "z"]
        .into_iter()
        .map(|name| {
            let bus = net.create_bus(&operand, Some(name)).unwrap();
            net.mark_top_level_input(bus).unwrap();
            bus
        })
        .collect();
    let offsets = net.create_bus(&bias, Some("bias")).unwrap();
    let sum = net.create_bus(&total, Some("sum")).unwrap();
    net.mark_top_level_output(sum).unwrap();

    let operands = inputs.clone();
    net.combinational_fn("reduce", move |io| {
        let mut acc = 0;
        for &bus in &operands {
            if io.read_bool(bus, "valid")? {
                acc += io.read_u64(bus, "value")?;
            }
        }
        for v in io.read_array(offsets, "values")? {
            acc += v.as_u64().unwrap_or(0);
        }
        io.write(sum, "data", acc)
    })
    .inputs(inputs.iter().copied())
    .input(offsets)
    .output(sum)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    for (bus, value) in inputs.iter().zip([10u32, 20, 30]) {
        sim.drive(*bus, "valid", true).unwrap();
        sim.drive(*bus, "value", value).unwrap();
    }
    let report = sim.step().unwrap();

    assert_eq!(report.tick, 0);
    assert_eq!(report.passes, 1);
    assert_eq!(data(&sim, sum), Some(63));
}

#[test]
fn test_invalid_operands_are_skipped() {
    let operand = BusShape::new("Operand")
        .signal_with_default("valid", SignalType::Bool, false)
        .signal("value", SignalType::uint(32))
        .build()
        .unwrap();
    let total = word(34);

    let mut net = NetworkBuilder::new();
    let a = net.create_bus(&operand, Some("a")).unwrap();
    let b = net.create_bus(&operand, Some("b")).unwrap();
    net.mark_top_level_input(a).unwrap();
    net.mark_top_level_input(b).unwrap();
    let sum = net.create_bus(&total, Some("sum")).unwrap();
    net.combinational_fn("reduce", move |io| {
        let mut acc = 0;
        for bus in [a, b] {
            // `value` is never read when `valid` is low.
            if io.read_bool(bus, "valid")? {
                acc += io.read_u64(bus, "value")?;
            }
        }
        io.write(sum, "data", acc)
    })
    .inputs([a, b])
    .output(sum)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    sim.drive(a, "valid", true).unwrap();
    sim.drive(a, "value", 7u32).unwrap();
    sim.step().unwrap();
    assert_eq!(data(&sim, sum), Some(7));
}

#[test]
fn test_chain_order_is_independent_of_registration() {
    let shape = word(16);
    let mut net = NetworkBuilder::new();
    let buses: Vec<BusId> = (0..6)
        .map(|i| net.create_bus(&shape, Some(&format!("b{}", i))).unwrap())
        .collect();
    net.mark_top_level_input(buses[0]).unwrap();

    // Register the stages back to front.
    for i in (0..5).rev() {
        let (src, dst) = (buses[i], buses[i + 1]);
        net.combinational_fn(format!("stage{}", i), move |io| {
            let v = io.read_u64(src, "data")?;
            io.write(dst, "data", v + 1)
        })
        .input(src)
        .output(dst)
        .register()
        .unwrap();
    }

    let mut sim = Simulation::from_builder(net).unwrap();
    sim.drive(buses[0], "data", 100u16).unwrap();
    let report = sim.step().unwrap();
    assert_eq!(report.passes, 1);
    assert_eq!(data(&sim, buses[5]), Some(105));
}

#[test]
fn test_unwritten_plain_signal_keeps_value() {
    let shape = word(8);
    let mut net = NetworkBuilder::new();
    let input = net.create_bus(&shape, Some("in")).unwrap();
    let out = net.create_bus(&shape, Some("out")).unwrap();
    net.mark_top_level_input(input).unwrap();
    net.combinational_fn("copy", move |io| {
        let v = io.read(input, "data")?;
        io.write(out, "data", v)
    })
    .input(input)
    .output(out)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    sim.drive(input, "data", 42u8).unwrap();
    sim.step().unwrap();
    // No drive on the second tick: the input holds its last value.
    sim.step().unwrap();
    assert_eq!(data(&sim, out), Some(42));
}

// ============================================================================
// Clocked buses
// ============================================================================

#[test]
fn test_register_output_visible_next_tick() {
    let mut net = NetworkBuilder::new();
    let input = net.create_bus(&word(8), Some("in")).unwrap();
    let reg = net.create_bus(&register(8), Some("reg")).unwrap();
    let out = net.create_bus(&word(8), Some("out")).unwrap();
    net.mark_top_level_input(input).unwrap();

    net.combinational_fn("inc", move |io| {
        let v = io.read_u64(input, "data")?;
        io.write(reg, "data", v + 1)
    })
    .input(input)
    .output(reg)
    .register()
    .unwrap();
    net.combinational_fn("observe", move |io| {
        let v = io.read(reg, "data")?;
        io.write(out, "data", v)
    })
    .input(reg)
    .output(out)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    sim.drive(input, "data", 5u8).unwrap();
    sim.step().unwrap();
    // The register took the new value, its reader still saw the old one.
    assert_eq!(data(&sim, reg), Some(6));
    assert_eq!(data(&sim, out), Some(0));

    sim.step().unwrap();
    assert_eq!(data(&sim, out), Some(6));
}

#[test]
fn test_sequential_reads_previous_tick() {
    let shape = word(8);
    let mut net = NetworkBuilder::new();
    let input = net.create_bus(&shape, Some("in")).unwrap();
    let seen = net.create_bus(&shape, Some("seen")).unwrap();
    net.mark_top_level_input(input).unwrap();
    net.sequential_fn("sample", move |io| {
        if io.can_read(input, "data") {
            let v = io.read(input, "data")?;
            io.write(seen, "data", v)?;
        }
        Ok(Resume::Yield)
    })
    .input(input)
    .output(seen)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    sim.drive(input, "data", 1u8).unwrap();
    sim.step().unwrap();
    assert_eq!(data(&sim, seen), None);

    sim.drive(input, "data", 2u8).unwrap();
    sim.step().unwrap();
    assert_eq!(data(&sim, seen), Some(1));
}

#[test]
fn test_internal_bus_holds_state() {
    let mut net = NetworkBuilder::new();
    let state = net.create_internal_bus(&register(8), Some("state")).unwrap();
    let out = net.create_bus(&word(8), Some("out")).unwrap();
    net.sequential_fn("counter", move |io| {
        let n = io.read_u64(state, "data")?;
        io.write(state, "data", n + 1)?;
        io.write(out, "data", n)?;
        Ok(Resume::Yield)
    })
    .internal(state)
    .output(out)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap().with_max_ticks(4);
    sim.run().unwrap();
    assert_eq!(data(&sim, out), Some(3));
    assert_eq!(data(&sim, state), Some(4));
}

// ============================================================================
// Violations
// ============================================================================

#[test]
fn test_two_combinational_writers_conflict() {
    let shape = word(8);
    let mut net = NetworkBuilder::new();
    let input = net.create_bus(&shape, Some("in")).unwrap();
    let shared = net.create_bus(&shape, Some("shared")).unwrap();
    net.mark_top_level_input(input).unwrap();
    for name in ["left", "right"] {
        net.combinational_fn(name, move |io| {
            let v = io.read(input, "data")?;
            io.write(shared, "data", v)
        })
        .input(input)
        .output(shared)
        .register()
        .unwrap();
    }

    let mut sim = Simulation::from_builder(net).unwrap();
    sim.drive(input, "data", 1u8).unwrap();
    match sim.step() {
        Err(SimError::WriteViolation {
            tick,
            bus,
            signal,
            first,
            second,
        }) => {
            assert_eq!(tick, 0);
            assert_eq!(bus, "root/shared");
            assert_eq!(signal, "data");
            assert_eq!(first, "process `left`");
            assert_eq!(second, "process `right`");
        }
        other => panic!("expected write violation, got {:?}", other),
    }
    // Nothing was committed.
    assert_eq!(data(&sim, shared), None);
    assert_eq!(sim.last_tick(), None);
}

#[test]
fn test_clocked_signal_keeps_its_driver() {
    let mut net = NetworkBuilder::new();
    let reg = net.create_bus(&register(8), Some("reg")).unwrap();
    net.sequential_fn("early", move |io| {
        if io.tick() == 0 {
            io.write(reg, "data", 1u8)?;
        }
        Ok(Resume::Yield)
    })
    .output(reg)
    .register()
    .unwrap();
    net.sequential_fn("late", move |io| {
        if io.tick() == 2 {
            io.write(reg, "data", 2u8)?;
        }
        Ok(Resume::Yield)
    })
    .output(reg)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap().with_max_ticks(5);
    match sim.run() {
        Err(SimError::WriteViolation {
            tick,
            first,
            second,
            ..
        }) => {
            assert_eq!(tick, 2);
            assert_eq!(first, "process `early`");
            assert_eq!(second, "process `late`");
        }
        other => panic!("expected write violation, got {:?}", other),
    }
    assert_eq!(sim.last_tick(), Some(1));
    assert!(matches!(
        sim.run(),
        Err(SimError::RunAborted { tick: 2, .. })
    ));
}

#[test]
fn test_read_before_first_write() {
    let shape = word(8);
    let mut net = NetworkBuilder::new();
    let input = net.create_bus(&shape, Some("in")).unwrap();
    let out = net.create_bus(&shape, Some("out")).unwrap();
    net.mark_top_level_input(input).unwrap();
    net.combinational_fn("sum", move |io| {
        let v = io.read(input, "data")?;
        io.write(out, "data", v)
    })
    .input(input)
    .output(out)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    match sim.step() {
        Err(SimError::ReadViolation {
            tick, bus, reader, ..
        }) => {
            assert_eq!(tick, 0);
            assert_eq!(bus, "root/in");
            assert_eq!(reader, "process `sum`");
        }
        other => panic!("expected read violation, got {:?}", other),
    }
}

#[test]
fn test_undeclared_write_rejected() {
    let shape = word(8);
    let mut net = NetworkBuilder::new();
    let declared = net.create_bus(&shape, Some("declared")).unwrap();
    let other = net.create_bus(&shape, Some("other")).unwrap();
    net.sequential_fn("sneaky", move |io| {
        io.write(declared, "data", 1u8)?;
        io.write(other, "data", 1u8)?;
        Ok(Resume::Yield)
    })
    .output(declared)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    match sim.step() {
        Err(SimError::UndeclaredAccess {
            process,
            bus,
            access,
        }) => {
            assert_eq!(process, "sneaky");
            assert_eq!(bus, "root/other");
            assert_eq!(access, "write");
        }
        other => panic!("expected undeclared access, got {:?}", other),
    }
}

#[test]
fn test_type_checked_writes() {
    let shape = word(8);
    let mut net = NetworkBuilder::new();
    let out = net.create_bus(&shape, Some("out")).unwrap();
    net.sequential_fn("wide", move |io| {
        io.write(out, "data", 300u16)?;
        Ok(Resume::Yield)
    })
    .output(out)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    assert!(matches!(sim.step(), Err(SimError::TypeMismatch { .. })));
}

#[test]
fn test_drive_validation() {
    let shape = word(8);
    let mut net = NetworkBuilder::new();
    let input = net.create_bus(&shape, Some("in")).unwrap();
    let inner = net.create_bus(&shape, Some("inner")).unwrap();
    net.mark_top_level_input(input).unwrap();
    net.combinational_fn("copy", move |io| {
        let v = io.read(input, "data")?;
        io.write(inner, "data", v)
    })
    .input(input)
    .output(inner)
    .register()
    .unwrap();

    let mut sim = Simulation::from_builder(net).unwrap();
    assert!(matches!(
        sim.drive(inner, "data", 1u8),
        Err(SimError::NotTopLevelInput { .. })
    ));
    assert!(matches!(
        sim.drive(input, "missing", 1u8),
        Err(SimError::UnknownSignal { .. })
    ));
    assert!(matches!(
        sim.drive(input, "data", true),
        Err(SimError::TypeMismatch { .. })
    ));
    assert!(sim.drive(input, "data", 255u8).is_ok());
}

#[test]
fn test_latch_warning_is_not_an_error() {
    let pair = BusShape::new("Pair")
        .signal("a", SignalType::uint(8))
        .signal("b", SignalType::uint(8))
        .build()
        .unwrap();
    let mut net = NetworkBuilder::new();
    let input = net.create_bus(&word(8), Some("in")).unwrap();
    let out = net.create_bus(&pair, Some("out")).unwrap();
    net.mark_top_level_input(input).unwrap();
    net.combinational_fn("half", move |io| {
        let v = io.read(input, "data")?;
        io.write(out, "a", v)
    })
    .input(input)
    .output(out)
    .register()
    .unwrap();

    let mut exec = TickExecutor::new(net.build().unwrap());
    exec.init();
    exec.stage_drive(input, "data", 3u8, 0).unwrap();
    assert!(exec.step_tick(0).is_ok());
    assert_eq!(exec.network().bus(out).unwrap().value("b"), None);
}
