//! # Tickwire
//!
//! A cycle-accurate simulation kernel for networks of hardware-like processes
//! that communicate over typed, named buses on a discrete synchronous clock.
//!
//! ## Design Principles
//!
//! - **Buses are the only channel**: processes never call each other; they
//!   read and write signals on the buses they declared.
//! - **Two disciplines**:
//!   - **Combinational** processes are pure functions of their inputs, re-run
//!     within a tick until every signal is stable.
//!   - **Sequential** processes keep state and are resumed once per tick.
//! - **Hardware rules are enforced**: one driver per signal, no read before the
//!   first write, no combinational loop unless a clocked bus breaks it.
//! - **Validated up front**: the dependency graph is built and checked once,
//!   before tick 0; design defects never reach the run loop.
//!
//! ## Quick Start
//!
//! ```rust
//! use tickwire::prelude::*;
//!
//! let operand = BusShape::new("Operand")
//!     .signal("value", SignalType::uint(8))
//!     .build()?;
//! let sum = BusShape::new("Sum")
//!     .signal("value", SignalType::uint(9))
//!     .build()?;
//!
//! let mut net = NetworkBuilder::new();
//! let a = net.create_bus(&operand, Some("a"))?;
//! let b = net.create_bus(&operand, Some("b"))?;
//! let out = net.create_bus(&sum, Some("sum"))?;
//! net.mark_top_level_input(a)?;
//! net.mark_top_level_input(b)?;
//! net.mark_top_level_output(out)?;
//!
//! net.combinational_fn("adder", move |io| {
//!     let total = io.read_u64(a, "value")? + io.read_u64(b, "value")?;
//!     io.write(out, "value", total)
//! })
//! .inputs([a, b])
//! .output(out)
//! .register()?;
//!
//! let mut sim = Simulation::from_builder(net)?;
//! sim.drive(a, "value", 200u8)?;
//! sim.drive(b, "value", 55u8)?;
//! sim.step()?;
//! assert_eq!(sim.value(out, "value"), Some(&Value::UInt(255)));
//! # Ok::<(), tickwire::SimError>(())
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use tickwire::config::SimConfig;
//! use tickwire::registry::ShapeRegistry;
//!
//! let config = SimConfig::from_yaml_file("simulation.yaml")?;
//! let shapes = ShapeRegistry::from_config(&config)?;
//! // ... build the network from the registered shapes
//! let mut sim = Simulation::from_config(net.build()?, &config);
//! ```

pub mod types;
pub mod value;
pub mod bus;
pub mod scope;
pub mod process;
pub mod network;
pub mod graph;
pub mod executor;
pub mod engine;
pub mod observer;
pub mod view;
pub mod error;
pub mod config;
pub mod registry;
pub mod stats;
pub mod processes;

// Re-export commonly used types
pub use types::{BusId, ProcessId, Tick, WriterId};
pub use value::{SignalType, Value};
pub use bus::{Bus, BusKind, BusShape, SignalDesc};
pub use scope::Scope;
pub use process::{Combinational, ProcessCategory, ProcessDecl, Resume, Sequential};
pub use network::{Network, NetworkBuilder, ProcessBuilder};
pub use graph::{DependencyGraph, Edge, EdgeKind};
pub use executor::{ProcessIo, TickExecutor, TickReport};
pub use engine::{RunOutcome, Simulation, StopHandle, StopReason};
pub use observer::{SignalRecorder, TickObserver, TickView, TraceHandle};
pub use view::NetworkView;
pub use error::{SimError, SimResult};
pub use config::{ConfigError, SimConfig, SimConfigBuilder};
pub use registry::ShapeRegistry;
pub use stats::{SimulationStats, Timer};

/// Glob-importable set of the types most programs need.
pub mod prelude {
    pub use crate::bus::{BusKind, BusShape};
    pub use crate::engine::{RunOutcome, Simulation, StopReason};
    pub use crate::error::{SimError, SimResult};
    pub use crate::executor::ProcessIo;
    pub use crate::network::NetworkBuilder;
    pub use crate::observer::{SignalRecorder, TickObserver, TickView};
    pub use crate::process::{Combinational, Resume, Sequential};
    pub use crate::processes::{DelayLine, Passthrough, Repeat, Script};
    pub use crate::types::{BusId, ProcessId, Tick};
    pub use crate::value::{SignalType, Value};
}

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. `RUST_LOG`
/// overrides the given level.
///
/// # Example
///
/// ```rust,ignore
/// tickwire::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
