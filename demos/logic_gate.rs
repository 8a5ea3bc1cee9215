//! Simple logic gate simulation example.
//!
//! A sequential source draws two pseudo-random bits every tick and drives
//! them on a plain bus. A combinational AND gate computes their conjunction
//! in the same tick and a clocked register samples it, so the registered
//! output trails the gate by one tick. A probe observer prints each tick.

use tickwire::config::SimConfig;
use tickwire::prelude::*;

const CONFIG: &str = r#"
simulation:
  name: logic-gate
  max_ticks: 40
  log_level: warn
  collect_stats: true
"#;

// -----------------------------------------------------------------------------
// Pseudo-random bit source
// -----------------------------------------------------------------------------

struct RandomBitSource {
    out: BusId,
    seed: u64,
    state: u64,
    emitted: u64,
}

impl RandomBitSource {
    fn new(out: BusId, seed: u64) -> Self {
        Self {
            out,
            seed,
            state: seed,
            emitted: 0,
        }
    }

    fn next_bits(&mut self) -> (bool, bool) {
        // Xorshift64
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;

        // Use the lowest two bits as boolean values
        ((x & 0b01) != 0, (x & 0b10) != 0)
    }
}

impl Sequential for RandomBitSource {
    fn init(&mut self) {
        self.state = self.seed;
        self.emitted = 0;
    }

    fn resume(&mut self, io: &mut ProcessIo<'_>) -> SimResult<Resume> {
        let (a, b) = self.next_bits();
        io.write(self.out, "a", a)?;
        io.write(self.out, "b", b)?;
        self.emitted += 1;
        Ok(Resume::Yield)
    }
}

// -----------------------------------------------------------------------------
// AND gate
// -----------------------------------------------------------------------------

struct AndGate {
    inputs: BusId,
    out: BusId,
}

impl Combinational for AndGate {
    fn step(&self, io: &mut ProcessIo<'_>) -> SimResult<()> {
        let a = io.read_bool(self.inputs, "a")?;
        let b = io.read_bool(self.inputs, "b")?;
        io.write(self.out, "q", a && b)
    }
}

// -----------------------------------------------------------------------------
// Probe
// -----------------------------------------------------------------------------

#[derive(Default)]
struct Probe {
    bits: Option<BusId>,
    gate: Option<BusId>,
    registered: Option<BusId>,
    ones: u64,
}

impl TickObserver for Probe {
    fn on_start(&mut self, network: &tickwire::NetworkView) {
        self.bits = network.bus("root/bits").map(|b| b.id);
        self.gate = network.bus("root/gate").map(|b| b.id);
        self.registered = network.bus("root/registered").map(|b| b.id);
        println!("{:>4}  {:>1} & {:>1} => {:>1}  (registered {:>1})", "tick", "a", "b", "q", "q");
    }

    fn on_tick(&mut self, view: &TickView<'_>) {
        let bit = |bus: Option<BusId>, signal: &str| {
            bus.and_then(|id| view.read(id, signal))
                .and_then(Value::as_bool)
                .map(u8::from)
                .unwrap_or(0)
        };
        let q = bit(self.gate, "q");
        self.ones += q as u64;
        println!(
            "{:>4}  {:>1} & {:>1} => {:>1}  (registered {:>1})",
            view.tick(),
            bit(self.bits, "a"),
            bit(self.bits, "b"),
            q,
            bit(self.registered, "q"),
        );
    }

    fn on_finish(&mut self, _network: &tickwire::NetworkView, last_tick: Option<Tick>) {
        let samples = last_tick.map(|t| t + 1).unwrap_or(0);
        println!("\n{} of {} samples were high", self.ones, samples);
    }
}

// -----------------------------------------------------------------------------
// Main simulation
// -----------------------------------------------------------------------------

fn build() -> SimResult<NetworkBuilder> {
    let pair = BusShape::new("BitPair")
        .signal("a", SignalType::Bool)
        .signal("b", SignalType::Bool)
        .build()?;
    let level = BusShape::new("Level").signal("q", SignalType::Bool).build()?;
    let latch = BusShape::new("Latch")
        .signal("q", SignalType::Bool)
        .clocked()
        .initialized()
        .build()?;

    let mut net = NetworkBuilder::new();
    let bits = net.create_bus(&pair, Some("bits"))?;
    let gate = net.create_bus(&level, Some("gate"))?;
    let registered = net.create_bus(&latch, Some("registered"))?;

    // Seeded for determinism
    net.sequential("source", RandomBitSource::new(bits, 0x5eed))
        .output(bits)
        .register()?;
    net.combinational("and", AndGate { inputs: bits, out: gate })
        .input(bits)
        .output(gate)
        .register()?;
    Passthrough::new(gate, registered).register(&mut net, "flop")?;
    Ok(net)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SimConfig::from_yaml(CONFIG)?;
    tickwire::init_logging(&config.simulation.log_level);
    println!("==== Logic gate example ====");
    println!("Sequential source drives two bits; AND gate consumes them.\n");

    let mut sim = Simulation::from_config(build()?.build()?, &config);
    sim.add_observer(Probe::default());
    let outcome = sim.run()?;

    println!("Run ended after {} ticks ({})", outcome.ticks, outcome.reason);
    println!("{}", sim.stats().summary());
    Ok(())
}
