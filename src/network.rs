//! Network construction and the validated network.
//!
//! A [`NetworkBuilder`] is the construction context: it owns the bus arena,
//! the scope stack and the registered processes. It is consumed by
//! [`NetworkBuilder::build`], which validates the topology and produces an
//! immutable-shaped [`Network`] ready to be simulated.
//!
//! # Example
//!
//! ```
//! use tickwire::{NetworkBuilder, Resume};
//! use tickwire::bus::BusShape;
//! use tickwire::value::SignalType;
//!
//! let word = BusShape::new("Word").signal("data", SignalType::uint(8)).build().unwrap();
//!
//! let mut net = NetworkBuilder::new();
//! let input = net.create_bus(&word, Some("in")).unwrap();
//! let output = net.create_bus(&word, Some("out")).unwrap();
//! net.mark_top_level_input(input).unwrap();
//!
//! net.combinational_fn("inc", move |io| {
//!     let v = io.read_u64(input, "data")?;
//!     io.write(output, "data", (v + 1) & 0xff)
//! })
//! .input(input)
//! .output(output)
//! .register()
//! .unwrap();
//!
//! let network = net.build().unwrap();
//! assert_eq!(network.process_count(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bus::{Bus, BusKind, BusShape};
use crate::error::{SimError, SimResult};
use crate::executor::ProcessIo;
use crate::graph::DependencyGraph;
use crate::process::{
    Behavior, Combinational, FnCombinational, FnSequential, ProcessCategory, ProcessDecl,
    ProcessSlot, Resume, Sequential,
};
use crate::scope::Scope;
use crate::types::{BusId, ProcessId};
use crate::view::NetworkView;

/// Construction context for a network.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    scope: Scope,
    buses: Vec<Bus>,
    processes: Vec<ProcessSlot>,
    process_names: HashSet<String>,
    internal_owners: HashMap<BusId, ProcessId>,
    anonymous: usize,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scope stack used to resolve bus names.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn push_scope(&mut self, label: impl Into<String>) {
        self.scope.push(label);
    }

    /// Enters a frame whose lookups never reach outer frames.
    pub fn push_isolated_scope(&mut self, label: impl Into<String>) {
        self.scope.push_isolated(label);
    }

    pub fn pop_scope(&mut self) -> SimResult<()> {
        self.scope.pop()
    }

    /// Runs `f` inside a nested scope, leaving the scope even when `f` fails.
    pub fn scoped<T>(
        &mut self,
        label: impl Into<String>,
        f: impl FnOnce(&mut Self) -> SimResult<T>,
    ) -> SimResult<T> {
        self.push_scope(label);
        let result = f(self);
        self.pop_scope()?;
        result
    }

    /// Like [`scoped`](Self::scoped), with an isolated frame.
    pub fn isolated<T>(
        &mut self,
        label: impl Into<String>,
        f: impl FnOnce(&mut Self) -> SimResult<T>,
    ) -> SimResult<T> {
        self.push_isolated_scope(label);
        let result = f(self);
        self.pop_scope()?;
        result
    }

    fn allocate(
        &mut self,
        shape: &Arc<BusShape>,
        name: Option<&str>,
        kind: BusKind,
    ) -> SimResult<BusId> {
        shape.validate()?;
        let name = match name {
            Some(name) => name.to_string(),
            None => {
                self.anonymous += 1;
                format!("{}#{}", shape.name, self.anonymous)
            }
        };
        let id = BusId::from_index(self.buses.len());
        let path = if shape.singleton {
            self.scope.bind_root(&shape.name, &name, id)?;
            format!("root/{}", name)
        } else {
            self.scope.bind(&shape.name, &name, id)?;
            format!("{}/{}", self.scope.path(), name)
        };
        debug!(bus = %path, shape = %shape.name, %kind, "bus created");
        self.buses.push(Bus::new(id, name, path, shape.clone(), kind));
        Ok(id)
    }

    /// Creates a bus in the current frame.
    ///
    /// Anonymous buses get a generated name unique within the network.
    /// Buses of a clocked shape are clocked; singleton shapes are bound in the
    /// root frame.
    pub fn create_bus(&mut self, shape: &Arc<BusShape>, name: Option<&str>) -> SimResult<BusId> {
        let kind = if shape.clocked {
            BusKind::Clocked
        } else {
            BusKind::Plain
        };
        self.allocate(shape, name, kind)
    }

    /// Returns the visible bus with this name and shape, creating it in the
    /// current frame when none is visible.
    pub fn create_or_load_bus(&mut self, shape: &Arc<BusShape>, name: &str) -> SimResult<BusId> {
        match self.resolve(shape, name) {
            Some(id) => Ok(id),
            None => self.create_bus(shape, Some(name)),
        }
    }

    /// Returns the visible bus with this name and shape.
    pub fn load_bus(&self, shape: &Arc<BusShape>, name: &str) -> SimResult<BusId> {
        self.resolve(shape, name).ok_or_else(|| SimError::BusNotFound {
            shape: shape.name.clone(),
            name: name.to_string(),
            scope: self.scope.path().to_string(),
        })
    }

    fn resolve(&self, shape: &BusShape, name: &str) -> Option<BusId> {
        if shape.singleton {
            self.scope.lookup_root(&shape.name, name)
        } else {
            self.scope.lookup(&shape.name, name)
        }
    }

    /// Creates a private bus. Exactly one process must claim it with
    /// [`ProcessBuilder::internal`]; writes to it are visible from the next
    /// tick on.
    pub fn create_internal_bus(
        &mut self,
        shape: &Arc<BusShape>,
        name: Option<&str>,
    ) -> SimResult<BusId> {
        self.allocate(shape, name, BusKind::Internal)
    }

    fn set_top_level(&mut self, bus: BusId, kind: BusKind) -> SimResult<()> {
        let target = self
            .buses
            .get_mut(bus.index())
            .ok_or_else(|| SimError::InvalidBusKind {
                bus: bus.to_string(),
                kind: "unknown".to_string(),
                requested: kind.to_string(),
            })?;
        match target.kind() {
            BusKind::Plain => {
                target.set_kind(kind);
                Ok(())
            }
            current if current == kind => Ok(()),
            current => Err(SimError::InvalidBusKind {
                bus: target.path().to_string(),
                kind: current.to_string(),
                requested: kind.to_string(),
            }),
        }
    }

    /// Marks a plain bus as an external input pin, driven by the harness.
    pub fn mark_top_level_input(&mut self, bus: BusId) -> SimResult<()> {
        self.set_top_level(bus, BusKind::TopLevelInput)
    }

    /// Marks a plain bus as an external output pin.
    pub fn mark_top_level_output(&mut self, bus: BusId) -> SimResult<()> {
        self.set_top_level(bus, BusKind::TopLevelOutput)
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(id.index())
    }

    /// Starts registering a combinational process.
    pub fn combinational(
        &mut self,
        name: impl Into<String>,
        process: impl Combinational + 'static,
    ) -> ProcessBuilder<'_> {
        let decl = ProcessDecl::new(self.qualify(name.into()), ProcessCategory::Combinational);
        ProcessBuilder::new(self, decl, Behavior::Combinational(Box::new(process)))
    }

    /// Starts registering a combinational process given as a closure.
    pub fn combinational_fn<F>(&mut self, name: impl Into<String>, f: F) -> ProcessBuilder<'_>
    where
        F: Fn(&mut ProcessIo<'_>) -> SimResult<()> + Send + 'static,
    {
        self.combinational(name, FnCombinational(f))
    }

    /// Starts registering a sequential process.
    pub fn sequential(
        &mut self,
        name: impl Into<String>,
        process: impl Sequential + 'static,
    ) -> ProcessBuilder<'_> {
        let decl = ProcessDecl::new(self.qualify(name.into()), ProcessCategory::Sequential);
        ProcessBuilder::new(self, decl, Behavior::Sequential(Box::new(process)))
    }

    /// Starts registering a sequential process given as a closure.
    pub fn sequential_fn<F>(&mut self, name: impl Into<String>, f: F) -> ProcessBuilder<'_>
    where
        F: FnMut(&mut ProcessIo<'_>) -> SimResult<Resume> + Send + 'static,
    {
        self.sequential(name, FnSequential(f))
    }

    /// Processes registered below the root frame carry the scope path.
    fn qualify(&self, name: String) -> String {
        match self.scope.path().strip_prefix("root/") {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name,
        }
    }

    fn register(&mut self, mut decl: ProcessDecl, behavior: Behavior) -> SimResult<ProcessId> {
        let invalid = |reason: String| SimError::InvalidDeclaration {
            process: decl.name.clone(),
            reason,
        };

        if decl.name.is_empty() {
            return Err(invalid("process name is empty".to_string()));
        }
        if self.process_names.contains(&decl.name) {
            return Err(invalid("another process has the same name".to_string()));
        }
        if decl.driver && decl.category != ProcessCategory::Sequential {
            return Err(invalid("only sequential processes can be drivers".to_string()));
        }

        let declared = decl
            .inputs
            .iter()
            .chain(&decl.clocked_inputs)
            .chain(&decl.outputs)
            .chain(&decl.internals);
        for &bus in declared {
            if bus.index() >= self.buses.len() {
                return Err(invalid(format!("{} does not belong to this network", bus)));
            }
        }

        for &bus in decl.inputs.iter().chain(&decl.clocked_inputs).chain(&decl.outputs) {
            let target = &self.buses[bus.index()];
            if target.kind() == BusKind::Internal {
                return Err(invalid(format!(
                    "internal bus `{}` can only be declared as internal",
                    target.path()
                )));
            }
        }

        for &bus in &decl.internals {
            let target = &self.buses[bus.index()];
            if target.kind() != BusKind::Internal {
                return Err(invalid(format!(
                    "bus `{}` is {}, not internal",
                    target.path(),
                    target.kind()
                )));
            }
            if let Some(&owner) = self.internal_owners.get(&bus) {
                return Err(invalid(format!(
                    "internal bus `{}` already belongs to `{}`",
                    target.path(),
                    self.processes[owner.index()].decl.name
                )));
            }
        }

        dedup(&mut decl.inputs);
        dedup(&mut decl.clocked_inputs);
        dedup(&mut decl.outputs);
        dedup(&mut decl.internals);
        // A clocked declaration wins over a plain one for the same bus.
        let clocked = decl.clocked_inputs.clone();
        decl.inputs.retain(|b| !clocked.contains(b));

        let id = ProcessId::from_index(self.processes.len());
        for &bus in &decl.internals {
            self.internal_owners.insert(bus, id);
        }
        debug!(process = %decl.name, category = %decl.category, "process registered");
        self.process_names.insert(decl.name.clone());
        self.processes.push(ProcessSlot::new(decl, behavior));
        Ok(id)
    }

    /// Validates the network and freezes its topology.
    pub fn build(self) -> SimResult<Network> {
        if self.processes.is_empty() {
            return Err(SimError::EmptyNetwork);
        }

        for bus in &self.buses {
            if bus.kind() == BusKind::Internal && !self.internal_owners.contains_key(&bus.id()) {
                warn!(bus = %bus.path(), "internal bus is not claimed by any process");
            }
        }

        let decls: Vec<ProcessDecl> = self.processes.iter().map(|s| s.decl.clone()).collect();
        let graph = DependencyGraph::build(&decls, &self.buses)?;

        info!(
            processes = self.processes.len(),
            buses = self.buses.len(),
            edges = graph.edges().len(),
            "network validated"
        );

        let names = decls.into_iter().map(|d| d.name).collect();
        Ok(Network {
            buses: self.buses,
            processes: self.processes,
            names,
            graph,
        })
    }
}

#[cfg(test)]
impl NetworkBuilder {
    /// Freezes the network with a fixed evaluation order, skipping validation.
    pub(crate) fn build_with_order(self, order: Vec<ProcessId>) -> Network {
        let graph = DependencyGraph::with_order(self.buses.len(), order);
        let names = self.processes.iter().map(|s| s.decl.name.clone()).collect();
        Network {
            buses: self.buses,
            processes: self.processes,
            names,
            graph,
        }
    }
}

fn dedup(list: &mut Vec<BusId>) {
    let mut seen = HashSet::new();
    list.retain(|b| seen.insert(*b));
}

/// Declares the buses of one process before registering it.
pub struct ProcessBuilder<'n> {
    net: &'n mut NetworkBuilder,
    decl: ProcessDecl,
    behavior: Behavior,
}

impl<'n> ProcessBuilder<'n> {
    fn new(net: &'n mut NetworkBuilder, decl: ProcessDecl, behavior: Behavior) -> Self {
        Self {
            net,
            decl,
            behavior,
        }
    }

    /// Declares a bus read with same-tick visibility.
    pub fn input(mut self, bus: BusId) -> Self {
        self.decl.inputs.push(bus);
        self
    }

    pub fn inputs(mut self, buses: impl IntoIterator<Item = BusId>) -> Self {
        self.decl.inputs.extend(buses);
        self
    }

    /// Declares a bus read with next-tick visibility.
    pub fn clocked_input(mut self, bus: BusId) -> Self {
        self.decl.clocked_inputs.push(bus);
        self
    }

    pub fn output(mut self, bus: BusId) -> Self {
        self.decl.outputs.push(bus);
        self
    }

    pub fn outputs(mut self, buses: impl IntoIterator<Item = BusId>) -> Self {
        self.decl.outputs.extend(buses);
        self
    }

    /// Claims a private bus created with `create_internal_bus`.
    pub fn internal(mut self, bus: BusId) -> Self {
        self.decl.internals.push(bus);
        self
    }

    /// Marks a sequential process as a driver: the run ends once every
    /// driver has finished.
    pub fn driver(mut self) -> Self {
        self.decl.driver = true;
        self
    }

    pub fn register(self) -> SimResult<ProcessId> {
        self.net.register(self.decl, self.behavior)
    }
}

/// A validated network: bus and process arenas plus the dependency graph.
#[derive(Debug)]
pub struct Network {
    pub(crate) buses: Vec<Bus>,
    pub(crate) processes: Vec<ProcessSlot>,
    pub(crate) names: Vec<String>,
    pub(crate) graph: DependencyGraph,
}

impl Network {
    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(id.index())
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    /// Finds a bus by its scope-qualified path.
    pub fn bus_by_path(&self, path: &str) -> Option<BusId> {
        self.buses.iter().find(|b| b.path() == path).map(Bus::id)
    }

    pub fn process(&self, id: ProcessId) -> Option<&ProcessDecl> {
        self.processes.get(id.index()).map(|s| &s.decl)
    }

    pub fn processes(&self) -> impl Iterator<Item = &ProcessDecl> {
        self.processes.iter().map(|s| &s.decl)
    }

    pub fn process_by_name(&self, name: &str) -> Option<ProcessId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(ProcessId::from_index)
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Read-only description for backends.
    pub fn view(&self) -> NetworkView {
        NetworkView::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SignalType;

    fn word() -> Arc<BusShape> {
        BusShape::new("Word")
            .signal("data", SignalType::uint(8))
            .build()
            .unwrap()
    }

    fn identity(net: &mut NetworkBuilder, name: &str, input: BusId, output: BusId) -> ProcessId {
        net.combinational_fn(name, move |io| {
            let v = io.read(input, "data")?;
            io.write(output, "data", v)
        })
        .input(input)
        .output(output)
        .register()
        .unwrap()
    }

    #[test]
    fn test_empty_network() {
        let net = NetworkBuilder::new();
        assert_eq!(net.build().unwrap_err(), SimError::EmptyNetwork);
    }

    #[test]
    fn test_bus_naming() {
        let shape = word();
        let mut net = NetworkBuilder::new();
        let a = net.create_bus(&shape, None).unwrap();
        let b = net.create_bus(&shape, None).unwrap();
        assert_eq!(net.bus(a).unwrap().name(), "Word#1");
        assert_eq!(net.bus(b).unwrap().name(), "Word#2");

        let named = net.create_bus(&shape, Some("x")).unwrap();
        assert_eq!(net.bus(named).unwrap().path(), "root/x");
        assert!(matches!(
            net.create_bus(&shape, Some("x")),
            Err(SimError::DuplicateBus { .. })
        ));
        assert_eq!(net.create_or_load_bus(&shape, "x").unwrap(), named);
    }

    #[test]
    fn test_scoped_instances() {
        let shape = word();
        let mut net = NetworkBuilder::new();
        let outer = net.create_bus(&shape, Some("shared")).unwrap();

        let (first, seen) = net
            .scoped("lane", |net| {
                let local = net.create_bus(&shape, Some("data"))?;
                Ok((local, net.load_bus(&shape, "shared")?))
            })
            .unwrap();
        assert_eq!(seen, outer);
        let second = net
            .scoped("lane", |net| net.create_or_load_bus(&shape, "data"))
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(net.bus(first).unwrap().path(), "root/lane/data");
        assert_eq!(net.bus(second).unwrap().path(), "root/lane#1/data");
        assert_eq!(net.scope().depth(), 1);

        let hidden = net.isolated("box", |net| net.load_bus(&shape, "shared"));
        assert!(matches!(hidden, Err(SimError::BusNotFound { .. })));
        assert_eq!(net.scope().depth(), 1);
        assert_eq!(net.pop_scope(), Err(SimError::ScopeUnderflow));
    }

    #[test]
    fn test_singleton_resolves_in_root() {
        let shape = BusShape::new("Clock")
            .signal("phase", SignalType::Bool)
            .singleton()
            .build()
            .unwrap();
        let mut net = NetworkBuilder::new();
        let id = net
            .isolated("deep", |net| net.create_or_load_bus(&shape, "clk"))
            .unwrap();
        assert_eq!(net.bus(id).unwrap().path(), "root/clk");
        let again = net
            .isolated("other", |net| net.create_or_load_bus(&shape, "clk"))
            .unwrap();
        assert_eq!(id, again);
    }

    #[test]
    fn test_top_level_marking() {
        let shape = word();
        let clocked = BusShape::new("Reg")
            .signal("q", SignalType::uint(8))
            .clocked()
            .build()
            .unwrap();
        let mut net = NetworkBuilder::new();
        let plain = net.create_bus(&shape, Some("p")).unwrap();
        let reg = net.create_bus(&clocked, Some("r")).unwrap();

        net.mark_top_level_input(plain).unwrap();
        net.mark_top_level_input(plain).unwrap();
        assert_eq!(net.bus(plain).unwrap().kind(), BusKind::TopLevelInput);
        assert!(matches!(
            net.mark_top_level_output(plain),
            Err(SimError::InvalidBusKind { .. })
        ));
        assert!(matches!(
            net.mark_top_level_input(reg),
            Err(SimError::InvalidBusKind { .. })
        ));
    }

    #[test]
    fn test_process_names_are_scoped() {
        let shape = word();
        let mut net = NetworkBuilder::new();
        let input = net.create_bus(&shape, Some("in")).unwrap();
        net.mark_top_level_input(input).unwrap();

        for _ in 0..2 {
            net.scoped("stage", |net| {
                let out = net.create_bus(&shape, Some("out"))?;
                identity(net, "copy", input, out);
                Ok(())
            })
            .unwrap();
        }
        let network = net.build().unwrap();
        assert!(network.process_by_name("stage/copy").is_some());
        assert!(network.process_by_name("stage#1/copy").is_some());
        assert!(network.bus_by_path("root/stage#1/out").is_some());
    }

    #[test]
    fn test_invalid_declarations() {
        let shape = word();
        let mut net = NetworkBuilder::new();
        let a = net.create_bus(&shape, Some("a")).unwrap();
        let private = net.create_internal_bus(&shape, Some("state")).unwrap();

        identity(&mut net, "dup", a, a);
        let err = net
            .combinational_fn("dup", |_io| Ok(()))
            .register()
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidDeclaration { .. }));

        let err = net
            .combinational_fn("driver", |_io| Ok(()))
            .driver()
            .register()
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidDeclaration { .. }));

        let err = net
            .combinational_fn("misuse", |_io| Ok(()))
            .input(private)
            .register()
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidDeclaration { .. }));

        net.sequential_fn("owner", |_io| Ok(Resume::Yield))
            .internal(private)
            .register()
            .unwrap();
        let err = net
            .sequential_fn("thief", |_io| Ok(Resume::Yield))
            .internal(private)
            .register()
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidDeclaration { .. }));

        let err = net
            .combinational_fn("wrong", |_io| Ok(()))
            .internal(a)
            .register()
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidDeclaration { .. }));
    }

    #[test]
    fn test_build_rejects_cycle() {
        let shape = word();
        let mut net = NetworkBuilder::new();
        let a = net.create_bus(&shape, Some("a")).unwrap();
        let b = net.create_bus(&shape, Some("b")).unwrap();
        identity(&mut net, "ab", a, b);
        identity(&mut net, "ba", b, a);
        assert_eq!(
            net.build().unwrap_err(),
            SimError::UnclockedCycle {
                processes: vec!["ab".into(), "ba".into()]
            }
        );
    }
}
