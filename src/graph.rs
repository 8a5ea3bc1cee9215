//! Dependency graph between processes and its structural validation.
//!
//! Every (writer, reader) pair sharing a bus becomes an edge. An edge is
//! *same-tick* when the reader sees the writer's value within the tick that
//! produced it, and *next-tick* when the value only becomes visible after a
//! commit: the bus is clocked or internal, the reader declared the bus as a
//! clocked input, or the reader is sequential.
//!
//! Validation rejects:
//! - any strongly connected component of same-tick edges with more than one
//!   process, and any same-tick self-edge (combinational feedback);
//! - any read of a bus that nobody writes, unless the bus is a top-level input
//!   or all of its signals have initial values.
//!
//! The combinational processes are then ordered topologically along same-tick
//! edges, breaking ties by registration order.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashSet};
use tracing::warn;

use crate::bus::{Bus, BusKind};
use crate::error::{SimError, SimResult};
use crate::process::{ProcessCategory, ProcessDecl};
use crate::types::{BusId, ProcessId};

/// Visibility relationship carried by an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    SameTick,
    NextTick,
}

/// A producer to consumer relationship through one bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// The writing process
    pub from: ProcessId,
    /// The reading process
    pub to: ProcessId,
    /// The bus carrying the dependency
    pub bus: BusId,
    pub kind: EdgeKind,
}

/// Validated dependency graph of a network.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    edges: Vec<Edge>,
    writers: Vec<Vec<ProcessId>>,
    readers: Vec<Vec<ProcessId>>,
    order: Vec<ProcessId>,
}

impl DependencyGraph {
    /// Builds and validates the graph for the given processes and buses.
    ///
    /// Cycle detection runs before the orphan-input check, so a network with
    /// both defects reports the cycle.
    pub fn build(decls: &[ProcessDecl], buses: &[Bus]) -> SimResult<Self> {
        let mut writers: Vec<Vec<ProcessId>> = vec![Vec::new(); buses.len()];
        let mut readers: Vec<Vec<(ProcessId, bool)>> = vec![Vec::new(); buses.len()];

        for (i, decl) in decls.iter().enumerate() {
            let pid = ProcessId::from_index(i);
            for bus in decl.writes() {
                let list = Self::slot(&mut writers, bus, decl)?;
                if !list.contains(&pid) {
                    list.push(pid);
                }
            }
            for (bus, clocked) in decl.reads() {
                let list = Self::slot(&mut readers, bus, decl)?;
                if !list.iter().any(|&(p, _)| p == pid) {
                    list.push((pid, clocked));
                }
            }
            for &bus in &decl.internals {
                let list = Self::slot(&mut readers, bus, decl)?;
                if !list.iter().any(|&(p, _)| p == pid) {
                    list.push((pid, true));
                }
            }
        }

        let mut edges = Vec::new();
        let mut warned = HashSet::new();
        for (b, bus) in buses.iter().enumerate() {
            for &writer in &writers[b] {
                for &(reader, declared_clocked) in &readers[b] {
                    let reader_decl = &decls[reader.index()];
                    let writer_decl = &decls[writer.index()];
                    if declared_clocked
                        && !bus.is_clocked()
                        && writer_decl.is_combinational()
                        && warned.insert((reader, b))
                    {
                        warn!(
                            process = %reader_decl.name,
                            bus = %bus.path(),
                            "clocked input on a plain bus with combinational writers; reads see last tick's value"
                        );
                    }
                    let kind = if bus.is_clocked()
                        || declared_clocked
                        || reader_decl.category == ProcessCategory::Sequential
                    {
                        EdgeKind::NextTick
                    } else {
                        EdgeKind::SameTick
                    };
                    edges.push(Edge {
                        from: writer,
                        to: reader,
                        bus: BusId::from_index(b),
                        kind,
                    });
                }
            }
        }

        let adjacency = Self::same_tick_adjacency(decls.len(), &edges);
        Self::check_cycles(decls, &adjacency)?;
        Self::check_orphans(decls, buses, &writers)?;
        let order = Self::combinational_order(decls, &adjacency)?;

        Ok(Self {
            edges,
            writers,
            readers: readers
                .into_iter()
                .map(|list| list.into_iter().map(|(p, _)| p).collect())
                .collect(),
            order,
        })
    }

    fn slot<'v, T>(
        table: &'v mut [Vec<T>],
        bus: BusId,
        decl: &ProcessDecl,
    ) -> SimResult<&'v mut Vec<T>> {
        table
            .get_mut(bus.index())
            .ok_or_else(|| SimError::InvalidDeclaration {
                process: decl.name.clone(),
                reason: format!("{} does not belong to this network", bus),
            })
    }

    fn same_tick_adjacency(count: usize, edges: &[Edge]) -> Vec<Vec<usize>> {
        let mut sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];
        for edge in edges.iter().filter(|e| e.kind == EdgeKind::SameTick) {
            sets[edge.from.index()].insert(edge.to.index());
        }
        sets.into_iter().map(|s| s.into_iter().collect()).collect()
    }

    fn check_cycles(decls: &[ProcessDecl], adjacency: &[Vec<usize>]) -> SimResult<()> {
        let cyclic = strongly_connected(adjacency)
            .into_iter()
            .filter(|c| c.len() > 1 || adjacency[c[0]].contains(&c[0]))
            .map(|mut c| {
                c.sort_unstable();
                c
            })
            .min_by_key(|c| c[0]);

        match cyclic {
            Some(component) => Err(SimError::UnclockedCycle {
                processes: component
                    .into_iter()
                    .map(|i| decls[i].name.clone())
                    .collect(),
            }),
            None => Ok(()),
        }
    }

    fn check_orphans(
        decls: &[ProcessDecl],
        buses: &[Bus],
        writers: &[Vec<ProcessId>],
    ) -> SimResult<()> {
        for decl in decls {
            for (bus, _) in decl.reads() {
                let b = bus.index();
                let target = &buses[b];
                if writers[b].is_empty()
                    && target.kind() != BusKind::TopLevelInput
                    && !target.shape().fully_defaulted()
                {
                    return Err(SimError::NoWritingParents {
                        process: decl.name.clone(),
                        bus: target.path().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over same-tick edges between combinational processes,
    /// always taking the ready process registered first.
    fn combinational_order(
        decls: &[ProcessDecl],
        adjacency: &[Vec<usize>],
    ) -> SimResult<Vec<ProcessId>> {
        let combinational: Vec<bool> = decls.iter().map(|d| d.is_combinational()).collect();
        let mut in_degree = vec![0usize; decls.len()];
        for (from, targets) in adjacency.iter().enumerate() {
            if !combinational[from] {
                continue;
            }
            for &to in targets {
                if combinational[to] {
                    in_degree[to] += 1;
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..decls.len())
            .filter(|&i| combinational[i] && in_degree[i] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::new();
        while let Some(Reverse(node)) = ready.pop() {
            order.push(ProcessId::from_index(node));
            for &next in &adjacency[node] {
                if !combinational[next] {
                    continue;
                }
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        let expected = combinational.iter().filter(|&&c| c).count();
        if order.len() != expected {
            let remaining = (0..decls.len())
                .filter(|&i| combinational[i] && in_degree[i] > 0)
                .map(|i| decls[i].name.clone())
                .collect();
            return Err(SimError::UnclockedCycle {
                processes: remaining,
            });
        }
        Ok(order)
    }

    /// Unvalidated graph evaluating the combinational processes in `order`.
    #[cfg(test)]
    pub(crate) fn with_order(bus_count: usize, order: Vec<ProcessId>) -> Self {
        Self {
            edges: Vec::new(),
            writers: vec![Vec::new(); bus_count],
            readers: vec![Vec::new(); bus_count],
            order,
        }
    }

    /// All edges, grouped by bus in creation order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn same_tick_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.kind == EdgeKind::SameTick)
    }

    /// Evaluation order of the combinational processes.
    pub fn order(&self) -> &[ProcessId] {
        &self.order
    }

    /// Processes that may write the bus.
    pub fn writers_of(&self, bus: BusId) -> &[ProcessId] {
        self.writers.get(bus.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Processes that read the bus.
    pub fn readers_of(&self, bus: BusId) -> &[ProcessId] {
        self.readers.get(bus.index()).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Tarjan's strongly connected components, iterative so deep chains cannot
/// overflow the call stack.
fn strongly_connected(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;

    let count = adjacency.len();
    let mut index = vec![UNVISITED; count];
    let mut low = vec![0usize; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut work: Vec<(usize, usize)> = Vec::new();
    let mut components = Vec::new();
    let mut next = 0usize;

    for root in 0..count {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next;
        low[root] = next;
        next += 1;
        stack.push(root);
        on_stack[root] = true;
        work.push((root, 0));

        while let Some(&(v, pos)) = work.last() {
            if let Some(&w) = adjacency[v].get(pos) {
                let top = work.len() - 1;
                work[top].1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next;
                    low[w] = next;
                    next += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    work.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if low[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}
