//! Read-only description of a validated network.
//!
//! Backends that translate a simulated design into other artifacts work from
//! a [`NetworkView`]: the process list, the bus list with kind tags and
//! shapes, the dependency edges and the evaluation order. The view is plain
//! data and serializes to JSON.

use serde::{Deserialize, Serialize};

use crate::bus::{BusKind, BusShape};
use crate::graph::{Edge, EdgeKind};
use crate::network::Network;
use crate::process::ProcessDecl;
use crate::types::{BusId, ProcessId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub id: ProcessId,
    #[serde(flatten)]
    pub decl: ProcessDecl,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusInfo {
    pub id: BusId,
    pub name: String,
    /// Scope-qualified name
    pub path: String,
    pub kind: BusKind,
    pub shape: BusShape,
}

/// Snapshot of a network's structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkView {
    pub processes: Vec<ProcessInfo>,
    pub buses: Vec<BusInfo>,
    pub edges: Vec<Edge>,
    /// Evaluation order of the combinational processes
    pub order: Vec<ProcessId>,
}

impl NetworkView {
    pub(crate) fn new(network: &Network) -> Self {
        let processes = network
            .processes()
            .enumerate()
            .map(|(i, decl)| ProcessInfo {
                id: ProcessId::from_index(i),
                decl: decl.clone(),
            })
            .collect();
        let buses = network
            .buses()
            .iter()
            .map(|bus| BusInfo {
                id: bus.id(),
                name: bus.name().to_string(),
                path: bus.path().to_string(),
                kind: bus.kind(),
                shape: bus.shape().as_ref().clone(),
            })
            .collect();

        Self {
            processes,
            buses,
            edges: network.graph().edges().to_vec(),
            order: network.graph().order().to_vec(),
        }
    }

    pub fn process(&self, name: &str) -> Option<&ProcessInfo> {
        self.processes.iter().find(|p| p.decl.name == name)
    }

    pub fn bus(&self, path: &str) -> Option<&BusInfo> {
        self.buses.iter().find(|b| b.path == path)
    }

    pub fn top_level_inputs(&self) -> impl Iterator<Item = &BusInfo> {
        self.buses
            .iter()
            .filter(|b| b.kind == BusKind::TopLevelInput)
    }

    pub fn top_level_outputs(&self) -> impl Iterator<Item = &BusInfo> {
        self.buses
            .iter()
            .filter(|b| b.kind == BusKind::TopLevelOutput)
    }

    pub fn same_tick_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.kind == EdgeKind::SameTick)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
