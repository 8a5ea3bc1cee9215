//! Hierarchical bus namespaces.
//!
//! A [`Scope`] is a stack of frames. Each frame maps `(shape name, bus name)`
//! to a bus handle. Lookups walk from the innermost frame outwards and stop
//! after the first isolated frame, so a sub-network can be instantiated many
//! times without its internal bus names colliding.
//!
//! # Example
//!
//! ```
//! use tickwire::NetworkBuilder;
//! use tickwire::bus::BusShape;
//! use tickwire::value::SignalType;
//!
//! let shape = BusShape::new("Word").signal("data", SignalType::uint(16)).build().unwrap();
//! let mut net = NetworkBuilder::new();
//!
//! let a = net.scoped("lane", |net| net.create_bus(&shape, Some("data"))).unwrap();
//! let b = net.scoped("lane", |net| net.create_bus(&shape, Some("data"))).unwrap();
//! assert_ne!(a, b);
//! ```

use std::collections::HashMap;

use crate::error::{SimError, SimResult};
use crate::types::BusId;

#[derive(Debug)]
struct Frame {
    path: String,
    isolated: bool,
    buses: HashMap<(String, String), BusId>,
    /// How many times each child label has been pushed under this frame
    children: HashMap<String, usize>,
}

impl Frame {
    fn new(path: String, isolated: bool) -> Self {
        Self {
            path,
            isolated,
            buses: HashMap::new(),
            children: HashMap::new(),
        }
    }
}

/// A stack of bus namespaces.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Creates a scope holding only the root frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new("root".to_string(), true)],
        }
    }

    /// Enters a nested frame that falls back to its parent on lookup misses.
    pub fn push(&mut self, label: impl Into<String>) {
        self.push_frame(label.into(), false);
    }

    /// Enters a nested frame that never falls back to its parents.
    pub fn push_isolated(&mut self, label: impl Into<String>) {
        self.push_frame(label.into(), true);
    }

    fn push_frame(&mut self, label: String, isolated: bool) {
        let parent = self.current_mut();
        let seen = parent.children.entry(label.clone()).or_insert(0);
        let path = if *seen == 0 {
            format!("{}/{}", parent.path, label)
        } else {
            format!("{}/{}#{}", parent.path, label, seen)
        };
        *seen += 1;
        self.frames.push(Frame::new(path, isolated));
    }

    /// Leaves the innermost frame, dropping its bindings.
    ///
    /// The buses themselves live on in the network; only the names go away.
    pub fn pop(&mut self) -> SimResult<()> {
        if self.frames.len() == 1 {
            return Err(SimError::ScopeUnderflow);
        }
        self.frames.pop();
        Ok(())
    }

    /// Number of frames, including the root.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Path of the innermost frame, e.g. `root/cpu/alu`.
    pub fn path(&self) -> &str {
        &self.current().path
    }

    fn current(&self) -> &Frame {
        // The root frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Resolves a bus name, walking outwards until an isolated frame.
    pub fn lookup(&self, shape: &str, name: &str) -> Option<BusId> {
        let key = (shape.to_string(), name.to_string());
        for frame in self.frames.iter().rev() {
            if let Some(&id) = frame.buses.get(&key) {
                return Some(id);
            }
            if frame.isolated {
                break;
            }
        }
        None
    }

    /// Resolves a bus name in the innermost frame only.
    pub fn lookup_local(&self, shape: &str, name: &str) -> Option<BusId> {
        self.current()
            .buses
            .get(&(shape.to_string(), name.to_string()))
            .copied()
    }

    /// Resolves a bus name in the root frame only.
    pub fn lookup_root(&self, shape: &str, name: &str) -> Option<BusId> {
        self.frames[0]
            .buses
            .get(&(shape.to_string(), name.to_string()))
            .copied()
    }

    /// Binds a name in the innermost frame.
    pub(crate) fn bind(&mut self, shape: &str, name: &str, id: BusId) -> SimResult<()> {
        let frame = self.current_mut();
        Self::bind_in(frame, shape, name, id)
    }

    /// Binds a name in the root frame.
    pub(crate) fn bind_root(&mut self, shape: &str, name: &str, id: BusId) -> SimResult<()> {
        Self::bind_in(&mut self.frames[0], shape, name, id)
    }

    fn bind_in(frame: &mut Frame, shape: &str, name: &str, id: BusId) -> SimResult<()> {
        let key = (shape.to_string(), name.to_string());
        if frame.buses.contains_key(&key) {
            return Err(SimError::DuplicateBus {
                shape: shape.to_string(),
                name: name.to_string(),
                scope: frame.path.clone(),
            });
        }
        frame.buses.insert(key, id);
        Ok(())
    }
}
