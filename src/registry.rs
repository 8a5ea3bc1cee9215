//! Bus shape registry.
//!
//! The registry keeps validated bus shapes by name so that network
//! construction code can look them up instead of re-declaring them, and so
//! that shapes declared in a configuration file can be used directly.
//!
//! # Example
//!
//! ```
//! use tickwire::registry::ShapeRegistry;
//! use tickwire::bus::BusShape;
//! use tickwire::value::SignalType;
//!
//! let mut registry = ShapeRegistry::new();
//! registry
//!     .register(BusShape::new("Word").signal("data", SignalType::uint(16)))
//!     .unwrap();
//!
//! let word = registry.get("Word").unwrap();
//! assert_eq!(word.signals.len(), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bus::BusShape;
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};

/// Validated bus shapes, by name.
#[derive(Clone, Debug, Default)]
pub struct ShapeRegistry {
    shapes: BTreeMap<String, Arc<BusShape>>,
}

impl ShapeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every shape declared in a configuration.
    pub fn from_config(config: &SimConfig) -> SimResult<Self> {
        let mut registry = Self::new();
        for shape in &config.shapes {
            registry.register(shape.clone())?;
        }
        Ok(registry)
    }

    /// Validates and registers a shape, returning the shared handle.
    ///
    /// A name may only be registered once.
    pub fn register(&mut self, shape: BusShape) -> SimResult<Arc<BusShape>> {
        if self.shapes.contains_key(&shape.name) {
            return Err(SimError::InvalidShape {
                shape: shape.name,
                reason: "a shape with this name is already registered".to_string(),
            });
        }
        let shape = shape.build()?;
        self.shapes.insert(shape.name.clone(), shape.clone());
        Ok(shape)
    }

    /// Looks up a shape by name.
    pub fn get(&self, name: &str) -> Option<Arc<BusShape>> {
        self.shapes.get(name).cloned()
    }

    /// Looks up a shape by name, failing if it is unknown.
    pub fn require(&self, name: &str) -> SimResult<Arc<BusShape>> {
        self.get(name).ok_or_else(|| SimError::InvalidShape {
            shape: name.to_string(),
            reason: "no shape with this name is registered".to_string(),
        })
    }

    /// Returns true if a shape is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.shapes.contains_key(name)
    }

    /// Returns the number of registered shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Returns true if no shapes are registered.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(String::as_str)
    }

    /// Removes a shape. Buses already created from it keep their copy.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.shapes.remove(name).is_some()
    }
}
