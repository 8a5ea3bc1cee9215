//! Buses, their interface shapes, and per-tick signal bookkeeping.
//!
//! A [`BusShape`] is the interface of a bus: an ordered list of typed signals
//! plus flags describing how instances behave. A [`Bus`] is one instance of a
//! shape living in a network's arena.
//!
//! # Visibility rules
//!
//! - On a plain bus a write is visible to combinational readers in the same
//!   tick. A signal not written in a tick keeps its last committed value.
//! - On a clocked (or internal) bus a write lands in a shadow slot and becomes
//!   visible only after the tick commits, i.e. from the next tick on.
//!
//! # Single-driver rules
//!
//! - A plain signal may be written by one writer per tick. The same writer may
//!   rewrite it while the tick stabilizes.
//! - A clocked signal has one driver for the whole run: the first writer to
//!   touch it. Any other writer in any tick is rejected.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{SimError, SimResult};
use crate::types::{BusId, WriterId};
use crate::value::{SignalType, Value};

/// One named, typed field of a bus shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDesc {
    /// Name of the signal, unique within its shape
    pub name: String,
    /// Type descriptor
    pub ty: SignalType,
    /// Initial value, if any
    #[serde(default)]
    pub default: Option<Value>,
}

impl SignalDesc {
    /// Creates a signal without a default value.
    pub fn new(name: impl Into<String>, ty: SignalType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    /// Sets the initial value of this signal.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// The interface shape of a bus.
///
/// # Example
///
/// ```
/// use tickwire::bus::BusShape;
/// use tickwire::value::{SignalType, Value};
///
/// let shape = BusShape::new("Pixel")
///     .signal("valid", SignalType::Bool)
///     .signal("color", SignalType::uint(24))
///     .signal_with_default("bias", SignalType::array(SignalType::uint(8), 3), Value::array([0u8, 1, 2]))
///     .build()
///     .unwrap();
///
/// assert_eq!(shape.signals.len(), 3);
/// assert!(!shape.clocked);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusShape {
    /// Shape name; part of every bus identity
    pub name: String,
    /// Ordered signal list
    pub signals: Vec<SignalDesc>,
    /// Writes become visible on the next tick (register semantics)
    #[serde(default)]
    pub clocked: bool,
    /// Signals without an explicit default start at the zero of their type
    #[serde(default)]
    pub initialized: bool,
    /// Exactly one instance per network, always resolved in the root scope
    #[serde(default)]
    pub singleton: bool,
}

impl BusShape {
    /// Creates an empty shape.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signals: Vec::new(),
            clocked: false,
            initialized: false,
            singleton: false,
        }
    }

    /// Adds a signal without a default.
    pub fn signal(mut self, name: impl Into<String>, ty: SignalType) -> Self {
        self.signals.push(SignalDesc::new(name, ty));
        self
    }

    /// Adds a signal with an initial value.
    pub fn signal_with_default(
        mut self,
        name: impl Into<String>,
        ty: SignalType,
        default: impl Into<Value>,
    ) -> Self {
        self.signals.push(SignalDesc::new(name, ty).with_default(default));
        self
    }

    /// Adds a prepared signal description.
    pub fn with_signal(mut self, desc: SignalDesc) -> Self {
        self.signals.push(desc);
        self
    }

    /// Marks instances of this shape as clocked.
    pub fn clocked(mut self) -> Self {
        self.clocked = true;
        self
    }

    /// Gives every signal without a default the zero of its type.
    pub fn initialized(mut self) -> Self {
        self.initialized = true;
        self
    }

    /// Marks this shape as a singleton.
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Declares a signal, checking it against the signals already present.
    pub fn declare_signal(
        &mut self,
        name: impl Into<String>,
        ty: SignalType,
        default: Option<Value>,
    ) -> SimResult<()> {
        let desc = SignalDesc {
            name: name.into(),
            ty,
            default,
        };
        self.check_signal(&desc)?;
        if self.signals.iter().any(|s| s.name == desc.name) {
            return Err(self.invalid(format!("signal `{}` is declared twice", desc.name)));
        }
        self.signals.push(desc);
        Ok(())
    }

    /// Validates the shape and wraps it for sharing between bus instances.
    pub fn build(self) -> SimResult<Arc<BusShape>> {
        self.validate()?;
        Ok(Arc::new(self))
    }

    /// Checks every signal and the shape-level rules.
    pub fn validate(&self) -> SimResult<()> {
        if self.name.is_empty() {
            return Err(self.invalid("shape name is empty"));
        }
        if self.signals.is_empty() {
            return Err(self.invalid("shape has no signals"));
        }
        for (i, desc) in self.signals.iter().enumerate() {
            if self.signals[..i].iter().any(|s| s.name == desc.name) {
                return Err(self.invalid(format!("signal `{}` is declared twice", desc.name)));
            }
            self.check_signal(desc)?;
        }
        Ok(())
    }

    fn check_signal(&self, desc: &SignalDesc) -> SimResult<()> {
        if desc.name.is_empty() {
            return Err(self.invalid("signal name is empty"));
        }
        desc.ty
            .validate()
            .map_err(|reason| self.invalid(format!("signal `{}`: {}", desc.name, reason)))?;
        if let Some(default) = &desc.default {
            if desc.ty.coerce(default.clone()).is_none() {
                return Err(self.invalid(format!(
                    "default {} of signal `{}` does not fit {}",
                    default, desc.name, desc.ty
                )));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> SimError {
        SimError::InvalidShape {
            shape: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// The value a signal holds before anything writes it.
    pub fn initial_value(&self, desc: &SignalDesc) -> Option<Value> {
        match &desc.default {
            Some(default) => desc.ty.coerce(default.clone()),
            None if self.initialized => Some(desc.ty.zero()),
            None => None,
        }
    }

    /// True when every signal has an initial value.
    pub fn fully_defaulted(&self) -> bool {
        self.signals.iter().all(|s| self.initial_value(s).is_some())
    }
}

/// How a bus instance participates in the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    /// Ordinary same-tick bus
    Plain,
    /// Private register-like bus owned by one process
    Internal,
    /// External pin driven from outside the network
    TopLevelInput,
    /// External pin observed from outside the network
    TopLevelOutput,
    /// Register bus; writes become visible on the next tick
    Clocked,
}

impl BusKind {
    /// Clocked and internal buses defer writes to the next tick.
    pub fn is_clocked(self) -> bool {
        matches!(self, BusKind::Clocked | BusKind::Internal)
    }

    pub fn is_top_level(self) -> bool {
        matches!(self, BusKind::TopLevelInput | BusKind::TopLevelOutput)
    }
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BusKind::Plain => "plain",
            BusKind::Internal => "internal",
            BusKind::TopLevelInput => "top-level input",
            BusKind::TopLevelOutput => "top-level output",
            BusKind::Clocked => "clocked",
        };
        f.write_str(s)
    }
}

/// Why a bus rejected a signal access. Mapped to [`SimError`] by the caller,
/// which knows the names of the parties involved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SignalFault {
    Unknown,
    Type { expected: String, found: &'static str },
    Conflict { first: WriterId },
    Unset,
}

#[derive(Clone, Debug, Default)]
struct SignalSlot {
    /// Value visible at the start of the tick
    committed: Option<Value>,
    /// Value written this tick (shadow value for clocked buses)
    pending: Option<Value>,
    /// Writer of record for this tick
    writer: Option<WriterId>,
    /// Permanent driver of a clocked signal
    driver: Option<WriterId>,
    /// Read during the current stabilization pass
    read_in_pass: bool,
}

/// A bus instance with its signal state.
#[derive(Debug)]
pub struct Bus {
    id: BusId,
    name: String,
    path: String,
    shape: Arc<BusShape>,
    kind: BusKind,
    slots: Vec<SignalSlot>,
    lookup: HashMap<String, usize>,
}

impl Bus {
    pub(crate) fn new(
        id: BusId,
        name: impl Into<String>,
        path: impl Into<String>,
        shape: Arc<BusShape>,
        kind: BusKind,
    ) -> Self {
        let slots = shape
            .signals
            .iter()
            .map(|desc| SignalSlot {
                committed: shape.initial_value(desc),
                ..SignalSlot::default()
            })
            .collect();
        let lookup = shape
            .signals
            .iter()
            .enumerate()
            .map(|(i, desc)| (desc.name.clone(), i))
            .collect();

        Self {
            id,
            name: name.into(),
            path: path.into(),
            shape,
            kind,
            slots,
            lookup,
        }
    }

    pub fn id(&self) -> BusId {
        self.id
    }

    /// Local name of the bus within its scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scope-qualified name, e.g. `root/alu/operands`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn shape(&self) -> &Arc<BusShape> {
        &self.shape
    }

    pub fn kind(&self) -> BusKind {
        self.kind
    }

    pub fn is_clocked(&self) -> bool {
        self.kind.is_clocked()
    }

    pub(crate) fn set_kind(&mut self, kind: BusKind) {
        self.kind = kind;
    }

    /// Committed value of a signal, as seen at the next tick boundary.
    pub fn value(&self, signal: &str) -> Option<&Value> {
        self.lookup
            .get(signal)
            .and_then(|&i| self.slots[i].committed.as_ref())
    }

    /// True if the signal was written during the tick in progress.
    pub fn written_this_tick(&self, signal: &str) -> bool {
        self.lookup
            .get(signal)
            .map(|&i| self.slots[i].writer.is_some())
            .unwrap_or(false)
    }

    fn index_of(&self, signal: &str) -> Result<usize, SignalFault> {
        self.lookup.get(signal).copied().ok_or(SignalFault::Unknown)
    }

    /// Coerces `value` to the declared type of `signal`.
    pub(crate) fn check(&self, signal: &str, value: Value) -> Result<Value, SignalFault> {
        let index = self.index_of(signal)?;
        self.coerce_at(index, value)
    }

    fn coerce_at(&self, index: usize, value: Value) -> Result<Value, SignalFault> {
        let ty = &self.shape.signals[index].ty;
        let found = value.kind_name();
        ty.coerce(value).ok_or_else(|| SignalFault::Type {
            expected: ty.to_string(),
            found,
        })
    }

    /// Writes a signal on behalf of `writer`.
    ///
    /// Returns true when the write changed a value that was already read in
    /// the current stabilization pass, meaning that reader saw a stale value.
    pub(crate) fn write(
        &mut self,
        signal: &str,
        value: Value,
        writer: WriterId,
    ) -> Result<bool, SignalFault> {
        let index = self.index_of(signal)?;
        let value = self.coerce_at(index, value)?;
        let clocked = self.is_clocked();
        let slot = &mut self.slots[index];

        if clocked {
            match slot.driver {
                Some(first) if first != writer => return Err(SignalFault::Conflict { first }),
                _ => slot.driver = Some(writer),
            }
            slot.pending = Some(value);
            slot.writer = Some(writer);
            return Ok(false);
        }

        if let Some(first) = slot.writer {
            if first != writer {
                return Err(SignalFault::Conflict { first });
            }
        }

        let visible = slot.pending.as_ref().or(slot.committed.as_ref());
        let stale = slot.read_in_pass && visible != Some(&value);
        slot.pending = Some(value);
        slot.writer = Some(writer);
        Ok(stale)
    }

    /// Reads a signal.
    ///
    /// With `latest` set, plain buses expose this tick's writes; otherwise
    /// only committed values are visible. Clocked buses always expose the
    /// committed value.
    pub(crate) fn read(&mut self, signal: &str, latest: bool) -> Result<Value, SignalFault> {
        let index = self.index_of(signal)?;
        let clocked = self.is_clocked();
        let slot = &mut self.slots[index];

        let visible = if latest && !clocked {
            slot.pending.as_ref().or(slot.committed.as_ref())
        } else {
            slot.committed.as_ref()
        };
        let value = visible.cloned().ok_or(SignalFault::Unset)?;
        if latest {
            slot.read_in_pass = true;
        }
        Ok(value)
    }

    pub(crate) fn can_read(&self, signal: &str, latest: bool) -> bool {
        match self.lookup.get(signal) {
            Some(&i) => {
                let slot = &self.slots[i];
                if latest && !self.is_clocked() {
                    slot.pending.is_some() || slot.committed.is_some()
                } else {
                    slot.committed.is_some()
                }
            }
            None => false,
        }
    }

    /// Starts a stabilization pass.
    pub(crate) fn begin_pass(&mut self) {
        for slot in &mut self.slots {
            slot.read_in_pass = false;
        }
    }

    /// Promotes this tick's writes and clears the per-tick flags.
    pub(crate) fn commit(&mut self) {
        for slot in &mut self.slots {
            if let Some(value) = slot.pending.take() {
                slot.committed = Some(value);
            }
            slot.writer = None;
            slot.read_in_pass = false;
        }
    }

    /// Drops this tick's writes without promoting them.
    pub(crate) fn discard(&mut self) {
        for slot in &mut self.slots {
            slot.pending = None;
            slot.writer = None;
            slot.read_in_pass = false;
        }
    }

    /// Signals nobody wrote during the tick in progress.
    pub(crate) fn unwritten_signals(&self) -> Vec<&str> {
        self.shape
            .signals
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.writer.is_none())
            .map(|(desc, _)| desc.name.as_str())
            .collect()
    }
}
