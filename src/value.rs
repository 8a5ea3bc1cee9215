//! Signal type descriptors and runtime values.
//!
//! A signal carries one of three families of values: a scalar (boolean,
//! fixed-width unsigned or signed integer), an enumeration, or a fixed-length
//! array of scalars. Widths are checked on every write so that a simulated
//! design never holds a value its hardware counterpart could not.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Describes the type of a single bus signal.
///
/// # Example
///
/// ```
/// use tickwire::value::{SignalType, Value};
///
/// let ty = SignalType::uint(4);
/// assert_eq!(ty.coerce(Value::UInt(15)), Some(Value::UInt(15)));
/// assert_eq!(ty.coerce(Value::UInt(16)), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SignalType {
    /// Single bit
    Bool,
    /// Unsigned integer of the given width (1..=64 bits)
    UInt { bits: u8 },
    /// Two's complement integer of the given width (1..=64 bits)
    Int { bits: u8 },
    /// Enumeration with named variants
    Enum { name: String, variants: Vec<String> },
    /// Fixed-length array of scalars
    Array { elem: Box<SignalType>, len: usize },
}

impl SignalType {
    /// Unsigned integer type of `bits` width.
    pub fn uint(bits: u8) -> Self {
        SignalType::UInt { bits }
    }

    /// Signed integer type of `bits` width.
    pub fn int(bits: u8) -> Self {
        SignalType::Int { bits }
    }

    /// Enumeration type.
    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SignalType::Enum {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// Fixed-length array of `elem`.
    pub fn array(elem: SignalType, len: usize) -> Self {
        SignalType::Array {
            elem: Box::new(elem),
            len,
        }
    }

    /// Returns true for every type that may be an array element.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, SignalType::Array { .. })
    }

    /// Checks that the descriptor itself is well formed.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            SignalType::Bool => Ok(()),
            SignalType::UInt { bits } | SignalType::Int { bits } => {
                if *bits == 0 || *bits > 64 {
                    Err(format!("integer width {} is outside 1..=64", bits))
                } else {
                    Ok(())
                }
            }
            SignalType::Enum { name, variants } => {
                if variants.is_empty() {
                    return Err(format!("enum {} has no variants", name));
                }
                for (i, v) in variants.iter().enumerate() {
                    if variants[..i].contains(v) {
                        return Err(format!("enum {} repeats variant {}", name, v));
                    }
                }
                Ok(())
            }
            SignalType::Array { elem, len } => {
                if *len == 0 {
                    return Err("array length must be at least 1".to_string());
                }
                if !elem.is_scalar() {
                    return Err("array elements must be scalars".to_string());
                }
                elem.validate()
            }
        }
    }

    /// The all-zero value of this type (first variant for enums).
    pub fn zero(&self) -> Value {
        match self {
            SignalType::Bool => Value::Bool(false),
            SignalType::UInt { .. } => Value::UInt(0),
            SignalType::Int { .. } => Value::Int(0),
            SignalType::Enum { variants, .. } => {
                Value::Enum(variants.first().cloned().unwrap_or_default())
            }
            SignalType::Array { elem, len } => Value::Array(vec![elem.zero(); *len]),
        }
    }

    /// Converts `value` into this type's canonical representation.
    ///
    /// Signed and unsigned integers convert into each other when the number
    /// fits the target width. Returns `None` when the value cannot be
    /// represented.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (SignalType::Bool, Value::Bool(b)) => Some(Value::Bool(b)),
            (SignalType::UInt { bits }, Value::UInt(n)) if fits_unsigned(n, *bits) => {
                Some(Value::UInt(n))
            }
            (SignalType::UInt { bits }, Value::Int(n))
                if n >= 0 && fits_unsigned(n as u64, *bits) =>
            {
                Some(Value::UInt(n as u64))
            }
            (SignalType::Int { bits }, Value::Int(n)) if fits_signed(n, *bits) => {
                Some(Value::Int(n))
            }
            (SignalType::Int { bits }, Value::UInt(n))
                if n <= i64::MAX as u64 && fits_signed(n as i64, *bits) =>
            {
                Some(Value::Int(n as i64))
            }
            (SignalType::Enum { variants, .. }, Value::Enum(v)) if variants.contains(&v) => {
                Some(Value::Enum(v))
            }
            (SignalType::Array { elem, len }, Value::Array(items)) if items.len() == *len => items
                .into_iter()
                .map(|item| elem.coerce(item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            _ => None,
        }
    }
}

fn fits_unsigned(n: u64, bits: u8) -> bool {
    bits >= 64 || n >> bits == 0
}

fn fits_signed(n: i64, bits: u8) -> bool {
    if bits >= 64 {
        return true;
    }
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    n >= min && n <= max
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Bool => write!(f, "bool"),
            SignalType::UInt { bits } => write!(f, "u{}", bits),
            SignalType::Int { bits } => write!(f, "i{}", bits),
            SignalType::Enum { name, .. } => write!(f, "enum {}", name),
            SignalType::Array { elem, len } => write!(f, "[{}; {}]", elem, len),
        }
    }
}

/// A signal value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    UInt(u64),
    Int(i64),
    Enum(String),
    Array(Vec<Value>),
}

impl Value {
    /// Builds an array value from anything convertible into values.
    pub fn array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Builds an enum value from a variant name.
    pub fn variant(name: impl Into<String>) -> Self {
        Value::Enum(name.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(n) => Some(*n),
            Value::Int(n) if *n >= 0 => Some(*n as u64),
            _ => None,
        }
    }

    /// Returns the value as a signed integer if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) if *n <= i64::MAX as u64 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&str> {
        match self {
            Value::Enum(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Short family name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::UInt(_) => "unsigned",
            Value::Int(_) => "signed",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Int(n) => write!(f, "{}", n),
            Value::Enum(v) => write!(f, "{}", v),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::UInt(n as u64)
            }
        })*
    };
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Int(n as i64)
            }
        })*
    };
}

impl_from_unsigned!(u8, u16, u32, u64, usize);
impl_from_signed!(i8, i16, i32, i64);

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}
