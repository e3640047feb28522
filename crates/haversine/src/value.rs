//! JSON value types produced by the parser.
//!
//! [`JsonValue`] borrows its strings either from the input buffer or from an
//! [`Arena`](crate::Arena), so a parsed tree can never outlive the storage its
//! leaves point into.
//!
//! Objects are stored in a [`JsonObject`]: a fixed-capacity slot table
//! addressed by `hash(key) % capacity` with linear probing on collision. The
//! table never grows or rehashes.

use core::fmt;

use crate::{
    error::{ObjectFull, TypeMismatch},
    span::ByteSpan,
};

/// Slot count of objects created with default parser options.
pub const DEFAULT_OBJECT_CAPACITY: usize = 32;

/// The variant of a [`JsonValue`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    String,
    Object,
    Array,
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JsonKind::Null => "null",
            JsonKind::Bool => "bool",
            JsonKind::Number => "number",
            JsonKind::String => "string",
            JsonKind::Object => "object",
            JsonKind::Array => "array",
        })
    }
}

/// A parsed JSON value.
///
/// # Examples
///
/// ```
/// use haversine::{Arena, JsonValue, ParserOptions, parse};
///
/// let arena = Arena::with_capacity(1024);
/// let value = parse(br#"{"x0": 1.5, "tags": [true, null]}"#, &arena, ParserOptions::default())?;
///
/// assert_eq!(value.get("x0").and_then(|v| v.as_f64().ok()), Some(1.5));
/// // objects print in slot order
/// assert_eq!(value.to_string(), r#"{"tags":[true,null],"x0":1.5}"#);
/// # Ok::<(), haversine::ParserError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JsonValue<'a> {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(ByteSpan<'a>),
    Object(JsonObject<'a>),
    Array(JsonArray<'a>),
}

impl<'a> JsonValue<'a> {
    #[must_use]
    pub fn kind(&self) -> JsonKind {
        match self {
            JsonValue::Null => JsonKind::Null,
            JsonValue::Bool(_) => JsonKind::Bool,
            JsonValue::Number(_) => JsonKind::Number,
            JsonValue::String(_) => JsonKind::String,
            JsonValue::Object(_) => JsonKind::Object,
            JsonValue::Array(_) => JsonKind::Array,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn mismatch(&self, expected: JsonKind) -> TypeMismatch {
        TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    /// # Errors
    ///
    /// Returns [`TypeMismatch`] unless the value is a [`Bool`](Self::Bool).
    pub fn as_bool(&self) -> Result<bool, TypeMismatch> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(other.mismatch(JsonKind::Bool)),
        }
    }

    /// # Errors
    ///
    /// Returns [`TypeMismatch`] unless the value is a [`Number`](Self::Number).
    pub fn as_f64(&self) -> Result<f64, TypeMismatch> {
        match self {
            Self::Number(n) => Ok(*n),
            other => Err(other.mismatch(JsonKind::Number)),
        }
    }

    /// # Errors
    ///
    /// Returns [`TypeMismatch`] unless the value is a [`String`](Self::String).
    pub fn as_span(&self) -> Result<ByteSpan<'a>, TypeMismatch> {
        match self {
            Self::String(s) => Ok(*s),
            other => Err(other.mismatch(JsonKind::String)),
        }
    }

    /// # Errors
    ///
    /// Returns [`TypeMismatch`] unless the value is an [`Object`](Self::Object).
    pub fn as_object(&self) -> Result<&JsonObject<'a>, TypeMismatch> {
        match self {
            Self::Object(o) => Ok(o),
            other => Err(other.mismatch(JsonKind::Object)),
        }
    }

    /// # Errors
    ///
    /// Returns [`TypeMismatch`] unless the value is an [`Array`](Self::Array).
    pub fn as_array(&self) -> Result<&JsonArray<'a>, TypeMismatch> {
        match self {
            Self::Array(a) => Ok(a),
            other => Err(other.mismatch(JsonKind::Array)),
        }
    }

    /// Looks up `key` when the value is an object; `None` otherwise.
    #[must_use]
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&JsonValue<'a>> {
        match self {
            Self::Object(o) => o.get(key),
            _ => None,
        }
    }
}

impl From<bool> for JsonValue<'_> {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for JsonValue<'_> {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl<'a> From<ByteSpan<'a>> for JsonValue<'a> {
    fn from(v: ByteSpan<'a>) -> Self {
        Self::String(v)
    }
}

impl<'a> From<JsonObject<'a>> for JsonValue<'a> {
    fn from(v: JsonObject<'a>) -> Self {
        Self::Object(v)
    }
}

impl<'a> From<JsonArray<'a>> for JsonValue<'a> {
    fn from(v: JsonArray<'a>) -> Self {
        Self::Array(v)
    }
}

/// djb2, xor variant.
pub(crate) fn hash_key(key: &[u8]) -> u64 {
    key.iter().fold(5381u64, |hash, &b| {
        (hash << 5).wrapping_add(hash) ^ u64::from(b)
    })
}

#[derive(Debug, Clone, PartialEq)]
struct Entry<'a> {
    key: ByteSpan<'a>,
    value: JsonValue<'a>,
}

/// Outcome of probing the slot table for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    Vacant(usize),
    Occupied(usize),
}

/// A bounded, open-addressed map from byte-string keys to values.
///
/// Capacity is fixed at creation. Collisions are resolved by linear probing;
/// inserting an existing key replaces its value. Iteration walks the slots in
/// table order, which is generally not input order.
#[derive(Debug, Clone)]
pub struct JsonObject<'a> {
    slots: Vec<Option<Entry<'a>>>,
    len: usize,
}

impl<'a> JsonObject<'a> {
    /// Creates an empty table with `capacity` slots (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity.max(1), || None);
        Self { slots, len: 0 }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn home_slot(&self, key: &[u8]) -> usize {
        (hash_key(key) % self.slots.len() as u64) as usize
    }

    /// Finds the slot that holds `key`, or the first free slot on its probe
    /// sequence.
    pub(crate) fn probe(&self, key: &[u8]) -> Result<Probe, ObjectFull> {
        let capacity = self.slots.len();
        let home = self.home_slot(key);
        for step in 0..capacity {
            let index = (home + step) % capacity;
            match &self.slots[index] {
                None => return Ok(Probe::Vacant(index)),
                Some(entry) if entry.key == key => return Ok(Probe::Occupied(index)),
                Some(_) => {
                    tracing::trace!(home, index, "object slot collision, probing");
                }
            }
        }
        Err(ObjectFull { capacity })
    }

    /// Stores an entry in a slot returned by [`probe`](Self::probe).
    pub(crate) fn fill(
        &mut self,
        probe: Probe,
        key: ByteSpan<'a>,
        value: JsonValue<'a>,
    ) -> Option<JsonValue<'a>> {
        match probe {
            Probe::Vacant(index) => {
                self.len += 1;
                self.slots[index] = Some(Entry { key, value });
                None
            }
            Probe::Occupied(index) => self.slots[index]
                .replace(Entry { key, value })
                .map(|old| old.value),
        }
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectFull`] when `key` is new and every slot is taken.
    pub fn insert(
        &mut self,
        key: ByteSpan<'a>,
        value: JsonValue<'a>,
    ) -> Result<Option<JsonValue<'a>>, ObjectFull> {
        let probe = self.probe(key.as_bytes())?;
        Ok(self.fill(probe, key, value))
    }

    #[must_use]
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&JsonValue<'a>> {
        let key = key.as_ref();
        let capacity = self.slots.len();
        let home = self.home_slot(key);
        for step in 0..capacity {
            // no deletions, so an empty slot ends the probe sequence
            let entry = self.slots[(home + step) % capacity].as_ref()?;
            if entry.key == key {
                return Some(&entry.value);
            }
        }
        None
    }

    #[must_use]
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over occupied slots in table order.
    pub fn iter(&self) -> impl Iterator<Item = (ByteSpan<'a>, &JsonValue<'a>)> {
        self.slots
            .iter()
            .flatten()
            .map(|entry| (entry.key, &entry.value))
    }
}

impl PartialEq for JsonObject<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .iter()
                .all(|(key, value)| other.get(key.as_bytes()) == Some(value))
    }
}

/// An ordered, growable sequence of values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonArray<'a> {
    items: Vec<JsonValue<'a>>,
}

impl<'a> JsonArray<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: JsonValue<'a>) {
        self.items.push(value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&JsonValue<'a>> {
        self.items.get(index)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[JsonValue<'a>] {
        &self.items
    }

    pub fn iter(&self) -> core::slice::Iter<'_, JsonValue<'a>> {
        self.items.iter()
    }
}

impl<'a, 'v> IntoIterator for &'v JsonArray<'a> {
    type Item = &'v JsonValue<'a>;
    type IntoIter = core::slice::Iter<'v, JsonValue<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a> FromIterator<JsonValue<'a>> for JsonArray<'a> {
    fn from_iter<I: IntoIterator<Item = JsonValue<'a>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for JsonValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonValue::Null => f.write_str("null"),
            JsonValue::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            JsonValue::Number(n) => write!(f, "{n}"),
            // strings never contain a quote, so no escaping is needed
            JsonValue::String(s) => write!(f, "\"{s}\""),
            JsonValue::Array(arr) => {
                f.write_str("[")?;
                let mut first = true;
                for v in arr {
                    if !first {
                        f.write_str(",")?;
                    }
                    first = false;
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            JsonValue::Object(map) => {
                f.write_str("{")?;
                let mut first = true;
                for (k, v) in map.iter() {
                    if !first {
                        f.write_str(",")?;
                    }
                    first = false;
                    write!(f, "\"{k}\":{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}
