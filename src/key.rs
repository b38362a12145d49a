//! The logical key type.
//!
//! [`Key`] is a tagged union over everything a [`ValueMap`](crate::ValueMap)
//! accepts as a key: JSON scalars, arrays, string-keyed objects, date/time
//! instants, and extension values handled by a registered
//! [`KeyCodec`](crate::codec::KeyCodec).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::canonical::{format_instant, number_text};
use crate::error::SerializationError;

/// A map key, compared by structural value.
///
/// Equality is structural and agrees with fingerprint equality: objects
/// compare equal regardless of field order, arrays compare element by element,
/// numbers compare by canonical value (`1 == 1.0`, `-0.0 == 0`) and instants
/// at millisecond precision. Custom values compare by identity, since only
/// their codec knows what their content means.
///
/// `Object` keeps the caller's field order so that iteration hands back the key
/// exactly as it was inserted. The order never affects the fingerprint.
#[derive(Clone, Debug)]
pub enum Key {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Key>),
    Object(IndexMap<String, Key>),
    Instant(DateTime<Utc>),
    Custom(CustomKey),
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Null, Key::Null) => true,
            (Key::Bool(a), Key::Bool(b)) => a == b,
            (Key::Number(a), Key::Number(b)) => a == b || number_text(a) == number_text(b),
            (Key::String(a), Key::String(b)) => a == b,
            (Key::Array(a), Key::Array(b)) => a == b,
            (Key::Object(a), Key::Object(b)) => a == b,
            (Key::Instant(a), Key::Instant(b)) => format_instant(a) == format_instant(b),
            (Key::Custom(a), Key::Custom(b)) => a == b,
            _ => false,
        }
    }
}

impl Key {
    /// Build an object key from `(field, value)` pairs.
    pub fn object<I, F, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (F, K)>,
        F: Into<String>,
        K: Into<Key>,
    {
        Key::Object(
            fields
                .into_iter()
                .map(|(f, k)| (f.into(), k.into()))
                .collect(),
        )
    }

    /// Build an array key.
    pub fn array<I, K>(items: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Key::Array(items.into_iter().map(Into::into).collect())
    }

    /// Wrap an arbitrary value as an extension key.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Key::Custom(CustomKey::new(value))
    }

    /// Convert any `Serialize` type into a key through its JSON data model.
    ///
    /// Struct fields become object fields, sequences become arrays. Types
    /// whose `Serialize` impl fails (for example maps with non-string keys)
    /// are rejected.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, SerializationError> {
        Ok(Key::from(serde_json::to_value(value)?))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Key::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instant(&self) -> Option<&DateTime<Utc>> {
        match self {
            Key::Instant(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Key>> {
        match self {
            Key::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Key]> {
        match self {
            Key::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomKey> {
        match self {
            Key::Custom(c) => Some(c),
            _ => None,
        }
    }
}

// =============================================================================
// Custom (extension) values
// =============================================================================

/// An opaque extension value.
///
/// Carries the concrete Rust type name for diagnostics. A custom key can only
/// be fingerprinted if some registered codec accepts it.
#[derive(Clone)]
pub struct CustomKey {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl CustomKey {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }
}

impl PartialEq for CustomKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for CustomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomKey")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Binary blob, fingerprinted by the built-in [`BlobCodec`](crate::codec::BlobCodec).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

impl From<Blob> for Key {
    fn from(blob: Blob) -> Self {
        Key::custom(blob)
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Key::Null,
            Value::Bool(b) => Key::Bool(b),
            Value::Number(n) => Key::Number(n),
            Value::String(s) => Key::String(s),
            Value::Array(items) => Key::Array(items.into_iter().map(Key::from).collect()),
            Value::Object(map) => Key::Object(map.into_iter().map(|(k, v)| (k, Key::from(v))).collect()),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl From<()> for Key {
    fn from(_: ()) -> Self {
        Key::Null
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(n: $t) -> Self {
                    Key::Number(Number::from(n))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl TryFrom<f64> for Key {
    type Error = SerializationError;

    fn try_from(n: f64) -> Result<Self, Self::Error> {
        Number::from_f64(n)
            .map(Key::Number)
            .ok_or(SerializationError::NonFiniteNumber(n))
    }
}

impl From<DateTime<Utc>> for Key {
    fn from(t: DateTime<Utc>) -> Self {
        Key::Instant(t)
    }
}

impl<T: Into<Key>> From<Option<T>> for Key {
    fn from(v: Option<T>) -> Self {
        v.map_or(Key::Null, Into::into)
    }
}

impl<T: Into<Key>> From<Vec<T>> for Key {
    fn from(items: Vec<T>) -> Self {
        Key::array(items)
    }
}

impl From<IndexMap<String, Key>> for Key {
    fn from(fields: IndexMap<String, Key>) -> Self {
        Key::Object(fields)
    }
}

impl From<CustomKey> for Key {
    fn from(c: CustomKey) -> Self {
        Key::Custom(c)
    }
}
