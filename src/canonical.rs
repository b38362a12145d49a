//! Key canonicalization.
//!
//! A fingerprint is compact JSON text with a few fixed rules:
//!
//! - object fields are sorted byte-wise by name, so field order never matters;
//! - integral numbers print as integers (`1.0` and `1` are the same key);
//! - instants print as `{"$date":"YYYY-MM-DDTHH:MM:SS.mmmZ"}`, UTC, millisecond
//!   precision;
//! - extension values print as `{"$<tag>":"<codec text>"}`;
//! - a user field whose name starts with `$` gets one extra leading `$`, so a
//!   user object never collides with a type wrapper.
//!
//! Because wrappers are unambiguous, [`Canonicalizer::revive`] can rebuild a
//! key from its fingerprint without guessing at what a string means.

use std::borrow::{Borrow, Cow};
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Number, Value};
use smallvec::SmallVec;

use crate::codec::{BlobCodec, CodecRegistry, KeyCodec, INSTANT_TAG};
use crate::error::{RegisterError, ReviveError, SerializationError};
use crate::key::Key;
use crate::Config;

/// Largest magnitude below which every integer is exactly representable as f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

const INSTANT_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Canonical text of a key. The physical index of a [`ValueMap`](crate::ValueMap).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Fingerprint {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Fingerprints keys and revives fingerprints back into keys.
///
/// Immutable once built; share it through an `Arc`.
#[derive(Clone, Debug)]
pub struct Canonicalizer {
    codecs: CodecRegistry,
    max_depth: usize,
}

impl Canonicalizer {
    /// Default configuration with the built-in [`BlobCodec`].
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let mut codecs = CodecRegistry::new();
        let builtin: Arc<dyn KeyCodec> = Arc::new(BlobCodec);
        codecs
            .register(builtin)
            .expect("built-in codec tag must register on an empty registry");
        Self {
            codecs,
            max_depth: config.max_depth,
        }
    }

    /// No codecs at all: every [`Key::Custom`] is rejected.
    pub fn empty() -> Self {
        Self {
            codecs: CodecRegistry::new(),
            max_depth: Config::default().max_depth,
        }
    }

    pub fn register<C: KeyCodec + 'static>(&mut self, codec: C) -> Result<&mut Self, RegisterError> {
        self.codecs.register(Arc::new(codec))?;
        Ok(self)
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn canonicalize(&self, key: &Key) -> Result<Fingerprint, SerializationError> {
        let mut out = String::new();
        self.write_key(key, 0, &mut out)?;
        Ok(Fingerprint(out))
    }

    /// `depth` counts the arrays and objects enclosing `key`.
    fn write_key(&self, key: &Key, depth: usize, out: &mut String) -> Result<(), SerializationError> {
        if matches!(key, Key::Array(_) | Key::Object(_)) && depth >= self.max_depth {
            return Err(SerializationError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        match key {
            Key::Null => out.push_str("null"),
            Key::Bool(true) => out.push_str("true"),
            Key::Bool(false) => out.push_str("false"),
            Key::Number(n) => out.push_str(&number_text(n)),
            Key::String(s) => write_str(s, out)?,
            Key::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_key(item, depth + 1, out)?;
                }
                out.push(']');
            }
            Key::Object(fields) => {
                let mut sorted: SmallVec<[(&str, &Key); 8]> =
                    fields.iter().map(|(name, value)| (name.as_str(), value)).collect();
                // Names are unique, so an unstable sort is still a total order.
                sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));

                out.push('{');
                for (i, (name, value)) in sorted.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_str(&escape_field(name), out)?;
                    out.push(':');
                    self.write_key(value, depth + 1, out)?;
                }
                out.push('}');
            }
            Key::Instant(t) => write_wrapper(INSTANT_TAG, &format_instant(t), out)?,
            Key::Custom(value) => {
                let codec = self
                    .codecs
                    .for_value(value)
                    .ok_or(SerializationError::Unsupported {
                        type_name: value.type_name(),
                    })?;
                let text = codec.encode(value).map_err(|source| SerializationError::Codec {
                    tag: codec.tag().to_owned(),
                    source,
                })?;
                write_wrapper(codec.tag(), &text, out)?;
            }
        }
        Ok(())
    }

    /// Rebuild a key from a fingerprint.
    ///
    /// Type wrappers are recognised by their tag, never by the shape of a
    /// string: `"2024-01-01T00:00:00.000Z"` revives as a string.
    pub fn revive(&self, fingerprint: &str) -> Result<Key, ReviveError> {
        // Type wrappers add one object level below the deepest key container.
        if nesting_depth(fingerprint) > self.max_depth + 1 {
            return Err(ReviveError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        let mut de = serde_json::Deserializer::from_str(fingerprint);
        de.disable_recursion_limit();
        let value = Value::deserialize(&mut de)?;
        de.end()?;
        self.revive_value(value)
    }

    fn revive_value(&self, value: Value) -> Result<Key, ReviveError> {
        Ok(match value {
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                if entries.len() == 1 {
                    if let Some((name, payload)) = entries.pop() {
                        if let Some(tag) = wrapper_tag(&name) {
                            return self.revive_wrapper(tag, payload);
                        }
                        entries.push((name, payload));
                    }
                }

                let mut fields = IndexMap::with_capacity(entries.len());
                for (name, value) in entries {
                    fields.insert(unescape_field(name), self.revive_value(value)?);
                }
                Key::Object(fields)
            }
            Value::Array(items) => Key::Array(
                items
                    .into_iter()
                    .map(|item| self.revive_value(item))
                    .collect::<Result<_, _>>()?,
            ),
            scalar => Key::from(scalar),
        })
    }

    fn revive_wrapper(&self, tag: &str, payload: Value) -> Result<Key, ReviveError> {
        let Value::String(text) = payload else {
            return Err(ReviveError::MalformedWrapper(tag.to_owned()));
        };

        if tag == INSTANT_TAG {
            return parse_instant(&text).map(Key::Instant);
        }

        let codec = self
            .codecs
            .by_tag(tag)
            .ok_or_else(|| ReviveError::UnknownTag(tag.to_owned()))?;
        codec
            .decode(&text)
            .map(Key::Custom)
            .map_err(|source| ReviveError::Codec {
                tag: tag.to_owned(),
                text,
                source,
            })
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint `key` with the default canonicalizer.
pub fn canonicalize(key: &Key) -> Result<Fingerprint, SerializationError> {
    static DEFAULT: OnceLock<Canonicalizer> = OnceLock::new();
    DEFAULT.get_or_init(Canonicalizer::new).canonicalize(key)
}

// =============================================================================
// Text helpers
// =============================================================================

/// Canonical text of a number. Integral floats within 2^53 print as integers.
pub(crate) fn number_text(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        // Also folds -0.0 into 0.
        Some(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

fn write_str(s: &str, out: &mut String) -> Result<(), SerializationError> {
    out.push_str(&serde_json::to_string(s)?);
    Ok(())
}

fn write_wrapper(tag: &str, text: &str, out: &mut String) -> Result<(), SerializationError> {
    out.push_str("{\"$");
    out.push_str(tag);
    out.push_str("\":");
    write_str(text, out)?;
    out.push('}');
    Ok(())
}

/// Deepest bracket nesting in JSON text, ignoring brackets inside strings.
fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for b in text.bytes() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn escape_field(name: &str) -> Cow<'_, str> {
    if name.starts_with('$') {
        Cow::Owned(format!("${name}"))
    } else {
        Cow::Borrowed(name)
    }
}

fn unescape_field(name: String) -> String {
    match name.strip_prefix('$') {
        Some(rest) if rest.starts_with('$') => rest.to_owned(),
        _ => name,
    }
}

/// Tag of a wrapper field name: a single leading `$`.
fn wrapper_tag(name: &str) -> Option<&str> {
    name.strip_prefix('$').filter(|rest| !rest.starts_with('$'))
}

/// Fixed-width ISO-8601 UTC with milliseconds. Years outside 0..=9999 use the
/// signed six-digit extended form.
pub(crate) fn format_instant(t: &DateTime<Utc>) -> String {
    let year = t.year();
    let year = if (0..=9999).contains(&year) {
        format!("{year:04}")
    } else if year < 0 {
        format!("-{:06}", -year)
    } else {
        format!("+{year:06}")
    };
    format!(
        "{year}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        // Leap seconds report >= 1000 ms.
        t.timestamp_subsec_millis().min(999),
    )
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>, ReviveError> {
    NaiveDateTime::parse_from_str(text, INSTANT_PARSE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|source| ReviveError::InvalidInstant {
            text: text.to_owned(),
            source,
        })
}
