//! Pluggable encoders for extension key types.
//!
//! A codec turns a [`CustomKey`] into text that becomes part of the
//! fingerprint, and back. Each codec owns a tag; the fingerprint wraps the
//! codec text as `{"$<tag>":"<text>"}`.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{CodecError, RegisterError};
use crate::key::{Blob, CustomKey};

/// Tag used by the instant wrapper. Codecs may not claim it.
pub(crate) const INSTANT_TAG: &str = "date";

/// Encode/decode capability for one extension key type.
///
/// `encode` must be deterministic: equal values must produce equal text, and
/// distinct values distinct text.
pub trait KeyCodec: Send + Sync {
    /// Short identifier written into fingerprints.
    fn tag(&self) -> &str;

    fn can_encode(&self, value: &CustomKey) -> bool;

    fn encode(&self, value: &CustomKey) -> Result<String, CodecError>;

    fn decode(&self, text: &str) -> Result<CustomKey, CodecError>;
}

/// Encodes [`Blob`] values as standard base64.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlobCodec;

impl KeyCodec for BlobCodec {
    fn tag(&self) -> &str {
        "blob"
    }

    fn can_encode(&self, value: &CustomKey) -> bool {
        value.is::<Blob>()
    }

    fn encode(&self, value: &CustomKey) -> Result<String, CodecError> {
        let blob = value
            .downcast_ref::<Blob>()
            .ok_or_else(|| CodecError::new(format!("expected Blob, got {}", value.type_name())))?;
        Ok(STANDARD.encode(&blob.0))
    }

    fn decode(&self, text: &str) -> Result<CustomKey, CodecError> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| CodecError::new(e.to_string()))?;
        Ok(CustomKey::new(Blob(bytes)))
    }
}

/// Ordered list of codecs. Encoding tries them in registration order.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn KeyCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: Arc<dyn KeyCodec>) -> Result<(), RegisterError> {
        let tag = codec.tag();
        if tag == INSTANT_TAG {
            return Err(RegisterError::Reserved(tag.to_owned()));
        }
        // Tags are written into fingerprints unescaped.
        if tag.is_empty() || !tag.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            return Err(RegisterError::InvalidTag(tag.to_owned()));
        }
        if self.by_tag(tag).is_some() {
            return Err(RegisterError::Duplicate(tag.to_owned()));
        }
        log::debug!("registered key codec `{tag}`");
        self.codecs.push(codec);
        Ok(())
    }

    /// First codec willing to encode `value`.
    pub fn for_value(&self, value: &CustomKey) -> Option<&dyn KeyCodec> {
        self.codecs
            .iter()
            .find(|c| c.can_encode(value))
            .map(|c| c.as_ref())
    }

    pub fn by_tag(&self, tag: &str) -> Option<&dyn KeyCodec> {
        self.codecs
            .iter()
            .find(|c| c.tag() == tag)
            .map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.codecs.iter().map(|c| c.tag()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl KeyCodec for Named {
        fn tag(&self) -> &str {
            self.0
        }

        fn can_encode(&self, _: &CustomKey) -> bool {
            false
        }

        fn encode(&self, _: &CustomKey) -> Result<String, CodecError> {
            Err(CodecError::new("unused"))
        }

        fn decode(&self, _: &str) -> Result<CustomKey, CodecError> {
            Err(CodecError::new("unused"))
        }
    }

    #[test]
    fn test_blob_codec() {
        let codec = BlobCodec;
        let key = CustomKey::new(Blob(b"hello".to_vec()));
        assert!(codec.can_encode(&key));
        assert!(!codec.can_encode(&CustomKey::new(7u8)));

        let text = codec.encode(&key).unwrap();
        assert_eq!(text, "aGVsbG8=");
        let back = codec.decode(&text).unwrap();
        assert_eq!(back.downcast_ref::<Blob>(), Some(&Blob(b"hello".to_vec())));
    }

    #[test]
    fn test_blob_codec_rejects_bad_base64() {
        assert!(BlobCodec.decode("not base64!").is_err());
    }

    #[test]
    fn test_register_rejects_bad_tags() {
        let mut r = CodecRegistry::new();
        assert_eq!(
            r.register(Arc::new(Named("date"))),
            Err(RegisterError::Reserved("date".into()))
        );
        assert_eq!(
            r.register(Arc::new(Named(""))),
            Err(RegisterError::InvalidTag("".into()))
        );
        assert_eq!(
            r.register(Arc::new(Named("$x"))),
            Err(RegisterError::InvalidTag("$x".into()))
        );
        for tag in [r#"a":"x"},1,{"$b"#, "a\"b", "a\\b", "a,b", "a b", "é"] {
            assert_eq!(
                r.register(Arc::new(Named(tag))),
                Err(RegisterError::InvalidTag(tag.into()))
            );
        }
        assert!(r.is_empty());
        assert!(r.register(Arc::new(Named("x"))).is_ok());
        assert!(r.register(Arc::new(Named("Big_tag-2"))).is_ok());
        assert_eq!(
            r.register(Arc::new(Named("x"))),
            Err(RegisterError::Duplicate("x".into()))
        );
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_lookup_order() {
        let mut r = CodecRegistry::new();
        r.register(Arc::new(Named("never"))).unwrap();
        r.register(Arc::new(BlobCodec)).unwrap();

        let blob = CustomKey::new(Blob(vec![1, 2]));
        assert_eq!(r.for_value(&blob).map(|c| c.tag()), Some("blob"));
        assert!(r.for_value(&CustomKey::new("str")).is_none());
        assert!(r.by_tag("never").is_some());
        assert!(r.by_tag("missing").is_none());
    }
}
