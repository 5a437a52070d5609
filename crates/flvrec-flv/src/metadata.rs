//! Stream metadata carried by the first script data tag.

use crate::{Error, Result};
use bytes::Bytes;
use scuffle_amf0::{Amf0Decoder, Amf0Encoder, Amf0Value};
use std::borrow::Cow;

/// Conventional name of the metadata record.
pub const ON_METADATA: &str = "onMetaData";

/// Key holding the stream duration in seconds.
pub const KEY_DURATION: &str = "duration";

/// Key holding the largest tag timestamp in milliseconds.
pub const KEY_LAST_TIMESTAMP: &str = "last_timestamp";

type Properties = Vec<(Cow<'static, str>, Amf0Value<'static>)>;

/// Ordered key/value map decoded from an `onMetaData` payload.
///
/// Re-encoding always produces an AMF0 object, so the output is
/// deterministic for a given map but may differ in length from the bytes it
/// was parsed from (an ECMA array input loses its 4-byte count).
#[derive(Debug, Clone, PartialEq)]
pub struct FlvMetadata {
    name: String,
    entries: Properties,
}

impl Default for FlvMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl FlvMetadata {
    /// Empty `onMetaData` record.
    pub fn new() -> Self {
        Self {
            name: ON_METADATA.to_string(),
            entries: Vec::new(),
        }
    }

    /// Decode a script data payload.
    ///
    /// The payload is a name string followed by an object or ECMA array.
    /// Anything after that value is ignored. Every decode failure, including
    /// a truncated payload, is reported as [`Error::InvalidScriptData`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut decoder = Amf0Decoder::new(data);

        let name = match decoder.decode().map_err(|e| undecodable("name", e))? {
            Amf0Value::String(s) => s.into_owned(),
            other => {
                return Err(Error::invalid_script_data(format!(
                    "script data name is not a string: {:?}",
                    other
                )))
            }
        };

        let entries = if decoder.is_empty() {
            Vec::new()
        } else {
            match decoder.decode().map_err(|e| undecodable(&name, e))? {
                Amf0Value::Object(props) => props
                    .iter()
                    .map(|(k, v)| (Cow::Owned(k.to_string()), v.to_owned()))
                    .collect(),
                other => {
                    return Err(Error::invalid_script_data(format!(
                        "{} body is not an object: {:?}",
                        name, other
                    )))
                }
            }
        };

        if !decoder.is_empty() {
            tracing::trace!("Ignoring trailing bytes after {}", name);
        }

        Ok(Self { name, entries })
    }

    /// Encode as a script data payload.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(64 + self.entries.len() * 32);
        Amf0Encoder::encode(&mut buf, &Amf0Value::String(Cow::Borrowed(self.name.as_str())))
            .map_err(|e| Error::invalid_script_data(format!("cannot encode name: {}", e)))?;
        Amf0Encoder::encode(&mut buf, &Amf0Value::Object(Cow::Owned(self.entries.clone())))
            .map_err(|e| {
                Error::invalid_script_data(format!("cannot encode {}: {}", self.name, e))
            })?;
        Ok(Bytes::from(buf))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Amf0Value<'static>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Amf0Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Set a key, keeping its position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: Amf0Value<'static>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((Cow::Owned(key), value)),
        }
    }

    pub fn set_number(&mut self, key: impl Into<String>, value: f64) {
        self.set(key, Amf0Value::Number(value));
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, Amf0Value::String(Cow::Owned(value.into())));
    }

    pub fn remove(&mut self, key: &str) -> Option<Amf0Value<'static>> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Amf0Value<'static>)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Duration in seconds, if present.
    pub fn duration(&self) -> Option<f64> {
        self.get_number(KEY_DURATION)
    }

    /// Largest timestamp in milliseconds, if present.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.get_number(KEY_LAST_TIMESTAMP)
    }

    /// Write `duration` and `last_timestamp` for a stream whose newest tag
    /// is at `max_timestamp` milliseconds.
    ///
    /// Both are AMF0 numbers, which are fixed width: once the keys exist as
    /// numbers, calling this again never changes the encoded length.
    pub fn set_stream_times(&mut self, max_timestamp: u32) {
        self.set_number(KEY_DURATION, max_timestamp as f64 / 1000.0);
        self.set_number(KEY_LAST_TIMESTAMP, max_timestamp as f64);
    }
}

fn undecodable(what: &str, e: impl std::fmt::Display) -> Error {
    Error::invalid_script_data(format!("cannot decode {}: {}", what, e))
}

#[cfg(feature = "serialize")]
mod serialize {
    use super::FlvMetadata;
    use scuffle_amf0::Amf0Value;
    use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};
    use std::borrow::Cow;

    struct Entries<'a>(&'a [(Cow<'static, str>, Amf0Value<'static>)]);

    struct Value<'a>(&'a Amf0Value<'static>);

    impl Serialize for FlvMetadata {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut state = serializer.serialize_struct("FlvMetadata", 2)?;
            state.serialize_field("name", &self.name)?;
            state.serialize_field("entries", &Entries(&self.entries))?;
            state.end()
        }
    }

    impl Serialize for Entries<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for (key, value) in self.0 {
                map.serialize_entry(&**key, &Value(value))?;
            }
            map.end()
        }
    }

    impl Serialize for Value<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self.0 {
                Amf0Value::Number(n) => serializer.serialize_f64(*n),
                Amf0Value::Boolean(b) => serializer.serialize_bool(*b),
                Amf0Value::String(s) => serializer.serialize_str(s.as_ref()),
                Amf0Value::Object(props) => Entries(props).serialize(serializer),
                _ => serializer.serialize_unit(),
            }
        }
    }
}
