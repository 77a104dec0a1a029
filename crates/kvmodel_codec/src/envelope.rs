//! Typed argument envelopes for the save and remove procedures.
//!
//! Each envelope occupies one positional argument slot and is packed as a
//! single CBOR item:
//!
//! | Envelope | CBOR shape |
//! |---|---|
//! | [`Metadata`] | map `{ "name", "id", "key"? }` of text |
//! | [`AttributePairs`] | flat array `[k1, v1, k2, v2, ...]` |
//! | [`IndexPairs`] | array of `[field, value]` arrays |
//! | [`UniqueMap`] | map field → value |
//! | [`TrackedKeys`] | array of text |

use crate::decoder::from_cbor;
use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::{Decode, Encode};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Identity of the entity a procedure call operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Entity type name.
    pub name: String,
    /// Entity id.
    pub id: String,
    /// Primary record key, when the caller already derived it.
    pub key: Option<String>,
}

impl Metadata {
    /// Metadata without a precomputed key.
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            key: None,
        }
    }

    /// Attach the primary record key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Attribute name/value pairs in the order they will be written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePairs(pub Vec<(String, String)>);

/// Indexed attribute name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPairs(pub Vec<(String, String)>);

/// Unique attribute name → value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueMap(pub BTreeMap<String, String>);

/// Key suffixes owned by an entity that are deleted along with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedKeys(pub Vec<String>);

fn expect_text(value: &Value, what: &str) -> CodecResult<String> {
    value.as_text().map(str::to_string).ok_or_else(|| {
        CodecError::invalid_structure(format!("{what}: expected text, found {}", value.kind()))
    })
}

fn expect_array<'v>(value: &'v Value, what: &str) -> CodecResult<&'v [Value]> {
    value.as_array().ok_or_else(|| {
        CodecError::invalid_structure(format!("{what}: expected array, found {}", value.kind()))
    })
}

fn expect_map<'v>(value: &'v Value, what: &str) -> CodecResult<&'v [(Value, Value)]> {
    value.as_map().ok_or_else(|| {
        CodecError::invalid_structure(format!("{what}: expected map, found {}", value.kind()))
    })
}

impl Encode for Metadata {
    fn encode(&self) -> CodecResult<Bytes> {
        let mut pairs = vec![("name", self.name.as_str()), ("id", self.id.as_str())];
        if let Some(key) = &self.key {
            pairs.push(("key", key.as_str()));
        }
        to_canonical_cbor(&Value::text_map(pairs))
    }
}

impl Decode for Metadata {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        expect_map(&value, "metadata")?;
        let field = |name: &str| {
            value
                .get(name)
                .ok_or_else(|| CodecError::invalid_structure(format!("metadata: missing {name}")))
                .and_then(|v| expect_text(v, name))
        };
        let key = match value.get("key") {
            Some(v) => Some(expect_text(v, "key")?),
            None => None,
        };
        Ok(Self {
            name: field("name")?,
            id: field("id")?,
            key,
        })
    }
}

impl Encode for AttributePairs {
    fn encode(&self) -> CodecResult<Bytes> {
        let flat = self
            .0
            .iter()
            .flat_map(|(k, v)| [k.as_str(), v.as_str()]);
        to_canonical_cbor(&Value::text_array(flat))
    }
}

impl Decode for AttributePairs {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        let items = expect_array(&value, "attributes")?;
        if items.len() % 2 != 0 {
            return Err(CodecError::invalid_structure(
                "attributes: odd number of items",
            ));
        }
        items
            .chunks_exact(2)
            .map(|pair| {
                Ok((
                    expect_text(&pair[0], "attribute name")?,
                    expect_text(&pair[1], "attribute value")?,
                ))
            })
            .collect::<CodecResult<Vec<_>>>()
            .map(Self)
    }
}

impl Encode for IndexPairs {
    fn encode(&self) -> CodecResult<Bytes> {
        let items = self
            .0
            .iter()
            .map(|(field, value)| Value::text_array([field.as_str(), value.as_str()]))
            .collect();
        to_canonical_cbor(&Value::Array(items))
    }
}

impl Decode for IndexPairs {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        expect_array(&value, "indices")?
            .iter()
            .map(|item| match expect_array(item, "index pair")? {
                [field, value] => Ok((
                    expect_text(field, "index field")?,
                    expect_text(value, "index value")?,
                )),
                other => Err(CodecError::invalid_structure(format!(
                    "index pair: expected 2 items, found {}",
                    other.len()
                ))),
            })
            .collect::<CodecResult<Vec<_>>>()
            .map(Self)
    }
}

impl Encode for UniqueMap {
    fn encode(&self) -> CodecResult<Bytes> {
        to_canonical_cbor(&Value::text_map(
            self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }
}

impl Decode for UniqueMap {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        expect_map(&value, "uniques")?
            .iter()
            .map(|(k, v)| Ok((expect_text(k, "unique field")?, expect_text(v, "unique value")?)))
            .collect::<CodecResult<BTreeMap<_, _>>>()
            .map(Self)
    }
}

impl Encode for TrackedKeys {
    fn encode(&self) -> CodecResult<Bytes> {
        to_canonical_cbor(&Value::text_array(self.0.iter().map(String::as_str)))
    }
}

impl Decode for TrackedKeys {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        expect_array(&value, "tracked keys")?
            .iter()
            .map(|v| expect_text(v, "tracked key"))
            .collect::<CodecResult<Vec<_>>>()
            .map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_roundtrip_with_and_without_key() {
        let plain = Metadata::new("user", "1");
        assert_eq!(Metadata::decode(&plain.encode().unwrap()).unwrap(), plain);

        let keyed = Metadata::new("user", "1").with_key("user:1");
        let decoded = Metadata::decode(&keyed.encode().unwrap()).unwrap();
        assert_eq!(decoded.key.as_deref(), Some("user:1"));
    }

    #[test]
    fn metadata_missing_id_rejected() {
        let bytes = to_canonical_cbor(&Value::text_map([("name", "user")])).unwrap();
        assert!(matches!(
            Metadata::decode(&bytes),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn attribute_pairs_are_flat() {
        let pairs = AttributePairs(vec![
            ("email".into(), "a@x.com".into()),
            ("name".into(), "Ann".into()),
        ]);
        let bytes = pairs.encode().unwrap();
        let value = from_cbor(&bytes).unwrap();
        assert_eq!(value, Value::text_array(["email", "a@x.com", "name", "Ann"]));
        assert_eq!(AttributePairs::decode(&bytes).unwrap(), pairs);
    }

    #[test]
    fn attribute_pairs_odd_length_rejected() {
        let bytes = to_canonical_cbor(&Value::text_array(["email"])).unwrap();
        assert!(AttributePairs::decode(&bytes).is_err());
    }

    #[test]
    fn index_pairs_nested_arrays() {
        let pairs = IndexPairs(vec![("city".into(), "Oslo".into())]);
        let value = from_cbor(&pairs.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::text_array(["city", "Oslo"])])
        );
    }

    #[test]
    fn index_pair_with_three_items_rejected() {
        let bytes =
            to_canonical_cbor(&Value::Array(vec![Value::text_array(["a", "b", "c"])])).unwrap();
        assert!(IndexPairs::decode(&bytes).is_err());
    }

    #[test]
    fn unique_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("email".to_string(), "a@x.com".to_string());
        map.insert("handle".to_string(), "ann".to_string());
        let uniques = UniqueMap(map);
        assert_eq!(UniqueMap::decode(&uniques.encode().unwrap()).unwrap(), uniques);
    }

    #[test]
    fn empty_tracked_keys_is_empty_array() {
        let bytes = TrackedKeys::default().encode().unwrap();
        assert_eq!(&bytes[..], &[0x80]);
        assert!(TrackedKeys::decode(&bytes).unwrap().0.is_empty());
    }

    #[test]
    fn wrong_envelope_shape_rejected() {
        let bytes = TrackedKeys(vec!["posts".into()]).encode().unwrap();
        assert!(UniqueMap::decode(&bytes).is_err());
        assert!(Metadata::decode(&bytes).is_err());
    }
}
