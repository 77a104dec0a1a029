//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use bytes::{BufMut, Bytes, BytesMut};

/// Encode a value to canonical CBOR.
///
/// Output is deterministic: integers and lengths use the shortest form and map
/// entries are ordered by their encoded key (length first, then bytewise), so
/// two maps with the same content always produce the same bytes.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if a map contains the same key twice.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Bytes> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Streaming canonical CBOR encoder.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: BytesMut,
}

impl CanonicalEncoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.put_u8(0xf6),
            Value::Integer(n) => self.write_integer(*n),
            Value::Bytes(b) => {
                self.write_head(2, b.len() as u64);
                self.buffer.put_slice(b);
            }
            Value::Text(s) => {
                self.write_head(3, s.len() as u64);
                self.buffer.put_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.write_head(4, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Map(pairs) => self.write_map(pairs)?,
        }
        Ok(())
    }

    /// Freeze the buffer.
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_head(0, n as u64);
        } else {
            // major type 1 carries -1 - n
            self.write_head(1, (-(n + 1)) as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_head(&mut self, major: u8, arg: u64) {
        let mt = major << 5;
        if arg < 24 {
            self.buffer.put_u8(mt | arg as u8);
        } else if arg <= u64::from(u8::MAX) {
            self.buffer.put_u8(mt | 24);
            self.buffer.put_u8(arg as u8);
        } else if arg <= u64::from(u16::MAX) {
            self.buffer.put_u8(mt | 25);
            self.buffer.put_u16(arg as u16);
        } else if arg <= u64::from(u32::MAX) {
            self.buffer.put_u8(mt | 26);
            self.buffer.put_u32(arg as u32);
        } else {
            self.buffer.put_u8(mt | 27);
            self.buffer.put_u64(arg);
        }
    }

    fn write_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let mut key_encoder = CanonicalEncoder::new();
            key_encoder.encode(key)?;
            entries.push((key_encoder.into_bytes(), value));
        }
        entries.sort_by(|a, b| compare_encoded_keys(&a.0, &b.0));

        if entries.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(CodecError::encoding_failed("duplicate map key"));
        }

        self.write_head(5, entries.len() as u64);
        for (key, value) in entries {
            self.buffer.put_slice(&key);
            self.encode(value)?;
        }
        Ok(())
    }
}

/// Canonical key order: shorter encodings first, then bytewise.
pub(crate) fn compare_encoded_keys(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(value: &Value) -> Vec<u8> {
        to_canonical_cbor(value).unwrap().to_vec()
    }

    #[test]
    fn encode_integers_shortest_form() {
        assert_eq!(enc(&Value::Integer(0)), vec![0x00]);
        assert_eq!(enc(&Value::Integer(23)), vec![0x17]);
        assert_eq!(enc(&Value::Integer(24)), vec![0x18, 24]);
        assert_eq!(enc(&Value::Integer(256)), vec![0x19, 0x01, 0x00]);
        assert_eq!(enc(&Value::Integer(65536)), vec![0x1a, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(enc(&Value::Integer(-1)), vec![0x20]);
        assert_eq!(enc(&Value::Integer(-100)), vec![0x38, 99]);
    }

    #[test]
    fn encode_text_and_null() {
        assert_eq!(enc(&Value::text("")), vec![0x60]);
        assert_eq!(enc(&Value::text("id")), vec![0x62, b'i', b'd']);
        assert_eq!(enc(&Value::Null), vec![0xf6]);
    }

    #[test]
    fn encode_empty_array() {
        assert_eq!(enc(&Value::Array(vec![])), vec![0x80]);
    }

    #[test]
    fn map_entries_are_sorted_by_encoded_key() {
        let map = Value::text_map([("name", "u"), ("id", "1")]);
        // "id" (3 bytes encoded) sorts before "name" (5 bytes encoded)
        assert_eq!(
            enc(&map),
            vec![0xa2, 0x62, b'i', b'd', 0x61, b'1', 0x64, b'n', b'a', b'm', b'e', 0x61, b'u']
        );
    }

    #[test]
    fn map_order_does_not_change_bytes() {
        let a = Value::text_map([("z", "1"), ("a", "2"), ("mm", "3")]);
        let b = Value::text_map([("mm", "3"), ("a", "2"), ("z", "1")]);
        assert_eq!(enc(&a), enc(&b));
    }

    #[test]
    fn duplicate_map_keys_rejected() {
        let map = Value::text_map([("email", "a"), ("email", "b")]);
        assert!(matches!(
            to_canonical_cbor(&map),
            Err(CodecError::EncodingFailed { .. })
        ));
    }
}
