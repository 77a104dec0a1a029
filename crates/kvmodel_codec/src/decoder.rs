//! CBOR decoder for procedure arguments.

use crate::encoder::compare_encoded_keys;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::cmp::Ordering;

/// Maximum element count accepted for arrays and maps.
const MAX_CONTAINER_ELEMENTS: u64 = 1024 * 1024;

/// Maximum byte length accepted for text and byte strings.
const MAX_BYTES_LENGTH: u64 = 64 * 1024 * 1024;

/// Maximum nesting of arrays and maps. Envelopes nest two levels deep.
const MAX_DEPTH: usize = 16;

/// Decode exactly one value from `bytes`.
///
/// # Errors
///
/// Fails on truncated input, trailing bytes, non-canonical map ordering,
/// indefinite lengths and item kinds outside [`Value`].
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// Cursor over a CBOR byte string.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a decoder positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial = self.read_byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;

        match major {
            0 => {
                let n = self.read_arg(info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::invalid_structure("integer out of range"))
            }
            1 => {
                let n = self.read_arg(info)?;
                i64::try_from(n)
                    .map(|n| Value::Integer(-1 - n))
                    .map_err(|_| CodecError::invalid_structure("integer out of range"))
            }
            2 => Ok(Value::Bytes(self.read_string(info)?.to_vec())),
            3 => {
                let raw = self.read_string(info)?;
                let text = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_string()))
            }
            4 => {
                let len = self.read_len(info, MAX_CONTAINER_ELEMENTS)?;
                let mut items = Vec::with_capacity(len.min(64));
                self.descend()?;
                for _ in 0..len {
                    items.push(self.decode()?);
                }
                self.depth -= 1;
                Ok(Value::Array(items))
            }
            5 => self.decode_map(info),
            6 => Err(CodecError::unsupported_type("tag")),
            _ => match info {
                22 => Ok(Value::Null),
                20 | 21 => Err(CodecError::unsupported_type("boolean")),
                25..=27 => Err(CodecError::unsupported_type("float")),
                31 => Err(CodecError::IndefiniteLengthForbidden),
                other => Err(CodecError::unsupported_type(format!("simple value {other}"))),
            },
        }
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn decode_map(&mut self, info: u8) -> CodecResult<Value> {
        let len = self.read_len(info, MAX_CONTAINER_ELEMENTS)?;
        let mut pairs = Vec::with_capacity(len.min(64));
        let mut prev_key: Option<&'a [u8]> = None;
        self.descend()?;

        for _ in 0..len {
            let start = self.pos;
            let key = self.decode()?;
            let data = self.data;
            let raw_key = &data[start..self.pos];

            if let Some(prev) = prev_key {
                if compare_encoded_keys(prev, raw_key) != Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "map keys not in canonical order",
                    ));
                }
            }
            prev_key = Some(raw_key);

            let value = self.decode()?;
            pairs.push((key, value));
        }
        self.depth -= 1;
        Ok(Value::Map(pairs))
    }

    fn descend(&mut self) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::invalid_structure("nesting too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_arg(&mut self, info: u8) -> CodecResult<u64> {
        match info {
            0..=23 => Ok(u64::from(info)),
            24 => Ok(u64::from(self.read_byte()?)),
            25 => {
                let b = self.read_slice(2)?;
                Ok(u64::from(u16::from_be_bytes([b[0], b[1]])))
            }
            26 => {
                let b = self.read_slice(4)?;
                Ok(u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
            }
            27 => {
                let b = self.read_slice(8)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(b);
                Ok(u64::from_be_bytes(arr))
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn read_len(&mut self, info: u8, max: u64) -> CodecResult<usize> {
        let claimed = self.read_arg(info)?;
        if claimed > max {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed: max,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::SizeLimitExceeded {
            claimed,
            max_allowed: max,
        })
    }

    fn read_string(&mut self, info: u8) -> CodecResult<&'a [u8]> {
        let len = self.read_len(info, MAX_BYTES_LENGTH)?;
        self.read_slice(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_scalars() {
        assert_eq!(from_cbor(&[0x17]).unwrap(), Value::Integer(23));
        assert_eq!(from_cbor(&[0x19, 0x01, 0x00]).unwrap(), Value::Integer(256));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0x61, b'a']).unwrap(), Value::text("a"));
        assert_eq!(from_cbor(&[0x43, 1, 2, 3]).unwrap(), Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn decode_map() {
        assert_eq!(
            from_cbor(&[0xa1, 0x61, b'a', 0x61, b'b']).unwrap(),
            Value::text_map([("a", "b")])
        );
    }

    #[test]
    fn reject_unsorted_map_keys() {
        assert!(matches!(
            from_cbor(&[0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_duplicate_map_keys() {
        assert!(matches!(
            from_cbor(&[0xa2, 0x61, b'a', 0x01, 0x61, b'a', 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_indefinite_array() {
        assert!(matches!(
            from_cbor(&[0x9f, 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        ));
    }

    #[test]
    fn reject_floats_and_booleans() {
        assert!(matches!(
            from_cbor(&[0xf9, 0x00, 0x00]),
            Err(CodecError::UnsupportedType { .. })
        ));
        assert!(matches!(
            from_cbor(&[0xf5]),
            Err(CodecError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn truncated_input() {
        assert!(matches!(from_cbor(&[]), Err(CodecError::UnexpectedEof)));
        assert!(matches!(from_cbor(&[0x62, b'a']), Err(CodecError::UnexpectedEof)));
        assert!(matches!(from_cbor(&[0x82, 0x01]), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn trailing_bytes_rejected() {
        assert_eq!(
            from_cbor(&[0x01, 0x02]),
            Err(CodecError::TrailingBytes { remaining: 1 })
        );
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert!(matches!(
            from_cbor(&[0x62, 0xff, 0xfe]),
            Err(CodecError::InvalidUtf8)
        ));
    }

    #[test]
    fn oversized_container_rejected() {
        // array claiming 2^32 elements
        assert!(matches!(
            from_cbor(&[0x9b, 0, 0, 0, 1, 0, 0, 0, 0]),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn deep_nesting_rejected() {
        let mut data = vec![0x81; 200_000];
        data.push(0x00);
        assert_eq!(
            from_cbor(&data),
            Err(CodecError::invalid_structure("nesting too deep"))
        );

        let mut maps = Vec::new();
        for _ in 0..=MAX_DEPTH {
            maps.extend([0xa1, 0x00]);
        }
        maps.push(0x00);
        assert!(matches!(
            from_cbor(&maps),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn nesting_up_to_limit_accepted() {
        let mut data = vec![0x81; MAX_DEPTH];
        data.push(0x07);
        let mut value = from_cbor(&data).unwrap();
        for _ in 0..MAX_DEPTH {
            value = match value {
                Value::Array(mut items) => items.remove(0),
                other => panic!("expected array, got {other:?}"),
            };
        }
        assert_eq!(value, Value::Integer(7));
    }
}
