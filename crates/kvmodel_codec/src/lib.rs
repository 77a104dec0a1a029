//! # kvmodel Codec
//!
//! Binary envelopes for the arguments of kvmodel's store-side procedures.
//!
//! Every argument slot of the save and remove procedures is one canonical CBOR
//! item. Canonical encoding guarantees:
//! - Identical inputs produce identical bytes
//! - Map content round-trips exactly regardless of insertion order
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by encoded key (length first, then bytewise)
//! - Integers and lengths use the shortest encoding
//! - No indefinite-length items
//! - No floats, booleans or tags
//!
//! ## Usage
//!
//! ```
//! use kvmodel_codec::{Decode, Encode, Metadata};
//!
//! let meta = Metadata::new("user", "1");
//! let bytes = meta.encode().unwrap();
//! assert_eq!(Metadata::decode(&bytes).unwrap(), meta);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod envelope;
mod error;
mod value;

pub use bytes::Bytes;
pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use envelope::{AttributePairs, IndexPairs, Metadata, TrackedKeys, UniqueMap};
pub use error::{CodecError, CodecResult};
pub use value::Value;

/// Types that pack into one argument slot.
pub trait Encode {
    /// Encode to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Bytes>;
}

/// Types that unpack from one argument slot.
pub trait Decode: Sized {
    /// Decode from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Bytes> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
