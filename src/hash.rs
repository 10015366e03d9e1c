//! Streaming content hash used for cache keys.
//!
//! [`HashBuilder`] wraps a SHA-256 state with typed append helpers. Strings
//! are length-prefixed so adjacent fields can never alias (`"ab" + "c"` and
//! `"a" + "bc"` hash differently); raw spans are appended as-is.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Fixed-size 256-bit digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, used as the key string and on-disk file name.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Values with a canonical little-endian byte encoding.
pub trait HashPod {
    fn append_to(&self, builder: &mut HashBuilder);
}

macro_rules! impl_hash_pod {
    ($($ty:ty),*) => {
        $(
            impl HashPod for $ty {
                #[inline]
                fn append_to(&self, builder: &mut HashBuilder) {
                    builder.append_bytes(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_hash_pod!(u8, u16, u32, u64, i32, i64, f32);

impl HashPod for bool {
    #[inline]
    fn append_to(&self, builder: &mut HashBuilder) {
        builder.append_bytes(&[*self as u8]);
    }
}

impl HashPod for usize {
    #[inline]
    fn append_to(&self, builder: &mut HashBuilder) {
        builder.append_bytes(&(*self as u64).to_le_bytes());
    }
}

/// Streaming SHA-256 builder.
#[derive(Clone, Default)]
pub struct HashBuilder {
    state: Sha256,
    bytes_appended: u64,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scalar in its little-endian encoding.
    pub fn append<T: HashPod>(&mut self, value: T) -> &mut Self {
        value.append_to(self);
        self
    }

    /// Append a raw byte span without a length prefix.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.state.update(bytes);
        self.bytes_appended += bytes.len() as u64;
        self
    }

    /// Append a length-prefixed string view.
    pub fn append_str(&mut self, s: &str) -> &mut Self {
        self.append(s.len() as u64);
        self.append_bytes(s.as_bytes())
    }

    /// Append a previously finalized digest.
    pub fn append_digest(&mut self, digest: &Digest) -> &mut Self {
        self.append_bytes(&digest.0)
    }

    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended
    }

    /// Digest of everything appended so far. Does not consume the stream,
    /// so calling it twice without appending returns the same digest.
    pub fn finalize(&self) -> Digest {
        Digest(self.state.clone().finalize().into())
    }
}

impl fmt::Debug for HashBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashBuilder")
            .field("bytes_appended", &self.bytes_appended)
            .finish()
    }
}
