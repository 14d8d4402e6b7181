//! Content-addressed object identifiers.

use std::fmt;
use std::io::Read;

/// Identifier of a piece of content: its blake3 digest and byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    hash: [u8; 32],
    size: u64,
}

impl ObjectId {
    /// Create an identifier from a digest and a size.
    #[must_use]
    pub const fn new(hash: [u8; 32], size: u64) -> Self {
        Self { hash, size }
    }

    /// Identifier of an in-memory byte slice.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self {
            hash: *blake3::hash(bytes).as_bytes(),
            size: bytes.len() as u64,
        }
    }

    /// Identifier of everything readable from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn of_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        let size = std::io::copy(&mut reader, &mut hasher)?;
        Ok(Self {
            hash: *hasher.finalize().as_bytes(),
            size,
        })
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Content length in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", blake3::Hash::from(self.hash).to_hex())
    }
}
