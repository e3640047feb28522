//! Byte strings produced by the parser.

use core::{
    fmt,
    hash::{Hash, Hasher},
};

use bstr::ByteSlice;

/// Where the bytes of a [`ByteSpan`] live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backing {
    /// A zero-copy slice of the parser's input buffer.
    #[default]
    Input,
    /// A copy owned by an [`Arena`](crate::Arena).
    Arena,
}

/// A length-delimited byte string.
///
/// Equality and hashing look only at the bytes; a view and a copy of the same
/// text compare equal.
#[derive(Clone, Copy, Default)]
pub struct ByteSpan<'a> {
    bytes: &'a [u8],
    backing: Backing,
}

impl<'a> ByteSpan<'a> {
    /// Borrows `bytes` without copying.
    #[must_use]
    pub const fn view(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            backing: Backing::Input,
        }
    }

    /// Wraps bytes that were copied into an arena.
    #[must_use]
    pub const fn copied(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            backing: Backing::Arena,
        }
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The text as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn to_str(&self) -> Option<&'a str> {
        self.bytes.to_str().ok()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub const fn backing(&self) -> Backing {
        self.backing
    }
}

impl PartialEq for ByteSpan<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for ByteSpan<'_> {}

impl PartialEq<[u8]> for ByteSpan<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl PartialEq<&[u8]> for ByteSpan<'_> {
    fn eq(&self, other: &&[u8]) -> bool {
        self.bytes == *other
    }
}

impl PartialEq<str> for ByteSpan<'_> {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for ByteSpan<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl Hash for ByteSpan<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Debug for ByteSpan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.bytes.as_bstr(), f)
    }
}

impl fmt::Display for ByteSpan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.bytes.as_bstr(), f)
    }
}
