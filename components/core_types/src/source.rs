//! Byte-code location tags.
//!
//! Instructions carry the byte-code offset they were lowered from. Relocated
//! or synthesized instructions are re-stamped from a neighbouring instruction
//! so debugging and profiling metadata stays accurate.

/// Offset of an instruction in its function's byte code.
///
/// # Examples
///
/// ```
/// use core_types::ByteCodeOffset;
///
/// let offset = ByteCodeOffset(24);
/// assert!(offset.is_valid());
/// assert!(!ByteCodeOffset::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteCodeOffset(pub u32);

impl ByteCodeOffset {
    /// Placeholder for instructions with no byte-code origin (sentinels, labels).
    pub const INVALID: ByteCodeOffset = ByteCodeOffset(u32::MAX);

    /// Whether this tag refers to a real byte-code position.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for ByteCodeOffset {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for ByteCodeOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "#{:04x}", self.0)
        } else {
            f.write_str("#----")
        }
    }
}

/// A source location as reported to diagnostics: function and byte-code offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// Function number of the owning function body
    pub function_number: u32,
    /// Offset within that function's byte code
    pub offset: ByteCodeOffset,
}
