//! Append-only machine code buffer.

use core_types::{JitError, JitResult};

/// Fixed-capacity byte buffer the templates emit into.
///
/// # Examples
///
/// ```
/// use template_jit::CodeBuffer;
///
/// let mut buffer = CodeBuffer::with_capacity(4);
/// buffer.emit_u8(0x90).unwrap();
/// assert_eq!(buffer.len(), 1);
/// assert!(buffer.emit_u32(0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl CodeBuffer {
    /// An empty buffer that refuses to grow beyond `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes emitted so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was emitted yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    /// The emitted code.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer, returning the emitted code.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn reserve(&self, count: usize) -> JitResult<()> {
        if count > self.remaining() {
            return Err(JitError::out_of_memory(format!(
                "code buffer full: {} of {} bytes used, {} more requested",
                self.bytes.len(),
                self.capacity,
                count
            )));
        }
        Ok(())
    }

    /// Append one byte.
    pub fn emit_u8(&mut self, byte: u8) -> JitResult<()> {
        self.reserve(1)?;
        self.bytes.push(byte);
        Ok(())
    }

    /// Append a little-endian 16-bit value.
    pub fn emit_u16(&mut self, value: u16) -> JitResult<()> {
        self.emit_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian 32-bit value.
    pub fn emit_u32(&mut self, value: u32) -> JitResult<()> {
        self.emit_bytes(&value.to_le_bytes())
    }

    /// Append raw bytes; nothing is written if they do not all fit.
    pub fn emit_bytes(&mut self, bytes: &[u8]) -> JitResult<()> {
        self.reserve(bytes.len())?;
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Overwrite one already emitted byte.
    pub fn patch_u8_at(&mut self, position: usize, byte: u8) {
        assert!(position < self.bytes.len(), "patch at {position} past end of code");
        self.bytes[position] = byte;
    }

    /// Overwrite four already emitted bytes with a little-endian value.
    pub fn patch_at(&mut self, position: usize, value: u32) {
        assert!(position + 4 <= self.bytes.len(), "patch at {position} past end of code");
        self.bytes[position..position + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Drop everything emitted after `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }
}

/// A short jump whose 8-bit displacement is fixed once its target is emitted.
///
/// Created right after the jump opcode and its placeholder byte; the target
/// is wherever the buffer ends when [`Relocation::resolve`] runs.
#[derive(Debug)]
#[must_use = "a short jump must be resolved"]
pub struct Relocation {
    displacement_at: usize,
}

impl Relocation {
    /// Record a jump whose placeholder displacement byte was the last byte emitted.
    pub fn after_jump(buffer: &CodeBuffer) -> Self {
        assert!(!buffer.is_empty(), "relocation without a jump");
        Self {
            displacement_at: buffer.len() - 1,
        }
    }

    /// Point the jump at the current end of the buffer.
    pub fn resolve(self, buffer: &mut CodeBuffer) {
        let distance = buffer.len() - (self.displacement_at + 1);
        let displacement =
            i8::try_from(distance).unwrap_or_else(|_| panic!("short jump over {distance} bytes does not fit in 8 bits"));
        buffer.patch_u8_at(self.displacement_at, displacement as u8);
    }
}

/// Displacement for a 32-bit relative field at `field_at` that jumps to `target`.
pub fn rel32(field_at: usize, target: usize) -> u32 {
    (target as i64 - (field_at as i64 + 4)) as i32 as u32
}
