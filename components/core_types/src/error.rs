//! Compilation error types.
//!
//! Speculation failures are never errors here: they are encoded as bailout
//! kinds on guard instructions. Invariant violations panic. What remains are
//! the conditions that abort one compilation and leave the function running
//! in its current tier.

use crate::ByteCodeOffset;
use thiserror::Error;

/// The kind of compilation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The native stack (or the inline nesting probe) ran out
    OutOfStack,
    /// A code buffer or other allocation could not be satisfied
    OutOfMemory,
    /// A configuration value was rejected
    InvalidConfig,
    /// The collaborator that builds inlinee IR failed
    IrBuild,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::OutOfStack => "out of stack",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::InvalidConfig => "invalid config",
            ErrorKind::IrBuild => "IR build failure",
        };
        f.write_str(name)
    }
}

/// An error that aborts the compilation of one function.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JitError};
///
/// let error = JitError::out_of_memory("code buffer exhausted");
/// assert_eq!(error.kind, ErrorKind::OutOfMemory);
/// assert_eq!(error.to_string(), "out of memory: code buffer exhausted");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct JitError {
    /// The failure class
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
    /// Byte-code location being compiled when the failure happened, if known
    pub location: Option<ByteCodeOffset>,
}

impl JitError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// Stack probe failure.
    pub fn out_of_stack(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfStack, message)
    }

    /// Allocation failure.
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfMemory, message)
    }

    /// Rejected configuration.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, message)
    }

    /// Inlinee IR could not be produced.
    pub fn ir_build(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IrBuild, message)
    }

    /// Attach the byte-code location being compiled.
    pub fn at(mut self, location: ByteCodeOffset) -> Self {
        self.location = Some(location);
        self
    }

    /// Whether the failure is a resource exhaustion.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self.kind, ErrorKind::OutOfStack | ErrorKind::OutOfMemory)
    }
}

/// Result alias used across the compiler crates.
pub type JitResult<T> = Result<T, JitError>;
