//! Shared types for the JIT compiler crates.
//!
//! This crate holds everything the inliner and the template encoder agree on
//! without depending on each other: the error type, phase switches, and the
//! read-only profile records supplied by the runtime.
//!
//! # Overview
//!
//! - [`JitError`] / [`ErrorKind`] - Failures that abort one compilation
//! - [`JitFlags`] - Phase switches, loadable from JSON
//! - [`FunctionJitTimeInfo`] - Per call-site callee records
//! - [`ObjTypeSpecFldInfo`] / [`FixedField`] - Inline-cache facts
//! - [`BuiltinFunction`] - Built-ins the inliner recognizes
//! - [`TypeId`] / [`Addr`] / [`ScriptContextInfo`] - Runtime identities
//! - [`ByteCodeOffset`] - Source location tags
//!
//! # Examples
//!
//! ```
//! use core_types::{Addr, BuiltinFunction, FunctionJitTimeInfo, TypeId};
//!
//! let abs = FunctionJitTimeInfo::built_in(Addr(0x500), BuiltinFunction::MathAbs);
//! assert!(!abs.has_body());
//! assert!(TypeId::Function.is_true_object());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod builtin;
mod config;
mod error;
mod profile;
mod source;
mod value;

pub use builtin::{BuiltInFlags, BuiltinFunction};
pub use config::JitFlags;
pub use error::{ErrorKind, JitError, JitResult};
pub use profile::{
    ConstructorCache, FixedField, FunctionBodyInfo, FunctionJitTimeInfo, InlineCacheIndex, ObjTypeSpecFldInfo,
    ProfileId, PropertyId, ThisType,
};
pub use source::{ByteCodeOffset, SourceLocation};
pub use value::{Addr, ObjectLayout, ScriptContextInfo, TypeId};
