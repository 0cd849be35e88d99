//! Template JIT for asm.js-style functions on x86-32
//!
//! This crate provides:
//! - Encoder: byte-exact x86-32 and SSE2 instruction emission
//! - Register cache: which registers still mirror which frame slots
//! - Templates: one fixed machine code sequence per abstract operation
//! - Configuration: frame layout, object layout and limits, loadable from JSON
//!
//! Every operand lives in the function's stack frame. Templates load what
//! they need, store their result and leave the value cached in a register
//! so the next template can skip the reload.
//!
//! # Example
//!
//! ```
//! use template_jit::templates::{IntBinaryOp, LabelId};
//! use template_jit::{CodeBuffer, FunctionInfo, RuntimeAddrs, TemplateConfig, TemplateContext, TemplateOp};
//!
//! let function = FunctionInfo { frame_size: 32, arg_bytes: 8, fixed_heap: true };
//! let mut context = TemplateContext::new(TemplateConfig::default(), RuntimeAddrs::default(), function);
//! let mut buffer = CodeBuffer::with_capacity(1024);
//!
//! let body = [
//!     TemplateOp::FunctionEntry,
//!     TemplateOp::LdConst { dst: 16, value: 0 },
//!     TemplateOp::Label(LabelId(0)),
//!     TemplateOp::IntBinary { op: IntBinaryOp::Add, dst: 16, left: 16, right: 20 },
//!     TemplateOp::BrTrue { src: 24, target: LabelId(0), back_edge: true },
//!     TemplateOp::SetReturn { kind: template_jit::ValueKind::Int, src: 16 },
//!     TemplateOp::FunctionExit,
//! ];
//! for op in &body {
//!     context.apply_template(&mut buffer, op).unwrap();
//! }
//! assert!(context.unresolved_labels().is_empty());
//! assert_eq!(buffer.as_slice().last(), Some(&0x00)); // ret 12
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod code_buffer;
mod config;
pub mod encoder;
mod reg_cache;
mod registers;
mod runtime;
pub mod templates;

pub use code_buffer::{CodeBuffer, Relocation};
pub use config::{FrameLayout, ObjectLayout, TemplateConfig};
pub use reg_cache::{CacheEntry, RegisterCache};
pub use registers::{
    Reg, RegClass, RegMask, ValueKind, ARRAY_BUFFER_REG, BYTE_REGS, GENERAL_REGS, MODULE_ENV_REG, NONVOLATILE_REGS,
    UNAVAILABLE_REGS, XMM_REGS,
};
pub use runtime::{FunctionInfo, RuntimeAddrs};
pub use templates::{LabelId, TemplateContext, TemplateOp};
