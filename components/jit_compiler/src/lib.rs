//! Speculative inlining for the optimizing JIT tier
//!
//! This crate provides:
//! - IR: the arena-backed instruction list the backend optimizes
//! - Inlining: profile-driven replacement of calls by guarded callee bodies
//! - Bailouts: the guard kinds a failed speculation reports
//! - Bounds: saturating induction-variable change ranges
//!
//! # Example
//!
//! ```
//! use core_types::{Addr, FunctionBodyInfo, FunctionJitTimeInfo, JitFlags, JitResult, ScriptContextInfo};
//! use jit_compiler::inlining::{InlineeIrBuilder, Inliner, InliningConfig};
//! use jit_compiler::ir::{Func, FuncId, OpCode, Opnd};
//! use std::sync::Arc;
//!
//! struct EmptyBodies;
//!
//! impl InlineeIrBuilder for EmptyBodies {
//!     fn build_ir(&self, _func: &mut Func, _inlinee: FuncId) -> JitResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! let body = Arc::new(FunctionBodyInfo::new(1, "main", Addr(0x1000), 1));
//! let info = Arc::new(FunctionJitTimeInfo::script(Addr(0x100), body));
//! let mut func = Func::new(info, Arc::new(ScriptContextInfo::default()));
//! let ret = func.create(OpCode::Ret, FuncId::TOP, None, Some(Opnd::IntConst(0)), None);
//! func.append(FuncId::TOP, ret);
//!
//! let mut inliner = Inliner::new(JitFlags::default(), InliningConfig::default(), &EmptyBodies).unwrap();
//! assert!(!inliner.optimize(&mut func).unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bailout;
pub mod bounds;
pub mod inlining;
pub mod ir;

// Re-export main types at crate root
pub use bailout::BailOutKind;
pub use bounds::IntConstantBounds;
pub use inlining::{InlineeIrBuilder, Inliner, InliningConfig, InliningStats};
pub use ir::Func;
