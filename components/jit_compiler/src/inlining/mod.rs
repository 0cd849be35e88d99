//! Speculative inlining for the optimizing JIT
//!
//! The inliner walks a function's instruction list once, front to back, and
//! decides for every profiled call site whether to replace the call with a
//! guarded copy of the callee:
//!
//! - [`InliningHeuristics`]: pure accept / reject decisions
//! - guards: object, type-id, function-info and fixed-field checks
//! - splicing: argument and formal mapping, inlinee frames
//! - the driver: loop and for-in tracking, dispatch per call kind
//!
//! Inlinee bodies come from an [`InlineeIrBuilder`]; each body is optimized
//! recursively before it is spliced into its caller.

use crate::ir::{Func, FuncId};
use core_types::{JitFlags, JitResult};

mod accessor;
mod apply_call;
mod arguments;
mod builtins;
mod config;
mod const_fold;
mod context;
mod ctor;
mod driver;
mod fixed_method;
mod guards;
mod heuristics;
mod polymorphic;
mod splice;
mod spread;
#[cfg(test)]
mod test_support;

pub use config::InliningConfig;
pub use context::InliningContext;
pub use heuristics::{InliningCandidate, InliningHeuristics, InliningRejection, InliningStats};

/// Produces the IR of an inlinee.
///
/// The builder fills the list of `inlinee` (between its sentinels) from the
/// body described by `func.data(inlinee).jit_info`. Symbols and instructions
/// are created in the shared arena.
pub trait InlineeIrBuilder {
    /// Build the body of `inlinee`.
    fn build_ir(&self, func: &mut Func, inlinee: FuncId) -> JitResult<()>;
}

/// Inlines profiled call sites of one function.
///
/// # Examples
///
/// ```
/// use core_types::{Addr, FunctionBodyInfo, FunctionJitTimeInfo, JitFlags, JitResult, ScriptContextInfo};
/// use jit_compiler::inlining::{InlineeIrBuilder, Inliner, InliningConfig};
/// use jit_compiler::ir::{Func, FuncId};
/// use std::sync::Arc;
///
/// struct NoBodies;
///
/// impl InlineeIrBuilder for NoBodies {
///     fn build_ir(&self, _func: &mut Func, _inlinee: FuncId) -> JitResult<()> {
///         Ok(())
///     }
/// }
///
/// let body = Arc::new(FunctionBodyInfo::new(1, "main", Addr(0x1000), 1));
/// let info = Arc::new(FunctionJitTimeInfo::script(Addr(0x100), body));
/// let mut func = Func::new(info, Arc::new(ScriptContextInfo::default()));
///
/// let mut inliner = Inliner::new(JitFlags::default(), InliningConfig::default(), &NoBodies).unwrap();
/// assert!(!inliner.optimize(&mut func).unwrap());
/// ```
pub struct Inliner<'a> {
    flags: JitFlags,
    heuristics: InliningHeuristics,
    builder: &'a dyn InlineeIrBuilder,
    stats: InliningStats,
}

impl<'a> Inliner<'a> {
    /// Create an inliner. Fails if the thresholds are unusable.
    pub fn new(flags: JitFlags, config: InliningConfig, builder: &'a dyn InlineeIrBuilder) -> JitResult<Self> {
        config.validate()?;
        Ok(Self {
            flags,
            heuristics: InliningHeuristics::new(config),
            builder,
            stats: InliningStats::default(),
        })
    }

    /// Statistics accumulated over every `optimize` call.
    pub fn stats(&self) -> &InliningStats {
        &self.stats
    }

    /// Thresholds in use.
    pub fn config(&self) -> &InliningConfig {
        self.heuristics.config()
    }

    /// Phase switches in use.
    pub fn flags(&self) -> &JitFlags {
        &self.flags
    }

    /// Inline call sites of the top-level function of `func`.
    ///
    /// Returns whether anything was inlined. An error aborts the whole
    /// compilation; the IR is then in an unspecified state and must be
    /// dropped.
    pub fn optimize(&mut self, func: &mut Func) -> JitResult<bool> {
        if !self.flags.inline {
            log::debug!("inlining disabled");
            return Ok(false);
        }
        let before = self.inlined_total();
        self.optimize_func(func, FuncId::TOP, &[], InliningContext::top())?;
        let changed = self.inlined_total() != before;
        log::debug!(
            "inlining of {} done: {} inlinees",
            func.data(FuncId::TOP).jit_info.display_name(),
            self.inlined_total() - before
        );
        Ok(changed)
    }

    fn inlined_total(&self) -> u64 {
        self.stats.functions_inlined
            + self.stats.built_ins_inlined
            + self.stats.polymorphic_sites_inlined
            + self.stats.accessors_inlined
    }
}
