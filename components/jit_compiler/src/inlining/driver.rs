//! The call-site walk.

use super::{Inliner, InliningCandidate, InliningContext};
use crate::bailout::BailOutKind;
use crate::ir::{Func, FuncId, InstrId, OpCode, Opnd, SymId};
use core_types::{FunctionJitTimeInfo, JitError, JitResult};
use std::sync::Arc;

/// State of the walk over one function's list.
pub(super) struct Walk<'c> {
    pub func: FuncId,
    pub ctx: InliningContext,
    /// `ArgOut`s of the call this function is being inlined at, by slot
    pub caller_arg_outs: &'c [Option<InstrId>],
    /// Register holding the function's own `this`
    pub sym_this: Option<SymId>,
    /// Call sites inlined into this function so far
    pub inlined_count: u32,
    pub inlinees_processed: u16,
    pub last_statement_boundary: Option<InstrId>,
    loop_top: Option<InstrId>,
    back_edge_count: usize,
}

impl<'c> Walk<'c> {
    fn new(func: FuncId, ctx: InliningContext, caller_arg_outs: &'c [Option<InstrId>]) -> Self {
        Self {
            func,
            ctx,
            caller_arg_outs,
            sym_this: None,
            inlined_count: 0,
            inlinees_processed: 0,
            last_statement_boundary: None,
            loop_top: None,
            back_edge_count: 0,
        }
    }

    /// Profile record of the function being walked.
    pub fn info(&self, func: &Func) -> Arc<FunctionJitTimeInfo> {
        func.data(self.func).jit_info.clone()
    }

    fn enter_label(&mut self, func: &Func, label: InstrId) {
        let info = func.instr(label).label;
        if self.loop_top.is_none() && info.is_loop_top {
            // Only "inside some loop or not" matters, so the outermost loop is enough.
            self.loop_top = Some(label);
            self.ctx.in_loop += 1;
            self.back_edge_count = func.label_ref_count(label);
        }
        if info.is_for_in_exit {
            assert!(self.ctx.for_in_depth != 0, "for-in exit without an enclosing for-in");
            self.ctx.for_in_depth -= 1;
        }
    }

    fn track_back_edge(&mut self, func: &Func, instr: InstrId) {
        let Some(loop_top) = self.loop_top else {
            return;
        };
        let instr = func.instr(instr);
        if instr.opcode.is_branch() && instr.target == Some(loop_top) {
            self.back_edge_count = self.back_edge_count.saturating_sub(1);
            if self.back_edge_count == 0 {
                assert!(self.ctx.in_loop > 0);
                self.ctx.in_loop -= 1;
                self.loop_top = None;
            }
        }
    }
}

/// What the dispatch did with one instruction.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Step {
    pub inlined: bool,
    pub is_polymorphic: bool,
    pub is_built_in: bool,
    pub is_ctor: bool,
    /// Nothing left to inline in this function
    pub stop: bool,
}

impl Step {
    fn ctor() -> Self {
        Self {
            is_ctor: true,
            ..Self::default()
        }
    }
}

/// Drop polymorphic-only profile facts on the load feeding a call target.
pub(super) fn try_reset_fld_info_on_method_load(func: &mut Func, call: InstrId) {
    let Some(load) = method_load_of(func, call) else {
        return;
    };
    if let Some(prop) = func.instr_mut(load).src1.as_mut().and_then(Opnd::as_property_mut) {
        prop.try_reset_fld_info();
    }
}

/// The method load defining a call's target, looking through argument captures.
pub(super) fn method_load_of(func: &Func, call: InstrId) -> Option<InstrId> {
    let target = func.instr(call).src1.as_ref()?.as_reg()?;
    let mut def = func.sym(target).single_def()?;
    while func.instr(def).opcode == OpCode::BytecodeArgOutCapture {
        let src = func.instr(def).src1.as_ref()?.stack_sym()?;
        def = func.sym(src).single_def()?;
    }
    let instr = func.instr(def);
    (instr.opcode.is_method_load() && matches!(instr.src1, Some(Opnd::Property(_)))).then_some(def)
}

impl Inliner<'_> {
    /// Inline into function `f` of the arena, then recursively into every inlinee.
    pub(super) fn optimize_func(
        &mut self,
        func: &mut Func,
        f: FuncId,
        caller_arg_outs: &[Option<InstrId>],
        ctx: InliningContext,
    ) -> JitResult<()> {
        let max_nesting = self.heuristics.config().max_inline_nesting;
        if ctx.nesting > max_nesting {
            return Err(JitError::out_of_stack(format!(
                "inline nesting {} exceeds {}",
                ctx.nesting, max_nesting
            )));
        }

        let info = func.data(f).jit_info.clone();
        if info.body.as_ref().is_some_and(|body| body.has_try) {
            log::debug!("Skip inline: {} has a try region", info.display_name());
            return Ok(());
        }
        let do_inline = info.inlinee_count() > 0 || info.is_ldfld_inlinee_present();

        func.data_mut(f).actual_count = caller_arg_outs.len() as u32;
        let mut walk = Walk::new(f, ctx, caller_arg_outs);
        walk.ctx.for_in_depth = func.data(f).for_in_base_depth;

        let tail = func.tail(f);
        let mut cur = func.next(func.head(f));
        while let Some(id) = cur {
            if id == tail {
                break;
            }
            let next = func.next(id);
            let step = if do_inline {
                self.dispatch(func, &mut walk, id)?
            } else {
                Step::default()
            };
            if step.stop {
                return Ok(());
            }
            if !step.inlined && func.instr(id).is_linked() {
                self.optimize_not_inlined_call(func, id, step);
            }
            cur = match next {
                Some(next) if func.instr(next).is_linked() => Some(next),
                _ if func.instr(id).is_linked() => func.next(id),
                _ => None,
            };
        }
        Ok(())
    }

    fn dispatch(&mut self, func: &mut Func, walk: &mut Walk<'_>, id: InstrId) -> JitResult<Step> {
        let opcode = func.instr(id).opcode;
        match opcode {
            OpCode::StatementBoundary => walk.last_statement_boundary = Some(id),
            OpCode::Label => walk.enter_label(func, id),
            OpCode::InitForInEnumerator => {
                // Loop bodies keep their enumerators in the interpreter frame.
                if !func.data(walk.func).is_loop_body {
                    walk.ctx.for_in_depth += 1;
                }
            }
            OpCode::BrOnNotEmpty => panic!("BrOnNotEmpty at {id} before lowering"),
            OpCode::BrOnEmpty => {
                if !func.data(walk.func).is_loop_body {
                    if let Some(target) = func.instr(id).target {
                        func.instr_mut(target).label.is_for_in_exit = true;
                    }
                }
            }
            OpCode::LdFld | OpCode::StFld | OpCode::LdFldForCallApplyTarget => {
                return self.try_inline_accessor(func, walk, id);
            }
            OpCode::NewScObjArray => {
                return Ok(Step {
                    is_built_in: true,
                    ..Step::ctor()
                });
            }
            OpCode::NewScObject => {
                if !self.flags.inline_constructors {
                    return Ok(Step::ctor());
                }
                return self.try_inline_call(func, walk, id, true);
            }
            OpCode::CallI => return self.try_inline_call(func, walk, id, false),
            OpCode::CallIExtended => self.try_inline_extended_call(func, walk, id),
            OpCode::ArgOut => {
                self.inl_const_fold_arg(func, walk, id);
            }
            OpCode::LdThis => {
                debug_assert!(walk.sym_this.is_none());
                walk.sym_this = func.instr(id).dst_sym();
            }
            OpCode::CheckThis => {
                debug_assert!(walk.sym_this.is_none());
                walk.sym_this = func.instr(id).src1.as_ref().and_then(Opnd::as_reg);
            }
            _ => walk.track_back_edge(func, id),
        }
        Ok(Step::default())
    }

    /// Whether the top function has loops and the walk is outside all of them.
    pub(super) fn inlining_outside_loops(&self, func: &Func, walk: &Walk<'_>) -> bool {
        let top_has_loops = func
            .data(FuncId::TOP)
            .jit_info
            .body
            .as_ref()
            .is_some_and(|body| body.has_loops);
        top_has_loops && walk.ctx.in_loop == 0
    }

    fn try_inline_call(&mut self, func: &mut Func, walk: &mut Walk<'_>, call: InstrId, is_ctor: bool) -> JitResult<Step> {
        let mut step = Step {
            is_ctor,
            ..Step::default()
        };
        let inliner_info = walk.info(func);
        let inlinee_count = inliner_info.inlinee_count();

        let site = if walk.inlinees_processed == inlinee_count {
            None
        } else {
            func.instr(call)
                .profile_id
                .filter(|profile_id| *profile_id < inlinee_count)
                .and_then(|profile_id| inliner_info.inlinee(profile_id).cloned().map(|info| (profile_id, info)))
        };
        let Some((profile_id, inlinee)) = site else {
            try_reset_fld_info_on_method_load(func, call);
            return Ok(step);
        };

        if inliner_info.is_polymorphic_call_site(profile_id) {
            step.is_polymorphic = true;
            if is_ctor || !self.flags.polymorphic_inline || self.inlining_outside_loops(func, walk) {
                log::debug!(
                    "Skip inline: polymorphic call site {} in {} (ctor: {})",
                    profile_id,
                    inliner_info.display_name(),
                    is_ctor
                );
                try_reset_fld_info_on_method_load(func, call);
                return Ok(step);
            }
            step.inlined = if self.flags.fixed_methods && self.flags.polymorphic_inline_fixed_methods {
                self.inline_polymorphic_using_fixed_methods(func, walk, call, profile_id)?
            } else {
                try_reset_fld_info_on_method_load(func, call);
                self.inline_polymorphic(func, walk, call, profile_id)?
            };
        } else {
            try_reset_fld_info_on_method_load(func, call);

            let array_new_instance = func.script_context().array_new_instance_addr;
            if is_ctor && inlinee.function_info_addr == array_new_instance {
                // Lowering allocates the array inline.
                let instr = func.instr_mut(call);
                instr.opcode = OpCode::NewScObjArray;
                instr.profile_id = None;
                step.is_built_in = true;
                return Ok(step);
            }

            let built_in_opcode = inlinee.built_in.and_then(super::builtins::inline_candidate_opcode);
            step.is_built_in = inlinee.built_in.is_some();
            match &inlinee.body {
                None => {
                    if !self.flags.inline_built_ins || built_in_opcode.is_none() || is_ctor {
                        return Ok(step);
                    }
                }
                Some(body) => {
                    if !body.has_profile_info {
                        return Ok(step);
                    }
                    let constant_args = if self.flags.inline_recursive {
                        self.constant_argument_mask(func, call)
                    } else {
                        0
                    };
                    let top_info = func.data(FuncId::TOP).jit_info.clone();
                    let candidate = InliningCandidate {
                        callee: &inlinee,
                        caller: &inliner_info,
                        top: &top_info,
                        call_site: profile_id,
                        is_ctor,
                        is_fixed_method_call: true,
                        in_loop: walk.ctx.in_loop != 0,
                        outside_loops: self.inlining_outside_loops(func, walk),
                        recursive_depth: walk.ctx.recursive_depth,
                        constant_args,
                        inlined_so_far: walk.inlined_count,
                    };
                    self.stats.candidates_considered += 1;
                    if let Err(rejection) = self.heuristics.decide(&candidate) {
                        log::debug!(
                            "Skip inline: {} into {} at call site {}: {}",
                            inlinee.display_name(),
                            inliner_info.display_name(),
                            profile_id,
                            rejection
                        );
                        self.stats.record_rejection(&rejection);
                        return Ok(step);
                    }
                }
            }

            step.inlined = match built_in_opcode {
                Some(opcode) if !inlinee.has_body() => {
                    self.inline_built_in(func, walk, call, &inlinee, opcode, profile_id)?
                }
                _ => self.inline_script_function(func, walk, call, &inlinee, profile_id)?,
            };
        }

        if step.inlined {
            walk.inlined_count += 1;
        }
        walk.inlinees_processed += 1;
        if walk.inlinees_processed == inlinee_count
            && !inliner_info.is_ldfld_inlinee_present()
            && !self.flags.fixed_methods
        {
            // Accessor caches are shared, so only stop when there are none.
            step.stop = true;
        }
        Ok(step)
    }

    /// Bit `slot - 2` is set for each argument after `this` that is an int constant.
    fn constant_argument_mask(&self, func: &Func, call: InstrId) -> u16 {
        let max = self.heuristics.config().max_constant_argument_count;
        let mut mask: u16 = 0;
        for arg in func.iterate_arg_instrs(call) {
            let instr = func.instr(arg);
            let Some(src) = instr.src1.as_ref().and_then(Opnd::as_reg) else {
                continue;
            };
            if !func.is_int_const(src) || !matches!(instr.src2, Some(Opnd::Sym(_))) {
                continue;
            }
            let Some(slot) = func.arg_slot_of(arg) else {
                continue;
            };
            let index = slot - 1;
            if index == max {
                break;
            }
            if index < 16 {
                mask |= 1 << index;
            }
        }
        mask
    }

    fn try_inline_extended_call(&mut self, func: &mut Func, walk: &mut Walk<'_>, call: InstrId) {
        let inliner_info = walk.info(func);
        let inlinee_count = inliner_info.inlinee_count();
        if walk.inlinees_processed == inlinee_count {
            return;
        }
        let Some(profile_id) = func.instr(call).profile_id else {
            return;
        };
        if profile_id >= inlinee_count || inliner_info.inlinee(profile_id).is_none() {
            return;
        }
        if super::spread::is_spread_call(func, call) {
            self.inline_spread(func, walk, call);
        }
    }

    /// Turn a call that was not inlined into a fixed-method call when the
    /// target load allows it.
    fn optimize_not_inlined_call(&mut self, func: &mut Func, call: InstrId, step: Step) {
        let opcode = func.instr(call).opcode;
        let is_ctor = match opcode {
            OpCode::NewScObject | OpCode::NewScObjArray => true,
            OpCode::CallI => step.is_ctor,
            _ => return,
        };
        try_reset_fld_info_on_method_load(func, call);
        let Some(original_target) = func.instr(call).src1.as_ref().and_then(Opnd::as_reg) else {
            return;
        };

        let request = super::fixed_method::FixedMethodRequest {
            inlinee: None,
            is_polymorphic: step.is_polymorphic,
            is_built_in: step.is_built_in,
            is_ctor,
            is_inlined: false,
            just_check: false,
            poly_index: 0,
        };
        if self.try_optimize_call_with_fixed_method(func, call, &request).is_some() {
            super::guards::insert_byte_code_uses(func, original_target, call);
            if opcode == OpCode::NewScObject && self.flags.split_new_sc_object {
                self.split_constructor_call(func, call, false, true);
            }
            self.stats.fixed_method_calls += 1;
        } else if opcode == OpCode::NewScObjArray {
            let native = func
                .instr(call)
                .dst_sym()
                .is_some_and(|dst| func.sym(dst).is_likely_native_array);
            if native {
                let kind = BailOutKind::OnNotNativeArray;
                let record = func.new_bailout_record(kind, call);
                func.set_bailout(call, kind, record);
            }
        }
    }

    /// Re-insert the last statement boundary in front of `next`, so code
    /// after an inlined call starts a new statement.
    pub(super) fn insert_statement_boundary(&self, func: &mut Func, walk: &Walk<'_>, next: Option<InstrId>) {
        let (Some(boundary), Some(next)) = (walk.last_statement_boundary, next) else {
            return;
        };
        if !func.instr(next).is_linked() {
            return;
        }
        let owner = func.instr(next).func;
        let copy = func.new_instr(OpCode::StatementBoundary, owner);
        func.instr_mut(copy).src1 = func.instr(boundary).src1.clone();
        func.insert_before(next, copy);
        func.tag_with_source_location(copy, next);
    }
}
