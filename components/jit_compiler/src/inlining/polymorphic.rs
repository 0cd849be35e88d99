//! Polymorphic call-site inlining.
//!
//! Every observed target gets its own inlined copy behind a dispatch on the
//! target's identity. Misses fall through to one shared bailout:
//!
//! ```text
//!     <type checks>
//!     ArgOut ...                  (captured)
//!     BrAddr [f + functionInfo], info_0 -> $L0     (or: BrAddr type, type_i)
//!     BrAddr [f + functionInfo], info_1 -> $L1
//!     Br $helper
//! $dispatch:
//! $L0: InlineeStart ... InlineeEnd; Br $done
//! $L1: InlineeStart ... InlineeEnd; Br $done
//! $helper:
//!     [LdMethodFldPolyInlineMiss]
//!     BailOnNotPolymorphicInlinee
//!     BytecodeArgOutUse ...
//!     ByteCodeUses f
//!     d = EndCallForPolymorphicInlinee n + 3
//! $done:
//! ```

use super::driver::{try_reset_fld_info_on_method_load, Walk};
use super::fixed_method::FixedMethodRequest;
use super::splice::{FormalMap, InlineSite};
use super::{guards, Inliner, InliningCandidate};
use crate::bailout::BailOutKind;
use crate::ir::{Func, FuncId, InstrId, OpCode, Opnd, INLINEE_META_ARGS};
use core_types::{Addr, FixedField, FunctionJitTimeInfo, JitResult, ProfileId};
use std::sync::Arc;

/// A call site's variants in profile order.
fn variant_chain(first: &Arc<FunctionJitTimeInfo>) -> Vec<Arc<FunctionJitTimeInfo>> {
    std::iter::successors(Some(first.clone()), |info| info.next.clone()).collect()
}

/// Receiver types that resolved to the same function value.
#[derive(Debug, Clone)]
struct FixedGroup {
    fixed: FixedField,
    type_addrs: Vec<Addr>,
    all_true_objects: bool,
}

/// Group fixed fields by function value. Groups keep the order of their
/// first occurrence; types within a group keep their recorded order.
fn group_by_function(fields: &[FixedField]) -> Vec<FixedGroup> {
    let mut groups: Vec<FixedGroup> = Vec::new();
    for field in fields {
        let is_object = field.type_id.is_true_object();
        match groups.iter_mut().find(|group| group.fixed.field_value == field.field_value) {
            Some(group) => {
                group.fixed.next_has_same_fixed_field = true;
                group.type_addrs.push(field.type_addr);
                group.all_true_objects &= is_object;
            }
            None => groups.push(FixedGroup {
                fixed: field.clone(),
                type_addrs: vec![field.type_addr],
                all_true_objects: is_object,
            }),
        }
    }
    groups
}

/// A dispatch on the receiver's type, one group per inlinee.
struct FixedDispatch {
    load: InstrId,
    groups: Vec<(FixedGroup, Arc<FunctionJitTimeInfo>)>,
    safe_this: bool,
}

impl Inliner<'_> {
    /// Variants of a polymorphic site, or `None` when the site cannot be
    /// dispatched.
    fn polymorphic_variants(
        &self,
        func: &Func,
        walk: &Walk<'_>,
        call: InstrId,
        profile_id: ProfileId,
    ) -> Option<Vec<Arc<FunctionJitTimeInfo>>> {
        let inliner_info = walk.info(func);
        let first = inliner_info.inlinee(profile_id)?;
        if first.next.is_none() {
            log::debug!("Skip inline: call site {} has a single callee record", profile_id);
            return None;
        }
        let last_slot = func
            .instr(call)
            .src2_sym()
            .and_then(|sym| func.sym(sym).arg_slot())
            .unwrap_or(0);
        let config = self.heuristics.config();
        if last_slot > config.max_inlinee_arg_slot {
            log::debug!(
                "Skip inline: polymorphic call site {} passes {} arguments",
                profile_id,
                last_slot
            );
            return None;
        }
        let variants: Vec<_> = variant_chain(first).into_iter().filter(|v| v.has_body()).collect();
        if variants.len() < 2 || variants.len() > config.max_polymorphic_inlinees {
            log::debug!(
                "Skip inline: polymorphic call site {} has {} inlinable targets (max {})",
                profile_id,
                variants.len(),
                config.max_polymorphic_inlinees
            );
            return None;
        }
        Some(variants)
    }

    /// Dispatch on the receiver type using the fixed functions recorded by
    /// the method load, falling back to [`Self::inline_polymorphic`].
    pub(super) fn inline_polymorphic_using_fixed_methods(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        profile_id: ProfileId,
    ) -> JitResult<bool> {
        let Some(variants) = self.polymorphic_variants(func, walk, call, profile_id) else {
            try_reset_fld_info_on_method_load(func, call);
            return Ok(false);
        };
        match self.plan_fixed_dispatch(func, call, &variants) {
            Some(plan) => self.emit_fixed_dispatch(func, walk, call, profile_id, plan),
            None => {
                try_reset_fld_info_on_method_load(func, call);
                self.inline_polymorphic(func, walk, call, profile_id)
            }
        }
    }

    fn plan_fixed_dispatch(
        &self,
        func: &mut Func,
        call: InstrId,
        variants: &[Arc<FunctionJitTimeInfo>],
    ) -> Option<FixedDispatch> {
        // Only the argument setup may sit between StartCall and the call.
        let mut cur = func.prev(call);
        loop {
            let id = cur?;
            match func.instr(id).opcode {
                OpCode::StartCall => break,
                OpCode::ArgOut | OpCode::Ld => cur = func.prev(id),
                other => {
                    log::trace!("polymorphic fixed methods: {} between StartCall and {}", other, call);
                    return None;
                }
            }
        }

        let target = func.instr(call).src1.as_ref()?.as_reg()?;
        let load = func.sym(target).single_def()?;
        let fld_info = func.instr(load).src1.as_ref()?.as_property()?.fld_info.clone()?;
        if !fld_info.has_fixed_value || fld_info.fixed_fields.len() < 2 {
            return None;
        }
        if fld_info.fixed_fields.iter().any(|field| field.field_value.is_null()) {
            return None;
        }

        let groups = group_by_function(&fld_info.fixed_fields);
        if groups.len() != variants.len() {
            log::trace!(
                "polymorphic fixed methods: {} distinct functions for {} callee records",
                groups.len(),
                variants.len()
            );
            return None;
        }
        let mut planned = Vec::with_capacity(groups.len());
        for group in groups {
            let variant = variants
                .iter()
                .find(|variant| variant.function_info_addr == group.fixed.func_info_addr)?
                .clone();
            planned.push((group, variant));
        }

        let request = FixedMethodRequest {
            inlinee: Some(planned[0].1.as_ref()),
            is_polymorphic: true,
            is_built_in: false,
            is_ctor: false,
            is_inlined: true,
            just_check: true,
            poly_index: 0,
        };
        self.try_optimize_call_with_fixed_method(func, call, &request)?;

        let safe_this = planned.iter().all(|(group, _)| group.all_true_objects);
        Some(FixedDispatch {
            load,
            groups: planned,
            safe_this,
        })
    }

    fn emit_fixed_dispatch(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        profile_id: ProfileId,
        plan: FixedDispatch,
    ) -> JitResult<bool> {
        let next = func.next(call);
        let owner = func.instr(call).func;
        let load = plan.load;

        let type_reg = func.new_reg(owner);
        let guard = func.create(
            OpCode::CheckPropertyGuardAndLoadType,
            owner,
            Some(Opnd::Reg(type_reg)),
            func.instr(load).src1.clone(),
            None,
        );
        func.insert_before(load, guard);
        func.tag_with_source_location(guard, load);
        let record = func.new_bailout_record(BailOutKind::FailedFixedFieldCheck, load);
        func.set_bailout(guard, BailOutKind::FailedFixedFieldCheck, record);

        let return_value = func.unlink_dst(call);
        func.move_args(call, true);
        func.instr_mut(call).opcode = OpCode::CallIFixed;

        let done = func.new_label(owner, false);
        let dispatch = func.new_label(owner, false);
        func.insert_before(call, dispatch);
        for (group, variant) in &plan.groups {
            let label = func.new_label(owner, false);
            func.insert_before(call, label);
            let method = Opnd::fixed_function(group.fixed.clone());
            self.insert_one_inlinee(func, walk, call, &return_value, method, variant, done, plan.safe_this, profile_id)?;
            for type_addr in &group.type_addrs {
                let br = func.new_branch(
                    OpCode::BrAddr,
                    owner,
                    label,
                    Some(Opnd::Reg(type_reg)),
                    Some(Opnd::addr(*type_addr)),
                );
                func.insert_before(dispatch, br);
            }
        }

        func.unlink(load);
        func.instr_mut(load).opcode = OpCode::LdMethodFldPolyInlineMiss;
        self.complete_polymorphic_inlining(
            func,
            call,
            return_value,
            done,
            dispatch,
            Some(load),
            BailOutKind::OnFailedPolymorphicInlineTypeCheck,
        );

        func.data_mut(FuncId::TOP).has_inlinee = true;
        self.insert_statement_boundary(func, walk, next);
        self.insert_statement_boundary(func, walk, Some(load));
        log::debug!(
            "Inlined {} fixed targets polymorphically into {} at call site {}",
            plan.groups.len(),
            walk.info(func).display_name(),
            profile_id
        );
        Ok(true)
    }

    /// Dispatch on the target's function info.
    pub(super) fn inline_polymorphic(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        profile_id: ProfileId,
    ) -> JitResult<bool> {
        let Some(variants) = self.polymorphic_variants(func, walk, call, profile_id) else {
            return Ok(false);
        };
        let next = func.next(call);
        let owner = func.instr(call).func;
        let target = guards::call_target_sym(func, call);

        let return_value = func.unlink_dst(call);
        guards::insert_js_function_check(func, call, call, BailOutKind::OnPolymorphicInlineFunction);
        func.move_args(call, true);

        let info_offset = func.script_context().layout.function_info_offset;
        let done = func.new_label(owner, false);
        let dispatch = func.new_label(owner, false);
        func.insert_before(call, dispatch);
        for variant in &variants {
            let label = func.new_label(owner, false);
            func.insert_before(call, label);
            self.insert_one_inlinee(func, walk, call, &return_value, Opnd::Reg(target), variant, done, false, profile_id)?;
            let br = func.new_branch(
                OpCode::BrAddr,
                owner,
                label,
                Some(Opnd::Indir {
                    base: target,
                    offset: info_offset,
                }),
                Some(Opnd::addr(variant.function_info_addr)),
            );
            func.insert_before(dispatch, br);
        }

        self.complete_polymorphic_inlining(
            func,
            call,
            return_value,
            done,
            dispatch,
            None,
            BailOutKind::OnPolymorphicInlineFunction,
        );

        func.data_mut(FuncId::TOP).has_inlinee = true;
        self.insert_statement_boundary(func, walk, next);
        log::debug!(
            "Inlined {} targets polymorphically into {} at call site {}",
            variants.len(),
            walk.info(func).display_name(),
            profile_id
        );
        Ok(true)
    }

    /// Whether one target of a polymorphic site passes the heuristics.
    fn accept_variant(&mut self, func: &Func, walk: &Walk<'_>, info: &FunctionJitTimeInfo, profile_id: ProfileId) -> bool {
        let inliner_info = walk.info(func);
        let top = func.data(FuncId::TOP).jit_info.clone();
        let candidate = InliningCandidate {
            callee: info,
            caller: &inliner_info,
            top: &top,
            call_site: profile_id,
            is_ctor: false,
            is_fixed_method_call: false,
            in_loop: walk.ctx.in_loop != 0,
            outside_loops: self.inlining_outside_loops(func, walk),
            recursive_depth: walk.ctx.recursive_depth,
            constant_args: 0,
            inlined_so_far: walk.inlined_count,
        };
        self.stats.candidates_considered += 1;
        match self.heuristics.decide(&candidate) {
            Ok(()) => true,
            Err(rejection) => {
                log::debug!(
                    "Skip inline: polymorphic target {} at call site {}: {}",
                    info.display_name(),
                    profile_id,
                    rejection
                );
                self.stats.record_rejection(&rejection);
                false
            }
        }
    }

    /// Emit one dispatch target in front of `call`: an inlined copy of
    /// `info`, or a plain call when the target is not worth inlining.
    #[allow(clippy::too_many_arguments)]
    fn insert_one_inlinee(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        return_value: &Option<Opnd>,
        method: Opnd,
        info: &Arc<FunctionJitTimeInfo>,
        done: InstrId,
        safe_this: bool,
        profile_id: ProfileId,
    ) -> JitResult<()> {
        let owner = func.instr(call).func;
        let inline = self.accept_variant(func, walk, info, profile_id);
        let cloned = if inline {
            let start_dst = func.new_reg(owner);
            func.create(OpCode::InlineeStart, owner, Some(Opnd::Reg(start_dst)), Some(method.clone()), None)
        } else {
            let opcode = func.instr(call).opcode;
            func.create(opcode, owner, return_value.clone(), Some(method.clone()), None)
        };
        func.instr_mut(cloned).is_cloned = true;
        func.insert_before(call, cloned);
        func.tag_with_source_location(cloned, call);
        clone_call_sequence(func, call, cloned);

        if !inline {
            let br = func.new_branch(OpCode::Br, owner, done, None, None);
            func.insert_before(call, br);
            return Ok(());
        }

        let inlinee = func.new_inlinee(owner, info.clone());
        func.data_mut(inlinee).call_site_id = profile_id;
        let site = InlineSite {
            inlinee,
            info: info.clone(),
            original_target: None,
            return_value: None,
            checks_before: cloned,
            safe_this,
            is_apply_target: false,
            next: None,
        };
        self.build_ir_for_inlinee(func, walk, cloned, &site)?;

        let formal_count = u32::from(info.body.as_ref().map_or(0, |body| body.in_params_count));
        let slot_limit = u32::from(self.heuristics.config().max_inlinee_arg_slot);
        let actuals = self.map_actuals(func, walk, cloned, Some(inlinee), slot_limit, profile_id);
        let actual_count = actuals.actual_count;
        assert!(actual_count > 0, "polymorphic call {call} passes no `this`");
        func.data_mut(inlinee).actual_count = actual_count;
        let map = FormalMap {
            actuals: &actuals,
            formal_count,
            return_value: return_value.clone(),
            func_opnd: Some(method),
            caller_this: walk.sym_this,
            safe_this,
        };
        self.map_formals(func, inlinee, map);

        func.instr_mut(cloned).func = inlinee;
        self.setup_inlinee_frame(func, walk, inlinee, cloned, actual_count);

        let end = func.create(
            OpCode::InlineeEnd,
            inlinee,
            None,
            Some(Opnd::IntConst(i64::from(actual_count + INLINEE_META_ARGS))),
            func.instr(cloned).dst().cloned(),
        );
        if let Some((_, last)) = func.body_range(inlinee) {
            func.tag_with_source_location(end, last);
        }
        func.append(inlinee, end);
        let br = func.new_branch(OpCode::Br, inlinee, done, None, None);
        func.append(inlinee, br);
        if let Some((first, last)) = func.body_range(inlinee) {
            func.insert_range_after(cloned, first, last);
        }
        func.free_sentinels(inlinee);
        func.data_mut(walk.func).has_inlinee = true;
        Ok(())
    }

    /// Emit the shared bailout path and drop the original call.
    #[allow(clippy::too_many_arguments)]
    fn complete_polymorphic_inlining(
        &mut self,
        func: &mut Func,
        call: InstrId,
        return_value: Option<Opnd>,
        done: InstrId,
        dispatch: InstrId,
        reissued_load: Option<InstrId>,
        kind: BailOutKind,
    ) {
        let owner = func.instr(call).func;
        let helper = func.new_label(owner, true);
        func.insert_before(call, helper);
        let to_helper = func.new_branch(OpCode::Br, owner, helper, None, None);
        func.insert_before(dispatch, to_helper);

        if let Some(load) = reissued_load {
            func.insert_before(call, load);
        }

        let bail = func.new_instr(OpCode::BailOnNotPolymorphicInlinee, owner);
        let record = func.new_bailout_record(kind, call);
        func.set_bailout(bail, kind, record);
        func.insert_before(call, bail);
        func.tag_with_source_location(bail, call);

        let mut actual_count: u32 = 0;
        for arg in func.iterate_arg_instrs(call) {
            let arg_use = func.create(OpCode::BytecodeArgOutUse, owner, None, func.instr(arg).src1.clone(), None);
            func.insert_before(call, arg_use);
            func.tag_with_source_location(arg_use, call);
            actual_count += 1;
            func.remove(arg);
        }
        if let Some(target) = func.instr(call).src1.as_ref().and_then(Opnd::as_reg) {
            let uses = func.new_byte_code_uses(owner, vec![target]);
            func.insert_before(call, uses);
            func.tag_with_source_location(uses, call);
        }

        let end_call = func.create(
            OpCode::EndCallForPolymorphicInlinee,
            owner,
            return_value,
            Some(Opnd::IntConst(i64::from(actual_count + INLINEE_META_ARGS))),
            None,
        );
        func.insert_before(call, end_call);
        func.tag_with_source_location(end_call, call);
        func.insert_before(call, done);
        func.remove(call);
        self.stats.polymorphic_sites_inlined += 1;
    }
}

/// Copy the argument chain of `call` in front of `cloned`. The copies read
/// the captured values, so every dispatch target sees the same arguments.
fn clone_call_sequence(func: &mut Func, call: InstrId, cloned: InstrId) {
    let owner = func.instr(call).func;
    let mut previous_clone = cloned;
    let mut last_original = None;
    for arg in func.iterate_arg_instrs(call) {
        let slot = func.arg_slot_of(arg).unwrap_or(0);
        let sym = func.new_arg_slot_sym(slot, owner);
        func.sym_mut(sym).is_arg_captured = true;
        let opcode = func.instr(arg).opcode;
        let value = func.instr(arg).src1.clone();
        let clone = func.create(opcode, owner, Some(Opnd::Sym(sym)), value, None);
        func.instr_mut(previous_clone).src2 = Some(Opnd::Sym(sym));
        func.insert_before(previous_clone, clone);
        func.tag_with_source_location(clone, call);
        previous_clone = clone;
        last_original = Some(arg);
    }
    let start_link = match last_original {
        Some(arg) => func.instr(arg).src2.clone(),
        None => func.instr(call).src2.clone(),
    };
    func.instr_mut(previous_clone).src2 = start_link;
}
