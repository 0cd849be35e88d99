//! Built-in functions replaced by inline opcodes or direct helper calls.
//!
//! A type-specialized built-in such as `Math.floor(x)` becomes:
//!
//! ```text
//!                    BailOnNotBuiltIn f, MathFloor       [OnInlineFunction]
//!                    InlineBuiltInStart f, a2
//! a1 = ArgOutInlineBuiltIn c1, s
//! a2 = ArgOutInlineBuiltIn c2, a1
//! t  = InlineMathFloor c2                                [OnFloor]
//!      ByteCodeUses f
//! d  = Ld t
//!      InlineBuiltInEnd 2, a2
//! ```
//!
//! where `c1` and `c2` capture the original argument values. Built-ins
//! without an inline opcode call a runtime helper with the function object
//! passed as a specialized argument instead.

use super::driver::Walk;
use super::fixed_method::FixedMethodRequest;
use super::{guards, Inliner};
use crate::bailout::BailOutKind;
use crate::ir::{Func, FuncId, HelperMethod, InstrId, OpCode, Opnd, SymId};
use core_types::{BuiltInFlags, BuiltinFunction, FunctionJitTimeInfo, JitResult, ProfileId};
use std::sync::Arc;

/// The opcode a call to `built_in` can be inlined as.
///
/// Built-ins implemented by a runtime helper map to `CallDirect`.
pub(super) fn inline_candidate_opcode(built_in: BuiltinFunction) -> Option<OpCode> {
    use BuiltinFunction as B;
    let opcode = match built_in {
        B::MathAbs => OpCode::InlineMathAbs,
        B::MathSqrt => OpCode::InlineMathSqrt,
        B::MathFloor => OpCode::InlineMathFloor,
        B::MathCeil => OpCode::InlineMathCeil,
        B::MathRound => OpCode::InlineMathRound,
        B::MathMin => OpCode::InlineMathMin,
        B::MathMax => OpCode::InlineMathMax,
        B::MathImul => OpCode::InlineMathImul,
        B::MathClz32 => OpCode::InlineMathClz32,
        B::MathPow => OpCode::InlineMathPow,
        B::ArrayPush => OpCode::InlineArrayPush,
        B::ArrayPop => OpCode::InlineArrayPop,
        B::StringCharAt => OpCode::InlineStringCharAt,
        B::StringCharCodeAt => OpCode::InlineStringCharCodeAt,
        B::FunctionApply => OpCode::InlineFunctionApply,
        B::FunctionCall => OpCode::InlineFunctionCall,
        B::ArrayJoin | B::ArrayIndexOf | B::StringFromCharCode => OpCode::CallDirect,
        B::ObjectCtor | B::ArrayCtor => return None,
    };
    Some(opcode)
}

fn direct_call_helper(built_in: BuiltinFunction) -> Option<HelperMethod> {
    match built_in {
        BuiltinFunction::ArrayJoin => Some(HelperMethod::ArrayJoin),
        BuiltinFunction::ArrayIndexOf => Some(HelperMethod::ArrayIndexOf),
        BuiltinFunction::StringFromCharCode => Some(HelperMethod::StringFromCharCode),
        _ => None,
    }
}

fn is_rounding(opcode: OpCode) -> bool {
    matches!(
        opcode,
        OpCode::InlineMathFloor | OpCode::InlineMathCeil | OpCode::InlineMathRound
    )
}

/// Bracket `call` with `InlineBuiltInStart` / `InlineBuiltInEnd`.
///
/// Both tags reference the call's argument chain so the arguments stay
/// live across the inlined form. Returns `(start, end)`.
pub(super) fn insert_built_in_start_end_tags(
    func: &mut Func,
    call: InstrId,
    actual_count: u32,
    built_in: BuiltinFunction,
) -> (InstrId, InstrId) {
    let owner = func.instr(call).func;
    let target = func.instr(call).src1.clone();
    let link = func.instr(call).src2.clone();

    let start = func.create(OpCode::InlineBuiltInStart, owner, None, target, link.clone());
    func.instr_mut(start).built_in = Some(built_in);
    func.insert_before(call, start);
    func.tag_with_source_location(start, call);

    let end = func.create(
        OpCode::InlineBuiltInEnd,
        owner,
        None,
        Some(Opnd::IntConst(i64::from(actual_count))),
        link,
    );
    func.insert_after(call, end);
    func.tag_with_source_location(end, call);
    (start, end)
}

impl Inliner<'_> {
    fn built_in_is_supported(&self, func: &Func, call: InstrId, built_in: BuiltinFunction, opcode: OpCode) -> bool {
        let flags = built_in.flags();
        let top_body = func.data(FuncId::TOP).jit_info.body.clone();
        if is_rounding(opcode) && (!self.flags.sse4_1 || top_body.as_ref().is_some_and(|b| b.floor_inlining_disabled)) {
            log::debug!("Skip inline: {} needs SSE4.1 rounding", built_in.name());
            return false;
        }
        let last_slot = func
            .instr(call)
            .src2_sym()
            .and_then(|sym| func.sym(sym).arg_slot())
            .unwrap_or(0);
        if last_slot > self.heuristics.config().max_inlinee_arg_slot {
            log::debug!("Skip inline: {} called with {} arguments", built_in.name(), last_slot);
            return false;
        }
        if flags.contains(BuiltInFlags::ALL_TO_FLOAT) && !self.flags.float_type_spec {
            log::debug!("Skip inline: {} needs float type specialization", built_in.name());
            return false;
        }
        if flags.contains(BuiltInFlags::DST_TO_FLOAT)
            && !built_in.can_float_preference()
            && opcode != OpCode::InlineArrayPop
        {
            log::debug!("Skip inline: {} cannot produce a float", built_in.name());
            return false;
        }
        let int_flags = BuiltInFlags::DST_TO_INT
            .union(BuiltInFlags::SRC1_TO_INT)
            .union(BuiltInFlags::SRC2_TO_INT);
        if flags.intersects(int_flags) && !self.flags.aggressive_int_type_spec {
            log::debug!("Skip inline: {} needs int type specialization", built_in.name());
            return false;
        }
        if matches!(opcode, OpCode::InlineMathImul | OpCode::InlineMathClz32) && !self.flags.lossy_int_type_spec {
            log::debug!("Skip inline: {} needs lossy int type specialization", built_in.name());
            return false;
        }
        if opcode == OpCode::InlineFunctionApply {
            let caller = func.instr(call).func;
            if !func.data(caller).has_stack_args || top_body.as_ref().is_some_and(|b| b.inline_apply_disabled) {
                log::debug!("Skip inline: apply in {} without stack arguments", caller);
                return false;
            }
        }
        if !flags.contains(BuiltInFlags::IGNORE_DST) && func.instr(call).dst().is_none() && opcode != OpCode::InlineArrayPop {
            log::debug!("Skip inline: result of {} is unused", built_in.name());
            return false;
        }
        true
    }

    /// Replace a monomorphic call to a built-in with its inline form.
    ///
    /// Returns `false`, leaving the IR untouched, when the built-in cannot be
    /// inlined here; `.apply` and `.call` are handed to their own rewrites.
    pub(super) fn inline_built_in(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        inlinee: &Arc<FunctionJitTimeInfo>,
        opcode: OpCode,
        profile_id: ProfileId,
    ) -> JitResult<bool> {
        let Some(built_in) = inlinee.built_in else {
            return Ok(false);
        };
        if !self.built_in_is_supported(func, call, built_in, opcode) {
            return Ok(false);
        }
        let Some(original_target) = func.instr(call).src1.as_ref().and_then(Opnd::as_reg) else {
            return Ok(false);
        };
        let Some(link) = func.instr(call).src2_sym() else {
            return Ok(false);
        };
        let actual_count = func.sym(link).arg_slot().unwrap_or(0);
        if actual_count == 0 {
            return Ok(false);
        }

        let flags = built_in.flags();
        let uses_this = flags.contains(BuiltInFlags::USE_SRC0);
        let arg_count = if uses_this { actual_count } else { actual_count - 1 };
        let required = built_in.arg_count();
        if flags.contains(BuiltInFlags::VARIABLE_ARGS) {
            if arg_count > required {
                log::debug!(
                    "Skip inline: {} takes at most {} arguments, got {}",
                    built_in.name(),
                    required,
                    arg_count
                );
                return Ok(false);
            }
        } else if arg_count != required {
            log::debug!(
                "Skip inline: {} takes {} arguments, got {}",
                built_in.name(),
                required,
                arg_count
            );
            return Ok(false);
        }

        match opcode {
            OpCode::InlineFunctionApply => {
                let args_count = if uses_this { arg_count - 1 } else { arg_count };
                return self.inline_apply(func, walk, call, inlinee, profile_id, args_count);
            }
            OpCode::InlineFunctionCall => return self.inline_call(func, walk, call, inlinee, profile_id),
            _ => {}
        }

        if self
            .try_optimize_call_with_fixed_method(func, call, &FixedMethodRequest::built_in(inlinee))
            .is_none()
        {
            guards::insert_built_in_check(func, call, built_in);
        }

        if let Some(helper) = direct_call_helper(built_in) {
            self.rewrite_as_direct_call(func, call, helper);
            guards::insert_byte_code_uses(func, original_target, call);
        } else {
            let (start, end) = insert_built_in_start_end_tags(func, call, u32::from(actual_count), built_in);
            if opcode == OpCode::InlineArrayPop {
                // The pop itself records the call; the end tag must not.
                func.instr_mut(end).opcode = OpCode::InlineNonTrackingBuiltInEnd;
            }
            guards::insert_byte_code_uses(func, original_target, call);
            if flags.requires_type_spec() {
                self.specialize_built_in_call(func, call, (start, end), original_target, opcode, arg_count);
                let Some(start_call) = func.start_call_of(end) else {
                    panic!("inlined built-in {call} has no StartCall");
                };
                assert_eq!(
                    func.start_call_count(start_call),
                    u32::from(actual_count),
                    "argument count of {call} disagrees with its StartCall"
                );
                if let Some(sc) = func.instr(start_call).dst_sym() {
                    func.sym_mut(sc).is_inlined_arg_slot = true;
                }
            }
        }

        self.note_built_in_inlined(func, walk, built_in, profile_id);
        Ok(true)
    }

    pub(super) fn note_built_in_inlined(
        &mut self,
        func: &Func,
        walk: &Walk<'_>,
        built_in: BuiltinFunction,
        profile_id: ProfileId,
    ) {
        self.stats.built_ins_inlined += 1;
        log::debug!(
            "Inlined built-in {} into {} at call site {}",
            built_in.name(),
            walk.info(func).display_name(),
            profile_id
        );
    }

    /// `d = CallI f, args` => `d = CallDirect helper, ArgOutInlineSpecialized(f, args)`.
    fn rewrite_as_direct_call(&mut self, func: &mut Func, call: InstrId, helper: HelperMethod) {
        func.move_args(call, true);
        let owner = func.instr(call).func;
        let slot = func.new_arg_slot_sym(1, owner);
        let function = func.unlink_src1(call);
        let link = func.unlink_src2(call);
        let specialized = func.create(OpCode::ArgOutInlineSpecialized, owner, Some(Opnd::Sym(slot)), function, link);
        func.insert_before(call, specialized);
        func.tag_with_source_location(specialized, call);

        let instr = func.instr_mut(call);
        instr.opcode = OpCode::CallDirect;
        instr.src1 = Some(Opnd::HelperCall(helper));
        instr.src2 = Some(Opnd::Sym(slot));
    }

    /// Turn the tagged call into the inline opcode reading captured arguments.
    fn specialize_built_in_call(
        &mut self,
        func: &mut Func,
        call: InstrId,
        (start, end): (InstrId, InstrId),
        original_target: SymId,
        opcode: OpCode,
        arg_count: u16,
    ) {
        let owner = func.instr(call).func;

        let result = if opcode != OpCode::InlineArrayPop && func.instr(call).dst().is_some() {
            let dst = func.unlink_dst(call);
            let tmp = func.new_reg(owner);
            func.set_dst(call, Some(Opnd::Reg(tmp)));
            Some((dst, tmp))
        } else {
            None
        };

        let uses_at = if opcode == OpCode::InlineArrayPop { call } else { end };
        guards::insert_byte_code_uses(func, original_target, uses_at);

        if let Some((dst, tmp)) = result {
            let ld = func.create(OpCode::Ld, owner, dst, Some(Opnd::Reg(tmp)), None);
            func.insert_before(end, ld);
            func.tag_with_source_location(ld, call);
        }

        func.unlink_src1(call);
        func.unlink_src2(call);
        func.instr_mut(call).opcode = opcode;

        let rounding = is_rounding(opcode);
        let mut uses = Vec::new();
        let mut arg_index = arg_count;
        let mut insert_before = start;
        for arg in func.iterate_arg_instrs(end) {
            if let Some(slot) = func.instr(arg).dst_sym() {
                func.sym_mut(slot).is_inlined_arg_slot = true;
            }
            if rounding {
                if let Some(src) = func.instr(arg).src1.as_ref().and_then(Opnd::as_reg) {
                    if func.const_value(src).is_none() {
                        uses.push(src);
                    }
                }
            }

            func.instr_mut(arg).opcode = OpCode::ArgOutInlineBuiltIn;
            func.generate_bytecode_arg_out_capture(arg);
            let value = func.instr(arg).src1.clone();
            match arg_index {
                2 => func.instr_mut(call).src2 = value,
                1 => func.instr_mut(call).src1 = value,
                _ => {}
            }
            arg_index = arg_index.saturating_sub(1);

            func.move_before(insert_before, arg);
            insert_before = arg;
        }

        if matches!(opcode, OpCode::InlineMathImul | OpCode::InlineMathClz32) {
            self.truncate_int_operands(func, call, opcode);
        }

        if rounding {
            if !uses.is_empty() {
                let byte_code_uses = func.new_byte_code_uses(owner, uses);
                func.insert_before(end, byte_code_uses);
                func.tag_with_source_location(byte_code_uses, call);
            }
            let record = func.new_bailout_record(BailOutKind::OnFloor, call);
            func.set_bailout(call, BailOutKind::OnFloor, record);
        }
    }

    /// `s4 = Or src1, 0` (and `s5 = Or src2, 0`) so the operands are int32.
    fn truncate_int_operands(&mut self, func: &mut Func, call: InstrId, opcode: OpCode) {
        let owner = func.instr(call).func;
        let src1 = func.unlink_src1(call);
        let s4 = func.new_reg(owner);
        let or = func.create(OpCode::Or, owner, Some(Opnd::Reg(s4)), src1.clone(), Some(Opnd::IntConst(0)));
        func.insert_before(call, or);
        func.tag_with_source_location(or, call);
        func.instr_mut(call).src1 = Some(Opnd::Reg(s4));

        if opcode != OpCode::InlineMathImul {
            return;
        }
        if func.instr(call).src2 == src1 {
            func.instr_mut(call).src2 = Some(Opnd::Reg(s4));
        } else {
            let src2 = func.unlink_src2(call);
            let s5 = func.new_reg(owner);
            let or = func.create(OpCode::Or, owner, Some(Opnd::Reg(s5)), src2, Some(Opnd::IntConst(0)));
            func.insert_before(call, or);
            func.tag_with_source_location(or, call);
            func.instr_mut(call).src2 = Some(Opnd::Reg(s5));
        }
    }
}
