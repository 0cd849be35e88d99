//! `Function.prototype.apply` and `Function.prototype.call`.
//!
//! When the profile knows the function `.apply` / `.call` is invoked on and
//! both loads have fixed values, that target is inlined directly:
//!
//! ```text
//! t = LdFldForCallApplyTarget o.foo       CheckFixedFld o.foo
//! a = LdMethodFld t.apply                 t = Ld <foo>
//! s = StartCall 3                         CheckFixedFld t.apply
//! ArgOut t, s                       =>    s = StartCall 2
//! ArgOut this, ..                         ArgOut this, s
//! ArgOut arguments, ..                    BailOnNotStackArgs arguments
//! d = CallI a, ..                         ArgOutFromStackArgs arguments, ..
//!                                         <foo inlined>
//! ```
//!
//! Otherwise the built-in itself is expanded into a direct call of the
//! target (`.call`, `.apply(this)`), a dynamic call spreading stack
//! arguments (`.apply(this, arguments)`), or a helper (`Math.max.apply`).

use super::builtins::insert_built_in_start_end_tags;
use super::driver::Walk;
use super::fixed_method::FixedMethodRequest;
use super::splice::InlineSite;
use super::{guards, Inliner};
use crate::bailout::BailOutKind;
use crate::ir::{Func, FuncId, HelperMethod, InstrId, OpCode, Opnd, SymId, SymKind};
use core_types::{BuiltinFunction, FunctionJitTimeInfo, JitResult, ProfileId};
use std::sync::Arc;

/// Loads feeding `target.apply(..)` / `target.call(..)`.
struct ApplyCallTarget {
    /// `LdMethodFld target.apply`
    built_in_load: InstrId,
    /// `LdFldForCallApplyTarget o.target`
    target_load: InstrId,
    target: SymId,
    info: Option<Arc<FunctionJitTimeInfo>>,
}

enum TargetInlining {
    Inlined,
    /// Not inlined; the target's profile record when one was found
    Declined(Option<Arc<FunctionJitTimeInfo>>),
}

/// Arguments of an `.apply` / `.call` after conversion to built-in form.
struct BuiltInArgs {
    implicit_this: InstrId,
    explicit_this: Option<InstrId>,
    third: Option<InstrId>,
    count: u32,
}

fn apply_call_target(func: &Func, walk: &Walk<'_>, call: InstrId) -> Option<ApplyCallTarget> {
    let built_in_sym = func.instr(call).src1.as_ref()?.as_reg()?;
    let built_in_load = func.sym(built_in_sym).single_def()?;
    let target_load = func.prev(built_in_load)?;
    let load = func.instr(target_load);
    if load.opcode != OpCode::LdFldForCallApplyTarget || load.from_accessor {
        return None;
    }
    let cache_index = load.src1.as_ref()?.as_property()?.cache_index;
    let target = load.dst_sym()?;
    Some(ApplyCallTarget {
        built_in_load,
        target_load,
        target,
        info: walk.info(func).ldfld_inlinee(cache_index).cloned(),
    })
}

/// The `LdHeapArguments` defining the value passed by `arg`, if any.
fn arguments_object_def(func: &Func, arg: InstrId) -> Option<InstrId> {
    let src = func.instr(arg).src1.as_ref()?.as_reg()?;
    let def = func.sym(src).single_def()?;
    matches!(
        func.instr(def).opcode,
        OpCode::LdHeapArguments | OpCode::LdLetHeapArguments
    )
    .then_some(def)
}

/// The value an argument held before its byte-code capture.
fn captured_value(func: &Func, arg: InstrId) -> Option<SymId> {
    let capture = func.arg_capture_sym(arg)?;
    let def = func.sym(capture).single_def()?;
    func.instr(def).src1.as_ref()?.as_reg()
}

/// The register a capture chain starting at `sym` was copied from.
fn uncaptured(func: &Func, mut sym: SymId) -> SymId {
    while let Some(def) = func.sym(sym).single_def() {
        let instr = func.instr(def);
        if instr.opcode != OpCode::BytecodeArgOutCapture {
            break;
        }
        match instr.src1.as_ref().and_then(Opnd::as_reg) {
            Some(src) => sym = src,
            None => break,
        }
    }
    sym
}

fn decrement_arg_slot(func: &mut Func, arg: InstrId) {
    let Some(slot_sym) = func.instr(arg).dst_sym() else {
        return;
    };
    let sym = func.sym_mut(slot_sym);
    if let SymKind::ArgSlot(slot) = sym.kind {
        sym.kind = SymKind::ArgSlot(slot - 1);
    }
}

/// Convert every argument of `call` to `ArgOutInlineBuiltIn`, capture its
/// value and move it next to the call.
fn convert_to_built_in_args(func: &mut Func, call: InstrId) -> BuiltInArgs {
    let mut implicit_this = None;
    let mut explicit_this = None;
    let mut third = None;
    let mut count = 0;
    let mut insert_before = call;
    for arg in func.iterate_arg_instrs(call) {
        count += 1;
        third = explicit_this;
        explicit_this = implicit_this;
        implicit_this = Some(arg);

        if let Some(slot) = func.instr(arg).dst_sym() {
            func.sym_mut(slot).is_inlined_arg_slot = true;
        }
        func.instr_mut(arg).opcode = OpCode::ArgOutInlineBuiltIn;
        func.generate_bytecode_arg_out_capture(arg);
        func.move_before(insert_before, arg);
        insert_before = arg;
    }
    if let Some(sc) = func.start_call_of(call).and_then(|start| func.instr(start).dst_sym()) {
        func.sym_mut(sc).is_inlined_arg_slot = true;
    }
    let Some(implicit_this) = implicit_this else {
        panic!("{} at {call} passes no function", func.instr(call).opcode);
    };
    BuiltInArgs {
        implicit_this,
        explicit_this,
        third,
        count,
    }
}

/// Unlink the function argument from the chain and shrink the `StartCall`.
fn drop_function_argument(func: &mut Func, start: InstrId, implicit_this: InstrId, explicit_this: InstrId) {
    let sc = func.instr(start).dst().cloned();
    func.instr_mut(explicit_this).src2 = sc;
    func.remove(implicit_this);
    let count = func.start_call_count(start);
    // Interpreter count, for bailouts.
    func.instr_mut(start).src2 = Some(Opnd::IntConst(i64::from(count)));
    func.set_start_call_count(start, count.saturating_sub(1));
}

fn insert_start_call(func: &mut Func, call: InstrId, count: u32) -> SymId {
    let owner = func.instr(call).func;
    let sc = func.new_reg(owner);
    let start = func.create(
        OpCode::StartCall,
        owner,
        Some(Opnd::Reg(sc)),
        Some(Opnd::IntConst(i64::from(count))),
        None,
    );
    func.insert_before(call, start);
    func.tag_with_source_location(start, call);
    sc
}

fn insert_arg_out(
    func: &mut Func,
    call: InstrId,
    opcode: OpCode,
    slot: u16,
    value: Option<Opnd>,
    link: Opnd,
) -> SymId {
    let owner = func.instr(call).func;
    let slot_sym = func.new_arg_slot_sym(slot, owner);
    let arg = func.create(opcode, owner, Some(Opnd::Sym(slot_sym)), value, Some(link));
    func.insert_before(call, arg);
    func.tag_with_source_location(arg, call);
    slot_sym
}

impl Inliner<'_> {
    /// `f.apply(this[, args])` at a monomorphic call site.
    ///
    /// `args_count` counts the arguments after the function itself.
    pub(super) fn inline_apply(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        apply_info: &Arc<FunctionJitTimeInfo>,
        profile_id: ProfileId,
        args_count: u16,
    ) -> JitResult<bool> {
        let array_arg = if args_count == 2 {
            func.instr(call)
                .src2_sym()
                .and_then(|sym| func.sym(sym).single_def())
        } else {
            None
        };
        let is_arguments = array_arg.is_some_and(|arg| arguments_object_def(func, arg).is_some());

        let mut target_info = None;
        if self.flags.inline_apply_target {
            match self.inline_apply_target(func, walk, call, apply_info, profile_id, is_arguments, args_count)? {
                TargetInlining::Inlined => return Ok(true),
                TargetInlining::Declined(info) => target_info = info,
            }
        }

        match (args_count, array_arg) {
            (0, _) => {
                log::debug!("Skip inline: apply at {} passes nothing", call);
                Ok(false)
            }
            (1, _) => {
                if !self.flags.inline_apply_without_array_arg {
                    return Ok(false);
                }
                self.inline_apply_without_array_argument(func, call, apply_info, target_info.as_deref());
                self.note_built_in_inlined(func, walk, BuiltinFunction::FunctionApply, profile_id);
                Ok(true)
            }
            (_, Some(arguments)) if is_arguments => {
                self.inline_apply_with_arguments_object(func, call, arguments, apply_info);
                self.note_built_in_inlined(func, walk, BuiltinFunction::FunctionApply, profile_id);
                Ok(true)
            }
            _ => {
                let helper = target_info
                    .filter(|info| !info.has_body())
                    .and_then(|info| match info.built_in {
                        Some(BuiltinFunction::MathMax) => Some(HelperMethod::MaxInAnArray),
                        Some(BuiltinFunction::MathMin) => Some(HelperMethod::MinInAnArray),
                        _ => None,
                    });
                let Some(helper) = helper else {
                    log::debug!("Skip inline: apply at {} with an array of unknown origin", call);
                    return Ok(false);
                };
                self.inline_apply_with_array(func, call, apply_info, helper);
                self.note_built_in_inlined(func, walk, BuiltinFunction::FunctionApply, profile_id);
                Ok(true)
            }
        }
    }

    /// `f.call(this, args..)` at a monomorphic call site.
    pub(super) fn inline_call(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        call_info: &Arc<FunctionJitTimeInfo>,
        profile_id: ProfileId,
    ) -> JitResult<bool> {
        let top_params = func
            .data(FuncId::TOP)
            .jit_info
            .body
            .as_ref()
            .map_or(0, |body| body.in_params_count);
        if !self.flags.inline_call || top_params == 0 {
            return Ok(false);
        }
        let Some(last_arg) = func
            .instr(call)
            .src2_sym()
            .and_then(|sym| func.sym(sym).single_def())
        else {
            return Ok(false);
        };
        if !matches!(func.instr(last_arg).src2, Some(Opnd::Sym(_))) {
            log::debug!("Skip inline: call at {} passes only the function", call);
            return Ok(false);
        }

        if self.flags.inline_call_target {
            if let TargetInlining::Inlined = self.inline_call_target(func, walk, call, call_info, profile_id)? {
                return Ok(true);
            }
        }

        let args = convert_to_built_in_args(func, call);
        let actual_count = args.count;
        let Some(mut org_link) = func.instr(call).src2_sym() else {
            panic!("call at {call} lost its arguments");
        };
        self.fixed_method_or_guard(func, call, call_info);
        insert_built_in_start_end_tags(func, call, actual_count, BuiltinFunction::FunctionCall);

        // The function becomes the callee and every other argument moves down a slot.
        let sc = insert_start_call(func, call, actual_count - 1);
        let owner = func.instr(call).func;
        let function = func.instr(args.implicit_this).src1.clone();
        func.unlink_src2(call);
        let instr = func.instr_mut(call);
        instr.src1 = function;
        instr.opcode = OpCode::CallI;

        let mut insert_before = call;
        for slot in (1..actual_count).rev() {
            let Some(org_arg) = func.sym(org_link).single_def() else {
                panic!("argument slot {org_link} of {call} is not single-def");
            };
            let value = func.instr(org_arg).src1.clone();
            let Some(next_link) = func.instr(org_arg).src2_sym() else {
                panic!("argument {org_arg} of {call} has no link");
            };
            org_link = next_link;

            let tmp = func.new_reg(owner);
            let ld = func.create(OpCode::Ld, owner, Some(Opnd::Reg(tmp)), value, None);
            func.insert_before(org_arg, ld);
            func.tag_with_source_location(ld, org_arg);

            let slot_sym = func.new_arg_slot_sym(slot as u16, owner);
            let arg = func.create(OpCode::ArgOut, owner, Some(Opnd::Sym(slot_sym)), Some(Opnd::Reg(tmp)), None);
            func.instr_mut(insert_before).src2 = Some(Opnd::Sym(slot_sym));
            func.insert_before(insert_before, arg);
            func.tag_with_source_location(arg, call);
            insert_before = arg;
        }
        func.instr_mut(insert_before).src2 = Some(Opnd::Reg(sc));
        assert_eq!(
            func.sym(org_link).single_def(),
            Some(args.implicit_this),
            "argument chain of {call} does not end at the function"
        );

        self.note_built_in_inlined(func, walk, BuiltinFunction::FunctionCall, profile_id);
        Ok(true)
    }

    fn skip_target_inlining(&self, func: &Func, walk: &Walk<'_>, info: Option<&FunctionJitTimeInfo>) -> bool {
        if !self.flags.fixed_methods {
            return true;
        }
        let Some(info) = info else {
            return true;
        };
        if !info.has_body() {
            log::debug!("Skip inline: target {} is a built-in", info.display_name());
            return true;
        }
        !walk.info(func).is_ldfld_inlinee_present()
    }

    #[allow(clippy::too_many_arguments)]
    fn inline_apply_target(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        apply_info: &Arc<FunctionJitTimeInfo>,
        profile_id: ProfileId,
        is_arguments: bool,
        args_count: u16,
    ) -> JitResult<TargetInlining> {
        if walk.ctx.apply_target {
            log::debug!("Skip inline: apply target inside an inlined apply target");
            return Ok(TargetInlining::Declined(None));
        }
        let Some(target) = apply_call_target(func, walk, call) else {
            return Ok(TargetInlining::Declined(None));
        };
        if (!is_arguments && args_count == 2) || self.skip_target_inlining(func, walk, target.info.as_deref()) {
            return Ok(TargetInlining::Declined(target.info));
        }
        // Only an inlinee's arguments are known to live on the stack.
        if func.instr(call).func == FuncId::TOP {
            return Ok(TargetInlining::Declined(None));
        }
        let Some(info) = target.info.clone() else {
            return Ok(TargetInlining::Declined(None));
        };
        let original_target = guards::call_target_sym(func, call);
        let Some(mut safe_this) = self.fixed_methods_for_built_in_and_target(func, call, apply_info, &info, &target, true)
        else {
            return Ok(TargetInlining::Declined(None));
        };

        let args = func.iterate_arg_instrs(call);
        for arg in &args {
            func.generate_bytecode_arg_out_capture(*arg);
            // The function argument goes away.
            decrement_arg_slot(func, *arg);
        }
        let (implicit_this, explicit_this, arguments) = match args[..] {
            [explicit, implicit] => (implicit, explicit, None),
            [arguments, explicit, implicit] => (implicit, explicit, Some(arguments)),
            _ => panic!("apply at {call} has {} arguments", args.len()),
        };
        if walk.sym_this.is_none() || captured_value(func, explicit_this) != walk.sym_this {
            safe_this = false;
        }

        let Some(start) = func.start_call_of(call) else {
            panic!("apply at {call} has no StartCall");
        };
        let owner = func.instr(call).func;
        if let Some(arguments) = arguments {
            func.instr_mut(arguments).opcode = OpCode::ArgOutFromStackArgs;
            let value = func.instr(arguments).src1.clone();
            let bail = func.create(OpCode::BailOnNotStackArgs, owner, None, value, None);
            let record = func.new_bailout_record(BailOutKind::OnInlineFunction, call);
            func.set_bailout(bail, BailOutKind::OnInlineFunction, record);
            func.insert_before(arguments, bail);
            func.tag_with_source_location(bail, call);
        }

        let function = func.instr(implicit_this).src1.clone();
        let forwarded = arguments.and_then(|arg| func.instr(arg).src1.clone());
        let keep_alive = func.create(OpCode::BytecodeArgOutUse, owner, None, function, forwarded);
        func.insert_before(call, keep_alive);
        func.tag_with_source_location(keep_alive, call);

        drop_function_argument(func, start, implicit_this, explicit_this);
        self.inline_call_apply_target(func, walk, call, info, original_target, safe_this, true, profile_id)?;
        Ok(TargetInlining::Inlined)
    }

    fn inline_call_target(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        call_info: &Arc<FunctionJitTimeInfo>,
        profile_id: ProfileId,
    ) -> JitResult<TargetInlining> {
        let Some(target) = apply_call_target(func, walk, call) else {
            return Ok(TargetInlining::Declined(None));
        };
        if self.skip_target_inlining(func, walk, target.info.as_deref()) {
            return Ok(TargetInlining::Declined(target.info));
        }
        let Some(info) = target.info.clone() else {
            return Ok(TargetInlining::Declined(None));
        };
        let original_target = guards::call_target_sym(func, call);
        let Some(mut safe_this) = self.fixed_methods_for_built_in_and_target(func, call, call_info, &info, &target, false)
        else {
            return Ok(TargetInlining::Declined(None));
        };

        let args = func.iterate_arg_instrs(call);
        for arg in &args {
            func.generate_bytecode_arg_out_capture(*arg);
            decrement_arg_slot(func, *arg);
        }
        let [.., explicit_this, implicit_this] = args[..] else {
            panic!("call at {call} passes no `this`");
        };
        if walk.sym_this.is_none() || captured_value(func, explicit_this) != walk.sym_this {
            safe_this = false;
        }
        let Some(start) = func.start_call_of(call) else {
            panic!("call at {call} has no StartCall");
        };

        let owner = func.instr(call).func;
        let function = func.instr(implicit_this).src1.clone();
        let keep_alive = func.create(OpCode::BytecodeArgOutUse, owner, None, function, None);
        func.insert_before(call, keep_alive);
        func.tag_with_source_location(keep_alive, call);

        drop_function_argument(func, start, implicit_this, explicit_this);
        self.inline_call_apply_target(func, walk, call, info, original_target, safe_this, false, profile_id)?;
        Ok(TargetInlining::Inlined)
    }

    #[allow(clippy::too_many_arguments)]
    fn inline_call_apply_target(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        info: Arc<FunctionJitTimeInfo>,
        original_target: SymId,
        safe_this: bool,
        is_apply_target: bool,
        profile_id: ProfileId,
    ) -> JitResult<()> {
        let next = func.next(call);
        let return_value = func.unlink_dst(call);
        let inlinee = func.new_inlinee(walk.func, info.clone());
        func.data_mut(inlinee).call_site_id = profile_id;
        let site = InlineSite {
            inlinee,
            info: info.clone(),
            original_target: Some(original_target),
            return_value,
            checks_before: call,
            safe_this,
            is_apply_target,
            next,
        };
        self.inline_function_common(func, walk, call, site)?;
        self.stats.functions_inlined += 1;
        log::debug!(
            "Inlined {} target {} into {} at call site {}",
            if is_apply_target { "apply" } else { "call" },
            info.display_name(),
            walk.info(func).display_name(),
            profile_id
        );
        Ok(())
    }

    /// Prove both the built-in and its target fixed, then rewrite the call to
    /// call the target. Returns whether the target's `this` is known safe.
    fn fixed_methods_for_built_in_and_target(
        &mut self,
        func: &mut Func,
        call: InstrId,
        built_in_info: &FunctionJitTimeInfo,
        target_info: &FunctionJitTimeInfo,
        target: &ApplyCallTarget,
        is_apply: bool,
    ) -> Option<bool> {
        let original_opcode = func.instr(call).opcode;
        let built_in_sym = guards::call_target_sym(func, call);
        debug_assert_eq!(func.sym(built_in_sym).single_def(), Some(target.built_in_load));

        self.try_optimize_call_with_fixed_method(func, call, &FixedMethodRequest::built_in(built_in_info).check())?;
        func.instr_mut(call).src1 = Some(Opnd::Reg(target.target));
        let target_request = FixedMethodRequest::inlining(target_info, false);
        if self
            .try_optimize_call_with_fixed_method(func, call, &target_request.check())
            .is_none()
        {
            func.instr_mut(call).src1 = Some(Opnd::Reg(built_in_sym));
            return None;
        }

        let caller = func.instr(call).func;
        if is_apply {
            func.data_mut(caller).has_apply_target_inlining = true;
        }

        func.instr_mut(call).src1 = Some(Opnd::Reg(built_in_sym));
        let built_in_rewrite =
            self.try_optimize_call_with_fixed_method(func, call, &FixedMethodRequest::built_in(built_in_info));
        assert!(built_in_rewrite.is_some(), "fixed built-in at {call} vanished");

        let instr = func.instr_mut(call);
        instr.src1 = Some(Opnd::Reg(target.target));
        instr.opcode = original_opcode;
        let Some(rewrite) = self.try_optimize_call_with_fixed_method(func, call, &target_request) else {
            panic!("fixed target at {} vanished", target.target_load);
        };

        let owner = func.instr(call).func;
        let uses = func.new_byte_code_uses(owner, vec![built_in_sym, target.target]);
        func.insert_before(call, uses);
        func.tag_with_source_location(uses, call);
        Some(rewrite.safe_this)
    }

    /// Use the fixed function when its load proves it, else guard on the
    /// function info.
    fn fixed_method_or_guard(&mut self, func: &mut Func, call: InstrId, info: &FunctionJitTimeInfo) {
        let original_target = guards::call_target_sym(func, call);
        if self
            .try_optimize_call_with_fixed_method(func, call, &FixedMethodRequest::built_in(info))
            .is_some()
        {
            guards::insert_byte_code_uses(func, original_target, call);
        } else {
            guards::prepare_insertion_point(func, call, info.function_info_addr, call);
        }
    }

    /// `f.apply(this)` => `f(this)`.
    fn inline_apply_without_array_argument(
        &mut self,
        func: &mut Func,
        call: InstrId,
        apply_info: &FunctionJitTimeInfo,
        target_info: Option<&FunctionJitTimeInfo>,
    ) {
        let args = convert_to_built_in_args(func, call);
        let Some(explicit_this) = args.explicit_this else {
            panic!("apply at {call} passes no `this`");
        };
        self.fixed_method_or_guard(func, call, apply_info);
        insert_built_in_start_end_tags(func, call, 2, BuiltinFunction::FunctionApply);

        let sc = insert_start_call(func, call, 1);
        let this = func.instr(explicit_this).src1.clone();
        let slot1 = insert_arg_out(func, call, OpCode::ArgOut, 1, this, Opnd::Reg(sc));
        let function = func.instr(args.implicit_this).src1.clone();
        let instr = func.instr_mut(call);
        instr.src1 = function;
        instr.src2 = Some(Opnd::Sym(slot1));
        instr.opcode = OpCode::CallI;

        let Some(target_info) = target_info else {
            return;
        };
        let Some(captured) = func.instr(call).src1.as_ref().and_then(Opnd::as_reg) else {
            return;
        };
        let target = uncaptured(func, captured);
        if !func.sym(target).is_single_def() {
            return;
        }
        let request = FixedMethodRequest::inlining(target_info, false);
        if self.try_optimize_call_with_fixed_method(func, call, &request).is_some() {
            guards::insert_byte_code_uses(func, target, call);
        }
    }

    /// `Math.max.apply(Math, array)` => `CallDirect MaxInAnArray`.
    fn inline_apply_with_array(
        &mut self,
        func: &mut Func,
        call: InstrId,
        apply_info: &FunctionJitTimeInfo,
        helper: HelperMethod,
    ) {
        let args = convert_to_built_in_args(func, call);
        let (Some(explicit_this), Some(array)) = (args.explicit_this, args.third) else {
            panic!("apply at {call} passes no array");
        };
        self.fixed_method_or_guard(func, call, apply_info);
        let (_, end) = insert_built_in_start_end_tags(func, call, 3, BuiltinFunction::FunctionApply);
        func.instr_mut(end).opcode = OpCode::InlineNonTrackingBuiltInEnd;

        let sc = insert_start_call(func, call, 2);
        let this = func.instr(explicit_this).src1.clone();
        let slot1 = insert_arg_out(func, call, OpCode::ArgOut, 1, this, Opnd::Reg(sc));
        let values = func.instr(array).src1.clone();
        let slot2 = insert_arg_out(func, call, OpCode::ArgOut, 2, values, Opnd::Sym(slot1));
        let function = func.instr(args.implicit_this).src1.clone();
        let specialized = insert_arg_out(
            func,
            call,
            OpCode::ArgOutInlineSpecialized,
            1,
            function,
            Opnd::Sym(slot2),
        );

        let instr = func.instr_mut(call);
        instr.opcode = OpCode::CallDirect;
        instr.src1 = Some(Opnd::HelperCall(helper));
        instr.src2 = Some(Opnd::Sym(specialized));
    }

    /// `f.apply(this, arguments)` => a dynamic call spreading the stack
    /// arguments, guarded by `BailOnNotStackArgs`.
    fn inline_apply_with_arguments_object(
        &mut self,
        func: &mut Func,
        call: InstrId,
        arguments_arg: InstrId,
        apply_info: &FunctionJitTimeInfo,
    ) {
        let Some(heap_args) = arguments_object_def(func, arguments_arg).and_then(|def| func.instr(def).dst_sym()) else {
            panic!("apply at {call} does not forward `arguments`");
        };
        func.instr_mut(arguments_arg).src1 = Some(Opnd::Reg(heap_args));

        let args = convert_to_built_in_args(func, call);
        let Some(explicit_this) = args.explicit_this else {
            panic!("apply at {call} passes no `this`");
        };
        let original_target = guards::call_target_sym(func, call);
        let owner = func.instr(call).func;
        let bail = func.create(OpCode::BailOnNotStackArgs, owner, None, Some(Opnd::Reg(heap_args)), None);
        let kind = BailOutKind::OnInlineFunction;
        if self
            .try_optimize_call_with_fixed_method(func, call, &FixedMethodRequest::built_in(apply_info))
            .is_some()
        {
            let record = func.new_bailout_record(kind, call);
            func.set_bailout(bail, kind, record);
            func.insert_before(call, bail);
            guards::insert_byte_code_uses(func, original_target, call);
        } else {
            let record = guards::prepare_insertion_point(func, call, apply_info.function_info_addr, args.implicit_this);
            let Some(function_info_check) = func.prev(args.implicit_this) else {
                panic!("guards of {call} were not inserted");
            };
            func.set_bailout(bail, kind, record);
            func.insert_before(function_info_check, bail);
        }
        func.tag_with_source_location(bail, call);

        let (start, _) = insert_built_in_start_end_tags(func, call, 3, BuiltinFunction::FunctionApply);
        let mut insert_before = start;
        for arg in func.iterate_arg_instrs(start) {
            func.move_before(insert_before, arg);
            insert_before = arg;
        }

        let sc = insert_start_call(func, call, 2);
        let slot2 = insert_arg_out(
            func,
            call,
            OpCode::ArgOutFromStackArgs,
            2,
            Some(Opnd::Reg(heap_args)),
            Opnd::Reg(sc),
        );
        let this = func.instr(explicit_this).src1.clone();
        let slot1 = insert_arg_out(func, call, OpCode::ArgOutDynamic, 1, this, Opnd::Sym(slot2));
        let function = func.instr(args.implicit_this).src1.clone();
        let instr = func.instr_mut(call);
        instr.src1 = function;
        instr.src2 = Some(Opnd::Sym(slot1));
        instr.opcode = OpCode::CallIDynamic;
    }
}
