//! Splicing an inlinee body into its caller.
//!
//! A monomorphic call `d = CallI f, a2` becomes
//!
//! ```text
//! InlineeMetaArg   m1 = actualCount
//! InlineeMetaArg   m2
//! InlineeMetaArg   m3 = null
//! ArgOut_Inline    a1 = this, s0
//! ArgOut_Inline    a2 = x, a1
//! s = InlineeStart f, a2
//!     ...inlinee body; ArgIn and Ret become moves...
//! InlineeEnd       actualCount + 3, s
//! ```
//!
//! Argument slots of an inlinee live in the caller's frame, at
//! `(frameSlot + slot) * MACH_PTR`.

use super::driver::Walk;
use super::fixed_method::FixedMethodRequest;
use super::{arguments, guards, Inliner};
use crate::bailout::BailOutKind;
use crate::ir::{ConstValue, Func, FuncId, InstrId, OpCode, Opnd, SymId, SymKind, INLINEE_META_ARGS, MACH_PTR};
use core_types::{FunctionJitTimeInfo, JitResult, ProfileId, ThisType, TypeId};
use std::sync::Arc;

/// One inlinee about to be spliced at one call.
pub(super) struct InlineSite {
    pub inlinee: FuncId,
    pub info: Arc<FunctionJitTimeInfo>,
    /// Call target register before any fixed-method rewrite
    pub original_target: Option<SymId>,
    /// The call's destination, detached from the call
    pub return_value: Option<Opnd>,
    /// Guards are inserted in front of this instruction
    pub checks_before: InstrId,
    pub safe_this: bool,
    pub is_apply_target: bool,
    /// Instruction following the call before any rewriting
    pub next: Option<InstrId>,
}

/// Argument instructions of a call, indexed by `slot - 1`.
#[derive(Debug, Clone, Default)]
pub(super) struct ActualArgs {
    /// Arguments that match a formal
    pub arg_outs: Vec<Option<InstrId>>,
    /// Arguments past the formals
    pub extra: Vec<Option<InstrId>>,
    /// Actual count including `this`
    pub actual_count: u32,
    /// An `ArgOutFromStackArgs` was expanded into fixup slots
    pub stack_args_expanded: bool,
}

impl ActualArgs {
    pub fn arg_out(&self, index: usize) -> Option<InstrId> {
        self.arg_outs.get(index).copied().flatten()
    }

    pub fn extra(&self, index: usize) -> Option<InstrId> {
        self.extra.get(index).copied().flatten()
    }

    /// The argument at `index`, whether it matches a formal or not.
    pub fn any(&self, index: usize) -> Option<InstrId> {
        self.arg_out(index).or_else(|| self.extra(index))
    }
}

fn put(slots: &mut Vec<Option<InstrId>>, index: usize, value: Option<InstrId>) {
    if slots.len() <= index {
        slots.resize(index + 1, None);
    }
    slots[index] = value;
}

/// Inputs of the formal mapping.
pub(super) struct FormalMap<'a> {
    pub actuals: &'a ActualArgs,
    pub formal_count: u32,
    pub return_value: Option<Opnd>,
    /// Operand naming the called function
    pub func_opnd: Option<Opnd>,
    /// The caller's own `this` register
    pub caller_this: Option<SymId>,
    pub safe_this: bool,
}

/// What is known about the `this` an inlinee receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThisMapping {
    Unknown,
    /// An ordinary object: loading `this` is a plain move
    Safe,
    /// A constant value, mapped at compile time
    Const(SymId),
}

/// Argument offset of a slot in the frame starting at `frame`.
fn slot_offset(frame: u32, slot: u16) -> i32 {
    (frame + u32::from(slot)) as i32 * MACH_PTR
}

impl Inliner<'_> {
    /// Inline a script function at a monomorphic `CallI` or `NewScObject`.
    pub(super) fn inline_script_function(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        info: &Arc<FunctionJitTimeInfo>,
        profile_id: ProfileId,
    ) -> JitResult<bool> {
        let next = func.next(call);
        let Some(body) = info.body.clone() else {
            return Ok(false);
        };
        if func.data(walk.func).is_loop_body && body.uses_arguments_object {
            log::debug!("Skip inline: {} uses arguments inside a loop body", body.display_name);
            return Ok(false);
        }
        let last_slot = func
            .instr(call)
            .src2_sym()
            .and_then(|sym| func.sym(sym).arg_slot())
            .unwrap_or(0);
        if last_slot > self.heuristics.config().max_inlinee_arg_slot {
            log::debug!("Skip inline: {} called with {} arguments", body.display_name, last_slot);
            return Ok(false);
        }
        let Some(original_target) = func.instr(call).src1.as_ref().and_then(Opnd::as_reg) else {
            return Ok(false);
        };

        let is_ctor = func.instr(call).opcode == OpCode::NewScObject;
        let rewrite = self.try_optimize_call_with_fixed_method(func, call, &FixedMethodRequest::inlining(info, is_ctor));
        let checks_before = if is_ctor {
            self.split_constructor_call(func, call, true, rewrite.is_some())
                .unwrap_or(call)
        } else {
            call
        };

        let return_value = func.unlink_dst(call);
        let inlinee = func.new_inlinee(walk.func, info.clone());
        let data = func.data_mut(inlinee);
        data.is_inlined_ctor = is_ctor;
        data.call_site_id = profile_id;

        let site = InlineSite {
            inlinee,
            info: info.clone(),
            original_target: Some(original_target),
            return_value,
            checks_before,
            safe_this: rewrite.is_some_and(|r| r.safe_this),
            is_apply_target: false,
            next,
        };
        self.inline_function_common(func, walk, call, site)?;
        self.stats.functions_inlined += 1;
        log::debug!(
            "Inlined {} into {} at call site {}",
            body.display_name,
            walk.info(func).display_name(),
            profile_id
        );
        Ok(true)
    }

    /// Build, optimize and splice the inlinee of `site` at `call`.
    pub(super) fn inline_function_common(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        site: InlineSite,
    ) -> JitResult<()> {
        self.build_ir_for_inlinee(func, walk, call, &site)?;

        if func.instr(call).opcode == OpCode::CallIFixed {
            let fixed_info = func
                .instr(call)
                .src1
                .as_ref()
                .and_then(Opnd::as_addr)
                .and_then(|addr| addr.fixed.as_ref())
                .map(|fixed| fixed.func_info_addr);
            debug_assert!(fixed_info.map_or(true, |addr| addr == site.info.function_info_addr));
        } else {
            guards::prepare_insertion_point(func, call, site.info.function_info_addr, site.checks_before);
        }

        let formal_count = u32::from(site.info.body.as_ref().map_or(0, |body| body.in_params_count));
        let call_site_id = func.data(site.inlinee).call_site_id;
        let actuals = self.map_actuals(func, walk, call, Some(site.inlinee), formal_count, call_site_id);
        func.data_mut(site.inlinee).actual_count = actuals.actual_count;
        assert!(actuals.actual_count > 0, "inlined call {call} passes no `this`");

        let map = FormalMap {
            actuals: &actuals,
            formal_count,
            return_value: site.return_value,
            func_opnd: func.instr(call).src1.clone(),
            caller_this: walk.sym_this,
            safe_this: site.safe_this,
        };
        self.map_formals(func, site.inlinee, map);

        if func.instr(call).opcode == OpCode::CallIFixed && !func.data(site.inlinee).is_getter_setter {
            if let Some(target) = site.original_target {
                guards::insert_byte_code_uses(func, target, call);
            }
        }

        let start_dst = func.new_reg(site.inlinee);
        let instr = func.instr_mut(call);
        instr.opcode = OpCode::InlineeStart;
        instr.func = site.inlinee;
        func.set_dst(call, Some(Opnd::Reg(start_dst)));

        let actual_count = actuals.actual_count;
        self.setup_inlinee_frame(func, walk, site.inlinee, call, actual_count);

        let end = func.create(
            OpCode::InlineeEnd,
            site.inlinee,
            None,
            Some(Opnd::IntConst(i64::from(actual_count + INLINEE_META_ARGS))),
            Some(Opnd::Reg(start_dst)),
        );
        if let Some((_, last)) = func.body_range(site.inlinee) {
            func.tag_with_source_location(end, last);
        }
        func.insert_after(call, end);

        func.move_args(call, false);

        if let Some((first, last)) = func.body_range(site.inlinee) {
            func.insert_range_before(end, first, last);
        }
        func.free_sentinels(site.inlinee);

        func.data_mut(FuncId::TOP).has_inlinee = true;
        func.data_mut(walk.func).has_inlinee = true;
        self.insert_statement_boundary(func, walk, site.next);
        Ok(())
    }

    /// Build the inlinee's IR and run the inliner over it.
    pub(super) fn build_ir_for_inlinee(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        site: &InlineSite,
    ) -> JitResult<()> {
        let for_in_depth = walk.ctx.for_in_depth;
        let body_for_in = site.info.body.as_ref().map_or(0, |body| body.for_in_loop_depth);
        let top = func.data_mut(FuncId::TOP);
        top.for_in_max_depth = top.for_in_max_depth.max(for_in_depth + body_for_in);
        func.data_mut(site.inlinee).for_in_base_depth = for_in_depth;

        let mut arg_outs = Vec::new();
        for arg in func.iterate_arg_instrs(call) {
            let slot = func.arg_slot_of(arg).unwrap_or(0);
            assert!(slot >= 1, "argument {arg} of call {call} has no slot");
            put(&mut arg_outs, usize::from(slot - 1), Some(arg));
        }

        self.builder.build_ir(func, site.inlinee)?;

        let caller_body = walk.info(func).body.as_ref().map(|body| body.addr);
        let same_body = site.info.body.as_ref().map(|body| body.addr) == caller_body;
        let mut ctx = walk.ctx.for_inlinee(arg_outs.len() as u32, same_body);
        if site.is_apply_target {
            ctx.apply_target = true;
        }
        self.optimize_func(func, site.inlinee, &arg_outs, ctx)
    }

    /// Mark the arguments of `call` as living in the inlinee frame and
    /// collect them by slot.
    ///
    /// An `ArgOutFromStackArgs` forwarding `arguments` to an inlinee is
    /// expanded into one fixup slot per formal after `this`.
    pub(super) fn map_actuals(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        call: InstrId,
        inlinee: Option<FuncId>,
        formal_limit: u32,
        call_site_id: ProfileId,
    ) -> ActualArgs {
        let frame = walk.ctx.frame_slot + INLINEE_META_ARGS - 1;
        let caller = func.instr(call).func;
        let mut out = ActualArgs::default();
        let mut fixup_count: u32 = 0;
        let mut actual: u32 = 0;

        if let Some(inlinee) = inlinee {
            let access = arguments::inlinee_has_argument_object(func, inlinee);
            func.data_mut(inlinee).has_unoptimized_arguments_access = access;
        }

        let mut link = func.instr(call).src2.clone();
        while let Some(Opnd::Sym(sym)) = link {
            let Some(arg) = func.sym(sym).single_def() else {
                panic!("argument slot {sym} of call {call} is not single-def");
            };
            let mut slot = func.sym(sym).arg_slot().unwrap_or(0);
            let s = func.sym_mut(sym);
            s.is_inlined_arg_slot = true;
            s.arg_offset = Some(slot_offset(frame, slot));

            if func.instr(arg).opcode == OpCode::ArgOut {
                if let Some(inlinee) = inlinee {
                    if !func.data(inlinee).has_unoptimized_arguments_access {
                        func.instr_mut(arg).opcode = OpCode::ArgOutInline;
                    }
                }
                func.generate_bytecode_arg_out_capture(arg);
            }

            if inlinee.is_some() && func.instr(arg).opcode == OpCode::ArgOutFromStackArgs {
                let owner = func.instr(arg).func;
                for _ in 1..formal_limit {
                    let fixup_sym = func.new_arg_slot_sym(slot, owner);
                    func.sym_mut(fixup_sym).is_inlined_arg_slot = true;
                    let undefined = func.script_context().undefined_addr;
                    let fixup = func.create(
                        OpCode::ArgOutFixupForStackArgs,
                        owner,
                        Some(Opnd::Sym(fixup_sym)),
                        Some(Opnd::typed_addr(undefined, TypeId::Undefined)),
                        func.instr(arg).src2.clone(),
                    );
                    func.insert_before(arg, fixup);
                    func.instr_mut(arg).src2 = Some(Opnd::Sym(fixup_sym));
                    slot += 1;
                    let s = func.sym_mut(sym);
                    s.kind = SymKind::ArgSlot(slot);
                    s.arg_offset = Some(slot_offset(frame, slot));
                    func.generate_arg_out_snapshot(fixup);
                    fixup_count += 1;
                }
                func.instr_mut(arg).src1 = Some(Opnd::IntConst(i64::from(call_site_id)));
                // The forwarded arguments object is no longer an actual.
                actual = actual.wrapping_sub(1);
                out.stack_args_expanded = true;
            }

            actual = actual.wrapping_add(1);
            let current = usize::from(slot.saturating_sub(1));
            if (current as u32) < formal_limit {
                put(&mut out.arg_outs, current, Some(arg));
            } else if func.instr(arg).opcode != OpCode::ArgOutFromStackArgs {
                put(&mut out.extra, current, Some(arg));
                put(&mut out.arg_outs, current, None);
            }
            link = func.instr(arg).src2.clone();
        }

        let Some(Opnd::Reg(start_sym)) = link else {
            panic!("argument chain of call {call} does not end at a StartCall");
        };
        let Some(start) = func.sym(start_sym).single_def() else {
            panic!("StartCall register of call {call} is not single-def");
        };
        assert_eq!(func.instr(start).opcode, OpCode::StartCall);

        if out.stack_args_expanded {
            let count = func.start_call_count(start);
            func.set_start_call_count(start, (count + fixup_count).saturating_sub(1));
            let previous = func
                .data_mut(caller)
                .call_site_to_arguments_offset_fixup
                .insert(call_site_id, fixup_count.saturating_sub(1));
            debug_assert!(previous.is_none(), "call site {call_site_id} expanded twice");
        }
        func.sym_mut(start_sym).is_inlined_arg_slot = true;

        out.actual_count = if out.stack_args_expanded {
            func.data(caller).actual_count
        } else {
            actual
        };
        out
    }

    /// Rewrite the inlinee's parameter, `this`, environment and return
    /// instructions in terms of the caller's values.
    pub(super) fn map_formals(&mut self, func: &mut Func, inlinee: FuncId, map: FormalMap<'_>) {
        let actuals = map.actuals;
        let actual_count = actuals.actual_count;
        let is_inlined_ctor = func.data(inlinee).is_inlined_ctor;
        let mut this_mapping = ThisMapping::Unknown;
        let mut sym_this: Option<SymId> = None;

        for id in func.instrs_of(inlinee) {
            if !func.instr(id).is_linked() {
                continue;
            }
            let owner = func.instr(id).func;
            match func.instr(id).opcode {
                OpCode::ArgInRest => {
                    if actuals.stack_args_expanded {
                        continue;
                    }
                    let formals = if owner == inlinee {
                        map.formal_count
                    } else {
                        // An apply target inlined with `arguments`.
                        let body = func.data(owner).jit_info.body.clone();
                        u32::from(body.map_or(0, |body| body.in_params_count))
                    };
                    let excess = actual_count.saturating_sub(formals);
                    let Some(rest) = func.instr(id).dst_sym() else {
                        panic!("rest parameter {id} has no destination");
                    };
                    let new_arr = func.create(
                        OpCode::NewScArray,
                        inlinee,
                        Some(Opnd::Reg(rest)),
                        Some(Opnd::IntConst(i64::from(excess))),
                        None,
                    );
                    func.insert_before(id, new_arr);
                    for i in formals..actual_count {
                        let Some(arg) = actuals.any(i as usize) else {
                            panic!("rest element {i} of {id} has no argument");
                        };
                        let value = func.arg_capture_sym(arg).map(Opnd::Reg);
                        let st = func.create(
                            OpCode::StElemC,
                            inlinee,
                            Some(Opnd::Indir {
                                base: rest,
                                offset: (i - formals) as i32,
                            }),
                            value,
                            None,
                        );
                        func.insert_before(id, st);
                    }
                    func.remove(id);
                }
                OpCode::ArgIn => {
                    let param = func
                        .unlink_src1(id)
                        .and_then(|opnd| opnd.as_sym())
                        .and_then(|sym| func.sym(sym).param_slot());
                    let Some(param) = param else {
                        panic!("ArgIn {id} does not read a parameter");
                    };
                    let index = u32::from(param) - 1;
                    assert!(
                        index < map.formal_count,
                        "parameter {param} of {id} exceeds {} formals",
                        map.formal_count
                    );
                    func.instr_mut(id).opcode = OpCode::Ld;
                    let Some(arg) = actuals.arg_out(index as usize) else {
                        let undefined = func.script_context().undefined_addr;
                        func.instr_mut(id).src1 = Some(Opnd::typed_addr(undefined, TypeId::Undefined));
                        continue;
                    };
                    let Some(value) = func.arg_capture_sym(arg) else {
                        panic!("argument {arg} mapped to {id} has no capture");
                    };
                    func.instr_mut(id).src1 = Some(Opnd::Reg(value));
                    if index != 0 {
                        continue;
                    }
                    let source = func
                        .sym(value)
                        .single_def()
                        .and_then(|def| func.instr(def).src1.as_ref())
                        .and_then(Opnd::as_reg);
                    if let Some(src) = source {
                        sym_this = func.instr(id).dst_sym();
                        this_mapping = if Some(src) == map.caller_this || func.sym(src).is_safe_this || is_inlined_ctor {
                            ThisMapping::Safe
                        } else if matches!(func.const_value(src), Some(ConstValue::Var { .. })) {
                            ThisMapping::Const(src)
                        } else if map.safe_this {
                            ThisMapping::Safe
                        } else {
                            ThisMapping::Unknown
                        };
                    }
                }
                OpCode::ArgOutFromStackArgs => self.map_stack_args_formals(func, id, actuals),
                OpCode::InlineeStart => {
                    let Some(sym) = func.instr(id).src2.as_ref().and_then(Opnd::as_sym) else {
                        continue;
                    };
                    let Some(def) = func.sym(sym).single_def() else {
                        continue;
                    };
                    if func.instr(def).opcode == OpCode::ArgOutFromStackArgs {
                        let link = func.instr(def).src2.clone();
                        func.remove(def);
                        func.instr_mut(id).src2 = link;
                    }
                }
                OpCode::LdEnv if owner == inlinee => {
                    let fixed_env = map
                        .func_opnd
                        .as_ref()
                        .and_then(Opnd::as_addr)
                        .and_then(|addr| addr.fixed.as_ref())
                        .map(|fixed| fixed.environment_addr);
                    match fixed_env {
                        Some(env) => {
                            let instr = func.instr_mut(id);
                            instr.opcode = OpCode::Ld;
                            instr.src1 = Some(Opnd::addr(env));
                        }
                        None => func.instr_mut(id).src1 = map.func_opnd.clone(),
                    }
                }
                OpCode::LdNewTarget if owner == inlinee => {
                    let src = if is_inlined_ctor {
                        map.func_opnd.clone()
                    } else {
                        Some(Opnd::typed_addr(func.script_context().undefined_addr, TypeId::Undefined))
                    };
                    let instr = func.instr_mut(id);
                    instr.src1 = src;
                    instr.opcode = OpCode::Ld;
                }
                OpCode::ChkNewCallFlag if owner == inlinee => {
                    assert!(is_inlined_ctor, "ChkNewCallFlag {id} in an inlinee not called with new");
                    func.remove(id);
                }
                OpCode::LdHomeObj | OpCode::LdFuncObj if owner == inlinee => {
                    func.instr_mut(id).src1 = map.func_opnd.clone();
                }
                OpCode::LdThis | OpCode::StrictLdThis => {
                    let reads_this = sym_this.is_some()
                        && func.instr(id).src1.as_ref().and_then(Opnd::as_reg) == sym_this;
                    let mapping = if reads_this { this_mapping } else { ThisMapping::Unknown };
                    match mapping {
                        ThisMapping::Safe => remove_ld_this(func, id),
                        ThisMapping::Const(src) if map_const_this(func, id, src) => {}
                        _ => self.do_check_this_opt(func, id),
                    }
                }
                OpCode::Throw => func.instr_mut(id).opcode = OpCode::InlineThrow,
                OpCode::RuntimeTypeError => func.instr_mut(id).opcode = OpCode::InlineRuntimeTypeError,
                OpCode::RuntimeReferenceError => func.instr_mut(id).opcode = OpCode::InlineRuntimeReferenceError,
                OpCode::Ret => match &map.return_value {
                    None => func.remove(id),
                    Some(ret) => {
                        func.instr_mut(id).opcode = OpCode::Ld;
                        func.set_dst(id, Some(ret.clone()));
                    }
                },
                _ => {}
            }
        }
    }

    /// Fit the fixup slots of a nested `.apply(this, arguments)` to the
    /// actual count of this call and point them at the real arguments.
    fn map_stack_args_formals(&mut self, func: &mut Func, instr: InstrId, actuals: &ActualArgs) {
        if !matches!(func.instr(instr).src2, Some(Opnd::Sym(_))) {
            return;
        }
        let Some(call_site_id) = func
            .instr(instr)
            .src1
            .as_ref()
            .and_then(Opnd::as_int_const)
            .and_then(|id| ProfileId::try_from(id).ok())
        else {
            panic!("expanded stack arguments {instr} lost their call site");
        };

        let mut link = func.instr(instr).src2.clone();
        while let Some(Opnd::Sym(sym)) = link {
            let Some(def) = func.sym(sym).single_def() else {
                break;
            };
            link = func.instr(def).src2.clone();
        }
        let start = link
            .as_ref()
            .and_then(Opnd::as_reg)
            .and_then(|sym| func.sym(sym).single_def())
            .filter(|def| func.instr(*def).opcode == OpCode::StartCall);
        let Some(start) = start else {
            panic!("stack arguments {instr} are not opened by a StartCall");
        };
        let actual_count = actuals.actual_count;
        let formal_count = func.start_call_count(start);

        if actual_count < formal_count {
            remove_extra_fixup_arg_outs(func, instr, formal_count - actual_count, call_site_id);
            func.set_start_call_count(start, actual_count);
        }

        let mut arg = func
            .instr(instr)
            .src2_sym()
            .and_then(|sym| func.sym(sym).single_def());
        let mut index = actual_count.min(formal_count).saturating_sub(1);
        while index > 0 {
            let Some(current) = arg.filter(|a| func.instr(*a).opcode == OpCode::ArgOutFixupForStackArgs) else {
                break;
            };
            if let Some(source) = actuals.any(index as usize) {
                let capture = func.arg_capture_sym(source);
                let snapshot = func
                    .arg_capture_sym(current)
                    .and_then(|sym| func.sym(sym).single_def());
                if let (Some(capture), Some(snapshot)) = (capture, snapshot) {
                    func.instr_mut(snapshot).src1 = Some(Opnd::Reg(capture));
                }
                arg = func
                    .instr(current)
                    .src2_sym()
                    .and_then(|sym| func.sym(sym).single_def());
            }
            index -= 1;
        }

        if formal_count < actual_count {
            fixup_extra_actual_params(func, instr, actuals, formal_count, call_site_id);
            let count = func.start_call_count(start);
            func.set_start_call_count(start, count + (actual_count - formal_count));
        }
    }

    /// Replace a `this` load the inlinee cannot prove cheap with a checked
    /// load that bails out when a helper would be needed.
    fn do_check_this_opt(&mut self, func: &mut Func, instr: InstrId) {
        if !self.flags.check_this {
            return;
        }
        let owner = func.instr(instr).func;
        let body = func.data(owner).jit_info.body.clone();
        let allowed = body.is_some_and(|body| {
            body.has_profile_info && body.this_type == ThisType::Simple && !body.check_this_disabled
        });
        if !allowed {
            return;
        }
        let opcode = func.instr(instr).opcode;
        if opcode == OpCode::LdThis {
            func.instr_mut(instr).src2 = None;
        }
        let check_opcode = if opcode == OpCode::LdThis {
            OpCode::CheckThis
        } else {
            OpCode::StrictCheckThis
        };
        let check = func.create(check_opcode, owner, None, func.instr(instr).src1.clone(), None);
        let record = func.new_bailout_record(BailOutKind::CheckThis, instr);
        func.set_bailout(check, BailOutKind::CheckThis, record);
        func.insert_before(instr, check);
        func.tag_with_source_location(check, instr);
        remove_ld_this(func, instr);
    }

    /// Emit the three meta arguments the stack walker reads in front of
    /// `InlineeStart`.
    pub(super) fn setup_inlinee_frame(&mut self, func: &mut Func, walk: &Walk<'_>, inlinee: FuncId, start: InstrId, actual_count: u32) {
        let null = func.script_context().null_addr;
        let srcs = [Some(Opnd::IntConst(i64::from(actual_count))), None, Some(Opnd::addr(null))];
        for (i, src) in srcs.into_iter().enumerate() {
            let slot = (actual_count + 1 + i as u32) as u16;
            let sym = func.new_arg_slot_sym(slot, inlinee);
            let s = func.sym_mut(sym);
            s.is_inlined_arg_slot = true;
            s.arg_offset = Some((walk.ctx.frame_slot + i as u32) as i32 * MACH_PTR);
            let meta = func.create(OpCode::InlineeMetaArg, inlinee, Some(Opnd::Sym(sym)), src, None);
            func.insert_before(start, meta);
            if i == 0 {
                func.data_mut(inlinee).frame_start_sym = Some(sym);
            }
        }
    }
}

/// Drop a `this` load, or turn it into a move when it copies.
fn remove_ld_this(func: &mut Func, instr: InstrId) {
    let dst = func.instr(instr).dst_sym();
    let src = func.instr(instr).src1.as_ref().and_then(Opnd::as_reg);
    if dst.is_some() && dst == src {
        func.remove(instr);
    } else {
        func.instr_mut(instr).opcode = OpCode::Ld;
    }
}

/// Map `this` of a constant value at compile time. Returns false when the
/// constant is a primitive that would need boxing.
fn map_const_this(func: &mut Func, instr: InstrId, src: SymId) -> bool {
    let Some(ConstValue::Var { addr, type_id }) = func.const_value(src) else {
        return false;
    };
    let Some(type_id) = type_id.filter(|t| t.is_object() || t.is_undefined_or_null()) else {
        return false;
    };
    let context = func.script_context();
    let (global, undefined) = (context.global_object_addr, context.undefined_addr);
    let value = if func.instr(instr).opcode == OpCode::LdThis {
        func.instr_mut(instr).src2 = None;
        if type_id.is_undefined_or_null() {
            global
        } else {
            addr
        }
    } else if type_id == TypeId::ActivationObject {
        undefined
    } else {
        addr
    };
    let ld = func.instr_mut(instr);
    ld.opcode = OpCode::Ld;
    ld.src1 = Some(Opnd::addr(value));
    true
}

/// Drop `count` fixup slots in front of an expanded `ArgOutFromStackArgs`.
fn remove_extra_fixup_arg_outs(func: &mut Func, instr: InstrId, count: u32, call_site_id: ProfileId) {
    let owner = func.instr(instr).func;
    let Some(arg_sym) = func.instr(instr).dst_sym() else {
        panic!("stack arguments {instr} have no slot");
    };
    for _ in 0..count {
        let fixup = func
            .instr(instr)
            .src2_sym()
            .and_then(|sym| func.sym(sym).single_def())
            .filter(|def| func.instr(*def).opcode == OpCode::ArgOutFixupForStackArgs);
        let Some(fixup) = fixup else {
            panic!("expected a stack argument fixup in front of {instr}");
        };
        func.instr_mut(instr).src2 = func.instr(fixup).src2.clone();
        let s = func.sym_mut(arg_sym);
        if let SymKind::ArgSlot(slot) = s.kind {
            s.kind = SymKind::ArgSlot(slot - 1);
        }
        s.arg_offset = s.arg_offset.map(|offset| offset - MACH_PTR);
        func.remove(fixup);
        if let Some(fixups) = func
            .data_mut(owner)
            .call_site_to_arguments_offset_fixup
            .get_mut(&call_site_id)
        {
            *fixups = fixups.saturating_sub(1);
        }
    }
}

/// Add fixup slots for actuals past the formal count of a nested
/// `.apply(this, arguments)` target.
fn fixup_extra_actual_params(func: &mut Func, instr: InstrId, actuals: &ActualArgs, from: u32, call_site_id: ProfileId) {
    let owner = func.instr(instr).func;
    let Some(arg_sym) = func.instr(instr).dst_sym() else {
        panic!("stack arguments {instr} have no slot");
    };
    for index in from..actuals.actual_count {
        let Some(to_map) = actuals.any(index as usize) else {
            panic!("actual {index} has no argument to forward");
        };
        let slot = func.sym(arg_sym).arg_slot().unwrap_or(0);
        let offset = func.sym(arg_sym).arg_offset;
        let new_sym = func.new_arg_slot_sym(slot, owner);
        let s = func.sym_mut(new_sym);
        s.is_inlined_arg_slot = true;
        s.arg_offset = offset;
        let s = func.sym_mut(arg_sym);
        s.kind = SymKind::ArgSlot(slot + 1);
        s.arg_offset = offset.map(|offset| offset + MACH_PTR);

        let fixup = func.create(
            OpCode::ArgOutFixupForStackArgs,
            owner,
            Some(Opnd::Sym(new_sym)),
            func.instr(to_map).src1.clone(),
            func.instr(instr).src2.clone(),
        );
        func.insert_before(instr, fixup);
        func.generate_arg_out_snapshot(fixup);
        *func
            .data_mut(owner)
            .call_site_to_arguments_offset_fixup
            .entry(call_site_id)
            .or_insert(0) += 1;
        func.instr_mut(instr).src2 = Some(Opnd::Sym(new_sym));
    }
}
