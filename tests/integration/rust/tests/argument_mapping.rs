//! Argument Mapping Integration Tests
//!
//! Every formal of an inlined callee reads the caller's actual of the same
//! position, or `undefined` when the caller passed fewer; every `StartCall`
//! still counts the argument instructions it opens.

use core_types::{Addr, BuiltinFunction, FixedField, FunctionJitTimeInfo, ObjTypeSpecFldInfo, TypeId};
use integration_tests::builders::{
    call_site, call_site_with_regs, caller, find, formal_source, identity_bodies, inline, new_func, params,
    params_and_ret, push, script, FnBodies,
};
use jit_compiler::inlining::InliningConfig;
use jit_compiler::ir::{Func, FuncId, InstrId, OpCode, Opnd, PropertyOpnd};
use std::cell::RefCell;
use std::sync::Arc;

/// Formals and actuals, both without `this`.
fn grid() -> Vec<(u16, usize)> {
    let mut cases = Vec::new();
    for formals in [0u16, 1, 3, 8] {
        let f = usize::from(formals);
        let mut actuals = vec![0, 1, f.saturating_sub(1), f, f + 5];
        actuals.sort_unstable();
        actuals.dedup();
        cases.extend(actuals.into_iter().map(|a| (formals, a)));
    }
    cases
}

#[test]
fn test_formals_read_matching_actual_or_undefined() {
    for (formals, actuals) in grid() {
        let callee = Arc::new(script(2, "callee", formals + 1));
        let mut func = new_func(caller(1).with_inlinee(0, callee));
        let values: Vec<i64> = (0..=actuals as i64).map(|v| v * 10).collect();
        let site = call_site(&mut func, FuncId::TOP, OpCode::CallI, &values, 0);

        let param_regs = RefCell::new(Vec::new());
        let builder = FnBodies(|func: &mut Func, f| {
            *param_regs.borrow_mut() = params_and_ret(func, f);
        });
        let stats = inline(&mut func, &builder, InliningConfig::default());
        assert_eq!(stats.functions_inlined, 1, "{formals} formals, {actuals} actuals");

        let undefined = func.script_context().undefined_addr;
        let param_regs = param_regs.into_inner();
        assert_eq!(param_regs.len(), usize::from(formals) + 1);
        for (i, param) in param_regs.iter().enumerate() {
            let def = func.sym(*param).single_def().unwrap();
            assert_eq!(func.instr(def).opcode, OpCode::Ld);
            if i <= actuals {
                assert_eq!(
                    formal_source(&func, *param),
                    Some(site.values[i]),
                    "formal {i} of {formals} with {actuals} actuals"
                );
            } else {
                assert_eq!(
                    func.instr(def).src1,
                    Some(Opnd::typed_addr(undefined, TypeId::Undefined)),
                    "formal {i} of {formals} with {actuals} actuals"
                );
            }
        }
        assert_eq!(func.data(FuncId::from(1)).actual_count, actuals as u32 + 1);
        assert!(!func.opcodes(FuncId::TOP).contains(&OpCode::ArgIn));
    }
}

#[test]
fn test_extra_actuals_are_still_captured() {
    let callee = Arc::new(script(2, "callee", 2));
    let mut func = new_func(caller(1).with_inlinee(0, callee));
    call_site(&mut func, FuncId::TOP, OpCode::CallI, &[0, 1, 2, 3], 0);
    inline(&mut func, &identity_bodies(), InliningConfig::default());
    // One capture per actual keeps the extra values alive for bailouts.
    assert_eq!(find(&func, FuncId::TOP, OpCode::BytecodeArgOutCapture).len(), 4);
    assert_eq!(find(&func, FuncId::TOP, OpCode::ArgOutInline).len(), 4);
}

/// ArgOut-family instructions whose argument chain ends at `start`.
///
/// An `ArgOutFromStackArgs` expanded into per-formal fixups carries the call
/// site id instead of a value and is no longer an argument of its own.
fn arg_outs_opened_by(func: &Func, start: InstrId) -> u32 {
    let order = func.instrs_of(FuncId::TOP);
    let start_at = order.iter().position(|id| *id == start).unwrap();
    let mut count = 0;
    for (at, id) in order.iter().enumerate() {
        let instr = func.instr(*id);
        if !instr.opcode.is_arg_out() {
            continue;
        }
        if instr.opcode == OpCode::ArgOutFromStackArgs && matches!(instr.src1, Some(Opnd::IntConst(_))) {
            continue;
        }
        if chain_start(func, *id) == Some(start) {
            assert!(at > start_at, "argument {id} precedes its StartCall {start}");
            count += 1;
        }
    }
    count
}

fn chain_start(func: &Func, arg: InstrId) -> Option<InstrId> {
    let mut link = func.instr(arg).src2.clone();
    loop {
        match link? {
            Opnd::Sym(sym) => link = func.instr(func.sym(sym).single_def()?).src2.clone(),
            Opnd::Reg(sym) => {
                let def = func.sym(sym).single_def()?;
                return (func.instr(def).opcode == OpCode::StartCall).then_some(def);
            }
            _ => return None,
        }
    }
}

fn assert_start_calls_match(func: &Func) {
    let starts = find(func, FuncId::TOP, OpCode::StartCall);
    assert!(!starts.is_empty());
    for start in starts {
        assert_eq!(
            func.start_call_count(start),
            arg_outs_opened_by(func, start),
            "StartCall {start} in {:?}",
            func.opcodes(FuncId::TOP)
        );
    }
}

#[test]
fn test_start_call_count_after_plain_inlining() {
    for (formals, actuals) in grid() {
        let callee = Arc::new(script(2, "callee", formals + 1));
        let mut func = new_func(caller(1).with_inlinee(0, callee));
        let values: Vec<i64> = (0..=actuals as i64).collect();
        call_site(&mut func, FuncId::TOP, OpCode::CallI, &values, 0);
        inline(&mut func, &identity_bodies(), InliningConfig::default());
        assert_start_calls_match(&func);
    }
}

#[test]
fn test_start_call_count_after_rest_expansion() {
    let callee = Arc::new(script(2, "callee", 1));
    let mut func = new_func(caller(1).with_inlinee(0, callee));
    call_site(&mut func, FuncId::TOP, OpCode::CallI, &[0, 1, 2, 3], 0);
    let builder = FnBodies(|func: &mut Func, f| {
        params(func, f);
        let rest = func.new_reg(f);
        push(func, f, OpCode::ArgInRest, Some(Opnd::Reg(rest)), None);
        push(func, f, OpCode::Ret, None, Some(Opnd::Reg(rest)));
    });
    inline(&mut func, &builder, InliningConfig::default());
    assert_eq!(find(&func, FuncId::TOP, OpCode::StElemC).len(), 3);
    assert_start_calls_match(&func);
}

#[test]
fn test_start_call_count_when_not_inlined() {
    let callee = Arc::new(script(2, "callee", 2));
    let mut func = new_func(caller(1).with_inlinee(0, callee));
    let values: Vec<i64> = (0..16).collect();
    let site = call_site(&mut func, FuncId::TOP, OpCode::CallI, &values, 0);
    let stats = inline(&mut func, &identity_bodies(), InliningConfig::default());
    assert_eq!(stats.functions_inlined, 0);
    assert_eq!(func.instr(site.call).opcode, OpCode::CallI);
    assert_start_calls_match(&func);
}

const APPLY: Addr = Addr(0x7100);

fn fixed_fld_info(property_id: u32, value: Addr, func_info: Addr) -> Arc<ObjTypeSpecFldInfo> {
    Arc::new(ObjTypeSpecFldInfo {
        property_id,
        fixed_fields: vec![FixedField::new(value, func_info, Addr(0x60), TypeId::Object)],
        type_id: Some(TypeId::Object),
        has_fixed_value: true,
        is_obj_type_spec_candidate: true,
        ..Default::default()
    })
}

#[test]
fn test_start_call_count_after_stack_arguments_expansion() {
    // main calls outer(); outer does `o.target.apply(this, arguments)` and
    // the apply target is inlined into outer with outer's actuals.
    let apply_info = Arc::new(FunctionJitTimeInfo::built_in(APPLY, BuiltinFunction::FunctionApply));
    let target = Arc::new(script(3, "target", 2));
    let mut outer = script(2, "outer", 1);
    let mut body = outer.body.as_deref().cloned().unwrap();
    body.profiled_call_site_count = 1;
    body.uses_arguments_object = true;
    outer.body = Some(Arc::new(body));
    let outer = Arc::new(
        outer
            .with_inlinee(0, apply_info.clone())
            .with_ldfld_inlinee(0, target.clone()),
    );
    let mut func = new_func(caller(1).with_inlinee(0, outer));
    let (outer_target, outer_this) = (func.new_reg(FuncId::TOP), func.new_reg(FuncId::TOP));
    call_site_with_regs(&mut func, FuncId::TOP, OpCode::CallI, outer_target, &[outer_this], 0);

    let builder = FnBodies(move |func: &mut Func, f| {
        if func.data(f).jit_info.display_name() != "outer" {
            params_and_ret(func, f);
            return;
        }
        func.data_mut(f).has_stack_args = true;
        let this = params(func, f)[0];
        let heap_args = func.new_reg(f);
        push(func, f, OpCode::LdHeapArguments, Some(Opnd::Reg(heap_args)), None);

        let object = func.new_reg(f);
        let function = func.new_reg(f);
        let load = |object, property_id, cache_index, fld_info| {
            Some(Opnd::Property(PropertyOpnd {
                object,
                property_id,
                cache_index,
                fld_info: Some(fld_info),
            }))
        };
        let target_fld = fixed_fld_info(7, Addr(0xA00), target.function_info_addr);
        push(func, f, OpCode::LdFldForCallApplyTarget, Some(Opnd::Reg(function)), load(object, 7, 0, target_fld));
        let apply = func.new_reg(f);
        let apply_fld = fixed_fld_info(8, Addr(0xB00), apply_info.function_info_addr);
        push(func, f, OpCode::LdMethodFld, Some(Opnd::Reg(apply)), load(function, 8, 1, apply_fld));
        let site = call_site_with_regs(func, f, OpCode::CallI, apply, &[function, this, heap_args], 0);
        push(func, f, OpCode::Ret, None, Some(Opnd::Reg(site.dst)));
    });
    let stats = inline(&mut func, &builder, InliningConfig::default());
    assert_eq!(stats.functions_inlined, 2);
    assert_eq!(find(&func, FuncId::TOP, OpCode::BailOnNotStackArgs).len(), 1);
    assert_start_calls_match(&func);
}
