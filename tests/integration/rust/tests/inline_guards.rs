//! Guard Placement Integration Tests
//!
//! Speculation guards run before any instruction of an inlined body, and a
//! polymorphic site dispatches every observed target to its own copy with
//! misses sent to one shared bailout.

use integration_tests::builders::{
    call_site, caller, find, formal_source, identity_bodies, inline, new_func, polymorphic_targets, position, script,
};
use jit_compiler::bailout::BailOutKind;
use jit_compiler::inlining::InliningConfig;
use jit_compiler::ir::{Func, FuncId, InstrId, OpCode, Opnd};
use std::sync::Arc;

fn index_of(func: &Func, id: InstrId) -> usize {
    func.instrs_of(FuncId::TOP)
        .iter()
        .position(|other| *other == id)
        .unwrap_or_else(|| panic!("{id} is not in the list"))
}

/// The `InlineeStart` / `InlineeEnd` pair of `inlinee`, as list positions.
fn body_bounds(func: &Func, inlinee: FuncId) -> (usize, usize) {
    let end = find(func, FuncId::TOP, OpCode::InlineeEnd)
        .into_iter()
        .find(|id| func.instr(*id).func == inlinee)
        .unwrap_or_else(|| panic!("inlinee {inlinee} has no InlineeEnd"));
    let start_reg = func.instr(end).src2.as_ref().and_then(Opnd::as_reg).unwrap();
    let start = func.sym(start_reg).single_def().unwrap();
    assert_eq!(func.instr(start).opcode, OpCode::InlineeStart);
    (index_of(func, start), index_of(func, end))
}

/// Every instruction of `inlinee` except its frame meta arguments sits
/// between its start and end markers. A polymorphic copy also owns the
/// `Br` right after its end that jumps to the shared done label.
fn assert_body_enclosed(func: &Func, inlinee: FuncId) -> (usize, usize) {
    let (start, end) = body_bounds(func, inlinee);
    for (at, id) in func.instrs_of(FuncId::TOP).into_iter().enumerate() {
        let instr = func.instr(id);
        if instr.func != inlinee || instr.opcode == OpCode::InlineeMetaArg || at == start {
            continue;
        }
        if at == end + 1 && instr.opcode == OpCode::Br {
            continue;
        }
        assert!(start < at && at <= end, "{} of inlinee {inlinee} at {at} outside {start}..={end}", instr.opcode);
    }
    (start, end)
}

/// The branch that leaves a polymorphic copy, right after its end marker.
fn exit_branch(func: &Func, inlinee: FuncId, end: usize) -> InstrId {
    let br = func.instrs_of(FuncId::TOP)[end + 1];
    let instr = func.instr(br);
    assert_eq!(instr.opcode, OpCode::Br, "inlinee {inlinee} does not branch out after its end");
    assert_eq!(instr.func, inlinee);
    instr.target.unwrap_or_else(|| panic!("exit branch of inlinee {inlinee} has no target"))
}

#[test]
fn test_monomorphic_guards_precede_body() {
    let callee = Arc::new(script(2, "callee", 2));
    let mut func = new_func(caller(1).with_inlinee(0, callee));
    call_site(&mut func, FuncId::TOP, OpCode::CallI, &[0, 1], 0);
    inline(&mut func, &identity_bodies(), InliningConfig::default());

    let (start, _) = assert_body_enclosed(&func, FuncId::from(1));
    let object_check = position(&func, FuncId::TOP, OpCode::BailOnNotObject).unwrap();
    let identity_checks: Vec<usize> = find(&func, FuncId::TOP, OpCode::BailOnNotEqual)
        .into_iter()
        .map(|id| index_of(&func, id))
        .collect();
    assert_eq!(identity_checks.len(), 2);
    assert!(identity_checks.iter().all(|at| object_check < *at && *at < start));
    for id in find(&func, FuncId::TOP, OpCode::BailOnNotEqual) {
        assert_eq!(func.instr(id).bailout.map(|b| b.kind), Some(BailOutKind::OnInlineFunction));
    }
}

#[test]
fn test_monomorphic_end_to_end() {
    let callee = Arc::new(script(2, "callee", 3));
    let mut func = new_func(caller(1).with_inlinee(0, callee));
    let site = call_site(&mut func, FuncId::TOP, OpCode::CallI, &[0, 5, 7], 0);
    let stats = inline(&mut func, &identity_bodies(), InliningConfig::default());
    assert_eq!(stats.functions_inlined, 1);
    assert_eq!(stats.polymorphic_sites_inlined, 0);

    let ops = func.opcodes(FuncId::TOP);
    assert!(!ops.contains(&OpCode::CallI));
    assert!(!ops.contains(&OpCode::ArgIn));
    assert!(!ops.contains(&OpCode::Ret));
    assert_eq!(func.instr(site.call).opcode, OpCode::InlineeStart);
    assert!(func.data(FuncId::TOP).has_inlinee);

    // The callee returns its last parameter: the call's destination is a
    // copy of the register the caller passed last.
    let result = func.sym(site.dst).single_def().unwrap();
    assert_eq!(func.instr(result).opcode, OpCode::Ld);
    let returned = func.instr(result).src1.as_ref().and_then(Opnd::as_reg).unwrap();
    assert_eq!(formal_source(&func, returned), Some(site.values[2]));

    let (start, end) = assert_body_enclosed(&func, FuncId::from(1));
    assert!(start < index_of(&func, result) && index_of(&func, result) < end);
    assert_eq!(func.instr(func.instrs_of(FuncId::TOP)[end]).src1, Some(Opnd::IntConst(3 + 3)));
}

#[test]
fn test_polymorphic_dispatch_covers_every_target() {
    for targets in 2..=4u32 {
        let chain = polymorphic_targets(2, targets, 2);
        let infos: Vec<_> = std::iter::successors(Some(chain.clone()), |info| info.next.clone()).collect();
        let mut func = new_func(caller(1).with_inlinee(0, chain));
        let site = call_site(&mut func, FuncId::TOP, OpCode::CallI, &[0, 9], 0);
        let stats = inline(&mut func, &identity_bodies(), InliningConfig::default());
        assert_eq!(stats.polymorphic_sites_inlined, 1, "{targets} targets");

        let branches = find(&func, FuncId::TOP, OpCode::BrAddr);
        assert_eq!(branches.len(), targets as usize);
        for (br, info) in branches.iter().zip(&infos) {
            assert_eq!(func.instr(*br).src2, Some(Opnd::addr(info.function_info_addr)));
            let label = func.instr(*br).target.unwrap();
            assert!(func.instr(label).is_linked());
            assert!(index_of(&func, *br) < index_of(&func, label));
        }

        // A miss falls through to the shared bailout.
        let ops = func.opcodes(FuncId::TOP);
        let last_branch = ops.iter().rposition(|op| *op == OpCode::BrAddr).unwrap();
        assert_eq!(ops[last_branch + 1], OpCode::Br);
        let bails = find(&func, FuncId::TOP, OpCode::BailOnNotPolymorphicInlinee);
        assert_eq!(bails.len(), 1);
        assert_eq!(
            func.instr(bails[0]).bailout.map(|b| b.kind),
            Some(BailOutKind::OnPolymorphicInlineFunction)
        );

        // Every copy is complete and every return reaches the result.
        assert_eq!(find(&func, FuncId::TOP, OpCode::InlineeStart).len(), targets as usize);
        assert_eq!(find(&func, FuncId::TOP, OpCode::InlineeEnd).len(), targets as usize);
        assert_eq!(func.sym(site.dst).defs().len(), targets as usize + 1);
        assert!(!func.instr(site.call).is_linked());
    }
}

#[test]
fn test_polymorphic_guards_precede_every_copy() {
    let mut func = new_func(caller(1).with_inlinee(0, polymorphic_targets(2, 3, 1)));
    call_site(&mut func, FuncId::TOP, OpCode::CallI, &[0], 0);
    inline(&mut func, &identity_bodies(), InliningConfig::default());

    let object_check = position(&func, FuncId::TOP, OpCode::BailOnNotObject).unwrap();
    let dispatch: Vec<usize> = find(&func, FuncId::TOP, OpCode::BrAddr)
        .into_iter()
        .map(|id| index_of(&func, id))
        .collect();
    let first_start = position(&func, FuncId::TOP, OpCode::InlineeStart).unwrap();
    assert!(dispatch.iter().all(|at| object_check < *at && *at < first_start));
    let mut done_labels = Vec::new();
    for inlinee in 1..=3usize {
        let (start, end) = assert_body_enclosed(&func, FuncId::from(inlinee));
        assert!(start >= first_start);
        done_labels.push(exit_branch(&func, FuncId::from(inlinee), end));
    }
    // Every copy leaves through the same done label, placed after all of them.
    done_labels.dedup();
    assert_eq!(done_labels.len(), 1);
    assert!(func.instr(done_labels[0]).is_label());
    let last_end = func.instrs_of(FuncId::TOP)
        .iter()
        .rposition(|id| func.instr(*id).opcode == OpCode::InlineeEnd)
        .unwrap();
    assert!(index_of(&func, done_labels[0]) > last_end);
}

#[test]
fn test_too_many_targets_keep_the_call() {
    let mut func = new_func(caller(1).with_inlinee(0, polymorphic_targets(2, 5, 1)));
    let site = call_site(&mut func, FuncId::TOP, OpCode::CallI, &[0], 0);
    let stats = inline(&mut func, &identity_bodies(), InliningConfig::default());
    assert_eq!(stats.polymorphic_sites_inlined, 0);
    assert_eq!(func.instr(site.call).opcode, OpCode::CallI);
    assert!(find(&func, FuncId::TOP, OpCode::BrAddr).is_empty());
    assert!(find(&func, FuncId::TOP, OpCode::InlineeStart).is_empty());
}
