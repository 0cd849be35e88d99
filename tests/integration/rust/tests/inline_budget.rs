//! Inlining Budget Integration Tests
//!
//! Once a function has inlined its budget of call sites, the remaining
//! sites stay ordinary calls.

use core_types::FunctionJitTimeInfo;
use integration_tests::builders::{call_site, caller, find, identity_bodies, inline, new_func, script, CallSite};
use jit_compiler::inlining::InliningConfig;
use jit_compiler::ir::{Func, FuncId, OpCode};
use std::sync::Arc;

/// `main` with `sites` call sites, each calling its own callee.
fn program(sites: u16) -> (Func, Vec<CallSite>) {
    let mut info: FunctionJitTimeInfo = caller(sites);
    for id in 0..sites {
        info = info.with_inlinee(id, Arc::new(script(2 + u32::from(id), &format!("callee{id}"), 2)));
    }
    let mut func = new_func(info);
    let calls = (0..sites)
        .map(|id| call_site(&mut func, FuncId::TOP, OpCode::CallI, &[0, i64::from(id)], id))
        .collect();
    (func, calls)
}

#[test]
fn test_budget_limits_inlined_sites() {
    let (mut func, sites) = program(4);
    let config = InliningConfig {
        max_inlinees_per_function: 2,
        ..InliningConfig::default()
    };
    let stats = inline(&mut func, &identity_bodies(), config);
    assert_eq!(stats.functions_inlined, 2);
    assert_eq!(stats.rejection_counts.get("BudgetExhausted"), Some(&2));

    let opcodes: Vec<OpCode> = sites.iter().map(|site| func.instr(site.call).opcode).collect();
    assert_eq!(
        opcodes,
        vec![OpCode::InlineeStart, OpCode::InlineeStart, OpCode::CallI, OpCode::CallI]
    );
    // Calls left in place keep their plain arguments.
    for site in &sites[2..] {
        for arg in &site.args {
            assert_eq!(func.instr(*arg).opcode, OpCode::ArgOut);
        }
    }
}

#[test]
fn test_default_budget_inlines_every_site() {
    let (mut func, _) = program(6);
    let stats = inline(&mut func, &identity_bodies(), InliningConfig::default());
    assert_eq!(stats.functions_inlined, 6);
    assert!(find(&func, FuncId::TOP, OpCode::CallI).is_empty());
    assert_eq!(find(&func, FuncId::TOP, OpCode::InlineeStart).len(), 6);
}

#[test]
fn test_zero_budget_inlines_nothing() {
    let (mut func, sites) = program(3);
    let config = InliningConfig {
        max_inlinees_per_function: 0,
        ..InliningConfig::default()
    };
    let stats = inline(&mut func, &identity_bodies(), config);
    assert_eq!(stats.functions_inlined, 0);
    assert!(sites.iter().all(|site| func.instr(site.call).opcode == OpCode::CallI));
    assert!(!func.data(FuncId::TOP).has_inlinee);
}
