//! IR construction for inliner scenarios.
//!
//! A scenario is a caller `Func` with profiled call sites, a chain of
//! `FunctionJitTimeInfo` records describing the callees, and an
//! [`InlineeIrBuilder`] that produces each callee's body on demand.

use core_types::{Addr, FunctionBodyInfo, FunctionJitTimeInfo, JitFlags, JitResult, ScriptContextInfo};
use jit_compiler::inlining::{InlineeIrBuilder, Inliner, InliningConfig, InliningStats};
use jit_compiler::ir::{Func, FuncId, InstrId, OpCode, Opnd, SymId, SymKind};
use std::sync::Arc;

/// Builds inlinee bodies with a closure.
pub struct FnBodies<F>(pub F);

impl<F: Fn(&mut Func, FuncId)> InlineeIrBuilder for FnBodies<F> {
    fn build_ir(&self, func: &mut Func, inlinee: FuncId) -> JitResult<()> {
        (self.0)(func, inlinee);
        Ok(())
    }
}

/// Gives every inlinee `ArgIn`s for its parameters and returns the last one.
pub fn identity_bodies() -> FnBodies<impl Fn(&mut Func, FuncId)> {
    FnBodies(|func: &mut Func, f| {
        params_and_ret(func, f);
    })
}

/// A script function record with `in_params` parameters, `this` included.
pub fn script(number: u32, name: &str, in_params: u16) -> FunctionJitTimeInfo {
    let addr = Addr(0x10_000 + number as usize * 0x100);
    FunctionJitTimeInfo::script(
        Addr(addr.0 + 0x80),
        Arc::new(FunctionBodyInfo::new(number, name, addr, in_params)),
    )
}

/// A caller record with `call_sites` profiled call sites.
pub fn caller(call_sites: u16) -> FunctionJitTimeInfo {
    let mut body = FunctionBodyInfo::new(1, "main", Addr(0x1_0000), 1);
    body.profiled_call_site_count = call_sites;
    FunctionJitTimeInfo::script(Addr(0x100), Arc::new(body))
}

/// `count` script targets linked through `next`, numbered from `first`.
pub fn polymorphic_targets(first: u32, count: u32, in_params: u16) -> Arc<FunctionJitTimeInfo> {
    let mut chain: Option<Arc<FunctionJitTimeInfo>> = None;
    for number in (first..first + count).rev() {
        let mut info = script(number, &format!("target{number}"), in_params);
        info.next = chain.take();
        chain = Some(Arc::new(info));
    }
    chain.unwrap_or_else(|| panic!("a polymorphic site needs at least one target"))
}

/// An empty function compiled from `info`.
pub fn new_func(info: FunctionJitTimeInfo) -> Func {
    Func::new(Arc::new(info), Arc::new(ScriptContextInfo::default()))
}

/// Append one instruction to `f`.
pub fn push(func: &mut Func, f: FuncId, opcode: OpCode, dst: Option<Opnd>, src1: Option<Opnd>) -> InstrId {
    let id = func.create(opcode, f, dst, src1, None);
    func.append(f, id);
    id
}

/// A call site: `StartCall`, one `ArgOut` per value, the call.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// The `StartCall`
    pub start: InstrId,
    /// The `ArgOut`s, `this` first
    pub args: Vec<InstrId>,
    /// The registers passed, `this` first
    pub values: Vec<SymId>,
    /// The call
    pub call: InstrId,
    /// The register holding the callee
    pub target: SymId,
    /// The call's destination
    pub dst: SymId,
}

/// Append `target = Ld <callee>; v_i = LdConstI4 ...; StartCall; ArgOut...; dst = opcode target`.
///
/// `values[0]` is `this`.
pub fn call_site(func: &mut Func, f: FuncId, opcode: OpCode, values: &[i64], profile_id: u16) -> CallSite {
    let target = func.new_reg(f);
    push(func, f, OpCode::Ld, Some(Opnd::Reg(target)), Some(Opnd::addr(Addr(0x9000))));
    let regs: Vec<SymId> = values
        .iter()
        .map(|value| {
            let reg = func.new_reg(f);
            push(func, f, OpCode::LdConstI4, Some(Opnd::Reg(reg)), Some(Opnd::IntConst(*value)));
            reg
        })
        .collect();
    call_site_with_regs(func, f, opcode, target, &regs, profile_id)
}

/// Like [`call_site`] with existing registers as argument values.
pub fn call_site_with_regs(
    func: &mut Func,
    f: FuncId,
    opcode: OpCode,
    target: SymId,
    regs: &[SymId],
    profile_id: u16,
) -> CallSite {
    let link = func.new_reg(f);
    let start = push(
        func,
        f,
        OpCode::StartCall,
        Some(Opnd::Reg(link)),
        Some(Opnd::IntConst(regs.len() as i64)),
    );
    let mut link = Opnd::Reg(link);
    let mut args = Vec::with_capacity(regs.len());
    for (i, reg) in regs.iter().enumerate() {
        let slot = func.new_arg_slot_sym(i as u16 + 1, f);
        let arg = func.create(OpCode::ArgOut, f, Some(Opnd::Sym(slot)), Some(Opnd::Reg(*reg)), Some(link));
        func.append(f, arg);
        link = Opnd::Sym(slot);
        args.push(arg);
    }
    let dst = func.new_reg(f);
    let call = func.create(opcode, f, Some(Opnd::Reg(dst)), Some(Opnd::Reg(target)), Some(link));
    func.instr_mut(call).profile_id = Some(profile_id);
    func.append(f, call);
    CallSite {
        start,
        args,
        values: regs.to_vec(),
        call,
        target,
        dst,
    }
}

/// Emit an `ArgIn` for each parameter of `inlinee`, `this` first.
pub fn params(func: &mut Func, inlinee: FuncId) -> Vec<SymId> {
    let count = func
        .data(inlinee)
        .jit_info
        .body
        .as_ref()
        .map_or(0, |body| body.in_params_count);
    (1..=count)
        .map(|n| {
            let param = func.new_sym(SymKind::Param(n), inlinee);
            let reg = func.new_reg(inlinee);
            push(func, inlinee, OpCode::ArgIn, Some(Opnd::Reg(reg)), Some(Opnd::Sym(param)));
            reg
        })
        .collect()
}

/// [`params`] followed by `Ret` of the last parameter.
pub fn params_and_ret(func: &mut Func, inlinee: FuncId) -> Vec<SymId> {
    let params = params(func, inlinee);
    let ret = params.last().copied().map(Opnd::Reg);
    push(func, inlinee, OpCode::Ret, None, ret);
    params
}

/// Instructions of `f` with the given opcode, in list order.
pub fn find(func: &Func, f: FuncId, opcode: OpCode) -> Vec<InstrId> {
    func.instrs_of(f)
        .into_iter()
        .filter(|id| func.instr(*id).opcode == opcode)
        .collect()
}

/// Position of the first `opcode` in the list of `f`.
pub fn position(func: &Func, f: FuncId, opcode: OpCode) -> Option<usize> {
    func.opcodes(f).iter().position(|op| *op == opcode)
}

/// Run the inliner once over `func`.
pub fn inline(func: &mut Func, builder: &dyn InlineeIrBuilder, config: InliningConfig) -> InliningStats {
    let mut inliner = Inliner::new(JitFlags::default(), config, builder)
        .unwrap_or_else(|err| panic!("inliner rejected its configuration: {err}"));
    inliner
        .optimize(func)
        .unwrap_or_else(|err| panic!("inlining failed: {err}"));
    inliner.stats().clone()
}

/// The caller register whose value an inlined formal reads, following the
/// byte-code capture the splice inserts in front of each `ArgOut`.
pub fn formal_source(func: &Func, formal: SymId) -> Option<SymId> {
    let def = func.sym(formal).single_def()?;
    let capture = func.instr(def).src1.as_ref()?.as_reg()?;
    let capture_def = func.sym(capture).single_def()?;
    if func.instr(capture_def).opcode != OpCode::BytecodeArgOutCapture {
        return None;
    }
    func.instr(capture_def).src1.as_ref()?.as_reg()
}
