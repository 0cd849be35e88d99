//! Builders shared by the inliner's unit tests.

use super::InlineeIrBuilder;
use crate::ir::{Func, FuncId, InstrId, OpCode, Opnd, SymId, SymKind};
use core_types::{Addr, FunctionBodyInfo, FunctionJitTimeInfo, JitResult, ScriptContextInfo};
use std::sync::Arc;

/// Builds inlinee bodies with a closure.
pub(crate) struct FnBodies<F>(pub F);

impl<F: Fn(&mut Func, FuncId)> InlineeIrBuilder for FnBodies<F> {
    fn build_ir(&self, func: &mut Func, inlinee: FuncId) -> JitResult<()> {
        (self.0)(func, inlinee);
        Ok(())
    }
}

/// Leaves every inlinee body empty.
pub(crate) struct NoBodies;

impl InlineeIrBuilder for NoBodies {
    fn build_ir(&self, _func: &mut Func, _inlinee: FuncId) -> JitResult<()> {
        Ok(())
    }
}

/// A script function record.
pub(crate) fn script(number: u32, name: &str, in_params: u16) -> FunctionJitTimeInfo {
    let addr = Addr(0x10_000 + number as usize * 0x100);
    FunctionJitTimeInfo::script(
        Addr(addr.0 + 0x80),
        Arc::new(FunctionBodyInfo::new(number, name, addr, in_params)),
    )
}

/// A caller record with `call_sites` profiled call sites.
pub(crate) fn caller(call_sites: u16) -> FunctionJitTimeInfo {
    let mut body = FunctionBodyInfo::new(1, "main", Addr(0x1_0000), 1);
    body.profiled_call_site_count = call_sites;
    FunctionJitTimeInfo::script(Addr(0x100), Arc::new(body))
}

pub(crate) fn new_func(info: FunctionJitTimeInfo) -> Func {
    Func::new(Arc::new(info), Arc::new(ScriptContextInfo::default()))
}

pub(crate) fn push(func: &mut Func, f: FuncId, opcode: OpCode, dst: Option<Opnd>, src1: Option<Opnd>) -> InstrId {
    let id = func.create(opcode, f, dst, src1, None);
    func.append(f, id);
    id
}

/// A call site under construction: `StartCall`, one `ArgOut` per value, the call.
pub(crate) struct CallSite {
    pub start: InstrId,
    pub args: Vec<InstrId>,
    pub call: InstrId,
    pub target: SymId,
    pub dst: Option<SymId>,
}

/// Append `target = Ld <value>; StartCall; ArgOut...; dst = opcode target, args`.
///
/// `values[0]` is `this`. Each value gets its own register defined by a
/// `LdConstI4`.
pub(crate) fn call_site(func: &mut Func, f: FuncId, opcode: OpCode, values: &[i64], profile_id: u16) -> CallSite {
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
pub(crate) fn call_site_with_regs(
    func: &mut Func,
    f: FuncId,
    opcode: OpCode,
    target: SymId,
    regs: &[SymId],
    profile_id: u16,
) -> CallSite {
    let sc = func.new_reg(f);
    let start = push(
        func,
        f,
        OpCode::StartCall,
        Some(Opnd::Reg(sc)),
        Some(Opnd::IntConst(regs.len() as i64)),
    );
    let mut link = Opnd::Reg(sc);
    let mut args = Vec::new();
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
        call,
        target,
        dst: Some(dst),
    }
}

/// Emit `ArgIn` for each parameter of `inlinee` (`this` first), then
/// `Ret` of the last parameter. Returns the parameter registers.
pub(crate) fn params_and_ret(func: &mut Func, inlinee: FuncId) -> Vec<SymId> {
    let params = params(func, inlinee);
    let ret = params.last().copied().map(Opnd::Reg);
    push(func, inlinee, OpCode::Ret, None, ret);
    params
}

/// Emit `ArgIn` for each parameter of `inlinee`.
pub(crate) fn params(func: &mut Func, inlinee: FuncId) -> Vec<SymId> {
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

/// Instructions of `f` with the given opcode.
pub(crate) fn find(func: &Func, f: FuncId, opcode: OpCode) -> Vec<InstrId> {
    func.instrs_of(f)
        .into_iter()
        .filter(|id| func.instr(*id).opcode == opcode)
        .collect()
}
