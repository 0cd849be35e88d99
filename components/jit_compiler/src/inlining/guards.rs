//! Guards protecting an inlined body.
//!
//! A monomorphic inlinee is protected by three checks on the call target,
//! all sharing one bailout record:
//!
//! ```text
//! BailOnNotObject  target
//! t = Ld           [target + type]
//! BailOnNotEqual   [t + typeId], Function
//! BailOnNotEqual   [target + functionInfo], info
//! ```

use crate::bailout::BailOutKind;
use crate::ir::{BailOutId, Func, InstrId, OpCode, Opnd, SymId};
use core_types::{Addr, BuiltinFunction, TypeId};

/// The register holding a call's target.
pub(super) fn call_target_sym(func: &Func, call: InstrId) -> SymId {
    let instr = func.instr(call);
    match instr.src1.as_ref().and_then(Opnd::as_reg) {
        Some(sym) => sym,
        None => panic!("call target of {} is not a register: {:?}", instr.opcode, instr.src1),
    }
}

fn insert_guard(
    func: &mut Func,
    opcode: OpCode,
    src1: Opnd,
    src2: Option<Opnd>,
    insert_before: InstrId,
    kind: BailOutKind,
    record: BailOutId,
) -> InstrId {
    let owner = func.instr(insert_before).func;
    let guard = func.create(opcode, owner, None, Some(src1), src2);
    func.set_bailout(guard, kind, record);
    func.insert_before(insert_before, guard);
    func.tag_with_source_location(guard, insert_before);
    guard
}

/// `BailOnNotObject target`.
pub(super) fn insert_object_check(
    func: &mut Func,
    target: SymId,
    insert_before: InstrId,
    kind: BailOutKind,
    record: BailOutId,
) -> InstrId {
    insert_guard(func, OpCode::BailOnNotObject, Opnd::Reg(target), None, insert_before, kind, record)
}

/// Load the target's type and bail out unless its type id is `Function`.
pub(super) fn insert_function_type_id_check(
    func: &mut Func,
    target: SymId,
    insert_before: InstrId,
    kind: BailOutKind,
    record: BailOutId,
) -> InstrId {
    let layout = func.script_context().layout;
    let owner = func.instr(insert_before).func;
    let type_reg = func.new_reg(owner);
    let ld_type = func.create(
        OpCode::Ld,
        owner,
        Some(Opnd::Reg(type_reg)),
        Some(Opnd::Indir {
            base: target,
            offset: layout.type_offset,
        }),
        None,
    );
    func.insert_before(insert_before, ld_type);
    func.tag_with_source_location(ld_type, insert_before);
    insert_guard(
        func,
        OpCode::BailOnNotEqual,
        Opnd::Indir {
            base: type_reg,
            offset: layout.type_id_offset,
        },
        Some(Opnd::IntConst(TypeId::Function as i64)),
        insert_before,
        kind,
        record,
    )
}

/// Bail out unless the target's function info is `info`.
pub(super) fn insert_function_info_check(
    func: &mut Func,
    target: SymId,
    info: Addr,
    insert_before: InstrId,
    kind: BailOutKind,
    record: BailOutId,
) -> InstrId {
    let offset = func.script_context().layout.function_info_offset;
    insert_guard(
        func,
        OpCode::BailOnNotEqual,
        Opnd::Indir { base: target, offset },
        Some(Opnd::addr(info)),
        insert_before,
        kind,
        record,
    )
}

/// Insert the full monomorphic guard sequence for an inlinee of `call`.
pub(super) fn prepare_insertion_point(func: &mut Func, call: InstrId, info: Addr, insert_before: InstrId) -> BailOutId {
    let kind = BailOutKind::OnInlineFunction;
    let target = call_target_sym(func, call);
    let record = func.new_bailout_record(kind, call);
    insert_object_check(func, target, insert_before, kind, record);
    insert_function_type_id_check(func, target, insert_before, kind, record);
    insert_function_info_check(func, target, info, insert_before, kind, record);
    log::trace!("guarded call {} on function info {}", call, info);
    record
}

/// Object and function type checks shared by every target of a polymorphic call.
pub(super) fn insert_js_function_check(func: &mut Func, call: InstrId, insert_before: InstrId, kind: BailOutKind) -> BailOutId {
    let target = call_target_sym(func, call);
    let record = func.new_bailout_record(kind, call);
    insert_object_check(func, target, insert_before, kind, record);
    insert_function_type_id_check(func, target, insert_before, kind, record);
    record
}

/// `BailOnNotBuiltIn target, index`.
pub(super) fn insert_built_in_check(func: &mut Func, call: InstrId, built_in: BuiltinFunction) -> InstrId {
    let kind = BailOutKind::OnInlineFunction;
    let target = call_target_sym(func, call);
    let record = func.new_bailout_record(kind, call);
    insert_guard(
        func,
        OpCode::BailOnNotBuiltIn,
        Opnd::Reg(target),
        Some(Opnd::IntConst(built_in as i64)),
        call,
        kind,
        record,
    )
}

/// Keep the pre-guard value of `sym` alive for bailouts.
pub(super) fn insert_byte_code_uses(func: &mut Func, sym: SymId, insert_before: InstrId) -> InstrId {
    let owner = func.instr(insert_before).func;
    let uses = func.new_byte_code_uses(owner, vec![sym]);
    func.insert_before(insert_before, uses);
    func.tag_with_source_location(uses, insert_before);
    uses
}
