//! Spread calls with a single spread argument.
//!
//! ```text
//! s  = StartCall                          s  = StartCall
//! a1 = ArgOut this, s                     a1 = ArgOutDynamic this, s
//! a2 = ArgOut arr, a1             =>           BailOnNotSpreadable arr   [OnInlineFunction]
//! i  = LdSpreadIndices <idx>, a2          a2 = ArgOutSpreadArg arr, a1
//! d  = CallIExtended f, i                 d  = CallIDynamicSpread f, a2
//! ```

use super::driver::Walk;
use super::Inliner;
use crate::bailout::BailOutKind;
use crate::ir::{Func, FuncId, InstrId, OpCode, Opnd};

/// Whether `call` is a `CallIExtended` whose arguments end in spread indices.
pub(super) fn is_spread_call(func: &Func, call: InstrId) -> bool {
    func.instr(call).opcode == OpCode::CallIExtended && spread_indices_of(func, call).is_some()
}

fn spread_indices_of(func: &Func, call: InstrId) -> Option<InstrId> {
    let link = func.instr(call).src2_sym()?;
    let def = func.sym(link).single_def()?;
    (func.instr(def).opcode == OpCode::LdSpreadIndices).then_some(def)
}

impl Inliner<'_> {
    /// Rewrite a spread call so the spread argument is expanded in place.
    pub(super) fn inline_spread(&mut self, func: &mut Func, walk: &Walk<'_>, call: InstrId) -> bool {
        let disabled = |f: FuncId| {
            func.data(f)
                .jit_info
                .body
                .as_ref()
                .is_some_and(|body| body.inline_spread_disabled)
        };
        if !self.flags.inline_spread || disabled(walk.func) || disabled(FuncId::TOP) {
            return false;
        }
        let Some(indices) = spread_indices_of(func, call) else {
            return false;
        };
        let Some(link) = func.instr(indices).src2.clone() else {
            return false;
        };
        let Some(spread_arg) = link.as_sym().and_then(|sym| func.sym(sym).single_def()) else {
            return false;
        };
        // Only a single spread argument right after `this` is expanded.
        if func.arg_slot_of(spread_arg) != Some(2) {
            log::debug!("Skip inline: spread call {} spreads a later argument", call);
            return false;
        }
        let Some(this_arg) = func
            .instr(spread_arg)
            .src2
            .as_ref()
            .and_then(Opnd::as_sym)
            .and_then(|sym| func.sym(sym).single_def())
        else {
            return false;
        };

        func.instr_mut(call).src2 = Some(link);
        func.remove(indices);

        let owner = func.instr(spread_arg).func;
        let array = func.instr(spread_arg).src1.clone();
        func.instr_mut(spread_arg).opcode = OpCode::ArgOutSpreadArg;
        let bail = func.create(OpCode::BailOnNotSpreadable, owner, None, array, None);
        let record = func.new_bailout_record(BailOutKind::OnInlineFunction, spread_arg);
        func.set_bailout(bail, BailOutKind::OnInlineFunction, record);
        func.insert_before(spread_arg, bail);
        func.tag_with_source_location(bail, spread_arg);

        func.instr_mut(this_arg).opcode = OpCode::ArgOutDynamic;
        assert!(
            func.start_call_of(call).is_some(),
            "spread call {call} has no StartCall"
        );
        func.instr_mut(call).opcode = OpCode::CallIDynamicSpread;
        log::debug!("Inlined spread at call {} in {}", call, walk.info(func).display_name());
        true
    }
}
