//! Constant folding of outgoing arguments.
//!
//! Folding an argument to an int constant lets the heuristics see constant
//! arguments at the next level of recursive inlining. Definitions are
//! followed through single-def registers, through an inlinee's `ArgIn` to
//! the caller's `ArgOut`, and through fixed data properties. Only results
//! that are exact int32 values are folded.

use super::driver::Walk;
use super::Inliner;
use crate::bailout::BailOutKind;
use crate::ir::{Func, InstrId, OpCode, Opnd, SymId};

impl Inliner<'_> {
    /// Try to fold the value passed by the `ArgOut` `arg` to a constant.
    pub(super) fn inl_const_fold_arg(&self, func: &mut Func, walk: &Walk<'_>, arg: InstrId) -> bool {
        debug_assert_eq!(func.instr(arg).opcode, OpCode::ArgOut);
        if !self.flags.inliner_const_fold {
            return false;
        }
        let Some(src) = func.instr(arg).src1.as_ref().and_then(Opnd::as_reg) else {
            return false;
        };
        let Some(def) = func.sym(src).single_def() else {
            return false;
        };
        let caller_arg_outs = (!walk.caller_arg_outs.is_empty()).then_some(walk.caller_arg_outs);
        match self.inl_const_fold(func, def, caller_arg_outs) {
            Some(value) => {
                log::trace!("const fold: argument {} is {}", arg, value);
                true
            }
            None => false,
        }
    }

    fn inl_const_fold(
        &self,
        func: &mut Func,
        instr: InstrId,
        caller_arg_outs: Option<&[Option<InstrId>]>,
    ) -> Option<i32> {
        let opcode = func.instr(instr).opcode;
        let src1 = match func.instr(instr).src1.clone()? {
            Opnd::Reg(sym) => sym,
            Opnd::IntConst(value) if opcode == OpCode::LdConstI4 => return i32::try_from(value).ok(),
            Opnd::Sym(param) if opcode == OpCode::ArgIn => {
                // Continue in the caller, which has no caller of its own here.
                let slot = func.sym(param).param_slot()?;
                let arg = (*caller_arg_outs?.get(usize::from(slot).checked_sub(1)?)?)?;
                let value = func.instr(arg).src1.as_ref()?.as_reg()?;
                let def = func.sym(value).single_def()?;
                return self.inl_const_fold(func, def, None);
            }
            Opnd::Property(_) => return self.try_fixed_data_property(func, instr),
            _ => return None,
        };
        let src2 = match &func.instr(instr).src2 {
            None => None,
            Some(Opnd::Reg(sym)) => Some(*sym),
            Some(_) => return None,
        };

        let def1 = func.sym(src1).single_def()?;
        let def2 = match src2 {
            Some(sym) => Some(func.sym(sym).single_def()?),
            None => None,
        };
        let left = self.inl_const_fold(func, def1, caller_arg_outs)?;

        match (src2, def2) {
            (Some(src2), Some(def2)) => {
                let right = self.inl_const_fold(func, def2, caller_arg_outs)?;
                let value = binary_calculator(opcode, left, right)?;
                fold_to_constant(func, instr, value, &[src1, src2]);
                Some(value)
            }
            _ => match unary_calculator(opcode, left) {
                Some(value) => {
                    fold_to_constant(func, instr, value, &[src1]);
                    Some(value)
                }
                // A capture only forwards its value.
                None if opcode == OpCode::BytecodeArgOutCapture => Some(left),
                None => None,
            },
        }
    }

    /// Replace a load of a fixed tagged-int property by a field check and
    /// the constant.
    fn try_fixed_data_property(&self, func: &mut Func, instr: InstrId) -> Option<i32> {
        if !self.flags.use_fixed_data_props {
            return None;
        }
        if !matches!(func.instr(instr).opcode, OpCode::LdFld | OpCode::LdRootFld) {
            return None;
        }
        let fld_info = func.instr(instr).src1.as_ref()?.as_property()?.fld_info.clone()?;
        let value = fld_info.fixed_int_value?;
        if !fld_info.is_obj_type_spec_candidate && !fld_info.is_root_object_non_configurable_field {
            return None;
        }

        let owner = func.instr(instr).func;
        let dst = func.unlink_dst(instr);
        func.instr_mut(instr).opcode = OpCode::CheckFixedFld;
        let kind = if fld_info.has_equivalent_type_set {
            BailOutKind::FailedEquivalentFixedFieldTypeCheck
        } else {
            BailOutKind::FailedFixedFieldTypeCheck
        };
        let record = func.new_bailout_record(kind, instr);
        func.set_bailout(instr, kind, record);

        let ld = func.create(OpCode::LdConstI4, owner, dst, Some(Opnd::IntConst(i64::from(value))), None);
        func.insert_after(instr, ld);
        func.tag_with_source_location(ld, instr);
        log::trace!("const fold: fixed data property at {} is {}", instr, value);
        Some(value)
    }
}

/// Rewrite `instr` to load `value`. Sources that name byte-code registers
/// stay alive through a `ByteCodeUses`.
fn fold_to_constant(func: &mut Func, instr: InstrId, value: i32, srcs: &[SymId]) {
    let owner = func.instr(instr).func;
    let byte_code_srcs: Vec<SymId> = srcs
        .iter()
        .copied()
        .filter(|sym| func.sym(*sym).byte_code_reg_slot.is_some())
        .collect();
    if !byte_code_srcs.is_empty() {
        let uses = func.new_byte_code_uses(owner, byte_code_srcs);
        func.insert_before(instr, uses);
        func.tag_with_source_location(uses, instr);
    }
    log::trace!("const fold: {} ({}) to {}", instr, func.instr(instr).opcode, value);
    let instr = func.instr_mut(instr);
    instr.opcode = OpCode::LdConstI4;
    instr.src1 = Some(Opnd::IntConst(i64::from(value)));
    instr.src2 = None;
}

/// Fold a binary operation on int32 values. Results that are not an exact
/// int32 (fractions, `-0`, overflow) do not fold.
fn binary_calculator(opcode: OpCode, left: i32, right: i32) -> Option<i32> {
    let (l, r) = (i64::from(left), i64::from(right));
    let value = match opcode {
        OpCode::Add => l + r,
        OpCode::Sub => l - r,
        OpCode::Mul => {
            let value = l * r;
            if value == 0 && (l < 0 || r < 0) {
                return None;
            }
            value
        }
        OpCode::Div => {
            if r == 0 || l % r != 0 || (l == 0 && r < 0) {
                return None;
            }
            l / r
        }
        OpCode::Rem => {
            if r == 0 {
                return None;
            }
            let value = l % r;
            if value == 0 && l < 0 {
                return None;
            }
            value
        }
        OpCode::And => i64::from(left & right),
        OpCode::Or => i64::from(left | right),
        OpCode::Xor => i64::from(left ^ right),
        OpCode::Shl => i64::from(left.wrapping_shl(right as u32 & 31)),
        OpCode::Shr => i64::from(left >> (right & 31)),
        OpCode::ShrU => i64::from((left as u32) >> (right & 31)),
        _ => return None,
    };
    i32::try_from(value).ok()
}

fn unary_calculator(opcode: OpCode, value: i32) -> Option<i32> {
    let v = i64::from(value);
    let result = match opcode {
        OpCode::Ld => v,
        OpCode::Neg => {
            if value == 0 {
                return None;
            }
            -v
        }
        OpCode::Not => i64::from(!value),
        OpCode::Incr => v + 1,
        OpCode::Decr => v - 1,
        _ => return None,
    };
    i32::try_from(result).ok()
}
