//! Float and double templates, including conversions.

use super::helpers::{rm_mask, BinaryInstr};
use super::{Conversion, FloatBinaryOp, FloatCompare, FloatKind, TemplateContext};
use crate::encoder::{AluOp, Cond, Encoder, Mem, ShiftOp, SseOp, SseStore};
use crate::registers::{Reg, RegClass, RegMask, ValueKind};
use crate::runtime::imm32;
use core_types::JitResult;

fn scalar_ops(kind: FloatKind) -> ScalarOps {
    match kind {
        FloatKind::Float => ScalarOps {
            add: SseOp::Addss,
            sub: SseOp::Subss,
            mul: SseOp::Mulss,
            div: SseOp::Divss,
            compare: SseOp::Comiss,
            compare_unordered: SseOp::Ucomiss,
        },
        FloatKind::Double => ScalarOps {
            add: SseOp::Addsd,
            sub: SseOp::Subsd,
            mul: SseOp::Mulsd,
            div: SseOp::Divsd,
            compare: SseOp::Comisd,
            compare_unordered: SseOp::Ucomisd,
        },
    }
}

struct ScalarOps {
    add: SseOp,
    sub: SseOp,
    mul: SseOp,
    div: SseOp,
    compare: SseOp,
    compare_unordered: SseOp,
}

impl TemplateContext {
    pub(super) fn float_neg(&mut self, e: &mut Encoder<'_>, kind: FloatKind, dst: i32, src: i32) -> JitResult<()> {
        let (dst, src) = (self.slot(dst), self.slot(src));
        let mask = match kind {
            FloatKind::Float => self.runtime.neg_float_mask,
            FloatKind::Double => self.runtime.neg_double_mask,
        };
        let reg = self.scratch_reg(e, src, kind.value_kind(), RegMask::EMPTY)?;
        e.sse(SseOp::Xorps, reg, Mem::absolute(imm32(mask)))?;
        self.set_stack_reg(e, dst, reg, kind.value_kind())
    }

    pub(super) fn float_binary(
        &mut self,
        e: &mut Encoder<'_>,
        kind: FloatKind,
        op: FloatBinaryOp,
        dst: i32,
        left: i32,
        right: i32,
    ) -> JitResult<()> {
        let (dst, left, right) = (self.slot(dst), self.slot(left), self.slot(right));
        let ops = scalar_ops(kind);
        let value_kind = kind.value_kind();
        match op {
            FloatBinaryOp::Add => self.commutative(e, BinaryInstr::Sse(ops.add), value_kind, dst, left, right),
            FloatBinaryOp::Mul => self.commutative(e, BinaryInstr::Sse(ops.mul), value_kind, dst, left, right),
            FloatBinaryOp::Sub => self
                .non_commutative(e, BinaryInstr::Sse(ops.sub), value_kind, Some(dst), left, right, RegMask::EMPTY)
                .map(drop),
            FloatBinaryOp::Div => self
                .non_commutative(e, BinaryInstr::Sse(ops.div), value_kind, Some(dst), left, right, RegMask::EMPTY)
                .map(drop),
            FloatBinaryOp::Rem => {
                assert_eq!(kind, FloatKind::Double, "float remainder is not supported");
                self.rem_double(e, dst, left, right)
            }
        }
    }

    fn rem_double(&mut self, e: &mut Encoder<'_>, dst: i32, left: i32, right: i32) -> JitResult<()> {
        let double = ValueKind::Double;
        let dividend = self.stack_reg(e, left, double, RegMask::EMPTY)?;
        let divisor = if left == right {
            dividend
        } else {
            self.stack_reg(e, right, double, dividend.mask())?
        };
        e.alu_imm(AluOp::Sub, Reg::Esp, 16)?;
        e.sse_store(SseStore::Movsd, Mem::base(Reg::Esp, 8), divisor)?;
        e.sse_store(SseStore::Movsd, Mem::base(Reg::Esp, 0), dividend)?;
        self.call_helper(e, self.runtime.rem_double)?;
        e.alu_imm(AluOp::Add, Reg::Esp, 16)?;
        self.cache.overwrite_stack(dst, double.width());
        e.fstp_f64(Mem::frame(dst))?;
        Ok(())
    }

    pub(super) fn float_compare(
        &mut self,
        e: &mut Encoder<'_>,
        kind: FloatKind,
        cmp: FloatCompare,
        dst: i32,
        left: i32,
        right: i32,
    ) -> JitResult<()> {
        let (dst, left, right) = (self.slot(dst), self.slot(left), self.slot(right));
        let ops = scalar_ops(kind);
        // comis sets CF and ZF (and PF) when unordered, so `be`/`b` also skip NaN
        match cmp {
            FloatCompare::Lt => self.ordered_compare(e, ops.compare, kind, Cond::Be, dst, right, left),
            FloatCompare::Le => self.ordered_compare(e, ops.compare, kind, Cond::B, dst, right, left),
            FloatCompare::Gt => self.ordered_compare(e, ops.compare, kind, Cond::Be, dst, left, right),
            FloatCompare::Ge => self.ordered_compare(e, ops.compare, kind, Cond::B, dst, left, right),
            FloatCompare::Eq => self.equality_compare(e, ops.compare_unordered, kind, Cond::P, dst, left, right),
            FloatCompare::Ne => self.equality_compare(e, ops.compare_unordered, kind, Cond::Np, dst, left, right),
        }
    }

    /// `dst = !(skip after comis left, right)`
    #[allow(clippy::too_many_arguments)]
    fn ordered_compare(
        &mut self,
        e: &mut Encoder<'_>,
        compare: SseOp,
        kind: FloatKind,
        skip: Cond,
        dst: i32,
        left: i32,
        right: i32,
    ) -> JitResult<()> {
        let result = self.cache.alloc(RegClass::General, RegMask::EMPTY);
        e.alu(AluOp::Xor, result, result)?;
        self.non_commutative(e, BinaryInstr::Sse(compare), kind.value_kind(), None, left, right, RegMask::EMPTY)?;
        e.jcc_rel8(skip, 1)?;
        e.inc(result)?;
        self.set_stack_reg(e, dst, result, ValueKind::Int)
    }

    /// Equality needs ZF set and PF clear; `lahf` gathers both into `ah`.
    #[allow(clippy::too_many_arguments)]
    fn equality_compare(
        &mut self,
        e: &mut Encoder<'_>,
        compare: SseOp,
        kind: FloatKind,
        skip: Cond,
        dst: i32,
        left: i32,
        right: i32,
    ) -> JitResult<()> {
        let result = self.cache.alloc(RegClass::General, Reg::Eax.mask());
        e.alu(AluOp::Xor, result, result)?;
        self.non_commutative(e, BinaryInstr::Sse(compare), kind.value_kind(), None, left, right, RegMask::EMPTY)?;
        self.cache.invalidate(Reg::Eax);
        e.lahf()?;
        e.test_ah(0x44)?;
        e.jcc_rel8(skip, 1)?;
        e.inc(result)?;
        self.set_stack_reg(e, dst, result, ValueKind::Int)
    }

    pub(super) fn convert(&mut self, e: &mut Encoder<'_>, conv: Conversion, dst: i32, src: i32) -> JitResult<()> {
        let (dst, src) = (self.slot(dst), self.slot(src));
        let (from, to) = conv.kinds();
        let instr = match conv {
            Conversion::IntToDouble => SseOp::Cvtsi2sd,
            Conversion::IntToFloat => SseOp::Cvtsi2ss,
            Conversion::FloatToDouble => SseOp::Cvtss2sd,
            Conversion::DoubleToFloat => SseOp::Cvtsd2ss,
            Conversion::FloatToInt => SseOp::Cvttss2si,
            Conversion::UIntToDouble => return self.uint_to_double(e, dst, src),
            Conversion::DoubleToInt => return self.double_to_int(e, dst, src),
        };
        let operand = self.operand(src, from, RegMask::EMPTY);
        let reg = self.cache.alloc(to.class(), rm_mask(operand));
        e.sse(instr, reg, operand)?;
        self.set_stack_reg(e, dst, reg, to)
    }

    /// Converts as signed, then adds 2^32 when the sign bit was set.
    fn uint_to_double(&mut self, e: &mut Encoder<'_>, dst: i32, src: i32) -> JitResult<()> {
        let int = self.scratch_reg(e, src, ValueKind::Int, RegMask::EMPTY)?;
        let reg = self.cache.alloc(RegClass::Xmm, RegMask::EMPTY);
        e.sse(SseOp::Movd, reg, int)?;
        e.sse(SseOp::Cvtdq2pd, reg, reg)?;
        e.shift_imm(ShiftOp::Shr, int, 31)?;
        let table = imm32(self.runtime.uint_to_double_table);
        e.sse(SseOp::Addsd, reg, Mem::scaled(int, 8, table))?;
        self.set_stack_reg(e, dst, reg, ValueKind::Double)
    }

    fn double_to_int(&mut self, e: &mut Encoder<'_>, dst: i32, src: i32) -> JitResult<()> {
        let reg = self.stack_reg(e, src, ValueKind::Double, RegMask::EMPTY)?;
        e.alu_imm(AluOp::Sub, Reg::Esp, 8)?;
        e.sse_store(SseStore::Movsd, Mem::base(Reg::Esp, 0), reg)?;
        self.call_helper(e, self.runtime.to_int32)?;
        e.alu_imm(AluOp::Add, Reg::Esp, 8)?;
        self.set_stack_reg(e, dst, Reg::Eax, ValueKind::Int)
    }
}
