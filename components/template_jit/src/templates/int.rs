//! Integer templates.

use super::helpers::{rm_mask, BinaryInstr};
use super::{IntBinaryOp, IntCompare, IntUnaryOp, TemplateContext};
use crate::encoder::{AluOp, Cond, Encoder, Mem, Rm, ShiftOp, UnaryOp};
use crate::registers::{Reg, RegClass, RegMask, ValueKind};
use core_types::JitResult;

impl TemplateContext {
    pub(super) fn ld(&mut self, e: &mut Encoder<'_>, kind: ValueKind, dst: i32, src: i32) -> JitResult<()> {
        let (dst, src) = (self.slot(dst), self.slot(src));
        if dst == src {
            return Ok(());
        }
        let reg = self.stack_reg(e, src, kind, RegMask::EMPTY)?;
        self.set_stack_reg(e, dst, reg, kind)
    }

    pub(super) fn ld_const(&mut self, e: &mut Encoder<'_>, dst: i32, value: i32) -> JitResult<()> {
        let dst = self.slot(dst);
        self.cache.overwrite_stack(dst, ValueKind::Int.width());
        e.mov_mem_imm(Mem::frame(dst), value)?;
        Ok(())
    }

    pub(super) fn int_unary(&mut self, e: &mut Encoder<'_>, op: IntUnaryOp, dst: i32, src: i32) -> JitResult<()> {
        let (dst, src) = (self.slot(dst), self.slot(src));
        match op {
            IntUnaryOp::Neg => self.neg_or_not(e, UnaryOp::Neg, dst, src),
            IntUnaryOp::Not => self.neg_or_not(e, UnaryOp::Not, dst, src),
            IntUnaryOp::LogNot => self.test_zero(e, Cond::E, dst, src),
            IntUnaryOp::ToBool => self.test_zero(e, Cond::Ne, dst, src),
            IntUnaryOp::Abs => self.abs(e, dst, src),
            IntUnaryOp::Clz32 => self.clz32(e, dst, src),
        }
    }

    fn neg_or_not(&mut self, e: &mut Encoder<'_>, op: UnaryOp, dst: i32, src: i32) -> JitResult<()> {
        if dst == src {
            self.cache.overwrite_stack(dst, ValueKind::Int.width());
            e.unary(op, Mem::frame(dst))?;
            return Ok(());
        }
        let reg = self.scratch_reg(e, src, ValueKind::Int, RegMask::EMPTY)?;
        e.unary(op, reg)?;
        self.set_stack_reg(e, dst, reg, ValueKind::Int)
    }

    fn test_zero(&mut self, e: &mut Encoder<'_>, cond: Cond, dst: i32, src: i32) -> JitResult<()> {
        let reg = self.cache.alloc(RegClass::General, RegMask::EMPTY);
        e.alu(AluOp::Xor, reg, reg)?;
        let src = self.operand(src, ValueKind::Int, reg.mask());
        e.alu_imm(AluOp::Cmp, src, 0)?;
        e.setcc(cond, reg)?;
        self.set_stack_reg(e, dst, reg, ValueKind::Int)
    }

    fn abs(&mut self, e: &mut Encoder<'_>, dst: i32, src: i32) -> JitResult<()> {
        let src = self.operand(src, ValueKind::Int, RegMask::EMPTY);
        self.move_to(e, Reg::Eax, src, ValueKind::Int)?;
        self.cache.invalidate(Reg::Eax);
        self.cache.invalidate(Reg::Edx);
        e.cdq()?;
        e.alu(AluOp::Xor, Reg::Eax, Reg::Edx)?;
        e.alu(AluOp::Sub, Reg::Eax, Reg::Edx)?;
        self.set_stack_reg(e, dst, Reg::Eax, ValueKind::Int)
    }

    fn clz32(&mut self, e: &mut Encoder<'_>, dst: i32, src: i32) -> JitResult<()> {
        let src = self.operand(src, ValueKind::Int, RegMask::EMPTY);
        let bit = self.cache.alloc(RegClass::General, rm_mask(src));
        let result = self.cache.alloc(RegClass::General, rm_mask(src) | bit);
        e.bsr(bit, src)?;
        let zero = e.jcc_short(Cond::E)?;
        e.mov_imm(result, 31)?;
        e.alu(AluOp::Sub, result, bit)?;
        let done = e.jmp_short()?;
        zero.resolve(e.buffer());
        e.mov_imm(result, 32)?;
        done.resolve(e.buffer());
        self.set_stack_reg(e, dst, result, ValueKind::Int)
    }

    pub(super) fn int_binary(
        &mut self,
        e: &mut Encoder<'_>,
        op: IntBinaryOp,
        dst: i32,
        left: i32,
        right: i32,
    ) -> JitResult<()> {
        let (dst, left, right) = (self.slot(dst), self.slot(left), self.slot(right));
        let int = ValueKind::Int;
        match op {
            IntBinaryOp::Add => self.commutative(e, BinaryInstr::Alu(AluOp::Add), int, dst, left, right),
            IntBinaryOp::Mul => self.commutative(e, BinaryInstr::Imul, int, dst, left, right),
            IntBinaryOp::And => self.commutative(e, BinaryInstr::Alu(AluOp::And), int, dst, left, right),
            IntBinaryOp::Or => self.commutative(e, BinaryInstr::Alu(AluOp::Or), int, dst, left, right),
            IntBinaryOp::Xor => self.commutative(e, BinaryInstr::Alu(AluOp::Xor), int, dst, left, right),
            IntBinaryOp::Sub => self
                .non_commutative(e, BinaryInstr::Alu(AluOp::Sub), int, Some(dst), left, right, RegMask::EMPTY)
                .map(drop),
            IntBinaryOp::Shl => self.shift(e, ShiftOp::Shl, dst, left, right),
            IntBinaryOp::Shr => self.shift(e, ShiftOp::Sar, dst, left, right),
            IntBinaryOp::ShrU => self.shift(e, ShiftOp::Shr, dst, left, right),
            IntBinaryOp::Div => self.div_signed(e, dst, left, right),
            IntBinaryOp::Rem => self.rem_signed(e, dst, left, right),
            IntBinaryOp::DivU => self.div_unsigned(e, dst, left, right, false),
            IntBinaryOp::RemU => self.div_unsigned(e, dst, left, right, true),
            IntBinaryOp::Min => self.min_max(e, Cond::G, dst, left, right),
            IntBinaryOp::Max => self.min_max(e, Cond::L, dst, left, right),
        }
    }

    /// The count goes through `cl`.
    fn shift(&mut self, e: &mut Encoder<'_>, op: ShiftOp, dst: i32, left: i32, right: i32) -> JitResult<()> {
        let int = ValueKind::Int;
        if left == right {
            let src = self.operand(left, int, RegMask::EMPTY);
            self.move_to(e, Reg::Ecx, src, int)?;
            self.cache.invalidate(Reg::Ecx);
            e.shift_cl(op, Reg::Ecx)?;
            return self.set_stack_reg(e, dst, Reg::Ecx, int);
        }
        let reg = self.stack_reg(e, left, int, Reg::Ecx.mask())?;
        let count = self.operand(right, int, RegMask::EMPTY);
        if count != Rm::Reg(Reg::Ecx) {
            self.move_to(e, Reg::Ecx, count, int)?;
            self.cache.set_stack_info(Reg::Ecx, right, int);
        }
        self.cache.invalidate(reg);
        e.shift_cl(op, reg)?;
        self.set_stack_reg(e, dst, reg, int)
    }

    fn div_signed(&mut self, e: &mut Encoder<'_>, dst: i32, left: i32, right: i32) -> JitResult<()> {
        let int = ValueKind::Int;
        let divisor = self.stack_reg(e, right, int, Reg::Eax | Reg::Edx)?;
        let dividend = if left == right {
            Rm::Reg(divisor)
        } else {
            self.operand(left, int, RegMask::EMPTY)
        };
        self.cache.invalidate(Reg::Eax);
        self.cache.invalidate(Reg::Edx);

        e.test(divisor, divisor)?;
        let nonzero = e.jcc_short(Cond::Ne)?;
        e.alu(AluOp::Xor, Reg::Eax, Reg::Eax)?;
        let zero_done = e.jmp_short()?;

        nonzero.resolve(e.buffer());
        self.move_to(e, Reg::Eax, dividend, int)?;
        e.alu_imm(AluOp::Cmp, Reg::Eax, i32::MIN)?;
        let not_min = e.jcc_short(Cond::Ne)?;
        e.alu_imm(AluOp::Cmp, divisor, -1)?;
        let not_minus_one = e.jcc_short(Cond::Ne)?;
        let overflow_done = e.jmp_short()?;

        not_min.resolve(e.buffer());
        not_minus_one.resolve(e.buffer());
        e.cdq()?;
        e.unary(UnaryOp::Idiv, divisor)?;

        zero_done.resolve(e.buffer());
        overflow_done.resolve(e.buffer());
        self.set_stack_reg(e, dst, Reg::Eax, int)
    }

    fn rem_signed(&mut self, e: &mut Encoder<'_>, dst: i32, left: i32, right: i32) -> JitResult<()> {
        let int = ValueKind::Int;
        let divisor = self.stack_reg(e, right, int, Reg::Eax | Reg::Edx)?;
        let dividend = if left == right {
            Rm::Reg(divisor)
        } else {
            self.operand(left, int, RegMask::EMPTY)
        };
        self.move_to(e, Reg::Eax, dividend, int)?;
        self.cache.invalidate(Reg::Eax);
        self.cache.invalidate(Reg::Edx);
        e.alu(AluOp::Xor, Reg::Edx, Reg::Edx)?;

        e.test(divisor, divisor)?;
        let zero = e.jcc_short(Cond::E)?;
        e.alu_imm(AluOp::Cmp, Reg::Eax, i32::MIN)?;
        let not_min = e.jcc_short(Cond::Ne)?;
        e.alu_imm(AluOp::Cmp, divisor, -1)?;
        let minus_one = e.jcc_short(Cond::E)?;

        not_min.resolve(e.buffer());
        e.cdq()?;
        e.unary(UnaryOp::Idiv, divisor)?;

        zero.resolve(e.buffer());
        minus_one.resolve(e.buffer());
        self.set_stack_reg(e, dst, Reg::Edx, int)
    }

    fn div_unsigned(
        &mut self,
        e: &mut Encoder<'_>,
        dst: i32,
        left: i32,
        right: i32,
        remainder: bool,
    ) -> JitResult<()> {
        let int = ValueKind::Int;
        let divisor = self.stack_reg(e, right, int, Reg::Eax | Reg::Edx)?;
        let dividend = if left == right {
            Rm::Reg(divisor)
        } else {
            self.operand(left, int, RegMask::EMPTY)
        };
        self.move_to(e, Reg::Eax, dividend, int)?;
        self.cache.invalidate(Reg::Eax);
        self.cache.invalidate(Reg::Edx);
        e.alu(AluOp::Xor, Reg::Edx, Reg::Edx)?;
        e.test(divisor, divisor)?;

        if remainder {
            let zero = e.jcc_short(Cond::E)?;
            e.unary(UnaryOp::Div, divisor)?;
            zero.resolve(e.buffer());
            return self.set_stack_reg(e, dst, Reg::Edx, int);
        }
        let nonzero = e.jcc_short(Cond::Ne)?;
        e.alu(AluOp::Xor, Reg::Eax, Reg::Eax)?;
        let done = e.jmp_short()?;
        nonzero.resolve(e.buffer());
        e.unary(UnaryOp::Div, divisor)?;
        done.resolve(e.buffer());
        self.set_stack_reg(e, dst, Reg::Eax, int)
    }

    /// `cmp left, right` then take `right` when `take_right` holds.
    fn min_max(&mut self, e: &mut Encoder<'_>, take_right: Cond, dst: i32, left: i32, right: i32) -> JitResult<()> {
        let int = ValueKind::Int;
        let reg = self.non_commutative(e, BinaryInstr::Alu(AluOp::Cmp), int, None, left, right, RegMask::EMPTY)?;
        let src = if left == right {
            Rm::Reg(reg)
        } else {
            self.operand(right, int, reg.mask())
        };
        self.cache.invalidate(reg);
        e.cmov(take_right, reg, src)?;
        self.set_stack_reg(e, dst, reg, int)
    }

    pub(super) fn int_compare(
        &mut self,
        e: &mut Encoder<'_>,
        cmp: IntCompare,
        dst: i32,
        left: i32,
        right: i32,
    ) -> JitResult<()> {
        let (dst, left, right) = (self.slot(dst), self.slot(left), self.slot(right));
        let int = ValueKind::Int;
        let result = self.cache.alloc(RegClass::General, RegMask::EMPTY);
        e.alu(AluOp::Xor, result, result)?;
        self.non_commutative(e, BinaryInstr::Alu(AluOp::Cmp), int, None, left, right, result.mask())?;
        e.jcc_rel8(cmp.cond().negate(), 1)?;
        e.inc(result)?;
        self.set_stack_reg(e, dst, result, int)
    }
}
