//! 128-bit vector templates.
//!
//! Vectors are always stored with `movups`; frame slots are not assumed to
//! be 16-byte aligned, so packed operations only ever read registers or
//! the vector a slot was copied into.

use super::helpers::{copy, rm_mask};
use super::{SimdBinaryOp, SimdType, TemplateContext};
use crate::encoder::{Encoder, Mem, SseOp, SseStore};
use crate::registers::{Reg, RegClass, RegMask, ValueKind};
use core_types::JitResult;

/// How one lane-wise operation is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packed {
    /// An instruction, with the predicate immediate for compares
    Op(SseOp, Option<u8>),
    MulInt32,
}

const CMP_EQ: u8 = 0;
const CMP_LT: u8 = 1;
const CMP_LE: u8 = 2;
const CMP_NE: u8 = 4;

/// The encoding of `op` on `ty` and whether its operands are swapped.
fn packed(ty: SimdType, op: SimdBinaryOp) -> (Packed, bool) {
    use SimdBinaryOp::*;
    let (add, sub, mul, div, min, max, cmp) = match ty {
        SimdType::Float32x4 => (
            SseOp::Addps,
            SseOp::Subps,
            SseOp::Mulps,
            SseOp::Divps,
            SseOp::Minps,
            SseOp::Maxps,
            SseOp::Cmpps,
        ),
        SimdType::Float64x2 => (
            SseOp::Addpd,
            SseOp::Subpd,
            SseOp::Mulpd,
            SseOp::Divpd,
            SseOp::Minpd,
            SseOp::Maxpd,
            SseOp::Cmppd,
        ),
        SimdType::Int32x4 => {
            return match op {
                Add => (Packed::Op(SseOp::Paddd, None), false),
                Sub => (Packed::Op(SseOp::Psubd, None), false),
                Mul => (Packed::MulInt32, false),
                And => (Packed::Op(SseOp::Pand, None), false),
                Or => (Packed::Op(SseOp::Por, None), false),
                Xor => (Packed::Op(SseOp::Pxor, None), false),
                Eq => (Packed::Op(SseOp::Pcmpeqd, None), false),
                Gt => (Packed::Op(SseOp::Pcmpgtd, None), false),
                Lt => (Packed::Op(SseOp::Pcmpgtd, None), true),
                _ => panic!("{op} is not supported for {ty}"),
            };
        }
    };
    match op {
        Add => (Packed::Op(add, None), false),
        Sub => (Packed::Op(sub, None), false),
        Mul => (Packed::Op(mul, None), false),
        Div => (Packed::Op(div, None), false),
        Min => (Packed::Op(min, None), false),
        Max => (Packed::Op(max, None), false),
        And => (Packed::Op(SseOp::Andps, None), false),
        Or => (Packed::Op(SseOp::Orps, None), false),
        Xor => (Packed::Op(SseOp::Xorps, None), false),
        Eq => (Packed::Op(cmp, Some(CMP_EQ)), false),
        Ne => (Packed::Op(cmp, Some(CMP_NE)), false),
        Lt => (Packed::Op(cmp, Some(CMP_LT)), false),
        Le => (Packed::Op(cmp, Some(CMP_LE)), false),
        Gt => (Packed::Op(cmp, Some(CMP_LT)), true),
        Ge => (Packed::Op(cmp, Some(CMP_LE)), true),
    }
}

/// Kind a scalar lane slot is read as when moved into an SSE register.
fn lane_read_kind(ty: SimdType) -> ValueKind {
    match ty {
        SimdType::Float64x2 => ValueKind::Double,
        _ => ValueKind::Float,
    }
}

/// `shufps` selector exchanging lane 0 with `lane`.
fn swap_with_lane0(lane: u8) -> u8 {
    (0xe4 | lane) & !(3 << (lane * 2))
}

impl TemplateContext {
    pub(super) fn simd_splat(&mut self, e: &mut Encoder<'_>, ty: SimdType, dst: i32, src: i32) -> JitResult<()> {
        let (dst, src) = (self.slot(dst), self.slot(src));
        let reg = self.scratch_reg(e, src, lane_read_kind(ty), RegMask::EMPTY)?;
        match ty {
            SimdType::Float32x4 => e.sse_imm(SseOp::Shufps, reg, reg, 0)?,
            SimdType::Int32x4 => e.sse_imm(SseOp::Pshufd, reg, reg, 0)?,
            SimdType::Float64x2 => e.sse_imm(SseOp::Shufpd, reg, reg, 0)?,
        };
        self.set_stack_reg(e, dst, reg, ValueKind::Simd)
    }

    pub(super) fn simd_binary(
        &mut self,
        e: &mut Encoder<'_>,
        ty: SimdType,
        op: SimdBinaryOp,
        dst: i32,
        left: i32,
        right: i32,
    ) -> JitResult<()> {
        let (dst, left, right) = (self.slot(dst), self.slot(left), self.slot(right));
        let (packed, swap) = packed(ty, op);
        let (first, second) = if swap { (right, left) } else { (left, right) };
        let (op, predicate) = match packed {
            Packed::Op(op, predicate) => (op, predicate),
            Packed::MulInt32 => {
                let reg = self.mul_int32(e, first, second)?;
                return self.set_stack_reg(e, dst, reg, ValueKind::Simd);
            }
        };

        let src1 = self.operand(first, ValueKind::Simd, RegMask::EMPTY);
        let src2 = if first == second {
            None
        } else {
            Some(self.stack_reg(e, second, ValueKind::Simd, rm_mask(src1))?)
        };
        let busy = src2.map_or(rm_mask(src1), |reg| rm_mask(src1) | reg);
        let reg = self.cache.alloc(RegClass::Xmm, busy);
        copy(e, reg, src1, ValueKind::Simd)?;
        let src2 = src2.unwrap_or(reg);
        match predicate {
            Some(predicate) => e.sse_imm(op, reg, src2, predicate)?,
            None => e.sse(op, reg, src2)?,
        };
        self.set_stack_reg(e, dst, reg, ValueKind::Simd)
    }

    /// Low 32 bits of each lane product; SSE2 only multiplies the even lanes.
    fn mul_int32(&mut self, e: &mut Encoder<'_>, left: i32, right: i32) -> JitResult<Reg> {
        let a = self.stack_reg(e, left, ValueKind::Simd, RegMask::EMPTY)?;
        let b = if left == right {
            a
        } else {
            self.stack_reg(e, right, ValueKind::Simd, a.mask())?
        };
        let mut busy = a | b;
        let even = self.cache.alloc(RegClass::Xmm, busy);
        busy |= even;
        let odd = self.cache.alloc(RegClass::Xmm, busy);
        busy |= odd;
        let odd_b = self.cache.alloc(RegClass::Xmm, busy);

        e.sse(SseOp::Movaps, even, a)?;
        e.sse(SseOp::Pmuludq, even, b)?;
        e.sse(SseOp::Movaps, odd, a)?;
        e.psrldq(odd, 4)?;
        e.sse(SseOp::Movaps, odd_b, b)?;
        e.psrldq(odd_b, 4)?;
        e.sse(SseOp::Pmuludq, odd, odd_b)?;
        e.sse_imm(SseOp::Pshufd, even, even, 0x08)?;
        e.sse_imm(SseOp::Pshufd, odd, odd, 0x08)?;
        e.sse(SseOp::Punpckldq, even, odd)?;
        Ok(even)
    }

    pub(super) fn simd_extract_lane(
        &mut self,
        e: &mut Encoder<'_>,
        ty: SimdType,
        dst: i32,
        src: i32,
        lane: u8,
    ) -> JitResult<()> {
        assert!(lane < ty.lanes(), "lane {lane} out of range for {ty}");
        let (dst, src) = (self.slot(dst), self.slot(src));
        let vector = self.operand(src, ValueKind::Simd, RegMask::EMPTY);
        let reg = self.cache.alloc(RegClass::Xmm, rm_mask(vector));
        copy(e, reg, vector, ValueKind::Simd)?;
        let lane_bytes = lane * ty.lane_kind().width() as u8;
        if lane_bytes > 0 {
            e.psrldq(reg, lane_bytes)?;
        }
        match ty {
            // int lanes are stored from the SSE register and not cached
            SimdType::Int32x4 => {
                self.cache.overwrite_stack(dst, ValueKind::Int.width());
                e.sse_store(SseStore::Movss, Mem::frame(dst), reg)?;
                Ok(())
            }
            _ => self.set_stack_reg(e, dst, reg, ty.lane_kind()),
        }
    }

    pub(super) fn simd_replace_lane(
        &mut self,
        e: &mut Encoder<'_>,
        ty: SimdType,
        dst: i32,
        src: i32,
        value: i32,
        lane: u8,
    ) -> JitResult<()> {
        assert!(lane < ty.lanes(), "lane {lane} out of range for {ty}");
        let (dst, src, value) = (self.slot(dst), self.slot(src), self.slot(value));
        let vector = self.operand(src, ValueKind::Simd, RegMask::EMPTY);

        if ty == SimdType::Float64x2 && lane == 1 {
            let reg = self.cache.alloc(RegClass::Xmm, rm_mask(vector));
            copy(e, reg, vector, ValueKind::Simd)?;
            e.sse(SseOp::Movhpd, reg, Mem::frame(value))?;
            return self.set_stack_reg(e, dst, reg, ValueKind::Simd);
        }

        let scalar = self.stack_reg(e, value, lane_read_kind(ty), rm_mask(vector))?;
        let reg = self.cache.alloc(RegClass::Xmm, rm_mask(vector) | scalar);
        copy(e, reg, vector, ValueKind::Simd)?;
        match (ty, lane) {
            (SimdType::Float64x2, _) => {
                e.sse(SseOp::Movsd, reg, scalar)?;
            }
            (_, 0) => {
                e.sse(SseOp::Movss, reg, scalar)?;
            }
            (_, 2) => {
                let high = self.cache.alloc(RegClass::Xmm, rm_mask(vector) | scalar | reg);
                e.sse(SseOp::Movhlps, high, reg)?;
                e.sse(SseOp::Movss, high, scalar)?;
                e.sse(SseOp::Movlhps, reg, high)?;
            }
            (_, lane) => {
                let selector = swap_with_lane0(lane);
                e.sse_imm(SseOp::Shufps, reg, reg, selector)?;
                e.sse(SseOp::Movss, reg, scalar)?;
                e.sse_imm(SseOp::Shufps, reg, reg, selector)?;
            }
        }
        self.set_stack_reg(e, dst, reg, ValueKind::Simd)
    }
}
