//! Module slots, typed arrays and calls.

use super::helpers::{load, store};
use super::{ArrayView, OutgoingCall, TemplateContext};
use crate::code_buffer::Relocation;
use crate::encoder::{AluOp, Cond, Encoder, Mem, SseOp, SseStore};
use crate::registers::{Reg, RegMask, ValueKind, ARRAY_BUFFER_REG, BYTE_REGS, MODULE_ENV_REG};
use crate::runtime::{align8, imm32};
use core_types::JitResult;

fn env_slot(kind: ValueKind, slot: u32) -> Mem {
    Mem::base(MODULE_ENV_REG, slot as i32 * kind.width())
}

impl TemplateContext {
    pub(super) fn ld_slot(&mut self, e: &mut Encoder<'_>, kind: ValueKind, dst: i32, slot: u32) -> JitResult<()> {
        let dst = self.slot(dst);
        let reg = self.cache.alloc(kind.class(), RegMask::EMPTY);
        load(e, reg, env_slot(kind, slot), kind)?;
        self.set_stack_reg(e, dst, reg, kind)
    }

    pub(super) fn st_slot(&mut self, e: &mut Encoder<'_>, kind: ValueKind, src: i32, slot: u32) -> JitResult<()> {
        let src = self.slot(src);
        let reg = self.stack_reg(e, src, kind, RegMask::EMPTY)?;
        store(e, env_slot(kind, slot), reg, kind)?;
        Ok(())
    }

    /// Masks `index` down to an element boundary and compares it with the
    /// heap length; the returned jump is taken when out of bounds.
    fn bounds_check(&mut self, e: &mut Encoder<'_>, view: ArrayView, index: Reg) -> JitResult<Relocation> {
        if let Some(mask) = view.index_mask() {
            self.cache.invalidate(index);
            e.alu_imm(AluOp::And, index, mask)?;
        }
        let length = self.slot(self.config.frame.array_size_offset);
        e.alu_store(AluOp::Cmp, Mem::frame(length), index)?;
        e.jcc_short(Cond::Be)
    }

    pub(super) fn ld_arr(&mut self, e: &mut Encoder<'_>, view: ArrayView, dst: i32, index: i32) -> JitResult<()> {
        let (dst, index) = (self.slot(dst), self.slot(index));
        let kind = view.value_kind();
        let index = self.stack_reg(e, index, ValueKind::Int, RegMask::EMPTY)?;
        let result = self.cache.alloc(kind.class(), index.mask());
        let out_of_bounds = self.bounds_check(e, view, index)?;

        let element = Mem::indexed(ARRAY_BUFFER_REG, index, 1, 0);
        match view {
            ArrayView::Int8 => e.mov_extend(result, element, 8, true)?,
            ArrayView::Uint8 => e.mov_extend(result, element, 8, false)?,
            ArrayView::Int16 => e.mov_extend(result, element, 16, true)?,
            ArrayView::Uint16 => e.mov_extend(result, element, 16, false)?,
            ArrayView::Int32 | ArrayView::Uint32 => e.mov(result, element)?,
            ArrayView::Float32 => e.sse(SseOp::Movss, result, element)?,
            ArrayView::Float64 => e.sse(SseOp::Movsd, result, element)?,
        };
        self.set_stack_reg(e, dst, result, kind)?;
        let done = e.jmp_short()?;

        // leave the same cache state as the in-bounds path
        out_of_bounds.resolve(e.buffer());
        let nan = Mem::absolute(imm32(self.runtime.nan_double));
        match kind {
            ValueKind::Int => {
                e.mov_mem_imm(Mem::frame(dst), 0)?;
                e.alu(AluOp::Xor, result, result)?;
            }
            ValueKind::Float => {
                e.sse(SseOp::Movsd, result, nan)?;
                e.sse(SseOp::Cvtsd2ss, result, result)?;
                store(e, Mem::frame(dst), result, kind)?;
            }
            _ => {
                e.sse(SseOp::Movsd, result, nan)?;
                store(e, Mem::frame(dst), result, kind)?;
            }
        }
        done.resolve(e.buffer());
        Ok(())
    }

    pub(super) fn st_arr(&mut self, e: &mut Encoder<'_>, view: ArrayView, src: i32, index: i32) -> JitResult<()> {
        let (src, index) = (self.slot(src), self.slot(index));
        let kind = view.value_kind();
        let index = self.stack_reg(e, index, ValueKind::Int, RegMask::EMPTY)?;
        let restriction = match view.element_size() {
            1 => index.mask() | !BYTE_REGS,
            _ => index.mask(),
        };
        // loaded before the bounds check so both paths agree on the cache
        let value = self.stack_reg(e, src, kind, restriction)?;
        let out_of_bounds = self.bounds_check(e, view, index)?;

        let element = Mem::indexed(ARRAY_BUFFER_REG, index, 1, 0);
        match view {
            ArrayView::Int8 | ArrayView::Uint8 => e.mov_store_narrow(element, value, 8)?,
            ArrayView::Int16 | ArrayView::Uint16 => e.mov_store_narrow(element, value, 16)?,
            ArrayView::Int32 | ArrayView::Uint32 => e.mov_store(element, value)?,
            ArrayView::Float32 => e.sse_store(SseStore::Movss, element, value)?,
            ArrayView::Float64 => e.sse_store(SseStore::Movsd, element, value)?,
        };
        out_of_bounds.resolve(e.buffer());
        Ok(())
    }

    pub(super) fn start_call(&mut self, e: &mut Encoder<'_>, arg_bytes: u32) -> JitResult<()> {
        assert!(self.call.is_none(), "StartCall inside an open call sequence");
        let reserved = align8(arg_bytes) as i32;
        if reserved > 0 {
            e.alu_imm(AluOp::Sub, Reg::Esp, reserved)?;
        }
        self.call = Some(OutgoingCall {
            next_offset: 0,
            reserved,
        });
        Ok(())
    }

    pub(super) fn arg_out(&mut self, e: &mut Encoder<'_>, kind: ValueKind, src: i32) -> JitResult<()> {
        let src = self.slot(src);
        let Some(call) = self.call else {
            panic!("ArgOut outside a call sequence");
        };
        let next = call.next_offset + kind.width();
        assert!(
            next <= call.reserved,
            "argument area of {} bytes overflows at {next}",
            call.reserved
        );
        let reg = self.stack_reg(e, src, kind, RegMask::EMPTY)?;
        store(e, Mem::base(Reg::Esp, call.next_offset), reg, kind)?;
        self.call = Some(OutgoingCall {
            next_offset: next,
            ..call
        });
        Ok(())
    }

    /// The callee pops its arguments and the function object.
    pub(super) fn call_function(
        &mut self,
        e: &mut Encoder<'_>,
        func: i32,
        result: Option<(ValueKind, i32)>,
    ) -> JitResult<()> {
        let func = self.slot(func);
        assert!(self.call.is_some(), "Call without StartCall");
        let objects = self.config.objects.clone();
        let reg = self.stack_reg(e, func, ValueKind::Int, RegMask::EMPTY)?;
        e.push(reg)?;
        e.mov(Reg::Eax, Mem::base(reg, objects.type_offset))?;
        e.mov(Reg::Eax, Mem::base(Reg::Eax, objects.entry_point_info_offset))?;
        e.call(Mem::base(Reg::Eax, objects.address_offset))?;
        self.cache.invalidate_volatile();
        self.call = None;
        self.reload_array_buffer(e)?;
        if let Some((kind, dst)) = result {
            let dst = self.slot(dst);
            let ret = match kind {
                ValueKind::Int => Reg::Eax,
                _ => Reg::Xmm0,
            };
            self.set_stack_reg(e, dst, ret, kind)?;
        }
        Ok(())
    }

    pub(super) fn set_return(&mut self, e: &mut Encoder<'_>, kind: ValueKind, src: i32) -> JitResult<()> {
        let src = self.slot(src);
        let ret = match kind {
            ValueKind::Int => Reg::Eax,
            _ => Reg::Xmm0,
        };
        let operand = self.operand(src, kind, RegMask::EMPTY);
        self.move_to(e, ret, operand, kind)?;
        self.cache.set_stack_info(ret, src, kind);
        Ok(())
    }
}
