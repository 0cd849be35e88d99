//! Operand plumbing shared by the templates.

use super::TemplateContext;
use crate::encoder::{AluOp, Encoder, Mem, Rm, SseOp, SseStore};
use crate::registers::{Reg, RegClass, RegMask, ValueKind, ARRAY_BUFFER_REG, MODULE_ENV_REG};
use crate::runtime::imm32;
use core_types::{Addr, JitResult};

/// An instruction of the form `op reg, reg/mem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BinaryInstr {
    Alu(AluOp),
    Imul,
    Sse(SseOp),
}

impl BinaryInstr {
    pub(super) fn emit(self, e: &mut Encoder<'_>, dst: Reg, src: Rm) -> JitResult<usize> {
        match self {
            BinaryInstr::Alu(op) => e.alu(op, dst, src),
            BinaryInstr::Imul => e.imul(dst, src),
            BinaryInstr::Sse(op) => e.sse(op, dst, src),
        }
    }

    /// Whether the first operand is written.
    pub(super) fn writes_dst(self) -> bool {
        !matches!(
            self,
            BinaryInstr::Alu(AluOp::Cmp)
                | BinaryInstr::Sse(SseOp::Ucomiss | SseOp::Ucomisd | SseOp::Comiss | SseOp::Comisd)
        )
    }
}

/// Registers an operand reads.
pub(super) fn rm_mask(rm: Rm) -> RegMask {
    match rm {
        Rm::Reg(reg) => reg.mask(),
        Rm::Mem(_) => RegMask::EMPTY,
    }
}

pub(super) fn load(e: &mut Encoder<'_>, reg: Reg, src: impl Into<Rm>, kind: ValueKind) -> JitResult<usize> {
    match kind {
        ValueKind::Int => e.mov(reg, src),
        ValueKind::Float => e.sse(SseOp::Movss, reg, src),
        ValueKind::Double => e.sse(SseOp::Movsd, reg, src),
        ValueKind::Simd => e.sse(SseOp::Movups, reg, src),
    }
}

pub(super) fn store(e: &mut Encoder<'_>, dst: Mem, reg: Reg, kind: ValueKind) -> JitResult<usize> {
    match kind {
        ValueKind::Int => e.mov_store(dst, reg),
        ValueKind::Float => e.sse_store(SseStore::Movss, dst, reg),
        ValueKind::Double => e.sse_store(SseStore::Movsd, dst, reg),
        ValueKind::Simd => e.sse_store(SseStore::Movups, dst, reg),
    }
}

/// Full register copy; a no-op when `dst == src`.
pub(super) fn copy(e: &mut Encoder<'_>, dst: Reg, src: Rm, kind: ValueKind) -> JitResult<usize> {
    match src {
        Rm::Reg(reg) if reg == dst => Ok(0),
        Rm::Reg(reg) if kind != ValueKind::Int => e.sse(SseOp::Movaps, dst, reg),
        src => load(e, dst, src, kind),
    }
}

impl TemplateContext {
    /// `ebp`-relative displacement of an operand offset.
    pub(super) fn slot(&self, offset: i32) -> i32 {
        self.frame_offset(offset)
    }

    /// A register or the frame slot holding `offset`; emits nothing.
    pub(super) fn operand(&self, offset: i32, kind: ValueKind, restriction: RegMask) -> Rm {
        match self.cache.find(offset, kind, restriction) {
            Some(reg) => Rm::Reg(reg),
            None => Rm::Mem(Mem::frame(offset)),
        }
    }

    /// A register holding the value at `offset`, loading it if no register does.
    pub(super) fn stack_reg(
        &mut self,
        e: &mut Encoder<'_>,
        offset: i32,
        kind: ValueKind,
        restriction: RegMask,
    ) -> JitResult<Reg> {
        if let Some(reg) = self.cache.find(offset, kind, restriction) {
            return Ok(reg);
        }
        let reg = self.cache.alloc(kind.class(), restriction);
        load(e, reg, Mem::frame(offset), kind)?;
        self.cache.set_stack_info(reg, offset, kind);
        Ok(reg)
    }

    /// Like [`TemplateContext::stack_reg`], but the register may be clobbered.
    pub(super) fn scratch_reg(
        &mut self,
        e: &mut Encoder<'_>,
        offset: i32,
        kind: ValueKind,
        restriction: RegMask,
    ) -> JitResult<Reg> {
        let reg = self.stack_reg(e, offset, kind, restriction)?;
        self.cache.invalidate(reg);
        Ok(reg)
    }

    /// Store `reg` to the slot at `offset` and remember that it mirrors it.
    pub(super) fn set_stack_reg(&mut self, e: &mut Encoder<'_>, offset: i32, reg: Reg, kind: ValueKind) -> JitResult<()> {
        self.cache.overwrite_stack(offset, kind.width());
        self.cache.set_stack_info(reg, offset, kind);
        store(e, Mem::frame(offset), reg, kind)?;
        Ok(())
    }

    /// Make the fixed register `dst` hold `src`; the cache entry of `dst` is
    /// dropped unless it already mirrored `src`.
    pub(super) fn move_to(&mut self, e: &mut Encoder<'_>, dst: Reg, src: Rm, kind: ValueKind) -> JitResult<()> {
        if src != Rm::Reg(dst) {
            self.cache.invalidate(dst);
            copy(e, dst, src, kind)?;
        }
        Ok(())
    }

    /// Call a runtime helper; every volatile register is lost.
    pub(super) fn call_helper(&mut self, e: &mut Encoder<'_>, helper: Addr) -> JitResult<()> {
        e.mov_imm(Reg::Eax, imm32(helper))?;
        e.call(Reg::Eax)?;
        self.cache.invalidate_volatile();
        Ok(())
    }

    /// Reload the heap base and length after anything that may have
    /// detached or grown the array buffer.
    pub(super) fn reload_array_buffer(&mut self, e: &mut Encoder<'_>) -> JitResult<()> {
        if self.function.fixed_heap {
            return Ok(());
        }
        let objects = self.config.objects.clone();
        let size_slot = self.slot(self.config.frame.array_size_offset);
        e.mov(ARRAY_BUFFER_REG, Mem::base(MODULE_ENV_REG, objects.memory_table_offset))?;
        let length = self.cache.alloc(RegClass::General, Reg::Eax.mask());
        e.mov(length, Mem::base(ARRAY_BUFFER_REG, objects.byte_length_offset))?;
        self.set_stack_reg(e, size_slot, length, ValueKind::Int)?;
        e.mov(ARRAY_BUFFER_REG, Mem::base(ARRAY_BUFFER_REG, objects.buffer_offset))?;
        Ok(())
    }

    /// `op left, right` with `left` in a register, which is returned.
    ///
    /// When `dst` is given the result is stored there.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn non_commutative(
        &mut self,
        e: &mut Encoder<'_>,
        instr: BinaryInstr,
        kind: ValueKind,
        dst: Option<i32>,
        left: i32,
        right: i32,
        restriction: RegMask,
    ) -> JitResult<Reg> {
        let reg = self.stack_reg(e, left, kind, restriction)?;
        let src = if left == right {
            Rm::Reg(reg)
        } else {
            self.operand(right, kind, restriction | reg)
        };
        if instr.writes_dst() {
            self.cache.invalidate(reg);
        }
        instr.emit(e, reg, src)?;
        if let Some(dst) = dst {
            self.set_stack_reg(e, dst, reg, kind)?;
        }
        Ok(reg)
    }

    /// `dst = left op right` for an operation whose operands may swap.
    pub(super) fn commutative(
        &mut self,
        e: &mut Encoder<'_>,
        instr: BinaryInstr,
        kind: ValueKind,
        dst: i32,
        left: i32,
        right: i32,
    ) -> JitResult<()> {
        let cached_left = self.cache.find(left, kind, RegMask::EMPTY);
        let cached_right = self.cache.find(right, kind, RegMask::EMPTY);
        let reg = match (cached_left, cached_right) {
            (Some(reg), Some(other)) => {
                self.cache.invalidate(reg);
                instr.emit(e, reg, Rm::Reg(other))?;
                reg
            }
            (Some(reg), None) => {
                self.cache.invalidate(reg);
                instr.emit(e, reg, Rm::Mem(Mem::frame(right)))?;
                reg
            }
            (None, Some(reg)) => {
                self.cache.invalidate(reg);
                instr.emit(e, reg, Rm::Mem(Mem::frame(left)))?;
                reg
            }
            (None, None) => {
                let reg = self.cache.alloc(kind.class(), RegMask::EMPTY);
                load(e, reg, Mem::frame(left), kind)?;
                let src = if left == right {
                    Rm::Reg(reg)
                } else {
                    Rm::Mem(Mem::frame(right))
                };
                instr.emit(e, reg, src)?;
                reg
            }
        };
        self.set_stack_reg(e, dst, reg, kind)
    }
}
