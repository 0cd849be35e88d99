//! Labels, branches, prologue and epilogue.

use super::{BranchOperand, LabelId, TemplateContext};
use crate::encoder::{AluOp, Cond, Encoder, Mem, Rm};
use crate::registers::{Reg, RegMask, ValueKind, ARRAY_BUFFER_REG, MODULE_ENV_REG};
use crate::runtime::{align8, imm32};
use core_types::{JitError, JitResult};

const SAVED_REGS: [Reg; 3] = [Reg::Ebx, Reg::Esi, Reg::Edi];

impl TemplateContext {
    pub(super) fn label(&mut self, e: &mut Encoder<'_>, label: LabelId) -> JitResult<()> {
        self.cache.invalidate_all();
        self.bind_label(e, label);
        Ok(())
    }

    fn count_back_edge(&mut self, e: &mut Encoder<'_>, back_edge: bool) -> JitResult<()> {
        if back_edge {
            e.inc_mem(Mem::absolute(imm32(self.runtime.loop_counter)))?;
        }
        Ok(())
    }

    pub(super) fn br(&mut self, e: &mut Encoder<'_>, target: LabelId, back_edge: bool) -> JitResult<()> {
        self.count_back_edge(e, back_edge)?;
        let field = e.jmp_near()?;
        self.jump_to(e, field, target);
        Ok(())
    }

    pub(super) fn br_true(&mut self, e: &mut Encoder<'_>, src: i32, target: LabelId, back_edge: bool) -> JitResult<()> {
        let src = self.slot(src);
        self.count_back_edge(e, back_edge)?;
        let operand = self.operand(src, ValueKind::Int, RegMask::EMPTY);
        e.alu_imm(AluOp::Cmp, operand, 0)?;
        let field = e.jcc_near(Cond::Ne)?;
        self.jump_to(e, field, target);
        Ok(())
    }

    pub(super) fn br_eq(
        &mut self,
        e: &mut Encoder<'_>,
        left: i32,
        right: BranchOperand,
        target: LabelId,
        back_edge: bool,
    ) -> JitResult<()> {
        let left = self.slot(left);
        self.count_back_edge(e, back_edge)?;
        let field = match right {
            BranchOperand::Const(value) => {
                let operand = self.operand(left, ValueKind::Int, RegMask::EMPTY);
                e.alu_imm(AluOp::Cmp, operand, value)?;
                e.jcc_near(Cond::E)?
            }
            BranchOperand::Slot(right) if self.slot(right) == left => e.jmp_near()?,
            BranchOperand::Slot(right) => {
                let right = self.slot(right);
                let reg = self.stack_reg(e, left, ValueKind::Int, RegMask::EMPTY)?;
                let operand = self.operand(right, ValueKind::Int, reg.mask());
                e.alu(AluOp::Cmp, reg, operand)?;
                e.jcc_near(Cond::E)?
            }
        };
        self.jump_to(e, field, target);
        Ok(())
    }

    /// Frame setup, stack probe, argument copy and the pinned registers.
    pub(super) fn function_entry(&mut self, e: &mut Encoder<'_>) -> JitResult<()> {
        let frame = align8(self.function.frame_size);
        if frame > self.config.max_frame_size {
            return Err(JitError::out_of_stack(format!(
                "frame of {frame} bytes exceeds the {} byte limit",
                self.config.max_frame_size
            )));
        }
        let frame = frame as i32;

        e.push(Reg::Ebp)?;
        e.mov(Reg::Ebp, Reg::Esp)?;

        // the probe helper throws when the stack cannot grow by `frame`
        let limit = imm32(self.runtime.stack_limit).wrapping_add(frame);
        e.alu_imm(AluOp::Cmp, Reg::Esp, limit)?;
        let enough_stack = e.jcc_short(Cond::A)?;
        e.push_imm(imm32(self.runtime.script_context))?;
        e.push_imm(frame)?;
        e.mov_imm(Reg::Eax, imm32(self.runtime.probe_stack))?;
        e.call(Reg::Eax)?;
        e.alu_imm(AluOp::Add, Reg::Esp, 8)?;
        enough_stack.resolve(e.buffer());

        if frame as u32 <= self.config.page_size {
            if frame > 0 {
                e.alu_imm(AluOp::Sub, Reg::Esp, frame)?;
            }
        } else {
            // the helper moves esp itself after touching each page
            e.mov_imm(Reg::Eax, frame)?;
            e.mov_imm(Reg::Ecx, imm32(self.runtime.chkstk))?;
            e.call(Reg::Ecx)?;
        }

        if self.runtime.entry_helper.0 != 0 {
            e.push(Reg::Ebp)?;
            e.push_mem(Mem::base(Reg::Ebp, 8))?;
            e.mov_imm(Reg::Eax, imm32(self.runtime.entry_helper))?;
            e.call(Reg::Eax)?;
            e.alu_imm(AluOp::Add, Reg::Esp, 8)?;
        }

        for reg in SAVED_REGS {
            e.push(reg)?;
        }
        let env = self.slot(self.config.frame.module_env_offset);
        let buffer = self.slot(self.config.frame.array_buffer_offset);
        e.mov(MODULE_ENV_REG, Rm::Mem(Mem::frame(env)))?;
        e.mov(ARRAY_BUFFER_REG, Rm::Mem(Mem::frame(buffer)))?;
        self.reload_array_buffer(e)?;
        self.cache.invalidate_all();
        Ok(())
    }

    /// Restores the saved registers and pops the arguments and function object.
    pub(super) fn function_exit(&mut self, e: &mut Encoder<'_>) -> JitResult<()> {
        let pop_bytes = align8(self.function.arg_bytes) + 4;
        let pop_bytes = u16::try_from(pop_bytes)
            .map_err(|_| JitError::out_of_stack(format!("{pop_bytes} bytes of arguments cannot be popped by ret")))?;
        for reg in SAVED_REGS.iter().rev() {
            e.pop(*reg)?;
        }
        e.mov(Reg::Esp, Reg::Ebp)?;
        e.pop(Reg::Ebp)?;
        e.ret(pop_bytes)?;
        Ok(())
    }
}
