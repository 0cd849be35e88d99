//! Argument chains.
//!
//! A call's outgoing arguments form a chain through src2:
//!
//! ```text
//! StartCall  s0 = count
//! ArgOut     a1 = this, s0
//! ArgOut     a2 = x,    a1
//! CallI      r  = f,    a2
//! ```
//!
//! Each `ArgOut` defines a fresh argument-slot symbol; the chain ends at a
//! register defined by `StartCall`.

use super::{Func, InstrId, OpCode, Opnd, SymId, SymKind};

impl Func {
    /// The `ArgOut`s of a call from the last argument to the first.
    ///
    /// Implicit receivers of specialized helper calls are skipped.
    pub fn iterate_arg_instrs(&self, call: InstrId) -> Vec<InstrId> {
        let mut args = Vec::new();
        let mut link = self.instr(call).src2.clone();
        while let Some(Opnd::Sym(sym)) = link {
            if !matches!(self.sym(sym).kind, SymKind::ArgSlot(_)) {
                break;
            }
            let Some(def) = self.sym(sym).single_def() else {
                break;
            };
            let instr = self.instr(def);
            link = instr.src2.clone();
            if instr.opcode != OpCode::ArgOutInlineSpecialized {
                args.push(def);
            }
        }
        args
    }

    /// The `StartCall` that opens a call's argument chain.
    pub fn start_call_of(&self, call: InstrId) -> Option<InstrId> {
        let mut link = self.instr(call).src2.clone();
        loop {
            match link? {
                Opnd::Sym(sym) => {
                    let def = self.sym(sym).single_def()?;
                    link = self.instr(def).src2.clone();
                }
                Opnd::Reg(sym) => {
                    let def = self.sym(sym).single_def()?;
                    return (self.instr(def).opcode == OpCode::StartCall).then_some(def);
                }
                _ => return None,
            }
        }
    }

    /// Whether the call passes no arguments, not even `this`.
    pub fn has_empty_arg_out_chain(&self, call: InstrId) -> bool {
        let Some(Opnd::Reg(sym)) = self.instr(call).src2 else {
            return false;
        };
        self.sym(sym)
            .single_def()
            .is_some_and(|def| self.instr(def).opcode == OpCode::StartCall)
    }

    /// Argument count recorded on a `StartCall`.
    pub fn start_call_count(&self, start: InstrId) -> u32 {
        let instr = self.instr(start);
        assert_eq!(instr.opcode, OpCode::StartCall, "not a StartCall: {}", instr.opcode);
        instr
            .src1
            .as_ref()
            .and_then(Opnd::as_int_const)
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(0)
    }

    /// Overwrite the argument count of a `StartCall`.
    pub fn set_start_call_count(&mut self, start: InstrId, count: u32) {
        self.instr_mut(start).src1 = Some(Opnd::IntConst(i64::from(count)));
    }

    /// Number of arguments, including `this`, passed by a call.
    pub fn count_actuals(&self, call: InstrId) -> u32 {
        self.iterate_arg_instrs(call).len() as u32
    }

    /// Argument slot defined by an `ArgOut`.
    pub fn arg_slot_of(&self, arg: InstrId) -> Option<u16> {
        self.instr(arg).dst_sym().and_then(|sym| self.sym(sym).arg_slot())
    }

    /// Copy an argument's value into a byte-code capture register, so the
    /// value stays observable for bailouts after the `ArgOut` is rewritten.
    ///
    /// Returns the capture, or `None` when the argument is already captured.
    pub fn generate_bytecode_arg_out_capture(&mut self, arg: InstrId) -> Option<InstrId> {
        self.capture_arg(arg, OpCode::BytecodeArgOutCapture)
    }

    /// Snapshot an argument's value into a plain register copy.
    pub fn generate_arg_out_snapshot(&mut self, arg: InstrId) -> Option<InstrId> {
        self.capture_arg(arg, OpCode::Ld)
    }

    fn capture_arg(&mut self, arg: InstrId, opcode: OpCode) -> Option<InstrId> {
        let slot_sym = self.instr(arg).dst_sym()?;
        if self.sym(slot_sym).is_arg_captured {
            return None;
        }
        let slot = self.sym(slot_sym).arg_slot().unwrap_or(0);
        let func = self.instr(arg).func;
        let tmp = self.new_sym(SymKind::ArgSlotReg(slot), func);
        let src = self.unlink_src1(arg);
        let capture = self.create(opcode, func, Some(Opnd::Reg(tmp)), src, None);
        self.insert_before(arg, capture);
        self.tag_with_source_location(capture, arg);
        self.instr_mut(arg).src1 = Some(Opnd::Reg(tmp));
        self.sym_mut(slot_sym).is_arg_captured = true;
        Some(capture)
    }

    /// The capture register feeding an `ArgOut`, when it has one.
    pub fn arg_capture_sym(&self, arg: InstrId) -> Option<SymId> {
        let src = self.instr(arg).src1.as_ref()?.as_reg()?;
        matches!(self.sym(src).kind, SymKind::ArgSlotReg(_)).then_some(src)
    }

    /// Move a call's arguments down next to it, optionally capturing each
    /// value first.
    pub fn move_args(&mut self, call: InstrId, capture: bool) {
        let mut insert_before = call;
        for arg in self.iterate_arg_instrs(call) {
            if capture {
                self.generate_bytecode_arg_out_capture(arg);
            }
            self.move_before(insert_before, arg);
            insert_before = arg;
        }
    }
}
