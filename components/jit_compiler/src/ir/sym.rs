//! Symbols: virtual registers, argument slots and parameters.

use super::{FuncId, InstrId};
use core_types::{Addr, TypeId};

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymKind {
    /// A virtual register
    Stack,
    /// An outgoing argument slot, 1-based with `this` in slot 1
    ArgSlot(u16),
    /// A register that mirrors an outgoing argument slot
    ArgSlotReg(u16),
    /// An incoming parameter, 1-based with `this` in slot 1
    Param(u16),
}

/// A constant a symbol is known to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstValue {
    /// A tagged integer
    Int(i32),
    /// A runtime value at a known address
    Var {
        /// Address of the value
        addr: Addr,
        /// Its type, when known
        type_id: Option<TypeId>,
    },
}

/// A symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Sym {
    /// Kind and slot
    pub kind: SymKind,
    /// Function the symbol belongs to
    pub func: FuncId,
    /// Defining instructions; a single entry means a single definition
    pub(crate) defs: Vec<InstrId>,
    /// Known to hold an ordinary object usable as `this` without conversion
    pub is_safe_this: bool,
    /// Argument slot whose value lives in an inlinee's frame
    pub is_inlined_arg_slot: bool,
    /// The argument's value has a byte-code capture
    pub is_arg_captured: bool,
    /// Stack offset of an inlined argument slot
    pub arg_offset: Option<i32>,
    /// Byte-code register this symbol came from, if any
    pub byte_code_reg_slot: Option<u32>,
    /// Profile says the value is likely a native array
    pub is_likely_native_array: bool,
}

impl Sym {
    pub(crate) fn new(kind: SymKind, func: FuncId) -> Self {
        Self {
            kind,
            func,
            defs: Vec::new(),
            is_safe_this: false,
            is_inlined_arg_slot: false,
            is_arg_captured: false,
            arg_offset: None,
            byte_code_reg_slot: None,
            is_likely_native_array: false,
        }
    }

    /// The defining instruction, when there is exactly one.
    pub fn single_def(&self) -> Option<InstrId> {
        match self.defs.as_slice() {
            [def] => Some(*def),
            _ => None,
        }
    }

    /// Whether the symbol is defined exactly once.
    pub fn is_single_def(&self) -> bool {
        self.defs.len() == 1
    }

    /// All defining instructions.
    pub fn defs(&self) -> &[InstrId] {
        &self.defs
    }

    /// The argument slot number of an argument-slot symbol.
    pub fn arg_slot(&self) -> Option<u16> {
        match self.kind {
            SymKind::ArgSlot(slot) => Some(slot),
            _ => None,
        }
    }

    /// The parameter number of a parameter symbol.
    pub fn param_slot(&self) -> Option<u16> {
        match self.kind {
            SymKind::Param(slot) => Some(slot),
            _ => None,
        }
    }
}
