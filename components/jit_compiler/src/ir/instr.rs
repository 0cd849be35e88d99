//! Instructions.

use super::{BailOutId, FuncId, InstrId, OpCode, Opnd, SymId};
use crate::bailout::BailOutKind;
use core_types::{BuiltinFunction, ByteCodeOffset, ProfileId};

/// A bailout attached to a guard: what failed, and where to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BailOut {
    /// Why the guard fails
    pub kind: BailOutKind,
    /// Shared resume record
    pub record: BailOutId,
}

/// Label facts collected by the builder and the inliner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelInfo {
    /// Head of a loop
    pub is_loop_top: bool,
    /// Exit of a for-in loop
    pub is_for_in_exit: bool,
    /// Starts out-of-line helper code (bailout paths)
    pub is_helper: bool,
}

/// An instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    /// Operation
    pub opcode: OpCode,
    pub(crate) dst: Option<Opnd>,
    /// First source
    pub src1: Option<Opnd>,
    /// Second source; carries the argument link on calls and `ArgOut`s
    pub src2: Option<Opnd>,
    /// Branch target label
    pub target: Option<InstrId>,
    /// Owning function
    pub func: FuncId,
    /// Byte-code location
    pub offset: ByteCodeOffset,
    /// Profiled call-site id
    pub profile_id: Option<ProfileId>,
    /// Bailout of a guard
    pub bailout: Option<BailOut>,
    /// Call synthesized for an inlined getter or setter
    pub from_accessor: bool,
    /// Constructor invocation
    pub is_ctor_call: bool,
    /// Copy of a call made for polymorphic dispatch
    pub is_cloned: bool,
    /// Label facts
    pub label: LabelInfo,
    /// Symbols kept alive by `ByteCodeUses`
    pub uses: Vec<SymId>,
    /// Built-in opened by an `InlineBuiltInStart`
    pub built_in: Option<BuiltinFunction>,
    pub(crate) prev: Option<InstrId>,
    pub(crate) next: Option<InstrId>,
    pub(crate) linked: bool,
}

impl Instr {
    pub(crate) fn new(opcode: OpCode, func: FuncId) -> Self {
        Self {
            opcode,
            dst: None,
            src1: None,
            src2: None,
            target: None,
            func,
            offset: ByteCodeOffset::INVALID,
            profile_id: None,
            bailout: None,
            from_accessor: false,
            is_ctor_call: false,
            is_cloned: false,
            label: LabelInfo::default(),
            uses: Vec::new(),
            built_in: None,
            prev: None,
            next: None,
            linked: false,
        }
    }

    /// Destination operand. Use `Func::set_dst` to change it.
    pub fn dst(&self) -> Option<&Opnd> {
        self.dst.as_ref()
    }

    /// Symbol defined by this instruction.
    pub fn dst_sym(&self) -> Option<SymId> {
        self.dst.as_ref().and_then(Opnd::stack_sym)
    }

    /// Symbol of the argument link in src2.
    pub fn src2_sym(&self) -> Option<SymId> {
        self.src2.as_ref().and_then(Opnd::stack_sym)
    }

    /// Whether the instruction sits in a list.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Whether this is a label.
    pub fn is_label(&self) -> bool {
        self.opcode == OpCode::Label
    }

    /// Whether this instruction has a bailout.
    pub fn has_bailout(&self) -> bool {
        self.bailout.is_some()
    }
}
