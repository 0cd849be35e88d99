//! The compilation arena and per-function records.

use super::{BailOut, BailOutId, ConstValue, FuncId, Instr, InstrId, OpCode, Opnd, Sym, SymId, SymKind};
use crate::bailout::BailOutKind;
use core_types::{ByteCodeOffset, ConstructorCache, FunctionJitTimeInfo, ProfileId, ScriptContextInfo};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use typed_index_collections::TiVec;

/// Where execution resumes when a guard fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BailOutInfo {
    /// Kind of the guard that created the record
    pub kind: BailOutKind,
    /// Byte-code location to resume at
    pub offset: ByteCodeOffset,
    /// Function (top or inlinee) the location belongs to
    pub func: FuncId,
}

/// Per-function data: the top-level function and each inlinee have one.
#[derive(Debug, Clone)]
pub struct FuncData {
    /// Profile record of the function
    pub jit_info: Arc<FunctionJitTimeInfo>,
    /// Head sentinel
    pub head: InstrId,
    /// Tail sentinel
    pub tail: InstrId,
    /// Function this one is inlined into
    pub parent: Option<FuncId>,
    /// Inlined as a constructor
    pub is_inlined_ctor: bool,
    /// Inlined getter or setter
    pub is_getter_setter: bool,
    /// The function is a jitted loop body
    pub is_loop_body: bool,
    /// The inlinee touches `arguments` in a way that needs real argument slots
    pub has_unoptimized_arguments_access: bool,
    /// An `.apply` target was inlined into this function, so `arguments`
    /// may be forwarded through stack arguments
    pub has_apply_target_inlining: bool,
    /// Actual argument count, including `this`
    pub actual_count: u32,
    /// First meta-argument slot of the inlinee frame
    pub frame_start_sym: Option<SymId>,
    /// Call site this function was inlined at
    pub call_site_id: ProfileId,
    /// Inline nesting below the top function
    pub inline_depth: u32,
    /// For-in depth of the caller at the call site
    pub for_in_base_depth: u32,
    /// Deepest for-in nesting reachable from this function
    pub for_in_max_depth: u32,
    /// At least one call site was inlined into this function
    pub has_inlinee: bool,
    /// The arguments object may be kept on the stack
    pub has_stack_args: bool,
    /// Extra argument slots added per call site by stack-argument expansion
    pub call_site_to_arguments_offset_fixup: HashMap<ProfileId, u32>,
    /// Constructor caches claimed by fixed-method `new` calls, per call site
    pub constructor_caches: HashMap<ProfileId, ConstructorCache>,
}

impl FuncData {
    fn new(jit_info: Arc<FunctionJitTimeInfo>, head: InstrId, tail: InstrId, parent: Option<FuncId>) -> Self {
        Self {
            jit_info,
            head,
            tail,
            parent,
            is_inlined_ctor: false,
            is_getter_setter: false,
            is_loop_body: false,
            has_unoptimized_arguments_access: false,
            has_apply_target_inlining: false,
            actual_count: 0,
            frame_start_sym: None,
            call_site_id: 0,
            inline_depth: 0,
            for_in_base_depth: 0,
            for_in_max_depth: 0,
            has_inlinee: false,
            has_stack_args: false,
            call_site_to_arguments_offset_fixup: HashMap::new(),
            constructor_caches: HashMap::new(),
        }
    }
}

/// The arena of one compilation.
///
/// # Examples
///
/// ```
/// use core_types::{Addr, FunctionBodyInfo, FunctionJitTimeInfo, ScriptContextInfo};
/// use jit_compiler::ir::{Func, FuncId, OpCode, Opnd};
/// use std::sync::Arc;
///
/// let body = Arc::new(FunctionBodyInfo::new(1, "main", Addr(0x1000), 1));
/// let info = Arc::new(FunctionJitTimeInfo::script(Addr(0x100), body));
/// let mut func = Func::new(info, Arc::new(ScriptContextInfo::default()));
///
/// let r = func.new_reg(FuncId::TOP);
/// let ld = func.create(OpCode::LdConstI4, FuncId::TOP, Some(Opnd::Reg(r)), Some(Opnd::IntConst(5)), None);
/// func.append(FuncId::TOP, ld);
///
/// assert_eq!(func.opcodes(FuncId::TOP), vec![OpCode::LdConstI4]);
/// assert_eq!(func.sym(r).single_def(), Some(ld));
/// ```
#[derive(Debug, Clone)]
pub struct Func {
    instrs: TiVec<InstrId, Instr>,
    syms: TiVec<SymId, Sym>,
    funcs: TiVec<FuncId, FuncData>,
    bailouts: TiVec<BailOutId, BailOutInfo>,
    script_context: Arc<ScriptContextInfo>,
}

impl Func {
    /// Create the arena with the top-level function's empty list.
    pub fn new(jit_info: Arc<FunctionJitTimeInfo>, script_context: Arc<ScriptContextInfo>) -> Self {
        let mut func = Self {
            instrs: TiVec::new(),
            syms: TiVec::new(),
            funcs: TiVec::new(),
            bailouts: TiVec::new(),
            script_context,
        };
        func.add_func(None, jit_info);
        func
    }

    fn add_func(&mut self, parent: Option<FuncId>, jit_info: Arc<FunctionJitTimeInfo>) -> FuncId {
        let id = FuncId::from(self.funcs.len());
        let head = self.instrs.push_and_get_key(Instr::new(OpCode::FunctionEntry, id));
        let tail = self.instrs.push_and_get_key(Instr::new(OpCode::FunctionExit, id));
        self.instrs[head].next = Some(tail);
        self.instrs[head].linked = true;
        self.instrs[tail].prev = Some(head);
        self.instrs[tail].linked = true;
        let inline_depth = parent.map_or(0, |p| self.funcs[p].inline_depth + 1);
        let mut data = FuncData::new(jit_info, head, tail, parent);
        data.inline_depth = inline_depth;
        self.funcs.push_and_get_key(data)
    }

    /// Create an inlinee function with an empty list.
    pub fn new_inlinee(&mut self, parent: FuncId, jit_info: Arc<FunctionJitTimeInfo>) -> FuncId {
        self.add_func(Some(parent), jit_info)
    }

    /// Runtime addresses of the script context being compiled for.
    pub fn script_context(&self) -> &ScriptContextInfo {
        &self.script_context
    }

    /// Per-function data.
    pub fn data(&self, func: FuncId) -> &FuncData {
        &self.funcs[func]
    }

    /// Mutable per-function data.
    pub fn data_mut(&mut self, func: FuncId) -> &mut FuncData {
        &mut self.funcs[func]
    }

    /// Number of functions (top plus inlinees).
    pub fn func_count(&self) -> usize {
        self.funcs.len()
    }

    /// An instruction.
    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id]
    }

    /// A mutable instruction.
    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instr {
        &mut self.instrs[id]
    }

    /// A symbol.
    pub fn sym(&self, id: SymId) -> &Sym {
        &self.syms[id]
    }

    /// A mutable symbol.
    pub fn sym_mut(&mut self, id: SymId) -> &mut Sym {
        &mut self.syms[id]
    }

    /// A bailout record.
    pub fn bailout(&self, id: BailOutId) -> &BailOutInfo {
        &self.bailouts[id]
    }

    /// Head sentinel of a function.
    pub fn head(&self, func: FuncId) -> InstrId {
        self.funcs[func].head
    }

    /// Tail sentinel of a function.
    pub fn tail(&self, func: FuncId) -> InstrId {
        self.funcs[func].tail
    }

    /// Successor in the list.
    pub fn next(&self, id: InstrId) -> Option<InstrId> {
        self.instrs[id].next
    }

    /// Predecessor in the list.
    pub fn prev(&self, id: InstrId) -> Option<InstrId> {
        self.instrs[id].prev
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    /// Create a symbol.
    pub fn new_sym(&mut self, kind: SymKind, func: FuncId) -> SymId {
        self.syms.push_and_get_key(Sym::new(kind, func))
    }

    /// Create a virtual register.
    pub fn new_reg(&mut self, func: FuncId) -> SymId {
        self.new_sym(SymKind::Stack, func)
    }

    /// Create an outgoing argument slot symbol.
    pub fn new_arg_slot_sym(&mut self, slot: u16, func: FuncId) -> SymId {
        self.new_sym(SymKind::ArgSlot(slot), func)
    }

    /// Create an unlinked instruction.
    pub fn new_instr(&mut self, opcode: OpCode, func: FuncId) -> InstrId {
        self.instrs.push_and_get_key(Instr::new(opcode, func))
    }

    /// Create an unlinked instruction with operands.
    pub fn create(
        &mut self,
        opcode: OpCode,
        func: FuncId,
        dst: Option<Opnd>,
        src1: Option<Opnd>,
        src2: Option<Opnd>,
    ) -> InstrId {
        let id = self.new_instr(opcode, func);
        self.instrs[id].src1 = src1;
        self.instrs[id].src2 = src2;
        self.set_dst(id, dst);
        id
    }

    /// Create an unlinked label.
    pub fn new_label(&mut self, func: FuncId, is_helper: bool) -> InstrId {
        let id = self.new_instr(OpCode::Label, func);
        self.instrs[id].label.is_helper = is_helper;
        id
    }

    /// Create an unlinked branch to `target`.
    pub fn new_branch(
        &mut self,
        opcode: OpCode,
        func: FuncId,
        target: InstrId,
        src1: Option<Opnd>,
        src2: Option<Opnd>,
    ) -> InstrId {
        debug_assert!(opcode.is_branch());
        let id = self.create(opcode, func, None, src1, src2);
        self.instrs[id].target = Some(target);
        id
    }

    /// Create an unlinked `ByteCodeUses` keeping `syms` alive.
    pub fn new_byte_code_uses(&mut self, func: FuncId, syms: Vec<SymId>) -> InstrId {
        let id = self.new_instr(OpCode::ByteCodeUses, func);
        self.instrs[id].uses = syms;
        id
    }

    // ---------------------------------------------------------------------
    // Operands
    // ---------------------------------------------------------------------

    /// Replace the destination, keeping symbol definitions current.
    pub fn set_dst(&mut self, id: InstrId, dst: Option<Opnd>) {
        self.unlink_dst(id);
        if let Some(sym) = dst.as_ref().and_then(Opnd::stack_sym) {
            self.syms[sym].defs.push(id);
        }
        self.instrs[id].dst = dst;
    }

    /// Detach and return the destination.
    pub fn unlink_dst(&mut self, id: InstrId) -> Option<Opnd> {
        let dst = self.instrs[id].dst.take();
        if let Some(sym) = dst.as_ref().and_then(Opnd::stack_sym) {
            self.syms[sym].defs.retain(|def| *def != id);
        }
        dst
    }

    /// Detach and return src1.
    pub fn unlink_src1(&mut self, id: InstrId) -> Option<Opnd> {
        self.instrs[id].src1.take()
    }

    /// Detach and return src2.
    pub fn unlink_src2(&mut self, id: InstrId) -> Option<Opnd> {
        self.instrs[id].src2.take()
    }

    /// The constant a symbol holds, derived from its single definition.
    pub fn const_value(&self, sym: SymId) -> Option<ConstValue> {
        let def = self.instr(self.sym(sym).single_def()?);
        match (def.opcode, def.src1.as_ref()?) {
            (OpCode::LdConstI4 | OpCode::Ld, Opnd::IntConst(value)) => i32::try_from(*value).ok().map(ConstValue::Int),
            (OpCode::Ld, Opnd::Addr(addr)) => Some(ConstValue::Var {
                addr: addr.addr,
                type_id: addr.value_type,
            }),
            _ => None,
        }
    }

    /// Whether a symbol holds an int32 constant.
    pub fn is_int_const(&self, sym: SymId) -> bool {
        matches!(self.const_value(sym), Some(ConstValue::Int(_)))
    }

    // ---------------------------------------------------------------------
    // List editing
    // ---------------------------------------------------------------------

    /// Link unlinked `new` in front of `at`.
    pub fn insert_before(&mut self, at: InstrId, new: InstrId) {
        assert!(!self.instrs[new].linked, "instruction {new} is already linked");
        let prev = self.instrs[at].prev;
        self.instrs[new].prev = prev;
        self.instrs[new].next = Some(at);
        self.instrs[new].linked = true;
        self.instrs[at].prev = Some(new);
        if let Some(prev) = prev {
            self.instrs[prev].next = Some(new);
        }
        if !self.instrs[new].offset.is_valid() {
            self.instrs[new].offset = self.instrs[at].offset;
        }
    }

    /// Link unlinked `new` after `at`.
    pub fn insert_after(&mut self, at: InstrId, new: InstrId) {
        assert!(!self.instrs[new].linked, "instruction {new} is already linked");
        let next = self.instrs[at].next;
        self.instrs[new].next = next;
        self.instrs[new].prev = Some(at);
        self.instrs[new].linked = true;
        self.instrs[at].next = Some(new);
        if let Some(next) = next {
            self.instrs[next].prev = Some(new);
        }
        if !self.instrs[new].offset.is_valid() {
            self.instrs[new].offset = self.instrs[at].offset;
        }
    }

    /// Append before the tail sentinel of `func`.
    pub fn append(&mut self, func: FuncId, new: InstrId) {
        let tail = self.tail(func);
        self.insert_before(tail, new);
    }

    /// Take an instruction out of its list; its operands stay intact.
    pub fn unlink(&mut self, id: InstrId) {
        if !self.instrs[id].linked {
            return;
        }
        let (prev, next) = (self.instrs[id].prev, self.instrs[id].next);
        if let Some(prev) = prev {
            self.instrs[prev].next = next;
        }
        if let Some(next) = next {
            self.instrs[next].prev = prev;
        }
        let instr = &mut self.instrs[id];
        instr.prev = None;
        instr.next = None;
        instr.linked = false;
    }

    /// Delete an instruction: unlink it and drop its definition.
    pub fn remove(&mut self, id: InstrId) {
        self.unlink(id);
        self.unlink_dst(id);
    }

    /// Move a linked instruction in front of `at`.
    pub fn move_before(&mut self, at: InstrId, id: InstrId) {
        self.unlink(id);
        self.insert_before(at, id);
    }

    /// Splice the linked chain `first..=last` in front of `at`.
    ///
    /// The chain's outer neighbours are left pointing into it; callers free
    /// them right after (they are always the sentinels of an inlinee).
    pub fn insert_range_before(&mut self, at: InstrId, first: InstrId, last: InstrId) {
        let prev = self.instrs[at].prev;
        self.instrs[first].prev = prev;
        if let Some(prev) = prev {
            self.instrs[prev].next = Some(first);
        }
        self.instrs[last].next = Some(at);
        self.instrs[at].prev = Some(last);
    }

    /// Splice the linked chain `first..=last` after `at`.
    pub fn insert_range_after(&mut self, at: InstrId, first: InstrId, last: InstrId) {
        let next = self.instrs[at].next;
        self.instrs[last].next = next;
        if let Some(next) = next {
            self.instrs[next].prev = Some(last);
        }
        self.instrs[first].prev = Some(at);
        self.instrs[at].next = Some(first);
    }

    /// First and last body instruction of `func`, if the body is not empty.
    pub fn body_range(&self, func: FuncId) -> Option<(InstrId, InstrId)> {
        let (head, tail) = (self.head(func), self.tail(func));
        let first = self.next(head)?;
        let last = self.prev(tail)?;
        if first == tail {
            None
        } else {
            Some((first, last))
        }
    }

    /// Detach the sentinels of a spliced inlinee.
    pub fn free_sentinels(&mut self, func: FuncId) {
        for id in [self.head(func), self.tail(func)] {
            let instr = &mut self.instrs[id];
            instr.prev = None;
            instr.next = None;
            instr.linked = false;
        }
    }

    /// Instructions strictly between `head` and `tail`, in list order.
    pub fn range(&self, head: InstrId, tail: InstrId) -> Vec<InstrId> {
        let mut out = Vec::new();
        let mut cur = self.next(head);
        while let Some(id) = cur {
            if id == tail {
                break;
            }
            out.push(id);
            cur = self.next(id);
        }
        out
    }

    /// Body instructions of `func`, in list order.
    pub fn instrs_of(&self, func: FuncId) -> Vec<InstrId> {
        self.range(self.head(func), self.tail(func))
    }

    /// Opcodes of a function's body, in list order.
    pub fn opcodes(&self, func: FuncId) -> Vec<OpCode> {
        self.instrs_of(func).into_iter().map(|id| self.instrs[id].opcode).collect()
    }

    /// Copy the byte-code location of `from` onto `id`.
    pub fn tag_with_source_location(&mut self, id: InstrId, from: InstrId) {
        self.instrs[id].offset = self.instrs[from].offset;
    }

    /// Number of linked branches targeting `label`.
    pub fn label_ref_count(&self, label: InstrId) -> usize {
        self.instrs
            .iter()
            .filter(|instr| instr.linked && instr.opcode.is_branch() && instr.target == Some(label))
            .count()
    }

    // ---------------------------------------------------------------------
    // Bailouts
    // ---------------------------------------------------------------------

    /// Create a resume record at the location of `at`.
    pub fn new_bailout_record(&mut self, kind: BailOutKind, at: InstrId) -> BailOutId {
        let instr = &self.instrs[at];
        let info = BailOutInfo {
            kind,
            offset: instr.offset,
            func: instr.func,
        };
        self.bailouts.push_and_get_key(info)
    }

    /// Attach a bailout to a guard.
    pub fn set_bailout(&mut self, id: InstrId, kind: BailOutKind, record: BailOutId) {
        self.instrs[id].bailout = Some(BailOut { kind, record });
    }

    /// Render a function body for traces and test failures.
    pub fn dump(&self, func: FuncId) -> String {
        let mut out = String::new();
        for id in self.instrs_of(func) {
            let instr = &self.instrs[id];
            let _ = write!(out, "{:>5} {} {}", id, instr.offset, instr.opcode);
            for (name, opnd) in [("dst", &instr.dst), ("src1", &instr.src1), ("src2", &instr.src2)] {
                if let Some(opnd) = opnd {
                    let _ = write!(out, " {name}={opnd:?}");
                }
            }
            if let Some(target) = instr.target {
                let _ = write!(out, " -> {target}");
            }
            if let Some(bailout) = instr.bailout {
                let _ = write!(out, " [{}]", bailout.kind);
            }
            out.push('\n');
        }
        out
    }
}
