//! Per-operation machine code templates.
//!
//! A [`TemplateContext`] expands one [`TemplateOp`] at a time into x86-32
//! code. Operands are frame offsets in the function's own coordinates; the
//! context translates them to `ebp`-relative slots and keeps the
//! [`RegisterCache`] in step with every load and store it emits.
//!
//! Branch targets are [`LabelId`]s. A jump to a label that is not bound yet
//! is patched when the label is applied.

mod control;
mod float;
mod helpers;
mod int;
mod memory;
mod simd;

use crate::code_buffer::{rel32, CodeBuffer};
use crate::config::TemplateConfig;
use crate::encoder::{Cond, Encoder};
use crate::reg_cache::RegisterCache;
use crate::registers::ValueKind;
use crate::runtime::{align8, FunctionInfo, RuntimeAddrs};
use core_types::JitResult;
use std::collections::HashMap;
use strum::{Display, EnumIter};

/// A branch target inside one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

/// Single-operand integer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum IntUnaryOp {
    /// Two's complement negation
    Neg,
    /// Bitwise complement
    Not,
    /// `1` if zero, else `0`
    LogNot,
    /// `0` if zero, else `1`
    ToBool,
    /// Absolute value; `abs(i32::MIN)` stays `i32::MIN`
    Abs,
    /// Count of leading zero bits; 32 for zero
    Clz32,
}

/// Two-operand integer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum IntBinaryOp {
    /// Wrapping add
    Add,
    /// Wrapping subtract
    Sub,
    /// Wrapping multiply
    Mul,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// Shift left by the low five bits of the right operand
    Shl,
    /// Arithmetic shift right
    Shr,
    /// Logical shift right
    ShrU,
    /// Signed divide; `x / 0 = 0` and `MIN / -1 = MIN`
    Div,
    /// Signed remainder; `x % 0 = 0` and `MIN % -1 = 0`
    Rem,
    /// Unsigned divide; `x / 0 = 0`
    DivU,
    /// Unsigned remainder; `x % 0 = 0`
    RemU,
    /// Signed minimum
    Min,
    /// Signed maximum
    Max,
}

/// Integer comparisons producing `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum IntCompare {
    /// Signed `<`
    Lt,
    /// Signed `<=`
    Le,
    /// Signed `>`
    Gt,
    /// Signed `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// Unsigned `<`
    LtU,
    /// Unsigned `<=`
    LeU,
    /// Unsigned `>`
    GtU,
    /// Unsigned `>=`
    GeU,
}

impl IntCompare {
    /// Condition under which the comparison holds after `cmp left, right`.
    pub fn cond(self) -> Cond {
        match self {
            IntCompare::Lt => Cond::L,
            IntCompare::Le => Cond::Le,
            IntCompare::Gt => Cond::G,
            IntCompare::Ge => Cond::Ge,
            IntCompare::Eq => Cond::E,
            IntCompare::Ne => Cond::Ne,
            IntCompare::LtU => Cond::B,
            IntCompare::LeU => Cond::Be,
            IntCompare::GtU => Cond::A,
            IntCompare::GeU => Cond::Ae,
        }
    }
}

/// Scalar floating point precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FloatKind {
    /// 32-bit float
    Float,
    /// 64-bit double
    Double,
}

impl FloatKind {
    /// The cached value kind.
    pub fn value_kind(self) -> ValueKind {
        match self {
            FloatKind::Float => ValueKind::Float,
            FloatKind::Double => ValueKind::Double,
        }
    }
}

/// Two-operand floating point operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FloatBinaryOp {
    /// Add
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Remainder through the runtime helper; doubles only
    Rem,
}

/// Floating point comparisons producing `0` or `1`.
///
/// Any comparison with NaN is false except [`FloatCompare::Ne`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FloatCompare {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// Numeric conversions between frame slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Conversion {
    /// Signed int to double
    IntToDouble,
    /// Unsigned int to double
    UIntToDouble,
    /// Signed int to float
    IntToFloat,
    /// Float to double
    FloatToDouble,
    /// Double rounded to float
    DoubleToFloat,
    /// Float truncated to int
    FloatToInt,
    /// Double to int with `ToInt32` semantics, through the runtime helper
    DoubleToInt,
}

impl Conversion {
    /// Kinds of the source and destination slots.
    pub fn kinds(self) -> (ValueKind, ValueKind) {
        use ValueKind::*;
        match self {
            Conversion::IntToDouble | Conversion::UIntToDouble => (Int, Double),
            Conversion::IntToFloat => (Int, Float),
            Conversion::FloatToDouble => (Float, Double),
            Conversion::DoubleToFloat => (Double, Float),
            Conversion::FloatToInt => (Float, Int),
            Conversion::DoubleToInt => (Double, Int),
        }
    }
}

/// Typed array element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ArrayView {
    /// `Int8Array`
    Int8,
    /// `Uint8Array`
    Uint8,
    /// `Int16Array`
    Int16,
    /// `Uint16Array`
    Uint16,
    /// `Int32Array`
    Int32,
    /// `Uint32Array`
    Uint32,
    /// `Float32Array`
    Float32,
    /// `Float64Array`
    Float64,
}

impl ArrayView {
    /// Element size in bytes.
    pub fn element_size(self) -> i32 {
        match self {
            ArrayView::Int8 | ArrayView::Uint8 => 1,
            ArrayView::Int16 | ArrayView::Uint16 => 2,
            ArrayView::Int32 | ArrayView::Uint32 | ArrayView::Float32 => 4,
            ArrayView::Float64 => 8,
        }
    }

    /// Mask aligning a byte index down to an element boundary.
    pub fn index_mask(self) -> Option<i32> {
        match self.element_size() {
            1 => None,
            size => Some(!(size - 1)),
        }
    }

    /// Kind of the frame slot an element is loaded into or stored from.
    pub fn value_kind(self) -> ValueKind {
        match self {
            ArrayView::Float32 => ValueKind::Float,
            ArrayView::Float64 => ValueKind::Double,
            _ => ValueKind::Int,
        }
    }
}

/// 128-bit vector lane layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum SimdType {
    /// Four 32-bit floats
    Float32x4,
    /// Four 32-bit ints
    Int32x4,
    /// Two 64-bit doubles
    Float64x2,
}

impl SimdType {
    /// Number of lanes.
    pub fn lanes(self) -> u8 {
        match self {
            SimdType::Float64x2 => 2,
            _ => 4,
        }
    }

    /// Kind of the scalar slot a lane is read from or written to.
    pub fn lane_kind(self) -> ValueKind {
        match self {
            SimdType::Float64x2 => ValueKind::Double,
            SimdType::Float32x4 => ValueKind::Float,
            SimdType::Int32x4 => ValueKind::Int,
        }
    }
}

/// Lane-wise vector operations.
///
/// Compares produce all-ones lanes for true. `Int32x4` supports the
/// arithmetic, bitwise, `Lt`, `Gt` and `Eq` forms only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum SimdBinaryOp {
    /// Add
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Minimum
    Min,
    /// Maximum
    Max,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// Right-hand side of [`TemplateOp::BrEq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchOperand {
    /// An int frame slot
    Slot(i32),
    /// An immediate
    Const(i32),
}

/// One abstract operation.
///
/// Offsets (`dst`, `src`, `left`, `right`, ...) are frame offsets of the
/// operand slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateOp {
    /// Bind a branch target; every cached register is forgotten
    Label(LabelId),
    /// Unconditional jump
    Br {
        /// Destination
        target: LabelId,
        /// Count a loop iteration before jumping
        back_edge: bool,
    },
    /// Jump if the int slot is non-zero
    BrTrue {
        /// Condition slot
        src: i32,
        /// Destination
        target: LabelId,
        /// Count a loop iteration before testing
        back_edge: bool,
    },
    /// Jump if two ints are equal
    BrEq {
        /// Left slot
        left: i32,
        /// Right slot or constant
        right: BranchOperand,
        /// Destination
        target: LabelId,
        /// Count a loop iteration before testing
        back_edge: bool,
    },
    /// Prologue: frame setup, stack probe, pinned registers
    FunctionEntry,
    /// Epilogue: restore registers and return, popping the arguments
    FunctionExit,
    /// Copy a slot of any kind
    Ld {
        /// Kind of both slots
        kind: ValueKind,
        /// Destination slot
        dst: i32,
        /// Source slot
        src: i32,
    },
    /// Store an int constant
    LdConst {
        /// Destination slot
        dst: i32,
        /// Value
        value: i32,
    },
    /// Single-operand int operation
    IntUnary {
        /// Operation
        op: IntUnaryOp,
        /// Destination slot
        dst: i32,
        /// Source slot
        src: i32,
    },
    /// Two-operand int operation
    IntBinary {
        /// Operation
        op: IntBinaryOp,
        /// Destination slot
        dst: i32,
        /// Left slot
        left: i32,
        /// Right slot
        right: i32,
    },
    /// Int comparison into an int slot
    IntCompare {
        /// Comparison
        cmp: IntCompare,
        /// Destination slot
        dst: i32,
        /// Left slot
        left: i32,
        /// Right slot
        right: i32,
    },
    /// Negate a float or double
    FloatNeg {
        /// Precision
        kind: FloatKind,
        /// Destination slot
        dst: i32,
        /// Source slot
        src: i32,
    },
    /// Two-operand float or double operation
    FloatBinary {
        /// Precision
        kind: FloatKind,
        /// Operation
        op: FloatBinaryOp,
        /// Destination slot
        dst: i32,
        /// Left slot
        left: i32,
        /// Right slot
        right: i32,
    },
    /// Float or double comparison into an int slot
    FloatCompare {
        /// Precision of the operands
        kind: FloatKind,
        /// Comparison
        cmp: FloatCompare,
        /// Destination slot
        dst: i32,
        /// Left slot
        left: i32,
        /// Right slot
        right: i32,
    },
    /// Numeric conversion
    Convert {
        /// Conversion
        conv: Conversion,
        /// Destination slot
        dst: i32,
        /// Source slot
        src: i32,
    },
    /// Load a module environment slot
    LdSlot {
        /// Kind of the value
        kind: ValueKind,
        /// Destination frame slot
        dst: i32,
        /// Index in the environment, scaled by the kind's width
        slot: u32,
    },
    /// Store into a module environment slot
    StSlot {
        /// Kind of the value
        kind: ValueKind,
        /// Source frame slot
        src: i32,
        /// Index in the environment, scaled by the kind's width
        slot: u32,
    },
    /// Bounds-checked typed array load; out of bounds yields 0 or NaN
    LdArr {
        /// Element type
        view: ArrayView,
        /// Destination slot
        dst: i32,
        /// Slot with the byte index
        index: i32,
    },
    /// Bounds-checked typed array store; out of bounds is a no-op
    StArr {
        /// Element type
        view: ArrayView,
        /// Source slot
        src: i32,
        /// Slot with the byte index
        index: i32,
    },
    /// Reserve outgoing argument space
    StartCall {
        /// Bytes of arguments, excluding the function object
        arg_bytes: u32,
    },
    /// Store the next outgoing argument
    ArgOut {
        /// Kind of the argument
        kind: ValueKind,
        /// Source slot
        src: i32,
    },
    /// Call the function object in `func` through its entry point
    Call {
        /// Slot holding the function object
        func: i32,
        /// Kind and slot of the returned value, if used
        result: Option<(ValueKind, i32)>,
    },
    /// Move the return value into `eax` or `xmm0`
    SetReturn {
        /// Kind of the value
        kind: ValueKind,
        /// Source slot
        src: i32,
    },
    /// Broadcast a scalar to every lane
    SimdSplat {
        /// Lane layout
        ty: SimdType,
        /// Destination vector slot
        dst: i32,
        /// Source scalar slot
        src: i32,
    },
    /// Lane-wise operation
    SimdBinary {
        /// Lane layout
        ty: SimdType,
        /// Operation
        op: SimdBinaryOp,
        /// Destination vector slot
        dst: i32,
        /// Left vector slot
        left: i32,
        /// Right vector slot
        right: i32,
    },
    /// Read one lane into a scalar slot
    SimdExtractLane {
        /// Lane layout
        ty: SimdType,
        /// Destination scalar slot
        dst: i32,
        /// Source vector slot
        src: i32,
        /// Lane number
        lane: u8,
    },
    /// Copy a vector with one lane replaced
    SimdReplaceLane {
        /// Lane layout
        ty: SimdType,
        /// Destination vector slot
        dst: i32,
        /// Source vector slot
        src: i32,
        /// Scalar slot with the new lane value
        value: i32,
        /// Lane number
        lane: u8,
    },
}

#[derive(Debug, Clone, Copy)]
struct OutgoingCall {
    next_offset: i32,
    reserved: i32,
}

/// Template state for one function.
///
/// # Examples
///
/// ```
/// use template_jit::{CodeBuffer, FunctionInfo, RuntimeAddrs, TemplateConfig, TemplateContext, TemplateOp};
/// use template_jit::templates::IntBinaryOp;
///
/// let function = FunctionInfo { frame_size: 16, arg_bytes: 0, fixed_heap: true };
/// let mut context = TemplateContext::new(TemplateConfig::default(), RuntimeAddrs::default(), function);
/// let mut buffer = CodeBuffer::with_capacity(256);
///
/// let add = TemplateOp::IntBinary { op: IntBinaryOp::Add, dst: 8, left: 0, right: 4 };
/// let size = context.apply_template(&mut buffer, &add).unwrap();
/// assert_eq!(size, buffer.len());
/// ```
pub struct TemplateContext {
    config: TemplateConfig,
    runtime: RuntimeAddrs,
    function: FunctionInfo,
    cache: RegisterCache,
    base_offset: i32,
    labels: HashMap<LabelId, usize>,
    pending: Vec<(LabelId, usize)>,
    call: Option<OutgoingCall>,
}

impl TemplateContext {
    /// Fresh state for templating `function`.
    pub fn new(config: TemplateConfig, runtime: RuntimeAddrs, function: FunctionInfo) -> Self {
        let base_offset = Self::base_offset_for(&config, &function);
        Self {
            config,
            runtime,
            function,
            cache: RegisterCache::new(),
            base_offset,
            labels: HashMap::new(),
            pending: Vec::new(),
            call: None,
        }
    }

    fn base_offset_for(config: &TemplateConfig, function: &FunctionInfo) -> i32 {
        align8(function.frame_size) as i32 + config.frame.ebp_offset_correction
    }

    /// Start over with another function, keeping configuration and runtime.
    pub fn reset(&mut self, function: FunctionInfo) {
        self.base_offset = Self::base_offset_for(&self.config, &function);
        self.function = function;
        self.cache.reset();
        self.labels.clear();
        self.pending.clear();
        self.call = None;
    }

    /// The register cache as it stands after the last template.
    pub fn cache(&self) -> &RegisterCache {
        &self.cache
    }

    /// An empty code buffer of the configured capacity.
    pub fn new_buffer(&self) -> CodeBuffer {
        CodeBuffer::with_capacity(self.config.buffer_capacity)
    }

    /// `ebp`-relative displacement of a frame offset.
    pub fn frame_offset(&self, offset: i32) -> i32 {
        offset - self.base_offset
    }

    /// Labels jumped to but never bound.
    pub fn unresolved_labels(&self) -> Vec<LabelId> {
        let mut labels: Vec<LabelId> = self.pending.iter().map(|(label, _)| *label).collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Expand `op` at the end of `buffer`, returning the number of bytes written.
    ///
    /// On error nothing of the template remains in the buffer and the
    /// register cache is emptied.
    pub fn apply_template(&mut self, buffer: &mut CodeBuffer, op: &TemplateOp) -> JitResult<usize> {
        let start = buffer.len();
        let result = self.emit(&mut Encoder::new(buffer), op);
        match result {
            Ok(()) => {
                let size = buffer.len() - start;
                log::trace!("template {op:?}: {size} bytes at {start:#x}");
                Ok(size)
            }
            Err(err) => {
                buffer.truncate(start);
                self.pending.retain(|(_, field)| *field < start);
                self.labels.retain(|_, position| *position < start);
                self.cache.invalidate_all();
                log::trace!("template {op:?} failed: {err}");
                Err(err)
            }
        }
    }

    fn emit(&mut self, e: &mut Encoder<'_>, op: &TemplateOp) -> JitResult<()> {
        match *op {
            TemplateOp::Label(label) => self.label(e, label),
            TemplateOp::Br { target, back_edge } => self.br(e, target, back_edge),
            TemplateOp::BrTrue { src, target, back_edge } => self.br_true(e, src, target, back_edge),
            TemplateOp::BrEq {
                left,
                right,
                target,
                back_edge,
            } => self.br_eq(e, left, right, target, back_edge),
            TemplateOp::FunctionEntry => self.function_entry(e),
            TemplateOp::FunctionExit => self.function_exit(e),
            TemplateOp::Ld { kind, dst, src } => self.ld(e, kind, dst, src),
            TemplateOp::LdConst { dst, value } => self.ld_const(e, dst, value),
            TemplateOp::IntUnary { op, dst, src } => self.int_unary(e, op, dst, src),
            TemplateOp::IntBinary { op, dst, left, right } => self.int_binary(e, op, dst, left, right),
            TemplateOp::IntCompare { cmp, dst, left, right } => self.int_compare(e, cmp, dst, left, right),
            TemplateOp::FloatNeg { kind, dst, src } => self.float_neg(e, kind, dst, src),
            TemplateOp::FloatBinary {
                kind,
                op,
                dst,
                left,
                right,
            } => self.float_binary(e, kind, op, dst, left, right),
            TemplateOp::FloatCompare {
                kind,
                cmp,
                dst,
                left,
                right,
            } => self.float_compare(e, kind, cmp, dst, left, right),
            TemplateOp::Convert { conv, dst, src } => self.convert(e, conv, dst, src),
            TemplateOp::LdSlot { kind, dst, slot } => self.ld_slot(e, kind, dst, slot),
            TemplateOp::StSlot { kind, src, slot } => self.st_slot(e, kind, src, slot),
            TemplateOp::LdArr { view, dst, index } => self.ld_arr(e, view, dst, index),
            TemplateOp::StArr { view, src, index } => self.st_arr(e, view, src, index),
            TemplateOp::StartCall { arg_bytes } => self.start_call(e, arg_bytes),
            TemplateOp::ArgOut { kind, src } => self.arg_out(e, kind, src),
            TemplateOp::Call { func, result } => self.call_function(e, func, result),
            TemplateOp::SetReturn { kind, src } => self.set_return(e, kind, src),
            TemplateOp::SimdSplat { ty, dst, src } => self.simd_splat(e, ty, dst, src),
            TemplateOp::SimdBinary {
                ty,
                op,
                dst,
                left,
                right,
            } => self.simd_binary(e, ty, op, dst, left, right),
            TemplateOp::SimdExtractLane { ty, dst, src, lane } => self.simd_extract_lane(e, ty, dst, src, lane),
            TemplateOp::SimdReplaceLane {
                ty,
                dst,
                src,
                value,
                lane,
            } => self.simd_replace_lane(e, ty, dst, src, value, lane),
        }
    }

    fn bind_label(&mut self, e: &mut Encoder<'_>, label: LabelId) {
        let position = e.position();
        let previous = self.labels.insert(label, position);
        assert!(previous.is_none(), "label {} bound twice", label.0);
        let buffer = e.buffer();
        self.pending.retain(|(pending, field)| {
            if *pending == label {
                buffer.patch_at(*field, rel32(*field, position));
                false
            } else {
                true
            }
        });
    }

    fn jump_to(&mut self, e: &mut Encoder<'_>, field: usize, label: LabelId) {
        match self.labels.get(&label) {
            Some(&position) => e.buffer().patch_at(field, rel32(field, position)),
            None => self.pending.push((label, field)),
        }
    }
}
