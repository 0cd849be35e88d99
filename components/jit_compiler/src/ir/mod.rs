//! Arena-backed intermediate representation.
//!
//! One [`Func`] owns every instruction, symbol and per-function record of a
//! compilation, the top-level function and all of its inlinees alike.
//! Instructions form doubly linked lists threaded through the arena by
//! [`InstrId`]; each function has its own head and tail sentinels until its
//! body is spliced into the caller.
//!
//! Passes walk a list with capture-next iteration: read the successor before
//! handling the current instruction, so the handler may unlink, replace or
//! insert around it freely.

use std::fmt;

mod args;
mod func;
mod instr;
mod opcode;
mod opnd;
mod sym;

pub use func::{BailOutInfo, Func, FuncData};
pub use instr::{BailOut, Instr, LabelInfo};
pub use opcode::OpCode;
pub use opnd::{AddrOpnd, HelperMethod, Opnd, PropertyOpnd};
pub use sym::{ConstValue, Sym, SymKind};

/// Size of a machine pointer slot on the argument stack.
pub const MACH_PTR: i32 = 8;

/// Number of frame slots an inlinee's meta arguments occupy: argument count,
/// function object and arguments object.
pub const INLINEE_META_ARGS: u32 = 3;

// Common conversions for 32-bit arena index types.
macro_rules! index_32bit {
    ($struct:ident) => {
        impl From<usize> for $struct {
            fn from(v: usize) -> Self {
                debug_assert!(v <= u32::MAX as usize);
                Self(v as u32)
            }
        }

        impl From<$struct> for usize {
            fn from(s: $struct) -> usize {
                s.0 as usize
            }
        }

        impl fmt::Display for $struct {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// An instruction index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(u32);
index_32bit!(InstrId);

/// A symbol index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymId(u32);
index_32bit!(SymId);

/// A function index. The top-level function is always the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(u32);
index_32bit!(FuncId);

impl FuncId {
    /// The function being compiled.
    pub const TOP: FuncId = FuncId(0);
}

/// A bailout record index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BailOutId(u32);
index_32bit!(BailOutId);
