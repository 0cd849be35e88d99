//! x86-32 register file.
//!
//! General purpose registers and the eight SSE registers share one numbering
//! so a single 16-bit mask can describe any register set.

use std::ops::{BitOr, BitOrAssign, Not};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

/// A physical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Reg {
    /// Accumulator; return value and dividend
    Eax = 0,
    /// Count register; shift amount
    Ecx,
    /// Data register; high half of products and remainders
    Edx,
    /// Callee saved
    Ebx,
    /// Stack pointer
    Esp,
    /// Frame pointer
    Ebp,
    /// Array buffer base
    Esi,
    /// Module environment
    Edi,
    /// SSE register 0; float return value
    Xmm0,
    /// SSE register 1
    Xmm1,
    /// SSE register 2
    Xmm2,
    /// SSE register 3
    Xmm3,
    /// SSE register 4
    Xmm4,
    /// SSE register 5
    Xmm5,
    /// SSE register 6
    Xmm6,
    /// SSE register 7
    Xmm7,
}

/// Register holding the module environment for the whole function body.
pub const MODULE_ENV_REG: Reg = Reg::Edi;
/// Register holding the heap (array buffer) base for the whole function body.
pub const ARRAY_BUFFER_REG: Reg = Reg::Esi;

impl Reg {
    /// The 3-bit register number used in ModRM, SIB and `+r` opcodes.
    pub fn encoding(self) -> u8 {
        (self as u8) & 0x7
    }

    /// Whether this is an SSE register.
    pub fn is_xmm(self) -> bool {
        (self as u8) >= Reg::Xmm0 as u8
    }

    /// The register class this register belongs to.
    pub fn class(self) -> RegClass {
        if self.is_xmm() {
            RegClass::Xmm
        } else {
            RegClass::General
        }
    }

    /// Single-register mask.
    pub fn mask(self) -> RegMask {
        RegMask(1 << (self as u16))
    }

    /// Register by its position in the numbering.
    pub fn from_index(index: usize) -> Reg {
        Reg::iter()
            .nth(index)
            .unwrap_or_else(|| panic!("register index {index} out of range"))
    }

    /// Assembly name, e.g. `eax`.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Register class; the cache keeps one eviction cursor per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegClass {
    /// `eax`..`edi`
    General,
    /// `xmm0`..`xmm7`
    Xmm,
}

impl RegClass {
    /// Registers of this class the templates may allocate.
    pub fn allocatable(self) -> RegMask {
        match self {
            RegClass::General => GENERAL_REGS,
            RegClass::Xmm => XMM_REGS,
        }
    }
}

/// A set of registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegMask(pub u16);

impl RegMask {
    /// The empty set.
    pub const EMPTY: RegMask = RegMask(0);

    /// Whether `reg` is in the set.
    pub fn contains(self, reg: Reg) -> bool {
        self.0 & reg.mask().0 != 0
    }

    /// Registers in the set, lowest number first.
    pub fn iter(self) -> impl Iterator<Item = Reg> {
        Reg::iter().filter(move |reg| self.contains(*reg))
    }
}

impl From<Reg> for RegMask {
    fn from(reg: Reg) -> Self {
        reg.mask()
    }
}

impl BitOr for RegMask {
    type Output = RegMask;

    fn bitor(self, rhs: RegMask) -> RegMask {
        RegMask(self.0 | rhs.0)
    }
}

impl BitOr<Reg> for RegMask {
    type Output = RegMask;

    fn bitor(self, rhs: Reg) -> RegMask {
        self | rhs.mask()
    }
}

impl BitOr for Reg {
    type Output = RegMask;

    fn bitor(self, rhs: Reg) -> RegMask {
        self.mask() | rhs.mask()
    }
}

impl BitOrAssign<Reg> for RegMask {
    fn bitor_assign(&mut self, rhs: Reg) {
        self.0 |= rhs.mask().0;
    }
}

impl Not for RegMask {
    type Output = RegMask;

    fn not(self) -> RegMask {
        RegMask(!self.0)
    }
}

/// Registers reserved by the frame or pinned for the whole function.
pub const UNAVAILABLE_REGS: RegMask = RegMask(
    (1 << Reg::Esp as u16) | (1 << Reg::Ebp as u16) | (1 << Reg::Esi as u16) | (1 << Reg::Edi as u16),
);
/// Allocatable general purpose registers.
pub const GENERAL_REGS: RegMask =
    RegMask((1 << Reg::Eax as u16) | (1 << Reg::Ecx as u16) | (1 << Reg::Edx as u16) | (1 << Reg::Ebx as u16));
/// Registers with an addressable low byte (`al`, `cl`, `dl`, `bl`).
pub const BYTE_REGS: RegMask = GENERAL_REGS;
/// All SSE registers.
pub const XMM_REGS: RegMask = RegMask(0xff00);
/// Registers preserved across calls.
pub const NONVOLATILE_REGS: RegMask =
    RegMask((1 << Reg::Ebx as u16) | (1 << Reg::Esi as u16) | (1 << Reg::Edi as u16));

/// Kind of value held in a frame slot or cached in a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum ValueKind {
    /// 32-bit integer
    Int,
    /// 32-bit float
    Float,
    /// 64-bit double
    Double,
    /// 128-bit vector
    Simd,
}

impl ValueKind {
    /// Size of the value in bytes.
    pub fn width(self) -> i32 {
        match self {
            ValueKind::Int | ValueKind::Float => 4,
            ValueKind::Double => 8,
            ValueKind::Simd => 16,
        }
    }

    /// Register class a value of this kind lives in.
    pub fn class(self) -> RegClass {
        match self {
            ValueKind::Int => RegClass::General,
            _ => RegClass::Xmm,
        }
    }
}
