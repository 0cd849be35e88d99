//! Instruction operands.

use super::SymId;
use core_types::{Addr, FixedField, InlineCacheIndex, ObjTypeSpecFldInfo, PropertyId, TypeId};
use std::sync::Arc;

/// A property access `object.property` with its inline-cache facts.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyOpnd {
    /// Symbol holding the receiver
    pub object: SymId,
    /// Property accessed
    pub property_id: PropertyId,
    /// Inline cache of this access in its function
    pub cache_index: InlineCacheIndex,
    /// Profile facts, when the access is type-specialized
    pub fld_info: Option<Arc<ObjTypeSpecFldInfo>>,
}

impl PropertyOpnd {
    /// Drop profile facts that were made up only for polymorphic inlining.
    ///
    /// Downstream type specialization assumes such facts come from an
    /// equivalent cache, which is not the case once inlining gave up.
    pub fn try_reset_fld_info(&mut self) {
        if self.fld_info.as_ref().is_some_and(|info| info.created_for_poly_inlining) {
            self.fld_info = None;
        }
    }
}

/// An embedded runtime address.
#[derive(Debug, Clone, PartialEq)]
pub struct AddrOpnd {
    /// The address
    pub addr: Addr,
    /// The address is a function object
    pub is_function: bool,
    /// Fixed-field facts when the address is a speculated function value
    pub fixed: Option<FixedField>,
    /// Type of the value at the address, when known
    pub value_type: Option<TypeId>,
}

/// Runtime helpers reachable through `CallDirect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperMethod {
    /// `Array.prototype.join`
    ArrayJoin,
    /// `Array.prototype.indexOf`
    ArrayIndexOf,
    /// `String.fromCharCode`
    StringFromCharCode,
    /// `Math.max.apply(Math, array)`
    MaxInAnArray,
    /// `Math.min.apply(Math, array)`
    MinInAnArray,
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Opnd {
    /// A register symbol
    Reg(SymId),
    /// A symbol used by name: argument slots and parameters
    Sym(SymId),
    /// A property access
    Property(PropertyOpnd),
    /// An integer constant
    IntConst(i64),
    /// A runtime address
    Addr(AddrOpnd),
    /// Memory at `[base + offset]`
    Indir {
        /// Register holding the base address
        base: SymId,
        /// Byte offset
        offset: i32,
    },
    /// A helper entry point
    HelperCall(HelperMethod),
}

impl Opnd {
    /// An address operand with no further facts.
    pub fn addr(addr: Addr) -> Opnd {
        Opnd::Addr(AddrOpnd {
            addr,
            is_function: false,
            fixed: None,
            value_type: None,
        })
    }

    /// An address operand for a value of known type.
    pub fn typed_addr(addr: Addr, value_type: TypeId) -> Opnd {
        Opnd::Addr(AddrOpnd {
            addr,
            is_function: false,
            fixed: None,
            value_type: Some(value_type),
        })
    }

    /// An address operand for a speculated function value.
    pub fn fixed_function(fixed: FixedField) -> Opnd {
        Opnd::Addr(AddrOpnd {
            addr: fixed.field_value,
            is_function: true,
            fixed: Some(fixed),
            value_type: Some(TypeId::Function),
        })
    }

    /// The register symbol, if this is a register.
    pub fn as_reg(&self) -> Option<SymId> {
        match self {
            Opnd::Reg(sym) => Some(*sym),
            _ => None,
        }
    }

    /// The named symbol, if this is a symbol operand.
    pub fn as_sym(&self) -> Option<SymId> {
        match self {
            Opnd::Sym(sym) => Some(*sym),
            _ => None,
        }
    }

    /// The symbol of a register or symbol operand.
    pub fn stack_sym(&self) -> Option<SymId> {
        match self {
            Opnd::Reg(sym) | Opnd::Sym(sym) => Some(*sym),
            _ => None,
        }
    }

    /// The integer value, if this is an integer constant.
    pub fn as_int_const(&self) -> Option<i64> {
        match self {
            Opnd::IntConst(value) => Some(*value),
            _ => None,
        }
    }

    /// The address operand, if any.
    pub fn as_addr(&self) -> Option<&AddrOpnd> {
        match self {
            Opnd::Addr(addr) => Some(addr),
            _ => None,
        }
    }

    /// The property access, if any.
    pub fn as_property(&self) -> Option<&PropertyOpnd> {
        match self {
            Opnd::Property(prop) => Some(prop),
            _ => None,
        }
    }

    /// Mutable property access, if any.
    pub fn as_property_mut(&mut self) -> Option<&mut PropertyOpnd> {
        match self {
            Opnd::Property(prop) => Some(prop),
            _ => None,
        }
    }

    /// Whether the operand reads `sym` in any position.
    pub fn references(&self, sym: SymId) -> bool {
        match self {
            Opnd::Reg(s) | Opnd::Sym(s) => *s == sym,
            Opnd::Property(prop) => prop.object == sym,
            Opnd::Indir { base, .. } => *base == sym,
            Opnd::IntConst(_) | Opnd::Addr(_) | Opnd::HelperCall(_) => false,
        }
    }
}
