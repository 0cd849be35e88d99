//! Recognized built-in functions and their inlining metadata.

use serde::{Deserialize, Serialize};

/// Properties of a built-in that decide how a call to it is inlined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuiltInFlags(u16);

impl BuiltInFlags {
    /// No special handling
    pub const NONE: BuiltInFlags = BuiltInFlags(0);
    /// The receiver (`this`) is an operand of the inlined operation
    pub const USE_SRC0: BuiltInFlags = BuiltInFlags(1 << 0);
    /// Accepts fewer arguments than [`BuiltinFunction::arg_count`]
    pub const VARIABLE_ARGS: BuiltInFlags = BuiltInFlags(1 << 1);
    /// The result may be dropped
    pub const IGNORE_DST: BuiltInFlags = BuiltInFlags(1 << 2);
    /// All operands are type-specialized to float
    pub const ALL_TO_FLOAT: BuiltInFlags = BuiltInFlags(1 << 3);
    /// The result is type-specialized to float
    pub const DST_TO_FLOAT: BuiltInFlags = BuiltInFlags(1 << 4);
    /// The result is type-specialized to int
    pub const DST_TO_INT: BuiltInFlags = BuiltInFlags(1 << 5);
    /// The first operand is type-specialized to int
    pub const SRC1_TO_INT: BuiltInFlags = BuiltInFlags(1 << 6);
    /// The second operand is type-specialized to int
    pub const SRC2_TO_INT: BuiltInFlags = BuiltInFlags(1 << 7);

    /// Union of two flag sets.
    pub const fn union(self, other: BuiltInFlags) -> BuiltInFlags {
        BuiltInFlags(self.0 | other.0)
    }

    /// Whether every flag of `other` is set.
    pub fn contains(self, other: BuiltInFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any flag of `other` is set.
    pub fn intersects(self, other: BuiltInFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the inlined form requires type specialization of some operand.
    pub fn requires_type_spec(self) -> bool {
        self.intersects(
            Self::ALL_TO_FLOAT
                .union(Self::DST_TO_FLOAT)
                .union(Self::DST_TO_INT)
                .union(Self::SRC1_TO_INT)
                .union(Self::SRC2_TO_INT),
        )
    }
}

/// A built-in function the inliner recognizes by its function-info identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinFunction {
    /// `Math.abs`
    MathAbs,
    /// `Math.sqrt`
    MathSqrt,
    /// `Math.floor`
    MathFloor,
    /// `Math.ceil`
    MathCeil,
    /// `Math.round`
    MathRound,
    /// `Math.min`
    MathMin,
    /// `Math.max`
    MathMax,
    /// `Math.imul`
    MathImul,
    /// `Math.clz32`
    MathClz32,
    /// `Math.pow`
    MathPow,
    /// `Array.prototype.push`
    ArrayPush,
    /// `Array.prototype.pop`
    ArrayPop,
    /// `Array.prototype.join`
    ArrayJoin,
    /// `Array.prototype.indexOf`
    ArrayIndexOf,
    /// `String.prototype.charAt`
    StringCharAt,
    /// `String.prototype.charCodeAt`
    StringCharCodeAt,
    /// `String.fromCharCode`
    StringFromCharCode,
    /// `Function.prototype.apply`
    FunctionApply,
    /// `Function.prototype.call`
    FunctionCall,
    /// `Object` constructor
    ObjectCtor,
    /// `Array` constructor
    ArrayCtor,
}

impl BuiltinFunction {
    /// Display name used in inlining traces.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFunction::MathAbs => "Math.abs",
            BuiltinFunction::MathSqrt => "Math.sqrt",
            BuiltinFunction::MathFloor => "Math.floor",
            BuiltinFunction::MathCeil => "Math.ceil",
            BuiltinFunction::MathRound => "Math.round",
            BuiltinFunction::MathMin => "Math.min",
            BuiltinFunction::MathMax => "Math.max",
            BuiltinFunction::MathImul => "Math.imul",
            BuiltinFunction::MathClz32 => "Math.clz32",
            BuiltinFunction::MathPow => "Math.pow",
            BuiltinFunction::ArrayPush => "Array.prototype.push",
            BuiltinFunction::ArrayPop => "Array.prototype.pop",
            BuiltinFunction::ArrayJoin => "Array.prototype.join",
            BuiltinFunction::ArrayIndexOf => "Array.prototype.indexOf",
            BuiltinFunction::StringCharAt => "String.prototype.charAt",
            BuiltinFunction::StringCharCodeAt => "String.prototype.charCodeAt",
            BuiltinFunction::StringFromCharCode => "String.fromCharCode",
            BuiltinFunction::FunctionApply => "Function.prototype.apply",
            BuiltinFunction::FunctionCall => "Function.prototype.call",
            BuiltinFunction::ObjectCtor => "Object",
            BuiltinFunction::ArrayCtor => "Array",
        }
    }

    /// Number of explicit arguments the inlined form consumes (excluding `this`
    /// unless [`BuiltInFlags::USE_SRC0`] is set).
    pub fn arg_count(self) -> u16 {
        match self {
            BuiltinFunction::MathAbs
            | BuiltinFunction::MathSqrt
            | BuiltinFunction::MathFloor
            | BuiltinFunction::MathCeil
            | BuiltinFunction::MathRound
            | BuiltinFunction::MathClz32
            | BuiltinFunction::StringFromCharCode => 1,
            BuiltinFunction::MathMin
            | BuiltinFunction::MathMax
            | BuiltinFunction::MathImul
            | BuiltinFunction::MathPow => 2,
            BuiltinFunction::ArrayPush
            | BuiltinFunction::ArrayJoin
            | BuiltinFunction::ArrayIndexOf
            | BuiltinFunction::StringCharAt
            | BuiltinFunction::StringCharCodeAt => 2,
            BuiltinFunction::ArrayPop => 1,
            BuiltinFunction::FunctionApply => 3,
            BuiltinFunction::FunctionCall => 15,
            BuiltinFunction::ObjectCtor | BuiltinFunction::ArrayCtor => 0,
        }
    }

    /// Inlining flags.
    pub fn flags(self) -> BuiltInFlags {
        use BuiltInFlags as F;
        match self {
            BuiltinFunction::MathAbs => F::ALL_TO_FLOAT.union(F::DST_TO_FLOAT),
            BuiltinFunction::MathSqrt => F::ALL_TO_FLOAT.union(F::DST_TO_FLOAT),
            BuiltinFunction::MathFloor | BuiltinFunction::MathCeil | BuiltinFunction::MathRound => {
                F::ALL_TO_FLOAT.union(F::DST_TO_INT)
            }
            BuiltinFunction::MathMin | BuiltinFunction::MathMax => F::VARIABLE_ARGS.union(F::DST_TO_FLOAT),
            BuiltinFunction::MathImul => F::DST_TO_INT.union(F::SRC1_TO_INT).union(F::SRC2_TO_INT),
            BuiltinFunction::MathClz32 => F::DST_TO_INT.union(F::SRC1_TO_INT),
            BuiltinFunction::MathPow => F::ALL_TO_FLOAT.union(F::DST_TO_FLOAT),
            BuiltinFunction::ArrayPush => F::USE_SRC0.union(F::IGNORE_DST),
            BuiltinFunction::ArrayPop => F::USE_SRC0.union(F::IGNORE_DST).union(F::DST_TO_FLOAT),
            BuiltinFunction::ArrayJoin | BuiltinFunction::ArrayIndexOf => {
                F::USE_SRC0.union(F::VARIABLE_ARGS)
            }
            BuiltinFunction::StringCharAt | BuiltinFunction::StringCharCodeAt => F::USE_SRC0,
            BuiltinFunction::StringFromCharCode => F::NONE,
            BuiltinFunction::FunctionApply | BuiltinFunction::FunctionCall => {
                F::USE_SRC0.union(F::VARIABLE_ARGS).union(F::IGNORE_DST)
            }
            BuiltinFunction::ObjectCtor | BuiltinFunction::ArrayCtor => F::VARIABLE_ARGS,
        }
    }

    /// Whether a float-typed result can be preferred for this built-in.
    pub fn can_float_preference(self) -> bool {
        matches!(
            self,
            BuiltinFunction::MathAbs
                | BuiltinFunction::MathSqrt
                | BuiltinFunction::MathMin
                | BuiltinFunction::MathMax
                | BuiltinFunction::MathPow
        )
    }
}
