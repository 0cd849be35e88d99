//! Runtime identities the compiler speculates on.
//!
//! The compiler never dereferences runtime memory; it only embeds addresses
//! and type ids into guards and constant loads. This module provides the
//! typed forms of those identities.

use serde::{Deserialize, Serialize};

/// An address in the runtime's heap (function objects, function infos, types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Addr(pub usize);

impl Addr {
    /// The null address.
    pub const NULL: Addr = Addr(0);

    /// Whether this is the null address.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Runtime type tag of a value.
///
/// Ordering matters: everything up to [`TypeId::LAST_PRIMITIVE`] is a
/// primitive, and the range `(LAST_PRIMITIVE, LAST_TRUE_OBJECT]` holds
/// ordinary objects that are safe to use as `this` without normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum TypeId {
    /// `undefined`
    Undefined = 0,
    /// `null`
    Null,
    /// Boolean primitive
    Boolean,
    /// Tagged small integer
    Integer,
    /// Heap number
    Number,
    /// 64-bit integer number
    Int64Number,
    /// Unsigned 64-bit integer number
    UInt64Number,
    /// String primitive
    String,
    /// Symbol primitive
    Symbol,
    /// For-in enumerator (internal object, not a true object)
    Enumerator,
    /// Plain object
    Object = 16,
    /// Script or built-in function
    Function,
    /// Var array
    Array,
    /// Array specialized to int32 elements
    NativeIntArray,
    /// Array specialized to float64 elements
    NativeFloatArray,
    /// Error object
    Error,
    /// Date object
    Date,
    /// Regular expression
    RegEx,
    /// Arguments object
    Arguments,
    /// Array buffer
    ArrayBuffer,
    /// Typed array view
    TypedArray,
    /// The global object
    GlobalObject,
    /// Proxy
    Proxy,
    /// Host object
    HostDispatch = 48,
    /// Activation (scope) object
    ActivationObject,
    /// Spread argument wrapper
    SpreadArgument,
}

impl TypeId {
    /// Last primitive type id.
    pub const LAST_PRIMITIVE: TypeId = TypeId::Symbol;
    /// Last ordinary object type id.
    pub const LAST_TRUE_OBJECT: TypeId = TypeId::Proxy;

    /// Whether the value is a heap object rather than a primitive.
    pub fn is_object(self) -> bool {
        self > Self::LAST_PRIMITIVE
    }

    /// Whether the value is an ordinary object usable as `this` as-is.
    pub fn is_true_object(self) -> bool {
        self > Self::LAST_PRIMITIVE && self <= Self::LAST_TRUE_OBJECT
    }

    /// Whether the value is `undefined` or `null`.
    pub fn is_undefined_or_null(self) -> bool {
        matches!(self, TypeId::Undefined | TypeId::Null)
    }
}

/// Field offsets inside runtime objects that guards load from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLayout {
    /// Offset of the type pointer in every object
    pub type_offset: i32,
    /// Offset of the type id inside a type
    pub type_id_offset: i32,
    /// Offset of the function-info pointer inside a function object
    pub function_info_offset: i32,
    /// Offset of the environment pointer inside a function object
    pub environment_offset: i32,
}

impl Default for ObjectLayout {
    fn default() -> Self {
        Self {
            type_offset: 8,
            type_id_offset: 0,
            function_info_offset: 24,
            environment_offset: 32,
        }
    }
}

/// Well-known runtime addresses of one script context.
///
/// Shared read-only by every compilation on that context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptContextInfo {
    /// The `undefined` singleton
    pub undefined_addr: Addr,
    /// The `null` singleton
    pub null_addr: Addr,
    /// The `true` singleton
    pub true_addr: Addr,
    /// The `false` singleton
    pub false_addr: Addr,
    /// The global object, used as `this` for sloppy calls with a nullish receiver
    pub global_object_addr: Addr,
    /// Function info of the `Object` constructor
    pub object_new_instance_addr: Addr,
    /// Function info of the `Array` constructor
    pub array_new_instance_addr: Addr,
    /// Object layout used by guards
    pub layout: ObjectLayout,
}

impl Default for ScriptContextInfo {
    fn default() -> Self {
        Self {
            undefined_addr: Addr(0x1000),
            null_addr: Addr(0x1008),
            true_addr: Addr(0x1010),
            false_addr: Addr(0x1018),
            global_object_addr: Addr(0x1100),
            object_new_instance_addr: Addr(0x2000),
            array_new_instance_addr: Addr(0x2008),
            layout: ObjectLayout::default(),
        }
    }
}
