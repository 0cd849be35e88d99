//! IR opcodes.

use strum::{Display, IntoStaticStr};

/// IR instruction opcodes.
///
/// Names follow the runtime's byte-code vocabulary so traces line up with
/// profiler output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum OpCode {
    // Sentinels and markers
    /// Head sentinel of a function's list
    FunctionEntry,
    /// Tail sentinel of a function's list
    FunctionExit,
    /// Branch target
    Label,
    /// Start of a source statement
    StatementBoundary,
    /// Keeps the listed symbols alive for bailouts
    ByteCodeUses,

    // Branches
    /// Unconditional branch
    Br,
    /// Branch if src1 is truthy
    BrTrue,
    /// Branch if src1 is falsy
    BrFalse,
    /// Branch if src1 and src2 are the same address
    BrAddr,
    /// Branch if a for-in enumerator is exhausted
    BrOnEmpty,
    /// Branch if a for-in enumerator has more entries
    BrOnNotEmpty,

    // Loads and stores
    /// Register move
    Ld,
    /// Load an int32 constant
    LdConstI4,
    /// Load the closure environment
    LdEnv,
    /// Load `new.target`
    LdNewTarget,
    /// Throw unless called with `new`
    ChkNewCallFlag,
    /// Load the home object of a method
    LdHomeObj,
    /// Load the current function object
    LdFuncObj,
    /// Load `this` (sloppy mode)
    LdThis,
    /// Load `this` (strict mode)
    StrictLdThis,
    /// Checked `this` (sloppy mode)
    CheckThis,
    /// Checked `this` (strict mode)
    StrictCheckThis,
    /// Property load
    LdFld,
    /// Property load on the root object
    LdRootFld,
    /// Method load
    LdMethodFld,
    /// Method load on the root object
    LdRootMethodFld,
    /// Method load re-issued after a polymorphic dispatch miss
    LdMethodFldPolyInlineMiss,
    /// Load of the target of `.apply` / `.call`
    LdFldForCallApplyTarget,
    /// Load of an inlined accessor function from the inline cache flags
    LdMethodFromFlags,
    /// Property store
    StFld,
    /// Create the heap arguments object
    LdHeapArguments,
    /// Create the heap arguments object (let scope)
    LdLetHeapArguments,
    /// Spread index list of a spread call
    LdSpreadIndices,
    /// Fixed-field check on a method load
    CheckFixedFld,
    /// Property guard check that also loads the receiver type
    CheckPropertyGuardAndLoadType,
    /// Store a constant-index element
    StElemC,
    /// Allocate an array of the given length
    NewScArray,
    /// Start a for-in enumeration
    InitForInEnumerator,

    // Arithmetic (constant folding)
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Remainder
    Rem,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// Left shift
    Shl,
    /// Arithmetic right shift
    Shr,
    /// Logical right shift
    ShrU,
    /// Negation
    Neg,
    /// Bitwise not
    Not,
    /// Increment
    Incr,
    /// Decrement
    Decr,

    // Calls
    /// Start of an argument sequence; src1 carries the argument count
    StartCall,
    /// Outgoing argument
    ArgOut,
    /// Outgoing argument of an inlined call
    ArgOutInline,
    /// Placeholder argument filled from the caller's stack arguments
    ArgOutFixupForStackArgs,
    /// Argument list forwarded from the caller's stack arguments
    ArgOutFromStackArgs,
    /// Argument with a dynamic count
    ArgOutDynamic,
    /// Spread argument
    ArgOutSpreadArg,
    /// Argument of an inlined built-in
    ArgOutInlineBuiltIn,
    /// Implicit receiver argument of a specialized helper call
    ArgOutInlineSpecialized,
    /// Incoming argument
    ArgIn,
    /// Incoming rest parameter
    ArgInRest,
    /// Call
    CallI,
    /// Call of a fixed function
    CallIFixed,
    /// Call with extended (spread) arguments
    CallIExtended,
    /// Call with a dynamic argument count
    CallIDynamic,
    /// Call with a spread argument
    CallIDynamicSpread,
    /// Direct helper call
    CallDirect,
    /// `new` call
    NewScObject,
    /// `new Array(...)` call
    NewScObjArray,
    /// Allocate the object for a split `new`
    NewScObjectNoCtor,
    /// Pick the constructor's result or the allocated object
    GetNewScObject,
    /// Refresh the constructor cache of a split `new`
    UpdateNewScObjectCache,
    /// Return
    Ret,
    /// Throw
    Throw,
    /// Throw from inlined code
    InlineThrow,
    /// Throw a type error
    RuntimeTypeError,
    /// Throw a type error from inlined code
    InlineRuntimeTypeError,
    /// Throw a reference error
    RuntimeReferenceError,
    /// Throw a reference error from inlined code
    InlineRuntimeReferenceError,

    // Inlining frames and captures
    /// Start of an inlined body
    InlineeStart,
    /// End of an inlined body; src1 is the frame size
    InlineeEnd,
    /// Inlinee frame slot
    InlineeMetaArg,
    /// Start of an inlined built-in
    InlineBuiltInStart,
    /// End of an inlined built-in
    InlineBuiltInEnd,
    /// End of an inlined built-in that does not track its arguments
    InlineNonTrackingBuiltInEnd,
    /// End of a call that was dispatched polymorphically
    EndCallForPolymorphicInlinee,
    /// Byte-code copy of an outgoing argument value
    BytecodeArgOutCapture,
    /// Keeps an outgoing argument value alive for bailouts
    BytecodeArgOutUse,

    // Guards
    /// Bail out unless src1 is an object
    BailOnNotObject,
    /// Bail out unless src1 equals src2
    BailOnNotEqual,
    /// Bail out unless src1 is the built-in src2
    BailOnNotBuiltIn,
    /// Shared bailout of a polymorphic dispatch
    BailOnNotPolymorphicInlinee,
    /// Bail out unless src1 is spreadable without side effects
    BailOnNotSpreadable,
    /// Bail out unless arguments still live on the stack
    BailOnNotStackArgs,

    // Inlined built-ins
    /// `Math.abs`
    InlineMathAbs,
    /// `Math.sqrt`
    InlineMathSqrt,
    /// `Math.floor`
    InlineMathFloor,
    /// `Math.ceil`
    InlineMathCeil,
    /// `Math.round`
    InlineMathRound,
    /// `Math.min`
    InlineMathMin,
    /// `Math.max`
    InlineMathMax,
    /// `Math.imul`
    InlineMathImul,
    /// `Math.clz32`
    InlineMathClz32,
    /// `Math.pow`
    InlineMathPow,
    /// `Array.prototype.push`
    InlineArrayPush,
    /// `Array.prototype.pop`
    InlineArrayPop,
    /// `String.prototype.charAt`
    InlineStringCharAt,
    /// `String.prototype.charCodeAt`
    InlineStringCharCodeAt,
    /// `Function.prototype.apply`
    InlineFunctionApply,
    /// `Function.prototype.call`
    InlineFunctionCall,
}

impl OpCode {
    /// Whether this opcode transfers control to `Instr::target`.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            OpCode::Br | OpCode::BrTrue | OpCode::BrFalse | OpCode::BrAddr | OpCode::BrOnEmpty | OpCode::BrOnNotEmpty
        )
    }

    /// Whether this opcode defines an outgoing argument slot.
    pub fn is_arg_out(self) -> bool {
        matches!(
            self,
            OpCode::ArgOut
                | OpCode::ArgOutInline
                | OpCode::ArgOutFixupForStackArgs
                | OpCode::ArgOutFromStackArgs
                | OpCode::ArgOutDynamic
                | OpCode::ArgOutSpreadArg
                | OpCode::ArgOutInlineBuiltIn
                | OpCode::ArgOutInlineSpecialized
        )
    }

    /// Whether this opcode is a call consuming an argument chain.
    pub fn is_call(self) -> bool {
        matches!(
            self,
            OpCode::CallI
                | OpCode::CallIFixed
                | OpCode::CallIExtended
                | OpCode::CallIDynamic
                | OpCode::CallIDynamicSpread
                | OpCode::CallDirect
                | OpCode::NewScObject
                | OpCode::NewScObjArray
        )
    }

    /// Whether this opcode is a guard that bails out when its check fails.
    pub fn is_guard(self) -> bool {
        matches!(
            self,
            OpCode::BailOnNotObject
                | OpCode::BailOnNotEqual
                | OpCode::BailOnNotBuiltIn
                | OpCode::BailOnNotPolymorphicInlinee
                | OpCode::BailOnNotSpreadable
                | OpCode::BailOnNotStackArgs
                | OpCode::CheckFixedFld
                | OpCode::CheckPropertyGuardAndLoadType
                | OpCode::CheckThis
                | OpCode::StrictCheckThis
        )
    }

    /// Whether this is a method or property load that can produce a call target.
    pub fn is_method_load(self) -> bool {
        matches!(
            self,
            OpCode::LdFld
                | OpCode::LdRootFld
                | OpCode::LdMethodFld
                | OpCode::LdRootMethodFld
                | OpCode::LdFldForCallApplyTarget
        )
    }
}
