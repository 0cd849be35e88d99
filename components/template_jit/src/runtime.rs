//! Runtime addresses and per-function facts the templates embed.

use core_types::Addr;

/// Process-wide helper entry points and constants.
///
/// Helpers follow the cdecl convention: arguments on the stack, the caller
/// pops them, integer results in `eax`, double results on the x87 stack.
/// The negation masks must be 16-byte aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeAddrs {
    /// Lowest usable stack address; `esp` must stay above it plus the frame
    pub stack_limit: Addr,
    /// Copies the arguments into a fresh frame and fills its reserved
    /// slots; called with the function object and the frame pointer
    pub entry_helper: Addr,
    /// Called with the frame size and script context when the probe fails
    pub probe_stack: Addr,
    /// Touches every page of a large frame; takes its size in `eax`
    pub chkstk: Addr,
    /// `fn(f64) -> i32` with JavaScript `ToInt32` semantics
    pub to_int32: Addr,
    /// `fn(f64, f64) -> f64` floating point remainder
    pub rem_double: Addr,
    /// A quiet NaN double
    pub nan_double: Addr,
    /// Sign-bit mask for negating doubles
    pub neg_double_mask: Addr,
    /// Sign-bit mask for negating floats
    pub neg_float_mask: Addr,
    /// Two doubles: `0.0` and `4294967296.0`
    pub uint_to_double_table: Addr,
    /// The function's loop iteration counter
    pub loop_counter: Addr,
    /// Passed to the stack probe helper
    pub script_context: Addr,
}

/// Converts an address into a 32-bit immediate or displacement.
pub(crate) fn imm32(addr: Addr) -> i32 {
    let value = u32::try_from(addr.0).unwrap_or_else(|_| panic!("address {addr} does not fit in 32 bits"));
    value as i32
}

/// Facts about the function being templated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionInfo {
    /// Bytes of locals and temporaries below the saved frame pointer
    pub frame_size: u32,
    /// Bytes of incoming arguments, excluding the function object
    pub arg_bytes: u32,
    /// The heap cannot be detached or grown, so calls need not reload it
    pub fixed_heap: bool,
}

pub(crate) fn align8(value: u32) -> u32 {
    (value + 7) & !7
}
