//! Phase switches shared by the compiler crates.
//!
//! Every switch defaults to on. A host turns phases off individually, usually
//! from a JSON snippet in its configuration file.

use crate::JitError;
use serde::{Deserialize, Serialize};

/// Compiler phase switches.
///
/// # Examples
///
/// ```
/// use core_types::JitFlags;
///
/// let flags = JitFlags::from_json(r#"{ "inline_apply": false }"#).unwrap();
/// assert!(!flags.inline_apply);
/// assert!(flags.inline);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitFlags {
    /// Master switch for the inliner
    pub inline: bool,
    /// Inline recognized built-ins
    pub inline_built_ins: bool,
    /// Inline getters and setters
    pub inline_accessors: bool,
    /// Inline getters
    pub inline_getters: bool,
    /// Inline setters
    pub inline_setters: bool,
    /// Inline constructors
    pub inline_constructors: bool,
    /// Inline polymorphic call sites
    pub polymorphic_inline: bool,
    /// Use fixed methods for polymorphic dispatch
    pub polymorphic_inline_fixed_methods: bool,
    /// Speculate on fixed methods at all
    pub fixed_methods: bool,
    /// Fixed methods for inlined constructors
    pub fixed_ctor_inlining: bool,
    /// Fixed methods for called (not inlined) constructors
    pub fixed_ctor_calls: bool,
    /// Fixed methods for inlined built-ins
    pub fixed_built_in_method_inlining: bool,
    /// Fixed methods for called built-ins
    pub fixed_built_in_method_calls: bool,
    /// Fixed methods for inlined script functions
    pub fixed_script_method_inlining: bool,
    /// Fixed methods for called script functions
    pub fixed_script_method_calls: bool,
    /// Inline `.apply`
    pub inline_apply: bool,
    /// Inline the target of `.apply`
    pub inline_apply_target: bool,
    /// Inline `.apply` called with only a receiver
    pub inline_apply_without_array_arg: bool,
    /// Inline `.call`
    pub inline_call: bool,
    /// Inline the target of `.call`
    pub inline_call_target: bool,
    /// Inline spread calls
    pub inline_spread: bool,
    /// Allow recursive inlining with constant arguments
    pub inline_recursive: bool,
    /// Fold constants through inlinee arguments
    pub inliner_const_fold: bool,
    /// Use fixed data properties while folding
    pub use_fixed_data_props: bool,
    /// Replace `LdThis` with a checked form when profitable
    pub check_this: bool,
    /// Float type specialization is available downstream
    pub float_type_spec: bool,
    /// Aggressive int type specialization is available downstream
    pub aggressive_int_type_spec: bool,
    /// Lossy int type specialization is available downstream
    pub lossy_int_type_spec: bool,
    /// SSE4.1 rounding instructions are available
    pub sse4_1: bool,
    /// Split `new` into allocation and call even when not inlining
    pub split_new_sc_object: bool,
}

impl Default for JitFlags {
    fn default() -> Self {
        Self {
            inline: true,
            inline_built_ins: true,
            inline_accessors: true,
            inline_getters: true,
            inline_setters: true,
            inline_constructors: true,
            polymorphic_inline: true,
            polymorphic_inline_fixed_methods: true,
            fixed_methods: true,
            fixed_ctor_inlining: true,
            fixed_ctor_calls: true,
            fixed_built_in_method_inlining: true,
            fixed_built_in_method_calls: true,
            fixed_script_method_inlining: true,
            fixed_script_method_calls: false, // opt-in, mirrors the runtime default
            inline_apply: true,
            inline_apply_target: true,
            inline_apply_without_array_arg: true,
            inline_call: true,
            inline_call_target: true,
            inline_spread: true,
            inline_recursive: true,
            inliner_const_fold: true,
            use_fixed_data_props: true,
            check_this: true,
            float_type_spec: true,
            aggressive_int_type_spec: true,
            lossy_int_type_spec: true,
            sse4_1: true,
            split_new_sc_object: true,
        }
    }
}

impl JitFlags {
    /// Parse flags from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, JitError> {
        serde_json::from_str(json).map_err(|e| JitError::invalid_config(format!("jit flags: {e}")))
    }

    /// Flags with every inlining phase switched off.
    pub fn no_inlining() -> Self {
        Self {
            inline: false,
            ..Self::default()
        }
    }
}
