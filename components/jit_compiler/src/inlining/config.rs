//! Inlining thresholds.

use core_types::JitError;
use serde::{Deserialize, Serialize};

/// Numeric limits for inlining decisions.
///
/// Phase on/off switches live in [`core_types::JitFlags`]; this struct
/// only holds the budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InliningConfig {
    /// Maximum number of profiled call sites a callee may have
    pub max_inlinee_call_sites: u16,
    /// Maximum number of call sites inlined into one function
    pub max_inlinees_per_function: u32,
    /// Maximum self-recursive inlining depth
    pub max_recursive_depth: u32,
    /// Byte-code size limit for calls outside every loop of a looping function
    pub outside_loop_threshold: u32,
    /// Byte-code size limit for ordinary callees
    pub max_inlinee_byte_code: u32,
    /// Byte-code size limit for constructors
    pub constructor_inline_threshold: u32,
    /// Maximum number of targets at a polymorphic call site
    pub max_polymorphic_inlinees: usize,
    /// Maximum argument slot number of an inlined call, `this` included
    pub max_inlinee_arg_slot: u16,
    /// Arguments inspected when computing the constant-argument mask
    pub max_constant_argument_count: u16,
    /// Inline nesting at which the stack probe fails the compilation
    pub max_inline_nesting: u32,
}

impl Default for InliningConfig {
    fn default() -> Self {
        Self {
            max_inlinee_call_sites: 16,
            max_inlinees_per_function: 24,
            max_recursive_depth: 2,
            outside_loop_threshold: 16,
            max_inlinee_byte_code: 80,
            constructor_inline_threshold: 21,
            max_polymorphic_inlinees: 4,
            max_inlinee_arg_slot: 15,
            max_constant_argument_count: 8,
            max_inline_nesting: 32,
        }
    }
}

impl InliningConfig {
    /// Parse thresholds from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, JitError> {
        let config: InliningConfig =
            serde_json::from_str(json).map_err(|e| JitError::invalid_config(format!("inlining config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits the inliner cannot honour.
    pub fn validate(&self) -> Result<(), JitError> {
        if !(2..=4).contains(&self.max_polymorphic_inlinees) {
            return Err(JitError::invalid_config(format!(
                "max_polymorphic_inlinees must be between 2 and 4, got {}",
                self.max_polymorphic_inlinees
            )));
        }
        if self.max_inlinee_arg_slot == 0 || self.max_inlinee_arg_slot > 15 {
            return Err(JitError::invalid_config(format!(
                "max_inlinee_arg_slot must be between 1 and 15, got {}",
                self.max_inlinee_arg_slot
            )));
        }
        if self.max_inline_nesting == 0 {
            return Err(JitError::invalid_config("max_inline_nesting must be positive"));
        }
        if self.max_constant_argument_count > 16 {
            log::warn!(
                "max_constant_argument_count {} exceeds the 16-bit mask; extra arguments are ignored",
                self.max_constant_argument_count
            );
        }
        Ok(())
    }
}
