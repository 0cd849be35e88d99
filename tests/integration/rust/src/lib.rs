//! Integration test suite for the JIT components
//!
//! This crate provides the pieces the cross-crate tests share:
//! - [`builders`]: caller and inlinee IR construction for the inliner
//! - [`x86`]: an interpreter for the code the templates emit

pub mod builders;

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use jit_compiler;
    pub use template_jit;
}
