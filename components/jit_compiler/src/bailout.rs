//! Bailout kinds
//!
//! A guard that fails at run time transfers control back to the
//! interpreter at the guard's byte-code location. The kind says which
//! speculation failed, so the runtime can decide whether to disable it
//! the next time the function is compiled.

use strum::Display;

/// Why a guard bails out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BailOutKind {
    /// The call target is not the function the inlinee was built for
    #[strum(serialize = "BailOutOnInlineFunction")]
    OnInlineFunction,
    /// The call target matches none of the polymorphic inlinees (function-info dispatch)
    #[strum(serialize = "BailOutOnPolymorphicInlineFunction")]
    OnPolymorphicInlineFunction,
    /// The receiver type matches none of the polymorphic inlinees (type dispatch)
    #[strum(serialize = "BailOutOnFailedPolymorphicInlineTypeCheck")]
    OnFailedPolymorphicInlineTypeCheck,
    /// The receiver type of a fixed method load changed
    #[strum(serialize = "BailOutFailedFixedFieldTypeCheck")]
    FailedFixedFieldTypeCheck,
    /// The receiver left the equivalent type set of a fixed method load
    #[strum(serialize = "BailOutFailedEquivalentFixedFieldTypeCheck")]
    FailedEquivalentFixedFieldTypeCheck,
    /// A fixed property was overwritten
    #[strum(serialize = "BailOutFailedFixedFieldCheck")]
    FailedFixedFieldCheck,
    /// The accessor resolved by the inline cache changed
    #[strum(serialize = "BailOutFailedInlineTypeCheck")]
    FailedInlineTypeCheck,
    /// `this` needed conversion
    #[strum(serialize = "BailOutCheckThis")]
    CheckThis,
    /// The array is no longer native
    #[strum(serialize = "BailOutOnNotNativeArray")]
    OnNotNativeArray,
    /// A floor-family result did not fit an int
    #[strum(serialize = "BailOutOnFloor")]
    OnFloor,
    /// The arguments object escaped the stack
    #[strum(serialize = "BailOutOnNotStackArgs")]
    OnNotStackArgs,
}

impl BailOutKind {
    /// Whether the kind belongs to a polymorphic dispatch.
    pub fn is_polymorphic(self) -> bool {
        matches!(
            self,
            BailOutKind::OnPolymorphicInlineFunction | BailOutKind::OnFailedPolymorphicInlineTypeCheck
        )
    }

    /// Whether the kind guards a fixed-field speculation.
    pub fn is_fixed_field(self) -> bool {
        matches!(
            self,
            BailOutKind::FailedFixedFieldTypeCheck
                | BailOutKind::FailedEquivalentFixedFieldTypeCheck
                | BailOutKind::FailedFixedFieldCheck
        )
    }
}
