//! Read-only profile and type-feedback records consumed by the JIT.
//!
//! This module is placed in core_types so that the profiler that produces
//! these records and the compiler that consumes them do not depend on each
//! other. Records are immutable once published and shared through [`Arc`],
//! so concurrent compilations can read them without locking.

use crate::{Addr, BuiltinFunction, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Profiled call-site id within one function.
pub type ProfileId = u16;
/// Inline cache index within one function.
pub type InlineCacheIndex = u32;
/// Interned property id.
pub type PropertyId = u32;

/// How `this` was observed at a function's entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThisType {
    /// Not enough data
    #[default]
    Unknown,
    /// Always an ordinary object
    Simple,
    /// Needed mapping (primitive or nullish)
    Mapped,
}

/// Static facts about a script function body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBodyInfo {
    /// Function number, unique within the script context
    pub function_number: u32,
    /// Name used in traces
    pub display_name: String,
    /// Identity of the body
    pub addr: Addr,
    /// Declared parameter count including `this`
    pub in_params_count: u16,
    /// Number of profiled call sites in the body
    pub profiled_call_site_count: u16,
    /// Size of the body's byte code
    pub byte_code_count: u32,
    /// Whether dynamic profile data was collected
    pub has_profile_info: bool,
    /// Whether the body contains loops
    pub has_loops: bool,
    /// Whether the body references `arguments`
    pub uses_arguments_object: bool,
    /// Whether the body has a try region
    pub has_try: bool,
    /// Maximum for-in nesting inside the body
    pub for_in_loop_depth: u32,
    /// Observed `this` at entry
    pub this_type: ThisType,
    /// Check-this elimination was disabled after a bailout
    pub check_this_disabled: bool,
    /// Spread inlining was disabled after a bailout
    pub inline_spread_disabled: bool,
    /// `.apply` inlining was disabled after a bailout
    pub inline_apply_disabled: bool,
    /// Floor/ceil/round inlining was disabled after a bailout
    pub floor_inlining_disabled: bool,
}

impl FunctionBodyInfo {
    /// Create a body record with profile data and a simple `this`.
    pub fn new(function_number: u32, display_name: impl Into<String>, addr: Addr, in_params_count: u16) -> Self {
        Self {
            function_number,
            display_name: display_name.into(),
            addr,
            in_params_count,
            profiled_call_site_count: 0,
            byte_code_count: 8,
            has_profile_info: true,
            has_loops: false,
            uses_arguments_object: false,
            has_try: false,
            for_in_loop_depth: 0,
            this_type: ThisType::Simple,
            check_this_disabled: false,
            inline_spread_disabled: false,
            inline_apply_disabled: false,
            floor_inlining_disabled: false,
        }
    }
}

/// A constructor cache observed for a `new` call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstructorCache {
    /// The constructor allocates its own object; skip the pre-allocation
    pub skip_new_sc_object: bool,
    /// The constructor never explicitly returns a value
    pub ctor_has_no_explicit_return_value: bool,
}

/// One observed (receiver type, resolved function) pair of a property load.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedField {
    /// The resolved function object
    pub field_value: Addr,
    /// Function info of the resolved function
    pub func_info_addr: Addr,
    /// Receiver type the value was resolved on
    pub type_addr: Addr,
    /// Type id of the receiver
    pub type_id: TypeId,
    /// Environment captured by the resolved function
    pub environment_addr: Addr,
    /// The next entry resolves to the same function value.
    ///
    /// Set by the inliner while grouping entries; profile producers leave it false.
    pub next_has_same_fixed_field: bool,
}

impl FixedField {
    /// Create a fixed field for a function resolved on a receiver type.
    pub fn new(field_value: Addr, func_info_addr: Addr, type_addr: Addr, type_id: TypeId) -> Self {
        Self {
            field_value,
            func_info_addr,
            type_addr,
            type_id,
            environment_addr: Addr::NULL,
            next_has_same_fixed_field: false,
        }
    }
}

/// Inline-cache derived facts about one property access.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjTypeSpecFldInfo {
    /// Property accessed
    pub property_id: PropertyId,
    /// Observed (type, value) pairs, in recording order
    pub fixed_fields: Vec<FixedField>,
    /// Receiver type id for monomorphic accesses
    pub type_id: Option<TypeId>,
    /// More than one receiver type was observed
    pub is_poly: bool,
    /// The access resolves to a fixed value
    pub has_fixed_value: bool,
    /// The types form an equivalence set rather than a single type
    pub has_equivalent_type_set: bool,
    /// The access goes through a getter or setter
    pub uses_accessor: bool,
    /// The value was found on a prototype
    pub is_loaded_from_proto: bool,
    /// The access can be object-type specialized
    pub is_obj_type_spec_candidate: bool,
    /// Non-configurable field of the root object
    pub is_root_object_non_configurable_field: bool,
    /// Created only to drive polymorphic inlining
    pub created_for_poly_inlining: bool,
    /// Constructor cache attached to this method load
    pub ctor_cache: Option<ConstructorCache>,
    /// Fixed data value of a tagged-int property
    pub fixed_int_value: Option<i32>,
}

impl ObjTypeSpecFldInfo {
    /// The single fixed function of a monomorphic access.
    pub fn fixed_function(&self) -> Option<&FixedField> {
        if self.has_fixed_value {
            self.fixed_fields.first()
        } else {
            None
        }
    }

    /// The i-th fixed function of a polymorphic access.
    pub fn fixed_function_at(&self, index: usize) -> Option<&FixedField> {
        if self.has_fixed_value {
            self.fixed_fields.get(index)
        } else {
            None
        }
    }
}

/// Everything the JIT knows about one callee observed at one call site.
///
/// # Examples
///
/// ```
/// use core_types::{Addr, FunctionBodyInfo, FunctionJitTimeInfo};
/// use std::sync::Arc;
///
/// let body = Arc::new(FunctionBodyInfo::new(7, "add", Addr(0x7000), 3));
/// let callee = Arc::new(FunctionJitTimeInfo::script(Addr(0x7100), body));
/// let caller = FunctionJitTimeInfo::script(
///     Addr(0x100),
///     Arc::new(FunctionBodyInfo::new(1, "main", Addr(0x1000), 1)),
/// )
/// .with_inlinee(0, callee);
///
/// assert!(caller.inlinee(0).is_some());
/// assert!(!caller.is_polymorphic_call_site(0));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionJitTimeInfo {
    /// Function info identity
    pub function_info_addr: Addr,
    /// Script body, absent for built-ins and host functions
    pub body: Option<Arc<FunctionBodyInfo>>,
    /// Built-in identity, when recognized
    pub built_in: Option<BuiltinFunction>,
    /// Next observed callee at a polymorphic call site
    pub next: Option<Arc<FunctionJitTimeInfo>>,
    /// Callees per profiled call site of this function
    pub inlinees: BTreeMap<ProfileId, Arc<FunctionJitTimeInfo>>,
    /// Accessor and call/apply-target callees per inline cache index
    pub ldfld_inlinees: BTreeMap<InlineCacheIndex, Arc<FunctionJitTimeInfo>>,
    /// Property access facts per inline cache index
    pub fld_infos: BTreeMap<InlineCacheIndex, Arc<ObjTypeSpecFldInfo>>,
}

impl FunctionJitTimeInfo {
    /// A script function with a body.
    pub fn script(function_info_addr: Addr, body: Arc<FunctionBodyInfo>) -> Self {
        Self {
            function_info_addr,
            body: Some(body),
            ..Self::default()
        }
    }

    /// A recognized built-in.
    pub fn built_in(function_info_addr: Addr, built_in: BuiltinFunction) -> Self {
        Self {
            function_info_addr,
            built_in: Some(built_in),
            ..Self::default()
        }
    }

    /// Add the callee observed at `profile_id`.
    pub fn with_inlinee(mut self, profile_id: ProfileId, inlinee: Arc<FunctionJitTimeInfo>) -> Self {
        self.inlinees.insert(profile_id, inlinee);
        self
    }

    /// Add the accessor or apply/call target observed at `cache_index`.
    pub fn with_ldfld_inlinee(mut self, cache_index: InlineCacheIndex, inlinee: Arc<FunctionJitTimeInfo>) -> Self {
        self.ldfld_inlinees.insert(cache_index, inlinee);
        self
    }

    /// Add property access facts for `cache_index`.
    pub fn with_fld_info(mut self, cache_index: InlineCacheIndex, info: Arc<ObjTypeSpecFldInfo>) -> Self {
        self.fld_infos.insert(cache_index, info);
        self
    }

    /// Chain another polymorphic variant after this one.
    pub fn with_next(mut self, next: Arc<FunctionJitTimeInfo>) -> Self {
        self.next = Some(next);
        self
    }

    /// Callee observed at a call site.
    pub fn inlinee(&self, profile_id: ProfileId) -> Option<&Arc<FunctionJitTimeInfo>> {
        self.inlinees.get(&profile_id)
    }

    /// Accessor or call/apply target observed at an inline cache.
    pub fn ldfld_inlinee(&self, cache_index: InlineCacheIndex) -> Option<&Arc<FunctionJitTimeInfo>> {
        self.ldfld_inlinees.get(&cache_index)
    }

    /// Property access facts at an inline cache.
    pub fn fld_info(&self, cache_index: InlineCacheIndex) -> Option<&Arc<ObjTypeSpecFldInfo>> {
        self.fld_infos.get(&cache_index)
    }

    /// Whether more than one callee was observed at the call site.
    pub fn is_polymorphic_call_site(&self, profile_id: ProfileId) -> bool {
        self.inlinee(profile_id).is_some_and(|info| info.next.is_some())
    }

    /// Whether any accessor or call/apply target data is present.
    pub fn is_ldfld_inlinee_present(&self) -> bool {
        !self.ldfld_inlinees.is_empty()
    }

    /// Number of profiled call sites, i.e. the number of potential inlinees.
    pub fn inlinee_count(&self) -> u16 {
        self.body.as_ref().map_or(0, |body| body.profiled_call_site_count)
    }

    /// Whether this record has a script body.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Display name for traces.
    pub fn display_name(&self) -> &str {
        match (&self.body, self.built_in) {
            (Some(body), _) => &body.display_name,
            (None, Some(built_in)) => built_in.name(),
            (None, None) => "<unknown>",
        }
    }

    /// Iterate this record and its polymorphic successors.
    pub fn variants(&self) -> impl Iterator<Item = &FunctionJitTimeInfo> {
        std::iter::successors(Some(self), |info| info.next.as_deref())
    }
}
