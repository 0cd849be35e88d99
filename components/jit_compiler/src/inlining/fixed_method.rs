//! Fixed-method rewriting.
//!
//! When the inline cache of the load producing a call target proved that the
//! property always holds the same function, the load becomes a
//! `CheckFixedFld` guard and the call uses the function as a constant:
//!
//! ```text
//! r = LdMethodFld o.m              CheckFixedFld o.m        [FailedFixedFieldTypeCheck]
//! CallI d = r, args        =>      r = Ld <fixed function>
//!                                  CallIFixed d = <fixed function>, args
//! ```

use super::Inliner;
use crate::bailout::BailOutKind;
use crate::ir::{Func, InstrId, OpCode, Opnd};
use core_types::{FunctionJitTimeInfo, TypeId};

/// How a call is about to be handled.
#[derive(Debug, Clone, Copy)]
pub(super) struct FixedMethodRequest<'i> {
    /// The callee the fixed function must match, if one was chosen
    pub inlinee: Option<&'i FunctionJitTimeInfo>,
    pub is_polymorphic: bool,
    pub is_built_in: bool,
    pub is_ctor: bool,
    pub is_inlined: bool,
    /// Only report whether the rewrite is possible
    pub just_check: bool,
    /// Fixed field to use at a polymorphic site
    pub poly_index: usize,
}

impl<'i> FixedMethodRequest<'i> {
    /// A monomorphic call that is being inlined.
    pub fn inlining(inlinee: &'i FunctionJitTimeInfo, is_ctor: bool) -> Self {
        Self {
            inlinee: Some(inlinee),
            is_polymorphic: false,
            is_built_in: false,
            is_ctor,
            is_inlined: true,
            just_check: false,
            poly_index: 0,
        }
    }

    /// A built-in whose call is replaced by an inline form.
    pub fn built_in(inlinee: &'i FunctionJitTimeInfo) -> Self {
        Self {
            is_built_in: true,
            ..Self::inlining(inlinee, false)
        }
    }

    /// Only check that the target is the fixed function of `inlinee`.
    pub fn check(self) -> Self {
        Self {
            just_check: true,
            ..self
        }
    }
}

/// Outcome of a successful rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) struct FixedRewrite {
    /// The receiver is known to be an ordinary object, so an inlined
    /// callee's `this` needs no check
    pub safe_this: bool,
}

impl Inliner<'_> {
    fn fixed_method_phase_enabled(&self, request: &FixedMethodRequest<'_>, uses_accessor: bool) -> bool {
        let flags = &self.flags;
        if request.is_ctor {
            let enabled = if request.is_inlined {
                flags.fixed_ctor_inlining
            } else {
                flags.fixed_ctor_calls
            };
            // Accessor-backed constructor loads have no cache to protect.
            enabled && !uses_accessor
        } else if request.is_built_in {
            if request.is_inlined {
                flags.fixed_built_in_method_inlining
            } else {
                flags.fixed_built_in_method_calls
            }
        } else if request.is_inlined {
            flags.fixed_script_method_inlining
        } else {
            flags.fixed_script_method_calls
        }
    }

    /// Rewrite `call` to use the fixed function proven by its target load.
    ///
    /// Returns `None`, leaving the IR untouched, when no fixed function is
    /// known or it does not match the requested inlinee.
    pub(super) fn try_optimize_call_with_fixed_method(
        &self,
        func: &mut Func,
        call: InstrId,
        request: &FixedMethodRequest<'_>,
    ) -> Option<FixedRewrite> {
        if !self.flags.fixed_methods {
            return None;
        }
        let target = func.instr(call).src1.as_ref()?.as_reg()?;
        let mut load = func.sym(target).single_def()?;
        while func.instr(load).opcode == OpCode::BytecodeArgOutCapture {
            let src = func.instr(load).src1.as_ref()?.stack_sym()?;
            load = func.sym(src).single_def()?;
        }
        let load_opcode = func.instr(load).opcode;
        if !(load_opcode.is_method_load() || load_opcode == OpCode::LdMethodFromFlags) {
            log::trace!("fixed method: target of {} is loaded by {}", call, load_opcode);
            return None;
        }
        let fld_info = func.instr(load).src1.as_ref()?.as_property()?.fld_info.clone()?;

        if !self.fixed_method_phase_enabled(request, fld_info.uses_accessor) {
            return None;
        }
        if !fld_info.is_obj_type_spec_candidate && !fld_info.is_root_object_non_configurable_field {
            log::trace!("fixed method: load {} is not a type-spec candidate", load);
            return None;
        }

        let fixed = if !request.is_polymorphic {
            fld_info.fixed_function()
        } else if request.is_inlined {
            fld_info.fixed_function_at(request.poly_index)
        } else {
            None
        }?
        .clone();

        if let Some(inlinee) = request.inlinee {
            if fixed.func_info_addr != inlinee.function_info_addr {
                log::trace!(
                    "fixed method: {} resolved to function info {}, expected {}",
                    call,
                    fixed.func_info_addr,
                    inlinee.function_info_addr
                );
                return None;
            }
        }
        if request.just_check {
            return Some(FixedRewrite::default());
        }

        let owner = func.instr(load).func;
        if load_opcode == OpCode::LdMethodFromFlags {
            func.instr_mut(load).bailout = None;
        }
        func.instr_mut(load).opcode = OpCode::CheckFixedFld;
        let dst = func.unlink_dst(load);
        let kind = if fld_info.has_equivalent_type_set {
            BailOutKind::FailedEquivalentFixedFieldTypeCheck
        } else {
            BailOutKind::FailedFixedFieldTypeCheck
        };
        let record = func.new_bailout_record(kind, load);
        func.set_bailout(load, kind, record);

        if request.is_ctor && func.instr(call).opcode != OpCode::NewScObjArray {
            if let (Some(cache), Some(profile_id)) = (fld_info.ctor_cache, func.instr(call).profile_id) {
                let caller = func.instr(call).func;
                func.data_mut(caller).constructor_caches.insert(profile_id, cache);
            }
        }

        let ld = func.create(OpCode::Ld, owner, dst, Some(Opnd::fixed_function(fixed.clone())), None);
        func.insert_after(load, ld);
        func.tag_with_source_location(ld, load);

        let call_instr = func.instr_mut(call);
        call_instr.src1 = Some(Opnd::fixed_function(fixed.clone()));
        if call_instr.opcode == OpCode::CallI || call_instr.from_accessor {
            call_instr.opcode = OpCode::CallIFixed;
        }
        log::trace!("fixed method: {} now calls {}", call, fixed.field_value);

        let receiver_type = if fld_info.is_root_object_non_configurable_field {
            Some(TypeId::GlobalObject)
        } else {
            fld_info.type_id
        };
        let safe_this = !request.is_built_in
            && request.is_inlined
            && receiver_type.is_some_and(TypeId::is_true_object);
        Some(FixedRewrite { safe_this })
    }
}
