//! Getter and setter inlining.
//!
//! A property access whose inline cache resolved to an accessor is turned
//! into a simulated call of that accessor, which is then inlined like any
//! other call:
//!
//! ```text
//!                                m = LdMethodFromFlags o.p   [FailedInlineTypeCheck]
//!                                s = StartCall 1
//! d = LdFld o.p          =>      ArgOut a1 = o, s
//!                                d = LdFld m, a1             (inlined)
//! ```
//!
//! A setter passes the stored value as a second argument and has no
//! destination.

use super::driver::{Step, Walk};
use super::fixed_method::FixedMethodRequest;
use super::splice::InlineSite;
use super::Inliner;
use crate::bailout::BailOutKind;
use crate::ir::{Func, InstrId, OpCode, Opnd, PropertyOpnd};
use core_types::{FunctionJitTimeInfo, JitResult, ProfileId};
use std::sync::Arc;

impl Inliner<'_> {
    /// Inline the accessor behind a `LdFld`, `LdFldForCallApplyTarget` or
    /// `StFld`, when the profile recorded one.
    pub(super) fn try_inline_accessor(&mut self, func: &mut Func, walk: &mut Walk<'_>, instr: InstrId) -> JitResult<Step> {
        let skip = Ok(Step::default());
        let inliner_info = walk.info(func);
        if !inliner_info.is_ldfld_inlinee_present() || !func.instr(instr).from_accessor {
            return skip;
        }
        let is_getter = func.instr(instr).opcode != OpCode::StFld;
        let opnd = if is_getter {
            func.instr(instr).src1.as_ref()
        } else {
            func.instr(instr).dst()
        };
        let Some(method) = opnd.and_then(Opnd::as_property).cloned() else {
            return skip;
        };
        let Some(inlinee) = inliner_info.ldfld_inlinee(method.cache_index).cloned() else {
            return skip;
        };
        if !inlinee.has_body() {
            return skip;
        }
        let phase_on = self.flags.inline_accessors
            && if is_getter {
                self.flags.inline_getters
            } else {
                self.flags.inline_setters
            };
        if !phase_on {
            return skip;
        }

        self.inline_getter_setter(func, walk, instr, &inlinee, method, is_getter)?;
        walk.inlined_count += 1;
        Ok(Step {
            inlined: true,
            ..Step::default()
        })
    }

    fn inline_getter_setter(
        &mut self,
        func: &mut Func,
        walk: &Walk<'_>,
        accessor: InstrId,
        info: &Arc<FunctionJitTimeInfo>,
        method: PropertyOpnd,
        is_getter: bool,
    ) -> JitResult<()> {
        let next = func.next(accessor);
        let property_id = method.property_id;
        let return_value = if is_getter { func.unlink_dst(accessor) } else { None };

        let checks_before = simulate_call_for_getter_setter(func, accessor, method, is_getter);
        let rewrite = self.try_optimize_call_with_fixed_method(func, accessor, &FixedMethodRequest::inlining(info, false));

        let inlinee = func.new_inlinee(walk.func, info.clone());
        let data = func.data_mut(inlinee);
        data.is_getter_setter = true;
        data.call_site_id = ProfileId::MAX;

        let site = InlineSite {
            inlinee,
            info: info.clone(),
            original_target: None,
            return_value,
            checks_before,
            safe_this: rewrite.is_some_and(|r| r.safe_this),
            is_apply_target: false,
            next,
        };
        self.inline_function_common(func, walk, accessor, site)?;
        self.stats.accessors_inlined += 1;
        log::debug!(
            "Inlined {} {} into {} for property {}",
            if is_getter { "getter" } else { "setter" },
            info.display_name(),
            walk.info(func).display_name(),
            property_id
        );
        Ok(())
    }
}

/// Load the accessor and build its argument chain in front of `accessor`.
/// Returns the `StartCall`, in front of which guards go.
fn simulate_call_for_getter_setter(func: &mut Func, accessor: InstrId, method: PropertyOpnd, is_getter: bool) -> InstrId {
    let owner = func.instr(accessor).func;
    let object = method.object;
    // A setter also passes the value being stored.
    let arg_count = if is_getter { 1 } else { 2 };

    let method_reg = func.new_reg(owner);
    let ld_method = func.create(
        OpCode::LdMethodFromFlags,
        owner,
        Some(Opnd::Reg(method_reg)),
        Some(Opnd::Property(method)),
        None,
    );
    func.insert_before(accessor, ld_method);
    func.tag_with_source_location(ld_method, accessor);
    let record = func.new_bailout_record(BailOutKind::FailedInlineTypeCheck, accessor);
    func.set_bailout(ld_method, BailOutKind::FailedInlineTypeCheck, record);

    let start_reg = func.new_reg(owner);
    let start = func.create(
        OpCode::StartCall,
        owner,
        Some(Opnd::Reg(start_reg)),
        Some(Opnd::IntConst(arg_count)),
        None,
    );
    func.insert_before(accessor, start);
    func.tag_with_source_location(start, accessor);

    let this_slot = func.new_arg_slot_sym(1, owner);
    let this_arg = func.create(
        OpCode::ArgOut,
        owner,
        Some(Opnd::Sym(this_slot)),
        Some(Opnd::Reg(object)),
        Some(Opnd::Reg(start_reg)),
    );
    func.insert_before(accessor, this_arg);

    let mut last_slot = this_slot;
    if !is_getter {
        let value = func.unlink_src1(accessor);
        let value_slot = func.new_arg_slot_sym(2, owner);
        let value_arg = func.create(
            OpCode::ArgOut,
            owner,
            Some(Opnd::Sym(value_slot)),
            value,
            Some(Opnd::Sym(this_slot)),
        );
        func.insert_before(accessor, value_arg);
        last_slot = value_slot;
    }

    let instr = func.instr_mut(accessor);
    instr.src1 = Some(Opnd::Reg(method_reg));
    instr.src2 = Some(Opnd::Sym(last_slot));
    if !is_getter {
        func.unlink_dst(accessor);
    }
    start
}
