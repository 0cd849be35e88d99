//! Constructor-call splitting.
//!
//! `d = NewScObject F, a2` is split into allocation, call and result
//! selection, so the constructor can be called (or inlined) like any other
//! function:
//!
//! ```text
//! o = NewScObjectNoCtor F
//! ArgOut     a1 = o, a2
//! d = CallI  F, a1              (is_ctor_call)
//! d = GetNewScObject d, o       or   d = Ld o
//! UpdateNewScObjectCache F, d   (only without a proven constructor cache)
//! ```

use super::Inliner;
use crate::ir::{Func, InstrId, OpCode, Opnd};

impl Inliner<'_> {
    /// Split a `NewScObject`. Returns the first instruction of the split
    /// sequence, or `None` when the call is left for the lowerer's fast
    /// `Object` / `Array` allocation helpers.
    pub(super) fn split_constructor_call(
        &self,
        func: &mut Func,
        call: InstrId,
        is_inlined: bool,
        is_fixed: bool,
    ) -> Option<InstrId> {
        assert_eq!(
            func.instr(call).opcode,
            OpCode::NewScObject,
            "splitting a non-constructor call {call}"
        );
        let caller = func.instr(call).func;
        let profile_id = func.instr(call).profile_id;
        let cache = profile_id.and_then(|id| func.data(caller).constructor_caches.get(&id).copied());
        let return_created = cache.is_some_and(|cache| cache.ctor_has_no_explicit_return_value);
        // An inlined constructor always gets its object allocated up front.
        let skip = !is_inlined && cache.is_some_and(|cache| cache.skip_new_sc_object);
        let target = func.instr(call).src1.clone();

        if skip {
            let fixed_info = target
                .as_ref()
                .and_then(Opnd::as_addr)
                .and_then(|addr| addr.fixed.as_ref())
                .map(|fixed| fixed.func_info_addr);
            let context = func.script_context();
            let fast_helper = fixed_info
                .is_some_and(|info| info == context.object_new_instance_addr || info == context.array_new_instance_addr);
            if fast_helper && func.has_empty_arg_out_chain(call) {
                log::trace!("constructor call {} left to the allocation helper", call);
                return None;
            }
        }

        let created = if skip {
            None
        } else {
            let dst = func.new_reg(caller);
            let create = func.create(OpCode::NewScObjectNoCtor, caller, Some(Opnd::Reg(dst)), target.clone(), None);
            func.instr_mut(create).profile_id = profile_id;
            func.insert_before(call, create);
            func.tag_with_source_location(create, call);
            Some((create, dst))
        };
        let this = match created {
            Some((_, dst)) => Opnd::Reg(dst),
            None => Opnd::addr(func.script_context().null_addr),
        };

        let this_slot = func.new_arg_slot_sym(1, caller);
        let arg = func.create(
            OpCode::ArgOut,
            caller,
            Some(Opnd::Sym(this_slot)),
            Some(this),
            func.instr(call).src2.clone(),
        );
        func.insert_before(call, arg);
        func.tag_with_source_location(arg, call);

        let instr = func.instr_mut(call);
        instr.opcode = if is_fixed { OpCode::CallIFixed } else { OpCode::CallI };
        instr.is_ctor_call = true;
        instr.src2 = Some(Opnd::Sym(this_slot));

        let location = func.next(call);
        let call_dst = func.instr(call).dst().cloned();
        let mut at = call;
        let mut insert = |func: &mut Func, new: InstrId| {
            func.insert_after(at, new);
            if let Some(location) = location {
                func.tag_with_source_location(new, location);
            }
            at = new;
        };

        if let Some(dst) = call_dst.clone() {
            match created {
                Some((_, created_dst)) if return_created => {
                    let ld = func.create(OpCode::Ld, caller, Some(dst), Some(Opnd::Reg(created_dst)), None);
                    insert(func, ld);
                }
                Some((_, created_dst)) => {
                    let select = func.create(
                        OpCode::GetNewScObject,
                        caller,
                        Some(dst.clone()),
                        Some(dst),
                        Some(Opnd::Reg(created_dst)),
                    );
                    insert(func, select);
                }
                None => {}
            }
        }
        if cache.is_none() {
            let update = func.create(OpCode::UpdateNewScObjectCache, caller, None, target, call_dst);
            insert(func, update);
        }

        Some(created.map_or(call, |(create, _)| create))
    }
}
