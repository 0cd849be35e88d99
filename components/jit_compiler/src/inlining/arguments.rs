//! Whether an inlinee needs a real `arguments` object.

use crate::ir::{Func, FuncId, OpCode, Opnd, SymId};
use core_types::BuiltinFunction;

/// Whether `inlinee` reads `arguments` in a way that needs the argument
/// slots materialized, rather than only forwarding them to an inlined
/// `.apply` target.
pub(super) fn inlinee_has_argument_object(func: &Func, inlinee: FuncId) -> bool {
    let info = &func.data(inlinee).jit_info;
    if !info.body.as_ref().is_some_and(|body| body.uses_arguments_object) {
        return false;
    }
    if !func.data(inlinee).has_apply_target_inlining {
        return true;
    }

    let mut args_sym: Option<SymId> = None;
    let mut in_apply = false;
    for id in func.instrs_of(inlinee) {
        let instr = func.instr(id);
        if instr.func != inlinee {
            continue;
        }
        match instr.opcode {
            OpCode::LdHeapArguments | OpCode::LdLetHeapArguments => {
                args_sym = instr.dst_sym();
                continue;
            }
            _ if args_sym.is_none() => continue,
            OpCode::InlineBuiltInStart if instr.built_in == Some(BuiltinFunction::FunctionApply) => {
                in_apply = true;
                continue;
            }
            OpCode::InlineBuiltInEnd => {
                in_apply = false;
                continue;
            }
            OpCode::BailOnNotStackArgs
            | OpCode::ArgOutInlineBuiltIn
            | OpCode::BytecodeArgOutCapture
            | OpCode::BytecodeArgOutUse => continue,
            _ => {}
        }
        let Some(args) = args_sym else {
            continue;
        };
        if instr.opcode == OpCode::ArgOutFromStackArgs {
            // Only a forward through the apply built-in itself still reads the slots.
            if in_apply && instr.src1.as_ref().is_some_and(|src| src.references(args)) {
                return true;
            }
            continue;
        }
        let reads = [&instr.src1, &instr.src2]
            .into_iter()
            .flatten()
            .any(|src| src.references(args));
        let writes = instr.dst().is_some_and(|dst| match dst {
            Opnd::Sym(_) | Opnd::Indir { .. } | Opnd::Property(_) => dst.references(args),
            _ => false,
        });
        if reads || writes {
            return true;
        }
    }
    false
}
