//! Division Template Integration Tests
//!
//! Integer division templates never fault: a zero divisor yields 0 and
//! `MIN / -1` yields `MIN` with remainder 0.

use integration_tests::x86::Machine;
use template_jit::templates::IntBinaryOp;
use template_jit::{CodeBuffer, FunctionInfo, RuntimeAddrs, TemplateConfig, TemplateContext, TemplateOp};

const LEFT: i32 = 0;
const RIGHT: i32 = 4;
const DST: i32 = 8;

fn context() -> TemplateContext {
    let function = FunctionInfo {
        frame_size: 64,
        arg_bytes: 0,
        fixed_heap: true,
    };
    TemplateContext::new(TemplateConfig::default(), RuntimeAddrs::default(), function)
}

/// Run `op` on `left` and `right` held in the frame, returning the result slot.
fn run(op: IntBinaryOp, left: i32, right: i32) -> i32 {
    let mut ctx = context();
    let mut buffer = CodeBuffer::with_capacity(256);
    ctx.apply_template(
        &mut buffer,
        &TemplateOp::IntBinary {
            op,
            dst: DST,
            left: LEFT,
            right: RIGHT,
        },
    )
    .unwrap();

    let mut machine = Machine::new();
    machine.set_frame_i32(ctx.frame_offset(LEFT), left);
    machine.set_frame_i32(ctx.frame_offset(RIGHT), right);
    machine.set_frame_i32(ctx.frame_offset(DST), 0x5a5a_5a5a);
    machine
        .run(buffer.as_slice())
        .unwrap_or_else(|fault| panic!("{op:?} {left}, {right}: {fault}"));
    machine.frame_i32(ctx.frame_offset(DST))
}

/// Same operand slot on both sides.
fn run_same(op: IntBinaryOp, value: i32) -> i32 {
    let mut ctx = context();
    let mut buffer = CodeBuffer::with_capacity(256);
    ctx.apply_template(
        &mut buffer,
        &TemplateOp::IntBinary {
            op,
            dst: DST,
            left: LEFT,
            right: LEFT,
        },
    )
    .unwrap();
    let mut machine = Machine::new();
    machine.set_frame_i32(ctx.frame_offset(LEFT), value);
    machine.run(buffer.as_slice()).unwrap();
    machine.frame_i32(ctx.frame_offset(DST))
}

#[test]
fn test_zero_divisor_yields_zero() {
    for op in [IntBinaryOp::Div, IntBinaryOp::Rem, IntBinaryOp::DivU, IntBinaryOp::RemU] {
        for left in [0, 1, -1, 17, i32::MIN, i32::MAX] {
            assert_eq!(run(op, left, 0), 0, "{op:?} {left}, 0");
        }
    }
}

#[test]
fn test_min_over_minus_one_does_not_trap() {
    assert_eq!(run(IntBinaryOp::Div, i32::MIN, -1), i32::MIN);
    assert_eq!(run(IntBinaryOp::Rem, i32::MIN, -1), 0);
}

#[test]
fn test_signed_division_truncates_toward_zero() {
    let cases = [(7, 2), (-7, 2), (7, -2), (-7, -2), (i32::MIN, 2), (i32::MAX, -1), (i32::MIN, 1), (5, 9)];
    for (left, right) in cases {
        assert_eq!(run(IntBinaryOp::Div, left, right), left / right, "{left} / {right}");
        assert_eq!(run(IntBinaryOp::Rem, left, right), left % right, "{left} % {right}");
    }
    // Only the pair matters: MIN by another negative divides normally.
    assert_eq!(run(IntBinaryOp::Div, i32::MIN, -2), i32::MIN / -2);
    assert_eq!(run(IntBinaryOp::Rem, -1, i32::MIN), -1);
}

#[test]
fn test_unsigned_division_treats_operands_as_u32() {
    let cases = [(7, 2), (-1, 2), (-7, -2), (i32::MIN, -1), (3, -1)];
    for (left, right) in cases {
        let (l, r) = (left as u32, right as u32);
        assert_eq!(run(IntBinaryOp::DivU, left, right) as u32, l / r, "{l} / {r}");
        assert_eq!(run(IntBinaryOp::RemU, left, right) as u32, l % r, "{l} % {r}");
    }
}

#[test]
fn test_division_by_itself() {
    assert_eq!(run_same(IntBinaryOp::Div, -9), 1);
    assert_eq!(run_same(IntBinaryOp::Rem, -9), 0);
    assert_eq!(run_same(IntBinaryOp::Div, 0), 0);
    assert_eq!(run_same(IntBinaryOp::DivU, i32::MIN), 1);
    assert_eq!(run_same(IntBinaryOp::RemU, 0), 0);
}

#[test]
fn test_result_stays_cached_in_a_result_register() {
    let mut ctx = context();
    let mut buffer = CodeBuffer::with_capacity(256);
    for op in [IntBinaryOp::Div, IntBinaryOp::Rem] {
        ctx.apply_template(
            &mut buffer,
            &TemplateOp::IntBinary {
                op,
                dst: DST,
                left: LEFT,
                right: RIGHT,
            },
        )
        .unwrap();
        let holders: Vec<_> = ctx
            .cache()
            .entries()
            .filter(|(_, entry)| entry.offset == ctx.frame_offset(DST))
            .collect();
        assert_eq!(holders.len(), 1, "{op:?}");
    }
}
