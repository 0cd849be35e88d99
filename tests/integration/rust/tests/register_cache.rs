//! Register Cache Integration Tests
//!
//! After every template, each register the cache claims mirrors a frame
//! slot really holds that slot's bytes, and the frame, the module slots and
//! the heap hold what the operation sequence computes. Sequences mix int,
//! float, double and vector values over overlapping slots, and include
//! calls that clobber every volatile register.

use core_types::Addr;
use integration_tests::x86::Machine;
use proptest::prelude::*;
use proptest::sample::select;
use strum::IntoEnumIterator;
use template_jit::templates::{
    ArrayView, FloatBinaryOp, FloatKind, IntBinaryOp, IntCompare, IntUnaryOp, SimdBinaryOp, SimdType,
};
use template_jit::{
    CodeBuffer, FunctionInfo, Reg, RuntimeAddrs, TemplateConfig, TemplateContext, TemplateOp, ValueKind,
    ARRAY_BUFFER_REG, MODULE_ENV_REG,
};

const FRAME_SIZE: u32 = 128;
/// Frame slot holding the callee's function object.
const FUNC_SLOT: i32 = 0;
/// First frame offset the generated operations touch.
const DATA: i32 = 16;
/// Int-sized cells from [`DATA`] on.
const CELLS: i32 = 16;
const DATA_BYTES: usize = CELLS as usize * 4;

const ENV: u32 = 0x0004_0000;
/// Module slots below this byte hold the memory table.
const ENV_DATA: usize = 32;
const ENV_BYTES: usize = 64;
const HEAP: u32 = 0x0005_0000;
const HEAP_LEN: usize = 64;
const BUFFER_OBJECT: u32 = 0x0005_8000;
const FUNCTION_OBJECT: u32 = 0x0006_0000;
const FUNCTION_TYPE: u32 = 0x0006_0100;
const ENTRY_POINT: u32 = 0x0006_0200;
const CALLEE: u32 = 0x0007_0000;
const NAN_DOUBLE: u32 = 0x0003_0000;
const NEG_DOUBLE_MASK: u32 = 0x0003_0010;
const NEG_FLOAT_MASK: u32 = 0x0003_0020;
const ARG_BYTES: u32 = 8;
const ESP_AT_ENTRY: u32 = Machine::FRAME_BASE - 0x1000;

fn cell(index: i32) -> i32 {
    DATA + index * 4
}

fn context() -> TemplateContext {
    let runtime = RuntimeAddrs {
        nan_double: Addr(NAN_DOUBLE as usize),
        neg_double_mask: Addr(NEG_DOUBLE_MASK as usize),
        neg_float_mask: Addr(NEG_FLOAT_MASK as usize),
        ..RuntimeAddrs::default()
    };
    let function = FunctionInfo {
        frame_size: FRAME_SIZE,
        arg_bytes: 0,
        fixed_heap: false,
    };
    TemplateContext::new(TemplateConfig::default(), runtime, function)
}

/// Returns `first - second` and scribbles over the other volatile registers.
fn callee(machine: &mut Machine) -> u32 {
    // [esp] return address, [esp + 4] function object, then the arguments
    let (first, second) = (machine.stack_u32(2), machine.stack_u32(3));
    machine.set_reg(Reg::Eax, first.wrapping_sub(second));
    machine.set_reg(Reg::Ecx, 0xdead_beef);
    machine.set_reg(Reg::Edx, 0xdead_beef);
    for reg in Reg::iter().filter(|reg| reg.is_xmm()) {
        machine.set_xmm(reg, u128::MAX / 3);
    }
    4 + ARG_BYTES
}

fn canonical_f32(value: f32) -> f32 {
    if value.is_nan() {
        f32::NAN
    } else {
        value
    }
}

fn canonical_f64(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else {
        value
    }
}

fn unary(op: IntUnaryOp, x: i32) -> i32 {
    match op {
        IntUnaryOp::Neg => x.wrapping_neg(),
        IntUnaryOp::Not => !x,
        IntUnaryOp::LogNot => i32::from(x == 0),
        IntUnaryOp::ToBool => i32::from(x != 0),
        IntUnaryOp::Abs => x.wrapping_abs(),
        IntUnaryOp::Clz32 => x.leading_zeros() as i32,
    }
}

fn binary(op: IntBinaryOp, l: i32, r: i32) -> i32 {
    let (ul, ur) = (l as u32, r as u32);
    match op {
        IntBinaryOp::Add => l.wrapping_add(r),
        IntBinaryOp::Sub => l.wrapping_sub(r),
        IntBinaryOp::Mul => l.wrapping_mul(r),
        IntBinaryOp::And => l & r,
        IntBinaryOp::Or => l | r,
        IntBinaryOp::Xor => l ^ r,
        IntBinaryOp::Shl => l.wrapping_shl(ur),
        IntBinaryOp::Shr => l.wrapping_shr(ur),
        IntBinaryOp::ShrU => ul.wrapping_shr(ur) as i32,
        IntBinaryOp::Div if r == 0 => 0,
        IntBinaryOp::Div => l.wrapping_div(r),
        IntBinaryOp::Rem if r == 0 => 0,
        IntBinaryOp::Rem => l.wrapping_rem(r),
        IntBinaryOp::DivU => ul.checked_div(ur).unwrap_or(0) as i32,
        IntBinaryOp::RemU => ul.checked_rem(ur).unwrap_or(0) as i32,
        IntBinaryOp::Min => l.min(r),
        IntBinaryOp::Max => l.max(r),
    }
}

fn compare(cmp: IntCompare, l: i32, r: i32) -> i32 {
    let (ul, ur) = (l as u32, r as u32);
    i32::from(match cmp {
        IntCompare::Lt => l < r,
        IntCompare::Le => l <= r,
        IntCompare::Gt => l > r,
        IntCompare::Ge => l >= r,
        IntCompare::Eq => l == r,
        IntCompare::Ne => l != r,
        IntCompare::LtU => ul < ur,
        IntCompare::LeU => ul <= ur,
        IntCompare::GtU => ul > ur,
        IntCompare::GeU => ul >= ur,
    })
}

fn float_binary(op: FloatBinaryOp, l: f32, r: f32) -> f32 {
    canonical_f32(match op {
        FloatBinaryOp::Add => l + r,
        FloatBinaryOp::Sub => l - r,
        FloatBinaryOp::Mul => l * r,
        _ => l / r,
    })
}

fn double_binary(op: FloatBinaryOp, l: f64, r: f64) -> f64 {
    canonical_f64(match op {
        FloatBinaryOp::Add => l + r,
        FloatBinaryOp::Sub => l - r,
        FloatBinaryOp::Mul => l * r,
        _ => l / r,
    })
}

fn vector_binary(op: SimdBinaryOp, l: u32, r: u32) -> u32 {
    let mask = |holds: bool| if holds { u32::MAX } else { 0 };
    match op {
        SimdBinaryOp::Add => l.wrapping_add(r),
        SimdBinaryOp::Sub => l.wrapping_sub(r),
        SimdBinaryOp::Mul => l.wrapping_mul(r),
        SimdBinaryOp::And => l & r,
        SimdBinaryOp::Or => l | r,
        SimdBinaryOp::Xor => l ^ r,
        SimdBinaryOp::Eq => mask(l == r),
        SimdBinaryOp::Gt => mask(l as i32 > r as i32),
        SimdBinaryOp::Lt => mask((l as i32) < r as i32),
        _ => unreachable!("{op} is not an Int32x4 operation"),
    }
}

/// Heap byte an access of `view` at `index` reaches, if it is in bounds.
fn element(view: ArrayView, index: i32) -> Option<usize> {
    let index = view.index_mask().map_or(index, |mask| index & mask) as u32 as usize;
    (index < HEAP_LEN).then_some(index)
}

/// What the frame cells, the module slots and the heap should hold.
#[derive(Debug, Clone)]
struct Shadow {
    frame: [u8; DATA_BYTES],
    env: [u8; ENV_BYTES - ENV_DATA],
    heap: [u8; HEAP_LEN],
    args: Vec<u32>,
    in_call: bool,
}

impl Shadow {
    fn new(cells: &[i32], env: &[i32], heap: &[u32]) -> Self {
        let mut shadow = Shadow {
            frame: [0; DATA_BYTES],
            env: [0; ENV_BYTES - ENV_DATA],
            heap: [0; HEAP_LEN],
            args: Vec::new(),
            in_call: false,
        };
        for (chunk, value) in shadow.frame.chunks_mut(4).zip(cells) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        for (chunk, value) in shadow.env.chunks_mut(4).zip(env) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        for (chunk, value) in shadow.heap.chunks_mut(4).zip(heap) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        shadow
    }

    fn bytes(&self, offset: i32, width: i32) -> Vec<u8> {
        let at = (offset - DATA) as usize;
        self.frame[at..at + width as usize].to_vec()
    }

    fn set(&mut self, offset: i32, bytes: &[u8]) {
        let at = (offset - DATA) as usize;
        self.frame[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn int(&self, offset: i32) -> i32 {
        let bytes = self.bytes(offset, 4);
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn set_int(&mut self, offset: i32, value: i32) {
        self.set(offset, &value.to_le_bytes());
    }

    fn double_bits(&self, offset: i32) -> u64 {
        let bytes = self.bytes(offset, 8);
        bytes.iter().rev().fold(0, |value, byte| (value << 8) | u64::from(*byte))
    }

    fn lanes(&self, offset: i32) -> [u32; 4] {
        [0, 1, 2, 3].map(|lane| self.int(offset + lane * 4) as u32)
    }

    fn module_range(kind: ValueKind, slot: u32) -> std::ops::Range<usize> {
        let width = kind.width() as usize;
        let at = slot as usize * width - ENV_DATA;
        at..at + width
    }

    /// What `op` leaves behind.
    fn evaluate(&mut self, op: &TemplateOp) {
        match *op {
            TemplateOp::LdConst { dst, value } => self.set_int(dst, value),
            TemplateOp::Ld { kind, dst, src } => {
                let bytes = self.bytes(src, kind.width());
                self.set(dst, &bytes);
            }
            TemplateOp::IntUnary { op, dst, src } => self.set_int(dst, unary(op, self.int(src))),
            TemplateOp::IntBinary { op, dst, left, right } => {
                self.set_int(dst, binary(op, self.int(left), self.int(right)));
            }
            TemplateOp::IntCompare { cmp, dst, left, right } => {
                self.set_int(dst, compare(cmp, self.int(left), self.int(right)));
            }
            TemplateOp::FloatNeg { kind: FloatKind::Float, dst, src } => {
                self.set_int(dst, self.int(src) ^ i32::MIN);
            }
            TemplateOp::FloatNeg { kind: FloatKind::Double, dst, src } => {
                self.set(dst, &(self.double_bits(src) ^ (1 << 63)).to_le_bytes());
            }
            TemplateOp::FloatBinary { kind: FloatKind::Float, op, dst, left, right } => {
                let (l, r) = (f32::from_bits(self.int(left) as u32), f32::from_bits(self.int(right) as u32));
                self.set(dst, &float_binary(op, l, r).to_bits().to_le_bytes());
            }
            TemplateOp::FloatBinary { kind: FloatKind::Double, op, dst, left, right } => {
                let (l, r) = (f64::from_bits(self.double_bits(left)), f64::from_bits(self.double_bits(right)));
                self.set(dst, &double_binary(op, l, r).to_bits().to_le_bytes());
            }
            TemplateOp::LdSlot { kind, dst, slot } => {
                let bytes = self.env[Self::module_range(kind, slot)].to_vec();
                self.set(dst, &bytes);
            }
            TemplateOp::StSlot { kind, src, slot } => {
                let bytes = self.bytes(src, kind.width());
                self.env[Self::module_range(kind, slot)].copy_from_slice(&bytes);
            }
            TemplateOp::LdArr { view, dst, index } => {
                let Some(at) = element(view, self.int(index)) else {
                    match view.value_kind() {
                        ValueKind::Int => self.set_int(dst, 0),
                        ValueKind::Float => self.set(dst, &f32::NAN.to_bits().to_le_bytes()),
                        _ => self.set(dst, &f64::NAN.to_bits().to_le_bytes()),
                    }
                    return;
                };
                let raw = &self.heap[at..at + view.element_size() as usize];
                let bytes = match view {
                    ArrayView::Int8 => (raw[0] as i8 as i32).to_le_bytes().to_vec(),
                    ArrayView::Uint8 => i32::from(raw[0]).to_le_bytes().to_vec(),
                    ArrayView::Int16 => i32::from(i16::from_le_bytes([raw[0], raw[1]])).to_le_bytes().to_vec(),
                    ArrayView::Uint16 => i32::from(u16::from_le_bytes([raw[0], raw[1]])).to_le_bytes().to_vec(),
                    _ => raw.to_vec(),
                };
                self.set(dst, &bytes);
            }
            TemplateOp::StArr { view, src, index } => {
                if let Some(at) = element(view, self.int(index)) {
                    let size = view.element_size();
                    let bytes = self.bytes(src, size);
                    self.heap[at..at + size as usize].copy_from_slice(&bytes);
                }
            }
            TemplateOp::StartCall { .. } => {
                self.args.clear();
                self.in_call = true;
            }
            TemplateOp::ArgOut { src, .. } => self.args.push(self.int(src) as u32),
            TemplateOp::Call { result, .. } => {
                if let Some((_, dst)) = result {
                    self.set_int(dst, self.args[0].wrapping_sub(self.args[1]) as i32);
                }
                self.in_call = false;
            }
            TemplateOp::SimdBinary { op, dst, left, right, .. } => {
                let (l, r) = (self.lanes(left), self.lanes(right));
                for lane in 0..4 {
                    let value = vector_binary(op, l[lane], r[lane]);
                    self.set_int(dst + lane as i32 * 4, value as i32);
                }
            }
            TemplateOp::SimdExtractLane { dst, src, lane, .. } => {
                let value = self.lanes(src)[usize::from(lane)];
                self.set_int(dst, value as i32);
            }
            _ => unreachable!("not generated: {op:?}"),
        }
    }
}

/// A machine whose frame, module slots and heap match `shadow`, with the
/// runtime objects the templates dereference in place.
fn boot(ctx: &TemplateContext, shadow: &Shadow) -> Machine {
    let config = TemplateConfig::default();
    let objects = &config.objects;
    let mut machine = Machine::new();
    machine.set_reg(MODULE_ENV_REG, ENV);
    machine.set_reg(ARRAY_BUFFER_REG, HEAP);
    machine.set_frame_bytes(ctx.frame_offset(DATA), &shadow.frame);
    machine.set_frame_i32(ctx.frame_offset(FUNC_SLOT), FUNCTION_OBJECT as i32);
    machine.set_frame_i32(ctx.frame_offset(config.frame.array_size_offset), HEAP_LEN as i32);

    // module memory -> array buffer -> backing store
    machine.write_u32(ENV + objects.memory_table_offset as u32, BUFFER_OBJECT);
    machine.write_u32(BUFFER_OBJECT + objects.byte_length_offset as u32, HEAP_LEN as u32);
    machine.write_u32(BUFFER_OBJECT + objects.buffer_offset as u32, HEAP);
    machine.write_bytes(ENV + ENV_DATA as u32, &shadow.env);
    machine.write_bytes(HEAP, &shadow.heap);

    // function object -> type -> entry point info -> code
    machine.write_u32(FUNCTION_OBJECT + objects.type_offset as u32, FUNCTION_TYPE);
    machine.write_u32(FUNCTION_TYPE + objects.entry_point_info_offset as u32, ENTRY_POINT);
    machine.write_u32(ENTRY_POINT + objects.address_offset as u32, CALLEE);
    machine.install(CALLEE, callee);

    machine.write_bytes(NAN_DOUBLE, &f64::NAN.to_bits().to_le_bytes());
    let sign64 = (1u64 << 63).to_le_bytes();
    machine.write_bytes(NEG_DOUBLE_MASK, &[sign64, sign64].concat());
    machine.write_bytes(NEG_FLOAT_MASK, &[0u8, 0, 0, 0x80].repeat(4));
    machine
}

/// Emit and execute `ops` one template at a time, checking the cache and
/// memory after each; returns the context for further inspection.
fn check_sequence(mut shadow: Shadow, ops: &[TemplateOp]) -> Result<TemplateContext, TestCaseError> {
    let mut ctx = context();
    let mut buffer = CodeBuffer::with_capacity(64 * 1024);
    let mut machine = boot(&ctx, &shadow);
    let size_slot = ctx.frame_offset(TemplateConfig::default().frame.array_size_offset);

    for (step, op) in ops.iter().enumerate() {
        let start = buffer.len();
        ctx.apply_template(&mut buffer, op)
            .map_err(|err| TestCaseError::fail(format!("step {step} {op:?}: {err}")))?;
        machine
            .run(&buffer.as_slice()[start..])
            .map_err(|fault| TestCaseError::fail(format!("step {step} {op:?}: {fault}")))?;
        shadow.evaluate(op);
        let at = format!("step {step} {op:?}");

        for (reg, entry) in ctx.cache().entries() {
            let width = entry.kind.width() as usize;
            prop_assert_eq!(reg.is_xmm(), entry.kind != ValueKind::Int, "{}: {:?} caches {:?}", at, reg, entry.kind);
            let held = if reg.is_xmm() {
                machine.xmm(reg).to_le_bytes()[..width].to_vec()
            } else {
                machine.reg(reg).to_le_bytes().to_vec()
            };
            prop_assert_eq!(
                held,
                machine.frame_bytes(entry.offset, width),
                "{}: {:?} claims the {:?} at frame offset {}",
                at,
                reg,
                entry.kind,
                entry.offset
            );
        }
        prop_assert_eq!(
            machine.frame_bytes(ctx.frame_offset(DATA), DATA_BYTES),
            shadow.frame.to_vec(),
            "{}: frame",
            at
        );
        prop_assert_eq!(
            machine.read_bytes(ENV + ENV_DATA as u32, shadow.env.len()),
            shadow.env.to_vec(),
            "{}: module slots",
            at
        );
        prop_assert_eq!(machine.read_bytes(HEAP, HEAP_LEN), shadow.heap.to_vec(), "{}: heap", at);
        prop_assert_eq!(machine.frame_i32(size_slot), HEAP_LEN as i32, "{}: heap length", at);
        if !shadow.in_call {
            prop_assert_eq!(machine.reg(Reg::Esp), ESP_AT_ENTRY, "{}: stack pointer", at);
        }
    }
    Ok(ctx)
}

fn int_slot() -> impl Strategy<Value = i32> {
    (0..CELLS).prop_map(cell)
}

fn slot_of(kind: ValueKind) -> BoxedStrategy<i32> {
    match kind {
        ValueKind::Int | ValueKind::Float => int_slot().boxed(),
        ValueKind::Double => (0..CELLS / 2).prop_map(|index| DATA + index * 8).boxed(),
        ValueKind::Simd => (0..CELLS / 4).prop_map(|index| DATA + index * 16).boxed(),
    }
}

fn module_slot(kind: ValueKind) -> impl Strategy<Value = u32> {
    let width = kind.width() as usize;
    (ENV_DATA / width..ENV_BYTES / width).prop_map(|slot| slot as u32)
}

fn value() -> impl Strategy<Value = i32> {
    prop_oneof![
        Just(0),
        Just(-1),
        Just(i32::MIN),
        Just(i32::MAX),
        -40..40i32,
        0..HEAP_LEN as i32,
        any::<i32>()
    ]
}

fn shadow() -> impl Strategy<Value = Shadow> {
    (
        prop::array::uniform16(value()),
        prop::array::uniform8(value()),
        prop::array::uniform16(any::<u32>()),
    )
        .prop_map(|(cells, env, heap)| Shadow::new(&cells, &env, &heap))
}

fn int_op() -> impl Strategy<Value = TemplateOp> {
    let unary: Vec<IntUnaryOp> = IntUnaryOp::iter().collect();
    let binary: Vec<IntBinaryOp> = IntBinaryOp::iter().collect();
    let compare: Vec<IntCompare> = IntCompare::iter().collect();
    prop_oneof![
        1 => (int_slot(), value()).prop_map(|(dst, value)| TemplateOp::LdConst { dst, value }),
        1 => (int_slot(), int_slot()).prop_map(|(dst, src)| TemplateOp::Ld { kind: ValueKind::Int, dst, src }),
        2 => (select(unary), int_slot(), int_slot()).prop_map(|(op, dst, src)| TemplateOp::IntUnary { op, dst, src }),
        4 => (select(binary), int_slot(), int_slot(), int_slot())
            .prop_map(|(op, dst, left, right)| TemplateOp::IntBinary { op, dst, left, right }),
        2 => (select(compare), int_slot(), int_slot(), int_slot())
            .prop_map(|(cmp, dst, left, right)| TemplateOp::IntCompare { cmp, dst, left, right }),
    ]
}

fn ld_op() -> impl Strategy<Value = TemplateOp> {
    let kinds: Vec<ValueKind> = ValueKind::iter().collect();
    select(kinds)
        .prop_flat_map(|kind| (Just(kind), slot_of(kind), slot_of(kind)))
        .prop_map(|(kind, dst, src)| TemplateOp::Ld { kind, dst, src })
}

fn float_op() -> impl Strategy<Value = TemplateOp> {
    let kinds: Vec<FloatKind> = FloatKind::iter().collect();
    let ops = vec![FloatBinaryOp::Add, FloatBinaryOp::Sub, FloatBinaryOp::Mul, FloatBinaryOp::Div];
    prop_oneof![
        1 => select(kinds.clone())
            .prop_flat_map(|kind| (Just(kind), slot_of(kind.value_kind()), slot_of(kind.value_kind())))
            .prop_map(|(kind, dst, src)| TemplateOp::FloatNeg { kind, dst, src }),
        3 => (select(kinds), select(ops))
            .prop_flat_map(|(kind, op)| {
                let slot = slot_of(kind.value_kind());
                (Just(kind), Just(op), slot.clone(), slot.clone(), slot)
            })
            .prop_map(|(kind, op, dst, left, right)| TemplateOp::FloatBinary { kind, op, dst, left, right }),
    ]
}

fn simd_op() -> impl Strategy<Value = TemplateOp> {
    let ops = vec![
        SimdBinaryOp::Add,
        SimdBinaryOp::Sub,
        SimdBinaryOp::Mul,
        SimdBinaryOp::And,
        SimdBinaryOp::Or,
        SimdBinaryOp::Xor,
        SimdBinaryOp::Eq,
        SimdBinaryOp::Gt,
        SimdBinaryOp::Lt,
    ];
    let vector = || slot_of(ValueKind::Simd);
    prop_oneof![
        3 => (select(ops), vector(), vector(), vector()).prop_map(|(op, dst, left, right)| TemplateOp::SimdBinary {
            ty: SimdType::Int32x4,
            op,
            dst,
            left,
            right,
        }),
        1 => (int_slot(), vector(), 0..4u8).prop_map(|(dst, src, lane)| TemplateOp::SimdExtractLane {
            ty: SimdType::Int32x4,
            dst,
            src,
            lane,
        }),
    ]
}

fn memory_op() -> impl Strategy<Value = TemplateOp> {
    let kinds = vec![ValueKind::Int, ValueKind::Float, ValueKind::Double];
    let views: Vec<ArrayView> = ArrayView::iter().collect();
    prop_oneof![
        select(kinds.clone())
            .prop_flat_map(|kind| (Just(kind), slot_of(kind), module_slot(kind)))
            .prop_map(|(kind, dst, slot)| TemplateOp::LdSlot { kind, dst, slot }),
        select(kinds)
            .prop_flat_map(|kind| (Just(kind), slot_of(kind), module_slot(kind)))
            .prop_map(|(kind, src, slot)| TemplateOp::StSlot { kind, src, slot }),
        select(views.clone())
            .prop_flat_map(|view| (Just(view), slot_of(view.value_kind()), int_slot()))
            .prop_map(|(view, dst, index)| TemplateOp::LdArr { view, dst, index }),
        select(views)
            .prop_flat_map(|view| (Just(view), slot_of(view.value_kind()), int_slot()))
            .prop_map(|(view, src, index)| TemplateOp::StArr { view, src, index }),
    ]
}

fn call_ops(first: i32, second: i32, dst: i32) -> Vec<TemplateOp> {
    vec![
        TemplateOp::StartCall { arg_bytes: ARG_BYTES },
        TemplateOp::ArgOut { kind: ValueKind::Int, src: first },
        TemplateOp::ArgOut { kind: ValueKind::Int, src: second },
        TemplateOp::Call {
            func: FUNC_SLOT,
            result: Some((ValueKind::Int, dst)),
        },
    ]
}

/// One template, or a whole call sequence.
fn step() -> impl Strategy<Value = Vec<TemplateOp>> {
    prop_oneof![
        4 => int_op().prop_map(|op| vec![op]),
        2 => ld_op().prop_map(|op| vec![op]),
        2 => float_op().prop_map(|op| vec![op]),
        2 => simd_op().prop_map(|op| vec![op]),
        3 => memory_op().prop_map(|op| vec![op]),
        1 => (int_slot(), int_slot(), int_slot()).prop_map(|(first, second, dst)| call_ops(first, second, dst)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_cached_registers_mirror_their_slots(
        cells in prop::array::uniform16(value()),
        ops in prop::collection::vec(int_op(), 1..24),
    ) {
        check_sequence(Shadow::new(&cells, &[], &[]), &ops)?;
    }

    #[test]
    fn test_mixed_sequences_keep_cache_and_memory_consistent(
        initial in shadow(),
        steps in prop::collection::vec(step(), 1..24),
    ) {
        let ops: Vec<TemplateOp> = steps.into_iter().flatten().collect();
        check_sequence(initial, &ops)?;
    }
}

#[test]
fn test_constant_store_drops_stale_copy() {
    let ops = [
        TemplateOp::Ld { kind: ValueKind::Int, dst: cell(1), src: cell(0) },
        TemplateOp::LdConst { dst: cell(0), value: 9 },
        TemplateOp::IntBinary { op: IntBinaryOp::Add, dst: cell(2), left: cell(0), right: cell(1) },
    ];
    check_sequence(Shadow::new(&[5], &[], &[]), &ops).unwrap();
}

#[test]
fn test_in_place_update_drops_stale_copy() {
    let ops = [
        TemplateOp::IntBinary { op: IntBinaryOp::Add, dst: cell(2), left: cell(0), right: cell(1) },
        TemplateOp::IntUnary { op: IntUnaryOp::Neg, dst: cell(2), src: cell(2) },
        TemplateOp::IntBinary { op: IntBinaryOp::Sub, dst: cell(3), left: cell(2), right: cell(0) },
        TemplateOp::IntBinary { op: IntBinaryOp::Shl, dst: cell(1), left: cell(3), right: cell(3) },
        TemplateOp::IntBinary { op: IntBinaryOp::Div, dst: cell(0), left: cell(1), right: cell(0) },
    ];
    check_sequence(Shadow::new(&[3, 4], &[], &[]), &ops).unwrap();
}

#[test]
fn test_call_drops_volatile_copies() {
    let mut ops = vec![
        TemplateOp::Ld { kind: ValueKind::Int, dst: cell(4), src: cell(0) },
        TemplateOp::Ld { kind: ValueKind::Double, dst: cell(6), src: cell(8) },
    ];
    ops.extend(call_ops(cell(0), cell(1), cell(2)));
    ops.push(TemplateOp::IntBinary { op: IntBinaryOp::Add, dst: cell(3), left: cell(4), right: cell(2) });
    ops.push(TemplateOp::FloatBinary {
        kind: FloatKind::Double,
        op: FloatBinaryOp::Add,
        dst: cell(10),
        left: cell(6),
        right: cell(6),
    });

    let shadow = Shadow::new(&[50, 8, 0, 0, 0, 0, 0, 0, 0, 0x3ff0_0000], &[], &[]);
    let ctx = check_sequence(shadow.clone(), &ops[..ops.len() - 2]).unwrap();
    let survivors = [ctx.frame_offset(cell(2)), ctx.frame_offset(TemplateConfig::default().frame.array_size_offset)];
    for (reg, entry) in ctx.cache().entries() {
        if reg.is_xmm() || matches!(reg, Reg::Eax | Reg::Ecx | Reg::Edx) {
            assert!(survivors.contains(&entry.offset), "{reg:?} still caches frame offset {}", entry.offset);
        }
    }
    check_sequence(shadow, &ops).unwrap();
}

#[test]
fn test_wide_store_drops_overlapping_int_copy() {
    let ops = [
        TemplateOp::Ld { kind: ValueKind::Int, dst: cell(1), src: cell(5) },
        TemplateOp::Ld { kind: ValueKind::Double, dst: cell(0), src: cell(2) },
        TemplateOp::IntBinary { op: IntBinaryOp::Add, dst: cell(6), left: cell(1), right: cell(1) },
        TemplateOp::Ld { kind: ValueKind::Simd, dst: cell(8), src: cell(0) },
        TemplateOp::IntBinary { op: IntBinaryOp::Sub, dst: cell(7), left: cell(9), right: cell(1) },
    ];
    check_sequence(Shadow::new(&[1, 2, 3, 4, 5, 6], &[], &[]), &ops).unwrap();
}

#[test]
fn test_narrow_store_drops_overlapping_vector_copy() {
    let ops = [
        TemplateOp::Ld { kind: ValueKind::Simd, dst: cell(4), src: cell(0) },
        TemplateOp::LdConst { dst: cell(5), value: 9 },
        TemplateOp::SimdBinary {
            ty: SimdType::Int32x4,
            op: SimdBinaryOp::Add,
            dst: cell(8),
            left: cell(4),
            right: cell(4),
        },
        TemplateOp::FloatNeg { kind: FloatKind::Float, dst: cell(9), src: cell(9) },
        TemplateOp::SimdExtractLane { ty: SimdType::Int32x4, dst: cell(0), src: cell(8), lane: 1 },
    ];
    check_sequence(Shadow::new(&[1, 2, 3, 4], &[], &[]), &ops).unwrap();
}

#[test]
fn test_float_and_int_copies_of_one_slot_stay_apart() {
    let one = 1.0f32.to_bits() as i32;
    let ops = [
        TemplateOp::Ld { kind: ValueKind::Int, dst: cell(2), src: cell(0) },
        TemplateOp::FloatNeg { kind: FloatKind::Float, dst: cell(2), src: cell(1) },
        TemplateOp::IntBinary { op: IntBinaryOp::Xor, dst: cell(3), left: cell(2), right: cell(2) },
        TemplateOp::Ld { kind: ValueKind::Float, dst: cell(4), src: cell(2) },
        TemplateOp::LdConst { dst: cell(2), value: 7 },
        TemplateOp::FloatBinary {
            kind: FloatKind::Float,
            op: FloatBinaryOp::Mul,
            dst: cell(5),
            left: cell(2),
            right: cell(4),
        },
    ];
    check_sequence(Shadow::new(&[11, one], &[], &[]), &ops).unwrap();
}

#[test]
fn test_module_and_heap_stores_land_in_memory() {
    let ops = [
        TemplateOp::LdConst { dst: cell(0), value: 12 },
        TemplateOp::StArr { view: ArrayView::Int32, src: cell(1), index: cell(0) },
        TemplateOp::LdArr { view: ArrayView::Int8, dst: cell(2), index: cell(0) },
        TemplateOp::StSlot { kind: ValueKind::Int, src: cell(2), slot: 9 },
        TemplateOp::LdSlot { kind: ValueKind::Double, dst: cell(4), slot: 4 },
        TemplateOp::StArr { view: ArrayView::Uint16, src: cell(1), index: cell(3) },
        TemplateOp::LdArr { view: ArrayView::Float64, dst: cell(6), index: cell(3) },
    ];
    // cell 3 indexes past the heap
    check_sequence(Shadow::new(&[0, -2, 0, 1000], &[5, 6], &[]), &ops).unwrap();
}
