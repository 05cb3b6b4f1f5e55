//! End-to-end comparisons over hand-built function pairs.

use semdiff_core::{
    Collaborators, CompareSession, Config, DiagnosticKind, DivergencePoint, FunctionComparator,
    MacroTable, PatternMatch, PatternMatcher, Verdict,
};
use semdiff_ir::{
    BinaryOp, BlockId, CastOp, CmpPred, DataLayout, Function, FunctionBuilder, InstId, InstKind,
    Module, Operand, SourceLoc, StructDef, Type,
};

/// Route comparator traces through the test harness when `RUST_LOG` is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn module_with(functions: Vec<Function>) -> Module {
    let mut m = Module::new("m", DataLayout::default());
    for f in functions {
        m.add_function(f);
    }
    m
}

fn compare(mod_l: &Module, mod_r: &Module, config: Config) -> semdiff_core::ComparisonResult {
    init_tracing();
    let session = CompareSession::new(mod_l, mod_r, config);
    session.compare_function("f").expect("function pair exists")
}

#[test]
fn test_identical_functions_are_equal() {
    let build = || {
        let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Int(64));
        b.block("entry");
        let sum = b.binary(
            BinaryOp::Add,
            Type::Int(64),
            Operand::Arg(0),
            Operand::const_int(64, 1),
        );
        b.store(sum.clone(), Operand::Arg(1));
        let doubled = b.binary(BinaryOp::Mul, Type::Int(64), sum.clone(), sum);
        b.ret(Some(doubled));
        b.finish()
    };
    let mod_l = module_with(vec![build()]);
    let mod_r = module_with(vec![build()]);
    let result = compare(&mod_l, &mod_r, Config::default());

    assert_eq!(result.verdict, Verdict::Equal);
    assert!(result.diagnostics.is_empty());
    assert!(result.divergence.is_none());
    // Every instruction pair matched one-to-one.
    assert_eq!(result.coverage.matched, 3);
    assert_eq!(result.coverage.compared_left, 3);
    assert_eq!(result.coverage.compared_right, 3);
}

#[test]
fn test_add_commuted_past_non_aliasing_store() {
    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Int(64));
    b.block("entry");
    let sum = b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.store(Operand::const_int(64, 42), Operand::Arg(1));
    b.ret(Some(sum));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Int(64));
    b.block("entry");
    b.store(Operand::const_int(64, 42), Operand::Arg(1));
    let sum = b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.ret(Some(sum));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_relocation_suppressed_by_config() {
    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Int(64));
    b.block("entry");
    let sum = b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.store(Operand::const_int(64, 42), Operand::Arg(1));
    b.ret(Some(sum));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Int(64));
    b.block("entry");
    b.store(Operand::const_int(64, 42), Operand::Arg(1));
    let sum = b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.ret(Some(sum));
    let mod_r = module_with(vec![b.finish()]);

    let config = Config {
        suppress_relocations: true,
        ..Config::default()
    };
    let result = compare(&mod_l, &mod_r, config);
    assert_eq!(result.verdict, Verdict::NotEqual);
}

#[test]
fn test_gep_follows_inserted_leading_field() {
    let mut mod_l = Module::new("old", DataLayout::default());
    mod_l.add_struct(StructDef::new("s", vec![Type::Int(32), Type::Ptr]));
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Ptr);
    b.block("entry");
    let field = b.gep(
        Type::named("s"),
        Operand::Arg(0),
        vec![Operand::const_int(64, 0), Operand::const_int(32, 0)],
    );
    b.ret(Some(field));
    mod_l.add_function(b.finish());

    let mut mod_r = Module::new("new", DataLayout::default());
    mod_r.add_struct(StructDef::new(
        "s",
        vec![Type::Int(64), Type::Int(32), Type::Ptr],
    ));
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Ptr);
    b.block("entry");
    let field = b.gep(
        Type::named("s"),
        Operand::Arg(0),
        vec![Operand::const_int(64, 0), Operand::const_int(32, 1)],
    );
    b.ret(Some(field));
    mod_r.add_function(b.finish());

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_extra_trailing_zero_argument_is_tolerated() {
    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let value = b.call("helper", vec![Operand::Arg(0)], Type::Int(64));
    b.ret(Some(value));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let value = b.call(
        "helper",
        vec![Operand::Arg(0), Operand::const_int(32, 0)],
        Type::Int(64),
    );
    b.ret(Some(value));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_extra_trailing_nonzero_argument_differs() {
    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let value = b.call("helper", vec![Operand::Arg(0)], Type::Int(64));
    b.ret(Some(value));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let value = b.call(
        "helper",
        vec![Operand::Arg(0), Operand::const_int(32, 7)],
        Type::Int(64),
    );
    b.ret(Some(value));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::NotEqual);
}

#[test]
fn test_conflicting_reorder_is_rejected_with_location() {
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Int(64));
    b.block("entry");
    b.at("f.c", 10);
    let loaded = b.load(Type::Int(64), Operand::Arg(0));
    b.at("f.c", 11);
    b.store(Operand::const_int(64, 7), Operand::Arg(0));
    b.ret(Some(loaded));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Int(64));
    b.block("entry");
    b.at("f.c", 11);
    b.store(Operand::const_int(64, 7), Operand::Arg(0));
    b.at("f.c", 10);
    let loaded = b.load(Type::Int(64), Operand::Arg(0));
    b.ret(Some(loaded));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::NotEqual);
    let divergence = result.divergence.expect("divergence located");
    match divergence.point {
        DivergencePoint::Insts { left, right } => {
            assert!(left.is_some());
            assert!(right.is_some());
        }
        other => panic!("expected instruction divergence, got {other:?}"),
    }
    assert!(divergence.left_loc.is_some());
    assert!(divergence.right_loc.is_some());
}

#[test]
fn test_store_matched_over_pending_relocated_load_is_rejected() {
    // Left: add; store 7; load. Right: load; add; store 7. Storing the
    // right-hand load as a relocated span and then matching the stores in
    // lockstep would order the store before the load on the right only.
    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Int(64));
    b.block("entry");
    b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.store(Operand::const_int(64, 7), Operand::Arg(1));
    let loaded = b.load(Type::Int(64), Operand::Arg(1));
    b.ret(Some(loaded));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Int(64));
    b.block("entry");
    let loaded = b.load(Type::Int(64), Operand::Arg(1));
    b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.store(Operand::const_int(64, 7), Operand::Arg(1));
    b.ret(Some(loaded));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::NotEqual);
    assert!(matches!(
        result.divergence.expect("divergence located").point,
        DivergencePoint::Insts { .. }
    ));
}

#[test]
fn test_divergence_is_deterministic() {
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Int(64));
    b.block("entry");
    let loaded = b.load(Type::Int(64), Operand::Arg(0));
    b.store(Operand::const_int(64, 7), Operand::Arg(0));
    b.ret(Some(loaded));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Int(64));
    b.block("entry");
    b.store(Operand::const_int(64, 7), Operand::Arg(0));
    let loaded = b.load(Type::Int(64), Operand::Arg(0));
    b.ret(Some(loaded));
    let mod_r = module_with(vec![b.finish()]);

    let first = compare(&mod_l, &mod_r, Config::default());
    let second = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(first.verdict, second.verdict);
    assert_eq!(first.divergence, second.divergence);
}

#[test]
fn test_bitcast_is_elided() {
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Void);
    b.block("entry");
    let cast = b.cast(CastOp::Bitcast, Operand::Arg(0), Type::Ptr);
    b.store(Operand::const_int(64, 1), cast);
    b.ret(None);
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Void);
    b.block("entry");
    b.store(Operand::const_int(64, 1), Operand::Arg(0));
    b.ret(None);
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_width_cast_elided_only_in_control_flow_mode() {
    let build_wide = || {
        let mut b = FunctionBuilder::new("f", vec![Type::Int(32), Type::Ptr], Type::Void);
        b.block("entry");
        let widened = b.cast(CastOp::ZExt, Operand::Arg(0), Type::Int(64));
        b.store(widened, Operand::Arg(1));
        b.ret(None);
        b.finish()
    };
    let build_narrow = || {
        let mut b = FunctionBuilder::new("f", vec![Type::Int(32), Type::Ptr], Type::Void);
        b.block("entry");
        b.store(Operand::Arg(0), Operand::Arg(1));
        b.ret(None);
        b.finish()
    };
    let mod_l = module_with(vec![build_wide()]);
    let mod_r = module_with(vec![build_narrow()]);

    let strict = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(strict.verdict, Verdict::NotEqual);

    let relaxed = compare(
        &mod_l,
        &mod_r,
        Config {
            control_flow_only: true,
            ..Config::default()
        },
    );
    assert_eq!(relaxed.verdict, Verdict::Equal);
}

#[test]
fn test_alloc_size_normalized_by_struct_growth() {
    let mut mod_l = Module::new("old", DataLayout::default());
    mod_l.add_struct(StructDef::new("s", vec![Type::Int(64), Type::Int(64)]));
    let mut b = FunctionBuilder::new("f", vec![], Type::Ptr);
    b.block("entry");
    let p = b.call("kmalloc", vec![Operand::const_int(64, 16)], Type::Ptr);
    b.ret(Some(p));
    mod_l.add_function(b.finish());

    let mut mod_r = Module::new("new", DataLayout::default());
    mod_r.add_struct(StructDef::new(
        "s",
        vec![Type::Int(64), Type::Int(64), Type::Int(64)],
    ));
    let mut b = FunctionBuilder::new("f", vec![], Type::Ptr);
    b.block("entry");
    let p = b.call("kmalloc", vec![Operand::const_int(64, 24)], Type::Ptr);
    b.ret(Some(p));
    mod_r.add_function(b.finish());

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_memset_length_follows_struct_size() {
    let mut mod_l = Module::new("old", DataLayout::default());
    mod_l.add_struct(StructDef::new("s", vec![Type::Int(64), Type::Int(64)]));
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Void);
    b.block("entry");
    b.call(
        "memset",
        vec![
            Operand::Arg(0),
            Operand::const_int(32, 0),
            Operand::const_int(64, 16),
        ],
        Type::Void,
    );
    b.ret(None);
    mod_l.add_function(b.finish());

    let mut mod_r = Module::new("new", DataLayout::default());
    mod_r.add_struct(StructDef::new(
        "s",
        vec![Type::Int(64), Type::Int(64), Type::Int(64)],
    ));
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Void);
    b.block("entry");
    b.call(
        "memset",
        vec![
            Operand::Arg(0),
            Operand::const_int(32, 0),
            Operand::const_int(64, 24),
        ],
        Type::Void,
    );
    b.ret(None);
    mod_r.add_function(b.finish());

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_inverse_condition_with_swapped_branches() {
    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Int(64)], Type::Int(64));
    let entry = b.block("entry");
    let less = b.block("less");
    let other = b.block("other");
    b.switch_to(entry);
    let cond = b.cmp(CmpPred::Slt, Operand::Arg(0), Operand::Arg(1));
    b.cond_br(cond, less, other);
    b.switch_to(less);
    b.ret(Some(Operand::const_int(64, 1)));
    b.switch_to(other);
    b.ret(Some(Operand::const_int(64, 2)));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Int(64)], Type::Int(64));
    let entry = b.block("entry");
    let geq = b.block("geq");
    let other = b.block("other");
    b.switch_to(entry);
    let cond = b.cmp(CmpPred::Sge, Operand::Arg(0), Operand::Arg(1));
    b.cond_br(cond, geq, other);
    b.switch_to(geq);
    b.ret(Some(Operand::const_int(64, 2)));
    b.switch_to(other);
    b.ret(Some(Operand::const_int(64, 1)));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_single_block_callee_inlined_speculatively() {
    let mut helper = FunctionBuilder::new("helper", vec![Type::Int(64)], Type::Int(64));
    helper.block("entry");
    let sum = helper.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    helper.ret(Some(sum));

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let value = b.call("helper", vec![Operand::Arg(0)], Type::Int(64));
    b.ret(Some(value));
    let mod_l = module_with(vec![b.finish(), helper.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let sum = b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.ret(Some(sum));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_failed_inline_reports_original_divergence() {
    let mut helper = FunctionBuilder::new("helper", vec![Type::Int(64)], Type::Int(64));
    helper.block("entry");
    let sum = helper.binary(
        BinaryOp::Mul,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 3),
    );
    helper.ret(Some(sum));

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let value = b.call("helper", vec![Operand::Arg(0)], Type::Int(64));
    b.ret(Some(value));
    let mod_l = module_with(vec![b.finish(), helper.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let sum = b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.ret(Some(sum));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::NotEqual);
    assert!(matches!(
        result.divergence.expect("divergence located").point,
        DivergencePoint::Insts { .. }
    ));
}

#[test]
fn test_reassociated_addition_chain() {
    // (a + b) + c on the left, (c + a) + b on the right.
    let mut b = FunctionBuilder::new(
        "f",
        vec![Type::Int(64), Type::Int(64), Type::Int(64)],
        Type::Int(64),
    );
    b.block("entry");
    let ab = b.binary(BinaryOp::Add, Type::Int(64), Operand::Arg(0), Operand::Arg(1));
    let abc = b.binary(BinaryOp::Add, Type::Int(64), ab, Operand::Arg(2));
    b.ret(Some(abc));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new(
        "f",
        vec![Type::Int(64), Type::Int(64), Type::Int(64)],
        Type::Int(64),
    );
    b.block("entry");
    let ca = b.binary(BinaryOp::Add, Type::Int(64), Operand::Arg(2), Operand::Arg(0));
    let cab = b.binary(BinaryOp::Add, Type::Int(64), ca, Operand::Arg(1));
    b.ret(Some(cab));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_phi_over_diamond_with_reordered_incoming() {
    let build = |swap_incoming: bool| {
        let mut b = FunctionBuilder::new("f", vec![Type::Int(1)], Type::Int(64));
        let entry = b.block("entry");
        let then_bb = b.block("then");
        let else_bb = b.block("else");
        let join = b.block("join");
        b.switch_to(entry);
        b.cond_br(Operand::Arg(0), then_bb, else_bb);
        b.switch_to(then_bb);
        b.br(join);
        b.switch_to(else_bb);
        b.br(join);
        b.switch_to(join);
        let mut incoming = vec![
            (Operand::const_int(64, 1), then_bb),
            (Operand::const_int(64, 2), else_bb),
        ];
        if swap_incoming {
            incoming.reverse();
        }
        let merged = b.phi(Type::Int(64), incoming);
        b.ret(Some(merged));
        b.finish()
    };
    let mod_l = module_with(vec![build(false)]);
    let mod_r = module_with(vec![build(true)]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_trailing_pure_instruction_is_ignored() {
    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Void);
    b.block("entry");
    b.store(Operand::Arg(0), Operand::Arg(1));
    b.binary(
        BinaryOp::Add,
        Type::Int(64),
        Operand::Arg(0),
        Operand::const_int(64, 1),
    );
    b.ret(None);
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64), Type::Ptr], Type::Void);
    b.block("entry");
    b.store(Operand::Arg(0), Operand::Arg(1));
    b.ret(None);
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_asm_register_rename_yields_diagnostic_not_difference() {
    let mut b = FunctionBuilder::new("f", vec![], Type::Void);
    b.block("entry");
    b.asm_call("mov %rax, %rbx", "=r,r", vec![], Type::Void);
    b.ret(None);
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![], Type::Void);
    b.block("entry");
    b.asm_call("mov  %r8, %r9", "=r,r", vec![], Type::Void);
    b.ret(None);
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::AsmDiff);
}

#[test]
fn test_asm_mnemonic_change_is_a_real_difference() {
    let mut b = FunctionBuilder::new("f", vec![], Type::Void);
    b.block("entry");
    b.asm_call("add %rax, %rbx", "=r,r", vec![], Type::Void);
    b.ret(None);
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![], Type::Void);
    b.block("entry");
    b.asm_call("sub %rax, %rbx", "=r,r", vec![], Type::Void);
    b.ret(None);
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::NotEqual);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::AsmDiff));
}

#[test]
fn test_instruction_metadata_is_ignored() {
    let build = || {
        let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
        b.block("entry");
        let sum = b.binary(
            BinaryOp::Add,
            Type::Int(64),
            Operand::Arg(0),
            Operand::const_int(64, 1),
        );
        b.ret(Some(sum));
        b.finish()
    };
    let mut left = build();
    left.insts[0]
        .metadata
        .push(("prof".to_string(), "hot".to_string()));
    let mod_l = module_with(vec![left]);
    let mod_r = module_with(vec![build()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_macro_expansion_versus_function_call_is_diagnosed() {
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Void);
    b.block("entry");
    b.at("init.c", 42);
    b.call("do_init", vec![Operand::Arg(0)], Type::Void);
    b.ret(None);
    let mod_l = module_with(vec![b.finish()]);

    // The same line, expanded inline from the do_init macro.
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Void);
    b.block("entry");
    b.at("init.c", 42);
    b.store(Operand::const_int(64, 0), Operand::Arg(0));
    b.ret(None);
    let mod_r = module_with(vec![b.finish()]);

    let mut macros = MacroTable::new();
    macros.insert(SourceLoc::new("init.c", 42), "do_init");
    let collab = Collaborators {
        debug_info: &macros,
        ..Collaborators::default()
    };
    let session = CompareSession::new(&mod_l, &mod_r, Config::default());
    let result = session
        .compare_function_with("f", collab)
        .expect("function pair exists");

    assert_eq!(result.verdict, Verdict::NotEqual);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::MacroDiff));
}

#[test]
fn test_changed_struct_definition_yields_type_diagnostic() {
    let mut mod_l = Module::new("old", DataLayout::default());
    mod_l.add_struct(StructDef::new("s", vec![Type::Int(32), Type::Ptr]));
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Ptr);
    b.block("entry");
    let field = b.gep(
        Type::named("s"),
        Operand::Arg(0),
        vec![Operand::const_int(64, 0), Operand::const_int(32, 1)],
    );
    b.ret(Some(field));
    mod_l.add_function(b.finish());

    // Same index into the same-named struct, but the definition changed and
    // index 1 now names a different field.
    let mut mod_r = Module::new("new", DataLayout::default());
    mod_r.add_struct(StructDef::new(
        "s",
        vec![Type::Int(32), Type::Int(32), Type::Ptr],
    ));
    let mut b = FunctionBuilder::new("f", vec![Type::Ptr], Type::Ptr);
    b.block("entry");
    let field = b.gep(
        Type::named("s"),
        Operand::Arg(0),
        vec![Operand::const_int(64, 0), Operand::const_int(32, 1)],
    );
    b.ret(Some(field));
    mod_r.add_function(b.finish());

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::NotEqual);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::TypeDiff));
}

#[test]
fn test_allocator_rename_is_a_real_difference() {
    let mut b = FunctionBuilder::new("f", vec![], Type::Ptr);
    b.block("entry");
    let p = b.call("kmalloc", vec![Operand::const_int(64, 16)], Type::Ptr);
    b.ret(Some(p));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![], Type::Ptr);
    b.block("entry");
    let p = b.call("kzalloc", vec![Operand::const_int(64, 16)], Type::Ptr);
    b.ret(Some(p));
    let mod_r = module_with(vec![b.finish()]);

    let result = compare(&mod_l, &mod_r, Config::default());
    assert_eq!(result.verdict, Verdict::NotEqual);
}

/// Recognizes `x - x` on the left against `x ^ x` on the right.
struct ZeroIdioms;

impl PatternMatcher for ZeroIdioms {
    fn try_match(
        &self,
        left: &Function,
        left_block: BlockId,
        left_pos: usize,
        right: &Function,
        right_block: BlockId,
        right_pos: usize,
    ) -> Option<PatternMatch> {
        let lid = *left.block(left_block).insts.get(left_pos)?;
        let rid = *right.block(right_block).insts.get(right_pos)?;
        let zeroing = |f: &Function, id: InstId, wanted: BinaryOp| {
            matches!(
                &f.inst(id).kind,
                InstKind::Binary { op, lhs, rhs } if *op == wanted && lhs == rhs
            )
        };
        if zeroing(left, lid, BinaryOp::Sub) && zeroing(right, rid, BinaryOp::Xor) {
            return Some(PatternMatch {
                left_span: 1,
                right_span: 1,
                value_pairs: vec![(lid, rid)],
            });
        }
        None
    }
}

#[test]
fn test_registered_pattern_absorbs_zeroing_idiom() {
    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let zero = b.binary(BinaryOp::Sub, Type::Int(64), Operand::Arg(0), Operand::Arg(0));
    b.ret(Some(zero));
    let mod_l = module_with(vec![b.finish()]);

    let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
    b.block("entry");
    let zero = b.binary(BinaryOp::Xor, Type::Int(64), Operand::Arg(0), Operand::Arg(0));
    b.ret(Some(zero));
    let mod_r = module_with(vec![b.finish()]);

    let patterns = ZeroIdioms;
    let collab = Collaborators {
        patterns: &patterns,
        ..Collaborators::default()
    };
    let session = CompareSession::new(&mod_l, &mod_r, Config::default());
    let result = session
        .compare_function_with("f", collab)
        .expect("function pair exists");
    assert_eq!(result.verdict, Verdict::Equal);
}

#[test]
fn test_session_compares_all_shared_functions() {
    let same = || {
        let mut b = FunctionBuilder::new("stable", vec![Type::Int(64)], Type::Int(64));
        b.block("entry");
        let sum = b.binary(
            BinaryOp::Add,
            Type::Int(64),
            Operand::Arg(0),
            Operand::const_int(64, 1),
        );
        b.ret(Some(sum));
        b.finish()
    };
    let changed = |constant: i128| {
        let mut b = FunctionBuilder::new("changed", vec![Type::Int(64)], Type::Int(64));
        b.block("entry");
        let sum = b.binary(
            BinaryOp::Mul,
            Type::Int(64),
            Operand::Arg(0),
            Operand::const_int(64, constant),
        );
        b.ret(Some(sum));
        b.finish()
    };
    let mod_l = module_with(vec![same(), changed(2)]);
    let mod_r = module_with(vec![same(), changed(3)]);

    let session = CompareSession::new(&mod_l, &mod_r, Config::default());
    let results = session.compare_all();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "changed");
    assert_eq!(results[0].1.verdict, Verdict::NotEqual);
    assert_eq!(results[1].0, "stable");
    assert_eq!(results[1].1.verdict, Verdict::Equal);
}

#[test]
fn test_direct_comparator_on_missing_function_errors() {
    let mod_l = module_with(vec![]);
    let mod_r = module_with(vec![]);
    let session = CompareSession::new(&mod_l, &mod_r, Config::default());
    assert!(session.compare_function("f").is_err());
}

#[test]
fn test_comparator_can_run_without_a_session() {
    let build = || {
        let mut b = FunctionBuilder::new("f", vec![Type::Int(64)], Type::Int(64));
        b.block("entry");
        b.ret(Some(Operand::Arg(0)));
        b.finish()
    };
    let mod_l = module_with(vec![build()]);
    let mod_r = module_with(vec![build()]);
    let (lid, _) = mod_l.function_by_name("f").unwrap();
    let (rid, _) = mod_r.function_by_name("f").unwrap();
    let config = Config::default();
    let result =
        FunctionComparator::new(&mod_l, &mod_r, lid, rid, &config, Default::default()).compare();
    assert_eq!(result.verdict, Verdict::Equal);
}
