//! End-to-end scenarios matching the CFG shapes and symbol-table effects
//! named as this translator's testable properties.

use cfront::ir::{Block, Immediate, IrOp, Var};
use cfront::symbol::{Linkage, StorageClass};
use cfront::{Parser, TranslatorConfig, translate_source};

fn parse_ok(source: &str) -> Vec<cfront::Cfg> {
    translate_source(source, TranslatorConfig::default()).unwrap()
}

fn find_op<'a>(block: &'a Block, pred: impl Fn(&IrOp) -> bool) -> Option<&'a IrOp> {
    block.ops.iter().find(|op| pred(op))
}

// S1: `int x = 3;` -> one symbol x:int, DEFINITION/EXTERN, head has x := 3.
#[test]
fn file_scope_scalar_initializer() {
    let mut parser = Parser::new("int x = 3;", TranslatorConfig::default()).unwrap();
    let units = parser.parse_translation_unit().unwrap();
    assert_eq!(units.len(), 1);

    let x = parser.ctx.scopes.ident.symbols().iter().find(|s| s.name == "x").unwrap();
    assert_eq!(x.storage, StorageClass::Definition);
    assert_eq!(x.linkage, Linkage::Extern);

    let head = units[0].block(units[0].head);
    let stored = find_op(head, |op| matches!(op, IrOp::Store { .. } | IrOp::Copy { .. }));
    assert!(stored.is_some(), "expected a store/copy of the initializer into x");
}

// S2: `int a[] = {1,2,3};` -> array-of-int size 3 (completed); three stores.
#[test]
fn file_scope_array_initializer_completes_size() {
    let mut parser = Parser::new("int a[] = {1,2,3};", TranslatorConfig::default()).unwrap();
    let units = parser.parse_translation_unit().unwrap();
    assert_eq!(units.len(), 1);

    let a = parser.ctx.scopes.ident.symbols().iter().find(|s| s.name == "a").unwrap();
    assert!(parser.ctx.types.is_array(a.ty));
    assert!(parser.ctx.types.is_complete(a.ty));
    assert_eq!(parser.ctx.types.size_of(a.ty), 12);

    let head = units[0].block(units[0].head);
    let store_count = head.ops.iter().filter(|op| matches!(op, IrOp::Store { .. })).count();
    assert_eq!(store_count, 3);
}

// S3: `int f(int x) { return x+1; }` -> param x at depth 1, body computes x+1,
// returns via eval_return, the tail block has no outgoing jumps.
#[test]
fn function_body_returns_through_terminal_block() {
    let units = parse_ok("int f(int x) { return x+1; }");
    assert_eq!(units.len(), 1);
    let cfg = &units[0];
    assert_eq!(cfg.locals.len(), 1);

    let body = cfg.block(cfg.body);
    let has_add = find_op(body, |op| matches!(op, IrOp::Binary { op: cfront::ir::IrOpKind::Add, .. })).is_some();
    assert!(has_add, "expected x+1 to lower to a Binary Add op");
    let has_return = find_op(body, |op| matches!(op, IrOp::Return { value: Some(_) })).is_some();
    assert!(has_return, "expected return x+1 to lower to a Return op with a value");
    assert!(body.is_terminal(), "a block ending in return has no outgoing jump");
}

// S4: for-loop with a break inside a conditional: init -> cond -> (body|next),
// body contains a conditional branch to next on i==5, step loops back to cond,
// break leaves an orphan block.
#[test]
fn for_loop_with_conditional_break() {
    let units = parse_ok("void g(int n) { int i; for (i = 0; i < n; i = i + 1) { if (i == 5) break; } }");
    assert_eq!(units.len(), 1);
    let cfg = &units[0];

    let conditional_blocks: Vec<&Block> = cfg.blocks().iter().filter(|b| b.is_conditional()).collect();
    assert!(conditional_blocks.len() >= 2, "expect at least the loop condition and the inner if condition");

    let back_edges = cfg
        .blocks()
        .iter()
        .enumerate()
        .filter(|(_, b)| b.jump[0].is_some() && !b.is_conditional())
        .count();
    assert!(back_edges >= 1, "expect a step block jumping back to the loop head");
}

// S5: switch with fallthrough case 2 -> default, three label blocks, a
// comparison cascade, and the final comparison falling through to next.
#[test]
fn switch_cascade_with_fallthrough_to_default() {
    let units = parse_ok("void h(int x) { switch (x) { case 1: x = 1; break; case 2: x = 2; default: x = 3; } }");
    assert_eq!(units.len(), 1);
    let cfg = &units[0];

    let eq_cascade_count = cfg
        .blocks()
        .iter()
        .filter(|b| find_op(b, |op| matches!(op, IrOp::Binary { op: cfront::ir::IrOpKind::Eq, .. })).is_some())
        .count();
    assert_eq!(eq_cascade_count, 2, "two case labels produce two x==V comparisons");
}

// S6: `struct S { int a; int b; }; struct S s = {1};` -> tag S registered,
// s.a := 1, s.b zero-filled.
#[test]
fn aggregate_initializer_zero_fills_trailing_members() {
    let mut parser = Parser::new("struct S { int a; int b; }; struct S s = {1};", TranslatorConfig::default()).unwrap();
    let units = parser.parse_translation_unit().unwrap();
    assert_eq!(units.len(), 1);

    assert!(parser.ctx.scopes.tag.symbols().iter().any(|sym| sym.name == "S"));
    let s = parser.ctx.scopes.ident.symbols().iter().find(|sym| sym.name == "s").unwrap();
    assert_eq!(parser.ctx.types.nmembers(s.ty), 2);

    let head = units[0].block(units[0].head);
    let stores: Vec<&IrOp> = head.ops.iter().filter(|op| matches!(op, IrOp::Store { .. })).collect();
    assert_eq!(stores.len(), 2, "explicit s.a=1 plus a zero-fill store for s.b");
}

// S6b: `union U { char c; int x; } u = {5};` -> the first member is smaller
// than the union, so the whole union is zero-filled before c is stored.
#[test]
fn union_initializer_zero_fills_before_first_member() {
    let mut parser = Parser::new("union U { char c; int x; } u = {5};", TranslatorConfig::default()).unwrap();
    let units = parser.parse_translation_unit().unwrap();
    assert_eq!(units.len(), 1);

    let u = parser.ctx.scopes.ident.symbols().iter().find(|sym| sym.name == "u").unwrap();
    assert_eq!(parser.ctx.types.size_of(u.ty), 4, "union size is that of its largest member");

    let head = units[0].block(units[0].head);
    let stores: Vec<&IrOp> = head.ops.iter().filter(|op| matches!(op, IrOp::Store { .. })).collect();
    assert_eq!(stores.len(), 5, "one zero-fill store per byte of the 4-byte union plus the explicit c=5 store");
}

// Invariant 7: an integer-immediate if/while/do/for condition folds to a
// single successor from the condition block.
#[test]
fn constant_condition_folds_to_single_successor() {
    let units = parse_ok("void f(void) { if (1) { } while (0) { } do { } while (1); for (;0;) { } }");
    let cfg = &units[0];
    let folded = cfg.blocks().iter().filter(|b| !b.is_terminal() && !b.is_conditional()).count();
    assert!(folded >= 4, "each constant-guarded condition block should have exactly one successor");
    let two_way = cfg.blocks().iter().filter(|b| b.is_conditional()).count();
    assert_eq!(two_way, 0, "no condition in this function is non-constant, so none should be two-way");
}

// Invariant 6: `x++` yields the pre-increment value; `++x` yields the
// post-increment value; exactly one store is emitted either way.
#[test]
fn pre_and_post_increment_differ_only_in_result_timing() {
    let units = parse_ok("void f(int x) { int a = x++; int b = ++x; }");
    let cfg = &units[0];
    let store_count: usize = cfg.blocks().iter().map(|b| b.ops.iter().filter(|op| matches!(op, IrOp::Store { .. } | IrOp::Copy { .. })).count()).sum();
    assert!(store_count >= 4, "two increments plus two assignments into a/b");
}

// Invariant 5: an incomplete array type is accepted only at file scope when
// completed by its initializer; a block-scope incomplete array is rejected.
#[test]
fn block_scope_incomplete_array_is_rejected() {
    let err = translate_source("void f(void) { int a[]; }", TranslatorConfig::default());
    assert!(err.is_err());
}

#[test]
fn file_scope_incomplete_array_without_initializer_is_rejected() {
    let err = translate_source("int a[];", TranslatorConfig::default());
    assert!(err.is_err());
}

// Invariant 1: scope discipline holds across a nested-block program; the
// namespaces return to depth 0 once parsing completes.
#[test]
fn scopes_return_to_depth_zero_after_parse() {
    let mut parser = Parser::new("void f(void) { { int x; { int y; } } }", TranslatorConfig::default()).unwrap();
    parser.parse_translation_unit().unwrap();
    assert_eq!(parser.ctx.scopes.depth(), 0);
}

// Invariant 3: short-circuit `&&` only reaches the rhs evaluation on the
// true edge from the lhs; `||` only on the false edge.
#[test]
fn short_circuit_and_or_reach_rhs_on_the_expected_edge() {
    let units = parse_ok("int f(int a, int b) { return a && b; }");
    let cfg = &units[0];
    let cond = cfg.blocks().iter().find(|b| b.is_conditional()).expect("&& lowers to a conditional block");
    assert!(cond.jump[1].is_some(), "the true edge must be the one that evaluates b");
}

#[test]
fn immediate_var_round_trips_through_constant_bool() {
    let v = Var::Immediate { ty: cfront::types::TypeId(0), imm: Immediate::Int(0) };
    assert_eq!(cfront::ir::constant_bool(&v), Some(false));
}
