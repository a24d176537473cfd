use super::*;
use puzzleforge_core::PuzzleError;

fn lit(i: i64) -> Expr {
    Expr::Literal(Value::Int(i))
}

#[test]
fn test_precedence_mul_over_add() {
    let expr = parse_expr("1 + 2 * 3").unwrap();
    assert_eq!(
        expr,
        Expr::Binary(
            BinOp::Add,
            Box::new(lit(1)),
            Box::new(Expr::Binary(BinOp::Mul, Box::new(lit(2)), Box::new(lit(3))))
        )
    );
}

#[test]
fn test_power_binds_tighter_than_unary_minus() {
    let expr = parse_expr("-2 ** 2").unwrap();
    assert!(matches!(expr, Expr::Unary(UnaryOp::Neg, _)));
}

#[test]
fn test_negative_literal_is_folded() {
    assert_eq!(parse_expr("-5").unwrap(), lit(-5));
}

#[test]
fn test_chained_comparison() {
    let expr = parse_expr("0 <= x < 10").unwrap();
    match expr {
        Expr::Compare(first, rest) => {
            assert_eq!(*first, lit(0));
            assert_eq!(rest.len(), 2);
            assert_eq!(rest[0].0, CmpKind::Le);
            assert_eq!(rest[1].0, CmpKind::Lt);
        }
        other => panic!("expected comparison, got {other:?}"),
    }
}

#[test]
fn test_not_in_and_is_not() {
    let expr = parse_expr("a not in b").unwrap();
    assert!(matches!(expr, Expr::Compare(_, ref rest) if rest[0].0 == CmpKind::NotIn));
    let expr = parse_expr("a is not None").unwrap();
    assert!(matches!(expr, Expr::Compare(_, ref rest) if rest[0].0 == CmpKind::IsNot));
}

#[test]
fn test_logical_chain_is_flat() {
    let expr = parse_expr("a and b and c or d").unwrap();
    match expr {
        Expr::Logical(LogicalOp::Or, items) => {
            assert_eq!(items.len(), 2);
            assert!(matches!(&items[0], Expr::Logical(LogicalOp::And, inner) if inner.len() == 3));
        }
        other => panic!("expected or-chain, got {other:?}"),
    }
}

#[test]
fn test_conditional_expression() {
    let expr = parse_expr("x if c else y").unwrap();
    assert!(matches!(expr, Expr::IfElse { .. }));
}

#[test]
fn test_lambda_with_default() {
    let expr = parse_expr("lambda l, k=2: sum(l) == k").unwrap();
    match expr {
        Expr::Lambda(def) => {
            assert_eq!(def.params.len(), 2);
            assert_eq!(&*def.params[0].name, "l");
            assert_eq!(def.params[1].default, Some(lit(2)));
        }
        other => panic!("expected lambda, got {other:?}"),
    }
}

#[test]
fn test_call_with_keyword_and_star() {
    let expr = parse_expr("f(1, key=x, *rest)").unwrap();
    match expr {
        Expr::Call(callee, args) => {
            assert_eq!(*callee, Expr::name("f"));
            assert!(matches!(args[0], Arg::Positional(_)));
            assert!(matches!(&args[1], Arg::Keyword(k, _) if &**k == "key"));
            assert!(matches!(args[2], Arg::Star(_)));
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn test_generator_argument() {
    let expr = parse_expr("sum(x for x in xs if x > 0)").unwrap();
    match expr {
        Expr::Call(_, args) => match &args[0] {
            Arg::Positional(Expr::Comprehension(comp)) => {
                assert_eq!(comp.kind, CompKind::Generator);
                assert_eq!(comp.clauses.len(), 2);
            }
            other => panic!("expected generator, got {other:?}"),
        },
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn test_comprehension_tuple_target() {
    let expr = parse_expr("[k for k, v in items]").unwrap();
    match expr {
        Expr::Comprehension(comp) => match &comp.clauses[0] {
            Clause::For(Target::Tuple(targets), _) => assert_eq!(targets.len(), 2),
            other => panic!("expected tuple target, got {other:?}"),
        },
        other => panic!("expected comprehension, got {other:?}"),
    }
}

#[test]
fn test_dict_and_set_literals() {
    assert!(matches!(parse_expr("{}").unwrap(), Expr::Dict(ref e) if e.is_empty()));
    assert!(matches!(parse_expr("{'a': 1, 'b': 2}").unwrap(), Expr::Dict(ref e) if e.len() == 2));
    assert!(matches!(parse_expr("{1, 2}").unwrap(), Expr::Set(ref e) if e.len() == 2));
    assert!(matches!(
        parse_expr("{k: v for k, v in pairs}").unwrap(),
        Expr::Comprehension(ref c) if c.kind == CompKind::Dict
    ));
}

#[test]
fn test_slice_forms() {
    match parse_expr("xs[1:-1]").unwrap() {
        Expr::Subscript(_, index) => match *index {
            Index::Slice { lower, upper, step } => {
                assert_eq!(lower, Some(lit(1)));
                assert_eq!(upper, Some(lit(-1)));
                assert_eq!(step, None);
            }
            other => panic!("expected slice, got {other:?}"),
        },
        other => panic!("expected subscript, got {other:?}"),
    }
    assert!(parse_expr("xs[::2]").is_ok());
}

#[test]
fn test_tuple_key_subscript() {
    match parse_expr("fam[1, 'a']").unwrap() {
        Expr::Subscript(_, index) => {
            assert!(matches!(*index, Index::Item(Expr::Tuple(ref items)) if items.len() == 2));
        }
        other => panic!("expected subscript, got {other:?}"),
    }
}

#[test]
fn test_top_level_comma_is_tuple() {
    assert!(matches!(parse_expr("1, 2").unwrap(), Expr::Tuple(ref items) if items.len() == 2));
    assert!(matches!(parse_expr("(1,)").unwrap(), Expr::Tuple(ref items) if items.len() == 1));
    assert_eq!(parse_expr("(1)").unwrap(), lit(1));
}

#[test]
fn test_adjacent_strings_concatenate() {
    assert_eq!(
        parse_expr("'ab' \"cd\"").unwrap(),
        Expr::Literal(Value::from("abcd"))
    );
}

#[test]
fn test_fstring_becomes_template() {
    assert!(matches!(parse_expr("f'x = {x}'").unwrap(), Expr::FString(_)));
}

#[test]
fn test_attribute_method_chain() {
    let expr = parse_expr("s.strip().upper()").unwrap();
    assert!(matches!(expr, Expr::Call(ref callee, _) if matches!(**callee, Expr::Attribute(_, _))));
}

#[test]
fn test_empty_expression_is_parse_error() {
    match parse_expr("   ") {
        Err(PuzzleError::Parse { position, .. }) => assert_eq!(position, 0),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_trailing_garbage_is_parse_error() {
    assert!(matches!(parse_expr("1 2"), Err(PuzzleError::Parse { .. })));
    assert!(matches!(parse_expr("(1 + 2"), Err(PuzzleError::Parse { .. })));
}

#[test]
fn test_nesting_limit() {
    let deep = format!("{}1{}", "(".repeat(MAX_EXPR_NESTING + 5), ")".repeat(MAX_EXPR_NESTING + 5));
    assert!(parse_expr(&deep).is_err());
    let shallow = format!("{}1{}", "(".repeat(10), ")".repeat(10));
    assert_eq!(parse_expr(&shallow).unwrap(), lit(1));
}
