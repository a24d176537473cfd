//! Tests for terms, models and errors

use super::error::PuzzleError;
use super::model::Model;
use super::term::*;

fn int_var(id: u32, name: &str) -> Variable {
    Variable::new(VarId(id), name, Sort::Int)
}

fn bool_var(id: u32, name: &str) -> Variable {
    Variable::new(VarId(id), name, Sort::Bool)
}

#[test]
fn test_sort_parse() {
    assert_eq!(Sort::parse("int"), Some(Sort::Int));
    assert_eq!(Sort::parse("Bool"), Some(Sort::Bool));
    assert_eq!(Sort::parse("REAL"), Some(Sort::Real));
    assert_eq!(Sort::parse("bitvec"), Some(Sort::BitVec(8)));
    assert_eq!(Sort::parse("bv4"), Some(Sort::BitVec(4)));
    assert_eq!(Sort::parse("string"), None);
}

#[test]
fn test_bitvec_range() {
    assert_eq!(Sort::BitVec(4).bitvec_range(), Some((-8, 7)));
    assert_eq!(Sort::Int.bitvec_range(), None);
}

#[test]
fn test_const_display() {
    assert_eq!(Const::Bool(true).to_string(), "True");
    assert_eq!(Const::Int(-3).to_string(), "-3");
    assert_eq!(Const::Real(2.0).to_string(), "2.0");
    assert_eq!(Const::Real(0.5).to_string(), "0.5");
}

#[test]
fn test_term_display() {
    let x = Term::var(int_var(0, "x"));
    let y = Term::var(int_var(1, "y"));
    let sum = Term::add([x.clone(), y.clone()]);
    assert_eq!(sum.to_string(), "x + y");
    let cmp = Term::eq(sum, Term::int(3));
    assert_eq!(cmp.to_string(), "(x + y) == 3");
    let ite = Term::ite(Term::var(bool_var(2, "b")), Term::int(1), Term::int(0));
    assert_eq!(ite.to_string(), "If(b, 1, 0)");
    assert_eq!(Term::and([x.clone(), y]).to_string(), "And(x, y)");
}

#[test]
fn test_evaluate_arithmetic() {
    let x = int_var(0, "x");
    let term = Term::modulo(
        Term::sub(Term::var(x.clone()), Term::int(10)),
        Term::int(3),
    );
    let value = term.evaluate(&|_: &Variable| Const::Int(4)).unwrap();
    // Euclidean modulo: (4 - 10) mod 3 == 0
    assert_eq!(value, Const::Int(0));

    let div = Term::div(Term::int(-7), Term::int(2));
    assert_eq!(div.evaluate(&|_: &Variable| Const::Int(0)).unwrap(), Const::Int(-4));
}

#[test]
fn test_evaluate_division_by_zero() {
    let term = Term::div(Term::int(1), Term::int(0));
    let err = term.evaluate(&|_: &Variable| Const::Int(0)).unwrap_err();
    assert!(matches!(err, PuzzleError::Evaluation(_)));
}

#[test]
fn test_evaluate_bool_arithmetic() {
    let a = bool_var(0, "a");
    let b = bool_var(1, "b");
    let count = Term::add([Term::var(a), Term::var(b)]);
    let value = count.evaluate(&|_: &Variable| Const::Bool(true)).unwrap();
    assert_eq!(value, Const::Int(2));
}

#[test]
fn test_evaluate_distinct() {
    let xs: Vec<_> = (0..3).map(|i| Term::var(int_var(i, &format!("x{i}")))).collect();
    let distinct = Term::distinct(xs);
    let all_same = distinct.evaluate_bool(&|_: &Variable| Const::Int(1)).unwrap();
    assert!(!all_same);
    let by_id = distinct
        .evaluate_bool(&|v: &Variable| Const::Int(v.id.0 as i64))
        .unwrap();
    assert!(by_id);
}

#[test]
fn test_collect_vars() {
    let x = int_var(0, "x");
    let y = int_var(1, "y");
    let term = Term::cmp(
        CmpOp::Lt,
        Term::add([Term::var(x.clone()), Term::var(y.clone())]),
        Term::var(x.clone()),
    );
    let mut vars = std::collections::BTreeSet::new();
    term.collect_vars(&mut vars);
    assert_eq!(vars.len(), 2);
}

#[test]
fn test_model_completion_and_key() {
    let x = int_var(0, "x");
    let a = bool_var(1, "a");
    let unbound = int_var(2, "z");
    let model = Model::new(vec![(x.clone(), Const::Int(5)), (a.clone(), Const::Bool(true))]);

    assert_eq!(model.canonical_key(), vec!["True".to_string(), "5".to_string()]);
    assert_eq!(model.value_of(&unbound), Const::Int(0));
    assert_eq!(model.to_string(), "[a = True, x = 5]");

    let term = Term::add([Term::var(x), Term::var(unbound)]);
    assert_eq!(model.eval(&term).unwrap(), Const::Int(5));
}

#[test]
fn test_model_ordering() {
    let x = int_var(0, "x");
    let m1 = Model::new(vec![(x.clone(), Const::Int(1))]);
    let m2 = Model::new(vec![(x, Const::Int(2))]);
    assert_eq!(m1.canonical_cmp(&m2), std::cmp::Ordering::Less);
    assert_ne!(m1, m2);
}

#[test]
fn test_error_recoverable() {
    assert!(!PuzzleError::schema("variables.n", "bad").is_recoverable());
    assert!(!PuzzleError::replay("missing").is_recoverable());
    assert!(PuzzleError::random("pairs", "exhausted").is_recoverable());
    assert!(PuzzleError::NoSolution {
        context: "base".into()
    }
    .is_recoverable());
    assert_eq!(
        PuzzleError::TooManySolutions { found: 7, limit: 6 }.kind(),
        "TooManySolutionsError"
    );
}
