use super::*;
use crate::family::{FamilyDef, SymbolFamily};
use crate::provenance::Provenance;
use puzzleforge_core::{Const, Model, Sort};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn ctx() -> Context {
    Context::new(ChaCha8Rng::seed_from_u64(0))
}

fn eval(src: &str) -> Value {
    ctx().eval_str(src).unwrap()
}

fn show(src: &str) -> String {
    eval(src).to_string()
}

#[test]
fn test_arithmetic_follows_python() {
    assert_eq!(eval("7 // 2"), Value::Int(3));
    assert_eq!(eval("-7 // 2"), Value::Int(-4));
    assert_eq!(eval("-7 % 3"), Value::Int(2));
    assert_eq!(eval("7 / 2"), Value::Float(3.5));
    assert_eq!(eval("2 ** 10"), Value::Int(1024));
    assert_eq!(eval("True + 1"), Value::Int(2));
    assert_eq!(show("'ab' * 2"), "abab");
    assert_eq!(show("[1] + [2, 3]"), "[1, 2, 3]");
}

#[test]
fn test_division_by_zero_is_error() {
    assert!(ctx().eval_str("1 / 0").is_err());
    assert!(ctx().eval_str("1 // 0").is_err());
}

#[test]
fn test_chained_comparison_short_circuits() {
    assert_eq!(eval("1 < 2 < 3"), Value::Bool(true));
    assert_eq!(eval("3 < 2 < undefined_name"), Value::Bool(false));
}

#[test]
fn test_logical_returns_operand() {
    assert_eq!(eval("0 or 'x'"), Value::from("x"));
    assert_eq!(eval("[] and 1"), Value::list(vec![]));
    assert_eq!(eval("1 and 2"), Value::Int(2));
}

#[test]
fn test_membership() {
    assert_eq!(eval("2 in [1, 2]"), Value::Bool(true));
    assert_eq!(eval("'b' in 'abc'"), Value::Bool(true));
    assert_eq!(eval("'k' not in {'k': 1}"), Value::Bool(false));
}

#[test]
fn test_comprehensions() {
    assert_eq!(show("[x * x for x in range(4) if x % 2 == 0]"), "[0, 4]");
    assert_eq!(show("[(i, j) for i in range(2) for j in range(2) if i != j]"), "[(0, 1), (1, 0)]");
    assert_eq!(show("{k: v for k, v in [('a', 1), ('b', 2)]}"), "{'a': 1, 'b': 2}");
    assert_eq!(eval("sum(x for x in [1, 2, 3])"), Value::Int(6));
}

#[test]
fn test_lambda_captures_scope_and_defaults() {
    let mut ctx = ctx();
    let f = ctx.eval_str("lambda x, y=10: x + y").unwrap();
    ctx.set_global("f", f);
    assert_eq!(ctx.eval_str("f(1)").unwrap(), Value::Int(11));
    assert_eq!(ctx.eval_str("f(1, y=2)").unwrap(), Value::Int(3));
    assert!(ctx.eval_str("f()").is_err());
    assert!(ctx.eval_str("f(1, z=2)").is_err());
    let adder = ctx.eval_str("(lambda n: lambda x: x + n)(5)").unwrap();
    ctx.set_global("add5", adder);
    assert_eq!(ctx.eval_str("add5(1)").unwrap(), Value::Int(6));
}

#[test]
fn test_recursion_depth_is_bounded() {
    let mut ctx = ctx();
    let f = ctx.eval_str("lambda n: f(n + 1)").unwrap();
    ctx.set_global("f", f);
    let err = ctx.eval_str("f(0)").unwrap_err();
    assert!(err.to_string().contains("maximum call depth"));
}

#[test]
fn test_deep_conditional_recursion_is_an_error() {
    let mut ctx = ctx();
    let f = ctx.eval_str("lambda n: 0 if n > 10000 else f(n + 1)").unwrap();
    ctx.set_global("f", f);
    let err = ctx.eval_str("f(0)").unwrap_err();
    assert!(err.to_string().contains("maximum call depth"));
}

#[test]
fn test_shallow_recursion_completes() {
    let mut ctx = ctx();
    let fact = ctx.eval_str("lambda n: 1 if n <= 1 else n * fact(n - 1)").unwrap();
    ctx.set_global("fact", fact);
    assert_eq!(ctx.eval_str("fact(20)").unwrap(), Value::Int(2432902008176640000));
}

#[test]
fn test_builtin_sorted_with_key_and_reverse() {
    assert_eq!(show("sorted([3, 1, 2])"), "[1, 2, 3]");
    assert_eq!(show("sorted(['bb', 'a', 'ccc'], key=len, reverse=True)"), "['ccc', 'bb', 'a']");
    assert_eq!(show("max([1, 5, 3])"), "5");
    assert_eq!(show("min(4, 2, 8)"), "2");
    assert_eq!(show("max(['a', 'bbb'], key=len)"), "bbb");
}

#[test]
fn test_builtin_conversions() {
    assert_eq!(eval("int('42')"), Value::Int(42));
    assert_eq!(eval("int(3.9)"), Value::Int(3));
    assert_eq!(eval("float('2.5')"), Value::Float(2.5));
    assert_eq!(eval("round(2.5)"), Value::Int(2));
    assert_eq!(eval("round(3.14159, 2)"), Value::Float(3.14));
    assert_eq!(show("list(zip([1, 2], 'ab'))"), "[(1, 'a'), (2, 'b')]");
    assert_eq!(show("list(enumerate(['x'], 1))"), "[(1, 'x')]");
    assert_eq!(eval("chr(ord('a') + 1)"), Value::from("b"));
    assert_eq!(eval("len({'a': 1})"), Value::Int(1));
}

#[test]
fn test_slicing_and_negative_index() {
    assert_eq!(show("[1, 2, 3, 4][1:3]"), "[2, 3]");
    assert_eq!(show("[1, 2, 3, 4][::-1]"), "[4, 3, 2, 1]");
    assert_eq!(eval("'hello'[-1]"), Value::from("o"));
    assert!(ctx().eval_str("[1][5]").is_err());
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("', '.join(['a', 'b'])"), Value::from("a, b"));
    assert_eq!(eval("'{} and {x}'.format(1, x=2)"), Value::from("1 and 2"));
    assert_eq!(eval("' pad '.strip().upper()"), Value::from("PAD"));
    assert_eq!(show("'a,b'.split(',')"), "['a', 'b']");
}

#[test]
fn test_fstring_render() {
    let mut ctx = ctx();
    ctx.set_global("x", Value::Float(0.256));
    assert_eq!(ctx.eval_str("f'{x:.1%} of {[1, \"a\"]}'").unwrap(), Value::from("25.6% of [1, 'a']"));
}

#[test]
fn test_render_template_with_local_scope() {
    let mut ctx = ctx();
    let scope = Scope::new().bind("n", Value::Int(3));
    let text = ctx.render_str("{n} items, {{literal}}, {n * 2:d}", &scope).unwrap();
    assert_eq!(text, "3 items, {literal}, 6");
}

#[test]
fn test_symbolic_lifting() {
    let mut ctx = ctx();
    let x = ctx.vars_mut().declare("x", Sort::Int, Some((0, 9))).unwrap();
    ctx.set_global("x", Value::Term(x));
    let sum = ctx.eval_str("x + 1").unwrap();
    assert!(sum.is_term());
    let cond = ctx.eval_str("0 < x <= 5").unwrap();
    let term = cond.as_term().unwrap().clone();
    assert!(term.is_boolean());
    let conj = ctx.eval_str("x > 1 and x < 4").unwrap();
    assert!(conj.is_term());
    let choice = ctx.eval_str("1 if x > 2 else 0").unwrap();
    assert!(choice.is_term());
}

#[test]
fn test_symbolic_truthiness_is_rejected() {
    let mut ctx = ctx();
    let x = ctx.vars_mut().declare("x", Sort::Int, None).unwrap();
    ctx.set_global("x", Value::Term(x));
    assert!(ctx.eval_str("[1 for _ in range(1) if x > 0]").is_err());
}

#[test]
fn test_model_access() {
    let mut ctx = ctx();
    let x = ctx.vars_mut().declare("x", Sort::Int, None).unwrap();
    let b = ctx.vars_mut().declare("b", Sort::Bool, None).unwrap();
    let model = Model::new(vec![
        (x.as_var().unwrap().clone(), Const::Int(4)),
        (b.as_var().unwrap().clone(), Const::Bool(true)),
    ]);
    ctx.set_global("x", Value::Term(x));
    ctx.set_global("b", Value::Term(b));
    ctx.set_global("_model", Value::Model(model));
    assert_eq!(ctx.eval_str("_model[x]").unwrap(), Value::Int(4));
    assert_eq!(ctx.eval_str("_model.eval(x * 2 + 1)").unwrap(), Value::Int(9));
    assert_eq!(ctx.eval_str("get_value(_model, [x, b])").unwrap().to_string(), "[4, True]");
}

#[test]
fn test_family_indexing_and_provenance() {
    let mut ctx = ctx();
    let def = FamilyDef {
        name: "at".into(),
        sources: vec![
            ("people".into(), vec![Value::from("ann"), Value::from("bob")]),
            ("rooms".into(), vec![Value::Int(1), Value::Int(2)]),
        ],
        attrs: None,
        sorts: vec![Sort::Bool],
        descs: vec![Some("{people} is in room {rooms}".into())],
        bounds: None,
    };
    let family = {
        let (vars, prov) = ctx.registries_mut();
        SymbolFamily::build(&def, vars, prov).unwrap()
    };
    ctx.set_global("at", Value::Family(Arc::new(family)));
    assert_eq!(ctx.eval_str("len(at)").unwrap(), Value::Int(4));
    let var = ctx.eval_str("at['bob', 2]").unwrap();
    assert_eq!(var.to_string(), "at_bob_2");
    assert_eq!(ctx.eval_str("get_p(at['ann', 1], 'people')").unwrap(), Value::from("ann"));
    assert_eq!(ctx.eval_str("('ann', 2) in at").unwrap(), Value::Bool(true));
    assert!(ctx.eval_str("at['ann']").is_err());
}

#[test]
fn test_tagged_values_expose_desc_and_data() {
    let mut ctx = ctx();
    let tagged = ctx.provenance_mut().tag(
        Value::from("x > 2"),
        Provenance::default()
            .with_desc(Value::from("x is larger than {data}"))
            .with_data(Value::Int(2)),
    );
    ctx.set_global("c", tagged);
    assert_eq!(ctx.eval_str("c.data").unwrap(), Value::Int(2));
    assert_eq!(ctx.eval_str("get_desc(c)").unwrap(), Value::from("x is larger than {data}"));
    assert_eq!(ctx.eval_str("c + '!'").unwrap(), Value::from("x > 2!"));
    assert_eq!(ctx.eval_str("[get_data(v) for v in [c, c]]").unwrap().to_string(), "[2, 2]");
}

#[test]
fn test_undefined_name_is_evaluation_error() {
    let err = ctx().eval_str("nope + 1").unwrap_err();
    assert_eq!(err.kind(), "EvaluationError");
}

#[test]
fn test_globals_shadow_builtins() {
    let mut ctx = ctx();
    ctx.set_global("len", Value::Int(5));
    assert_eq!(ctx.eval_str("len").unwrap(), Value::Int(5));
    let scope = Scope::new().bind("sum", Value::Int(1));
    let expr = parse_expr("sum").unwrap();
    assert_eq!(ctx.eval(&expr, &scope).unwrap(), Value::Int(1));
}

#[test]
fn test_compile_function_rejects_non_callables() {
    let mut ctx = ctx();
    assert!(ctx.compile_function("lambda l: len(l) > 1").is_ok());
    assert!(ctx.compile_function("1 + 1").is_err());
}
