use super::*;
use puzzleforge_core::{PuzzleError, Sort};
use std::io::Write;

fn field_of(result: puzzleforge_core::Result<Specification>) -> String {
    match result {
        Err(PuzzleError::Schema { field, .. }) => field,
        Err(other) => panic!("expected schema error, got {other:?}"),
        Ok(_) => panic!("expected schema error, document was accepted"),
    }
}

const FULL: &str = r#"
custom_operator:
  double: "lambda x: x * 2"
variables:
  n: {type: int, domain: "[2, 4]"}
  colour: {type: enum, domain: "['red', 'blue']"}
  half: {formula: "n / 2"}
symbols:
  seat:
    source: ["range(n)", "['x', 'y']"]
    attr: [occupied, weight]
    type: [bool, int]
    desc: ["{_key} is taken", "{_key} weighs"]
    domain: "[0, 9]"
  pairs:
    source: ["range(6)"]
    amount: [2]
    order: [false]
    domain: 3
    formula: "_sym"
    desc: "pair {_sym}"
  mixed:
    total: "4"
    templates:
      - {source: ["range(3)"], domain: "[1, 3]", desc: "a {_sym}"}
      - {source: ["range(5)"], desc: "b {_sym}"}
conditions:
  fixed: {formula: "seat[0, 'x']['occupied']", desc: "seat 0x is taken"}
  rows:
    source: ["range(n)"]
    domain: "[1, 2]"
    custom_cond: [{scope: domain}]
    formula: "Not(seat[_sym[0], 'y']['occupied'])"
    desc: "Seat {_sym[0]}y is free. "
queries:
  how_many:
    desc: "How many arrangements are there?"
    ans_formula: "len(_solutions)"
    ans_text: "_ans"
    ans_assertion: "len(_solutions) >= 1"
  which:
    desc: "Which seat is taken?"
    source: ["range(n)"]
    opt_formula: "is_true(_model.eval(seat[_opt[0][0], 'x']['occupied']))"
    opt_text: "seat {_opt[0][0]}"
desc: "There are {n} seats in {colour}.\n{conditions}"
"#;

#[test]
fn test_full_document_classifies_constructs() {
    let spec = Specification::from_yaml_str(FULL).unwrap();
    assert_eq!(spec.variables.len(), 3);
    assert_eq!(spec.variables["n"].var_type(), Some(VarType::Int));
    assert_eq!(spec.variables["colour"].var_type(), Some(VarType::Enum));
    assert!(matches!(spec.symbols["seat"], Symbol::Defined(_)));
    assert!(matches!(spec.symbols["pairs"], Symbol::Derived(_)));
    assert!(matches!(spec.symbols["mixed"], Symbol::Group(_)));
    assert!(matches!(spec.conditions["fixed"], Condition::Static(_)));
    assert!(matches!(spec.conditions["rows"], Condition::Dynamic(_)));
    assert!(matches!(spec.queries["how_many"], Query::Open(_)));
    assert!(matches!(spec.queries["which"], Query::Selection(_)));
    assert!(spec.calc_solution);
}

#[test]
fn test_document_order_is_preserved() {
    let spec = Specification::from_yaml_str(FULL).unwrap();
    let names: Vec<&str> = spec.variables.keys().map(String::as_str).collect();
    assert_eq!(names, ["n", "colour", "half"]);
    let names: Vec<&str> = spec.symbols.keys().map(String::as_str).collect();
    assert_eq!(names, ["seat", "pairs", "mixed"]);
}

#[test]
fn test_numeric_expression_fields_are_text() {
    let spec = Specification::from_yaml_str(FULL).unwrap();
    match &spec.symbols["pairs"] {
        Symbol::Derived(d) => {
            assert_eq!(d.amount.as_deref(), Some(&["2".to_string()][..]));
            assert_eq!(d.domain.as_deref(), Some("3"));
            assert_eq!(d.dim, 1);
            assert!(d.domain_cond);
            assert_eq!(d.order_or_default(), vec![false]);
            assert_eq!(d.duplicate_or_default(), vec![false]);
        }
        other => panic!("expected derived symbol, got {other:?}"),
    }
}

#[test]
fn test_defined_symbol_sorts_and_descs() {
    let spec = Specification::from_yaml_str(FULL).unwrap();
    let (name, seat) = spec.defined_symbols().next().unwrap();
    assert_eq!(name, "seat");
    assert_eq!(seat.sorts(), Some(vec![Sort::Bool, Sort::Int]));
    assert_eq!(seat.descs()[1].as_deref(), Some("{_key} weighs"));
}

#[test]
fn test_query_defaults() {
    let spec = Specification::from_yaml_str(FULL).unwrap();
    match &spec.queries["which"] {
        Query::Selection(q) => {
            assert_eq!(q.opt_num, 4);
            assert!(q.select_type);
            assert_eq!(q.query_type, "single_choice");
            let t = &q.options.templates()[0];
            assert_eq!(t.cond, OptionCond::Any);
            assert_eq!(t.order_or_default(), vec![false]);
        }
        other => panic!("expected selection query, got {other:?}"),
    }
    let spec = Specification::from_yaml_str(
        "variables: {}\nqueries:\n  q: {desc: d, ans_formula: '1', ans_text: _ans}\ndesc: ''\n",
    )
    .unwrap();
    match &spec.queries["q"] {
        Query::Open(q) => assert_eq!(q.ans_assertion, "len(_solutions) == 1"),
        other => panic!("expected open query, got {other:?}"),
    }
}

#[test]
fn test_yaml_and_json_load_equal() {
    let from_yaml = Specification::from_yaml_str(FULL).unwrap();
    let json = from_yaml.to_json_string().unwrap();
    let from_json = Specification::from_json_str(&json).unwrap();
    assert_eq!(from_yaml, from_json);
}

#[test]
fn test_toml_document() {
    let spec = Specification::from_toml_str(
        r#"
desc = "x is {x}"

[variables.x]
type = "int"
domain = "[1, 3]"

[optimize]
type = "maximize"
formula = "x"
"#,
    )
    .unwrap();
    assert_eq!(spec.optimize.unwrap().direction, Direction::Maximize);
}

#[test]
fn test_variable_formula_and_domain_is_rejected() {
    let doc = "variables:\n  x: {formula: '1', domain: '[1, 2]'}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "variables.x");
}

#[test]
fn test_variable_without_domain_is_rejected() {
    let doc = "variables:\n  x: {type: int}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "variables.x");
    let doc = "variables:\n  x: {type: complex, domain: '[1, 2]'}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "variables.x.type");
    let doc = "variables:\n  x: {type: int, domain: '[1, 2, 3]'}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "variables.x.domain");
}

#[test]
fn test_bool_variable_may_omit_domain() {
    let doc = "variables:\n  flag: {type: bool}\ndesc: ''\n";
    let spec = Specification::from_yaml_str(doc).unwrap();
    assert_eq!(spec.variables["flag"].var_type(), Some(VarType::Bool));
    assert!(spec.variables["flag"].domain.is_none());
}

#[test]
fn test_attr_type_length_mismatch_names_type() {
    let doc = r#"
variables: {}
symbols:
  cell: {source: ["range(2)"], attr: [a, b], type: [int]}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "symbols.cell.type");
}

#[test]
fn test_type_list_without_attr_is_rejected() {
    let doc = r#"
variables: {}
symbols:
  cell: {source: ["range(2)"], type: [int, bool]}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "symbols.cell.type");
}

#[test]
fn test_desc_list_without_attr_is_rejected() {
    let doc = r#"
variables: {}
symbols:
  cell: {source: ["range(2)"], type: int, desc: [a, b]}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "symbols.cell.desc");
}

#[test]
fn test_unknown_sort_is_rejected() {
    let doc = r#"
variables: {}
symbols:
  cell: {source: ["range(2)"], type: string}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "symbols.cell.type");
    assert_eq!(parse_sort("Float"), Some(Sort::Real));
    assert_eq!(parse_sort("BV4"), Some(Sort::BitVec(4)));
}

#[test]
fn test_dim_cond_duplicate_index_is_rejected() {
    let doc = r#"
variables: {}
symbols:
  s: {source: ["range(3)", "range(3)"], dim: 2, dim_cond: [[0, 1], [1]], desc: ""}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "symbols.s.dim_cond");
}

#[test]
fn test_source_length_mismatch_is_rejected() {
    let doc = r#"
variables: {}
symbols:
  s: {source: ["range(3)", "range(3)"], order: [true], desc: ""}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "symbols.s.order");
}

#[test]
fn test_custom_cond_scope_and_fields() {
    let doc = r#"
variables: {}
symbols:
  s: {source: ["range(3)"], custom_cond: [{scope: option, constraint: "lambda l: True"}], desc: ""}
desc: ""
"#;
    assert_eq!(
        field_of(Specification::from_yaml_str(doc)),
        "symbols.s.custom_cond[0].scope"
    );
    let doc = r#"
variables: {}
symbols:
  s: {source: ["range(3)"], custom_cond: [{scope: dim, fields: [1], constraint: "lambda l: True"}], desc: ""}
desc: ""
"#;
    assert_eq!(
        field_of(Specification::from_yaml_str(doc)),
        "symbols.s.custom_cond[0].fields"
    );
    let doc = r#"
variables: {}
symbols:
  s: {source: ["range(3)"], custom_cond: [{scope: dim}], desc: ""}
desc: ""
"#;
    assert_eq!(
        field_of(Specification::from_yaml_str(doc)),
        "symbols.s.custom_cond[0].constraint"
    );
}

#[test]
fn test_zero_dim_is_rejected() {
    let doc = "variables: {}\nsymbols:\n  s: {source: ['range(3)'], dim: 0, desc: ''}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "symbols.s.dim");
}

#[test]
fn test_syntax_error_names_field() {
    let doc = r#"
variables: {}
symbols:
  pairs: {source: ["range(3)"], formula: "_sym[0] +", desc: ""}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "symbols.pairs.formula");
    let doc = "variables: {}\nconditions:\n  c: {formula: 'True', desc: 'broken {'}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "conditions.c.desc");
}

#[test]
fn test_post_generation_and_optimize_are_exclusive() {
    let doc = r#"
variables: {}
post_generation:
  post_gen_vars: {v: "1"}
optimize: {type: minimize, formula: "1"}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "optimize");
}

#[test]
fn test_bad_optimize_direction_is_located() {
    let doc = "variables: {}\noptimize: {type: shrink, formula: '1'}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "optimize");
}

#[test]
fn test_missing_field_is_located() {
    let doc = "variables: {}\nqueries:\n  q: {desc: d, ans_formula: '1'}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "queries.q");
    let doc = "variables: {}\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "<document>");
}

#[test]
fn test_opt_num_lower_bound() {
    let doc = r#"
variables: {}
queries:
  q: {desc: d, source: ["range(3)"], opt_formula: "True", opt_num: 1}
desc: ""
"#;
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "queries.q.opt_num");
}

#[test]
fn test_multi_template_query() {
    let doc = r#"
variables: {}
queries:
  q:
    desc: d
    opt_num: 3
    templates:
      - {source: ["range(3)"], opt_formula: "True", domain: "[1, 2]"}
      - {source: ["range(4)"], opt_formula: "False", cond: all}
desc: ""
"#;
    let spec = Specification::from_yaml_str(doc).unwrap();
    match &spec.queries["q"] {
        Query::Selection(q) => {
            assert!(matches!(q.options, OptionSet::Multiple { .. }));
            assert_eq!(q.options.templates().len(), 2);
            assert_eq!(q.options.templates()[1].cond, OptionCond::All);
        }
        other => panic!("expected selection query, got {other:?}"),
    }
}

#[test]
fn test_custom_operator_must_be_lambda() {
    let doc = "custom_operator: {f: '1 + 1'}\nvariables: {}\ndesc: ''\n";
    assert_eq!(field_of(Specification::from_yaml_str(doc)), "custom_operator.f");
}

#[test]
fn test_load_by_extension_and_fallback() {
    let dir = tempfile::tempdir().unwrap();

    let yaml = dir.path().join("spec.yaml");
    std::fs::write(&yaml, FULL).unwrap();
    let spec = Specification::load(&yaml).unwrap();

    let json = dir.path().join("spec.json");
    std::fs::write(&json, spec.to_json_string().unwrap()).unwrap();
    assert_eq!(Specification::load(&json).unwrap(), spec);

    let mut other = tempfile::Builder::new().suffix(".spec").tempfile_in(dir.path()).unwrap();
    other.write_all(FULL.as_bytes()).unwrap();
    assert_eq!(Specification::load(other.path()).unwrap(), spec);

    assert!(matches!(
        Specification::load(dir.path().join("missing.yaml")),
        Err(PuzzleError::Io(_))
    ));
}

#[test]
fn test_fixtures_are_valid() {
    for (name, text) in puzzleforge_test::specs::ALL {
        if let Err(e) = Specification::from_yaml_str(text) {
            panic!("fixture {name} rejected: {e}");
        }
    }
}
