use super::*;
use crate::Emitter;
use puzzleforge_schema::Specification;
use puzzleforge_test::{seeded, specs};
use serde_json::json;

fn program(yaml: &str) -> Program {
    let spec = Specification::from_yaml_str(yaml).unwrap();
    Emitter::emit(&spec).unwrap()
}

fn generate(yaml: &str, seed: u64) -> Result<Puzzle> {
    Interpreter::new(&seeded(seed)).run(&program(yaml), Mode::generate(seed))
}

// First seed from `start` whose draw is feasible. Recoverable failures such
// as an infeasible option partition move on to the next seed.
fn first_feasible(interpreter: &Interpreter, program: &Program, start: u64) -> Puzzle {
    for seed in start..start + 100 {
        match interpreter.run(program, Mode::generate(seed)) {
            Ok(puzzle) => return puzzle,
            Err(e) if e.is_recoverable() => continue,
            Err(e) => panic!("seed {seed}: {e}"),
        }
    }
    panic!("no feasible seed in {start}..{}", start + 100)
}

fn binomial(n: u64, k: u64) -> u64 {
    (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
}

#[test]
fn test_lamps_answer_counts_solutions() {
    let puzzle = generate(specs::LAMPS, 7).unwrap();
    let n = puzzle.config["n"].as_u64().unwrap();
    assert!((3..=5).contains(&n));
    assert_eq!(puzzle.answer, binomial(n, 3).to_string());
    assert_eq!(puzzle.parameters.sym_num as u64, n);
    assert_eq!(puzzle.parameters.sym_type, ["bool"]);
    assert!(puzzle.problem.starts_with(&format!("There are {n} lamps in a row.\n")));
    assert!(puzzle.problem.contains("1. How many arrangements are possible?\n"));
}

#[test]
fn test_same_seed_same_puzzle() {
    for (_, yaml) in specs::ALL.iter().filter(|(name, _)| *name != "optimize_ambiguous") {
        let a = generate(yaml, 11).unwrap();
        let b = generate(yaml, 11).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_replay_reproduces_generation() {
    let interpreter = Interpreter::new(&seeded(5));
    for (name, yaml) in specs::ALL.iter().filter(|(name, _)| *name != "optimize_ambiguous") {
        let program = program(yaml);
        let generated = first_feasible(&interpreter, &program, 5);
        let configuration = Configuration::from_json(generated.config.clone()).unwrap();
        let replayed = interpreter.run(&program, Mode::replay(configuration)).unwrap();
        assert_eq!(generated.problem, replayed.problem, "{name}");
        assert_eq!(generated.answer, replayed.answer, "{name}");
        assert_eq!(generated.config, replayed.config, "{name}");
    }
}

#[test]
fn test_replay_without_entry_fails() {
    let interpreter = Interpreter::new(&seeded(1));
    let err = interpreter
        .run(&program(specs::FLAGS), Mode::replay(Configuration::new()))
        .unwrap_err();
    assert!(matches!(err, PuzzleError::Replay(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn test_spec_controlled_variable_is_recomputed() {
    let interpreter = Interpreter::new(&seeded(1));
    let program = program(specs::FLAGS);
    let configuration = Configuration::from_json(json!({
        "flag": true,
        "size": 3,
        "double": 100,
    }))
    .unwrap();
    let plain = interpreter.run(&program, Mode::replay(configuration.clone())).unwrap();
    assert_eq!(plain.problem, "flag=True size=3 double=100");

    let mode = Mode::Replay {
        configuration,
        spec_controlled: vec!["double".into()],
    };
    let recomputed = interpreter.run(&program, mode).unwrap();
    assert_eq!(recomputed.problem, "flag=True size=3 double=6");
    assert_eq!(recomputed.config["double"], json!(6));
}

#[test]
fn test_bool_variable_without_domain_is_a_coin() {
    let mut seen = HashSet::new();
    for seed in 0..32 {
        let puzzle = generate(specs::FLAGS, seed).unwrap();
        seen.insert(puzzle.config["flag"].as_bool().unwrap());
        let size = puzzle.config["size"].as_i64().unwrap();
        assert_eq!(puzzle.config["double"].as_i64().unwrap(), size * 2);
    }
    assert_eq!(seen.len(), 2);
}

#[test]
fn test_empty_int_range_is_a_generation_error() {
    let yaml = r#"
variables:
  n: {type: int, domain: "[5, 2]"}
calc_solution: false
desc: "{n}"
"#;
    let err = generate(yaml, 0).unwrap_err();
    assert!(matches!(err, PuzzleError::RandomGeneration { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn test_failed_assertion_names_query() {
    let yaml = r#"
variables:
  n: {formula: "2"}
calc_solution: false
queries:
  double:
    desc: "double?"
    ans_formula: "n * 2"
    ans_assertion: "_ans == 5"
    ans_text: "_ans"
desc: "{queries}"
"#;
    match generate(yaml, 0) {
        Err(PuzzleError::AnswerAssertion { query, message }) => {
            assert_eq!(query, "double");
            assert!(message.contains('4'));
        }
        other => panic!("expected an answer assertion error, got {other:?}"),
    }
}

#[test]
fn test_list_condition_adds_one_assertion_per_item() {
    let yaml = r#"
variables:
  n: {formula: "3"}
symbols:
  x: {source: ["range(n)"], type: int, domain: "[0, 2]"}
conditions:
  each_positive:
    formula: "[x[i] > 0 for i in range(n)]"
  sum:
    formula: "Sum([x[i] for i in range(n)]) == 4"
    desc: "They add up to 4."
queries:
  count:
    desc: "count"
    ans_formula: "len(_solutions)"
    ans_assertion: "True"
    ans_text: "_ans"
desc: "{conditions}"
"#;
    let puzzle = generate(yaml, 0).unwrap();
    assert_eq!(puzzle.parameters.cond_num, 4);
    assert_eq!(puzzle.answer, "3");
    assert_eq!(puzzle.problem, "They add up to 4.");
}
