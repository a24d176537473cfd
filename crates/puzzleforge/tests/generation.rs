//! End-to-end generation tests.
//!
//! Each test compiles a fixture specification, generates puzzles, and checks
//! the rendered text and answers against what the fixture guarantees.

use std::collections::HashSet;

use puzzleforge::{Generator, GeneratorConfig, PuzzleError, Specification};
use puzzleforge_test::{seeded, specs};

fn generator(yaml: &str, seed: u64) -> Generator {
    let spec = Specification::from_yaml_str(yaml).unwrap();
    Generator::new(&spec, seeded(seed)).unwrap()
}

#[test]
fn test_pairs_are_distinct_and_filtered() {
    for seed in 0..8 {
        let puzzle = generator(specs::PAIRS, seed).generate_one().unwrap();
        assert_eq!(puzzle.answer, "5");
        let pool = puzzle.config["pairs"]["pool"].as_array().unwrap();
        assert_eq!(pool.len(), 5);

        let line = puzzle.problem.lines().next().unwrap();
        let listed = line.trim_start_matches("Pairs: ");
        let mut seen = HashSet::new();
        for pair in listed.trim_matches(|c| c == '[' || c == ']').split(", ") {
            let (a, b) = pair.trim_matches('\'').split_once('&').unwrap();
            let (a, b): (u32, u32) = (a.parse().unwrap(), b.parse().unwrap());
            assert_ne!(a + b, 5, "pair {a}&{b} sums to 5");
            assert!(a < b, "unordered pairs come out ascending");
            assert!(seen.insert((a, b)), "pair {a}&{b} repeated");
        }
        assert_eq!(seen.len(), 5);
    }
}

#[test]
fn test_selection_answer_points_at_lit_light() {
    for seed in 0..6 {
        let puzzle = generator(specs::SELECTION, seed).generate_one().unwrap();
        let letter = puzzle.answer.chars().next().unwrap();
        assert_eq!(puzzle.answer.len(), 1);
        let line = puzzle
            .problem
            .lines()
            .find(|l| l.starts_with(&format!("{letter}. ")))
            .unwrap();
        assert_eq!(line, format!("{letter}. light 3"));
        assert_eq!(puzzle.config["_queries"]["which"]["pool"].as_array().unwrap().len(), 4);
    }
}

#[test]
fn test_multi_template_selection_records_partition() {
    let puzzle = generator(specs::MULTI_SELECTION, 21)
        .generate_continuous()
        .unwrap();
    let which = &puzzle.config["_queries"]["which"];
    let sum = |key: &str| -> i64 { which[key].as_array().unwrap().iter().map(|v| v.as_i64().unwrap()).sum() };
    assert_eq!(sum("pool_domain"), 4);
    assert_eq!(sum("pool_correct_num"), 1);
    assert_eq!(sum("pool_incorrect_num"), 3);
    assert_eq!(which["pool"].as_array().unwrap().len(), 4);

    let letter = puzzle.answer.chars().next().unwrap();
    let line = puzzle
        .problem
        .lines()
        .find(|l| l.starts_with(&format!("{letter}. ")))
        .unwrap();
    assert!(
        line.ends_with("light 3 is on") || (line.ends_with("is off") && !line.contains("light 3")),
        "{line} is not a true statement"
    );
}

#[test]
fn test_unique_optimum() {
    let puzzle = generator(specs::OPTIMIZE_UNIQUE, 0).generate_one().unwrap();
    assert_eq!(puzzle.answer, "5");
    let opt = puzzle.parameters.opt_solution.as_deref().unwrap();
    assert!(opt.contains("x_0 = 5"));
    assert!(opt.contains("x_1 = 2"));
}

#[test]
fn test_single_variable_maximum_is_unique() {
    let yaml = r#"
variables: {}
symbols:
  x: {source: ["range(1)"], type: int, domain: "[0, 5]"}
conditions:
  any: {formula: "x[0] >= 0"}
optimize:
  type: maximize
  formula: "x[0]"
queries:
  best:
    desc: "best?"
    ans_formula: "_value"
    ans_text: "_ans"
desc: "{queries}"
"#;
    let puzzle = generator(yaml, 0).generate_one().unwrap();
    assert_eq!(puzzle.answer, "5");
}

#[test]
fn test_ambiguous_optimum_is_reported() {
    let err = generator(specs::OPTIMIZE_AMBIGUOUS, 0).generate_one().unwrap_err();
    assert!(matches!(err, PuzzleError::AmbiguousOptimum { .. }), "{err}");
}

#[test]
fn test_post_generation_pins_baseline() {
    let puzzle = generator(specs::POST_GENERATION, 3).generate_one().unwrap();
    assert_eq!(puzzle.config["_sol_id"], 0);
    let first = puzzle.config["first"].as_i64().unwrap();
    assert!((1..=3).contains(&first));
    assert!(puzzle.problem.contains(&format!("Value 0 is {first};Value 1 is below value 2;")));
    let mut rest: Vec<i64> = (1..=3).filter(|v| *v != first).collect();
    rest.sort();
    assert_eq!(puzzle.answer, format!("[{first}, {}, {}]", rest[0], rest[1]));
    assert_eq!(puzzle.parameters.cond_num, 3);
}

#[test]
fn test_dynamic_condition_count() {
    for seed in 0..6 {
        let puzzle = generator(specs::DYNAMIC_CONDITION, seed).generate_one().unwrap();
        let hints = &puzzle.config["hints"];
        let count = hints["domain"].as_u64().unwrap();
        assert!((2..=3).contains(&count));
        assert_eq!(hints["pool"].as_array().unwrap().len() as u64, count);
        assert_eq!(puzzle.answer, ((1u64 << (4 - count)) - 1).to_string());
        assert_eq!(puzzle.problem.matches(" is off. ").count() as u64, count);
    }
}

#[test]
fn test_group_splits_total() {
    for seed in 0..6 {
        let puzzle = generator(specs::GROUP, seed).generate_one().unwrap();
        assert_eq!(puzzle.answer, "4");
        let domains: Vec<u64> = puzzle.config["items"]["pool_domain"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d.as_u64().unwrap())
            .collect();
        assert_eq!(domains.iter().sum::<u64>(), 4);
        assert!(domains.iter().all(|d| (1..=3).contains(d)));
        assert_eq!(puzzle.problem.matches("letter ").count() as u64, domains[0]);
        assert_eq!(puzzle.problem.matches("number ").count() as u64, domains[1]);
    }
}

#[test]
fn test_batch_is_reproducible_with_seed() {
    let first = generator(specs::LAMPS, 99).generate_batch(6, true).unwrap();
    let second = generator(specs::LAMPS, 99).generate_batch(6, true).unwrap();
    assert_eq!(first.len(), 6);
    assert_eq!(first, second);
}

#[test]
fn test_batch_uses_configured_thread_pool() {
    let spec = Specification::from_yaml_str(specs::FLAGS).unwrap();
    let mut settings = GeneratorConfig::new().with_random_seed(4);
    settings.generation.threads = Some(2);
    let puzzles = Generator::new(&spec, settings)
        .unwrap()
        .generate_batch(5, false)
        .unwrap();
    assert_eq!(puzzles.len(), 5);
}

#[test]
fn test_continuous_mode_gives_up_after_limit() {
    let yaml = r#"
variables:
  n: {type: int, domain: "[1, 2]"}
calc_solution: false
queries:
  q:
    desc: "q"
    ans_formula: "n"
    ans_assertion: "_ans > 5"
    ans_text: "_ans"
desc: "{queries}"
"#;
    let spec = Specification::from_yaml_str(yaml).unwrap();
    let settings = GeneratorConfig::new().with_random_seed(0).with_max_regenerations(3);
    let err = Generator::new(&spec, settings)
        .unwrap()
        .generate_continuous()
        .unwrap_err();
    assert!(matches!(err, PuzzleError::AnswerAssertion { .. }));
}

#[test]
fn test_runaway_custom_operator_fails_in_batch() {
    let yaml = r#"
custom_operator:
  f: "lambda n: 0 if n > 10000 else f(n + 1)"
variables:
  n: {formula: "f(0)"}
calc_solution: false
queries:
  q:
    desc: "q"
    ans_formula: "n"
    ans_assertion: "True"
    ans_text: "_ans"
desc: "{queries}"
"#;
    let err = generator(yaml, 0).generate_batch(2, false).unwrap_err();
    assert!(matches!(err, PuzzleError::Evaluation(ref m) if m.contains("maximum call depth")), "{err}");
}

#[test]
fn test_invalid_spec_is_rejected_before_generation() {
    let yaml = r#"
variables: {}
symbols:
  s: {source: ["range(2)"], attr: ["a", "b"], type: "int"}
desc: "x"
"#;
    match Specification::from_yaml_str(yaml) {
        Err(PuzzleError::Schema { field, .. }) => assert_eq!(field, "symbols.s.type"),
        other => panic!("expected schema error, got {other:?}"),
    }
}
