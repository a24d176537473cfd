//! Replay tests: recorded configurations reproduce their puzzles.

use std::io::Write;

use puzzleforge::{read_configurations, write_jsonl, Configuration, Generator, Specification};
use puzzleforge_test::{seeded, specs};
use serde_json::json;

fn generator(yaml: &str, seed: u64) -> Generator {
    let spec = Specification::from_yaml_str(yaml).unwrap();
    Generator::new(&spec, seeded(seed)).unwrap()
}

#[test]
fn test_replay_is_byte_identical() {
    for (name, yaml) in specs::ALL.iter().filter(|(name, _)| *name != "optimize_ambiguous") {
        let generator = generator(yaml, 17);
        let puzzle = generator.generate_continuous().unwrap();
        let configuration = Configuration::from_json(puzzle.config.clone()).unwrap();
        let replayed = generator.replay(configuration, &[]).unwrap();
        assert_eq!(
            puzzle.to_json_line().unwrap(),
            replayed.to_json_line().unwrap(),
            "{name}"
        );
    }
}

#[test]
fn test_spec_controlled_variable_changes_text() {
    let generator = generator(specs::FLAGS, 2);
    let puzzle = generator.generate_one().unwrap();
    let mut config = puzzle.config.clone();
    config["size"] = json!(7);

    let configuration = Configuration::from_json(config).unwrap();
    let kept = generator.replay(configuration.clone(), &[]).unwrap();
    assert!(kept.problem.contains("size=7"));
    assert_eq!(kept.config["double"], puzzle.config["double"]);

    let recomputed = generator
        .replay(configuration, &["double".to_string()])
        .unwrap();
    assert!(recomputed.problem.ends_with("size=7 double=14"));
    assert_eq!(recomputed.config["flag"], puzzle.config["flag"]);
}

#[test]
fn test_literal_pool_entries_are_values() {
    let generator = generator(specs::GROUP, 0);
    let config = json!({
        "total": 4,
        "items": {
            "pool_domain": [2, 2],
            "pool": [
                [[["__0__"]], [["z"]]],
                [[["__4__"]], [[99]]],
            ],
        },
    });
    let puzzle = generator
        .replay(Configuration::from_json(config).unwrap(), &[])
        .unwrap();
    assert!(puzzle.problem.starts_with("Items: ['letter a', 'letter z', 'number 14', 'number 99']"));
    assert_eq!(puzzle.answer, "4");
}

#[test]
fn test_selection_replay_recomputes_letters() {
    let generator = generator(specs::SELECTION, 0);
    let config = json!({
        "n": 4,
        "_queries": {"which": {"pool": [[["__1__"]], [[0]], [["__3__"]], [["__2__"]]]}},
    });
    let puzzle = generator
        .replay(Configuration::from_json(config).unwrap(), &[])
        .unwrap();
    assert_eq!(puzzle.answer, "C");
    assert!(puzzle
        .problem
        .contains("1. Which light is on?\nA. light 1\nB. light 0\nC. light 3\nD. light 2\n"));
}

#[test]
fn test_replay_file_skips_bad_configurations() {
    let generator = generator(specs::LAMPS, 8);
    let puzzles = generator.generate_batch(3, true).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.jsonl");
    write_jsonl(&path, &puzzles).unwrap();
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, r#"{{"problem": "broken", "config": {{"n": "many"}}}}"#).unwrap();
    drop(file);

    assert_eq!(read_configurations(&path).unwrap().len(), 4);
    let replayed = generator.replay_file(&path, &[]).unwrap();
    assert_eq!(replayed, puzzles);
}

#[test]
fn test_replay_single_config_file() {
    let generator = generator(specs::DYNAMIC_CONDITION, 4);
    let puzzle = generator.generate_one().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, serde_json::to_string(&puzzle.config).unwrap()).unwrap();
    let replayed = generator.replay_file(&path, &[]).unwrap();
    assert_eq!(replayed, vec![puzzle]);
}

#[test]
fn test_float_variable_survives_json_text() {
    let yaml = r#"
variables:
  w: {type: float, domain: "[0, 1]"}
calc_solution: false
queries:
  weight:
    desc: "What is {w}?"
    ans_formula: "w"
    ans_assertion: "True"
    ans_text: "_ans"
desc: "{queries}"
"#;
    for seed in 0..200 {
        let generator = generator(yaml, seed);
        let puzzle = generator.generate_one().unwrap();
        let text = serde_json::to_string(&puzzle.config).unwrap();
        let config: serde_json::Value = serde_json::from_str(&text).unwrap();
        let replayed = generator
            .replay(Configuration::from_json(config).unwrap(), &[])
            .unwrap();
        assert_eq!(puzzle.problem, replayed.problem, "seed {seed}");
        assert_eq!(puzzle.answer, replayed.answer, "seed {seed}");
    }
}
