//! Generated puzzle records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use puzzleforge_core::Result;
use serde::{Deserialize, Serialize};

/// Difficulty parameters of one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Assertions handed to the solver in the final solving phase.
    pub cond_num: usize,
    /// Solver unknowns declared by defined symbols.
    pub sym_num: usize,
    /// Declared sort names of the defined symbols.
    pub sym_type: Vec<String>,
    /// The optimal model, when the specification optimizes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_solution: Option<String>,
}

/// One generated puzzle: text, answer, and the configuration that replays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub problem: String,
    pub answer: String,
    pub parameters: Parameters,
    pub config: serde_json::Value,
}

impl Puzzle {
    /// Separator between the answers of consecutive queries.
    pub const ANSWER_SEPARATOR: &'static str = "====";

    pub fn answers(&self) -> Vec<&str> {
        if self.answer.is_empty() {
            return Vec::new();
        }
        self.answer.split(Self::ANSWER_SEPARATOR).collect()
    }

    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| std::io::Error::other(e).into())
    }
}

/// Writes one JSON record per line.
pub fn write_jsonl(path: impl AsRef<Path>, puzzles: &[Puzzle]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for puzzle in puzzles {
        writeln!(out, "{}", puzzle.to_json_line()?)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn puzzle(opt_solution: Option<String>) -> Puzzle {
        Puzzle {
            problem: "p".into(),
            answer: "4====B".into(),
            parameters: Parameters {
                cond_num: 2,
                sym_num: 5,
                sym_type: vec!["bool".into()],
                opt_solution,
            },
            config: json!({"n": 5}),
        }
    }

    #[test]
    fn test_opt_solution_is_omitted_when_absent() {
        let line = puzzle(None).to_json_line().unwrap();
        assert!(!line.contains("opt_solution"));
        let line = puzzle(Some("[x = 1]".into())).to_json_line().unwrap();
        assert!(line.contains(r#""opt_solution":"[x = 1]""#));
    }

    #[test]
    fn test_answers_split_on_separator() {
        assert_eq!(puzzle(None).answers(), ["4", "B"]);
    }

    #[test]
    fn test_jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        write_jsonl(&path, &[puzzle(None), puzzle(None)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: Puzzle = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(back, puzzle(None));
    }
}
