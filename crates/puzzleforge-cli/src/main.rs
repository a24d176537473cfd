//! `puzzleforge` binary: generate, replay, and check puzzle specifications.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use puzzleforge::{write_jsonl, Generator, GeneratorConfig, Instruction, Program, Puzzle};

#[derive(Parser)]
#[command(name = "puzzleforge", version, about = "Declarative puzzle generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate puzzles from a specification
    Generate {
        /// Specification file (YAML, JSON, or TOML)
        spec: PathBuf,

        /// Number of puzzles
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Output JSONL file (defaults to output.jsonl next to the specification)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Regenerate after recoverable failures (implied when n > 1)
        #[arg(short, long)]
        continuous: bool,

        /// Random seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Generator settings file (TOML or YAML)
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Rebuild puzzles from recorded configurations
    Replay {
        /// Specification file (YAML, JSON, or TOML)
        spec: PathBuf,

        /// A single JSON configuration or a JSONL file of puzzle records
        #[arg(long)]
        config: PathBuf,

        /// Output JSONL file (defaults to output.jsonl next to the specification)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Variables to recompute instead of reading back (repeatable)
        #[arg(short = 'u', long = "update")]
        update: Vec<String>,

        /// Generator settings file (TOML or YAML)
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Validate a specification and print a summary
    Check {
        /// Specification file (YAML, JSON, or TOML)
        spec: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            spec,
            count,
            output,
            continuous,
            seed,
            settings,
        } => {
            puzzleforge::init_console();
            let mut settings = load_settings(settings.as_deref())?;
            if let Some(seed) = seed {
                settings = settings.with_random_seed(seed);
            }
            let generator = compile(&spec, settings)?;
            let puzzles = generator
                .generate_batch(count, continuous || count > 1)
                .context("generation failed")?;
            write_output(&spec, output, &puzzles)?;
        }
        Commands::Replay {
            spec,
            config,
            output,
            update,
            settings,
        } => {
            puzzleforge::init_console();
            let generator = compile(&spec, load_settings(settings.as_deref())?)?;
            let puzzles = generator
                .replay_file(&config, &update)
                .with_context(|| format!("failed to replay {}", config.display()))?;
            write_output(&spec, output, &puzzles)?;
        }
        Commands::Check { spec } => {
            let generator = compile(&spec, GeneratorConfig::default())?;
            println!("{} {}", "✓".bright_green().bold(), spec.display());
            for line in summarize(generator.program()) {
                println!("  {line}");
            }
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<GeneratorConfig> {
    let settings = match path {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    settings.validate().context("invalid generator settings")?;
    Ok(settings)
}

fn compile(spec: &Path, settings: GeneratorConfig) -> Result<Generator> {
    Generator::from_path(spec, settings)
        .with_context(|| format!("failed to compile {}", spec.display()))
}

fn output_path(spec: &Path, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| {
        spec.parent()
            .unwrap_or_else(|| Path::new("."))
            .join("output.jsonl")
    })
}

fn write_output(spec: &Path, output: Option<PathBuf>, puzzles: &[Puzzle]) -> Result<()> {
    let path = output_path(spec, output);
    write_jsonl(&path, puzzles).with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "{} wrote {} puzzles to {}",
        "■".bright_cyan().bold(),
        puzzles.len(),
        path.display()
    );
    Ok(())
}

/// One line per instruction kind, in first-seen order, plus solver facts.
fn summarize(program: &Program) -> Vec<String> {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for instruction in program.instructions() {
        let kind = instruction.kind();
        match counts.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, n)) => *n += 1,
            None => counts.push((kind, 1)),
        }
    }

    let mut lines: Vec<String> = counts
        .into_iter()
        .map(|(kind, n)| format!("{kind}: {n}"))
        .collect();
    let queries: Vec<&str> = program.queries().map(|q| q.name()).collect();
    if !queries.is_empty() {
        lines.push(format!("queries: {}", queries.join(", ")));
    }
    if !program.sym_type().is_empty() {
        lines.push(format!("sorts: {}", program.sym_type().join(", ")));
    }
    let solves = program
        .instructions()
        .iter()
        .any(|i| matches!(i, Instruction::Solve(_)));
    if program.optimizes() {
        lines.push("solver: optimize".to_string());
    } else if solves {
        lines.push(format!("solver: up to {} solutions", program.max_solution()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use puzzleforge::{Emitter, Specification};
    use puzzleforge_test::specs;

    fn program(yaml: &str) -> Program {
        Emitter::emit(&Specification::from_yaml_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_output_defaults_next_to_spec() {
        let path = output_path(Path::new("puzzles/lamps.yaml"), None);
        assert_eq!(path, Path::new("puzzles/output.jsonl"));
        let path = output_path(Path::new("lamps.yaml"), Some(PathBuf::from("out.jsonl")));
        assert_eq!(path, Path::new("out.jsonl"));
    }

    #[test]
    fn test_summary_lists_queries() {
        let lines = summarize(&program(specs::SELECTION));
        assert!(lines.iter().any(|l| l == "queries: which"), "{lines:?}");
        assert!(lines.iter().any(|l| l.starts_with("query: ")));
    }

    #[test]
    fn test_summary_marks_optimization() {
        let lines = summarize(&program(specs::OPTIMIZE_UNIQUE));
        assert!(lines.contains(&"solver: optimize".to_string()));
    }

    #[test]
    fn test_cli_parses_replay_updates() {
        let cli = Cli::try_parse_from([
            "puzzleforge", "replay", "spec.yaml", "--config", "out.jsonl", "-u", "size", "-u", "flag",
        ])
        .unwrap();
        match cli.command {
            Commands::Replay { update, .. } => assert_eq!(update, ["size", "flag"]),
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn test_generate_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join("lamps.yaml");
        std::fs::write(&spec, specs::LAMPS).unwrap();
        let settings = GeneratorConfig::default().with_random_seed(3);
        let puzzles = compile(&spec, settings).unwrap().generate_batch(2, true).unwrap();
        write_output(&spec, None, &puzzles).unwrap();
        let written = std::fs::read_to_string(dir.path().join("output.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
