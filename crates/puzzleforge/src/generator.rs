//! Single-shot, continuous, and parallel puzzle generation.

use std::io;
use std::path::Path;
use std::time::Instant;

use puzzleforge_config::GeneratorConfig;
use puzzleforge_core::Result;
use puzzleforge_schema::Specification;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::configuration::{read_configurations, Configuration};
use crate::emitter::Emitter;
use crate::interpreter::{Interpreter, Mode};
use crate::program::Program;
use crate::record::Puzzle;

/// Generates and replays puzzles from one compiled specification.
#[derive(Debug, Clone)]
pub struct Generator {
    program: Program,
    interpreter: Interpreter,
    settings: GeneratorConfig,
}

impl Generator {
    /// Compiles `spec`. Fails on any schema or parse error.
    pub fn new(spec: &Specification, settings: GeneratorConfig) -> Result<Self> {
        let program = Emitter::emit(spec)?;
        Ok(Self {
            interpreter: Interpreter::new(&settings),
            program,
            settings,
        })
    }

    /// Loads and compiles a YAML, JSON, or TOML specification file.
    pub fn from_path(path: impl AsRef<Path>, settings: GeneratorConfig) -> Result<Self> {
        Self::new(&Specification::load(path)?, settings)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn settings(&self) -> &GeneratorConfig {
        &self.settings
    }

    /// One attempt. Any failure is returned as is.
    pub fn generate_one(&self) -> Result<Puzzle> {
        self.interpreter
            .run(&self.program, Mode::Generate(self.worker_rng(0)))
    }

    /// Retries after recoverable failures, at most `max_regenerations` times.
    pub fn generate_continuous(&self) -> Result<Puzzle> {
        self.continuous(&mut self.worker_rng(0))
    }

    /// Generates `count` puzzles in parallel. Worker `i` draws from its own
    /// stream, seeded with `seed + i` when a seed is configured.
    pub fn generate_batch(&self, count: usize, continuous: bool) -> Result<Vec<Puzzle>> {
        let started = Instant::now();
        info!(
            event = "generation_start",
            count = count as u64,
            continuous,
            seed = ?self.settings.random_seed,
        );

        let work = || {
            (0..count)
                .into_par_iter()
                .map(|i| {
                    let mut rng = self.worker_rng(i as u64);
                    if continuous {
                        self.continuous(&mut rng)
                    } else {
                        self.interpreter.run(&self.program, Mode::Generate(rng))
                    }
                })
                .collect::<Result<Vec<_>>>()
        };
        let result = match self.settings.generation.threads {
            Some(threads) => ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(io::Error::other)?
                .install(work),
            None => work(),
        };

        info!(
            event = "generation_end",
            count = result.as_ref().map_or(0, Vec::len) as u64,
            duration_ms = started.elapsed().as_millis() as u64,
            success = result.is_ok(),
        );
        result
    }

    /// Re-runs the program against a recorded configuration. Names in
    /// `spec_controlled` are recomputed instead of read back.
    pub fn replay(&self, configuration: Configuration, spec_controlled: &[String]) -> Result<Puzzle> {
        self.interpreter.run(
            &self.program,
            Mode::Replay {
                configuration,
                spec_controlled: spec_controlled.to_vec(),
            },
        )
    }

    /// Replays every configuration in a file, skipping the ones that fail.
    pub fn replay_file(&self, path: impl AsRef<Path>, spec_controlled: &[String]) -> Result<Vec<Puzzle>> {
        let configurations = read_configurations(path)?;
        let total = configurations.len();
        let mut puzzles = Vec::with_capacity(total);
        for (index, configuration) in configurations.into_iter().enumerate() {
            match self.replay(configuration, spec_controlled) {
                Ok(puzzle) => puzzles.push(puzzle),
                Err(e) => warn!(
                    event = "replay_skipped",
                    index = index as u64,
                    kind = e.kind(),
                    error = %e,
                ),
            }
        }
        info!(
            event = "replay_end",
            count = puzzles.len() as u64,
            skipped = (total - puzzles.len()) as u64,
        );
        Ok(puzzles)
    }

    fn continuous(&self, rng: &mut ChaCha8Rng) -> Result<Puzzle> {
        let limit = self.settings.generation.max_regenerations;
        let mut attempt = 0;
        loop {
            let seed = rng.next_u64();
            match self.interpreter.run(&self.program, Mode::generate(seed)) {
                Ok(puzzle) => return Ok(puzzle),
                Err(e) if e.is_recoverable() && attempt < limit => {
                    attempt += 1;
                    debug!(event = "regenerate", attempt = attempt as u64, kind = e.kind(), error = %e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn worker_rng(&self, worker: u64) -> ChaCha8Rng {
        match self.settings.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(worker)),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }
}
