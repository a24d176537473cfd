//! PuzzleForge - declarative puzzle generation
//!
//! A puzzle specification names random variables, solver unknowns, sampled
//! symbols, conditions, and queries. [`Emitter`] compiles it once into a
//! [`Program`]; [`Interpreter`] runs the program either drawing fresh random
//! choices or replaying a recorded [`Configuration`]. [`Generator`] ties the
//! two together with retries and parallel batches.
//!
//! # Example
//!
//! ```
//! use puzzleforge::{Generator, GeneratorConfig, Specification};
//!
//! let spec = Specification::from_yaml_str(r#"
//! variables:
//!   n: {type: int, domain: "[2, 4]"}
//! calc_solution: false
//! queries:
//!   twice:
//!     desc: "What is twice {n}?"
//!     ans_formula: "2 * n"
//!     ans_assertion: "True"
//!     ans_text: "_ans"
//! desc: "{queries}"
//! "#).unwrap();
//!
//! let generator = Generator::new(&spec, GeneratorConfig::new().with_random_seed(1)).unwrap();
//! let puzzle = generator.generate_one().unwrap();
//! let n = puzzle.config["n"].as_i64().unwrap();
//! assert_eq!(puzzle.answer, (2 * n).to_string());
//! ```

pub mod configuration;
pub mod emitter;
pub mod generator;
pub mod interpreter;
pub mod program;
pub mod record;

pub use configuration::{read_configurations, Configuration};
pub use emitter::Emitter;
pub use generator::Generator;
pub use interpreter::{Interpreter, Mode};
pub use program::{Instruction, Program};
pub use record::{write_jsonl, Parameters, Puzzle};

pub use puzzleforge_config::GeneratorConfig;
pub use puzzleforge_core::{PuzzleError, Result};
pub use puzzleforge_schema::Specification;

#[cfg(feature = "console")]
pub use puzzleforge_console::init as init_console;
