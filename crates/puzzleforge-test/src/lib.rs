//! Shared test fixtures for PuzzleForge crates.
//!
//! This crate provides specification documents and settings for testing.
//! It does NOT depend on `puzzleforge-schema` so the schema crate can use
//! the fixtures in its own tests.
//!
//! - [`specs`] - YAML specification documents, one per language feature
//! - [`settings`] - Generator settings tuned for fast, reproducible tests
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! puzzleforge-test = { workspace = true }
//! ```
//!
//! Then import the fixtures you need:
//!
//! ```ignore
//! use puzzleforge_test::specs::{LAMPS, SELECTION};
//! use puzzleforge_test::settings::seeded;
//! ```

pub mod settings;
pub mod specs;

pub use settings::seeded;
