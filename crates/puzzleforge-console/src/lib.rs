//! Colorful console output for puzzle generation.
//!
//! Provides a custom `tracing` layer that formats generator and solver
//! events with colors.
//!
//! ## Log Levels
//!
//! - **INFO**: Lifecycle events (generation start/end, solver phases, replay)
//! - **WARN**: Skipped replay configurations
//! - **DEBUG**: Regeneration attempts and solution counts

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Package version for banner display.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "puzzleforge=info";

/// Initializes the console output.
///
/// Safe to call multiple times - only the first call has effect.
/// Prints the PuzzleForge banner and sets up tracing.
pub fn init() {
    INIT.get_or_init(|| {
        EPOCH.get_or_init(Instant::now);
        print_banner();

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(PuzzleConsoleLayer)
            .try_init();
    });
}

// Seconds since init.
fn elapsed_secs() -> f64 {
    EPOCH.get().map_or(0.0, |epoch| epoch.elapsed().as_secs_f64())
}

fn print_banner() {
    let banner = r#"
 ____                _      _____
|  _ \ _   _ _______| | ___|  ___|__  _ __ __ _  ___
| |_) | | | |_  /_  / |/ _ \ |_ / _ \| '__/ _` |/ _ \
|  __/| |_| |/ / / /| |  __/  _| (_) | | | (_| |  __/
|_|    \__,_/___/___|_|\___|_|  \___/|_|  \__, |\___|
                                          |___/
"#;

    let version_line = format!("                   v{VERSION} - Declarative Puzzle Generator\n");

    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", banner.bright_cyan());
    let _ = writeln!(stdout, "{}", version_line.bright_white().bold());
    let _ = stdout.flush();
}

/// A tracing layer that formats generator events with colors.
pub struct PuzzleConsoleLayer;

impl<S: Subscriber> Layer<S> for PuzzleConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("puzzleforge") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor, *metadata.level());
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    phase: Option<String>,
    outcome: Option<String>,
    kind: Option<String>,
    error: Option<String>,
    seed: Option<String>,
    count: Option<u64>,
    skipped: Option<u64>,
    attempt: Option<u64>,
    index: Option<u64>,
    duration_ms: Option<u64>,
    continuous: Option<bool>,
    success: Option<bool>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        let s = s.trim_matches('"').to_string();
        match field.name() {
            "event" => self.event = Some(s),
            "phase" => self.phase = Some(s),
            "outcome" => self.outcome = Some(s),
            "kind" => self.kind = Some(s),
            "error" => self.error = Some(s),
            "seed" => self.seed = Some(s),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "count" => self.count = Some(value),
            "skipped" => self.skipped = Some(value),
            "attempt" => self.attempt = Some(value),
            "index" => self.index = Some(value),
            "duration_ms" => self.duration_ms = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_u64(field, value.max(0) as u64);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "continuous" => self.continuous = Some(value),
            "success" => self.success = Some(value),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_string()),
            "phase" => self.phase = Some(value.to_string()),
            "outcome" => self.outcome = Some(value.to_string()),
            "kind" => self.kind = Some(value.to_string()),
            "error" => self.error = Some(value.to_string()),
            _ => {}
        }
    }
}

fn format_event(v: &EventVisitor, level: Level) -> String {
    match v.event.as_deref().unwrap_or("") {
        "generation_start" => format_generation_start(v),
        "generation_end" => format_generation_end(v),
        "phase_start" => format_phase_start(v),
        "phase_end" => format_phase_end(v),
        "regenerate" => format_regenerate(v, level),
        "replay_skipped" => format_replay_skipped(v),
        "replay_end" => format_replay_end(v),
        _ => String::new(),
    }
}

fn format_elapsed() -> String {
    format!("{:>7.3}s", elapsed_secs())
        .bright_black()
        .to_string()
}

fn format_count(n: u64) -> String {
    n.to_formatted_string(&Locale::en)
}

fn format_generation_start(v: &EventVisitor) -> String {
    let count = v.count.unwrap_or(0);
    let mode = if v.continuous.unwrap_or(false) {
        "continuous"
    } else {
        "single-shot"
    };
    let mut output = format!(
        "{} {} Generating │ {} puzzles │ {}",
        format_elapsed(),
        "▶".bright_green().bold(),
        format_count(count).bright_yellow(),
        mode.bright_magenta()
    );
    match v.seed.as_deref() {
        Some(seed) if seed != "None" => {
            let seed = seed.trim_start_matches("Some(").trim_end_matches(')');
            output.push_str(&format!(" │ seed {}", seed.bright_yellow()));
        }
        _ => {}
    }
    output
}

fn format_generation_end(v: &EventVisitor) -> String {
    let count = v.count.unwrap_or(0);
    let duration = v.duration_ms.unwrap_or(0);
    let status = if v.success.unwrap_or(false) {
        "DONE".bright_green().bold().to_string()
    } else {
        "FAILED".bright_red().bold().to_string()
    };
    format!(
        "{} {} Generation complete │ {} puzzles │ {} │ {}",
        format_elapsed(),
        "■".bright_cyan().bold(),
        format_count(count).white(),
        format_duration_ms(duration).yellow(),
        status
    )
}

fn format_phase_start(v: &EventVisitor) -> String {
    let phase = v.phase.as_deref().unwrap_or("Unknown");
    format!(
        "{} {} {} started",
        format_elapsed(),
        "▶".bright_blue(),
        phase.white().bold()
    )
}

fn format_phase_end(v: &EventVisitor) -> String {
    let phase = v.phase.as_deref().unwrap_or("Unknown");
    let outcome = v.outcome.as_deref().unwrap_or("Unknown");
    let duration = v.duration_ms.unwrap_or(0);
    let outcome = if outcome == "Done" {
        outcome.bright_green().to_string()
    } else {
        outcome.bright_red().to_string()
    };
    format!(
        "{} {} {} ended │ {} │ {}",
        format_elapsed(),
        "◀".bright_blue(),
        phase.white().bold(),
        format_duration_ms(duration).yellow(),
        outcome
    )
}

fn format_regenerate(v: &EventVisitor, level: Level) -> String {
    if level < Level::DEBUG {
        return String::new();
    }
    format!(
        "{} {} Regenerating │ attempt {} │ {}",
        format_elapsed(),
        "↻".yellow(),
        format_count(v.attempt.unwrap_or(0)).white(),
        v.kind.as_deref().unwrap_or("error").bright_black()
    )
}

fn format_replay_skipped(v: &EventVisitor) -> String {
    format!(
        "{} {} Skipped configuration #{} │ {} │ {}",
        format_elapsed(),
        "✗".bright_red(),
        v.index.unwrap_or(0),
        v.kind.as_deref().unwrap_or("error").bright_red(),
        v.error.as_deref().unwrap_or("").bright_black()
    )
}

fn format_replay_end(v: &EventVisitor) -> String {
    let skipped = v.skipped.unwrap_or(0);
    let mut output = format!(
        "{} {} Replay complete │ {} puzzles",
        format_elapsed(),
        "■".bright_cyan().bold(),
        format_count(v.count.unwrap_or(0)).white()
    );
    if skipped > 0 {
        output.push_str(&format!(" │ {} skipped", format_count(skipped).bright_red()));
    }
    output
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration_ms(250), "250ms");
        assert_eq!(format_duration_ms(1500), "1.50s");
        assert_eq!(format_duration_ms(125_000), "2m 5s");
    }

    #[test]
    fn test_unknown_events_are_silent() {
        let visitor = EventVisitor {
            event: Some("sampling_retry".into()),
            ..EventVisitor::default()
        };
        assert!(format_event(&visitor, Level::INFO).is_empty());
    }

    #[test]
    fn test_regenerate_hidden_at_info() {
        let visitor = EventVisitor {
            event: Some("regenerate".into()),
            attempt: Some(2),
            ..EventVisitor::default()
        };
        assert!(format_event(&visitor, Level::INFO).is_empty());
        assert!(format_event(&visitor, Level::DEBUG).contains("Regenerating"));
    }
}
