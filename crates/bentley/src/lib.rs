//! ## Features
//!
//! - Status lines for people (info, warn, error, debug, success) with colored prefixes
//! - Multi-line message support with consistent formatting
//! - Banner helpers for framing generated content on the terminal
//! - `tracing` subscriber setup for structured diagnostics
//! - All output to stderr, so stdout stays clean for piping generated messages
//!
//! ## Usage
//!
//! Call `init(verbose)` once at startup, then use `info()`, `warn()`, `error()`,
//! `debug()`, `success()` for status lines and the `tracing` macros for diagnostics.

use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Environment variable holding a `tracing` filter directive, e.g. `followup=debug`
pub const LOG_ENV: &str = "FOLLOWUP_LOG";

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Initialize Bentley - installs the stderr `tracing` subscriber and sets verbosity.
///
/// Returns `false` when a global subscriber was already installed (tests, repeated calls).
pub fn init(verbose: bool) -> bool {
  set_verbose(verbose);

  let filter = EnvFilter::try_from_env(LOG_ENV)
    .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr).with_target(true).compact())
    .with(filter)
    .try_init()
    .is_ok()
}

/// Filter used when `FOLLOWUP_LOG` is unset
pub fn default_directive(verbose: bool) -> &'static str {
  if verbose {
    "warn,followup=debug,bentley=debug"
  } else {
    "warn"
  }
}

pub fn set_verbose(verbose: bool) {
  VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
  VERBOSE.load(Ordering::Relaxed)
}

/// Core logging function that handles the actual output
pub fn log(message: &str) {
  for line in message.lines() {
    eprintln!("{line}");
  }
}

/// Format a colored prefix for log messages
fn format_prefix(color: Color, prefix: &str) -> String {
  let pad = 7usize.saturating_sub(prefix.len() + 2);
  format!("[{}]{:<pad$}", prefix.color(color).bold(), "")
}

fn prefixed(color: Color, prefix: &str, message: &str) {
  let prefix = format_prefix(color, prefix);
  for line in message.lines() {
    log(&format!("{prefix} {line}"));
  }
}

/// Create a banner line of the specified length and character
pub fn banner_line(length: usize, char: char) -> String {
  char.to_string().repeat(length)
}

/// Display a message with a banner around it
pub fn as_banner<F>(log_fn: F, message: &str, width: Option<usize>, border_char: Option<char>)
where
  F: Fn(&str),
{
  let width = width.unwrap_or(50);
  let border_char = border_char.unwrap_or('=');

  let banner = banner_line(width, border_char);

  log_fn(&banner);
  log_fn(message);
  log_fn(&banner);
}

/// Info level logging - general information
pub fn info(message: &str) {
  prefixed(Color::Blue, "info", message);
}

/// Warning level logging - something needs attention
pub fn warn(message: &str) {
  prefixed(Color::Yellow, "warn", message);
}

/// Error level logging - something went wrong
pub fn error(message: &str) {
  prefixed(Color::Red, "error", message);
}

/// Debug level logging - only printed with `--verbose`
pub fn debug(message: &str) {
  if is_verbose() {
    prefixed(Color::Magenta, "debug", message);
  }
}

/// Success level logging - something completed successfully
pub fn success(message: &str) {
  prefixed(Color::Green, "sccs", message);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_banner_line_repeats_character() {
    assert_eq!(banner_line(5, '-'), "-----");
    assert_eq!(banner_line(0, '='), "");
  }

  #[test]
  fn test_prefix_is_padded_for_short_levels() {
    colored::control::set_override(false);
    assert_eq!(format_prefix(Color::Blue, "info"), "[info] ");
    assert_eq!(format_prefix(Color::Red, "error"), "[error]");
    colored::control::unset_override();
  }

  #[test]
  fn test_default_directive_depends_on_verbosity() {
    assert_eq!(default_directive(false), "warn");
    assert!(default_directive(true).contains("followup=debug"));
  }

  #[test]
  fn test_as_banner_frames_message() {
    let lines = std::cell::RefCell::new(Vec::new());
    as_banner(|msg| lines.borrow_mut().push(msg.to_string()), "Day 1", Some(3), Some('*'));
    assert_eq!(*lines.borrow(), vec!["***", "Day 1", "***"]);
  }
}
