//! Terminal and JSON output for fwgen commands.
//!
//! Status lines go to stdout (errors and warnings to stderr) with a colored
//! marker. With `-o json` a command prints one pretty JSON document instead.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use fwgen_lib::warning::PipelineWarning;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;

/// Firmware image size, scaled and with the exact byte count alongside.
pub fn format_size(bytes: u64) -> String {
  if bytes >= MIB {
    format!("{:.2} MiB ({bytes} bytes)", bytes as f64 / MIB as f64)
  } else if bytes >= KIB {
    format!("{:.1} KiB ({bytes} bytes)", bytes as f64 / KIB as f64)
  } else {
    format!("{bytes} bytes")
  }
}

/// Wall-clock time of a build, to the millisecond.
pub fn format_elapsed(elapsed: Duration) -> String {
  let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
  humantime::format_duration(Duration::from_millis(millis)).to_string()
}

pub fn print_success(message: &str) {
  println!("{} {message}", "✓".if_supports_color(Stream::Stdout, |s| s.green()));
}

pub fn print_info(message: &str) {
  println!("{} {message}", "•".if_supports_color(Stream::Stdout, |s| s.blue()));
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    "✗".if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

/// Non-fatal pipeline warnings, one per line on stderr.
pub fn print_warnings(warnings: &[PipelineWarning]) {
  for warning in warnings {
    let message = warning.to_string();
    eprintln!(
      "{} {}",
      "⚠".if_supports_color(Stream::Stderr, |s| s.yellow()),
      message.if_supports_color(Stream::Stderr, |s| s.yellow())
    );
  }
}

/// Indented `label: value` line under a status line.
pub fn print_stat(label: &str, value: &str) {
  let label = format!("{:<10}", format!("{label}:"));
  println!("  {}{value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}
