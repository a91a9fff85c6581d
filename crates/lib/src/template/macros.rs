//! Line-anchored `#define` rewriting.
//!
//! Patterns only ever match a single line: horizontal whitespace is spelled
//! `[ \t]` so a match can never run into the next definition, and values
//! stop before any `\r` so CRLF headers keep their line endings.

use regex::{Captures, Regex};

fn define_pattern(name: &str) -> Result<Regex, regex::Error> {
  Regex::new(&format!(
    r"(?m)^([ \t]*#define[ \t]+{}[ \t]+)[^\r\n]+",
    regex::escape(name)
  ))
}

fn commented_define_pattern(name: &str) -> Result<Regex, regex::Error> {
  Regex::new(&format!(
    r"(?m)^([ \t]*)//[ \t]*(#define[ \t]+{}\b[^\r\n]*)",
    regex::escape(name)
  ))
}

/// Rewrite the value of the first `#define NAME` line.
///
/// Returns `None` when the template has no such definition.
pub fn replace_first(content: &str, name: &str, value: &str) -> Result<Option<String>, regex::Error> {
  let re = define_pattern(name)?;
  if !re.is_match(content) {
    return Ok(None);
  }
  Ok(Some(
    re.replacen(content, 1, |caps: &Captures<'_>| format!("{}{}", &caps[1], value))
      .into_owned(),
  ))
}

/// Rewrite the value of every `#define NAME` line.
///
/// Returns `None` when the template has no such definition.
pub fn replace_all(content: &str, name: &str, value: &str) -> Result<Option<String>, regex::Error> {
  let re = define_pattern(name)?;
  if !re.is_match(content) {
    return Ok(None);
  }
  Ok(Some(
    re.replace_all(content, |caps: &Captures<'_>| format!("{}{}", &caps[1], value))
      .into_owned(),
  ))
}

/// Activate `// #define NAME ...` lines by dropping the comment marker.
///
/// Lines that are already active are left alone, so this is a no-op the
/// second time around.
pub fn uncomment(content: &str, name: &str) -> Result<String, regex::Error> {
  Ok(
    commented_define_pattern(name)?
      .replace_all(content, |caps: &Captures<'_>| format!("{}{}", &caps[1], &caps[2]))
      .into_owned(),
  )
}

/// Quote a value as a C string literal.
///
/// ASCII control characters are escaped so the literal always stays on one
/// line. Other control bytes use three-digit octal, which unlike `\x` cannot
/// swallow a following hex digit.
pub fn c_string(value: &str) -> String {
  let mut quoted = String::with_capacity(value.len() + 2);
  quoted.push('"');
  for c in value.chars() {
    match c {
      '\\' => quoted.push_str("\\\\"),
      '"' => quoted.push_str("\\\""),
      '\n' => quoted.push_str("\\n"),
      '\r' => quoted.push_str("\\r"),
      '\t' => quoted.push_str("\\t"),
      c if c.is_ascii_control() => quoted.push_str(&format!("\\{:03o}", c as u32)),
      _ => quoted.push(c),
    }
  }
  quoted.push('"');
  quoted
}

/// Convert `"192.168.1.50"` to `"192, 168, 1, 50"` for an initializer-list macro.
///
/// Anything that does not split into exactly four parts yields `None`.
pub fn ip_to_octets(ip: &str) -> Option<String> {
  let parts: Vec<&str> = ip.split('.').collect();
  if parts.len() != 4 {
    return None;
  }
  Some(parts.join(", "))
}
