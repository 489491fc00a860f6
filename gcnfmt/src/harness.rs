//! A minimal in-process `AssemblerFront`/`IsaEncoder` implementation, just
//! enough to drive a dialect handler through its public API from a test:
//! numeric/string/symbol-name parsing and a diagnostic sink, nothing of the
//! real macro engine, expression evaluator or instruction encoder.

use gcnfmt_core::front::{AssemblerFront, IsaEncoder, RegAllocSnapshot, ResolvedValue};
use gcnfmt_core::{AsmError, DiagnosticSink, SourcePos};

fn skip_ws(s: &str) -> &str {
  s.trim_start_matches(|c: char| c == ' ' || c == '\t')
}

/// A bare-bones `AssemblerFront`. `parse_expression`/`parse_string` return a
/// remainder tied to `&mut self` (the trait's elided lifetimes bind the
/// output to the `&mut self` borrow, not to the input line), so the parsed
/// remainder is copied into an owned buffer on `self` and the return value
/// borrows that buffer instead of the caller's input.
pub struct TestFront {
  pub device_type: String,
  pub is_64bit: bool,
  pub driver_version: Option<u32>,
  pub llvm_version: Option<u32>,
  pub policy_version: u32,
  pub add_symbols: bool,
  pub diagnostics: DiagnosticSink,
  expr_remainder: String,
  string_remainder: String,
}

impl TestFront {
  pub fn new(device_type: impl Into<String>) -> Self {
    TestFront {
      device_type: device_type.into(),
      is_64bit: true,
      driver_version: None,
      llvm_version: None,
      policy_version: 0,
      add_symbols: false,
      diagnostics: DiagnosticSink::new(),
      expr_remainder: String::new(),
      string_remainder: String::new(),
    }
  }

  pub fn with_driver_version(mut self, v: u32) -> Self {
    self.driver_version = Some(v);
    self
  }

  pub fn with_llvm_version(mut self, v: u32) -> Self {
    self.llvm_version = Some(v);
    self
  }

  pub fn with_policy_version(mut self, v: u32) -> Self {
    self.policy_version = v;
    self
  }
}

impl AssemblerFront for TestFront {
  fn device_type_name(&self) -> &str {
    &self.device_type
  }

  fn is_64bit(&self) -> bool {
    self.is_64bit
  }

  fn driver_version(&self) -> Option<u32> {
    self.driver_version
  }

  fn llvm_version(&self) -> Option<u32> {
    self.llvm_version
  }

  fn policy_version(&self) -> u32 {
    self.policy_version
  }

  fn add_symbols_flag(&self) -> bool {
    self.add_symbols
  }

  fn source_pos(&self) -> SourcePos {
    SourcePos::default()
  }

  fn parse_expression(&mut self, line: &str) -> Result<(ResolvedValue, &str), AsmError> {
    let trimmed = skip_ws(line);
    let (digits, rest) = if let Some(hex) = trimmed.strip_prefix("0x") {
      let end = hex.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(hex.len());
      let value = i64::from_str_radix(&hex[..end], 16)
        .map_err(|_| AsmError::syntax("expected a hexadecimal integer"))?;
      (value, &hex[end..])
    } else {
      let neg = trimmed.starts_with('-');
      let body = if neg { &trimmed[1..] } else { trimmed };
      let end = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
      if end == 0 {
        return Err(AsmError::syntax("expected an integer expression"));
      }
      let mut value: i64 = body[..end].parse().map_err(|_| AsmError::syntax("integer literal out of range"))?;
      if neg {
        value = -value;
      }
      (value, &body[end..])
    };
    self.expr_remainder = rest.to_string();
    Ok((ResolvedValue { value: digits, section: None }, self.expr_remainder.as_str()))
  }

  fn parse_string(&mut self, line: &str) -> Result<(String, &str), AsmError> {
    let trimmed = skip_ws(line);
    let body = trimmed.strip_prefix('"').ok_or_else(|| AsmError::syntax("expected a quoted string"))?;
    let end = body.find('"').ok_or_else(|| AsmError::syntax("unterminated string literal"))?;
    self.string_remainder = body[end + 1..].to_string();
    Ok((body[..end].to_string(), self.string_remainder.as_str()))
  }

  fn parse_symbol_name<'a>(&mut self, line: &'a str) -> Result<(String, &'a str), AsmError> {
    let trimmed = skip_ws(line);
    let end = trimmed
      .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
      .unwrap_or(trimmed.len());
    if end == 0 {
      return Err(AsmError::syntax("expected a symbol name"));
    }
    Ok((trimmed[..end].to_string(), &trimmed[end..]))
  }

  fn print_error(&mut self, err: AsmError) {
    self.diagnostics.push(err);
  }

  fn print_warning(&mut self, err: AsmError) {
    self.diagnostics.push(err.warning());
  }
}

/// A bare-bones `IsaEncoder`: register snapshots round-trip, alignment
/// filling is a no-op since no real code position is tracked.
#[derive(Default)]
pub struct TestEncoder {
  regs: RegAllocSnapshot,
}

impl IsaEncoder for TestEncoder {
  fn get_allocated_registers(&self) -> RegAllocSnapshot {
    self.regs
  }

  fn set_allocated_registers(&mut self, snapshot: RegAllocSnapshot) {
    self.regs = snapshot;
  }

  fn fill_alignment(&self, _n: u64) -> u64 {
    0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_decimal_and_hex_expressions() {
    let mut front = TestFront::new("gfx803");
    let (v, rest) = front.parse_expression("16,next").unwrap();
    assert_eq!(v.value, 16);
    assert_eq!(rest, ",next");

    let (v, _) = front.parse_expression("0x000C0040").unwrap();
    assert_eq!(v.value, 0x000C0040);
  }

  #[test]
  fn parses_negative_integers() {
    let mut front = TestFront::new("gfx803");
    let (v, _) = front.parse_expression("-3").unwrap();
    assert_eq!(v.value, -3);
  }

  #[test]
  fn parses_quoted_strings() {
    let mut front = TestFront::new("gfx803");
    let (s, rest) = front.parse_string("\"hello\" tail").unwrap();
    assert_eq!(s, "hello");
    assert_eq!(rest, " tail");
  }

  #[test]
  fn parses_symbol_names() {
    let mut front = TestFront::new("gfx803");
    let (name, rest) = front.parse_symbol_name("ext, extGot").unwrap();
    assert_eq!(name, "ext");
    assert_eq!(rest, ", extGot");
  }
}
