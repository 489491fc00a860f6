//! §4.2 `ValueParser`: shared argument-parsing primitives used by every
//! dialect's pseudo-op handlers. Each returns the parsed value together with
//! the remaining unconsumed input, and reports diagnostics through the
//! caller-supplied sink rather than failing outright where the original
//! continues parsing (e.g. a missing comma still yields a value).

use crate::error::AsmError;
use crate::front::{AssemblerFront, ResolvedValue};

/// Skip leading ASCII whitespace (but not newlines; a "line" here is always
/// a single logical statement).
fn skip_ws(s: &str) -> &str {
  s.trim_start_matches(|c: char| c == ' ' || c == '\t')
}

/// `commaThen`: consume an optional/required separating comma.
pub fn comma_then(line: &str, required: bool) -> Result<&str, AsmError> {
  let rest = skip_ws(line);
  if let Some(rest) = rest.strip_prefix(',') {
    Ok(skip_ws(rest))
  } else if required {
    Err(AsmError::syntax("expected ','"))
  } else {
    Ok(rest)
  }
}

fn next_token(line: &str) -> (&str, &str) {
  let line = skip_ws(line);
  let end = line
    .find(|c: char| c == ',' || c == ' ' || c == '\t' || c == '\n')
    .unwrap_or(line.len());
  (&line[..end], &line[end..])
}

/// `absoluteValue`: parse an integer via the expression evaluator, with a
/// range warning for the listed bit-widths.
pub fn absolute_value(
  front: &mut dyn AssemblerFront,
  line: &str,
  bits: Option<u8>,
  signed: bool,
) -> Result<(i64, &str), AsmError> {
  let (ResolvedValue { value, section }, rest) = front.parse_expression(line)?;
  if section.is_some() {
    return Err(AsmError::syntax("expected an absolute value, got a relocatable expression"));
  }
  if let Some(bits) = bits {
    if !matches!(bits, 2 | 7 | 8 | 16 | 32 | 64) {
      return Ok((value, rest));
    }
    let in_range = if signed {
      let lo = -(1i64 << (bits - 1));
      let hi = (1i64 << (bits - 1)) - 1;
      value >= lo && value <= hi
    } else if bits == 64 {
      true
    } else {
      let hi = (1i64 << bits) - 1;
      value >= 0 && value <= hi
    };
    if !in_range {
      front.print_warning(AsmError::out_of_range(format!(
        "value {} truncated to {} bits",
        value, bits
      )).warning());
    }
  }
  Ok((value, rest))
}

/// `string`: a decoded C-style quoted string.
pub fn string(front: &mut dyn AssemblerFront, line: &str) -> Result<(String, &str), AsmError> {
  front.parse_string(skip_ws(line))
}

/// `name`: an identifier, optionally capped at `max_len` characters.
pub fn name<'a>(line: &'a str, max_len: Option<usize>) -> Result<(String, &'a str), AsmError> {
  let line = skip_ws(line);
  let end = line
    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
    .unwrap_or(line.len());
  if end == 0 {
    return Err(AsmError::syntax("expected an identifier"));
  }
  if let Some(max_len) = max_len {
    if end > max_len {
      return Err(AsmError::syntax(format!("identifier longer than {} characters", max_len)));
    }
  }
  Ok((line[..end].to_string(), &line[end..]))
}

/// `enumeration`: select a value from a sorted `(keyword, value)` table.
pub fn enumeration<'a, T: Copy>(
  line: &'a str,
  table: &[(&str, T)],
) -> Result<(T, &'a str), AsmError> {
  let (tok, rest) = next_token(line);
  if tok.is_empty() {
    return Err(AsmError::syntax("expected a keyword"));
  }
  match table.binary_search_by(|(k, _)| k.cmp(&tok)) {
    Ok(idx) => Ok((table[idx].1, rest)),
    Err(_) => Err(AsmError::syntax(format!("unknown keyword '{}'", tok))),
  }
}

/// `dimensions`: a mask over {x=1, y=2, z=4} parsed from any subset of
/// `"xyz"`.
pub fn dimensions(line: &str) -> Result<(u8, &str), AsmError> {
  let (tok, rest) = next_token(line);
  if tok.is_empty() {
    return Err(AsmError::syntax("expected a dimension list (subset of 'xyz')"));
  }
  let mut mask = 0u8;
  for c in tok.chars() {
    mask |= match c {
      'x' => 1,
      'y' => 2,
      'z' => 4,
      _ => return Err(AsmError::syntax(format!("invalid dimension character '{}'", c))),
    };
  }
  Ok((mask, rest))
}

/// `cws`: a 3-tuple `[u32; 3]` with defaults of 1 and a "must not be zero"
/// check.
pub fn cws(front: &mut dyn AssemblerFront, line: &str) -> Result<([u32; 3], &str), AsmError> {
  let mut out = [1u32, 1, 1];
  let mut rest = skip_ws(line);
  for (i, slot) in out.iter_mut().enumerate() {
    if rest.is_empty() {
      break;
    }
    let (v, r) = absolute_value(front, rest, Some(32), false)?;
    if v == 0 {
      return Err(AsmError::out_of_range("CWS component must not be zero"));
    }
    *slot = v as u32;
    rest = r;
    if i < 2 {
      rest = comma_then(rest, false)?;
    }
  }
  Ok((out, rest))
}

/// `machineQuad`: `(kind, major, minor, stepping)` as four 16-bit
/// comma-separated values.
pub fn machine_quad(
  front: &mut dyn AssemblerFront,
  line: &str,
) -> Result<((u16, u16, u16, u16), &str), AsmError> {
  let (kind, rest) = absolute_value(front, line, Some(16), false)?;
  let rest = comma_then(rest, true)?;
  let (major, rest) = absolute_value(front, rest, Some(16), false)?;
  let rest = comma_then(rest, true)?;
  let (minor, rest) = absolute_value(front, rest, Some(16), false)?;
  let rest = comma_then(rest, true)?;
  let (stepping, rest) = absolute_value(front, rest, Some(16), false)?;
  Ok(((kind as u16, major as u16, minor as u16, stepping as u16), rest))
}

/// `codeVersion`: `(major, minor)` 16-bit pair.
pub fn code_version(
  front: &mut dyn AssemblerFront,
  line: &str,
) -> Result<((u16, u16), &str), AsmError> {
  let (major, rest) = absolute_value(front, line, Some(16), false)?;
  let rest = comma_then(rest, true)?;
  let (minor, rest) = absolute_value(front, rest, Some(16), false)?;
  Ok(((major as u16, minor as u16), rest))
}

/// `reservedXgprs`: `(first, count)` with an architecture-bounded range
/// check against `max`.
pub fn reserved_xgprs(
  front: &mut dyn AssemblerFront,
  line: &str,
  max: u32,
) -> Result<((u16, u16), &str), AsmError> {
  let (first, rest) = absolute_value(front, line, Some(16), false)?;
  let rest = comma_then(rest, true)?;
  let (count, rest) = absolute_value(front, rest, Some(16), false)?;
  if first < 0 || count < 0 || (first as u32) + (count as u32) > max {
    return Err(AsmError::out_of_range(format!(
      "reserved register range {}..{} exceeds the architectural limit of {}",
      first,
      first + count,
      max
    )));
  }
  Ok(((first as u16, count as u16), rest))
}
