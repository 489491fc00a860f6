use std::error::Error as StdError;
use std::fmt;

/// Where in the source an error/warning was reported from.
///
/// The real line/column bookkeeping lives in `AssemblerFront`; the core only
/// carries whatever position the front-end handed it at report time.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct SourcePos {
  pub file: Option<String>,
  pub line: u32,
  pub column: u32,
}

impl fmt::Display for SourcePos {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.file {
      Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
      None => write!(f, "{}:{}", self.line, self.column),
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
  /// Malformed directive arguments, unbalanced clauses, unknown token.
  Syntax,
  /// Directive used in the wrong context, duplicate section/symbol.
  Structural,
  /// Value exceeds an architectural or protocol limit.
  OutOfRange,
  /// Referenced symbol/relocation could not be resolved.
  Unresolved,
  /// Feature requires a newer driver/LLVM version than declared/detected.
  VersionGate,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AsmError {
  pub kind: ErrorKind,
  pub message: String,
  pub pos: Option<SourcePos>,
  pub warning: bool,
}

impl AsmError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    AsmError { kind, message: message.into(), pos: None, warning: false }
  }

  pub fn at(kind: ErrorKind, message: impl Into<String>, pos: SourcePos) -> Self {
    AsmError { kind, message: message.into(), pos: Some(pos), warning: false }
  }

  pub fn warning(mut self) -> Self {
    self.warning = true;
    self
  }

  pub fn structural(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Structural, message)
  }

  pub fn syntax(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Syntax, message)
  }

  pub fn out_of_range(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::OutOfRange, message)
  }

  pub fn unresolved(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Unresolved, message)
  }

  pub fn version_gate(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::VersionGate, message)
  }
}

impl fmt::Display for AsmError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if let Some(pos) = &self.pos {
      write!(f, "{}: ", pos)?;
    }
    write!(f, "{}", self.message)
  }
}

impl StdError for AsmError {}

/// Collects diagnostics over the course of an assembly run, mirroring the
/// "report and continue" propagation policy of spec §7: individual errors
/// don't unwind the directive loop, but flip `good` to false.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
  errors: Vec<AsmError>,
  end_of_assembly: bool,
}

impl DiagnosticSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, err: AsmError) {
    if err.warning {
      log::warn!("{}", err);
    } else {
      log::debug!("reported error: {}", err);
    }
    self.errors.push(err);
  }

  pub fn fatal(&mut self, err: AsmError) {
    self.push(err);
    self.end_of_assembly = true;
  }

  pub fn end_of_assembly(&self) -> bool {
    self.end_of_assembly
  }

  pub fn errors(&self) -> &[AsmError] {
    &self.errors
  }

  /// `good` is false whenever a non-warning diagnostic was recorded.
  pub fn good(&self) -> bool {
    !self.errors.iter().any(|e| !e.warning)
  }
}
