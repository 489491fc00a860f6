//! §4.6 the `DialectHandler` contract every dialect crate implements, and
//! the shared per-kernel config state machine (§4.6.5).

use crate::error::AsmError;
use crate::front::{AssemblerFront, IsaEncoder, ResolvedValue};
use crate::section::{SectionId, SectionOwner};

/// §3.2 place a directive was found at, passed through so a handler can
/// reject kernel-only directives seen at global scope and vice versa.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StmtPlace {
  Global,
  Inner,
  Kernel,
}

/// §4.6.5: the terminal shape a kernel's config has settled into. Sibling
/// terminal states conflict (`.config` after `.hsaconfig` is an error, and
/// so on) — dialects call [`ConfigShape::merge`] to enforce that.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ConfigShape {
  NoConfig,
  Classic,
  Hsa,
  Explicit,
}

impl ConfigShape {
  /// Attempt to move from `self` into `next`; `NoConfig` accepts anything,
  /// staying in the same terminal state is a no-op, any other transition
  /// is the "edges between sibling terminal states are forbidden" error.
  pub fn merge(self, next: ConfigShape) -> Result<ConfigShape, AsmError> {
    match (self, next) {
      (ConfigShape::NoConfig, _) => Ok(next),
      (a, b) if a == b => Ok(a),
      (a, b) => Err(AsmError::structural(format!(
        "kernel configuration already set to {:?}, cannot also use {:?}",
        a, b
      ))),
    }
  }
}

/// §4.6: the contract every dialect handler (AMDv1, AMDCL2, Gallium, ROCm)
/// implements. The assembler front-end holds exactly one value behind this
/// trait per run (Design Notes §9's tagged union, not runtime type
/// introspection).
pub trait DialectHandler {
  /// `addKernel(name) → KernelId`, returned as the dense index into
  /// whatever kernel-tracking structure the handler keeps.
  fn add_kernel(&mut self, front: &mut dyn AssemblerFront, name: &str) -> Result<u32, AsmError>;

  /// `addSection(name, owner) → SectionId`.
  fn add_section(&mut self, name: &str, owner: SectionOwner) -> Result<SectionId, AsmError>;

  fn section_id_by_name(&self, name: &str, owner: SectionOwner) -> Option<SectionId>;

  fn switch_kernel(&mut self, encoder: &mut dyn IsaEncoder, id: u32) -> Result<(), AsmError>;

  fn switch_section(&mut self, encoder: &mut dyn IsaEncoder, id: SectionId) -> Result<(), AsmError>;

  fn section_flags(&self, id: SectionId) -> crate::section::SectionFlags;

  /// "for the kcode directive group" — whether the current section holds
  /// instructions (as opposed to metadata/config/data).
  fn is_code_section(&self) -> bool;

  /// `parseDirective(name, stmtPlace, line) → bool`. Returns `Ok(true)`
  /// when `name` was recognised and handled (even if handling it produced
  /// an error, which is reported through `front`'s diagnostic sink
  /// directly); `Ok(false)` when `name` isn't one of this dialect's
  /// directives, so the caller can fall back to the shared directive set.
  fn parse_directive(
    &mut self,
    front: &mut dyn AssemblerFront,
    name: &str,
    place: StmtPlace,
    line: &str,
  ) -> Result<bool, AsmError>;

  /// `prepareBinary() → bool`.
  fn prepare_binary(&mut self, front: &mut dyn AssemblerFront) -> bool;

  /// `writeBinary`: serialise the already-prepared binary-input object.
  /// Returns the finished container bytes.
  fn write_binary(&self) -> Result<Vec<u8>, AsmError>;

  fn resolve_symbol(&self, sym: &str) -> Option<ResolvedValue>;

  fn resolve_relocation(&self, expr: &str) -> Option<ResolvedValue>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sibling_terminal_states_conflict() {
    let classic = ConfigShape::NoConfig.merge(ConfigShape::Classic).unwrap();
    assert!(classic.merge(ConfigShape::Hsa).is_err());
  }

  #[test]
  fn repeating_the_same_terminal_state_is_fine() {
    let classic = ConfigShape::NoConfig.merge(ConfigShape::Classic).unwrap();
    assert!(classic.merge(ConfigShape::Classic).is_ok());
  }
}
