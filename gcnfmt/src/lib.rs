//! Facade: the dialect-tagged-union front-end driver (Design Notes §9:
//! "model each dialect handler as a value … stored behind a tagged union"),
//! a minimal in-process test harness for `AssemblerFront`/`IsaEncoder`, and
//! the directive-dispatch loop that routes a statement to the active
//! dialect and reports cross-dialect pseudo-op usage the way the original
//! tool does (`AsmPseudoOps::parsePseudoOps`'s fallthrough chain).

pub mod harness;

use gcnfmt_amdcl2::AmdCl2Handler;
use gcnfmt_amdv1::AmdV1Handler;
use gcnfmt_core::arch::GPUArchitecture;
use gcnfmt_core::error::AsmError;
use gcnfmt_core::front::{AssemblerFront, IsaEncoder};
use gcnfmt_core::handler::{DialectHandler, StmtPlace};
use gcnfmt_core::section::{SectionFlags, SectionId, SectionOwner};
use gcnfmt_gallium::GalliumHandler;
use gcnfmt_rocm::RocmHandler;

/// One value per dialect, matching the original tool's `BinaryFormat`
/// selector — exactly one is live for the whole run, chosen by `.amd`/
/// `.amdcl2`/`.gallium`/`.rocm`.
pub enum Dialect {
  AmdV1(AmdV1Handler),
  AmdCl2(AmdCl2Handler),
  Gallium(GalliumHandler),
  Rocm(RocmHandler),
}

impl Dialect {
  pub fn new_amdv1(arch: GPUArchitecture) -> Self {
    Dialect::AmdV1(AmdV1Handler::new(arch))
  }

  pub fn new_amdcl2(arch: GPUArchitecture) -> Self {
    Dialect::AmdCl2(AmdCl2Handler::new(arch))
  }

  pub fn new_gallium(arch: GPUArchitecture) -> Self {
    Dialect::Gallium(GalliumHandler::new(arch))
  }

  pub fn new_rocm(arch: GPUArchitecture) -> Self {
    Dialect::Rocm(RocmHandler::new(arch))
  }

  /// The display name the original tool's cross-contamination diagnostics
  /// use: "AMD" (not "AMDv1") for Catalyst 1.x, matching
  /// `AsmPseudoOps::parsePseudoOps`'s literal error strings.
  pub fn name(&self) -> &'static str {
    match self {
      Dialect::AmdV1(_) => "AMD",
      Dialect::AmdCl2(_) => "AMDCL2",
      Dialect::Gallium(_) => "Gallium",
      Dialect::Rocm(_) => "ROCm",
    }
  }

  /// Every other dialect whose directive table recognises `name`, in the
  /// fixed order the original checks them (Gallium, AMD, AMDCL2, ROCm).
  fn other_dialects_knowing(&self, name: &str) -> Vec<&'static str> {
    let tables: [(&'static str, bool); 4] = [
      ("Gallium", gcnfmt_gallium::directives::table().is_known(name)),
      ("AMD", gcnfmt_amdv1::directives::table().is_known(name)),
      ("AMDCL2", gcnfmt_amdcl2::directives::table().is_known(name)),
      ("ROCm", gcnfmt_rocm::directives::table().is_known(name)),
    ];
    tables.into_iter().filter(|&(dialect, known)| known && dialect != self.name()).map(|(dialect, _)| dialect).collect()
  }
}

macro_rules! forward {
  ($self:expr, $method:ident ( $($arg:expr),* )) => {
    match $self {
      Dialect::AmdV1(h) => h.$method($($arg),*),
      Dialect::AmdCl2(h) => h.$method($($arg),*),
      Dialect::Gallium(h) => h.$method($($arg),*),
      Dialect::Rocm(h) => h.$method($($arg),*),
    }
  };
}

impl DialectHandler for Dialect {
  fn add_kernel(&mut self, front: &mut dyn AssemblerFront, name: &str) -> Result<u32, AsmError> {
    forward!(self, add_kernel(front, name))
  }

  fn add_section(&mut self, name: &str, owner: SectionOwner) -> Result<SectionId, AsmError> {
    forward!(self, add_section(name, owner))
  }

  fn section_id_by_name(&self, name: &str, owner: SectionOwner) -> Option<SectionId> {
    forward!(self, section_id_by_name(name, owner))
  }

  fn switch_kernel(&mut self, encoder: &mut dyn IsaEncoder, id: u32) -> Result<(), AsmError> {
    forward!(self, switch_kernel(encoder, id))
  }

  fn switch_section(&mut self, encoder: &mut dyn IsaEncoder, id: SectionId) -> Result<(), AsmError> {
    forward!(self, switch_section(encoder, id))
  }

  fn section_flags(&self, id: SectionId) -> SectionFlags {
    forward!(self, section_flags(id))
  }

  fn is_code_section(&self) -> bool {
    forward!(self, is_code_section())
  }

  fn parse_directive(&mut self, front: &mut dyn AssemblerFront, name: &str, place: StmtPlace, line: &str) -> Result<bool, AsmError> {
    forward!(self, parse_directive(front, name, place, line))
  }

  fn prepare_binary(&mut self, front: &mut dyn AssemblerFront) -> bool {
    forward!(self, prepare_binary(front))
  }

  fn write_binary(&self) -> Result<Vec<u8>, AsmError> {
    forward!(self, write_binary())
  }

  fn resolve_symbol(&self, sym: &str) -> Option<gcnfmt_core::front::ResolvedValue> {
    forward!(self, resolve_symbol(sym))
  }

  fn resolve_relocation(&self, expr: &str) -> Option<gcnfmt_core::front::ResolvedValue> {
    forward!(self, resolve_relocation(expr))
  }
}

/// Generates the real ELF container for whichever dialect is active, once
/// `prepare_binary` has populated its structured output. Mirrors
/// `gcnfmt-bin`'s per-dialect `BinGenerator` impls, picked by the same tag
/// this facade already carries.
pub fn generate_binary(dialect: &Dialect) -> Result<Vec<u8>, AsmError> {
  use gcnfmt_bin::BinGenerator;
  match dialect {
    Dialect::AmdV1(h) => h.output().ok_or_else(|| AsmError::structural("prepareBinary was not called")).and_then(|out| out.generate()),
    Dialect::AmdCl2(h) => h.output().ok_or_else(|| AsmError::structural("prepareBinary was not called")).and_then(|out| out.generate()),
    Dialect::Gallium(h) => h.output().ok_or_else(|| AsmError::structural("prepareBinary was not called")).and_then(|out| out.generate()),
    Dialect::Rocm(h) => h.output().ok_or_else(|| AsmError::structural("prepareBinary was not called")).and_then(|out| out.generate()),
  }
}

/// Dispatches one `.directive_name args...` statement (`name` without the
/// leading `.`) to the active dialect, falling back to the original tool's
/// cross-dialect-contamination check (spec §8.2 scenario S6) when the
/// dialect doesn't recognise it itself.
pub fn dispatch_directive(
  dialect: &mut Dialect,
  front: &mut dyn AssemblerFront,
  name: &str,
  place: StmtPlace,
  line: &str,
) -> Result<(), AsmError> {
  if dialect.parse_directive(front, name, place, line)? {
    return Ok(());
  }
  if let Some(&other) = dialect.other_dialects_knowing(name).first() {
    front.print_error(AsmError::structural(format!("{} pseudo-op can be defined only in {} format code", other, other)));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use harness::{TestEncoder, TestFront};

  #[test]
  fn cross_dialect_directive_is_rejected_with_the_original_diagnostic() {
    let mut dialect = Dialect::new_gallium(GPUArchitecture::Gcn1_2);
    let mut front = TestFront::new("gfx803");
    dispatch_directive(&mut dialect, &mut front, "metadata", StmtPlace::Kernel, "").unwrap();
    assert_eq!(front.diagnostics.errors().len(), 1);
    assert_eq!(front.diagnostics.errors()[0].message, "ROCm pseudo-op can be defined only in ROCm format code");
    assert!(!front.diagnostics.good());
  }

  #[test]
  fn directive_unknown_to_every_dialect_is_silently_ignored() {
    let mut dialect = Dialect::new_rocm(GPUArchitecture::Gcn1_2);
    let mut front = TestFront::new("gfx803");
    dispatch_directive(&mut dialect, &mut front, "byte", StmtPlace::Global, "1").unwrap();
    assert!(front.diagnostics.errors().is_empty());
  }

  #[test]
  fn minimal_rocm_kernel_end_to_end() {
    let mut dialect = Dialect::new_rocm(GPUArchitecture::Gcn1_2);
    let mut front = TestFront::new("Fiji");
    let mut encoder = TestEncoder::default();

    dialect.add_kernel(&mut front, "k").unwrap();
    dispatch_directive(&mut dialect, &mut front, "dims", StmtPlace::Kernel, "x").unwrap();
    dispatch_directive(&mut dialect, &mut front, "sgprsnum", StmtPlace::Kernel, "16").unwrap();
    dispatch_directive(&mut dialect, &mut front, "vgprsnum", StmtPlace::Kernel, "8").unwrap();
    dispatch_directive(&mut dialect, &mut front, "use_kernarg_segment_ptr", StmtPlace::Kernel, "").unwrap();
    let _ = &mut encoder;

    assert!(front.diagnostics.good());
    assert!(dialect.prepare_binary(&mut front));

    let bytes = generate_binary(&dialect).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    let names: Vec<&str> = parsed.syms.iter().filter_map(|s| parsed.strtab.get_at(s.st_name)).collect();
    assert!(names.contains(&"k.kd"));
  }
}
