//! §3.1 Section and §4.4 `SectionRegistry`.

use crate::error::AsmError;
use crate::hash::{new_hash_map, HashMap};
use crate::bitflags_like;

/// Dense, non-negative section handle. Stable for the handler's lifetime
/// once returned by [`SectionRegistry::add_section`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SectionId(pub u32);

/// Dense, non-negative kernel handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct KernelId(pub u32);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SectionOwner {
  Global,
  /// AMDCL2 only: the inner binary's own global scope.
  Inner,
  Kernel(KernelId),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SectionKind {
  Code,
  DataRodata,
  DataRw,
  DataBss,
  Config,
  ConfigCtrlDirective,
  AmdV1Header,
  AmdV1Metadata,
  AmdV1CalNote,
  AmdCl2Metadata,
  AmdCl2IsaMetadata,
  AmdCl2Setup,
  AmdCl2Stub,
  AmdCl2SamplerInit,
  AmdCl2Dummy,
  AmdCl2RwData,
  AmdCl2Bss,
  AmdCl2ConfigCtrlDirective,
  GalliumComment,
  GalliumConfigCtrlDirective,
  GalliumScratch,
  RocmComment,
  RocmMetadata,
  RocmConfigCtrlDirective,
  RocmGot,
  ExtraProgbits,
  ExtraNote,
  ExtraNobits,
  ExtraSection,
}

bitflags_like! {
  /// §4.4 `sectionInfo` flags.
  pub struct SectionFlags: u8 {
    const ADDRESSABLE = 0b0001;
    const WRITEABLE = 0b0010;
    const ABS_ADDRESSABLE = 0b0100;
    const UNRESOLVABLE = 0b1000;
  }
}

impl SectionKind {
  /// The default `(flags)` for this kind, per the §4.4 table. Dialects may
  /// still special-case DATA/RWDATA for ROCm's "abs-addressable unless
  /// resolvable section diffs" rule; that's layered on top by the caller.
  pub fn default_flags(self) -> SectionFlags {
    use SectionKind::*;
    match self {
      Code => SectionFlags::ADDRESSABLE | SectionFlags::WRITEABLE,
      DataRodata | DataRw | AmdCl2RwData => {
        SectionFlags::ADDRESSABLE | SectionFlags::WRITEABLE | SectionFlags::UNRESOLVABLE
      }
      DataBss | AmdCl2Bss => SectionFlags::ADDRESSABLE | SectionFlags::UNRESOLVABLE,
      GalliumScratch => SectionFlags::UNRESOLVABLE,
      Config | ConfigCtrlDirective | AmdCl2Dummy | AmdCl2ConfigCtrlDirective
      | GalliumConfigCtrlDirective | RocmConfigCtrlDirective => SectionFlags::empty(),
      _ => SectionFlags::ADDRESSABLE | SectionFlags::WRITEABLE | SectionFlags::ABS_ADDRESSABLE,
    }
  }
}

#[derive(Clone, Debug)]
pub struct Section {
  pub owner: SectionOwner,
  pub kind: SectionKind,
  pub name: String,
  /// Stable id the binary emitter uses; dense counter for EXTRA-* sections.
  pub elf_bin_sect_id: u32,
  /// Dialect-specific payload (CAL-note numeric type, etc).
  pub extra_id: u32,
}

/// §4.4: the global registry of logical sections, keyed by scope
/// (global / inner / per-kernel) for uniqueness checks.
#[derive(Debug, Default)]
pub struct SectionRegistry {
  sections: Vec<Section>,
  by_scope_name: HashMap<(ScopeKey, String), SectionId>,
  current: Option<SectionId>,
  next_extra_id: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
enum ScopeKey {
  Global,
  Inner,
  Kernel(u32),
}

fn scope_key(owner: SectionOwner) -> ScopeKey {
  match owner {
    SectionOwner::Global => ScopeKey::Global,
    SectionOwner::Inner => ScopeKey::Inner,
    SectionOwner::Kernel(KernelId(id)) => ScopeKey::Kernel(id),
  }
}

impl SectionRegistry {
  pub fn new() -> Self {
    SectionRegistry { sections: Vec::new(), by_scope_name: new_hash_map(), current: None, next_extra_id: 0 }
  }

  /// `addSection`: register a new section in `owner`'s scope. Fails if the
  /// name is already taken within that scope (§3.1 invariant).
  pub fn add_section(
    &mut self,
    name: impl Into<String>,
    owner: SectionOwner,
    kind: SectionKind,
  ) -> Result<SectionId, AsmError> {
    let name = name.into();
    let key = (scope_key(owner), name.clone());
    if self.by_scope_name.contains_key(&key) {
      return Err(AsmError::structural(format!("section '{}' already exists in this scope", name)));
    }
    let id = SectionId(self.sections.len() as u32);
    let elf_bin_sect_id = if matches!(
      kind,
      SectionKind::ExtraProgbits | SectionKind::ExtraNote | SectionKind::ExtraNobits | SectionKind::ExtraSection
    ) {
      let v = self.next_extra_id;
      self.next_extra_id += 1;
      v
    } else {
      id.0
    };
    self.sections.push(Section { owner, kind, name: name.clone(), elf_bin_sect_id, extra_id: 0 });
    self.by_scope_name.insert(key, id);
    Ok(id)
  }

  pub fn section_id_by_name(&self, name: &str, owner: SectionOwner) -> Option<SectionId> {
    self.by_scope_name.get(&(scope_key(owner), name.to_string())).copied()
  }

  pub fn section(&self, id: SectionId) -> &Section {
    &self.sections[id.0 as usize]
  }

  pub fn section_mut(&mut self, id: SectionId) -> &mut Section {
    &mut self.sections[id.0 as usize]
  }

  pub fn current(&self) -> Option<SectionId> {
    self.current
  }

  /// `goTo`: update the current section pointer. Register save/restore
  /// across kernel boundaries is the caller's (KernelState's) job — this
  /// just tracks "where are we now".
  pub fn go_to(&mut self, id: SectionId) {
    self.current = Some(id);
  }

  pub fn iter(&self) -> impl Iterator<Item = (SectionId, &Section)> {
    self.sections.iter().enumerate().map(|(i, s)| (SectionId(i as u32), s))
  }

  pub fn len(&self) -> usize {
    self.sections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sections.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn add_section_rejects_duplicates_in_scope() {
    let mut reg = SectionRegistry::new();
    reg.add_section(".text", SectionOwner::Global, SectionKind::Code).unwrap();
    let err = reg.add_section(".text", SectionOwner::Global, SectionKind::Code);
    assert!(err.is_err());
  }

  #[test]
  fn same_name_allowed_in_different_kernel_scopes() {
    let mut reg = SectionRegistry::new();
    reg.add_section(".text", SectionOwner::Kernel(KernelId(0)), SectionKind::Code).unwrap();
    reg.add_section(".text", SectionOwner::Kernel(KernelId(1)), SectionKind::Code).unwrap();
  }

  #[test]
  fn ids_increase_monotonically() {
    let mut reg = SectionRegistry::new();
    let a = reg.add_section("a", SectionOwner::Global, SectionKind::ExtraProgbits).unwrap();
    let b = reg.add_section("b", SectionOwner::Global, SectionKind::ExtraProgbits).unwrap();
    assert!(b.0 > a.0);
  }
}
