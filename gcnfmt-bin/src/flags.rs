//! §4.4 section-flag mapping, shared by all four dialects: translates the
//! core's dialect-agnostic `SectionFlags`/`SectionKind` model onto the
//! concrete ELF `(sh_type, sh_flags)` pair each generator writes.

use gcnfmt_core::section::{SectionFlags, SectionKind};

use crate::elf::{SecFlags, SecType};

/// `SHT_PROGBITS` unless the kind is a pure BSS-style allocation
/// (uninitialised, sized-only) or a CAL/control-directive placeholder that
/// carries no section body of its own.
pub fn sh_type_for(kind: SectionKind) -> SecType {
  match kind {
    SectionKind::DataBss | SectionKind::AmdCl2Bss => SecType::Nobits,
    SectionKind::AmdV1CalNote | SectionKind::RocmMetadata => SecType::Note,
    _ => SecType::Progbits,
  }
}

/// `sectionInfo`'s `(flags)` bitset maps directly onto the three ELF
/// section flags this format ever needs: `ADDRESSABLE` -> `SHF_ALLOC`,
/// `WRITEABLE` -> `SHF_WRITE`, and `Code` additionally getting
/// `SHF_EXECINSTR` (not modeled as its own core bit since only one
/// `SectionKind` is ever executable). `ABS_ADDRESSABLE`/`UNRESOLVABLE` are
/// relocation-resolution concerns the assembler front-end tracks, not ELF
/// section attributes, so they don't participate here.
pub fn elf_flags_for(kind: SectionKind, flags: SectionFlags) -> SecFlags {
  SecFlags {
    alloc: flags.contains(SectionFlags::ADDRESSABLE),
    write: flags.contains(SectionFlags::WRITEABLE),
    exec: kind == SectionKind::Code,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn code_section_is_alloc_write_exec() {
    let flags = SectionKind::Code.default_flags();
    let elf_flags = elf_flags_for(SectionKind::Code, flags);
    assert!(elf_flags.alloc);
    assert!(elf_flags.write);
    assert!(elf_flags.exec);
    assert_eq!(sh_type_for(SectionKind::Code), SecType::Progbits);
  }

  #[test]
  fn bss_like_sections_are_nobits_and_non_executable() {
    assert_eq!(sh_type_for(SectionKind::DataBss), SecType::Nobits);
    let flags = SectionKind::DataBss.default_flags();
    let elf_flags = elf_flags_for(SectionKind::DataBss, flags);
    assert!(!elf_flags.exec);
  }

  #[test]
  fn config_sections_carry_no_alloc_flag() {
    let flags = SectionKind::Config.default_flags();
    let elf_flags = elf_flags_for(SectionKind::Config, flags);
    assert!(!elf_flags.alloc);
    assert!(!elf_flags.write);
  }
}
