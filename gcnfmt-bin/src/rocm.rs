//! §4.9 ROCm `BinGenerator`. One shared `.text` (no inner-ELF nesting, code
//! already arrives as finished bytes), a `.got` table built from `.gotsym`
//! bookkeeping, and an `NT_AMDGPU_METADATA` note carrying either the raw
//! `.metadata` blob or the msgpack encoding of the structured metadata
//! path — the two are mutually exclusive (§3.4).

use gcnfmt_core::error::AsmError;
use gcnfmt_core::section::SectionKind;
use gcnfmt_rocm::input::RocmInput;
use gcnfmt_rocm::metadata;

use crate::elf::{Builder, PendingSymbol, SecType, SymBind, SymType, EM_AMDGPU};
use crate::flags;
use crate::BinGenerator;

/// Real LLVM AMDGPU note-type id for the msgpack kernel-metadata note.
const NT_AMDGPU_METADATA: u32 = 32;
const NOTE_NAME: &[u8] = b"AMD\0";

fn frame_note(note_type: u32, desc: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(12 + NOTE_NAME.len() + desc.len() + 8);
  out.extend_from_slice(&(NOTE_NAME.len() as u32).to_le_bytes());
  out.extend_from_slice(&(desc.len() as u32).to_le_bytes());
  out.extend_from_slice(&note_type.to_le_bytes());
  out.extend_from_slice(NOTE_NAME);
  while out.len() % 4 != 0 {
    out.push(0);
  }
  out.extend_from_slice(desc);
  while out.len() % 4 != 0 {
    out.push(0);
  }
  out
}

pub fn generate(input: &RocmInput) -> Result<Vec<u8>, AsmError> {
  let mut b = Builder::new(EM_AMDGPU, input.eflags);

  let text_flags = flags::elf_flags_for(SectionKind::Code, SectionKind::Code.default_flags());
  let text = b.add_section(".text", input.text.clone(), SecType::Progbits, text_flags, 256);

  for kernel in &input.kernels {
    let offset = kernel.hsa_offset.unwrap_or(0);
    b.add_symbol(PendingSymbol {
      name: format!("{}.kd", kernel.name),
      section: text,
      value: offset,
      size: 64,
      bind: SymBind::Global,
      ty: SymType::Object,
    });
    if !kernel.is_fkernel {
      b.add_symbol(PendingSymbol {
        name: kernel.name.clone(),
        section: text,
        value: offset,
        size: 0,
        bind: SymBind::Global,
        ty: SymType::Func,
      });
    }
  }

  if !input.global_data.is_empty() {
    let flags = flags::elf_flags_for(SectionKind::DataRodata, SectionKind::DataRodata.default_flags());
    b.add_section(".rodata", input.global_data.clone(), SecType::Progbits, flags, 1);
  }

  if !input.got_entries.is_empty() {
    let got_bytes = vec![0u8; input.got_entries.len() * 8];
    let got_flags = flags::elf_flags_for(SectionKind::DataRw, SectionKind::DataRw.default_flags());
    let got = b.add_section(".got", got_bytes, SecType::Progbits, got_flags, 8);
    // `got_symbol` is the name recorded in `gotSymbols` for relocation
    // lookups; only `target_symbol`, `.gotsym`'s optional second operand,
    // actually gets *defined* here, at this slot's offset into `.got`.
    for (idx, entry) in input.got_entries.iter().enumerate() {
      if let Some(target) = &entry.target_symbol {
        b.add_symbol(PendingSymbol {
          name: target.clone(),
          section: got,
          value: (idx * 8) as u64,
          size: 8,
          bind: SymBind::Global,
          ty: SymType::Object,
        });
      }
    }
  }

  let metadata_bytes = match (&input.raw_metadata, &input.structured_metadata) {
    (Some(raw), _) => Some(raw.clone()),
    (None, Some(structured)) => {
      Some(metadata::encode(structured).map_err(|e| AsmError::structural(format!("failed to encode ROCm metadata: {}", e)))?)
    }
    (None, None) => None,
  };
  if let Some(desc) = metadata_bytes {
    let note = frame_note(NT_AMDGPU_METADATA, &desc);
    let note_flags = flags::elf_flags_for(SectionKind::RocmMetadata, SectionKind::RocmMetadata.default_flags());
    b.add_section(".note", note, SecType::Note, note_flags, 4);
  }

  log::debug!("ROCm: generated ELF with {} kernel(s), {} GOT entr{}", input.kernels.len(), input.got_entries.len(), if input.got_entries.len() == 1 { "y" } else { "ies" });
  Ok(b.finish())
}

impl BinGenerator for RocmInput {
  fn generate(&self) -> Result<Vec<u8>, AsmError> {
    generate(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use gcnfmt_rocm::input::{GotEntry, RocmKernelInput};
  use gcnfmt_rocm::metadata::RocmMetadata;

  #[test]
  fn kernel_gets_descriptor_and_entry_symbols() {
    let input = RocmInput {
      text: vec![0u8; 512],
      kernels: vec![RocmKernelInput { name: "foo".into(), hsa_offset: Some(0), is_fkernel: false, ..Default::default() }],
      ..Default::default()
    };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    let names: Vec<&str> = parsed.syms.iter().filter_map(|s| parsed.strtab.get_at(s.st_name)).collect();
    assert!(names.contains(&"foo.kd"));
    assert!(names.contains(&"foo"));
  }

  #[test]
  fn fkernel_gets_no_entry_symbol() {
    let input = RocmInput {
      text: vec![0u8; 64],
      kernels: vec![RocmKernelInput { name: "bar".into(), hsa_offset: Some(0), is_fkernel: true, ..Default::default() }],
      ..Default::default()
    };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    let names: Vec<&str> = parsed.syms.iter().filter_map(|s| parsed.strtab.get_at(s.st_name)).collect();
    assert!(names.contains(&"bar.kd"));
    assert!(!names.contains(&"bar"));
  }

  #[test]
  fn got_entries_become_got_section_and_symbols() {
    let input = RocmInput {
      got_entries: vec![GotEntry { got_symbol: "g0".into(), target_symbol: None }, GotEntry { got_symbol: "g1".into(), target_symbol: Some("g1Got".into()) }],
      ..Default::default()
    };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    let sec_names: Vec<&str> = parsed.section_headers.iter().filter_map(|s| parsed.shdr_strtab.get_at(s.sh_name)).collect();
    assert!(sec_names.contains(&".got"));
    let names: Vec<&str> = parsed.syms.iter().filter_map(|s| parsed.strtab.get_at(s.st_name)).collect();
    // `g0` has no target operand, so it is recorded in `gotSymbols` only;
    // `g1Got` is the one actually defined, at the second slot's offset.
    assert!(!names.contains(&"g0"));
    let sym = parsed.syms.iter().find(|s| parsed.strtab.get_at(s.st_name) == Some("g1Got")).expect("g1Got defined");
    assert_eq!(sym.st_value, 8);
  }

  #[test]
  fn structured_metadata_encodes_into_note() {
    let input = RocmInput { structured_metadata: Some(RocmMetadata::default()), ..Default::default() };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    let sec_names: Vec<&str> = parsed.section_headers.iter().filter_map(|s| parsed.shdr_strtab.get_at(s.sh_name)).collect();
    assert!(sec_names.contains(&".note"));
  }
}
