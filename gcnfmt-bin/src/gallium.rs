//! §4.9 Gallium `BinGenerator`. No inner-ELF nesting at all: every kernel
//! shares one outer `.text`. LLVM<4.0-path kernels get a `prog_info` note
//! in `.AMDGPU.config`; HSA-descriptor-path kernels get a symbol at their
//! `hsa_offset` into the shared `.text` instead.

use gcnfmt_core::error::AsmError;
use gcnfmt_core::section::SectionKind;
use gcnfmt_gallium::input::GalliumInput;

use crate::elf::{Builder, PendingSymbol, SecType, SymBind, SymType, EM_AMDGPU};
use crate::flags;
use crate::BinGenerator;

pub fn generate(input: &GalliumInput) -> Result<Vec<u8>, AsmError> {
  let mut b = Builder::new(EM_AMDGPU, 0);

  let text_flags = flags::elf_flags_for(SectionKind::Code, SectionKind::Code.default_flags());
  let text = b.add_section(".text", Vec::new(), SecType::Progbits, text_flags, 256);

  let mut prog_info_bytes = Vec::new();
  for kernel in &input.kernels {
    if let Some(offset) = kernel.hsa_offset {
      b.add_symbol(PendingSymbol {
        name: format!("__OpenCL_{}_kernel", kernel.name),
        section: text,
        value: offset,
        size: 256,
        bind: SymBind::Global,
        ty: SymType::Func,
      });
    } else {
      b.add_symbol(PendingSymbol {
        name: format!("__OpenCL_{}_kernel", kernel.name),
        section: text,
        value: 0,
        size: 0,
        bind: SymBind::Global,
        ty: SymType::Func,
      });
    }
    for entry in &kernel.prog_info {
      prog_info_bytes.extend_from_slice(&entry.address.to_le_bytes());
      prog_info_bytes.extend_from_slice(&entry.value.to_le_bytes());
    }
  }
  if !prog_info_bytes.is_empty() {
    let flags = flags::elf_flags_for(SectionKind::ExtraProgbits, SectionKind::ExtraProgbits.default_flags());
    b.add_section(".AMDGPU.config", prog_info_bytes, SecType::Progbits, flags, 4);
  }

  if !input.global_data.is_empty() {
    let flags = flags::elf_flags_for(SectionKind::DataRodata, SectionKind::DataRodata.default_flags());
    b.add_section(".globaldata", input.global_data.clone(), SecType::Progbits, flags, 1);
  }

  if !input.scratch_relocs.is_empty() {
    b.add_symbol(PendingSymbol {
      name: ".scratchsym".into(),
      section: text,
      value: 0,
      size: 0,
      bind: SymBind::Local,
      ty: SymType::NoType,
    });
  }

  log::debug!("Gallium: generated ELF with {} kernel(s), llvm {}", input.kernels.len(), input.llvm_version);
  Ok(b.finish())
}

impl BinGenerator for GalliumInput {
  fn generate(&self) -> Result<Vec<u8>, AsmError> {
    generate(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use gcnfmt_gallium::input::{GalliumKernelInput, ProgInfoEntry};

  #[test]
  fn hsa_path_kernel_gets_offset_symbol() {
    let input = GalliumInput {
      kernels: vec![GalliumKernelInput { name: "foo".into(), hsa_offset: Some(512), ..Default::default() }],
      ..Default::default()
    };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    let sym = parsed.syms.iter().find(|s| parsed.strtab.get_at(s.st_name) == Some("__OpenCL_foo_kernel")).expect("symbol present");
    assert_eq!(sym.st_value, 512);
  }

  #[test]
  fn classic_path_kernel_emits_prog_info_note() {
    let input = GalliumInput {
      kernels: vec![GalliumKernelInput {
        name: "bar".into(),
        prog_info: vec![ProgInfoEntry { address: 1, value: 2 }],
        ..Default::default()
      }],
      ..Default::default()
    };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    let sec_names: Vec<&str> =
      parsed.section_headers.iter().filter_map(|s| parsed.shdr_strtab.get_at(s.sh_name)).collect();
    assert!(sec_names.contains(&".AMDGPU.config"));
  }
}
