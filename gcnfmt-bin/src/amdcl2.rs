//! §4.9 AMDCL2 `BinGenerator`. Unlike AMDv1, only the HSA layout nests an
//! inner ELF — and that inner ELF is shared by every kernel, not
//! one-per-kernel. The classic/explicit layouts have no inner ELF at all:
//! each kernel's `.setup`/`.text`/`.metadata`/`.stub` sections live directly
//! in the outer container, named `<kernel>.setup` etc.

use gcnfmt_amdcl2::input::AmdCl2Input;
use gcnfmt_core::error::AsmError;
use gcnfmt_core::section::SectionKind;

use crate::elf::{Builder, PendingSymbol, SecFlags, SecType, SymBind, SymType, EM_AMDGPU};
use crate::flags;
use crate::BinGenerator;

fn flags_for(kind: SectionKind) -> SecFlags {
  flags::elf_flags_for(kind, kind.default_flags())
}

/// Builds the single inner ELF shared by all kernels in HSA layout: one
/// `.text` holding every kernel's packed descriptor + code. Returns the
/// finished bytes alongside the offset that inner `.text` section lands at
/// within them, so the caller can place outer-visible
/// `__OpenCL_<name>_kernel` symbols once this blob is embedded inside the
/// outer container's own `.text` — a symbol added to this inner `Builder`
/// would only ever live in the inner ELF's own symbol table, invisible to
/// anyone parsing the outer container that embeds these bytes as data.
fn build_inner_hsa(input: &AmdCl2Input) -> (Vec<u8>, u64) {
  let mut b = Builder::new(EM_AMDGPU, 0);
  let text = b.add_section(".text", input.inner_text.clone(), SecType::Progbits, flags_for(SectionKind::Code), 256);
  let text_offset = b.section_offsets()[(text - 1) as usize];
  (b.finish(), text_offset)
}

/// Builds the outer container for the classic/explicit layout: every
/// kernel's setup/code/metadata/stub become their own named sections, no
/// inner ELF involved.
fn build_classic(b: &mut Builder, input: &AmdCl2Input) {
  for kernel in &input.kernels {
    if !kernel.setup.is_empty() {
      b.add_section(format!("{}.setup", kernel.name), kernel.setup.clone(), SecType::Progbits, flags_for(SectionKind::AmdCl2Setup), 1);
    }
    if !kernel.code.is_empty() {
      let text = b.add_section(format!("{}.text", kernel.name), kernel.code.clone(), SecType::Progbits, flags_for(SectionKind::Code), 256);
      b.add_symbol(PendingSymbol {
        name: format!("__OpenCL_{}_kernel", kernel.name),
        section: text,
        value: 0,
        size: kernel.code.len() as u64,
        bind: SymBind::Global,
        ty: SymType::Func,
      });
    }
    if let Some(metadata) = &kernel.metadata {
      b.add_section(format!("{}.metadata", kernel.name), metadata.clone(), SecType::Progbits, flags_for(SectionKind::AmdCl2Metadata), 1);
    }
    if let Some(isa_metadata) = &kernel.isa_metadata {
      b.add_section(format!("{}.isametadata", kernel.name), isa_metadata.clone(), SecType::Progbits, flags_for(SectionKind::AmdCl2IsaMetadata), 1);
    }
    if let Some(stub) = &kernel.stub {
      b.add_section(format!("{}.stub", kernel.name), stub.clone(), SecType::Progbits, flags_for(SectionKind::AmdCl2Stub), 1);
    }
  }
}

pub fn generate(input: &AmdCl2Input) -> Result<Vec<u8>, AsmError> {
  let mut b = Builder::new(EM_AMDGPU, 0);

  if input.is_hsa_layout {
    let (inner, inner_text_offset) = build_inner_hsa(input);
    let text = b.add_section(".text", inner, SecType::Progbits, flags_for(SectionKind::Code), 4096);
    for kernel in &input.kernels {
      let offset = inner_text_offset + kernel.hsa_offset.unwrap_or(0);
      let size = kernel.hsa_code_size.unwrap_or(0);
      b.add_symbol(PendingSymbol {
        name: format!("__OpenCL_{}_kernel", kernel.name),
        section: text,
        value: offset,
        size,
        bind: SymBind::Global,
        ty: SymType::Func,
      });
    }
  } else {
    build_classic(&mut b, input);
  }

  if !input.global_data.is_empty() {
    b.add_section(".rodata", input.global_data.clone(), SecType::Progbits, flags_for(SectionKind::DataRodata), 1);
  }
  if !input.rwdata.is_empty() {
    b.add_section(".data", input.rwdata.clone(), SecType::Progbits, flags_for(SectionKind::AmdCl2RwData), 1);
  }
  if input.bssdata_size > 0 {
    b.add_section(".bss", vec![0u8; input.bssdata_size as usize], SecType::Nobits, flags_for(SectionKind::AmdCl2Bss), 1);
  }
  if !input.sampler_init.is_empty() {
    b.add_section(".samplerinit", input.sampler_init.clone(), SecType::Progbits, flags_for(SectionKind::AmdCl2SamplerInit), 1);
  }

  log::debug!("AMDCL2: generated {} layout ELF with {} kernel(s)", if input.is_hsa_layout { "HSA" } else { "classic" }, input.kernels.len());
  Ok(b.finish())
}

impl BinGenerator for AmdCl2Input {
  fn generate(&self) -> Result<Vec<u8>, AsmError> {
    generate(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use gcnfmt_amdcl2::input::AmdCl2KernelInput;

  #[test]
  fn hsa_layout_nests_shared_inner_text() {
    let input = AmdCl2Input {
      is_hsa_layout: true,
      inner_text: vec![0u8; 512],
      kernels: vec![
        AmdCl2KernelInput { name: "a".into(), hsa_offset: Some(0), hsa_code_size: Some(256), ..Default::default() },
        AmdCl2KernelInput { name: "b".into(), hsa_offset: Some(256), hsa_code_size: Some(256), ..Default::default() },
      ],
      ..Default::default()
    };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    // Both symbols must resolve from the *outer* ELF's own symbol table,
    // not just be present somewhere in the nested inner-ELF bytes.
    let a = parsed.syms.iter().find(|s| parsed.strtab.get_at(s.st_name) == Some("__OpenCL_a_kernel")).expect("a present in outer symtab");
    let b = parsed.syms.iter().find(|s| parsed.strtab.get_at(s.st_name) == Some("__OpenCL_b_kernel")).expect("b present in outer symtab");
    assert_eq!(b.st_value - a.st_value, 256);
  }

  #[test]
  fn classic_layout_emits_per_kernel_sections() {
    let input = AmdCl2Input {
      is_hsa_layout: false,
      kernels: vec![AmdCl2KernelInput { name: "foo".into(), setup: vec![0u8; 32], code: vec![1, 2, 3], ..Default::default() }],
      ..Default::default()
    };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf");
    let sec_names: Vec<&str> =
      parsed.section_headers.iter().filter_map(|s| parsed.shdr_strtab.get_at(s.sh_name)).collect();
    assert!(sec_names.contains(&"foo.setup"));
    assert!(sec_names.contains(&"foo.text"));
  }
}
