//! §4.9 AMDv1 `BinGenerator`: each kernel is nested as its own nameless
//! inner ELF inside the outer `.text`, the classic Catalyst layout
//! (`AmdBinGen.cpp`'s per-kernel `ElfBinaryGenTemplate`).

use gcnfmt_amdv1::input::AmdInput;
use gcnfmt_core::error::AsmError;
use gcnfmt_core::section::SectionKind;

use crate::elf::{Builder, PendingSymbol, SecFlags, SecType, SymBind, SymType, EM_AMDGPU};
use crate::flags;
use crate::BinGenerator;

/// One kernel's inner ELF plus the offsets its `.header`/`.text`/`.rodata`
/// sections land at within the finished image, so the outer ELF can place
/// `__OpenCL_<name>_header`/`_kernel`/`_metadata` symbols at the right spot
/// once this inner image is concatenated into the shared outer `.text`.
struct InnerKernel {
  bytes: Vec<u8>,
  header_offset: u64,
  header_size: u64,
  code_offset: u64,
  code_size: u64,
  metadata_offset: u64,
  metadata_size: u64,
}

/// One kernel's inner ELF: header, metadata, CAL notes and code each as
/// their own section, in the order the real format lists them.
fn build_inner(kernel: &gcnfmt_amdv1::input::AmdKernelInput) -> InnerKernel {
  let mut b = Builder::new(EM_AMDGPU, 0);
  let header_flags = flags::elf_flags_for(SectionKind::AmdV1Header, SectionKind::AmdV1Header.default_flags());
  let meta_flags = flags::elf_flags_for(SectionKind::AmdV1Metadata, SectionKind::AmdV1Metadata.default_flags());
  let code_flags = flags::elf_flags_for(SectionKind::Code, SectionKind::Code.default_flags());

  b.add_section(".header", kernel.header.clone(), SecType::Progbits, header_flags, 1);
  b.add_section(".amdil", Vec::new(), SecType::Progbits, SecFlags::default(), 1);
  b.add_section(".data", Vec::new(), SecType::Progbits, SecFlags::default(), 1);
  let text = b.add_section(".text", kernel.code.clone(), SecType::Progbits, code_flags, 256);
  b.add_section(".note", kernel.cal_notes.clone(), SecType::Note, SecFlags::default(), 4);
  b.add_section(".comment", Vec::new(), SecType::Progbits, SecFlags::default(), 1);
  let rodata = b.add_section(".rodata", kernel.metadata.clone(), SecType::Progbits, meta_flags, 1);

  b.add_symbol(PendingSymbol {
    name: format!("__OpenCL_{}_kernel", kernel.name),
    section: text,
    value: 0,
    size: kernel.code.len() as u64,
    bind: SymBind::Global,
    ty: SymType::Func,
  });

  let offsets = b.section_offsets();
  let header_offset = offsets[0];
  let code_offset = offsets[(text - 1) as usize];
  let metadata_offset = offsets[(rodata - 1) as usize];
  let header_size = kernel.header.len() as u64;
  let code_size = kernel.code.len() as u64;
  let metadata_size = kernel.metadata.len() as u64;

  InnerKernel {
    bytes: b.finish(),
    header_offset,
    header_size,
    code_offset,
    code_size,
    metadata_offset,
    metadata_size,
  }
}

/// Builds the outer ELF with every kernel's inner ELF embedded inside a
/// single shared `.text`, plus the three standard per-kernel symbol names
/// (`__OpenCL_<name>_kernel`/`_metadata`/`_header`) pointing at their
/// offsets within it, and any declared global data as `.rodata`.
pub fn generate(input: &AmdInput) -> Result<Vec<u8>, AsmError> {
  let mut b = Builder::new(EM_AMDGPU, 0);
  let code_flags = flags::elf_flags_for(SectionKind::Code, SectionKind::Code.default_flags());
  let data_flags = flags::elf_flags_for(SectionKind::DataRodata, SectionKind::DataRodata.default_flags());

  let mut text_bytes = Vec::new();
  let mut kernel_symbols = Vec::with_capacity(input.kernels.len());
  for kernel in &input.kernels {
    let inner = build_inner(kernel);
    let base = text_bytes.len() as u64;
    kernel_symbols.push((
      kernel.name.clone(),
      base + inner.header_offset,
      inner.header_size,
      base + inner.code_offset,
      inner.code_size,
      base + inner.metadata_offset,
      inner.metadata_size,
    ));
    text_bytes.extend_from_slice(&inner.bytes);
  }
  let text = b.add_section(".text", text_bytes, SecType::Progbits, code_flags, 4096);
  if !input.global_data.is_empty() {
    b.add_section(".rodata", input.global_data.clone(), SecType::Progbits, data_flags, 1);
  }

  for (name, header_offset, header_size, code_offset, code_size, metadata_offset, metadata_size) in kernel_symbols {
    b.add_symbol(PendingSymbol {
      name: format!("__OpenCL_{}_header", name),
      section: text,
      value: header_offset,
      size: header_size,
      bind: SymBind::Global,
      ty: SymType::Object,
    });
    b.add_symbol(PendingSymbol {
      name: format!("__OpenCL_{}_kernel", name),
      section: text,
      value: code_offset,
      size: code_size,
      bind: SymBind::Global,
      ty: SymType::Func,
    });
    b.add_symbol(PendingSymbol {
      name: format!("__OpenCL_{}_metadata", name),
      section: text,
      value: metadata_offset,
      size: metadata_size,
      bind: SymBind::Global,
      ty: SymType::Object,
    });
  }

  log::debug!("AMDv1: generated outer ELF with {} nested kernel(s)", input.kernels.len());
  Ok(b.finish())
}

impl BinGenerator for AmdInput {
  fn generate(&self) -> Result<Vec<u8>, AsmError> {
    generate(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use gcnfmt_amdv1::input::AmdKernelInput;

  #[test]
  fn nests_one_inner_elf_per_kernel() {
    let input = AmdInput {
      kernels: vec![
        AmdKernelInput { name: "a".into(), code: vec![1, 2, 3], ..Default::default() },
        AmdKernelInput { name: "b".into(), code: vec![4, 5], ..Default::default() },
      ],
      global_data: Vec::new(),
    };
    let bytes = generate(&input).unwrap();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid outer elf");
    let names: Vec<&str> =
      parsed.syms.iter().filter_map(|s| parsed.strtab.get_at(s.st_name)).collect();
    assert!(names.contains(&"__OpenCL_a_kernel"));
    assert!(names.contains(&"__OpenCL_b_kernel"));
  }

  #[test]
  fn empty_module_still_produces_valid_elf() {
    let input = AmdInput::default();
    let bytes = generate(&input).unwrap();
    assert!(goblin::elf::Elf::parse(&bytes).is_ok());
  }
}
