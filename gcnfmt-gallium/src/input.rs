//! §3/§4.9 `GalliumInput`: the structured object the Gallium `BinGenerator`
//! consumes. All kernels share the single outer `.text` — there is no
//! inner-ELF nesting here, unlike AMDv1/AMDCL2.

use gcnfmt_core::config::ConfigKind;

use crate::arg::GalliumArg;

/// One entry of a LLVM<4.0-path prog-info note: `(address, value)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProgInfoEntry {
  pub address: u32,
  pub value: u32,
}

/// §4.6.3 "scratchRelocs": a reference to `.scratchsym`'s synthetic symbol
/// from inside the code section.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScratchReloc {
  pub offset: u64,
  pub rel_type: u32,
}

#[derive(Clone, Debug, Default)]
pub struct GalliumKernelInput {
  pub name: String,
  pub config: Option<ConfigKind>,
  pub args: Vec<GalliumArg>,
  /// LLVM < 4.0 path only; empty when the kernel took the HSA-descriptor
  /// path.
  pub prog_info: Vec<ProgInfoEntry>,
  pub spilled_sgprs: Option<u32>,
  pub spilled_vgprs: Option<u32>,
  /// HSA-descriptor path only: offset into `.text` the 256-byte descriptor
  /// was placed at.
  pub hsa_offset: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct GalliumInput {
  pub kernels: Vec<GalliumKernelInput>,
  pub global_data: Vec<u8>,
  pub scratch_relocs: Vec<ScratchReloc>,
  pub llvm_version: u32,
  pub driver_version: u32,
}
