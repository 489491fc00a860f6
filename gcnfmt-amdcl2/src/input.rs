//! §3/§4.9 `AmdCl2Input`: the structured object the AMDCL2 `BinGenerator`
//! consumes — one inner ELF shared by every kernel, unlike AMDv1's
//! one-inner-ELF-per-kernel layout.

use gcnfmt_core::config::ConfigKind;

/// A code-section relocation, already mapped to the §4.8 step 5 symbol
/// index convention (`0` rodata, `1` rwdata, `2` bss).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AmdCl2Reloc {
  pub offset: u64,
  pub symbol_index: u32,
  pub addend: i64,
}

#[derive(Clone, Debug, Default)]
pub struct AmdCl2KernelInput {
  pub name: String,
  /// Always 256 bytes (§4.7): the packed HSA descriptor in HSA mode, a
  /// fixed prologue otherwise.
  pub setup: Vec<u8>,
  /// Only populated for the classic layout, where each kernel owns its own
  /// code bytes; in HSA mode code lives in the shared inner `.text` and
  /// this stays empty.
  pub code: Vec<u8>,
  pub metadata: Option<Vec<u8>>,
  pub isa_metadata: Option<Vec<u8>>,
  pub stub: Option<Vec<u8>>,
  pub config: Option<ConfigKind>,
  pub relocs: Vec<AmdCl2Reloc>,
  /// HSA layout only: offset of this kernel's descriptor inside the shared
  /// inner `.text`.
  pub hsa_offset: Option<u64>,
  pub hsa_code_size: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct AmdCl2Input {
  pub kernels: Vec<AmdCl2KernelInput>,
  /// HSA layout only: the single shared inner `.text`.
  pub inner_text: Vec<u8>,
  pub global_data: Vec<u8>,
  pub rwdata: Vec<u8>,
  pub bssdata_size: u64,
  pub sampler_init: Vec<u8>,
  pub sampler_relocs: Vec<AmdCl2Reloc>,
  pub is_hsa_layout: bool,
}
