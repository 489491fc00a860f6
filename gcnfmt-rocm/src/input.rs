//! §3/§4.9 `RocmInput`: the structured object the ROCm `BinGenerator`
//! consumes. ROCm shares one outer/inner binary the way AMDCL2-HSA does, but
//! additionally carries a GOT table (§3.5) and a handler-global ELF flags
//! word, target triple and `newbinfmt`/`nosectdiffs` toggles (§4.6.4).

use gcnfmt_core::config::HsaKernelConfig;

use crate::metadata::RocmMetadata;

/// §3.5: one allocated GOT slot. `target_symbol` is the name `.gotsym`'s
/// second operand defines at `index * 8` inside the ROCM-GOT section, when
/// given.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GotEntry {
  pub got_symbol: String,
  pub target_symbol: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct RocmKernelInput {
  pub name: String,
  pub config: Option<Box<HsaKernelConfig>>,
  /// Offset of this kernel's 256-byte descriptor inside the shared
  /// `.text`, filled in once every kernel's descriptor has been laid out.
  pub hsa_offset: Option<u64>,
  /// `true` once `.fkernel` has marked this kernel as a function kernel
  /// rather than an entry point (§3.2 `isFKernel`).
  pub is_fkernel: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RocmInput {
  pub kernels: Vec<RocmKernelInput>,
  pub text: Vec<u8>,
  pub global_data: Vec<u8>,
  pub got_entries: Vec<GotEntry>,
  /// Present only when the raw `.metadata` text-blob path was used.
  pub raw_metadata: Option<Vec<u8>>,
  /// Present only when the structured `.md_*`/`.arg`/`.printf` path was
  /// used; mutually exclusive with `raw_metadata`.
  pub structured_metadata: Option<RocmMetadata>,
  pub eflags: u32,
  pub target: Option<String>,
  pub tripple: Option<String>,
  pub new_bin_format: bool,
  pub no_section_diffs: bool,
}
