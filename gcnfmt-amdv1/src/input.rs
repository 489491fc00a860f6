//! §3 `AmdInput`: the structured object the AMDv1 `BinGenerator` consumes.

use gcnfmt_core::config::ClassicConfig;

use crate::calnote::ProgInfo;

#[derive(Clone, Debug, Default)]
pub struct AmdKernelInput {
  pub name: String,
  pub header: Vec<u8>,
  pub metadata: Vec<u8>,
  pub code: Vec<u8>,
  /// Fully framed CAL notes (name + type + payload), in emission order.
  pub cal_notes: Vec<u8>,
  pub config: Option<ClassicConfig>,
  pub prog_info: ProgInfo,
}

/// Top-level `AmdInput`: one inner ELF per kernel nested inside the outer
/// `.text` (§4.9).
#[derive(Clone, Debug, Default)]
pub struct AmdInput {
  pub kernels: Vec<AmdKernelInput>,
  pub global_data: Vec<u8>,
}
