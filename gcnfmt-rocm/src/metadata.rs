//! §4.7 structured ROCm metadata (the `.md_*`/`.arg`/`.printf`/`.runtime_handle`
//! directive family). This is one of ROCm's two **exclusive** metadata paths —
//! a kernel using this path may not also open a raw `.metadata` section
//! (enforced by the handler, not here).
//!
//! The shape mirrors the real AMDGPU code-object `amdhsa.kernels` msgpack
//! schema (`.name`, `.symbol`, `.kernarg_segment_size`, ...), the same keys
//! the runtime decodes out of `NT_AMDGPU_METADATA` notes.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
  ByValue,
  GlobalBuffer,
  DynSharedPtr,
  Sampler,
  Image,
  Pipe,
  Queue,
  HiddenGlobalOffsetX,
  HiddenGlobalOffsetY,
  HiddenGlobalOffsetZ,
  HiddenNone,
  HiddenPrintfBuffer,
  HiddenDefaultQueue,
  HiddenCompletionAction,
}

impl ValueKind {
  pub fn from_name(name: &str) -> Option<Self> {
    use ValueKind::*;
    Some(match name {
      "value" => ByValue,
      "globalbuf" => GlobalBuffer,
      "dynshptr" => DynSharedPtr,
      "sampler" => Sampler,
      "image" => Image,
      "pipe" => Pipe,
      "queue" => Queue,
      "gox" | "globaloffsetx" => HiddenGlobalOffsetX,
      "goy" | "globaloffsety" => HiddenGlobalOffsetY,
      "goz" | "globaloffsetz" => HiddenGlobalOffsetZ,
      "none" => HiddenNone,
      "printfbuf" => HiddenPrintfBuffer,
      "defqueue" => HiddenDefaultQueue,
      "complact" => HiddenCompletionAction,
      _ => return None,
    })
  }

  /// §4.6.4: a dynamic-shared-memory pointer additionally carries a pointee
  /// alignment operand.
  pub fn takes_pointee_align(self) -> bool {
    matches!(self, ValueKind::DynSharedPtr)
  }

  /// Global buffers and dynamic-shared pointers carry an address-space
  /// operand; images/pipes carry access qualifiers instead.
  pub fn takes_address_space(self) -> bool {
    matches!(self, ValueKind::DynSharedPtr | ValueKind::GlobalBuffer)
  }

  pub fn takes_access_qual(self) -> bool {
    matches!(self, ValueKind::Image | ValueKind::Pipe)
  }

  pub fn takes_actual_access_qual(self) -> bool {
    matches!(self, ValueKind::GlobalBuffer | ValueKind::Image | ValueKind::Pipe)
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ValueType {
  Int8,
  Int16,
  Int32,
  Int64,
  Uint8,
  Uint16,
  Uint32,
  Uint64,
  Float16,
  Float32,
  Float64,
  Structure,
}

impl ValueType {
  pub fn from_name(name: &str) -> Option<Self> {
    use ValueType::*;
    Some(match name {
      "char" | "i8" => Int8,
      "short" | "i16" => Int16,
      "int" | "i32" => Int32,
      "long" | "i64" => Int64,
      "uchar" | "u8" => Uint8,
      "ushort" | "u16" => Uint16,
      "uint" | "u32" => Uint32,
      "ulong" | "u64" => Uint64,
      "half" | "f16" => Float16,
      "float" | "f32" => Float32,
      "double" | "f64" => Float64,
      "struct" => Structure,
      _ => return None,
    })
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AddressSpace {
  Private,
  Global,
  Constant,
  Local,
  Generic,
  Region,
}

impl AddressSpace {
  pub fn from_name(name: &str) -> Option<Self> {
    use AddressSpace::*;
    Some(match name {
      "private" => Private,
      "global" => Global,
      "constant" => Constant,
      "local" => Local,
      "generic" => Generic,
      "region" => Region,
      _ => return None,
    })
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AccessQual {
  Default,
  ReadOnly,
  WriteOnly,
  ReadWrite,
}

impl AccessQual {
  pub fn from_name(name: &str) -> Option<Self> {
    use AccessQual::*;
    Some(match name {
      "default" => Default,
      "rdonly" | "read_only" => ReadOnly,
      "wronly" | "write_only" => WriteOnly,
      "rdwr" | "read_write" => ReadWrite,
      _ => return None,
    })
  }
}

/// One `.arg` entry (§4.6.4). Built incrementally as the directive's
/// grammar is parsed; `pointee_align`/`address_space`/access qualifiers are
/// only meaningful for the `ValueKind`s that carry them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArgMetadata {
  #[serde(rename = ".name", skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(rename = ".type_name", skip_serializing_if = "Option::is_none")]
  pub type_name: Option<String>,
  #[serde(rename = ".size")]
  pub size: u64,
  #[serde(rename = ".align")]
  pub align: u64,
  #[serde(skip)]
  pub pointee_align: u64,
  #[serde(skip)]
  pub value_kind: ValueKind,
  #[serde(skip)]
  pub value_type: ValueType,
  #[serde(skip)]
  pub address_space: Option<AddressSpace>,
  #[serde(skip)]
  pub access_qual: Option<AccessQual>,
  #[serde(skip)]
  pub actual_access_qual: Option<AccessQual>,
  #[serde(skip)]
  pub is_const: bool,
  #[serde(skip)]
  pub is_restrict: bool,
  #[serde(skip)]
  pub is_volatile: bool,
  #[serde(skip)]
  pub is_pipe: bool,
}

/// §4.6.4: one `.printf` entry. Collected at the top level of the metadata
/// object, not per-kernel — multiple kernels in the same module share the
/// printf table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrintfEntry {
  pub id: u64,
  pub arg_sizes: Vec<u32>,
  pub format: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KernelMetadata {
  #[serde(rename = ".name")]
  pub name: String,
  #[serde(rename = ".symbol", skip_serializing_if = "Option::is_none")]
  pub symbol_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub language: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub lang_version: Option<(u16, u16)>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub runtime_handle: Option<String>,
  #[serde(rename = ".kernarg_segment_size", skip_serializing_if = "Option::is_none")]
  pub kernarg_segment_size: Option<u64>,
  #[serde(rename = ".kernarg_segment_align", skip_serializing_if = "Option::is_none")]
  pub kernarg_segment_align: Option<u64>,
  #[serde(rename = ".group_segment_fixed_size", skip_serializing_if = "Option::is_none")]
  pub group_segment_fixed_size: Option<u64>,
  #[serde(rename = ".private_segment_fixed_size", skip_serializing_if = "Option::is_none")]
  pub private_segment_fixed_size: Option<u64>,
  #[serde(rename = ".wavefront_size", skip_serializing_if = "Option::is_none")]
  pub wavefront_size: Option<u32>,
  #[serde(rename = ".sgpr_count", skip_serializing_if = "Option::is_none")]
  pub sgprs_num: Option<u32>,
  #[serde(rename = ".vgpr_count", skip_serializing_if = "Option::is_none")]
  pub vgprs_num: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub spilled_sgprs: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub spilled_vgprs: Option<u32>,
  #[serde(rename = ".max_flat_workgroup_size", skip_serializing_if = "Option::is_none")]
  pub max_flat_workgroup_size: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fixed_work_group_size: Option<(u32, u32, u32)>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub work_group_size_hint: Option<(u32, u32, u32)>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vec_type_hint: Option<String>,
  #[serde(rename = ".args")]
  pub args: Vec<ArgMetadata>,
}

/// §4.7 `ROCmMetadata`: the structured-path object assembled from `.md_*`/
/// `.arg`/`.printf` directives, msgpack-encoded into the `NT_AMDGPU_METADATA`
/// ELF note at finalise time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RocmMetadata {
  #[serde(rename = "amdhsa.version")]
  pub version: (u16, u16),
  #[serde(rename = "amdhsa.kernels")]
  pub kernels: Vec<KernelMetadata>,
  #[serde(skip)]
  pub printf_infos: Vec<PrintfEntry>,
}

impl Default for ValueKind {
  fn default() -> Self {
    ValueKind::ByValue
  }
}

impl Default for ValueType {
  fn default() -> Self {
    ValueType::Int32
  }
}

pub fn encode(metadata: &RocmMetadata) -> Result<Vec<u8>, rmp_serde::encode::Error> {
  rmp_serde::to_vec_named(metadata)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn value_kind_recognises_global_offset_aliases() {
    assert_eq!(ValueKind::from_name("gox"), Some(ValueKind::HiddenGlobalOffsetX));
    assert_eq!(ValueKind::from_name("globaloffsety"), Some(ValueKind::HiddenGlobalOffsetY));
  }

  #[test]
  fn dyn_shared_ptr_requires_pointee_align_and_address_space() {
    assert!(ValueKind::DynSharedPtr.takes_pointee_align());
    assert!(ValueKind::DynSharedPtr.takes_address_space());
    assert!(!ValueKind::ByValue.takes_pointee_align());
  }

  #[test]
  fn image_and_pipe_carry_access_qualifiers_not_address_space() {
    assert!(ValueKind::Image.takes_access_qual());
    assert!(!ValueKind::Image.takes_address_space());
    assert!(ValueKind::GlobalBuffer.takes_actual_access_qual());
  }

  #[test]
  fn metadata_round_trips_through_msgpack() {
    let mut meta = RocmMetadata { version: (1, 0), ..Default::default() };
    meta.kernels.push(KernelMetadata { name: "foo".into(), ..Default::default() });
    let bytes = encode(&meta).unwrap();
    let decoded: RocmMetadata = rmp_serde::from_slice(&bytes).unwrap();
    assert_eq!(decoded.kernels.len(), 1);
    assert_eq!(decoded.kernels[0].name, "foo");
  }
}
