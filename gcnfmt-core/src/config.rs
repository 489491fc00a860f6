//! §3.3 Config and §4.3 `ConfigStore`.
//!
//! Two shapes share one store: the classic flat record used by AMDv1,
//! AMDCL2-classic and Gallium-classic kernels, and the 256-byte AMD-HSA
//! kernel descriptor used by AMDCL2-hsa, Gallium-hsa and ROCm. Every field
//! that can be left to the Finaliser is `Option<T>` (Design Notes §9's
//! "strongly-typed sentinel for default") rather than a magic `0xff...`
//! value, so "unset" and "zero" are distinguishable.

use crate::arg::Argument;
use crate::bitflags_like;
use crate::error::AsmError;

/// `target` argument to [`ConfigStore::set_scalar`]/[`set_bool`] — one entry
/// per settable field, shared across dialects that alias directives onto
/// the same underlying slot (e.g. `.sgprsnum` vs `.md_sgprsnum`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ConfigTarget {
  SgprsNum,
  VgprsNum,
  PgmRsrc1,
  PgmRsrc2,
  FloatMode,
  Priority,
  LocalSize,
  GdsSize,
  ScratchBufferSize,
  Exceptions,
  DimMask,
  DebugMode,
  Dx10Clamp,
  IeeeMode,
  PrivilegedMode,
  TgSize,
  UserDataNum,
  KernargSegmentSize,
  KernargSegmentAlign,
  GroupSegmentAlign,
  PrivateSegmentAlign,
  WavefrontSize,
  PrivateElemSize,
  CallConvention,
  CodeEntryOffset,
  CodePrefetchOffset,
  CodePrefetchSize,
  MaxScratchBackingMemory,
  WorkgroupFbarrierCount,
  WavefrontSgprCount,
  WorkitemVgprCount,
  DebugPrivateSegmentBufferSgpr,
  DebugWavefrontPrivateSegmentOffsetSgpr,
  RuntimeLoaderKernelSymbol,
}

impl ConfigTarget {
  /// §4.3 `isHsaTarget`: classify a target as HSA-only, classic-only or
  /// shared. Mixing an HSA-only target into a classic-config kernel (or
  /// vice versa) is a structural error the handler rejects at parse time.
  pub fn classify(self) -> TargetClass {
    use ConfigTarget::*;
    match self {
      SgprsNum | VgprsNum | PgmRsrc1 | PgmRsrc2 | FloatMode | ScratchBufferSize
      | Exceptions | DimMask | DebugMode | Dx10Clamp | IeeeMode | PrivilegedMode | TgSize
      | LocalSize | GdsSize => TargetClass::Shared,
      Priority => TargetClass::ClassicOnly,
      _ => TargetClass::HsaOnly,
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TargetClass {
  Shared,
  ClassicOnly,
  HsaOnly,
}

bitflags_like! {
  /// Weighted user-SGPR enable flags. Each set bit reserves the number of
  /// SGPRs its payload needs (a 64-bit pointer costs 2, a 32-bit grid
  /// count costs 1) — see `sgpr_weight`.
  pub struct EnableSgprFlags: u16 {
    const PRIVATE_SEGMENT_BUFFER = 0x0001;
    const DISPATCH_PTR = 0x0002;
    const QUEUE_PTR = 0x0004;
    const KERNARG_SEGMENT_PTR = 0x0008;
    const DISPATCH_ID = 0x0010;
    const FLAT_SCRATCH_INIT = 0x0020;
    const PRIVATE_SEGMENT_SIZE = 0x0040;
    const GRID_WORKGROUP_COUNT_X = 0x0080;
    const GRID_WORKGROUP_COUNT_Y = 0x0100;
    const GRID_WORKGROUP_COUNT_Z = 0x0200;
  }
}

impl EnableSgprFlags {
  const WEIGHTED: &'static [(EnableSgprFlags, u32)] = &[
    (EnableSgprFlags::PRIVATE_SEGMENT_BUFFER, 4),
    (EnableSgprFlags::DISPATCH_PTR, 2),
    (EnableSgprFlags::QUEUE_PTR, 2),
    (EnableSgprFlags::KERNARG_SEGMENT_PTR, 2),
    (EnableSgprFlags::DISPATCH_ID, 2),
    (EnableSgprFlags::FLAT_SCRATCH_INIT, 2),
    (EnableSgprFlags::PRIVATE_SEGMENT_SIZE, 1),
    (EnableSgprFlags::GRID_WORKGROUP_COUNT_X, 1),
    (EnableSgprFlags::GRID_WORKGROUP_COUNT_Y, 1),
    (EnableSgprFlags::GRID_WORKGROUP_COUNT_Z, 1),
  ];

  /// §4.8 step 2: "by popcount of enable-sgpr flags, capped at 16" — the
  /// popcount is weighted by how many SGPRs each flag's payload occupies.
  pub fn user_sgprs_num(self) -> u32 {
    let total: u32 = Self::WEIGHTED.iter().filter(|(f, _)| self.contains(*f)).map(|(_, w)| w).sum();
    total.min(16)
  }
}

bitflags_like! {
  pub struct EnableFeatureFlags: u16 {
    const USE_PTR64 = 0x0001;
    const USE_DYNAMIC_CALL_STACK = 0x0002;
    const USE_DEBUG_ENABLED = 0x0004;
    const USE_XNACK_ENABLED = 0x0008;
    const USE_ORDERED_APPEND_GDS = 0x0010;
    const BULKY = 0x0020;
  }
}

/// §3.3 "Classic config" — the flat record shared by AMDv1, AMDCL2-classic
/// and Gallium-classic kernels.
#[derive(Clone, Debug, Default)]
pub struct ClassicConfig {
  pub used_sgprs_num: Option<u32>,
  pub used_vgprs_num: Option<u32>,
  pub pgm_rsrc1: Option<u32>,
  pub pgm_rsrc2: Option<u32>,
  pub float_mode: Option<u8>,
  pub priority: Option<u8>,
  pub local_size: Option<u32>,
  pub gds_size: Option<u32>,
  pub scratch_buffer_size: Option<u32>,
  pub exceptions: Option<u8>,
  pub dim_mask: Option<u8>,
  pub debug_mode: bool,
  pub dx10_clamp: bool,
  pub ieee_mode: bool,
  pub privileged_mode: bool,
  pub tg_size: bool,

  // AMDv1 extras
  pub user_datas: Vec<(u32, u32)>,

  // AMDCL2-classic extras
  pub use_args: bool,
  pub use_setup: bool,
  pub use_enqueue: bool,
  pub use_generic: bool,

  pub args: Vec<Argument>,
  /// Sampler initialiser words (literal or symbol-derived, stored resolved).
  pub samplers: Vec<u32>,
  pub reqd_work_group_size: Option<[u32; 3]>,
  pub work_group_size_hint: Option<[u32; 3]>,
  pub vec_type_hint: Option<String>,
}

/// §3.3 "HSA descriptor" — the 256-byte AMD-HSA kernel descriptor record
/// (128 bytes of packed fields, §8.1, followed by a 128-byte control
/// directive trailer).
#[derive(Clone, Debug)]
pub struct HsaKernelConfig {
  pub code_version_major: u16,
  pub code_version_minor: u16,
  pub machine_kind: u16,
  pub machine_major: u16,
  pub machine_minor: u16,
  pub machine_stepping: u16,
  pub kernel_code_entry_offset: u64,
  pub kernel_code_prefetch_offset: u64,
  pub kernel_code_prefetch_size: u64,
  pub max_scratch_backing_memory: u64,
  pub compute_pgm_rsrc1: u32,
  pub compute_pgm_rsrc2: u32,
  pub enable_sgpr_flags: EnableSgprFlags,
  pub enable_feature_flags: EnableFeatureFlags,
  pub workitem_private_segment_size: u32,
  pub workgroup_group_segment_size: u32,
  pub gds_segment_size: u32,
  pub kernarg_segment_size: u64,
  pub workgroup_fbarrier_count: u32,
  pub wavefront_sgpr_count: Option<u16>,
  pub workitem_vgpr_count: Option<u16>,
  pub reserved_vgpr_first: u16,
  pub reserved_vgpr_count: u16,
  pub reserved_sgpr_first: u16,
  pub reserved_sgpr_count: u16,
  pub debug_wavefront_private_segment_offset_sgpr: u16,
  pub debug_private_segment_buffer_sgpr: u16,
  /// Stored as log2(bytes); decoded alignment must be a power of two >= 16.
  pub kernarg_segment_alignment_log2: u8,
  pub group_segment_alignment_log2: u8,
  pub private_segment_alignment_log2: u8,
  /// log2(threads); default 6 => 64.
  pub wavefront_size_log2: u8,
  pub call_convention: i32,
  pub runtime_loader_kernel_symbol: u64,
  /// `None` until set by `.userdatanum` or computed by the Finaliser from
  /// the enable-sgpr popcount — a bare `0` sentinel would make an explicit
  /// `.userdatanum 0` indistinguishable from "not set" and silently
  /// overwritten by the computed default.
  pub user_data_num: Option<u32>,

  /// Not part of the on-disk descriptor; a ROCm-only validated scalar
  /// (power of two in [2, 16]) threaded into metadata.
  pub private_elem_size: Option<u8>,

  /// Not part of the on-disk descriptor either: folded into
  /// `compute_pgm_rsrc2` at finalise time, defaulting to the
  /// architecture's default dim mask when unset (same "config-only"
  /// pattern as `private_elem_size`).
  pub dim_mask: Option<u8>,

  /// Config-only mode bits shared with the classic layout (`.debugmode`,
  /// `.dx10clamp`, `.ieeemode`, `.privmode`, `.tgsize`); folded into
  /// `compute_pgm_rsrc1`/`compute_pgm_rsrc2` at finalise time instead of
  /// being stored on the descriptor directly.
  pub debug_mode: bool,
  pub dx10_clamp: bool,
  pub ieee_mode: bool,
  pub privileged_mode: bool,
  pub tg_size: bool,
  /// Config-only: presence sets the `exceptions_enable` overlay bit in
  /// `compute_pgm_rsrc2`, same as the classic layout's `exceptions` field.
  pub exceptions: Option<u8>,

  pub args: Vec<Argument>,
  pub reqd_work_group_size: Option<[u32; 3]>,
  pub work_group_size_hint: Option<[u32; 3]>,
  pub vec_type_hint: Option<String>,

  /// `.control_directive`-supplied raw bytes, or `None` to zero-fill.
  pub control_directive: Option<[u8; 128]>,
}

impl Default for HsaKernelConfig {
  fn default() -> Self {
    HsaKernelConfig {
      code_version_major: 1,
      code_version_minor: 0,
      machine_kind: 1,
      machine_major: 0,
      machine_minor: 0,
      machine_stepping: 0,
      kernel_code_entry_offset: 256,
      kernel_code_prefetch_offset: 0,
      kernel_code_prefetch_size: 0,
      max_scratch_backing_memory: 0,
      compute_pgm_rsrc1: 0,
      compute_pgm_rsrc2: 0,
      enable_sgpr_flags: EnableSgprFlags::empty(),
      enable_feature_flags: EnableFeatureFlags::empty(),
      workitem_private_segment_size: 0,
      workgroup_group_segment_size: 0,
      gds_segment_size: 0,
      kernarg_segment_size: 0,
      workgroup_fbarrier_count: 0,
      wavefront_sgpr_count: None,
      workitem_vgpr_count: None,
      reserved_vgpr_first: 0,
      reserved_vgpr_count: 0,
      reserved_sgpr_first: 0,
      reserved_sgpr_count: 0,
      debug_wavefront_private_segment_offset_sgpr: 0,
      debug_private_segment_buffer_sgpr: 0,
      kernarg_segment_alignment_log2: 4,
      group_segment_alignment_log2: 4,
      private_segment_alignment_log2: 4,
      wavefront_size_log2: 6,
      call_convention: -1,
      runtime_loader_kernel_symbol: 0,
      user_data_num: None,
      private_elem_size: None,
      dim_mask: None,
      debug_mode: false,
      dx10_clamp: false,
      ieee_mode: false,
      privileged_mode: false,
      tg_size: false,
      exceptions: None,
      args: Vec::new(),
      reqd_work_group_size: None,
      work_group_size_hint: None,
      vec_type_hint: None,
      control_directive: None,
    }
  }
}

impl HsaKernelConfig {
  /// Decoded alignment (bytes) for a log2-encoded field; §8.1 "alignment
  /// encoding" invariant: `1 << stored == v`.
  pub fn kernarg_segment_alignment(&self) -> u64 {
    1 << self.kernarg_segment_alignment_log2
  }
  pub fn group_segment_alignment(&self) -> u64 {
    1 << self.group_segment_alignment_log2
  }
  pub fn private_segment_alignment(&self) -> u64 {
    1 << self.private_segment_alignment_log2
  }
  pub fn wavefront_size(&self) -> u32 {
    1 << self.wavefront_size_log2
  }

  /// Pack the 128-byte field block (everything except the control
  /// directive trailer) into little-endian bytes (§8.1 "HSA descriptor
  /// size").
  pub fn to_le_bytes_128(&self) -> [u8; 128] {
    let mut out = [0u8; 128];
    let mut w = ByteWriter(&mut out);
    w.u16(self.code_version_major);
    w.u16(self.code_version_minor);
    w.u16(self.machine_kind);
    w.u16(self.machine_major);
    w.u16(self.machine_minor);
    w.u16(self.machine_stepping);
    w.u64(self.kernel_code_entry_offset);
    w.u64(self.kernel_code_prefetch_offset);
    w.u64(self.kernel_code_prefetch_size);
    w.u64(self.max_scratch_backing_memory);
    w.u32(self.compute_pgm_rsrc1);
    w.u32(self.compute_pgm_rsrc2);
    w.u16(self.enable_sgpr_flags.bits());
    w.u16(self.enable_feature_flags.bits());
    w.u32(self.workitem_private_segment_size);
    w.u32(self.workgroup_group_segment_size);
    w.u32(self.gds_segment_size);
    w.u64(self.kernarg_segment_size);
    w.u32(self.workgroup_fbarrier_count);
    w.u16(self.wavefront_sgpr_count.unwrap_or(0));
    w.u16(self.workitem_vgpr_count.unwrap_or(0));
    w.u16(self.reserved_vgpr_first);
    w.u16(self.reserved_vgpr_count);
    w.u16(self.reserved_sgpr_first);
    w.u16(self.reserved_sgpr_count);
    w.u16(self.debug_wavefront_private_segment_offset_sgpr);
    w.u16(self.debug_private_segment_buffer_sgpr);
    w.u8(self.kernarg_segment_alignment_log2);
    w.u8(self.group_segment_alignment_log2);
    w.u8(self.private_segment_alignment_log2);
    w.u8(self.wavefront_size_log2);
    w.i32(self.call_convention);
    w.u64(self.runtime_loader_kernel_symbol);
    w.u32(self.user_data_num.unwrap_or(0));
    out
  }

  /// The full 256-byte on-disk descriptor: 128 packed-field bytes followed
  /// by the control-directive trailer (zero-filled if unset).
  pub fn to_le_bytes_256(&self) -> [u8; 256] {
    let mut out = [0u8; 256];
    out[..128].copy_from_slice(&self.to_le_bytes_128());
    if let Some(ctrl) = &self.control_directive {
      out[128..].copy_from_slice(ctrl);
    }
    out
  }
}

struct ByteWriter<'a>(&'a mut [u8]);
impl<'a> ByteWriter<'a> {
  fn take(&mut self, n: usize) -> &mut [u8] {
    let (head, tail) = std::mem::take(&mut self.0).split_at_mut(n);
    self.0 = tail;
    head
  }
  fn u8(&mut self, v: u8) {
    self.take(1)[0] = v;
  }
  fn u16(&mut self, v: u16) {
    self.take(2).copy_from_slice(&v.to_le_bytes());
  }
  fn u32(&mut self, v: u32) {
    self.take(4).copy_from_slice(&v.to_le_bytes());
  }
  fn i32(&mut self, v: i32) {
    self.take(4).copy_from_slice(&v.to_le_bytes());
  }
  fn u64(&mut self, v: u64) {
    self.take(8).copy_from_slice(&v.to_le_bytes());
  }
}

#[derive(Clone, Debug)]
pub enum ConfigKind {
  Classic(Box<ClassicConfig>),
  Hsa(Box<HsaKernelConfig>),
}

/// §4.3 `ConfigStore`: one per kernel, created lazily on the kernel's first
/// config-related directive and locked to classic-or-HSA shape from then on
/// (§4.6.5's state machine — sibling terminal states conflict).
#[derive(Clone, Debug)]
pub struct ConfigStore {
  pub kind: ConfigKind,
}

impl ConfigStore {
  pub fn classic() -> Self {
    ConfigStore { kind: ConfigKind::Classic(Box::new(ClassicConfig::default())) }
  }

  pub fn hsa() -> Self {
    ConfigStore { kind: ConfigKind::Hsa(Box::new(HsaKernelConfig::default())) }
  }

  pub fn is_hsa(&self) -> bool {
    matches!(self.kind, ConfigKind::Hsa(_))
  }

  fn reject_if_wrong_shape(&self, target: ConfigTarget) -> Result<(), AsmError> {
    match (target.classify(), &self.kind) {
      (TargetClass::HsaOnly, ConfigKind::Classic(_)) => Err(AsmError::structural(format!(
        "{:?} is only valid for a kernel using the AMD HSA kernel-descriptor layout",
        target
      ))),
      (TargetClass::ClassicOnly, ConfigKind::Hsa(_)) => Err(AsmError::structural(format!(
        "{:?} is only valid for a kernel using the classic configuration layout",
        target
      ))),
      _ => Ok(()),
    }
  }

  /// `setScalar`: table-driven assignment to one of the config targets.
  pub fn set_scalar(&mut self, target: ConfigTarget, value: u64) -> Result<(), AsmError> {
    self.reject_if_wrong_shape(target)?;
    use ConfigTarget::*;
    match (&mut self.kind, target) {
      (ConfigKind::Classic(c), SgprsNum) => c.used_sgprs_num = Some(value as u32),
      (ConfigKind::Classic(c), VgprsNum) => c.used_vgprs_num = Some(value as u32),
      (ConfigKind::Classic(c), PgmRsrc1) => c.pgm_rsrc1 = Some(value as u32),
      (ConfigKind::Classic(c), PgmRsrc2) => c.pgm_rsrc2 = Some(value as u32),
      (ConfigKind::Classic(c), FloatMode) => c.float_mode = Some(value as u8),
      (ConfigKind::Classic(c), Priority) => c.priority = Some(value as u8),
      (ConfigKind::Classic(c), LocalSize) => c.local_size = Some(value as u32),
      (ConfigKind::Classic(c), GdsSize) => c.gds_size = Some(value as u32),
      (ConfigKind::Classic(c), ScratchBufferSize) => c.scratch_buffer_size = Some(value as u32),
      (ConfigKind::Classic(c), Exceptions) => c.exceptions = Some(value as u8),
      (ConfigKind::Classic(c), DimMask) => c.dim_mask = Some(value as u8),

      (ConfigKind::Hsa(h), SgprsNum) => h.wavefront_sgpr_count = Some(value as u16),
      (ConfigKind::Hsa(h), VgprsNum) => h.workitem_vgpr_count = Some(value as u16),
      (ConfigKind::Hsa(h), PgmRsrc1) => h.compute_pgm_rsrc1 = value as u32,
      (ConfigKind::Hsa(h), PgmRsrc2) => h.compute_pgm_rsrc2 = value as u32,
      // Classic-named directives aliased onto descriptor fields when a
      // kernel is in HSA mode (§4.6.5/open-questions: "a feature, not a
      // bug").
      (ConfigKind::Hsa(h), LocalSize) => h.workgroup_group_segment_size = value as u32,
      (ConfigKind::Hsa(h), GdsSize) => h.gds_segment_size = value as u32,
      (ConfigKind::Hsa(h), ScratchBufferSize) => h.workitem_private_segment_size = value as u32,
      (ConfigKind::Hsa(h), DimMask) => h.dim_mask = Some(value as u8),
      (ConfigKind::Hsa(h), Exceptions) => h.exceptions = Some(value as u8),
      (ConfigKind::Hsa(h), UserDataNum) => h.user_data_num = Some(value as u32),
      (ConfigKind::Hsa(h), KernargSegmentSize) => h.kernarg_segment_size = value,
      (ConfigKind::Hsa(h), KernargSegmentAlign) => h.kernarg_segment_alignment_log2 = log2_align(value)?,
      (ConfigKind::Hsa(h), GroupSegmentAlign) => h.group_segment_alignment_log2 = log2_align(value)?,
      (ConfigKind::Hsa(h), PrivateSegmentAlign) => h.private_segment_alignment_log2 = log2_align(value)?,
      (ConfigKind::Hsa(h), WavefrontSize) => h.wavefront_size_log2 = log2_align(value)?,
      (ConfigKind::Hsa(h), PrivateElemSize) => {
        if !value.is_power_of_two() || value < 2 || value > 16 {
          return Err(AsmError::out_of_range("private element size must be a power of two in [2, 16]"));
        }
        h.private_elem_size = Some(value as u8);
      }
      (ConfigKind::Hsa(h), CallConvention) => h.call_convention = value as i32,
      (ConfigKind::Hsa(h), CodeEntryOffset) => h.kernel_code_entry_offset = value,
      (ConfigKind::Hsa(h), CodePrefetchOffset) => h.kernel_code_prefetch_offset = value,
      (ConfigKind::Hsa(h), CodePrefetchSize) => h.kernel_code_prefetch_size = value,
      (ConfigKind::Hsa(h), MaxScratchBackingMemory) => h.max_scratch_backing_memory = value,
      (ConfigKind::Hsa(h), WorkgroupFbarrierCount) => h.workgroup_fbarrier_count = value as u32,
      (ConfigKind::Hsa(h), WavefrontSgprCount) => h.wavefront_sgpr_count = Some(value as u16),
      (ConfigKind::Hsa(h), WorkitemVgprCount) => h.workitem_vgpr_count = Some(value as u16),
      (ConfigKind::Hsa(h), DebugPrivateSegmentBufferSgpr) => {
        h.debug_private_segment_buffer_sgpr = value as u16
      }
      (ConfigKind::Hsa(h), DebugWavefrontPrivateSegmentOffsetSgpr) => {
        h.debug_wavefront_private_segment_offset_sgpr = value as u16
      }
      (ConfigKind::Hsa(h), RuntimeLoaderKernelSymbol) => h.runtime_loader_kernel_symbol = value,
      (_, t) => return Err(AsmError::structural(format!("{:?} is not a scalar target for this config shape", t))),
    }
    Ok(())
  }

  /// `setBool`: set a named boolean field and/or a single enable-flag bit.
  pub fn set_bool(&mut self, target: ConfigTarget) -> Result<(), AsmError> {
    self.reject_if_wrong_shape(target)?;
    use ConfigTarget::*;
    match (&mut self.kind, target) {
      (ConfigKind::Classic(c), DebugMode) => c.debug_mode = true,
      (ConfigKind::Classic(c), Dx10Clamp) => c.dx10_clamp = true,
      (ConfigKind::Classic(c), IeeeMode) => c.ieee_mode = true,
      (ConfigKind::Classic(c), PrivilegedMode) => c.privileged_mode = true,
      (ConfigKind::Classic(c), TgSize) => c.tg_size = true,

      (ConfigKind::Hsa(h), DebugMode) => h.debug_mode = true,
      (ConfigKind::Hsa(h), Dx10Clamp) => h.dx10_clamp = true,
      (ConfigKind::Hsa(h), IeeeMode) => h.ieee_mode = true,
      (ConfigKind::Hsa(h), PrivilegedMode) => h.privileged_mode = true,
      (ConfigKind::Hsa(h), TgSize) => h.tg_size = true,
      (_, t) => return Err(AsmError::structural(format!("{:?} is not a boolean target for this config shape", t))),
    }
    Ok(())
  }

  /// `setBool` overload for the HSA enable-sgpr/enable-feature bitsets,
  /// which the classic shape has no equivalent of.
  pub fn set_hsa_sgpr_flag(&mut self, flag: EnableSgprFlags) -> Result<(), AsmError> {
    match &mut self.kind {
      ConfigKind::Hsa(h) => {
        h.enable_sgpr_flags |= flag;
        Ok(())
      }
      ConfigKind::Classic(_) => Err(AsmError::structural(
        "HSA feature toggles are only valid for a kernel using the AMD HSA kernel-descriptor layout",
      )),
    }
  }

  pub fn set_hsa_feature_flag(&mut self, flag: EnableFeatureFlags) -> Result<(), AsmError> {
    match &mut self.kind {
      ConfigKind::Hsa(h) => {
        h.enable_feature_flags |= flag;
        Ok(())
      }
      ConfigKind::Classic(_) => Err(AsmError::structural(
        "HSA feature toggles are only valid for a kernel using the AMD HSA kernel-descriptor layout",
      )),
    }
  }

  /// `setTuple3`: CWS-style triple (reqd_work_group_size / work_group_size_hint).
  pub fn set_tuple3(&mut self, group: Tuple3Target, values: [u32; 3]) {
    match (&mut self.kind, group) {
      (ConfigKind::Classic(c), Tuple3Target::ReqdWorkGroupSize) => c.reqd_work_group_size = Some(values),
      (ConfigKind::Classic(c), Tuple3Target::WorkGroupSizeHint) => c.work_group_size_hint = Some(values),
      (ConfigKind::Hsa(h), Tuple3Target::ReqdWorkGroupSize) => h.reqd_work_group_size = Some(values),
      (ConfigKind::Hsa(h), Tuple3Target::WorkGroupSizeHint) => h.work_group_size_hint = Some(values),
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Tuple3Target {
  ReqdWorkGroupSize,
  WorkGroupSizeHint,
}

fn log2_align(value: u64) -> Result<u8, AsmError> {
  if value == 0 || !value.is_power_of_two() {
    return Err(AsmError::out_of_range(format!("{} is not a power of two", value)));
  }
  Ok(value.trailing_zeros() as u8)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn alignment_encoding_round_trips() {
    for &v in &[16u64, 32, 64, 4096] {
      let log2v = log2_align(v).unwrap();
      assert_eq!(1u64 << log2v, v);
    }
  }

  #[test]
  fn kernarg_segment_ptr_alone_costs_two_sgprs() {
    let flags = EnableSgprFlags::KERNARG_SEGMENT_PTR;
    assert_eq!(flags.user_sgprs_num(), 2);
  }

  #[test]
  fn hsa_descriptor_is_256_bytes() {
    let cfg = HsaKernelConfig::default();
    assert_eq!(cfg.to_le_bytes_256().len(), 256);
  }

  #[test]
  fn rejects_hsa_target_on_classic_config() {
    let mut store = ConfigStore::classic();
    let err = store.set_scalar(ConfigTarget::KernargSegmentSize, 64);
    assert!(err.is_err());
  }

  #[test]
  fn rejects_priority_on_an_hsa_shaped_kernel() {
    assert_eq!(ConfigTarget::Priority.classify(), TargetClass::ClassicOnly);
    let mut store = ConfigStore::hsa();
    let err = store.set_scalar(ConfigTarget::Priority, 1).unwrap_err();
    assert!(err.to_string().contains("classic configuration layout"));
  }
}
