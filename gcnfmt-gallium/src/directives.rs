//! §4.6.3's Gallium directive surface and §4.1's sorted dispatch table.
//!
//! Unlike AMDCL2's shortened spellings, Gallium keeps the full underscored
//! names (`gds_segment_size`, not `gdssize`) — the scenario examples use
//! them literally (`.hsa_pgmrsrc1`, `.llvm_version`).

use gcnfmt_core::directive::DirectiveTable;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Directive {
  ArchMinor,
  ArchStepping,
  Arg,
  Args,
  CallConvention,
  CodeVersion,
  Config,
  ControlDirective,
  DebugPrivateSegmentBufferSgpr,
  DebugWavefrontPrivateSegmentOffsetSgpr,
  DebugMode,
  DefaultHsaFeatures,
  Dims,
  DriverVersion,
  Dx10Clamp,
  Entry,
  Exceptions,
  FloatMode,
  GdsSegmentSize,
  GetDriverVersion,
  GetLlvmVersion,
  GlobalData,
  GroupSegmentAlign,
  HsaDebugMode,
  HsaDims,
  HsaDx10Clamp,
  HsaExceptions,
  HsaFloatMode,
  HsaIeeeMode,
  HsaLocalSize,
  HsaPgmRsrc1,
  HsaPgmRsrc2,
  HsaPriority,
  HsaPrivMode,
  HsaScratchBuffer,
  HsaSgprsNum,
  HsaTgSize,
  HsaUserDataNum,
  HsaVgprsNum,
  IeeeMode,
  KCode,
  KCodeEnd,
  KernargSegmentAlign,
  KernargSegmentSize,
  KernelCodeEntryOffset,
  KernelCodePrefetchOffset,
  KernelCodePrefetchSize,
  LlvmVersion,
  LocalSize,
  Machine,
  MaxScratchBackingMemory,
  PgmRsrc1,
  PgmRsrc2,
  Priority,
  PrivateElemSize,
  PrivateSegmentAlign,
  PrivMode,
  ProgInfo,
  ReservedSgprs,
  ReservedVgprs,
  RuntimeLoaderKernelSymbol,
  ScratchBuffer,
  ScratchSym,
  SgprsNum,
  SpilledSgprs,
  SpilledVgprs,
  TgSize,
  UseDebugEnabled,
  UseDispatchId,
  UseDispatchPtr,
  UseDynamicCallStack,
  UseFlatScratchInit,
  UseGridWorkgroupCount,
  UseKernargSegmentPtr,
  UseOrderedAppendGds,
  UsePrivateSegmentBuffer,
  UsePrivateSegmentSize,
  UsePtr64,
  UseQueuePtr,
  UseXnackEnabled,
  UserDataNum,
  VgprsNum,
  WavefrontSgprCount,
  WavefrontSize,
  WorkgroupFbarrierCount,
  WorkgroupGroupSegmentSize,
  WorkitemPrivateSegmentSize,
  WorkitemVgprCount,
}

/// Names, sorted (without the leading `.`), so `DirectiveTable` can binary
/// search. `_` sorts before any letter, so e.g. `debug_private_segment_...`
/// comes before `debugmode`.
const NAMES: &[&str] = &[
  "arch_minor",
  "arch_stepping",
  "arg",
  "args",
  "call_convention",
  "codeversion",
  "config",
  "control_directive",
  "debug_private_segment_buffer_sgpr",
  "debug_wavefront_private_segment_offset_sgpr",
  "debugmode",
  "default_hsa_features",
  "dims",
  "driver_version",
  "dx10clamp",
  "entry",
  "exceptions",
  "floatmode",
  "gds_segment_size",
  "get_driver_version",
  "get_llvm_version",
  "globaldata",
  "group_segment_align",
  "hsa_debugmode",
  "hsa_dims",
  "hsa_dx10clamp",
  "hsa_exceptions",
  "hsa_floatmode",
  "hsa_ieeemode",
  "hsa_localsize",
  "hsa_pgmrsrc1",
  "hsa_pgmrsrc2",
  "hsa_priority",
  "hsa_privmode",
  "hsa_scratchbuffer",
  "hsa_sgprsnum",
  "hsa_tgsize",
  "hsa_userdatanum",
  "hsa_vgprsnum",
  "ieeemode",
  "kcode",
  "kcodeend",
  "kernarg_segment_align",
  "kernarg_segment_size",
  "kernel_code_entry_offset",
  "kernel_code_prefetch_offset",
  "kernel_code_prefetch_size",
  "llvm_version",
  "localsize",
  "machine",
  "max_scratch_backing_memory",
  "pgmrsrc1",
  "pgmrsrc2",
  "priority",
  "private_elem_size",
  "private_segment_align",
  "privmode",
  "proginfo",
  "reserved_sgprs",
  "reserved_vgprs",
  "runtime_loader_kernel_symbol",
  "scratchbuffer",
  "scratchsym",
  "sgprsnum",
  "spilledsgprs",
  "spilledvgprs",
  "tgsize",
  "use_debug_enabled",
  "use_dispatch_id",
  "use_dispatch_ptr",
  "use_dynamic_call_stack",
  "use_flat_scratch_init",
  "use_grid_workgroup_count",
  "use_kernarg_segment_ptr",
  "use_ordered_append_gds",
  "use_private_segment_buffer",
  "use_private_segment_size",
  "use_ptr64",
  "use_queue_ptr",
  "use_xnack_enabled",
  "userdatanum",
  "vgprsnum",
  "wavefront_sgpr_count",
  "wavefront_size",
  "workgroup_fbarrier_count",
  "workgroup_group_segment_size",
  "workitem_private_segment_size",
  "workitem_vgpr_count",
];

const OPS: &[Directive] = &{
  use Directive::*;
  [
    ArchMinor,
    ArchStepping,
    Arg,
    Args,
    CallConvention,
    CodeVersion,
    Config,
    ControlDirective,
    DebugPrivateSegmentBufferSgpr,
    DebugWavefrontPrivateSegmentOffsetSgpr,
    DebugMode,
    DefaultHsaFeatures,
    Dims,
    DriverVersion,
    Dx10Clamp,
    Entry,
    Exceptions,
    FloatMode,
    GdsSegmentSize,
    GetDriverVersion,
    GetLlvmVersion,
    GlobalData,
    GroupSegmentAlign,
    HsaDebugMode,
    HsaDims,
    HsaDx10Clamp,
    HsaExceptions,
    HsaFloatMode,
    HsaIeeeMode,
    HsaLocalSize,
    HsaPgmRsrc1,
    HsaPgmRsrc2,
    HsaPriority,
    HsaPrivMode,
    HsaScratchBuffer,
    HsaSgprsNum,
    HsaTgSize,
    HsaUserDataNum,
    HsaVgprsNum,
    IeeeMode,
    KCode,
    KCodeEnd,
    KernargSegmentAlign,
    KernargSegmentSize,
    KernelCodeEntryOffset,
    KernelCodePrefetchOffset,
    KernelCodePrefetchSize,
    LlvmVersion,
    LocalSize,
    Machine,
    MaxScratchBackingMemory,
    PgmRsrc1,
    PgmRsrc2,
    Priority,
    PrivateElemSize,
    PrivateSegmentAlign,
    PrivMode,
    ProgInfo,
    ReservedSgprs,
    ReservedVgprs,
    RuntimeLoaderKernelSymbol,
    ScratchBuffer,
    ScratchSym,
    SgprsNum,
    SpilledSgprs,
    SpilledVgprs,
    TgSize,
    UseDebugEnabled,
    UseDispatchId,
    UseDispatchPtr,
    UseDynamicCallStack,
    UseFlatScratchInit,
    UseGridWorkgroupCount,
    UseKernargSegmentPtr,
    UseOrderedAppendGds,
    UsePrivateSegmentBuffer,
    UsePrivateSegmentSize,
    UsePtr64,
    UseQueuePtr,
    UseXnackEnabled,
    UserDataNum,
    VgprsNum,
    WavefrontSgprCount,
    WavefrontSize,
    WorkgroupFbarrierCount,
    WorkgroupGroupSegmentSize,
    WorkitemPrivateSegmentSize,
    WorkitemVgprCount,
  ]
};

pub fn table() -> DirectiveTable<Directive> {
  DirectiveTable::new(NAMES, OPS)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_listed_name_round_trips() {
    let table = table();
    for &name in NAMES {
      assert!(table.is_known(name), "{} should be known", name);
      assert!(table.lookup(name).is_some());
    }
  }

  #[test]
  fn names_are_strictly_sorted() {
    for w in NAMES.windows(2) {
      assert!(w[0] < w[1], "{} should sort before {}", w[0], w[1]);
    }
  }

  #[test]
  fn names_and_ops_same_length() {
    assert_eq!(NAMES.len(), OPS.len());
  }
}
