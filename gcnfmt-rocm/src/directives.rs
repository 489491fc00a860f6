//! §4.6.4's ROCm directive surface and §4.1's sorted dispatch table.
//!
//! Unlike Gallium/AMDCL2, ROCm has no config-shape directive at all — every
//! kernel's config is the AMD-HSA descriptor, so the base directives below
//! map straight onto the shared `ConfigTarget`/`EnableSgprFlags`/
//! `EnableFeatureFlags` machinery without any `hsa_`-prefix aliasing scheme.

use gcnfmt_core::directive::DirectiveTable;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Directive {
  ArchMinor,
  ArchStepping,
  Arg,
  CallConvention,
  CodeVersion,
  Config,
  ControlDirective,
  Cws,
  DebugPrivateSegmentBufferSgpr,
  DebugWavefrontPrivateSegmentOffsetSgpr,
  DebugMode,
  DefaultHsaFeatures,
  Dims,
  Dx10Clamp,
  Eflags,
  Exceptions,
  FixedWorkGroupSize,
  FKernel,
  FloatMode,
  GdsSegmentSize,
  GlobalData,
  GotSym,
  GroupSegmentAlign,
  IeeeMode,
  KCode,
  KCodeEnd,
  KernargSegmentAlign,
  KernargSegmentSize,
  KernelCodeEntryOffset,
  KernelCodePrefetchOffset,
  KernelCodePrefetchSize,
  LocalSize,
  Machine,
  MaxFlatWorkGroupSize,
  MaxScratchBackingMemory,
  MdGroupSegmentFixedSize,
  MdKernargSegmentAlign,
  MdKernargSegmentSize,
  MdLanguage,
  MdPrivateSegmentFixedSize,
  MdSgprsNum,
  MdSymName,
  MdVersion,
  MdVgprsNum,
  MdWavefrontSize,
  Metadata,
  NewBinFmt,
  NoSectDiffs,
  PgmRsrc1,
  PgmRsrc2,
  Printf,
  Priority,
  PrivateElemSize,
  PrivateSegmentAlign,
  PrivMode,
  ReqdWorkGroupSize,
  ReservedSgprs,
  ReservedVgprs,
  RuntimeHandle,
  RuntimeLoaderKernelSymbol,
  ScratchBuffer,
  SgprsNum,
  SpilledSgprs,
  SpilledVgprs,
  Target,
  TgSize,
  Tripple,
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
  VecTypeHint,
  VgprsNum,
  WavefrontSgprCount,
  WavefrontSize,
  WorkGroupSizeHint,
  WorkgroupFbarrierCount,
  WorkgroupGroupSegmentSize,
  WorkitemPrivateSegmentSize,
  WorkitemVgprCount,
}

/// Names, sorted (without the leading `.`), matching the original's
/// `rocmPseudoOpNamesTbl`. `_` sorts before any letter, so e.g.
/// `use_xnack_enabled` comes before `userdatanum`.
const NAMES: &[&str] = &[
  "arch_minor",
  "arch_stepping",
  "arg",
  "call_convention",
  "codeversion",
  "config",
  "control_directive",
  "cws",
  "debug_private_segment_buffer_sgpr",
  "debug_wavefront_private_segment_offset_sgpr",
  "debugmode",
  "default_hsa_features",
  "dims",
  "dx10clamp",
  "eflags",
  "exceptions",
  "fixed_work_group_size",
  "fkernel",
  "floatmode",
  "gds_segment_size",
  "globaldata",
  "gotsym",
  "group_segment_align",
  "ieeemode",
  "kcode",
  "kcodeend",
  "kernarg_segment_align",
  "kernarg_segment_size",
  "kernel_code_entry_offset",
  "kernel_code_prefetch_offset",
  "kernel_code_prefetch_size",
  "localsize",
  "machine",
  "max_flat_work_group_size",
  "max_scratch_backing_memory",
  "md_group_segment_fixed_size",
  "md_kernarg_segment_align",
  "md_kernarg_segment_size",
  "md_language",
  "md_private_segment_fixed_size",
  "md_sgprsnum",
  "md_symname",
  "md_version",
  "md_vgprsnum",
  "md_wavefront_size",
  "metadata",
  "newbinfmt",
  "nosectdiffs",
  "pgmrsrc1",
  "pgmrsrc2",
  "printf",
  "priority",
  "private_elem_size",
  "private_segment_align",
  "privmode",
  "reqd_work_group_size",
  "reserved_sgprs",
  "reserved_vgprs",
  "runtime_handle",
  "runtime_loader_kernel_symbol",
  "scratchbuffer",
  "sgprsnum",
  "spilledsgprs",
  "spilledvgprs",
  "target",
  "tgsize",
  "tripple",
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
  "vectypehint",
  "vgprsnum",
  "wavefront_sgpr_count",
  "wavefront_size",
  "work_group_size_hint",
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
    CallConvention,
    CodeVersion,
    Config,
    ControlDirective,
    Cws,
    DebugPrivateSegmentBufferSgpr,
    DebugWavefrontPrivateSegmentOffsetSgpr,
    DebugMode,
    DefaultHsaFeatures,
    Dims,
    Dx10Clamp,
    Eflags,
    Exceptions,
    FixedWorkGroupSize,
    FKernel,
    FloatMode,
    GdsSegmentSize,
    GlobalData,
    GotSym,
    GroupSegmentAlign,
    IeeeMode,
    KCode,
    KCodeEnd,
    KernargSegmentAlign,
    KernargSegmentSize,
    KernelCodeEntryOffset,
    KernelCodePrefetchOffset,
    KernelCodePrefetchSize,
    LocalSize,
    Machine,
    MaxFlatWorkGroupSize,
    MaxScratchBackingMemory,
    MdGroupSegmentFixedSize,
    MdKernargSegmentAlign,
    MdKernargSegmentSize,
    MdLanguage,
    MdPrivateSegmentFixedSize,
    MdSgprsNum,
    MdSymName,
    MdVersion,
    MdVgprsNum,
    MdWavefrontSize,
    Metadata,
    NewBinFmt,
    NoSectDiffs,
    PgmRsrc1,
    PgmRsrc2,
    Printf,
    Priority,
    PrivateElemSize,
    PrivateSegmentAlign,
    PrivMode,
    ReqdWorkGroupSize,
    ReservedSgprs,
    ReservedVgprs,
    RuntimeHandle,
    RuntimeLoaderKernelSymbol,
    ScratchBuffer,
    SgprsNum,
    SpilledSgprs,
    SpilledVgprs,
    Target,
    TgSize,
    Tripple,
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
    VecTypeHint,
    VgprsNum,
    WavefrontSgprCount,
    WavefrontSize,
    WorkGroupSizeHint,
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
