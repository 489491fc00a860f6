//! §4.6.2's AMDCL2 directive surface and §4.1's sorted dispatch table.

use gcnfmt_core::directive::DirectiveTable;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Directive {
  AclVersion,
  ArchMinor,
  ArchStepping,
  Arg,
  BssData,
  Bulky,
  CompileOptions,
  Config,
  ControlDirective,
  Cws,
  DebugMode,
  DefaultHsaFeatures,
  Dims,
  DriverVersion,
  Dx10Clamp,
  Exceptions,
  FloatMode,
  GdsSize,
  GetDriverVersion,
  GlobalData,
  HsaConfig,
  HsaLayout,
  IeeeMode,
  Inner,
  IsaMetadata,
  KCode,
  KCodeEnd,
  KernargSegmentAlign,
  KernargSegmentSize,
  LocalSize,
  Metadata,
  PgmRsrc1,
  PgmRsrc2,
  Priority,
  PrivMode,
  ReqdWorkGroupSize,
  RwData,
  Sampler,
  SamplerInit,
  SamplerReloc,
  ScratchBuffer,
  Setup,
  SetupArgs,
  SgprsNum,
  Stub,
  TgSize,
  UseDebugEnabled,
  UseDispatchId,
  UseDispatchPtr,
  UseDynamicCallStack,
  UseFlatScratchInit,
  UseGridWorkgroupCountX,
  UseGridWorkgroupCountY,
  UseGridWorkgroupCountZ,
  UseKernargSegmentPtr,
  UseOrderedAppendGds,
  UsePrivateSegmentBuffer,
  UsePrivateSegmentSize,
  UsePtr64,
  UseQueuePtr,
  UseXnackEnabled,
  UseArgs,
  UseEnqueue,
  UseGeneric,
  UseSetup,
  VecTypeHint,
  VgprsNum,
  WorkGroupSizeHint,
}

/// Names, sorted (without the leading `.`), so `DirectiveTable` can binary
/// search. Keep alphabetical if you add one — `_` sorts before any letter,
/// so e.g. `use_xnack_enabled` comes before `useargs`.
const NAMES: &[&str] = &[
  "acl_version",
  "arch_minor",
  "arch_stepping",
  "arg",
  "bssdata",
  "bulky",
  "compile_options",
  "config",
  "control_directive",
  "cws",
  "debugmode",
  "default_hsa_features",
  "dims",
  "driver_version",
  "dx10clamp",
  "exceptions",
  "floatmode",
  "gdssize",
  "get_driver_version",
  "globaldata",
  "hsaconfig",
  "hsalayout",
  "ieeemode",
  "inner",
  "isametadata",
  "kcode",
  "kcodeend",
  "kernarg_segment_align",
  "kernarg_segment_size",
  "localsize",
  "metadata",
  "pgmrsrc1",
  "pgmrsrc2",
  "priority",
  "privmode",
  "reqd_work_group_size",
  "rwdata",
  "sampler",
  "samplerinit",
  "samplerreloc",
  "scratchbuffer",
  "setup",
  "setupargs",
  "sgprsnum",
  "stub",
  "tgsize",
  "use_debug_enabled",
  "use_dispatch_id",
  "use_dispatch_ptr",
  "use_dynamic_call_stack",
  "use_flat_scratch_init",
  "use_grid_workgroup_count_x",
  "use_grid_workgroup_count_y",
  "use_grid_workgroup_count_z",
  "use_kernarg_segment_ptr",
  "use_ordered_append_gds",
  "use_private_segment_buffer",
  "use_private_segment_size",
  "use_ptr64",
  "use_queue_ptr",
  "use_xnack_enabled",
  "useargs",
  "useenqueue",
  "usegeneric",
  "usesetup",
  "vectypehint",
  "vgprsnum",
  "work_group_size_hint",
];

const OPS: &[Directive] = &{
  use Directive::*;
  [
    AclVersion,
    ArchMinor,
    ArchStepping,
    Arg,
    BssData,
    Bulky,
    CompileOptions,
    Config,
    ControlDirective,
    Cws,
    DebugMode,
    DefaultHsaFeatures,
    Dims,
    DriverVersion,
    Dx10Clamp,
    Exceptions,
    FloatMode,
    GdsSize,
    GetDriverVersion,
    GlobalData,
    HsaConfig,
    HsaLayout,
    IeeeMode,
    Inner,
    IsaMetadata,
    KCode,
    KCodeEnd,
    KernargSegmentAlign,
    KernargSegmentSize,
    LocalSize,
    Metadata,
    PgmRsrc1,
    PgmRsrc2,
    Priority,
    PrivMode,
    ReqdWorkGroupSize,
    RwData,
    Sampler,
    SamplerInit,
    SamplerReloc,
    ScratchBuffer,
    Setup,
    SetupArgs,
    SgprsNum,
    Stub,
    TgSize,
    UseDebugEnabled,
    UseDispatchId,
    UseDispatchPtr,
    UseDynamicCallStack,
    UseFlatScratchInit,
    UseGridWorkgroupCountX,
    UseGridWorkgroupCountY,
    UseGridWorkgroupCountZ,
    UseKernargSegmentPtr,
    UseOrderedAppendGds,
    UsePrivateSegmentBuffer,
    UsePrivateSegmentSize,
    UsePtr64,
    UseQueuePtr,
    UseXnackEnabled,
    UseArgs,
    UseEnqueue,
    UseGeneric,
    UseSetup,
    VecTypeHint,
    VgprsNum,
    WorkGroupSizeHint,
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
}
