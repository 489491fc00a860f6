//! §6.3's AMDv1 directive surface and §4.1's sorted dispatch table.

use gcnfmt_core::directive::DirectiveTable;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Directive {
  Arg,
  BoolConsts,
  CalNote,
  CbId,
  CbMask,
  Condout,
  Config,
  ConstantBuffers,
  Cws,
  Dims,
  DriverInfo,
  DriverVersion,
  EarlyExit,
  Entry,
  Exceptions,
  FloatConsts,
  FloatMode,
  GetDriverVersion,
  GlobalBuffers,
  Header,
  HwLocal,
  HwRegion,
  IeeeMode,
  InputSamplers,
  Inputs,
  IntConsts,
  LocalSize,
  Metadata,
  Outputs,
  PersistentBuffers,
  PgmRsrc2,
  PrintfId,
  PrivateId,
  ProgInfo,
  ReqdWorkGroupSize,
  Sampler,
  ScratchBuffer,
  ScratchBuffers,
  SgprsNum,
  SubConstantBuffers,
  TgSize,
  Uav,
  UavId,
  UavMailboxSize,
  UavOpMask,
  UavPrivate,
  UseConstData,
  UsePrintf,
  UserData,
  VgprsNum,
}

/// Names, sorted (without the leading `.`), so `DirectiveTable` can binary
/// search. Keep alphabetical if you add one.
const NAMES: &[&str] = &[
  "arg",
  "boolconsts",
  "calnote",
  "cbid",
  "cbmask",
  "condout",
  "config",
  "constantbuffers",
  "cws",
  "dims",
  "driver_info",
  "driver_version",
  "earlyexit",
  "entry",
  "exceptions",
  "floatconsts",
  "floatmode",
  "get_driver_version",
  "globalbuffers",
  "header",
  "hwlocal",
  "hwregion",
  "ieeemode",
  "inputs",
  "inputsamplers",
  "intconsts",
  "localsize",
  "metadata",
  "outputs",
  "persistentbuffers",
  "pgmrsrc2",
  "printfid",
  "privateid",
  "proginfo",
  "reqd_work_group_size",
  "sampler",
  "scratchbuffer",
  "scratchbuffers",
  "sgprsnum",
  "subconstantbuffers",
  "tgsize",
  "uav",
  "uavid",
  "uavmailboxsize",
  "uavopmask",
  "uavprivate",
  "useconstdata",
  "useprintf",
  "userdata",
  "vgprsnum",
];

const OPS: &[Directive] = &{
  use Directive::*;
  [
    Arg,
    BoolConsts,
    CalNote,
    CbId,
    CbMask,
    Condout,
    Config,
    ConstantBuffers,
    Cws,
    Dims,
    DriverInfo,
    DriverVersion,
    EarlyExit,
    Entry,
    Exceptions,
    FloatConsts,
    FloatMode,
    GetDriverVersion,
    GlobalBuffers,
    Header,
    HwLocal,
    HwRegion,
    IeeeMode,
    Inputs,
    InputSamplers,
    IntConsts,
    LocalSize,
    Metadata,
    Outputs,
    PersistentBuffers,
    PgmRsrc2,
    PrintfId,
    PrivateId,
    ProgInfo,
    ReqdWorkGroupSize,
    Sampler,
    ScratchBuffer,
    ScratchBuffers,
    SgprsNum,
    SubConstantBuffers,
    TgSize,
    Uav,
    UavId,
    UavMailboxSize,
    UavOpMask,
    UavPrivate,
    UseConstData,
    UsePrintf,
    UserData,
    VgprsNum,
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
}
