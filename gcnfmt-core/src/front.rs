//! External interfaces consumed by the core (spec §6.1).
//!
//! The instruction encoder, expression evaluator, macro engine and ELF
//! writer are out of scope for this crate; they're modeled here as traits
//! so the dialect handlers can be exercised without a real front-end
//! attached. `gcnfmt`'s integration tests provide minimal implementations.

use crate::arch::{GPUArchitecture, RegCountFlags};
use crate::error::{AsmError, SourcePos};

/// A resolved value: either a plain number or a value tied to a section
/// (used when an expression is section-relative, e.g. `label - .text`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ResolvedValue {
  pub value: i64,
  pub section: Option<u32>,
}

/// Register allocation snapshot the ISA encoder maintains per kernel
/// (spec §3.2 `allocRegs`/`allocRegFlags`, §4.4's save/restore protocol).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct RegAllocSnapshot {
  pub sgprs: u32,
  pub vgprs: u32,
  pub flags: RegCountFlags,
}

/// §6.1 `IsaEncoder`: register-allocation bookkeeping owned by the
/// (out-of-scope) instruction encoder.
pub trait IsaEncoder {
  fn get_allocated_registers(&self) -> RegAllocSnapshot;
  fn set_allocated_registers(&mut self, snapshot: RegAllocSnapshot);
  /// Reset to the encoder's defaults, e.g. when a new kernel starts.
  fn reset_allocated_registers(&mut self) {
    self.set_allocated_registers(RegAllocSnapshot::default());
  }
  /// Number of filler bytes needed to reach the next `n`-byte boundary from
  /// the current code-section position.
  fn fill_alignment(&self, n: u64) -> u64;
}

/// §6.1 `AssemblerFront`: the directive-loop driver and its expression
/// evaluator/diagnostic sink, as seen by a dialect handler.
pub trait AssemblerFront {
  fn device_type_name(&self) -> &str;
  fn is_64bit(&self) -> bool;
  fn driver_version(&self) -> Option<u32>;
  fn llvm_version(&self) -> Option<u32>;
  fn policy_version(&self) -> u32;
  fn add_symbols_flag(&self) -> bool;
  fn source_pos(&self) -> SourcePos;

  fn parse_expression(&mut self, line: &str) -> Result<(ResolvedValue, &str), AsmError>;
  fn parse_string(&mut self, line: &str) -> Result<(String, &str), AsmError>;
  fn parse_symbol_name<'a>(&mut self, line: &'a str) -> Result<(String, &'a str), AsmError>;

  fn print_error(&mut self, err: AsmError);
  fn print_warning(&mut self, err: AsmError);
}

/// Minimum unified-SGPR policy version (spec §8.1 "Unified-SGPR policy").
pub const UNIFIED_SGPR_COUNT_POLICY: u32 = 200;

/// §6.1 `DriverDetection`: process-wide, cached probes for the AMD/Mesa
/// driver and the LLVM compiler version actually installed.
pub trait DriverDetection {
  fn detect_amd_driver_version(&self) -> Option<u32>;
  fn detect_mesa_driver_version(&self) -> Option<u32>;
  fn detect_llvm_compiler_version(&self) -> Option<u32>;
}

/// §6.1 `ArchTables`, gathered behind a trait so handlers don't need a
/// concrete `GPUArchitecture` to be testable; [`DefaultArchTables`] below
/// simply forwards to the free functions in [`crate::arch`].
pub trait ArchTables {
  fn max_registers_num(&self, arch: GPUArchitecture, reg_type: crate::arch::RegType) -> u32;
  fn max_local_size(&self, arch: GPUArchitecture) -> u32;
  fn max_gds_size(&self, arch: GPUArchitecture) -> u32;
  fn extra_sgprs_num(&self, arch: GPUArchitecture, flags: RegCountFlags) -> u32;
  fn setup_min_registers_num(
    &self,
    arch: GPUArchitecture,
    dim_mask: u8,
    user_sgprs: u32,
    flags: crate::arch::SetupFlags,
  ) -> (u32, u32);
  fn default_dim_mask(&self) -> u8;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultArchTables;

impl ArchTables for DefaultArchTables {
  fn max_registers_num(&self, arch: GPUArchitecture, reg_type: crate::arch::RegType) -> u32 {
    crate::arch::max_registers_num(arch, reg_type)
  }

  fn max_local_size(&self, arch: GPUArchitecture) -> u32 {
    crate::arch::max_local_size(arch)
  }

  fn max_gds_size(&self, arch: GPUArchitecture) -> u32 {
    crate::arch::max_gds_size(arch)
  }

  fn extra_sgprs_num(&self, arch: GPUArchitecture, flags: RegCountFlags) -> u32 {
    crate::arch::extra_sgprs_num(arch, flags)
  }

  fn setup_min_registers_num(
    &self,
    arch: GPUArchitecture,
    dim_mask: u8,
    user_sgprs: u32,
    flags: crate::arch::SetupFlags,
  ) -> (u32, u32) {
    crate::arch::setup_min_registers_num(arch, dim_mask, user_sgprs, flags)
  }

  fn default_dim_mask(&self) -> u8 {
    crate::arch::default_dim_mask()
  }
}
