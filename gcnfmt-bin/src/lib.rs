//! §4.9 `BinaryEmitter` adapters: thin wrappers that hand each dialect's
//! finalised in-memory representation to a concrete ELF generator. One
//! module per dialect, plus a shared byte-level writer (`elf`) and
//! section-flag mapping (`flags`) the four generators all build on.

pub mod amdcl2;
pub mod amdv1;
pub mod elf;
pub mod flags;
pub mod gallium;
pub mod rocm;

use gcnfmt_core::error::AsmError;

/// Adapts a dialect's prepared binary-input structure to a real ELF
/// container. Corresponds to `BinGenerator` in the original toolchain: the
/// dialect handler's `prepareBinary`/`write_binary` step produces the
/// structure this trait consumes, not bytes directly.
pub trait BinGenerator {
  fn generate(&self) -> Result<Vec<u8>, AsmError>;
}
