//! `.setupargs`: six predefined hidden arguments a classic or HSA kernel's
//! argument list gets prepended with (§4.6.2), ahead of anything the user
//! declares.

use gcnfmt_core::arg::{AccessQualifiers, AddressSpace, ArgKind, Argument};

/// One `AMDCL2_ARGUSED_*` flag recorded against a hidden argument; only the
/// printf-buffer pointer carries `READ_WRITE` (open question, reproduced
/// exactly per `DESIGN.md`).
pub const AMDCL2_ARGUSED_READ_WRITE: u32 = 0x3;

/// One hidden argument: the descriptor itself, its byte size (4 or 8
/// depending on address size, since the pointee is `void`), and its
/// `AMDCL2_ARGUSED_*` flags.
pub struct HiddenArg {
  pub arg: Argument,
  pub size: u32,
  pub used_flags: u32,
}

fn void_pointer(name: &str) -> Argument {
  Argument {
    name: name.to_string(),
    kind: ArgKind::Pointer { pointee: None, space: AddressSpace::Global, access: AccessQualifiers::default(), const_space_size: None },
    res_id: None,
  }
}

/// The hidden argument names, in the fixed order `.setupargs` inserts them.
pub const HIDDEN_ARG_NAMES: &[&str] = &[
  "_.global_offset_0",
  "_.global_offset_1",
  "_.global_offset_2",
  "_.printf_buffer",
  "_.vqueue_pointer",
  "_.aqlwrap_pointer",
];

/// Build the six hidden arguments, sized to `is_64bit`'s pointer width. The
/// printf-buffer argument is the only one carrying
/// [`AMDCL2_ARGUSED_READ_WRITE`]; everything else is unused (`0`).
pub fn hidden_args(is_64bit: bool) -> Vec<HiddenArg> {
  let size = if is_64bit { 8 } else { 4 };
  HIDDEN_ARG_NAMES
    .iter()
    .map(|&name| HiddenArg {
      arg: void_pointer(name),
      size,
      used_flags: if name == "_.printf_buffer" { AMDCL2_ARGUSED_READ_WRITE } else { 0 },
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn six_hidden_args_in_fixed_order() {
    let args = hidden_args(true);
    assert_eq!(args.len(), 6);
    assert_eq!(args[0].arg.name, "_.global_offset_0");
    assert_eq!(args[5].arg.name, "_.aqlwrap_pointer");
  }

  #[test]
  fn only_printf_buffer_is_read_write() {
    let args = hidden_args(false);
    for h in &args {
      if h.arg.name == "_.printf_buffer" {
        assert_eq!(h.used_flags, AMDCL2_ARGUSED_READ_WRITE);
      } else {
        assert_eq!(h.used_flags, 0);
      }
    }
  }

  #[test]
  fn size_follows_address_width() {
    assert_eq!(hidden_args(true)[0].size, 8);
    assert_eq!(hidden_args(false)[0].size, 4);
  }
}
