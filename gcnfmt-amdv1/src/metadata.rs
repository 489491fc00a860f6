//! §4.7 AMDv1 text metadata: a semicolon-directive block consumed by the
//! classic Catalyst OpenCL runtime.

use gcnfmt_core::arg::{AddressSpace, ArgKind, Argument, ScalarType};
use gcnfmt_core::config::ClassicConfig;

/// `(name, vectorSize)` consulted per argument scalar type, mirroring the
/// classic runtime's fixed type-name table.
fn typed_name(ty: ScalarType) -> (&'static str, u32) {
  match ty {
    ScalarType::I8 => ("i8", 1),
    ScalarType::I16 => ("i16", 1),
    ScalarType::I32 => ("i32", 1),
    ScalarType::I64 => ("i64", 1),
    ScalarType::U8 => ("u8", 1),
    ScalarType::U16 => ("u16", 1),
    ScalarType::U32 => ("u32", 1),
    ScalarType::U64 => ("u64", 1),
    ScalarType::Float => ("float", 1),
    ScalarType::Double => ("double", 1),
  }
}

fn type_size(ty: ScalarType) -> u32 {
  match ty {
    ScalarType::I8 | ScalarType::U8 => 1,
    ScalarType::I16 | ScalarType::U16 => 2,
    ScalarType::I32 | ScalarType::U32 | ScalarType::Float => 4,
    ScalarType::I64 | ScalarType::U64 | ScalarType::Double => 8,
  }
}

/// Tracks the 16-byte-chunked argument offset accumulator described in
/// §4.7: each argument's slot grows to the next 16-byte boundary once its
/// own size is accounted for.
struct OffsetAccumulator(u32);

impl OffsetAccumulator {
  fn new() -> Self {
    OffsetAccumulator(0)
  }

  fn take(&mut self, size: u32) -> u32 {
    let offset = self.0;
    self.0 += ((size + 15) / 16) * 16;
    offset
  }
}

/// Render the full `;ARGSTART:…` .. `;ARGEND:…` block plus the surrounding
/// `;version`/`;device`/`;uniqueid`/`;memory` lines for one kernel.
pub fn render(
  kernel_name: &str,
  device: &str,
  unique_id: u32,
  config: &ClassicConfig,
) -> String {
  let mut out = String::new();
  out.push_str(&format!(";ARGSTART:__OpenCL_{}_kernel\n", kernel_name));
  out.push_str(";version:3:1:111\n");
  out.push_str(&format!(";device:{}\n", device.to_ascii_lowercase()));
  out.push_str(&format!(";uniqueid:{}\n", unique_id));
  out.push_str(&format!(
    ";memory:{}:uav\n",
    if config.local_size.unwrap_or(0) > 0 { "hwlocal" } else { "uav" }
  ));

  let mut offsets = OffsetAccumulator::new();
  for arg in &config.args {
    render_arg(&mut out, arg, &mut offsets);
  }

  out.push_str(&format!(";reflection:{}:unknown\n", config.args.len()));
  out.push_str(&format!(";ARGEND:__OpenCL_{}_kernel\n", kernel_name));
  out
}

fn render_arg(out: &mut String, arg: &Argument, offsets: &mut OffsetAccumulator) {
  match &arg.kind {
    ArgKind::Scalar { ty, .. } => {
      let (name, _vec) = typed_name(*ty);
      let offset = offsets.take(type_size(*ty));
      out.push_str(&format!(";value:{}:{}:1:{}\n", arg.name, name, offset));
    }
    ArgKind::Pointer { pointee, space, .. } => {
      let offset = offsets.take(8);
      let space_name = match space {
        AddressSpace::Global => "uav",
        AddressSpace::Local => "hl",
        AddressSpace::Constant => "hc",
        AddressSpace::Private | AddressSpace::Generic | AddressSpace::Region => "hp",
      };
      let (ty_name, _) = typed_name(*pointee);
      out.push_str(&format!(";pointer:{}:{}:1:1:{}:{}:0:0\n", arg.name, ty_name, offset, space_name));
    }
    ArgKind::Image { .. } => {
      let offset = offsets.take(4);
      out.push_str(&format!(";image:{}:2D:1:{}\n", arg.name, offset));
    }
    ArgKind::Counter32 => {
      let offset = offsets.take(4);
      out.push_str(&format!(";counter:{}:32:{}\n", arg.name, offset));
    }
    ArgKind::Sampler => {
      out.push_str(&format!(";sampler:{}:0:0\n", arg.name));
    }
    ArgKind::Queue | ArgKind::Pipe | ArgKind::ClkEvent | ArgKind::Structure { .. } => {
      let offset = offsets.take(8);
      out.push_str(&format!(";value:{}:opaque:1:{}\n", arg.name, offset));
    }
  }
}

/// §4.7 "Unique-id selection": reserves ids starting at 1024, skipping any
/// id already present in user-supplied metadata text.
pub struct UniqueIdAllocator {
  next: u32,
  taken: gcnfmt_core::hash::HashSet<u32>,
}

impl UniqueIdAllocator {
  pub fn new() -> Self {
    UniqueIdAllocator { next: 1024, taken: gcnfmt_core::hash::new_hash_set() }
  }

  pub fn reserve(&mut self, id: u32) {
    self.taken.insert(id);
  }

  pub fn allocate(&mut self) -> u32 {
    while self.taken.contains(&self.next) {
      self.next += 1;
    }
    let id = self.next;
    self.taken.insert(id);
    self.next += 1;
    id
  }
}

impl Default for UniqueIdAllocator {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unique_ids_start_at_1024_and_skip_reserved() {
    let mut alloc = UniqueIdAllocator::new();
    alloc.reserve(1024);
    alloc.reserve(1025);
    assert_eq!(alloc.allocate(), 1026);
  }

  #[test]
  fn two_kernels_get_disjoint_unique_ids() {
    let mut alloc = UniqueIdAllocator::new();
    let a = alloc.allocate();
    let b = alloc.allocate();
    assert_ne!(a, b);
  }
}
