//! §3.4 Argument descriptors and the disjoint resource-id pools the
//! Finaliser assigns them from.

use crate::error::AsmError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScalarType {
  I8,
  I16,
  I32,
  I64,
  U8,
  U16,
  U32,
  U64,
  Float,
  Double,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AddressSpace {
  Global,
  Local,
  Constant,
  Private,
  Generic,
  Region,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct AccessQualifiers {
  pub is_const: bool,
  pub restrict: bool,
  pub volatile: bool,
  pub pipe: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ImageKind {
  Image1d,
  Image1dArray,
  Image1dBuffer,
  Image2d,
  Image2dArray,
  Image3d,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ImageAccess {
  ReadOnly,
  WriteOnly,
  ReadWrite,
}

/// Disjoint resource-id pool an argument's `resId` is assigned from at
/// finalise time (§3.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ResIdPool {
  ReadOnlyImage,
  WriteOnlyImage,
  Counter,
  Uav,
  ConstantBuffer,
}

impl ResIdPool {
  pub fn range(self) -> std::ops::RangeInclusive<u32> {
    match self {
      ResIdPool::ReadOnlyImage => 0..=127,
      ResIdPool::WriteOnlyImage => 0..=7,
      ResIdPool::Counter => 0..=7,
      // UAVs start at 9, or 11 when a printf UAV occupies slot 9; callers
      // pick the starting bound, this is the architectural ceiling.
      ResIdPool::Uav => 9..=1023,
      ResIdPool::ConstantBuffer => 2..=159,
    }
  }
}

/// Sentinel-free "unset or explicit" wrapper (Design Notes §9's
/// strongly-typed default), used for `resId` and similar finaliser-computed
/// fields.
pub type Default<T> = Option<T>;

#[derive(Clone, Debug)]
pub enum ArgKind {
  Scalar { ty: ScalarType, vec_size: Option<u8> },
  Pointer {
    /// `None` is a `void*` pointee (used by AMDCL2's hidden `.setupargs`
    /// arguments, §4.6.2 open questions).
    pointee: Option<ScalarType>,
    space: AddressSpace,
    access: AccessQualifiers,
    const_space_size: Option<u64>,
  },
  Image { kind: ImageKind, access: ImageAccess },
  Sampler,
  Counter32,
  Queue,
  Pipe,
  ClkEvent,
  Structure { size: u64 },
}

#[derive(Clone, Debug)]
pub struct Argument {
  pub name: String,
  pub kind: ArgKind,
  pub res_id: Default<u32>,
}

impl Argument {
  pub fn pool(&self) -> Option<ResIdPool> {
    match &self.kind {
      ArgKind::Image { access: ImageAccess::ReadOnly, .. } => Some(ResIdPool::ReadOnlyImage),
      ArgKind::Image { access: ImageAccess::WriteOnly, .. } => Some(ResIdPool::WriteOnlyImage),
      ArgKind::Image { access: ImageAccess::ReadWrite, .. } => Some(ResIdPool::Uav),
      ArgKind::Counter32 => Some(ResIdPool::Counter),
      ArgKind::Pointer { space: AddressSpace::Global, .. } => Some(ResIdPool::Uav),
      ArgKind::Pointer { space: AddressSpace::Constant, .. } => Some(ResIdPool::ConstantBuffer),
      _ => None,
    }
  }
}

/// Assigns `resId` values to a kernel's arguments from their respective
/// pools, honouring any explicit user choice and excluding those values
/// from the pool for everyone else (§3.4, §8.1 "resId disjointness").
#[derive(Debug, Default)]
pub struct ResIdAllocator {
  taken: std::collections::HashMap<&'static str, std::collections::HashSet<u32>>,
}

impl ResIdAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  fn pool_key(pool: ResIdPool) -> &'static str {
    match pool {
      ResIdPool::ReadOnlyImage => "rd_image",
      ResIdPool::WriteOnlyImage => "wr_image",
      ResIdPool::Counter => "counter",
      ResIdPool::Uav => "uav",
      ResIdPool::ConstantBuffer => "const_buf",
    }
  }

  /// Reserve an explicit user-chosen id so the automatic allocator skips it.
  pub fn reserve(&mut self, pool: ResIdPool, id: u32) {
    self.taken.entry(Self::pool_key(pool)).or_default().insert(id);
  }

  /// Assign the next free id in `pool`, starting the search at `start`.
  pub fn allocate(&mut self, pool: ResIdPool, start: u32) -> Result<u32, AsmError> {
    let range = pool.range();
    let taken = self.taken.entry(Self::pool_key(pool)).or_default();
    let mut id = start.max(*range.start());
    while taken.contains(&id) {
      id += 1;
    }
    if id > *range.end() {
      return Err(AsmError::out_of_range(format!(
        "no free resource id left in pool (range {}..={})",
        range.start(),
        range.end()
      )));
    }
    taken.insert(id);
    Ok(id)
  }

  /// Assign `resId` for every argument in `args` that doesn't already carry
  /// an explicit one, first reserving all the explicit ones so the
  /// automatic pass never collides with them.
  pub fn assign_all(&mut self, args: &mut [Argument]) -> Result<(), AsmError> {
    for arg in args.iter() {
      if let (Some(pool), Some(id)) = (arg.pool(), arg.res_id) {
        self.reserve(pool, id);
      }
    }
    for arg in args.iter_mut() {
      if arg.res_id.is_some() {
        continue;
      }
      if let Some(pool) = arg.pool() {
        let start = *pool.range().start();
        arg.res_id = Some(self.allocate(pool, start)?);
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn explicit_res_id_excluded_from_pool() {
    let mut args = vec![
      Argument {
        name: "a".into(),
        kind: ArgKind::Pointer {
          pointee: Some(ScalarType::Float),
          space: AddressSpace::Global,
          access: AccessQualifiers::default(),
          const_space_size: None,
        },
        res_id: Some(9),
      },
      Argument {
        name: "b".into(),
        kind: ArgKind::Pointer {
          pointee: Some(ScalarType::Float),
          space: AddressSpace::Global,
          access: AccessQualifiers::default(),
          const_space_size: None,
        },
        res_id: None,
      },
    ];
    let mut alloc = ResIdAllocator::new();
    alloc.assign_all(&mut args).unwrap();
    assert_eq!(args[0].res_id, Some(9));
    assert_ne!(args[1].res_id, Some(9));
  }
}
