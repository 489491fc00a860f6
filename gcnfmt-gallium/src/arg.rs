//! §4.6.3 Gallium argument descriptors — distinct from `gcnfmt_core::arg`'s
//! model since Gallium's kernarg-segment layout needs target size/alignment
//! and a semantic tag that the generic `Argument` type doesn't carry.

use gcnfmt_core::error::AsmError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GalliumArgKind {
  Global,
  Constant,
  Local,
  Sampler,
  Scalar,
  Image2dRd,
  Image2dWr,
  Image3dRd,
  Image3dWr,
}

impl GalliumArgKind {
  pub fn from_name(name: &str) -> Option<Self> {
    use GalliumArgKind::*;
    Some(match name {
      "global" => Global,
      "constant" => Constant,
      "local" => Local,
      "sampler" => Sampler,
      "scalar" => Scalar,
      "image2d_rd" => Image2dRd,
      "image2d_wr" => Image2dWr,
      "image3d_rd" => Image3dRd,
      "image3d_wr" => Image3dWr,
      _ => return None,
    })
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GalliumArgSemantic {
  General,
  GridDimension,
  GridOffset,
  ImageSize,
  ImageFormat,
}

impl GalliumArgSemantic {
  pub fn from_name(name: &str) -> Option<Self> {
    use GalliumArgSemantic::*;
    Some(match name {
      "general" => General,
      "griddimension" => GridDimension,
      "gridoffset" => GridOffset,
      "imagesize" => ImageSize,
      "imageformat" => ImageFormat,
      _ => return None,
    })
  }
}

/// One `.arg` entry. `target_size`/`target_align` are derived at
/// construction (`.arg`'s raw `size` rounds up to a 4-byte target size;
/// grid-offset arguments always occupy 12 bytes regardless of the declared
/// size, per §4.6.3).
#[derive(Clone, Debug)]
pub struct GalliumArg {
  pub name: String,
  pub kind: GalliumArgKind,
  pub size: u32,
  pub target_size: u32,
  pub target_align: u32,
  pub sign_extended: bool,
  pub semantic: GalliumArgSemantic,
}

fn round_up_to_4(size: u32) -> u32 {
  (size + 3) & !3
}

impl GalliumArg {
  /// Builds an argument from its `.arg`-declared fields, applying the
  /// target-size/alignment derivation rules. `target_size` defaults to
  /// `size` rounded up to a dword, overridable by an explicit `.arg`
  /// operand; `target_align` defaults to the smallest power of two at
  /// least as large as `target_size`, likewise overridable. Grid-offset
  /// arguments always occupy 12 bytes regardless of either.
  pub fn new(
    name: impl Into<String>,
    kind: GalliumArgKind,
    size: u32,
    target_size: Option<u32>,
    target_align: Option<u32>,
    sign_extended: bool,
    semantic: GalliumArgSemantic,
  ) -> Result<Self, AsmError> {
    let target_size = if semantic == GalliumArgSemantic::GridOffset {
      12
    } else {
      target_size.unwrap_or_else(|| round_up_to_4(size))
    };
    let align = match target_align {
      Some(a) => {
        if !a.is_power_of_two() || a < target_size {
          return Err(AsmError::out_of_range(
            "argument target alignment must be a power of two at least as large as its target size",
          ));
        }
        a
      }
      None => target_size.next_power_of_two().max(4),
    };
    Ok(GalliumArg { name: name.into(), kind, size, target_size, target_align: align, sign_extended, semantic })
  }
}

/// §4.6.3: "sum of aligned target sizes" — each argument's offset into the
/// kernarg segment is first padded up to its own `target_align`.
pub fn kernarg_segment_size(args: &[GalliumArg]) -> u64 {
  let mut offset = 0u64;
  for arg in args {
    let align = arg.target_align as u64;
    offset = (offset + align - 1) / align * align;
    offset += arg.target_size as u64;
  }
  offset
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grid_offset_forces_target_size_12() {
    let arg =
      GalliumArg::new("go", GalliumArgKind::Scalar, 4, None, None, false, GalliumArgSemantic::GridOffset).unwrap();
    assert_eq!(arg.target_size, 12);
  }

  #[test]
  fn target_size_rounds_up_to_4() {
    let arg = GalliumArg::new("a", GalliumArgKind::Scalar, 1, None, None, false, GalliumArgSemantic::General).unwrap();
    assert_eq!(arg.target_size, 4);
  }

  #[test]
  fn explicit_misaligned_target_align_rejected() {
    let err = GalliumArg::new("a", GalliumArgKind::Global, 8, None, Some(3), false, GalliumArgSemantic::General);
    assert!(err.is_err());
  }

  #[test]
  fn segment_size_accumulates_with_alignment_padding() {
    let args = vec![
      GalliumArg::new("a", GalliumArgKind::Scalar, 1, None, None, false, GalliumArgSemantic::General).unwrap(),
      GalliumArg::new("b", GalliumArgKind::Global, 8, None, None, false, GalliumArgSemantic::General).unwrap(),
    ];
    assert_eq!(kernarg_segment_size(&args), 4 + 8);
  }
}
