//! §4.7 AMDv1 CAL notes: fixed-order, 8-byte `"ATI CAL\0"`-named ELF notes
//! carrying the classic AMD Catalyst driver's per-kernel program info.

/// Real CAL note type ids, as published by AMD's Compute Abstraction Layer
/// headers; kept verbatim so the emitted notes match what a Catalyst-era
/// runtime actually expects.
pub mod note_type {
  pub const INPUTS: u32 = 2;
  pub const OUTPUTS: u32 = 3;
  pub const UAV: u32 = 4;
  pub const CONDOUT: u32 = 7;
  pub const FLOAT32CONSTS: u32 = 8;
  pub const INT32CONSTS: u32 = 9;
  pub const BOOL32CONSTS: u32 = 10;
  pub const EARLYEXIT: u32 = 11;
  pub const GLOBAL_BUFFERS: u32 = 12;
  pub const CONSTANT_BUFFERS: u32 = 13;
  pub const INPUT_SAMPLERS: u32 = 14;
  pub const SCRATCH_BUFFERS: u32 = 15;
  pub const PERSISTENT_BUFFERS: u32 = 16;
  pub const PROGINFO: u32 = 17;
  pub const SUB_CONSTANT_BUFFERS: u32 = 18;
  pub const UAV_MAILBOX_SIZE: u32 = 19;
  pub const UAV_OP_MASK: u32 = 20;
}

/// §8.1 "CAL note framing": a little-endian `(nameSize=8, descSize, type)`
/// header, `CAL_NOTE_NAME`, then the payload — 20 + descSize bytes total,
/// matching CLRX's `CALNoteHeader`/`putCALNoteLE`.
pub const CAL_NOTE_NAME: &[u8; 8] = b"ATI CAL\0";

pub fn frame_note(note_type: u32, payload: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(4 + 4 + 4 + CAL_NOTE_NAME.len() + payload.len());
  out.extend_from_slice(&(CAL_NOTE_NAME.len() as u32).to_le_bytes());
  out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
  out.extend_from_slice(&note_type.to_le_bytes());
  out.extend_from_slice(CAL_NOTE_NAME);
  out.extend_from_slice(payload);
  out
}

/// One entry of the UAV CAL note: `(id, f1, f2, kind)`, 16 bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UavEntry {
  pub id: u32,
  pub f1: u32,
  pub f2: u32,
  pub kind: u32,
}

impl UavEntry {
  pub fn to_le_bytes(self) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&self.id.to_le_bytes());
    out[4..8].copy_from_slice(&self.f1.to_le_bytes());
    out[8..12].copy_from_slice(&self.f2.to_le_bytes());
    out[12..16].copy_from_slice(&self.kind.to_le_bytes());
    out
  }

  /// A write-only image UAV: `(id, 2, dim, 3|5)` — `5` when the image is
  /// also resolvable as a 3D target, `3` otherwise.
  pub fn write_only_image(id: u32, dim: u32, is_3d: bool) -> Self {
    UavEntry { id, f1: 2, f2: dim, kind: if is_3d { 5 } else { 3 } }
  }

  pub fn global_pointer(id: u32) -> Self {
    UavEntry { id, f1: 4, f2: 0, kind: 5 }
  }

  pub fn printf_buffer(id: u32) -> Self {
    UavEntry { id, f1: 4, f2: 0, kind: 2 }
  }
}

/// `.userdata dataClass, apiSlot, regStart, regSize` — one USER_SGPR
/// mapping entry (`AsmAmdFormat.cpp`'s `AmdUserData`/`addUserData`).
/// `reg_start` is 0-15 and `reg_start + reg_size` must not exceed 16; a
/// kernel may declare at most 16 of these.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub struct UserData {
  pub data_class: u32,
  pub api_slot: u32,
  pub reg_start: u32,
  pub reg_size: u32,
}

pub const MAX_USER_DATA_ELEMS: usize = 16;

/// `.userdata`'s `dataClass` keyword table, sorted for `value::enumeration`
/// (`AsmAmdFormat.cpp`'s `dataClassMap`).
pub const DATA_CLASS_NAMES: &[(&str, u32)] = &[
  ("imm_alu_bool32_const", 0x06),
  ("imm_alu_float_const", 0x05),
  ("imm_const_buffer", 0x02),
  ("imm_context_base", 0x1d),
  ("imm_dispatch_id", 0x0c),
  ("imm_gds_counter_range", 0x07),
  ("imm_gds_memory_range", 0x08),
  ("imm_generic_user_data", 0x20),
  ("imm_global_offset", 0x1f),
  ("imm_gws_base", 0x09),
  ("imm_heap_buffer", 0x0e),
  ("imm_kernel_arg", 0x0f),
  ("imm_lds_esgs_size", 0x1e),
  ("imm_resource", 0x00),
  ("imm_sampler", 0x01),
  ("imm_scratch_buffer", 0x0d),
  ("imm_uav", 0x04),
  ("imm_vertex_buffer", 0x03),
  ("imm_work_group_range", 0x0b),
  ("imm_work_item_range", 0x0a),
  ("ptr_const_buffer_table", 0x14),
  ("ptr_extended_user_data", 0x19),
  ("ptr_indirect_internal_resource", 0x1b),
  ("ptr_indirect_resource", 0x1a),
  ("ptr_indirect_uav", 0x1c),
  ("ptr_internal_global_table", 0x18),
  ("ptr_internal_resource_table", 0x12),
  ("ptr_resource_table", 0x11),
  ("ptr_sampler_table", 0x13),
  ("ptr_so_buffer_table", 0x16),
  ("ptr_uav_table", 0x17),
  ("ptr_vertex_buffer_table", 0x15),
  ("sub_ptr_fetch_shader", 0x10),
];

/// PROGINFO payload: a run of `(key, value)` 32-bit pairs, per §4.7 —
/// `numUserElements`, four pairs per user-data entry (`dataClass`,
/// `apiSlot`, `regStart`, `regSize`), the eleven scalar fields below, then
/// one pair per UAV-mask word. Keys are the well-known AMD CAL PROGINFO
/// keys; only the handful the finaliser actually populates are listed here
/// as named fields, the rest default to zero.
#[derive(Clone, Debug, Default)]
pub struct ProgInfo {
  pub user_data: Vec<UserData>,
  pub used_vgprs: u32,
  pub used_sgprs: u32,
  pub max_sgprs: u32,
  pub max_vgprs: u32,
  pub float_mode: u32,
  pub ieee_mode: u32,
  pub scratch_regs: u32,
  pub pgm_rsrc2: u32,
  pub reqd_work_group_size: [u32; 3],
  /// `uavMask[0] |= (1<<uavId)` conditionally set — see
  /// `uav_mask_bit`.
  pub uav_mask: [u32; 32],
}

const PROGINFO_KEY_NUM_USER_ELEMENTS: u32 = 0x8000_1000;
const PROGINFO_KEY_USER_DATA_BASE: u32 = 0x8000_1001;
const PROGINFO_KEY_USED_VGPRS: u32 = 0x8000_0081;
const PROGINFO_KEY_USED_SGPRS: u32 = 0x8000_0082;
const PROGINFO_KEY_MAX_SGPRS: u32 = 0x8000_0084;
const PROGINFO_KEY_MAX_VGPRS: u32 = 0x8000_0085;
const PROGINFO_KEY_FLOAT_MODE: u32 = 0x8000_0086;
const PROGINFO_KEY_IEEE_MODE: u32 = 0x8000_0087;
const PROGINFO_KEY_SCRATCH_REGS: u32 = 0x8000_0088;
const PROGINFO_KEY_PGM_RSRC2: u32 = 0x8000_0089;
const PROGINFO_KEY_RWGS_X: u32 = 0x8000_008a;
const PROGINFO_KEY_RWGS_Y: u32 = 0x8000_008b;
const PROGINFO_KEY_RWGS_Z: u32 = 0x8000_008c;
const PROGINFO_KEY_UAV_MASK_BASE: u32 = 0x8000_0c00;

impl ProgInfo {
  /// Per the Design Notes' resolution of the `uavMask` open question: set
  /// bit `uav_id` of `uavMask[0]` only when constant-data UAV usage is
  /// enabled and the targeted driver is new enough to understand the bit.
  pub fn uav_mask_bit(&mut self, uav_id: u32, use_const_data: bool, driver_version: Option<u32>) {
    if use_const_data && driver_version.map_or(false, |v| v >= 1348_05) && uav_id < 32 {
      self.uav_mask[0] |= 1 << uav_id;
    }
  }

  pub fn to_le_bytes(&self) -> Vec<u8> {
    let mut pairs: Vec<(u32, u32)> = vec![(PROGINFO_KEY_NUM_USER_ELEMENTS, self.user_data.len() as u32)];
    for (i, u) in self.user_data.iter().enumerate() {
      let base = PROGINFO_KEY_USER_DATA_BASE + (i as u32) * 4;
      pairs.push((base, u.data_class));
      pairs.push((base + 1, u.api_slot));
      pairs.push((base + 2, u.reg_start));
      pairs.push((base + 3, u.reg_size));
    }
    pairs.push((PROGINFO_KEY_USED_VGPRS, self.used_vgprs));
    pairs.push((PROGINFO_KEY_USED_SGPRS, self.used_sgprs));
    pairs.push((PROGINFO_KEY_MAX_SGPRS, self.max_sgprs));
    pairs.push((PROGINFO_KEY_MAX_VGPRS, self.max_vgprs));
    pairs.push((PROGINFO_KEY_FLOAT_MODE, self.float_mode));
    pairs.push((PROGINFO_KEY_IEEE_MODE, self.ieee_mode));
    pairs.push((PROGINFO_KEY_SCRATCH_REGS, self.scratch_regs));
    pairs.push((PROGINFO_KEY_PGM_RSRC2, self.pgm_rsrc2));
    pairs.push((PROGINFO_KEY_RWGS_X, self.reqd_work_group_size[0]));
    pairs.push((PROGINFO_KEY_RWGS_Y, self.reqd_work_group_size[1]));
    pairs.push((PROGINFO_KEY_RWGS_Z, self.reqd_work_group_size[2]));
    for (i, &word) in self.uav_mask.iter().enumerate() {
      pairs.push((PROGINFO_KEY_UAV_MASK_BASE + i as u32, word));
    }

    let mut out = Vec::with_capacity(pairs.len() * 8);
    for (k, v) in pairs {
      out.extend_from_slice(&k.to_le_bytes());
      out.extend_from_slice(&v.to_le_bytes());
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn note_framing_matches_20_plus_desc_size() {
    let note = frame_note(note_type::CONDOUT, &[0u8; 4]);
    assert_eq!(&note[12..20], CAL_NOTE_NAME);
    assert_eq!(note.len(), 20 + 4);
    assert_eq!(u32::from_le_bytes(note[0..4].try_into().unwrap()), 8);
    assert_eq!(u32::from_le_bytes(note[4..8].try_into().unwrap()), 4);
    assert_eq!(u32::from_le_bytes(note[8..12].try_into().unwrap()), note_type::CONDOUT);
  }

  #[test]
  fn proginfo_size_grows_by_four_pairs_per_user_data_entry() {
    let empty = ProgInfo::default().to_le_bytes().len();
    let entry = UserData { data_class: 0x02, api_slot: 0, reg_start: 0, reg_size: 2 };
    let one_entry = ProgInfo { user_data: vec![entry], ..Default::default() }.to_le_bytes().len();
    assert_eq!(one_entry, empty + 4 * 8);
  }

  #[test]
  fn uav_mask_requires_const_data_and_driver_version() {
    let mut pi = ProgInfo::default();
    pi.uav_mask_bit(3, false, Some(1400_00));
    assert_eq!(pi.uav_mask[0], 0);
    pi.uav_mask_bit(3, true, Some(1300_00));
    assert_eq!(pi.uav_mask[0], 0);
    pi.uav_mask_bit(3, true, Some(1348_05));
    assert_eq!(pi.uav_mask[0], 1 << 3);
  }
}
