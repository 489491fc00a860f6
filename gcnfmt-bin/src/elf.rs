//! Minimal ELF64 little-endian relocatable-object writer shared by every
//! `BinGenerator`. The `object` crate's high-level `write::Object` builder
//! only knows the architectures it has relocation encodings for, and has no
//! notion of the `EM_AMDGPU` machine type, CAL-note framing or the
//! `NT_AMDGPU_METADATA` msgpack note this format needs, so the actual byte
//! layout is packed by hand here — the same little-endian convention
//! `gcnfmt_core::config`'s packed HSA descriptor already uses. `object::elf`
//! is still the source of truth for the numeric section/symbol-type
//! constants below, instead of bare literals.

use object::elf;

/// Real ELF machine id for AMDGPU target code (System V ABI machine
/// registry); mirrored locally the same way `calnote::note_type` mirrors
/// AMD's CAL headers.
pub const EM_AMDGPU: u16 = 224;

const EHSIZE: u64 = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecType {
  Null,
  Progbits,
  Nobits,
  Strtab,
  Symtab,
  Note,
}

impl SecType {
  fn sh_type(self) -> u32 {
    match self {
      SecType::Null => elf::SHT_NULL as u32,
      SecType::Progbits => elf::SHT_PROGBITS as u32,
      SecType::Nobits => elf::SHT_NOBITS as u32,
      SecType::Strtab => elf::SHT_STRTAB as u32,
      SecType::Symtab => elf::SHT_SYMTAB as u32,
      SecType::Note => elf::SHT_NOTE as u32,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SecFlags {
  pub alloc: bool,
  pub write: bool,
  pub exec: bool,
}

impl SecFlags {
  fn sh_flags(self) -> u64 {
    let mut v = 0u64;
    if self.alloc {
      v |= elf::SHF_ALLOC as u64;
    }
    if self.write {
      v |= elf::SHF_WRITE as u64;
    }
    if self.exec {
      v |= elf::SHF_EXECINSTR as u64;
    }
    v
  }
}

pub struct PendingSection {
  pub name: String,
  pub data: Vec<u8>,
  pub ty: SecType,
  pub flags: SecFlags,
  pub align: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymBind {
  Local,
  Global,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymType {
  NoType,
  Object,
  Func,
  Section,
}

pub struct PendingSymbol {
  pub name: String,
  /// Index into the builder's section list (1-based; 0 means undefined).
  pub section: u32,
  pub value: u64,
  pub size: u64,
  pub bind: SymBind,
  pub ty: SymType,
}

/// Accumulates sections and symbols, then packs one ELF64 `ET_REL` image.
/// Section 0 is the conventional null section; user sections start at
/// index 1. `.shstrtab`, `.symtab` and `.strtab` are appended
/// automatically by [`Builder::finish`].
#[derive(Default)]
pub struct Builder {
  sections: Vec<PendingSection>,
  symbols: Vec<PendingSymbol>,
  machine: u16,
  e_flags: u32,
}

impl Builder {
  pub fn new(machine: u16, e_flags: u32) -> Self {
    Builder { sections: Vec::new(), symbols: Vec::new(), machine, e_flags }
  }

  /// Returns the 1-based section index the caller should use when
  /// pointing a [`PendingSymbol::section`] at this section.
  pub fn add_section(&mut self, name: impl Into<String>, data: Vec<u8>, ty: SecType, flags: SecFlags, align: u64) -> u32 {
    self.sections.push(PendingSection { name: name.into(), data, ty, flags, align: align.max(1) });
    self.sections.len() as u32
  }

  pub fn add_symbol(&mut self, sym: PendingSymbol) {
    self.symbols.push(sym);
  }

  /// Byte offset each added section will land at once [`finish`] lays out
  /// the image, in the same order sections were added. Lets a caller that
  /// nests one `Builder`'s output inside another section (AMDv1's
  /// per-kernel inner ELF) compute a symbol's offset within the outer
  /// section before the inner image is actually finished.
  pub fn section_offsets(&self) -> Vec<u64> {
    let mut offset = EHSIZE;
    let mut out = Vec::with_capacity(self.sections.len());
    for s in &self.sections {
      offset = align_up(offset, s.align);
      out.push(offset);
      offset += s.data.len() as u64;
    }
    out
  }

  pub fn finish(self) -> Vec<u8> {
    let mut strtab = StrTab::new();
    let mut shstrtab = StrTab::new();

    // Section name offsets, computed before layout so headers can embed them.
    let sh_names: Vec<u32> = self.sections.iter().map(|s| shstrtab.intern(&s.name)).collect();
    shstrtab.intern(".shstrtab");
    shstrtab.intern(".symtab");
    shstrtab.intern(".strtab");

    // Symbol name offsets; symbol 0 is always the null symbol (empty name).
    strtab.intern("");
    let st_names: Vec<u32> = self.symbols.iter().map(|s| strtab.intern(&s.name)).collect();

    const SHENTSIZE: u64 = 64;
    const SYMENTSIZE: u64 = 24;

    // Lay out section contents back-to-back after the header, respecting
    // each section's requested alignment.
    let mut offset = EHSIZE;
    let sec_offsets = self.section_offsets();
    if let Some(&last) = sec_offsets.last() {
      let last_idx = sec_offsets.len() - 1;
      offset = last + self.sections[last_idx].data.len() as u64;
    }

    offset = align_up(offset, 8);
    let shstrtab_offset = offset;
    offset += shstrtab.bytes.len() as u64;

    offset = align_up(offset, 8);
    let symtab_offset = offset;
    let num_syms = self.symbols.len() as u64 + 1; // +1 for the null symbol
    offset += num_syms * SYMENTSIZE;

    offset = align_up(offset, 8);
    let strtab_offset = offset;
    offset += strtab.bytes.len() as u64;

    offset = align_up(offset, 8);
    let sh_offset = offset;

    // Section header indices: 0 = null, 1..=N = user sections,
    // N+1 = .shstrtab, N+2 = .symtab, N+3 = .strtab.
    let n = self.sections.len() as u32;
    let shstrtab_idx = n + 1;
    let strtab_idx = n + 3;
    let shnum = n + 4;

    let mut out = Vec::with_capacity((sh_offset + shnum as u64 * SHENTSIZE) as usize);
    let mut w = Writer(&mut out);

    // e_ident
    w.bytes(&[0x7f, b'E', b'L', b'F']);
    w.u8(2); // ELFCLASS64
    w.u8(1); // ELFDATA2LSB
    w.u8(elf::EV_CURRENT as u8);
    w.u8(0); // ELFOSABI_NONE
    w.bytes(&[0u8; 8]); // abi version + padding

    w.u16(elf::ET_REL as u16);
    w.u16(self.machine);
    w.u32(elf::EV_CURRENT as u32);
    w.u64(0); // e_entry
    w.u64(0); // e_phoff
    w.u64(sh_offset);
    w.u32(self.e_flags);
    w.u16(EHSIZE as u16);
    w.u16(0); // e_phentsize
    w.u16(0); // e_phnum
    w.u16(SHENTSIZE as u16);
    w.u16(shnum as u16);
    w.u16(shstrtab_idx as u16);

    for (i, s) in self.sections.iter().enumerate() {
      pad_to(&mut out, sec_offsets[i]);
      out.extend_from_slice(&s.data);
    }
    pad_to(&mut out, shstrtab_offset);
    out.extend_from_slice(&shstrtab.bytes);
    pad_to(&mut out, symtab_offset);

    // null symbol
    write_sym(&mut out, 0, 0, 0, 0, 0);
    for (i, s) in self.symbols.iter().enumerate() {
      let info = (sym_bind(s.bind) << 4) | sym_type(s.ty);
      write_sym(&mut out, st_names[i], info, s.section as u16, s.value, s.size);
    }

    pad_to(&mut out, strtab_offset);
    out.extend_from_slice(&strtab.bytes);
    pad_to(&mut out, sh_offset);

    write_shdr(&mut out, 0, elf::SHT_NULL as u32, 0, 0, 0, 0, 0, 0, 0, 0);
    for (i, s) in self.sections.iter().enumerate() {
      write_shdr(
        &mut out,
        sh_names[i],
        s.ty.sh_type(),
        s.flags.sh_flags(),
        0,
        sec_offsets[i],
        s.data.len() as u64,
        0,
        0,
        s.align,
        0,
      );
    }
    write_shdr(
      &mut out,
      shstrtab.intern(".shstrtab"),
      elf::SHT_STRTAB as u32,
      0,
      0,
      shstrtab_offset,
      shstrtab.bytes.len() as u64,
      0,
      0,
      1,
      0,
    );
    write_shdr(
      &mut out,
      shstrtab.intern(".symtab"),
      elf::SHT_SYMTAB as u32,
      0,
      0,
      symtab_offset,
      num_syms * SYMENTSIZE,
      strtab_idx,
      1, // one-past the last local symbol; all symbols here are emitted local-first by convention
      8,
      SYMENTSIZE,
    );
    write_shdr(
      &mut out,
      shstrtab.intern(".strtab"),
      elf::SHT_STRTAB as u32,
      0,
      0,
      strtab_offset,
      strtab.bytes.len() as u64,
      0,
      0,
      1,
      0,
    );

    out
  }
}

fn sym_bind(b: SymBind) -> u8 {
  match b {
    SymBind::Local => elf::STB_LOCAL as u8,
    SymBind::Global => elf::STB_GLOBAL as u8,
  }
}

fn sym_type(t: SymType) -> u8 {
  match t {
    SymType::NoType => elf::STT_NOTYPE as u8,
    SymType::Object => elf::STT_OBJECT as u8,
    SymType::Func => elf::STT_FUNC as u8,
    SymType::Section => elf::STT_SECTION as u8,
  }
}

fn align_up(v: u64, align: u64) -> u64 {
  if align <= 1 {
    return v;
  }
  (v + align - 1) / align * align
}

fn pad_to(out: &mut Vec<u8>, target: u64) {
  while (out.len() as u64) < target {
    out.push(0);
  }
}

#[allow(clippy::too_many_arguments)]
fn write_shdr(out: &mut Vec<u8>, name: u32, ty: u32, flags: u64, addr: u64, offset: u64, size: u64, link: u32, info: u32, align: u64, entsize: u64) {
  let mut w = Writer(out);
  w.u32(name);
  w.u32(ty);
  w.u64(flags);
  w.u64(addr);
  w.u64(offset);
  w.u64(size);
  w.u32(link);
  w.u32(info);
  w.u64(align);
  w.u64(entsize);
}

fn write_sym(out: &mut Vec<u8>, name: u32, info: u8, shndx: u16, value: u64, size: u64) {
  let mut w = Writer(out);
  w.u32(name);
  w.u8(info);
  w.u8(0); // st_other
  w.u16(shndx);
  w.u64(value);
  w.u64(size);
}

struct Writer<'a>(&'a mut Vec<u8>);
impl<'a> Writer<'a> {
  fn bytes(&mut self, v: &[u8]) {
    self.0.extend_from_slice(v);
  }
  fn u8(&mut self, v: u8) {
    self.0.push(v);
  }
  fn u16(&mut self, v: u16) {
    self.0.extend_from_slice(&v.to_le_bytes());
  }
  fn u32(&mut self, v: u32) {
    self.0.extend_from_slice(&v.to_le_bytes());
  }
  fn u64(&mut self, v: u64) {
    self.0.extend_from_slice(&v.to_le_bytes());
  }
}

struct StrTab {
  bytes: Vec<u8>,
  offsets: gcnfmt_core::hash::HashMap<String, u32>,
}

impl StrTab {
  fn new() -> Self {
    StrTab { bytes: vec![0u8], offsets: gcnfmt_core::hash::new_hash_map() }
  }

  fn intern(&mut self, s: &str) -> u32 {
    if s.is_empty() {
      return 0;
    }
    if let Some(&off) = self.offsets.get(s) {
      return off;
    }
    let off = self.bytes.len() as u32;
    self.bytes.extend_from_slice(s.as_bytes());
    self.bytes.push(0);
    self.offsets.insert(s.to_string(), off);
    off
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_goblin() {
    let mut b = Builder::new(EM_AMDGPU, 0);
    let text = b.add_section(".text", vec![0x90; 16], SecType::Progbits, SecFlags { alloc: true, write: false, exec: true }, 4);
    b.add_symbol(PendingSymbol { name: "foo_kernel".into(), section: text, value: 0, size: 16, bind: SymBind::Global, ty: SymType::Func });
    let bytes = b.finish();

    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf64");
    assert_eq!(parsed.header.e_machine, EM_AMDGPU);
    assert!(parsed.section_headers.iter().any(|s| parsed.shdr_strtab.get_at(s.sh_name) == Some(".text")));
    assert!(parsed.syms.iter().any(|s| parsed.strtab.get_at(s.st_name) == Some("foo_kernel")));
  }

  #[test]
  fn empty_object_still_parses() {
    let b = Builder::new(EM_AMDGPU, 0);
    let bytes = b.finish();
    let parsed = goblin::elf::Elf::parse(&bytes).expect("valid elf64");
    assert_eq!(parsed.header.e_type, elf::ET_REL as u16);
  }
}
