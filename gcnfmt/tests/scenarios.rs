//! End-to-end scenarios driving a `Dialect` through its harness front-end,
//! `prepare_binary`, and the real `gcnfmt-bin` ELF generator in one pass.
//! Where a scenario needs byte-level label placement the rest of the
//! toolchain (section registry + ISA encoder) isn't modelled here, the
//! `*Input` structure is built directly instead, matching the numbers the
//! scenario names — the same gap `gcnfmt-bin`'s own unit tests already work
//! within (kernel code bytes are an external `IsaEncoder` concern).

use gcnfmt::harness::TestFront;
use gcnfmt::{dispatch_directive, generate_binary, Dialect};
use gcnfmt_core::arch::GPUArchitecture;
use gcnfmt_core::config::EnableSgprFlags;
use gcnfmt_core::handler::{DialectHandler, StmtPlace};

fn syms(bytes: &[u8]) -> Vec<String> {
  let parsed = goblin::elf::Elf::parse(bytes).expect("valid elf");
  parsed.syms.iter().filter_map(|s| parsed.strtab.get_at(s.st_name)).map(|s| s.to_string()).collect()
}

fn sec_names(bytes: &[u8]) -> Vec<String> {
  let parsed = goblin::elf::Elf::parse(bytes).expect("valid elf");
  parsed.section_headers.iter().filter_map(|s| parsed.shdr_strtab.get_at(s.sh_name)).map(|s| s.to_string()).collect()
}

/// S1 — minimal ROCm kernel: one kernel, plain register/dimension
/// directives and `.use_kernarg_segment_ptr`, no explicit `.config`
/// overrides for anything else.
#[test]
fn s1_minimal_rocm_kernel() {
  let mut dialect = Dialect::new_rocm(GPUArchitecture::Gcn1_2);
  let mut front = TestFront::new("Fiji");

  dialect.add_kernel(&mut front, "k").unwrap();
  dispatch_directive(&mut dialect, &mut front, "dims", StmtPlace::Kernel, "x").unwrap();
  dispatch_directive(&mut dialect, &mut front, "sgprsnum", StmtPlace::Kernel, "16").unwrap();
  dispatch_directive(&mut dialect, &mut front, "vgprsnum", StmtPlace::Kernel, "8").unwrap();
  dispatch_directive(&mut dialect, &mut front, "use_kernarg_segment_ptr", StmtPlace::Kernel, "").unwrap();
  assert!(front.diagnostics.good());

  assert!(dialect.prepare_binary(&mut front));
  let handler = match &dialect {
    Dialect::Rocm(h) => h,
    _ => panic!("expected Rocm"),
  };
  let out = handler.output().expect("prepare_binary populated output");
  let config = out.kernels[0].config.as_ref().expect("hsa descriptor present");

  assert!(config.enable_sgpr_flags.contains(EnableSgprFlags::KERNARG_SEGMENT_PTR));
  assert_eq!(config.dim_mask, Some(1));
  assert_eq!(config.wavefront_sgpr_count, Some(16));
  assert_eq!(config.workitem_vgpr_count, Some(8));
  // user_sgpr_count(2) << 1 | dim_mask(1) << 7 == 4 | 128
  assert_eq!(config.compute_pgm_rsrc2 & 0x3be, 132);

  let bytes = generate_binary(&dialect).unwrap();
  assert!(syms(&bytes).contains(&"k.kd".to_string()));
}

/// S2 — AMDv1 two kernels. Each kernel takes the driver-computed
/// (`.config`-or-default) path rather than `.header`/`.metadata`'s raw
/// byte-literal path, since injecting raw section bytes needs the real
/// byte-literal assembler machinery this crate doesn't reimplement; the
/// generated symbol triple and disjoint unique-id behaviour are identical
/// either way.
#[test]
fn s2_amdv1_two_kernel_classic() {
  let mut dialect = Dialect::new_amdv1(GPUArchitecture::Gcn1_0);
  let mut front = TestFront::new("Tahiti");

  dialect.add_kernel(&mut front, "a").unwrap();
  dialect.add_kernel(&mut front, "b").unwrap();
  assert!(dialect.prepare_binary(&mut front));

  let handler = match &dialect {
    Dialect::AmdV1(h) => h,
    _ => panic!("expected AmdV1"),
  };
  let out = handler.output().expect("prepare_binary populated output");
  let uid = |kernel: &str| -> u32 {
    let metadata = out.kernels.iter().find(|k| k.name == kernel).unwrap();
    let text = String::from_utf8(metadata.metadata.clone()).unwrap();
    let line = text.lines().find(|l| l.starts_with(";uniqueid:")).unwrap();
    line.trim_start_matches(";uniqueid:").parse().unwrap()
  };
  assert_ne!(uid("a"), uid("b"));

  let bytes = generate_binary(&dialect).unwrap();
  let names = syms(&bytes);
  for kernel in ["a", "b"] {
    assert!(names.contains(&format!("__OpenCL_{}_kernel", kernel)));
    assert!(names.contains(&format!("__OpenCL_{}_metadata", kernel)));
    assert!(names.contains(&format!("__OpenCL_{}_header", kernel)));
  }
}

/// S3 — AMDCL2 HSA layout, two kernels sharing one inner `.text`. Label
/// placement (`k1:`/`.p2align 8`/`k2:`) is a section-registry concern
/// outside this crate's scope, so the already-resolved offsets the real
/// assembler would have produced are supplied directly: `k1` at 0 with a
/// 256-byte code size, `k2` at the next 512-byte boundary, satisfying
/// `codeSize(k1) == offset(k2) - offset(k1) - 256`.
#[test]
fn s3_amdcl2_hsa_layout_shared_text() {
  use gcnfmt_amdcl2::input::{AmdCl2Input, AmdCl2KernelInput};

  let input = AmdCl2Input {
    is_hsa_layout: true,
    inner_text: vec![0u8; 512],
    kernels: vec![
      AmdCl2KernelInput { name: "k1".into(), hsa_offset: Some(0), hsa_code_size: Some(256), ..Default::default() },
      AmdCl2KernelInput { name: "k2".into(), hsa_offset: Some(512), hsa_code_size: Some(0), ..Default::default() },
    ],
    ..Default::default()
  };
  let k1 = &input.kernels[0];
  let k2 = &input.kernels[1];
  assert_eq!(k1.hsa_code_size.unwrap(), k2.hsa_offset.unwrap() - k1.hsa_offset.unwrap() - 256);

  use gcnfmt_bin::BinGenerator;
  let bytes = input.generate().unwrap();
  let parsed = goblin::elf::Elf::parse(&bytes).unwrap();
  // Both resolve from the outer ELF's own symtab, offset by a shared base
  // (the nested inner ELF's header) — only their separation is meaningful.
  let k1 = parsed.syms.iter().find(|s| parsed.strtab.get_at(s.st_name) == Some("__OpenCL_k1_kernel")).unwrap();
  let k2 = parsed.syms.iter().find(|s| parsed.strtab.get_at(s.st_name) == Some("__OpenCL_k2_kernel")).unwrap();
  assert_eq!(k2.st_value - k1.st_value, 512);
}

/// S4 — Gallium with an LLVM 4.0+ config. `.dims`/`.sgprsnum`/
/// `.hsa_pgmrsrc1` all resolve to the HSA descriptor shape once the
/// declared LLVM version is above the HSA threshold; the classic
/// `prog_info` array and scratch-reloc list both stay empty on that path.
#[test]
fn s4_gallium_llvm4_hsa_config() {
  let mut dialect = Dialect::new_gallium(GPUArchitecture::Gcn1_2);
  let mut front = TestFront::new("gfx803");

  dispatch_directive(&mut dialect, &mut front, "llvm_version", StmtPlace::Global, "40000").unwrap();
  dialect.add_kernel(&mut front, "k").unwrap();
  dispatch_directive(&mut dialect, &mut front, "dims", StmtPlace::Kernel, "xy").unwrap();
  dispatch_directive(&mut dialect, &mut front, "sgprsnum", StmtPlace::Kernel, "8").unwrap();
  dispatch_directive(&mut dialect, &mut front, "hsa_pgmrsrc1", StmtPlace::Kernel, "0x000C0040").unwrap();
  assert!(front.diagnostics.good());

  assert!(dialect.prepare_binary(&mut front));
  let handler = match &dialect {
    Dialect::Gallium(h) => h,
    _ => panic!("expected Gallium"),
  };
  let out = handler.output().expect("prepare_binary populated output");
  assert!(out.kernels[0].prog_info.is_empty());
  assert!(out.scratch_relocs.is_empty());

  let bytes = generate_binary(&dialect).unwrap();
  assert!(syms(&bytes).contains(&"__OpenCL_k_kernel".to_string()));
  assert!(!sec_names(&bytes).contains(&".AMDGPU.config".to_string()));
}

/// S5 — ROCm GOT. `.gotsym ext, extGot` records `ext` in the module's
/// GOT-symbol list and defines `extGot` at that slot's offset into `.got`.
#[test]
fn s5_rocm_got_symbol() {
  let mut dialect = Dialect::new_rocm(GPUArchitecture::Gcn1_2);
  let mut front = TestFront::new("Fiji");

  dialect.add_kernel(&mut front, "k").unwrap();
  dispatch_directive(&mut dialect, &mut front, "gotsym", StmtPlace::Global, "ext, extGot").unwrap();
  assert!(front.diagnostics.good());

  assert!(dialect.prepare_binary(&mut front));
  let handler = match &dialect {
    Dialect::Rocm(h) => h,
    _ => panic!("expected Rocm"),
  };
  let out = handler.output().expect("prepare_binary populated output");
  assert_eq!(out.got_entries.len(), 1);
  assert_eq!(out.got_entries[0].got_symbol, "ext");

  let bytes = generate_binary(&dialect).unwrap();
  assert!(sec_names(&bytes).contains(&".got".to_string()));
  let parsed = goblin::elf::Elf::parse(&bytes).unwrap();
  let sym = parsed.syms.iter().find(|s| parsed.strtab.get_at(s.st_name) == Some("extGot")).expect("extGot defined");
  assert_eq!(sym.st_value, 0);
  let got = parsed.section_headers.iter().find(|s| parsed.shdr_strtab.get_at(s.sh_name) == Some(".got")).unwrap();
  assert_eq!(got.sh_size, 8);
}

/// S7 — AMDv1 `.userdata`: each directive records one USER_SGPR mapping
/// entry keyed by a `dataClass` keyword; an out-of-range `regStart` is
/// rejected as a diagnostic without being recorded.
#[test]
fn s7_amdv1_userdata_entries() {
  let mut dialect = Dialect::new_amdv1(GPUArchitecture::Gcn1_0);
  let mut front = TestFront::new("Tahiti");

  dialect.add_kernel(&mut front, "k").unwrap();
  dispatch_directive(&mut dialect, &mut front, "userdata", StmtPlace::Kernel, "imm_const_buffer, 0, 0, 2").unwrap();
  dispatch_directive(&mut dialect, &mut front, "userdata", StmtPlace::Kernel, "imm_uav, 1, 2, 4").unwrap();
  assert!(front.diagnostics.good());

  dispatch_directive(&mut dialect, &mut front, "userdata", StmtPlace::Kernel, "imm_uav, 0, 16, 1").unwrap();
  assert_eq!(front.diagnostics.errors().len(), 1);
  assert!(front.diagnostics.errors()[0].message.contains("RegStart out of range"));

  assert!(dialect.prepare_binary(&mut front));
  let handler = match &dialect {
    Dialect::AmdV1(h) => h,
    _ => panic!("expected AmdV1"),
  };
  let out = handler.output().expect("prepare_binary populated output");
  assert_eq!(out.kernels[0].prog_info.user_data.len(), 2);
  assert_eq!(out.kernels[0].prog_info.user_data[1].reg_start, 2);
}

/// S6 — directive cross-contamination: a Gallium-format module using
/// `.metadata` (a ROCm-only directive) emits exactly one diagnostic naming
/// ROCm; a driver gates the `prepareBinary` stage on the front-end's error
/// count the same way the original tool's `assemble()` does, so a module
/// left in this state never reaches `prepare_binary` at all.
#[test]
fn s6_cross_dialect_directive_is_rejected() {
  let mut dialect = Dialect::new_gallium(GPUArchitecture::Gcn1_2);
  let mut front = TestFront::new("gfx803");

  dialect.add_kernel(&mut front, "k").unwrap();
  dispatch_directive(&mut dialect, &mut front, "metadata", StmtPlace::Kernel, "").unwrap();

  assert_eq!(front.diagnostics.errors().len(), 1);
  assert_eq!(front.diagnostics.errors()[0].message, "ROCm pseudo-op can be defined only in ROCm format code");
  assert!(!front.diagnostics.good());
}
