//! §3.2 Kernel and §4.5 the kernel lifecycle / register save-restore
//! protocol.

use crate::config::ConfigStore;
use crate::error::AsmError;
use crate::front::RegAllocSnapshot;
use crate::section::SectionId;

/// One `.kernel name` block. `config` is `None` until the kernel's first
/// config-related directive creates it in the classic or HSA shape (§3.3).
#[derive(Debug)]
pub struct Kernel {
  pub name: String,
  pub config: Option<ConfigStore>,
  /// The section/register state to restore when this kernel becomes
  /// current again (§4.4's save/restore protocol, §8.1 "register
  /// save/restore"). Updated every time the front-end switches away.
  saved_section: Option<SectionId>,
  saved_regs: RegAllocSnapshot,
}

impl Kernel {
  fn new(name: impl Into<String>) -> Self {
    Kernel { name: name.into(), config: None, saved_section: None, saved_regs: RegAllocSnapshot::default() }
  }
}

/// §4.5: every kernel ever opened, plus which one (if any) is current.
/// Switching between kernels — including back to one already visited —
/// saves the outgoing kernel's section/register snapshot and restores the
/// incoming one's, matching §3.2's single `currentKernel` pointer rather
/// than a nested scope stack.
#[derive(Debug, Default)]
pub struct KernelState {
  kernels: Vec<Kernel>,
  by_name: crate::hash::HashMap<String, usize>,
  current: Option<usize>,
}

impl KernelState {
  pub fn new() -> Self {
    KernelState { kernels: Vec::new(), by_name: crate::hash::new_hash_map(), current: None }
  }

  /// `.kernel name`: create a new kernel and make it current, saving the
  /// outgoing kernel's section/register state first (§3.2 uniqueness
  /// invariant: names don't repeat).
  pub fn open_kernel(
    &mut self,
    name: impl Into<String>,
    current_section: Option<SectionId>,
    current_regs: RegAllocSnapshot,
  ) -> Result<usize, AsmError> {
    let name = name.into();
    if self.by_name.contains_key(&name) {
      return Err(AsmError::structural(format!("kernel '{}' already defined", name)));
    }
    self.save_outgoing(current_section, current_regs);
    let index = self.kernels.len();
    self.kernels.push(Kernel::new(name.clone()));
    self.by_name.insert(name, index);
    self.current = Some(index);
    Ok(index)
  }

  fn save_outgoing(&mut self, current_section: Option<SectionId>, current_regs: RegAllocSnapshot) {
    if let Some(idx) = self.current {
      let kernel = &mut self.kernels[idx];
      kernel.saved_section = current_section;
      kernel.saved_regs = current_regs;
    }
  }

  /// `switchKernel(id)`: make kernel `id` current, saving the outgoing
  /// kernel's section/register state and returning the incoming kernel's
  /// saved state to restore (§8.1 "register save/restore").
  pub fn switch_to(
    &mut self,
    id: usize,
    outgoing_section: Option<SectionId>,
    outgoing_regs: RegAllocSnapshot,
  ) -> Result<(Option<SectionId>, RegAllocSnapshot), AsmError> {
    if id >= self.kernels.len() {
      return Err(AsmError::structural("switchKernel: unknown kernel id"));
    }
    self.save_outgoing(outgoing_section, outgoing_regs);
    self.current = Some(id);
    let kernel = &self.kernels[id];
    Ok((kernel.saved_section, kernel.saved_regs))
  }

  pub fn current(&self) -> Option<&Kernel> {
    self.current.map(|i| &self.kernels[i])
  }

  pub fn current_mut(&mut self) -> Option<&mut Kernel> {
    match self.current {
      Some(i) => Some(&mut self.kernels[i]),
      None => None,
    }
  }

  pub fn current_index(&self) -> Option<usize> {
    self.current
  }

  pub fn by_name(&self, name: &str) -> Option<&Kernel> {
    self.by_name.get(name).map(|&i| &self.kernels[i])
  }

  pub fn by_index(&self, idx: usize) -> Option<&Kernel> {
    self.kernels.get(idx)
  }

  pub fn by_index_mut(&mut self, idx: usize) -> Option<&mut Kernel> {
    self.kernels.get_mut(idx)
  }

  pub fn index_of(&self, name: &str) -> Option<usize> {
    self.by_name.get(name).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Kernel> {
    self.kernels.iter()
  }

  pub fn len(&self) -> usize {
    self.kernels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.kernels.is_empty()
  }

  /// `.kernel` order is also the order in which the finaliser assigns
  /// kernel-offset fields (§4.7 step 1) — handlers get it for free here.
  pub fn names_in_order(&self) -> impl Iterator<Item = &str> {
    self.kernels.iter().map(|k| k.name.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::RegCountFlags;

  #[test]
  fn reopening_same_name_is_rejected() {
    let mut ks = KernelState::new();
    ks.open_kernel("foo", None, RegAllocSnapshot::default()).unwrap();
    let err = ks.open_kernel("foo", None, RegAllocSnapshot::default());
    assert!(err.is_err());
  }

  #[test]
  fn switching_away_and_back_restores_snapshot() {
    let mut ks = KernelState::new();
    let a = ks.open_kernel("a", Some(SectionId(1)), RegAllocSnapshot::default()).unwrap();
    let regs_a = RegAllocSnapshot { sgprs: 8, vgprs: 4, flags: RegCountFlags::default() };
    let b = ks.open_kernel("b", Some(SectionId(2)), regs_a).unwrap();
    assert_ne!(a, b);

    let regs_b = RegAllocSnapshot { sgprs: 16, vgprs: 32, flags: RegCountFlags::default() };
    let (section, restored) = ks.switch_to(a, Some(SectionId(3)), regs_b).unwrap();
    assert_eq!(section, Some(SectionId(1)));
    assert_eq!(restored, RegAllocSnapshot::default());

    let (section_b, restored_b) = ks.switch_to(b, Some(SectionId(1)), RegAllocSnapshot::default()).unwrap();
    assert_eq!(section_b, Some(SectionId(3)));
    assert_eq!(restored_b, regs_b);
  }
}
