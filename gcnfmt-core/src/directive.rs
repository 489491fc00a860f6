//! §4.1 `DirectiveTable`: a lexicographically sorted keyword table plus a
//! binary-search dispatcher, one per dialect (and one shared table for the
//! ~150 common pseudo-ops spec §6.3 lists).

/// A directive name table. Construction panics (debug-only check) if the
/// names aren't sorted, mirroring the CLRX assumption that the table is
/// hand-sorted at compile time and `binary_search` is safe to use on it.
pub struct DirectiveTable<T: Copy + 'static> {
  names: &'static [&'static str],
  ops: &'static [T],
}

impl<T: Copy + 'static> DirectiveTable<T> {
  pub const fn new(names: &'static [&'static str], ops: &'static [T]) -> Self {
    DirectiveTable { names, ops }
  }

  fn check_sorted(&self) {
    debug_assert_eq!(self.names.len(), self.ops.len());
    debug_assert!(
      self.names.windows(2).all(|w| w[0] < w[1]),
      "directive table names must be sorted and unique"
    );
  }

  /// `isKnownDirective`: does this table recognise `name` (without the
  /// leading `.`)?
  pub fn is_known(&self, name: &str) -> bool {
    self.check_sorted();
    self.names.binary_search(&name).is_ok()
  }

  /// Look up the op code for `name`, if any.
  pub fn lookup(&self, name: &str) -> Option<T> {
    self.check_sorted();
    self.names.binary_search(&name).ok().map(|idx| self.ops[idx])
  }

  pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.names.iter().copied()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const NAMES: &[&str] = &["alpha", "beta", "gamma"];
  const OPS: &[u32] = &[0, 1, 2];

  #[test]
  fn lookup_roundtrips() {
    let table = DirectiveTable::new(NAMES, OPS);
    assert!(table.is_known("beta"));
    assert_eq!(table.lookup("beta"), Some(1));
    assert!(!table.is_known("delta"));
    assert_eq!(table.lookup("delta"), None);
  }
}
