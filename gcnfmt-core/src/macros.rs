/// A tiny `bitflags`-alike so the crate doesn't pull in the `bitflags`
/// macro crate for the handful of small flag sets it needs (section flags,
/// HSA enable-SGPR/feature bitsets); expands to a newtype over an integer
/// type with the usual `Flags`-style const/union/contains API.
#[macro_export]
macro_rules! bitflags_like {
  (
    $(#[$meta:meta])*
    pub struct $name:ident: $ty:ty {
      $(const $variant:ident = $value:expr;)*
    }
  ) => {
    $(#[$meta])*
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct $name($ty);

    impl $name {
      $(pub const $variant: $name = $name($value);)*

      pub const fn empty() -> Self {
        $name(0)
      }

      pub const fn bits(self) -> $ty {
        self.0
      }

      pub const fn from_bits_truncate(bits: $ty) -> Self {
        $name(bits)
      }

      pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
      }

      pub const fn union(self, other: Self) -> Self {
        $name(self.0 | other.0)
      }
    }

    impl std::ops::BitOr for $name {
      type Output = Self;
      fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
      }
    }

    impl std::ops::BitOrAssign for $name {
      fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
      }
    }
  };
}
