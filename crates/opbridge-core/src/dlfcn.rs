//! Dynamic linking: mode flags and visibility.
//!
//! Pure-logic helpers for `<dlfcn.h>`. The actual dlopen/dlsym/dlclose
//! invocations live in the `opbridge` crate.

use std::fmt;

/// The dlopen mode bits the bridge uses.
#[cfg(not(target_vendor = "apple"))]
mod consts {
    pub const RTLD_NOW: i32 = 0x00002;
    pub const RTLD_GLOBAL: i32 = 0x00100;
    pub const RTLD_LOCAL: i32 = 0x00000;
}

#[cfg(target_vendor = "apple")]
mod consts {
    pub const RTLD_NOW: i32 = 0x2;
    pub const RTLD_GLOBAL: i32 = 0x8;
    pub const RTLD_LOCAL: i32 = 0x4;
}

pub use consts::*;

/// Symbol visibility of a loaded module.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Symbols are only reachable through this module's own handle.
    #[default]
    Local,
    /// Symbols also satisfy undefined references of modules loaded later.
    Global,
}

impl Visibility {
    /// Parse from string (case-insensitive). Unknown input yields `Local`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" | "shared" | "export" | "rtld_global" => Self::Global,
            _ => Self::Local,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
        }
    }

    /// Full dlopen mode for this visibility.
    ///
    /// Binding is always immediate so unresolved dependencies surface at load
    /// time instead of at first call.
    #[must_use]
    pub const fn dlopen_mode(self) -> i32 {
        match self {
            Self::Local => RTLD_NOW | RTLD_LOCAL,
            Self::Global => RTLD_NOW | RTLD_GLOBAL,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_modes_are_immediate() {
        for vis in [Visibility::Local, Visibility::Global] {
            assert_eq!(vis.dlopen_mode() & RTLD_NOW, RTLD_NOW);
        }
        assert_eq!(Visibility::Global.dlopen_mode() & RTLD_GLOBAL, RTLD_GLOBAL);
        assert_eq!(Visibility::Local.dlopen_mode() & RTLD_GLOBAL, 0);
    }

    #[test]
    fn parse_visibility() {
        assert_eq!(Visibility::from_str_loose("global"), Visibility::Global);
        assert_eq!(Visibility::from_str_loose("GLOBAL"), Visibility::Global);
        assert_eq!(Visibility::from_str_loose(" shared "), Visibility::Global);
        assert_eq!(Visibility::from_str_loose("RTLD_GLOBAL"), Visibility::Global);
        assert_eq!(Visibility::from_str_loose("local"), Visibility::Local);
        assert_eq!(Visibility::from_str_loose("bogus"), Visibility::Local);
        assert_eq!(Visibility::default(), Visibility::Local);
    }
}
