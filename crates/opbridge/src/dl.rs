//! Dynamic linker layer.
//!
//! Thin wrappers over `dlopen`, `dlsym`, `dlclose` and `dlerror`. Every call
//! goes through a [`LoaderGuard`], which holds the process-wide loader lock:
//! the OS module table and the `dlerror` slot are shared by every thread and
//! every registry in the process.

use std::ffi::{CStr, CString, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::NonNull;

use parking_lot::{Mutex, MutexGuard};

static LOADER_LOCK: Mutex<()> = Mutex::new(());

/// Raw `dlopen` handle.
#[derive(Debug)]
pub(crate) struct RawModule(NonNull<c_void>);

// SAFETY: a dlopen handle is an opaque token the dynamic linker accepts from
// any thread. All calls taking it are serialized by `LOADER_LOCK`.
unsafe impl Send for RawModule {}
unsafe impl Sync for RawModule {}

/// Proof that the caller holds the process-wide loader lock.
pub(crate) struct LoaderGuard {
    _guard: MutexGuard<'static, ()>,
}

/// Acquire the process-wide loader lock.
pub(crate) fn lock() -> LoaderGuard {
    LoaderGuard {
        _guard: LOADER_LOCK.lock(),
    }
}

impl LoaderGuard {
    /// Open `path` with the given dlopen `mode`.
    ///
    /// On failure returns the linker's diagnostic string.
    pub(crate) fn open(&self, path: &Path, mode: i32) -> Result<RawModule, String> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| "path contains a NUL byte".to_string())?;

        clear_dlerror();
        // SAFETY: `c_path` is a valid NUL-terminated string; the loader lock
        // is held for the duration of the call and the dlerror read.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), mode) };
        match NonNull::new(handle) {
            Some(handle) => Ok(RawModule(handle)),
            None => Err(take_dlerror().unwrap_or_else(|| "dlopen failed".to_string())),
        }
    }

    /// Resolve `name` in `module`.
    ///
    /// A symbol whose address is null is reported as absent: only code
    /// entry points are bound through the bridge.
    pub(crate) fn symbol(&self, module: &RawModule, name: &CStr) -> Option<NonNull<c_void>> {
        clear_dlerror();
        // SAFETY: `module` came from a successful dlopen and has not been
        // closed (callers check handle state under the same lock).
        let sym = unsafe { libc::dlsym(module.0.as_ptr(), name.as_ptr()) };
        let failed = take_dlerror().is_some();
        NonNull::new(sym).filter(|_| !failed)
    }

    /// Close `module`, consuming it so it cannot be closed twice.
    pub(crate) fn close(&self, module: RawModule) -> Result<(), String> {
        clear_dlerror();
        // SAFETY: ownership of the handle is consumed here; it was produced by
        // dlopen and never closed before.
        let rc = unsafe { libc::dlclose(module.0.as_ptr()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(take_dlerror().unwrap_or_else(|| format!("dlclose returned {rc}")))
        }
    }
}

fn clear_dlerror() {
    // SAFETY: dlerror has no preconditions; calling it clears the pending
    // error state.
    unsafe {
        libc::dlerror();
    }
}

fn take_dlerror() -> Option<String> {
    // SAFETY: dlerror returns null or a NUL-terminated string valid until the
    // next dl* call on this thread; we copy it out immediately.
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        return None;
    }
    // SAFETY: non-null dlerror result is a valid C string (see above).
    let text = unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned();
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_file_reports_diagnostic() {
        let guard = lock();
        let err = guard
            .open(Path::new("/nonexistent/opbridge/libnope.so"), libc::RTLD_NOW)
            .unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn nul_in_path_is_rejected_before_dlopen() {
        use std::ffi::OsStr;
        let guard = lock();
        let path = Path::new(OsStr::from_bytes(b"lib\0x.so"));
        assert_eq!(
            guard.open(path, libc::RTLD_NOW).unwrap_err(),
            "path contains a NUL byte"
        );
    }

    #[test]
    fn visibility_modes_match_the_platform_headers() {
        use opbridge_core::dlfcn::{RTLD_GLOBAL, RTLD_LOCAL, RTLD_NOW};
        assert_eq!(RTLD_NOW, libc::RTLD_NOW);
        assert_eq!(RTLD_GLOBAL, libc::RTLD_GLOBAL);
        assert_eq!(RTLD_LOCAL, libc::RTLD_LOCAL);
    }
}
