//! Library path resolution.
//!
//! Turns a library name or path into the canonical absolute path of an
//! existing, readable regular file carrying the platform's native library
//! extension.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX, DLL_SUFFIX};
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};

/// Resolve `input` against `config` into a canonical absolute path.
///
/// - relative inputs are joined onto [`BridgeConfig::base_dir`];
/// - a bare name such as `dummy_op` becomes the platform file name
///   (`libdummy_op.so` on Linux) first;
/// - a path that does not exist always yields [`BridgeError::NotFound`].
pub fn resolve_path(input: impl AsRef<Path>, config: &BridgeConfig) -> BridgeResult<PathBuf> {
    let input = input.as_ref();
    let shown = input.to_string_lossy();

    if input.as_os_str().is_empty() {
        return Err(BridgeError::invalid_path(&shown, "path is empty"));
    }
    if input.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(BridgeError::invalid_path(&shown, "path contains a NUL byte"));
    }

    let candidate = platform_file_name(input);
    let joined = if candidate.is_absolute() {
        candidate
    } else {
        let base = config.base_dir().map_err(|e| {
            BridgeError::invalid_path(&shown, format!("cannot determine search root: {e}"))
        })?;
        base.join(candidate)
    };

    let meta = match std::fs::metadata(&joined) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Err(BridgeError::invalid_path(&shown, format!("not accessible: {e}")));
        }
        Err(_) => return Err(BridgeError::NotFound { path: joined }),
    };

    if meta.is_dir() {
        return Err(BridgeError::invalid_path(&shown, "path is a directory"));
    }
    if !meta.is_file() {
        return Err(BridgeError::invalid_path(&shown, "not a regular file"));
    }
    if !has_native_extension(&joined) {
        return Err(BridgeError::invalid_path(
            &shown,
            format!("expected a .{DLL_EXTENSION} native library"),
        ));
    }
    if let Err(e) = File::open(&joined) {
        return Err(BridgeError::invalid_path(&shown, format!("not readable: {e}")));
    }

    std::fs::canonicalize(&joined)
        .map_err(|e| BridgeError::invalid_path(&shown, format!("cannot canonicalize: {e}")))
}

/// Map a bare library name (no separator, no extension) to its platform
/// file name. Anything else is returned unchanged.
fn platform_file_name(input: &Path) -> PathBuf {
    let mut components = input.components();
    let bare = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && input.extension().is_none();

    match input.to_str() {
        Some(name) if bare => PathBuf::from(format!("{DLL_PREFIX}{name}{DLL_SUFFIX}")),
        _ => input.to_path_buf(),
    }
}

/// Whether `path` carries the platform's native library extension.
///
/// ELF platforms also accept versioned sonames such as `libfoo.so.1.2`.
#[must_use]
pub fn has_native_extension(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(DLL_SUFFIX) && lower.len() > DLL_SUFFIX.len() {
        return true;
    }
    if cfg!(all(unix, not(target_vendor = "apple")))
        && let Some(idx) = lower.rfind(".so.")
    {
        let version = &lower[idx + 4..];
        return idx > 0
            && !version.is_empty()
            && version
                .split('.')
                .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
    }
    false
}
