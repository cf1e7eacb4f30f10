//! Error taxonomy for the native library bridge.
//!
//! Every variant carries enough context (path, handle, symbol names) for a
//! caller to log or display the failure. The bridge itself never logs.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Process-unique identifier of one loaded module.
///
/// Ids are never reused within a process, so a stale id can always be told
/// apart from a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Discriminant of [`BridgeError`], convenient for matching and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    Load,
    SymbolNotFound,
    UseAfterUnload,
    SignatureMismatch,
}

impl ErrorKind {
    /// Stable snake_case name used in structured reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidPath => "invalid_path",
            Self::NotFound => "not_found",
            Self::Load => "load",
            Self::SymbolNotFound => "symbol_not_found",
            Self::UseAfterUnload => "use_after_unload",
            Self::SignatureMismatch => "signature_mismatch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Empty or malformed input, a directory, or a file that is not a
    /// readable native library.
    #[error("invalid library path '{input}': {reason}")]
    InvalidPath { input: String, reason: String },

    /// Nothing exists at the resolved location.
    #[error("native library not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The dynamic linker rejected the module.
    #[error("failed to load {}: {diagnostic}", .path.display())]
    Load { path: PathBuf, diagnostic: String },

    /// One or more requested entry points are absent. When produced by eager
    /// validation, `handle` names the rolled-back handle.
    #[error(
        "symbol(s) not found in {} (handle {handle}): {}",
        .path.display(),
        .symbols.join(", ")
    )]
    SymbolNotFound {
        path: PathBuf,
        handle: HandleId,
        symbols: Vec<String>,
    },

    /// A handle or binding was used after its module was unloaded.
    #[error("handle {handle} ({}) used after unload{}", .path.display(), symbol_suffix(.symbol))]
    UseAfterUnload {
        path: PathBuf,
        handle: HandleId,
        symbol: Option<String>,
    },

    /// A declared symbol arity disagrees with the requested function type.
    #[error("symbol '{symbol}' declared with {declared} argument(s) but requested as {requested}")]
    SignatureMismatch {
        symbol: String,
        declared: usize,
        requested: usize,
    },
}

fn symbol_suffix(symbol: &Option<String>) -> String {
    symbol
        .as_deref()
        .map(|name| format!(" while resolving '{name}'"))
        .unwrap_or_default()
}

impl BridgeError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Load { .. } => ErrorKind::Load,
            Self::SymbolNotFound { .. } => ErrorKind::SymbolNotFound,
            Self::UseAfterUnload { .. } => ErrorKind::UseAfterUnload,
            Self::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
        }
    }

    pub(crate) fn invalid_path(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
