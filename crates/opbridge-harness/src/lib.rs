//! # opbridge-harness
//!
//! Tooling around the bridge: plugin manifests, a probe runner that checks a
//! plugin's library against its manifest, and the JSONL log contract the
//! probe writes.

#![forbid(unsafe_code)]

pub mod manifest;
pub mod probe;
pub mod structured_log;

pub use manifest::{ManifestError, PluginManifest, SymbolDecl};
pub use probe::{ProbeFailure, ProbeReport, SymbolProbe, fingerprint, probe};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
