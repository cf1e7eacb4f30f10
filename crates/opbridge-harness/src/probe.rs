//! Probe runner: load a plugin's library through a fresh registry, check its
//! declared entry points, and describe what was found.
//!
//! Unlike eager validation in the bridge, the probe resolves every declared
//! symbol individually so the report lists every gap, then unloads.

use std::path::Path;
use std::time::Instant;

use opbridge::{BridgeConfig, BridgeError, BridgeRegistry, LibraryHandle};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::manifest::PluginManifest;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    pub kind: String,
    pub message: String,
}

impl From<&BridgeError> for ProbeFailure {
    fn from(err: &BridgeError) -> Self {
        Self {
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolProbe {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Arity the registry holds for this symbol after the manifest's
    /// declarations were recorded against the loaded handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_arity: Option<usize>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProbeFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub plugin: String,
    pub library: String,
    pub visibility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<u64>,
    pub symbols: Vec<SymbolProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProbeFailure>,
    pub outcome: Outcome,
}

impl ProbeReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Probe one plugin. Bridge failures end up in the report; only log-sink
/// I/O errors are returned.
pub fn probe(
    manifest: &PluginManifest,
    base: &BridgeConfig,
    log: &mut LogEmitter,
) -> std::io::Result<ProbeReport> {
    let visibility = manifest.visibility();
    let mut report = ProbeReport {
        plugin: manifest.name.clone(),
        library: manifest.library.clone(),
        visibility: visibility.as_str().to_string(),
        resolved_path: None,
        sha256: None,
        handle: None,
        symbols: Vec::new(),
        failure: None,
        outcome: Outcome::Fail,
    };

    let registry = BridgeRegistry::new(manifest.config(base));
    log.emit_entry(
        event(LogLevel::Info, "probe_start")
            .with_plugin(&manifest.name)
            .with_visibility(visibility.as_str())
            .with_details(serde_json::json!({
                "library": manifest.library,
                "search_root": registry.config().search_root().map(|p| p.display().to_string()),
                "declared_symbols": manifest.symbols.len(),
            })),
    )?;

    let started = Instant::now();
    let resolved = match registry.resolve_path(&manifest.library) {
        Ok(path) => path,
        Err(err) => return finish_with_failure(report, &err, "resolve", log),
    };
    report.resolved_path = Some(resolved.display().to_string());
    report.sha256 = fingerprint(&resolved).ok();
    log.emit_entry(
        event(LogLevel::Debug, "resolve")
            .with_plugin(&manifest.name)
            .with_path(&resolved)
            .with_outcome(Outcome::Pass)
            .with_latency_ns(elapsed_ns(started)),
    )?;

    let started = Instant::now();
    let handle = match registry.load(&resolved, visibility) {
        Ok(handle) => handle,
        Err(err) => return finish_with_failure(report, &err, "load", log),
    };
    report.handle = Some(handle.id().0);
    log.emit_entry(
        event(LogLevel::Info, "load")
            .with_plugin(&manifest.name)
            .with_path(&resolved)
            .with_handle(handle.id().0)
            .with_visibility(visibility.as_str())
            .with_outcome(Outcome::Pass)
            .with_latency_ns(elapsed_ns(started)),
    )?;

    if let Err(err) = registry.declare(handle, &manifest.specs()) {
        return finish_with_failure(report, &err, "declare", log);
    }
    let declared = registry
        .describe(handle)
        .map(|info| info.declared)
        .unwrap_or_default();

    for decl in &manifest.symbols {
        let registered_arity = declared
            .iter()
            .find(|spec| spec.name == decl.name)
            .and_then(|spec| spec.arity);
        let mut symbol = probe_symbol(&registry, handle, &manifest.name, decl, log)?;
        symbol.registered_arity = registered_arity;
        report.symbols.push(symbol);
    }

    let all_resolved = report.symbols.iter().all(|s| s.resolved);
    report.outcome = if all_resolved {
        Outcome::Pass
    } else {
        Outcome::Fail
    };

    match registry.unload(handle) {
        Ok(()) => log.emit_entry(
            event(LogLevel::Debug, "unload")
                .with_plugin(&manifest.name)
                .with_handle(handle.id().0)
                .with_outcome(Outcome::Pass),
        )?,
        Err(err) => {
            report.outcome = Outcome::Fail;
            report.failure = Some(ProbeFailure::from(&err));
            log.emit_entry(failure_entry(&manifest.name, "unload", &err))?;
        }
    }

    emit_finish(&report, log)?;
    Ok(report)
}

fn probe_symbol(
    registry: &BridgeRegistry,
    handle: LibraryHandle,
    plugin: &str,
    decl: &crate::manifest::SymbolDecl,
    log: &mut LogEmitter,
) -> std::io::Result<SymbolProbe> {
    let started = Instant::now();
    let lookup = registry.lookup_raw(handle, &decl.name);
    let latency = elapsed_ns(started);

    let mut probe = SymbolProbe {
        name: decl.name.clone(),
        arity: decl.arity,
        doc: decl.doc.clone(),
        registered_arity: None,
        resolved: lookup.is_ok(),
        failure: None,
    };
    match lookup {
        Ok(_) => log.emit_entry(
            event(LogLevel::Debug, "symbol_resolved")
                .with_plugin(plugin)
                .with_handle(handle.id().0)
                .with_symbol(&decl.name)
                .with_outcome(Outcome::Pass)
                .with_latency_ns(latency),
        )?,
        Err(err) => {
            probe.failure = Some(ProbeFailure::from(&err));
            log.emit_entry(
                failure_entry(plugin, "symbol_missing", &err)
                    .with_handle(handle.id().0)
                    .with_symbol(&decl.name)
                    .with_latency_ns(latency),
            )?;
        }
    }
    Ok(probe)
}

fn finish_with_failure(
    mut report: ProbeReport,
    err: &BridgeError,
    step: &str,
    log: &mut LogEmitter,
) -> std::io::Result<ProbeReport> {
    report.failure = Some(ProbeFailure::from(err));
    report.outcome = Outcome::Fail;
    log.emit_entry(failure_entry(&report.plugin, step, err))?;
    emit_finish(&report, log)?;
    Ok(report)
}

/// Entry without a trace id; `LogEmitter::emit_entry` assigns the next one.
fn event(level: LogLevel, name: &str) -> LogEntry {
    LogEntry::new(String::new(), level, name)
}

fn failure_entry(plugin: &str, step: &str, err: &BridgeError) -> LogEntry {
    event(LogLevel::Error, step)
        .with_plugin(plugin)
        .with_outcome(Outcome::Fail)
        .with_error_kind(err.kind().as_str())
        .with_details(serde_json::json!({ "message": err.to_string() }))
}

fn emit_finish(report: &ProbeReport, log: &mut LogEmitter) -> std::io::Result<()> {
    let level = if report.passed() {
        LogLevel::Info
    } else {
        LogLevel::Warn
    };
    let missing: Vec<&str> = report
        .symbols
        .iter()
        .filter(|s| !s.resolved)
        .map(|s| s.name.as_str())
        .collect();
    let mut entry = event(level, "probe_finish")
        .with_plugin(&report.plugin)
        .with_outcome(report.outcome)
        .with_details(serde_json::json!({ "missing_symbols": missing }));
    if let Some(failure) = &report.failure {
        entry = entry.with_error_kind(&failure.kind);
    } else if !missing.is_empty() {
        entry = entry.with_error_kind("symbol_not_found");
    }
    log.emit_entry(entry)?;
    log.flush()
}

/// SHA-256 of a file, lowercase hex.
pub fn fingerprint(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

fn elapsed_ns(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            fingerprint(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(fingerprint(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn failure_mirrors_error_kind() {
        let err = BridgeError::NotFound {
            path: "/opt/ops/libghost.so".into(),
        };
        let failure = ProbeFailure::from(&err);
        assert_eq!(failure.kind, "not_found");
        assert!(failure.message.contains("libghost.so"));
    }
}
