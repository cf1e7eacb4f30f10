//! The bridge registry: explicit owner of every loaded module.
//!
//! A registry is created at host startup and shut down at host teardown
//! (dropping it shuts it down). Handles are never forgotten: an unloaded
//! handle shrinks to a tombstone holding its path, so later use reports
//! [`BridgeError::UseAfterUnload`] with full context.

use std::collections::BTreeMap;
use std::ffi::CString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use opbridge_core::symbol::unique_names;
use opbridge_core::{
    BridgeConfig, BridgeError, BridgeResult, HandleId, SymbolSpec, Visibility, resolve_path,
};
use parking_lot::Mutex;

use crate::binding::{ExportedSymbol, OperatorSink, RawBinding, SymbolBinding};
use crate::dl::{self, LoaderGuard};
use crate::module::{HandleState, Module};
use crate::native_fn::NativeFn;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Caller-side token for one loaded module. The registry owns the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryHandle(HandleId);

impl LibraryHandle {
    #[must_use]
    pub const fn id(self) -> HandleId {
        self.0
    }
}

impl From<HandleId> for LibraryHandle {
    fn from(id: HandleId) -> Self {
        Self(id)
    }
}

impl fmt::Display for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Read-only description of a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub handle: LibraryHandle,
    pub path: PathBuf,
    pub visibility: Visibility,
    pub state: HandleState,
    /// Symbols resolved through this handle so far, sorted. Empty once
    /// unloaded.
    pub bound_symbols: Vec<String>,
    /// Expected signatures recorded for this handle, sorted by name. Empty
    /// once unloaded.
    pub declared: Vec<SymbolSpec>,
}

/// Per-handle entry. A closed module is retired to its path and visibility;
/// bindings only hold weak references, so retiring frees the module itself.
enum Slot {
    Live(Arc<Module>),
    Retired { path: PathBuf, visibility: Visibility },
}

/// Owner of every module loaded through it.
///
/// Each issued handle keeps one map entry for the registry's lifetime. After
/// unload that entry is a tombstone of the library path and visibility, so a
/// host that loads and unloads repeatedly pays a few dozen bytes per load
/// until the registry is dropped.
pub struct BridgeRegistry {
    config: BridgeConfig,
    slots: Mutex<BTreeMap<HandleId, Slot>>,
}

impl BridgeRegistry {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registry configured from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(BridgeConfig::from_env())
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Resolve a library name or path against this registry's search root.
    pub fn resolve_path(&self, input: impl AsRef<Path>) -> BridgeResult<PathBuf> {
        resolve_path(input, &self.config)
    }

    /// Load a native module.
    ///
    /// Each call yields a new, independent handle, even for a path that is
    /// already loaded; the dynamic linker reference-counts the underlying
    /// module.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        visibility: Visibility,
    ) -> BridgeResult<LibraryHandle> {
        self.load_with(path, visibility, &[])
    }

    /// Load a native module and eagerly resolve `required`.
    ///
    /// If any required symbol is missing the module is unloaded again and a
    /// single [`BridgeError::SymbolNotFound`] lists every missing name. The
    /// rolled-back handle stays registered as unloaded. On success the specs
    /// are kept as declarations for [`Self::lookup`].
    pub fn load_with(
        &self,
        path: impl AsRef<Path>,
        visibility: Visibility,
        required: &[SymbolSpec],
    ) -> BridgeResult<LibraryHandle> {
        let resolved = self.resolve_path(path)?;

        let raw = dl::lock()
            .open(&resolved, visibility.dlopen_mode())
            .map_err(|diagnostic| BridgeError::Load {
                path: resolved.clone(),
                diagnostic,
            })?;

        let id = HandleId(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        let module = Arc::new(Module::new(id, resolved, visibility, raw));
        module.declare(required);
        self.slots.lock().insert(id, Slot::Live(Arc::clone(&module)));

        let missing: Vec<String> = {
            let guard = dl::lock();
            unique_names(required)
                .into_iter()
                .filter(|name| resolve_in(&guard, &module, name).is_err())
                .map(str::to_string)
                .collect()
        };

        if !missing.is_empty() {
            // The rollback's own close failure is secondary to the report.
            let _ = module.close();
            self.retire(&module);
            return Err(BridgeError::SymbolNotFound {
                path: module.path().to_path_buf(),
                handle: id,
                symbols: missing,
            });
        }

        Ok(LibraryHandle(id))
    }

    /// Record expected signatures for symbols of a loaded handle without
    /// resolving them. Later [`Self::lookup`] calls check against them.
    pub fn declare(&self, handle: LibraryHandle, specs: &[SymbolSpec]) -> BridgeResult<()> {
        let module = self.live(handle, None)?;
        if !module.is_open() {
            return Err(module.use_after_unload(None));
        }
        module.declare(specs);
        Ok(())
    }

    /// Resolve `symbol` and bind it as `F`.
    ///
    /// When the symbol has a declared arity (from [`Self::load_with`],
    /// [`Self::declare`] or [`Self::export_into`]) it must equal
    /// `F::ARITY`, else [`BridgeError::SignatureMismatch`].
    ///
    /// # Safety
    ///
    /// `F` must match the symbol's real signature and calling convention.
    /// The bridge cannot check argument types, return type, floating-point
    /// convention or struct layout; a mismatch is undefined behaviour when
    /// the binding is called.
    pub unsafe fn lookup<F: NativeFn>(
        &self,
        handle: LibraryHandle,
        symbol: &str,
    ) -> BridgeResult<SymbolBinding<F>> {
        let module = self.live(handle, Some(symbol))?;
        let raw = {
            let guard = dl::lock();
            resolve_in(&guard, &module, symbol)?
        };
        module.check_declared(symbol, F::ARITY)?;
        // SAFETY: forwarded caller contract.
        Ok(unsafe { raw.typed() })
    }

    /// Resolve `symbol` without attaching a function type.
    pub fn lookup_raw(&self, handle: LibraryHandle, symbol: &str) -> BridgeResult<RawBinding> {
        let module = self.live(handle, Some(symbol))?;
        let guard = dl::lock();
        resolve_in(&guard, &module, symbol)
    }

    /// Resolve every spec and hand the bindings to `sink`.
    ///
    /// All-or-nothing: if any symbol is missing nothing is registered and the
    /// error lists every missing name. The handle itself stays loaded. On
    /// success the specs are kept as declarations.
    pub fn export_into(
        &self,
        handle: LibraryHandle,
        specs: &[SymbolSpec],
        sink: &mut dyn OperatorSink,
    ) -> BridgeResult<usize> {
        let module = self.live(handle, None)?;
        let exported = {
            let guard = dl::lock();
            if !module.is_open() {
                return Err(module.use_after_unload(None));
            }

            let mut exported = Vec::with_capacity(specs.len());
            let mut missing = Vec::new();
            for spec in specs {
                match resolve_in(&guard, &module, &spec.name) {
                    Ok(binding) => exported.push(ExportedSymbol::new(spec.clone(), binding)),
                    Err(BridgeError::SymbolNotFound { .. }) => {
                        if !missing.contains(&spec.name) {
                            missing.push(spec.name.clone());
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
            if !missing.is_empty() {
                return Err(BridgeError::SymbolNotFound {
                    path: module.path().to_path_buf(),
                    handle: module.id,
                    symbols: missing,
                });
            }
            exported
        };

        module.declare(specs);
        let count = exported.len();
        for symbol in exported {
            sink.register(symbol);
        }
        Ok(count)
    }

    /// Unload a module. Unloading an already-unloaded handle is a no-op.
    ///
    /// Blocks until in-flight binding calls into the module return. Other
    /// loads, lookups and calls proceed meanwhile.
    pub fn unload(&self, handle: LibraryHandle) -> BridgeResult<()> {
        let module = match self.slots.lock().get(&handle.0) {
            Some(Slot::Live(module)) => Arc::clone(module),
            Some(Slot::Retired { .. }) => return Ok(()),
            None => return Err(gone(handle.0, PathBuf::new(), None)),
        };
        let closed = module.close();
        self.retire(&module);
        closed
    }

    /// Describe a handle, loaded or not.
    pub fn describe(&self, handle: LibraryHandle) -> BridgeResult<ModuleInfo> {
        match self.slots.lock().get(&handle.0) {
            Some(Slot::Live(module)) => Ok(ModuleInfo {
                handle,
                path: module.path().to_path_buf(),
                visibility: module.visibility,
                state: module.state(),
                bound_symbols: module.bound_symbols(),
                declared: module.declared_specs(),
            }),
            Some(Slot::Retired { path, visibility }) => Ok(ModuleInfo {
                handle,
                path: path.clone(),
                visibility: *visibility,
                state: HandleState::Unloaded,
                bound_symbols: Vec::new(),
                declared: Vec::new(),
            }),
            None => Err(gone(handle.0, PathBuf::new(), None)),
        }
    }

    /// Every handle this registry has issued, in load order.
    #[must_use]
    pub fn handles(&self) -> Vec<LibraryHandle> {
        self.slots.lock().keys().copied().map(LibraryHandle).collect()
    }

    /// Number of handles currently loaded.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Live(module) if module.is_open()))
            .count()
    }

    /// Unload every live handle. Returns the first close failure, after
    /// attempting all of them.
    pub fn shutdown(&self) -> BridgeResult<()> {
        let live: Vec<Arc<Module>> = self
            .slots
            .lock()
            .values()
            .filter_map(|slot| match slot {
                Slot::Live(module) => Some(Arc::clone(module)),
                Slot::Retired { .. } => None,
            })
            .collect();
        let mut first_err = None;
        for module in live {
            if let Err(err) = module.close() {
                first_err.get_or_insert(err);
            }
            self.retire(&module);
        }
        first_err.map_or(Ok(()), Err)
    }

    fn live(&self, handle: LibraryHandle, symbol: Option<&str>) -> BridgeResult<Arc<Module>> {
        match self.slots.lock().get(&handle.0) {
            Some(Slot::Live(module)) => Ok(Arc::clone(module)),
            Some(Slot::Retired { path, .. }) => Err(gone(handle.0, path.clone(), symbol)),
            None => Err(gone(handle.0, PathBuf::new(), symbol)),
        }
    }

    /// Replace a closed module's slot with its tombstone.
    fn retire(&self, module: &Module) {
        self.slots.lock().insert(
            module.id,
            Slot::Retired {
                path: module.path().to_path_buf(),
                visibility: module.visibility,
            },
        );
    }
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl Drop for BridgeRegistry {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl fmt::Debug for BridgeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeRegistry")
            .field("config", &self.config)
            .field("handles", &self.slots.lock().len())
            .finish()
    }
}

fn gone(handle: HandleId, path: PathBuf, symbol: Option<&str>) -> BridgeError {
    BridgeError::UseAfterUnload {
        path,
        handle,
        symbol: symbol.map(str::to_string),
    }
}

fn resolve_in(guard: &LoaderGuard, module: &Arc<Module>, symbol: &str) -> BridgeResult<RawBinding> {
    let not_found = || BridgeError::SymbolNotFound {
        path: module.path().to_path_buf(),
        handle: module.id,
        symbols: vec![symbol.to_string()],
    };

    let state = module.raw.read_recursive();
    let Some(raw) = state.as_ref() else {
        return Err(module.use_after_unload(Some(symbol)));
    };
    let c_name = CString::new(symbol).map_err(|_| not_found())?;
    let addr = guard.symbol(raw, &c_name).ok_or_else(not_found)?;
    drop(state);

    module.record_bound(symbol);
    Ok(RawBinding::new(symbol, module, addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opbridge_core::ErrorKind;

    #[test]
    fn unknown_handle_reports_use_after_unload() {
        let registry = BridgeRegistry::default();
        let stray = LibraryHandle::from(HandleId(u64::MAX));
        assert_eq!(
            registry.lookup_raw(stray, "anything").unwrap_err().kind(),
            ErrorKind::UseAfterUnload
        );
        assert_eq!(
            registry.unload(stray).unwrap_err().kind(),
            ErrorKind::UseAfterUnload
        );
    }

    #[test]
    fn load_propagates_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BridgeRegistry::new(BridgeConfig::new().with_search_root(dir.path()));
        assert_eq!(
            registry.load("missing", Visibility::Local).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            registry.load("", Visibility::Local).unwrap_err().kind(),
            ErrorKind::InvalidPath
        );
        assert!(registry.handles().is_empty());
    }

    #[test]
    fn empty_registry_shuts_down_cleanly() {
        let registry = BridgeRegistry::default();
        assert_eq!(registry.live_count(), 0);
        assert!(registry.shutdown().is_ok());
    }
}
