//! Per-handle bookkeeping.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use opbridge_core::{BridgeError, BridgeResult, HandleId, SymbolSpec, Visibility};
use parking_lot::{Mutex, RwLock};

use crate::dl::{self, RawModule};

/// Lifecycle state of a handle. `Unloaded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    Loaded,
    Unloaded,
}

impl HandleState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Unloaded => "unloaded",
        }
    }
}

/// One loaded (or formerly loaded) native module.
///
/// `raw` is `None` once unloaded. Bindings take a shared guard on it while
/// calling into the module; unloading takes the exclusive guard.
///
/// Lock order: `raw` is never acquired exclusively while the loader lock is
/// held. Shared acquisitions under the loader lock use `read_recursive`, so
/// a pending unload cannot queue them behind in-flight calls.
#[derive(Debug)]
pub(crate) struct Module {
    pub(crate) id: HandleId,
    pub(crate) path: PathBuf,
    pub(crate) visibility: Visibility,
    pub(crate) raw: RwLock<Option<RawModule>>,
    bound: Mutex<BTreeSet<String>>,
    declared: Mutex<BTreeMap<String, SymbolSpec>>,
}

impl Module {
    pub(crate) fn new(id: HandleId, path: PathBuf, visibility: Visibility, raw: RawModule) -> Self {
        Self {
            id,
            path,
            visibility,
            raw: RwLock::new(Some(raw)),
            bound: Mutex::new(BTreeSet::new()),
            declared: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn state(&self) -> HandleState {
        if self.is_open() {
            HandleState::Loaded
        } else {
            HandleState::Unloaded
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.raw.read_recursive().is_some()
    }

    pub(crate) fn record_bound(&self, symbol: &str) {
        self.bound.lock().insert(symbol.to_string());
    }

    pub(crate) fn bound_symbols(&self) -> Vec<String> {
        self.bound.lock().iter().cloned().collect()
    }

    /// Remember expected signatures. A later declaration of the same name
    /// replaces the earlier one.
    pub(crate) fn declare(&self, specs: &[SymbolSpec]) {
        let mut declared = self.declared.lock();
        for spec in specs {
            declared.insert(spec.name.clone(), spec.clone());
        }
    }

    pub(crate) fn declared_specs(&self) -> Vec<SymbolSpec> {
        self.declared.lock().values().cloned().collect()
    }

    /// Check `arity` against the declaration for `symbol`, if there is one.
    pub(crate) fn check_declared(&self, symbol: &str, arity: usize) -> BridgeResult<()> {
        match self.declared.lock().get(symbol) {
            Some(spec) => spec.check_arity(arity),
            None => Ok(()),
        }
    }

    pub(crate) fn use_after_unload(&self, symbol: Option<&str>) -> BridgeError {
        BridgeError::UseAfterUnload {
            path: self.path.clone(),
            handle: self.id,
            symbol: symbol.map(str::to_string),
        }
    }

    /// Close the module if still open. Returns `Ok(())` when already closed.
    ///
    /// Must not be called with the loader lock held: the exclusive guard
    /// waits for in-flight binding calls, which may themselves need the
    /// loader lock. The loader lock is taken only for `dlclose`.
    pub(crate) fn close(&self) -> Result<(), BridgeError> {
        let taken = self.raw.write().take();
        let Some(raw) = taken else {
            return Ok(());
        };
        dl::lock().close(raw).map_err(|diagnostic| BridgeError::Load {
            path: self.path.clone(),
            diagnostic: format!("dlclose: {diagnostic}"),
        })
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.get_mut().take() {
            let _ = dl::lock().close(raw);
        }
    }
}
