//! Symbol bindings.
//!
//! A binding is a weak reference into its module. It never keeps the module
//! loaded on its own; every use re-checks the handle state and fails with
//! [`BridgeError::UseAfterUnload`] once the module is gone.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use opbridge_core::{BridgeError, BridgeResult, HandleId, SymbolSpec};

use crate::module::Module;
use crate::native_fn::NativeFn;

/// An untyped resolved entry point.
#[derive(Clone)]
pub struct RawBinding {
    symbol: String,
    handle: HandleId,
    path: PathBuf,
    module: Weak<Module>,
    addr: NonNull<c_void>,
}

// SAFETY: the address is only dereferenced through `SymbolBinding::call`,
// which checks the owning module is still loaded under its state guard.
unsafe impl Send for RawBinding {}
unsafe impl Sync for RawBinding {}

impl RawBinding {
    pub(crate) fn new(symbol: &str, module: &Arc<Module>, addr: NonNull<c_void>) -> Self {
        Self {
            symbol: symbol.to_string(),
            handle: module.id,
            path: module.path().to_path_buf(),
            module: Arc::downgrade(module),
            addr,
        }
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[must_use]
    pub fn handle_id(&self) -> HandleId {
        self.handle
    }

    #[must_use]
    pub fn library_path(&self) -> &Path {
        &self.path
    }

    /// Whether the owning module is still loaded.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.module
            .upgrade()
            .is_some_and(|module| module.raw.read_recursive().is_some())
    }

    /// Attach a function type to this binding.
    ///
    /// # Safety
    ///
    /// `F` must match the symbol's real signature and calling convention.
    /// Argument types, return type and struct layout cannot be verified.
    #[must_use]
    pub unsafe fn typed<F: NativeFn>(&self) -> SymbolBinding<F> {
        SymbolBinding {
            raw: self.clone(),
            _fn: PhantomData,
        }
    }

    fn use_after_unload(&self) -> BridgeError {
        BridgeError::UseAfterUnload {
            path: self.path.clone(),
            handle: self.handle,
            symbol: Some(self.symbol.clone()),
        }
    }
}

impl fmt::Debug for RawBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBinding")
            .field("symbol", &self.symbol)
            .field("handle", &self.handle)
            .field("path", &self.path)
            .field("live", &self.is_live())
            .finish()
    }
}

/// A resolved entry point with a caller-asserted function type.
#[derive(Clone)]
pub struct SymbolBinding<F> {
    raw: RawBinding,
    _fn: PhantomData<F>,
}

impl<F: NativeFn> SymbolBinding<F> {
    #[must_use]
    pub fn symbol(&self) -> &str {
        self.raw.symbol()
    }

    #[must_use]
    pub fn handle_id(&self) -> HandleId {
        self.raw.handle_id()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.raw.is_live()
    }

    #[must_use]
    pub fn raw(&self) -> &RawBinding {
        &self.raw
    }

    /// Run `f` with the function pointer while the module is held loaded.
    ///
    /// Calls from several threads run concurrently; an `unload` of the owning
    /// handle waits until they return without holding the loader lock, so `f`
    /// may load and look up symbols on any registry. The pointer must not
    /// escape `f`, and `f` must not unload the owning handle.
    pub fn call<R>(&self, f: impl FnOnce(F) -> R) -> BridgeResult<R> {
        let module = self
            .raw
            .module
            .upgrade()
            .ok_or_else(|| self.raw.use_after_unload())?;
        let state = module.raw.read_recursive();
        if state.is_none() {
            return Err(self.raw.use_after_unload());
        }
        // SAFETY: the module is loaded and stays loaded while `state` is held;
        // the signature was vouched for when this binding was typed.
        let func = unsafe { F::from_ptr(self.raw.addr) };
        let out = f(func);
        drop(state);
        Ok(out)
    }
}

impl<F> fmt::Debug for SymbolBinding<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolBinding")
            .field("raw", &self.raw)
            .field("fn", &std::any::type_name::<F>())
            .finish()
    }
}

/// A symbol handed to a host registry by [`crate::BridgeRegistry::export_into`].
#[derive(Debug, Clone)]
pub struct ExportedSymbol {
    spec: SymbolSpec,
    binding: RawBinding,
}

impl ExportedSymbol {
    pub(crate) fn new(spec: SymbolSpec, binding: RawBinding) -> Self {
        Self { spec, binding }
    }

    #[must_use]
    pub fn spec(&self) -> &SymbolSpec {
        &self.spec
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    #[must_use]
    pub fn binding(&self) -> &RawBinding {
        &self.binding
    }

    /// Type the binding, checking the declared arity against `F`.
    ///
    /// # Safety
    ///
    /// Same contract as [`RawBinding::typed`]; only the argument count is
    /// verified.
    pub unsafe fn typed<F: NativeFn>(&self) -> BridgeResult<SymbolBinding<F>> {
        self.spec.check_arity(F::ARITY)?;
        // SAFETY: forwarded caller contract.
        Ok(unsafe { self.binding.typed() })
    }
}

/// Host-side registry receiving exported operators.
///
/// Registration is one-directional: the bridge hands bindings over and knows
/// nothing about the host's own types.
pub trait OperatorSink {
    fn register(&mut self, symbol: ExportedSymbol);
}

impl OperatorSink for Vec<ExportedSymbol> {
    fn register(&mut self, symbol: ExportedSymbol) {
        self.push(symbol);
    }
}
