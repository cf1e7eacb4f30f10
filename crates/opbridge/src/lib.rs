//! opbridge: native operator bridge.
//!
//! Locates pre-built shared objects, loads them with local or global symbol
//! visibility, validates the symbols a host expects, and hands typed
//! bindings to the host runtime's own operator registry.
//!
//! ```no_run
//! use opbridge::{BridgeRegistry, SymbolSpec, Visibility};
//!
//! type VectorAdd = unsafe extern "C" fn(*const i32, *const i32, *mut i32, usize);
//!
//! let registry = BridgeRegistry::from_env();
//! let handle = registry.load_with(
//!     "dummy_op",
//!     Visibility::Global,
//!     &[SymbolSpec::new("vector_add").with_arity(4)],
//! )?;
//! // SAFETY: `vector_add` is exported with exactly this C signature.
//! let add = unsafe { registry.lookup::<VectorAdd>(handle, "vector_add")? };
//!
//! let (a, b, mut out) = ([1, 2, 3], [4, 5, 6], [0; 3]);
//! // SAFETY: both inputs and the output hold three elements.
//! add.call(|f| unsafe { f(a.as_ptr(), b.as_ptr(), out.as_mut_ptr(), 3) })?;
//! assert_eq!(out, [5, 7, 9]);
//!
//! registry.unload(handle)?;
//! # Ok::<(), opbridge::BridgeError>(())
//! ```

#[cfg(not(unix))]
compile_error!("opbridge supports unix dynamic linkers only");

pub mod binding;
mod dl;
mod module;
pub mod native_fn;
pub mod registry;

pub use binding::{ExportedSymbol, OperatorSink, RawBinding, SymbolBinding};
pub use module::HandleState;
pub use native_fn::NativeFn;
pub use registry::{BridgeRegistry, LibraryHandle, ModuleInfo};

pub use opbridge_core::{
    BridgeConfig, BridgeError, BridgeResult, ErrorKind, HandleId, SEARCH_ROOT_ENV, SymbolSpec,
    Visibility,
};
