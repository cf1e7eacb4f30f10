//! # opbridge-core
//!
//! Pure-logic building blocks for the opbridge native operator loader.
//!
//! Nothing in this crate touches the dynamic linker. It owns the error
//! taxonomy, configuration, path resolution, `dlopen` mode flags and the
//! declared symbol descriptions; the `opbridge` crate performs the actual
//! `dlopen`/`dlsym`/`dlclose` calls.

#![deny(unsafe_code)]

pub mod config;
pub mod dlfcn;
pub mod error;
pub mod path;
pub mod symbol;

pub use config::{BridgeConfig, SEARCH_ROOT_ENV};
pub use dlfcn::Visibility;
pub use error::{BridgeError, BridgeResult, ErrorKind, HandleId};
pub use path::resolve_path;
pub use symbol::SymbolSpec;
