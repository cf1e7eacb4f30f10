//! Declared descriptions of expected entry points.

use crate::error::{BridgeError, BridgeResult};

/// A symbol a host expects a native module to export.
///
/// `arity` is the declared argument count. It is the only part of the
/// signature the bridge can check; calling convention, argument types and
/// struct layout remain an unchecked contract between host and module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolSpec {
    pub name: String,
    pub arity: Option<usize>,
    pub doc: Option<String>,
}

impl SymbolSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: None,
            doc: None,
        }
    }

    #[must_use]
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Check the declared arity against the arity of the Rust function type
    /// the host wants to call the symbol through.
    pub fn check_arity(&self, requested: usize) -> BridgeResult<()> {
        match self.arity {
            Some(declared) if declared != requested => Err(BridgeError::SignatureMismatch {
                symbol: self.name.clone(),
                declared,
                requested,
            }),
            _ => Ok(()),
        }
    }
}

impl From<&str> for SymbolSpec {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Deduplicate symbol names while keeping first-seen order.
#[must_use]
pub fn unique_names<'a>(specs: impl IntoIterator<Item = &'a SymbolSpec>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for spec in specs {
        if !out.contains(&spec.name.as_str()) {
            out.push(&spec.name);
        }
    }
    out
}
