//! Storage-class to linkage classification.
//!
//! Purely local to one declaration: whether a name stays internal across
//! redeclarations is decided by the symbol table, not here.

use crate::error::codes;
use crate::scanner::DeclarationEvent;
use linkscan_common::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Potentially visible to other translation units.
    External,
    /// File-local (`static`).
    Internal,
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::External => f.write_str("external"),
            Linkage::Internal => f.write_str("internal"),
        }
    }
}

/// Storage-class keywords written on a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StorageKeywords {
    pub is_static: bool,
    pub is_extern: bool,
}

impl StorageKeywords {
    pub const NONE: StorageKeywords = StorageKeywords {
        is_static: false,
        is_extern: false,
    };
    pub const STATIC: StorageKeywords = StorageKeywords {
        is_static: true,
        is_extern: false,
    };
    pub const EXTERN: StorageKeywords = StorageKeywords {
        is_static: false,
        is_extern: true,
    };

    /// Record a keyword; returns `false` if `word` is not a storage keyword.
    pub fn add(&mut self, word: &str) -> bool {
        match word {
            "static" => self.is_static = true,
            "extern" => self.is_extern = true,
            _ => return false,
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        !self.is_static && !self.is_extern
    }
}

/// Classify one declaration.
///
/// `static` always wins. `static` together with `extern` still yields
/// [`Linkage::Internal`], plus a warning.
pub fn classify(event: &DeclarationEvent) -> (Linkage, Option<Diagnostic>) {
    let storage = event.storage;
    if !storage.is_static {
        return (Linkage::External, None);
    }

    let diagnostic = storage.is_extern.then(|| {
        Diagnostic::warning(format!(
            "`{}` is declared both `static` and `extern`",
            event.name
        ))
        .with_code(codes::CONFLICTING_STORAGE_KEYWORDS)
        .with_span(event.span)
        .with_label("conflicting storage class")
        .with_help("treated as internal linkage")
    });
    (Linkage::Internal, diagnostic)
}
