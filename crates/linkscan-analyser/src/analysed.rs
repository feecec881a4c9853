//! Per-file dependency summary handed to the build graph.

use crate::region::Region;
use crate::Analysis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Symbol definitions and dependencies of one C file.
///
/// Names are lower-cased: C symbols are matched against Fortran `bind(c)`
/// names, which are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysedC {
    pub fpath: PathBuf,
    pub file_hash: u64,
    /// Globally visible symbols defined in this file.
    pub symbol_defs: BTreeSet<String>,
    /// Symbols used here that come from a user header.
    pub symbol_deps: BTreeSet<String>,
}

impl AnalysedC {
    pub fn new(fpath: impl Into<PathBuf>, file_hash: u64) -> Self {
        Self {
            fpath: fpath.into(),
            file_hash,
            symbol_defs: BTreeSet::new(),
            symbol_deps: BTreeSet::new(),
        }
    }

    /// Summarise a finished analysis.
    ///
    /// Definitions exclude system-header content. A reference becomes a
    /// dependency when its name was first declared in a user-header region.
    pub fn from_analysis(fpath: impl Into<PathBuf>, file_hash: u64, analysis: &Analysis) -> Self {
        let mut analysed = Self::new(fpath, file_hash);

        for symbol in analysis.table.iter() {
            if symbol.is_exported() && symbol.region != Region::System {
                analysed.add_symbol_def(&symbol.name);
            }
        }

        for reference in &analysis.references {
            if reference.region == Region::System {
                continue;
            }
            let from_user_header = analysis
                .table
                .get(&reference.name)
                .is_some_and(|symbol| symbol.region == Region::User);
            if from_user_header {
                analysed.add_symbol_dep(&reference.name);
            }
        }

        analysed
    }

    pub fn add_symbol_def(&mut self, name: &str) {
        debug_assert!(!name.is_empty());
        self.symbol_defs.insert(name.to_lowercase());
    }

    pub fn add_symbol_dep(&mut self, name: &str) {
        debug_assert!(!name.is_empty());
        self.symbol_deps.insert(name.to_lowercase());
    }

    /// Cache file name for this analysis: `<stem>.<hash>.an`.
    pub fn cache_file_name(fpath: &Path, file_hash: u64) -> String {
        let stem = fpath
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        format!("{stem}.{file_hash}.an")
    }
}
