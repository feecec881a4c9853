//! Error types for linkscan-analyser.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Result type for analyser operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Fatal errors: the file cannot be analysed and no symbol table is produced.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A region marker that does not pair up with the currently open region.
    #[error("malformed region marker on line {line}: {reason}")]
    #[diagnostic(
        code(linkscan::malformed_region_marker),
        help("system and user include regions must be closed before another one opens")
    )]
    MalformedRegionMarker {
        reason: String,
        line: u32,
        #[label("this marker")]
        span: SourceSpan,
    },
}

/// Codes attached to the non-fatal diagnostics an analysis returns.
pub mod codes {
    pub const INCONSISTENT_ENTITY_KIND: &str = "linkscan::inconsistent_entity_kind";
    pub const CONFLICTING_STORAGE_KEYWORDS: &str = "linkscan::conflicting_storage_keywords";
    pub const CONFLICTING_LINKAGE: &str = "linkscan::conflicting_linkage";
    pub const UNPARSEABLE_STATEMENT: &str = "linkscan::unparseable_statement";
}
