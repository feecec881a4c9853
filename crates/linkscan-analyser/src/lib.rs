//! Declaration, definition and linkage analysis of C translation units.
//!
//! This crate provides:
//! - A tolerant C tokenizer
//! - Include-region tracking driven by `#pragma FAB ...` markers
//! - Top-level declaration scanning
//! - Storage-class to linkage classification
//! - Consolidation into one symbol record per name
//!
//! # Architecture
//!
//! ```text
//! source → Lexer → RegionTracker → StatementSplitter → scan_statement
//!        → linkage::classify → SymbolTableBuilder → Analysis → AnalysedC
//! ```
//!
//! An analysis is a pure function of the source text and the marker
//! vocabulary. Each call owns all of its state, so files can be analysed on
//! as many threads as the caller likes.

mod analysed;
mod error;
mod lexer;
mod linkage;
mod region;
mod scanner;
mod table;

pub use analysed::AnalysedC;
pub use error::{codes, AnalysisError, Result};
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use linkage::{classify, Linkage, StorageKeywords};
pub use region::{region_at_line, Marker, MarkerConfig, MarkerPair, Region, RegionBoundary, RegionTracker};
pub use scanner::{
    scan_statement, DeclarationEvent, EntityKind, Reference, ScannedStatement, Statement,
    StatementSplitter,
};
pub use table::{merge, Symbol, SymbolTable, SymbolTableBuilder};

use linkscan_common::{Diagnostic, SourceFile};

/// Everything one analysis pass produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub table: SymbolTable,
    /// Identifiers used in function bodies and initializers, in source order.
    pub references: Vec<Reference>,
    /// Non-fatal findings, in the order they were made.
    pub diagnostics: Vec<Diagnostic>,
    pub boundaries: Vec<RegionBoundary>,
}

impl Analysis {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }
}

/// Analyses C files with a fixed marker vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Analyser {
    markers: MarkerConfig,
}

impl Analyser {
    pub fn new(markers: MarkerConfig) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &MarkerConfig {
        &self.markers
    }

    /// Analyse one translation unit.
    ///
    /// A malformed region marker aborts the pass; nothing partial is returned.
    pub fn analyse(&self, file: &SourceFile) -> Result<Analysis> {
        tracing::debug!(path = %file.path.display(), "analysing");

        let tracker = RegionTracker::new(&self.markers, file);
        let mut splitter = StatementSplitter::new(tokenize(file), tracker);
        let mut builder = SymbolTableBuilder::new();
        let mut references = Vec::new();
        let mut diagnostics = Vec::new();

        while let Some(statement) = splitter.next_statement()? {
            let scanned = scan_statement(&statement);
            diagnostics.extend(scanned.diagnostic);
            for event in &scanned.events {
                let (linkage, conflict) = classify(event);
                diagnostics.extend(conflict);
                builder.push(event, linkage);
            }
            references.extend(scanned.references);
        }

        let boundaries = splitter.into_tracker().finish()?;
        let (table, merge_diagnostics) = builder.finish();
        diagnostics.extend(merge_diagnostics);
        diagnostics.sort_by_key(|d| d.offset().unwrap_or(0));

        tracing::debug!(
            path = %file.path.display(),
            symbols = table.len(),
            diagnostics = diagnostics.len(),
            "analysis complete"
        );
        Ok(Analysis {
            table,
            references,
            diagnostics,
            boundaries,
        })
    }
}

/// Analyse source text that does not come from a file.
pub fn analyse_str(source: &str, markers: &MarkerConfig) -> Result<Analysis> {
    Analyser::new(markers.clone()).analyse(&SourceFile::anonymous(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(src: &str, name: &str) -> Symbol {
        let analysis = analyse_str(src, &MarkerConfig::default()).unwrap();
        analysis.table.get(name).cloned().unwrap()
    }

    #[test]
    fn test_static_then_assignment() {
        let x = symbol("static int x; x = 1;", "x");
        assert_eq!(x.kind, EntityKind::Variable);
        assert_eq!(x.linkage, Linkage::Internal);
        assert!(!x.is_definition);
    }

    #[test]
    fn test_forward_declaration_then_body() {
        let f = symbol("int f(); int f() { return 1; }", "f");
        assert_eq!(f.kind, EntityKind::Function);
        assert_eq!(f.linkage, Linkage::External);
        assert!(f.is_definition);
    }

    #[test]
    fn test_extern_with_initializer() {
        let y = symbol("extern int y = 1;", "y");
        assert_eq!(y.linkage, Linkage::External);
        assert!(y.is_definition);
    }

    #[test]
    fn test_system_region_is_sticky() {
        let src = "#pragma FAB SysIncludeStart\nint sv;\n#pragma FAB SysIncludeEnd\nint sv;\n";
        let sv = symbol(src, "sv");
        assert_eq!(sv.region, Region::System);
        assert_eq!(sv.linkage, Linkage::External);
        assert!(!sv.is_definition);
    }

    #[test]
    fn test_static_forward_declaration_then_plain_body() {
        let g = symbol("static int g(); int g() { return 1; }", "g");
        assert_eq!(g.linkage, Linkage::Internal);
        assert!(g.is_definition);
    }

    #[test]
    fn test_diagnostics_are_returned_in_source_order() {
        let src = "int x; static int x; int x(void); static extern int y; z = 1;";
        let analysis = analyse_str(src, &MarkerConfig::default()).unwrap();
        let found: Vec<_> = analysis.diagnostics.iter().map(|d| d.code.unwrap()).collect();
        assert_eq!(
            found,
            vec![
                codes::CONFLICTING_LINKAGE,
                codes::INCONSISTENT_ENTITY_KIND,
                codes::CONFLICTING_STORAGE_KEYWORDS,
                codes::UNPARSEABLE_STATEMENT,
            ]
        );
        assert_eq!(analysis.warnings().count(), 3);
        assert_eq!(analysis.table.len(), 2);
    }

    #[test]
    fn test_malformed_marker_aborts() {
        let src = "int a;\n#pragma FAB SysIncludeEnd\nint b;\n";
        let err = analyse_str(src, &MarkerConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedRegionMarker { line: 2, .. }));
    }
}
