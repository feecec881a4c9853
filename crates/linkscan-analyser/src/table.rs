//! Consolidation of declaration events into one record per name.
//!
//! Merge rules, applied in source order:
//! - linkage only moves down: once `Internal`, always `Internal`
//! - `is_definition` only moves up
//! - region and entity kind are fixed by the first sighting

use crate::error::codes;
use crate::linkage::Linkage;
use crate::region::Region;
use crate::scanner::{DeclarationEvent, EntityKind};
use indexmap::IndexMap;
use linkscan_common::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The consolidated record for one name in one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: SmolStr,
    pub kind: EntityKind,
    pub linkage: Linkage,
    pub is_definition: bool,
    pub region: Region,
}

impl Symbol {
    /// A symbol other translation units can link against.
    pub fn is_exported(&self) -> bool {
        self.is_definition && self.linkage == Linkage::External
    }
}

/// Fold one classified event into the existing record for its name.
///
/// Returns the new record and any diagnostics the merge produced.
pub fn merge(
    existing: Option<&Symbol>,
    event: &DeclarationEvent,
    linkage: Linkage,
) -> (Symbol, Vec<Diagnostic>) {
    let Some(existing) = existing else {
        let symbol = Symbol {
            name: event.name.clone(),
            kind: event.kind,
            linkage,
            is_definition: event.is_definition(),
            region: event.region,
        };
        return (symbol, Vec::new());
    };

    let mut diagnostics = Vec::new();

    if existing.kind != event.kind {
        diagnostics.push(
            Diagnostic::warning(format!(
                "`{}` was first declared as a {} but is redeclared as a {}",
                event.name, existing.kind, event.kind
            ))
            .with_code(codes::INCONSISTENT_ENTITY_KIND)
            .with_span(event.span)
            .with_label(format!("redeclared as a {}", event.kind))
            .with_help(format!("keeping the first declaration ({})", existing.kind)),
        );
    }

    let linkage = match (existing.linkage, linkage) {
        (Linkage::Internal, _) => Linkage::Internal,
        (Linkage::External, Linkage::Internal) => {
            diagnostics.push(
                Diagnostic::warning(format!(
                    "`{}` has external linkage but is redeclared `static`",
                    event.name
                ))
                .with_code(codes::CONFLICTING_LINKAGE)
                .with_span(event.span)
                .with_label("static redeclaration")
                .with_help("treated as internal linkage"),
            );
            Linkage::Internal
        }
        (Linkage::External, Linkage::External) => Linkage::External,
    };

    let symbol = Symbol {
        name: existing.name.clone(),
        kind: existing.kind,
        linkage,
        is_definition: existing.is_definition || event.is_definition(),
        region: existing.region,
    };
    (symbol, diagnostics)
}

/// Every symbol of one file.
///
/// Iteration follows first-sighting order; equality ignores order, and the
/// serialized form is sorted by name so cached tables are byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Symbol>", into = "Vec<Symbol>")]
pub struct SymbolTable {
    symbols: IndexMap<SmolStr, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the table.
    pub fn apply(&mut self, event: &DeclarationEvent, linkage: Linkage) -> Vec<Diagnostic> {
        let (symbol, diagnostics) = merge(self.symbols.get(&event.name), event, linkage);
        tracing::debug!(
            name = %symbol.name,
            kind = %symbol.kind,
            linkage = %symbol.linkage,
            is_definition = symbol.is_definition,
            region = %symbol.region,
            "symbol updated"
        );
        self.symbols.insert(symbol.name.clone(), symbol);
        diagnostics
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in first-sighting order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Symbols sorted by name.
    pub fn records(&self) -> Vec<Symbol> {
        let mut records: Vec<Symbol> = self.symbols.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

impl From<Vec<Symbol>> for SymbolTable {
    fn from(records: Vec<Symbol>) -> Self {
        Self {
            symbols: records
                .into_iter()
                .map(|symbol| (symbol.name.clone(), symbol))
                .collect(),
        }
    }
}

impl From<SymbolTable> for Vec<Symbol> {
    fn from(table: SymbolTable) -> Self {
        table.records()
    }
}

/// Builds a [`SymbolTable`] from a stream of classified events, collecting
/// the diagnostics produced along the way.
#[derive(Debug, Default)]
pub struct SymbolTableBuilder {
    table: SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl SymbolTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &DeclarationEvent, linkage: Linkage) {
        let diagnostics = self.table.apply(event, linkage);
        self.diagnostics.extend(diagnostics);
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn finish(self) -> (SymbolTable, Vec<Diagnostic>) {
        (self.table, self.diagnostics)
    }
}
