//! Wrapping `#include` lines in region pragmas.

use crate::error::{ConfigError, Result};
use linkscan_analyser::{Marker, MarkerConfig, Region};
use std::path::{Path, PathBuf};

/// Which region an `#include` line pulls from, if it is one.
fn include_region(line: &str) -> Option<Region> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let target = rest.strip_prefix("include")?.trim_start();
    match target.chars().next()? {
        '<' => Some(Region::System),
        '"' | '\'' => Some(Region::User),
        _ => None,
    }
}

/// Surround every system and user `#include` with the matching marker pair.
///
/// Other lines, including computed `#include MACRO` lines, pass through
/// unchanged.
pub fn inject_pragmas(source: &str, markers: &MarkerConfig) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let Some(region) = include_region(line) else {
            out.push_str(line);
            continue;
        };
        out.push_str(&markers.pragma(Marker::Start(region)));
        out.push('\n');
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&markers.pragma(Marker::End(region)));
        out.push('\n');
    }
    out
}

/// Where the pragma'd copy of `path` is written.
pub fn prag_path(path: &Path) -> PathBuf {
    path.with_extension("prag")
}

/// Write the pragma'd copy of a C file next to it and return its path.
pub fn inject_pragmas_file(path: &Path, markers: &MarkerConfig) -> Result<PathBuf> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let output = prag_path(path);
    std::fs::write(&output, inject_pragmas(&source, markers)).map_err(|source| {
        ConfigError::Write {
            path: output.clone(),
            source,
        }
    })?;
    tracing::debug!(from = %path.display(), to = %output.display(), "injected pragmas");
    Ok(output)
}
