//! Include-region tracking.
//!
//! Before analysis, every `#include` in a file is wrapped in a pair of pragmas
//! (see `linkscan_build::inject_pragmas`), so the expanded translation unit
//! says where each header's content starts and ends:
//!
//! ```c
//! #pragma FAB SysIncludeStart
//! extern int printf(const char *, ...);
//! #pragma FAB SysIncludeEnd
//! ```
//!
//! The [`RegionTracker`] follows those markers and reports the region every
//! statement belongs to.

use crate::error::{AnalysisError, Result};
use crate::lexer::{Token, TokenKind};
use linkscan_common::{SourceFile, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a statement came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// The file's own code.
    #[default]
    None,
    /// Content of a system `#include <...>`.
    System,
    /// Content of a user `#include "..."`.
    User,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Region::None => "none",
            Region::System => "system",
            Region::User => "user",
        };
        f.write_str(text)
    }
}

/// The start/end names of one kind of region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPair {
    pub start: String,
    pub end: String,
}

impl MarkerPair {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Marker vocabulary: `#pragma <namespace> <name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub namespace: String,
    pub system: MarkerPair,
    pub user: MarkerPair,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            namespace: "FAB".to_string(),
            system: MarkerPair::new("SysIncludeStart", "SysIncludeEnd"),
            user: MarkerPair::new("UsrIncludeStart", "UsrIncludeEnd"),
        }
    }
}

/// A recognised region boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Start(Region),
    End(Region),
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Start(region) => write!(f, "{region}_include_start"),
            Marker::End(region) => write!(f, "{region}_include_end"),
        }
    }
}

impl MarkerConfig {
    fn pair(&self, region: Region) -> Option<&MarkerPair> {
        match region {
            Region::System => Some(&self.system),
            Region::User => Some(&self.user),
            Region::None => None,
        }
    }

    /// Recognise a directive line such as `#  pragma FAB UsrIncludeEnd`.
    pub fn recognize(&self, directive: &str) -> Option<Marker> {
        let body = directive.strip_prefix('#')?;
        let body = body.split("//").next().unwrap_or(body);
        let body = body.split("/*").next().unwrap_or(body);

        let mut words = body.split_whitespace();
        if words.next() != Some("pragma") || words.next() != Some(self.namespace.as_str()) {
            return None;
        }
        let name = words.next()?;
        if words.next().is_some() {
            return None;
        }

        [Region::System, Region::User].into_iter().find_map(|region| {
            let pair = self.pair(region)?;
            if name == pair.start {
                Some(Marker::Start(region))
            } else if name == pair.end {
                Some(Marker::End(region))
            } else {
                None
            }
        })
    }

    /// The directive text for a marker, without a trailing newline.
    pub fn pragma(&self, marker: Marker) -> String {
        let (region, is_start) = match marker {
            Marker::Start(region) => (region, true),
            Marker::End(region) => (region, false),
        };
        let name = match (self.pair(region), is_start) {
            (Some(pair), true) => pair.start.as_str(),
            (Some(pair), false) => pair.end.as_str(),
            (None, _) => "",
        };
        format!("#pragma {} {}", self.namespace, name)
    }
}

/// A marker together with the (1-indexed) line it was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBoundary {
    pub line: u32,
    pub marker: Marker,
}

/// Follows region markers through one file.
///
/// Regions never nest: at most one is open at a time.
pub struct RegionTracker<'a> {
    markers: &'a MarkerConfig,
    file: &'a SourceFile,
    open: Option<(Region, Span)>,
    boundaries: Vec<RegionBoundary>,
}

impl<'a> RegionTracker<'a> {
    pub fn new(markers: &'a MarkerConfig, file: &'a SourceFile) -> Self {
        Self {
            markers,
            file,
            open: None,
            boundaries: Vec::new(),
        }
    }

    /// The region statements starting now belong to.
    pub fn current(&self) -> Region {
        self.open.map_or(Region::None, |(region, _)| region)
    }

    /// Feed one token. Returns `true` if it was a region marker.
    pub fn observe(&mut self, token: &Token<'_>) -> Result<bool> {
        if token.kind != TokenKind::Directive {
            return Ok(false);
        }
        let Some(marker) = self.markers.recognize(token.text) else {
            return Ok(false);
        };

        let line = self.file.line_number(token.span.start);
        match (marker, self.open) {
            (Marker::Start(region), None) => {
                self.open = Some((region, token.span));
            }
            (Marker::Start(region), Some((open, _))) => {
                return Err(self.malformed(
                    format!("{region} region starts while a {open} region is still open"),
                    token.span,
                ));
            }
            (Marker::End(region), Some((open, _))) if open == region => {
                self.open = None;
            }
            (Marker::End(region), Some((open, _))) => {
                return Err(self.malformed(
                    format!("{region} region end does not match the open {open} region"),
                    token.span,
                ));
            }
            (Marker::End(region), None) => {
                return Err(self.malformed(
                    format!("{region} region end without a matching start"),
                    token.span,
                ));
            }
        }

        tracing::debug!(line, %marker, "region boundary");
        self.boundaries.push(RegionBoundary { line, marker });
        Ok(true)
    }

    /// Finish the file. A region left open is an error.
    pub fn finish(self) -> Result<Vec<RegionBoundary>> {
        if let Some((region, span)) = self.open {
            return Err(self.malformed(format!("{region} region is never closed"), span));
        }
        Ok(self.boundaries)
    }

    fn malformed(&self, reason: String, span: Span) -> AnalysisError {
        AnalysisError::MalformedRegionMarker {
            reason,
            line: self.file.line_number(span.start),
            span: (span.start as usize, span.len() as usize).into(),
        }
    }
}

/// The region a given line falls in, from a recorded boundary list.
pub fn region_at_line(boundaries: &[RegionBoundary], line: u32) -> Region {
    let mut region = Region::None;
    for boundary in boundaries {
        if boundary.line > line {
            break;
        }
        region = match boundary.marker {
            Marker::Start(region) => region,
            Marker::End(_) => Region::None,
        };
    }
    region
}
