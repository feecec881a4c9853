//! Project configuration and source preparation for linkscan.
//!
//! This crate provides:
//! - Configuration format (`linkscan.toml`)
//! - Include-region pragma injection (`.c` to `.prag`)
//!
//! # Example
//!
//! ```toml
//! # linkscan.toml
//! [project]
//! name = "um"
//!
//! [markers]
//! namespace = "FAB"
//! system = { start = "SysIncludeStart", end = "SysIncludeEnd" }
//! user = { start = "UsrIncludeStart", end = "UsrIncludeEnd" }
//!
//! [analysis]
//! sources = ["src/util.c", "src/io.c"]
//! prebuild = "_prebuild"
//! inject_pragmas = true
//! ```

mod config;
mod error;
mod pragma;

pub use config::{AnalysisConfig, LinkscanConfig, ProjectConfig};
pub use error::{ConfigError, Result};
pub use pragma::{inject_pragmas, inject_pragmas_file, prag_path};
