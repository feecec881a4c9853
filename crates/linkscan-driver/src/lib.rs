use linkscan_analyser::{AnalysedC, Analyser, Analysis, MarkerConfig};
use linkscan_build::LinkscanConfig;
use linkscan_common::{DiagnosticLevel, SourceFile, SourceMap};
use miette::{IntoDiagnostic, NamedSource, Result, WrapErr};
use rayon::prelude::*;
use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Content hash used to key cached results.
pub fn file_hash(content: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(content.as_bytes());
    hasher.finish()
}

/// A fresh analysis of one file.
#[derive(Debug)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub file_hash: u64,
    pub source: SourceFile,
    pub analysis: Analysis,
}

impl FileAnalysis {
    pub fn summary(&self) -> AnalysedC {
        AnalysedC::from_analysis(&self.path, self.file_hash, &self.analysis)
    }

    /// Diagnostics as miette reports pointing into the analysed text.
    pub fn reports(&self) -> impl Iterator<Item = miette::Report> + '_ {
        self.analysis.diagnostics.iter().map(|diagnostic| {
            miette::Report::new(diagnostic.clone()).with_source_code(NamedSource::new(
                self.path.display().to_string(),
                self.source.content.clone(),
            ))
        })
    }
}

/// Outcome of summarising a batch of files.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Summaries in input order.
    pub analysed: Vec<AnalysedC>,
    pub failures: Vec<(PathBuf, miette::Report)>,
    pub cache_hits: usize,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Orchestrates reading, analysing and caching C files.
pub struct Driver {
    source_map: SourceMap,
    analyser: Analyser,
    prebuild: Option<PathBuf>,
    inject_pragmas: bool,
    jobs: Option<usize>,
}

impl Driver {
    pub fn new() -> Self {
        Self::with_markers(MarkerConfig::default())
    }

    pub fn with_markers(markers: MarkerConfig) -> Self {
        Self {
            source_map: SourceMap::new(),
            analyser: Analyser::new(markers),
            prebuild: None,
            inject_pragmas: false,
            jobs: None,
        }
    }

    pub fn from_config(config: &LinkscanConfig) -> Self {
        let mut driver = Self::with_markers(config.markers.clone());
        driver.prebuild = config.prebuild_dir();
        driver.inject_pragmas = config.analysis.inject_pragmas;
        driver.jobs = config.analysis.jobs;
        driver
    }

    /// Cache summaries under `dir` as `<stem>.<hash>.an`.
    pub fn with_prebuild(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prebuild = Some(dir.into());
        self
    }

    /// Wrap `#include` lines in region pragmas before analysing.
    pub fn with_injected_pragmas(mut self, inject: bool) -> Self {
        self.inject_pragmas = inject;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    fn read(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .map_err(|e| miette::miette!("Failed to read {}: {}", path.display(), e))
    }

    /// Register the text that will be analysed for `path`.
    fn load(&self, path: &Path, content: &str) -> Result<SourceFile> {
        let (registered, text) = if self.inject_pragmas {
            (
                linkscan_build::prag_path(path),
                linkscan_build::inject_pragmas(content, self.analyser.markers()),
            )
        } else {
            (path.to_path_buf(), content.to_string())
        };

        let source_id = self.source_map.add_file(&registered, text)?;
        self.source_map
            .get(source_id)
            .ok_or_else(|| miette::miette!("Source file not found"))
    }

    fn analyse_content(&self, path: &Path, content: &str) -> Result<FileAnalysis> {
        let source = self.load(path, content)?;
        let analysis = self.analyser.analyse(&source).map_err(|err| {
            miette::Report::new(err).with_source_code(NamedSource::new(
                path.display().to_string(),
                source.content.clone(),
            ))
        })?;

        for diagnostic in &analysis.diagnostics {
            let line = diagnostic
                .offset()
                .map(|offset| source.line_number(offset))
                .unwrap_or(0);
            let code = diagnostic.code.unwrap_or("");
            match diagnostic.level {
                DiagnosticLevel::Error | DiagnosticLevel::Warning => {
                    tracing::warn!(path = %path.display(), line, code, "{}", diagnostic.message)
                }
                DiagnosticLevel::Info | DiagnosticLevel::Hint => {
                    tracing::debug!(path = %path.display(), line, code, "{}", diagnostic.message)
                }
            }
        }

        Ok(FileAnalysis {
            path: path.to_path_buf(),
            file_hash: file_hash(content),
            source,
            analysis,
        })
    }

    /// Analyse one file without consulting the cache.
    pub fn analyse_file(&self, path: impl AsRef<Path>) -> Result<FileAnalysis> {
        let path = path.as_ref();
        let content = self.read(path)?;
        self.analyse_content(path, &content)
    }

    /// Summarise one file, reusing a cached result for unchanged content.
    ///
    /// Returns the summary and whether it came from the cache.
    pub fn summarise_file(&self, path: impl AsRef<Path>) -> Result<(AnalysedC, bool)> {
        let path = path.as_ref();
        let content = self.read(path)?;
        let hash = file_hash(&content);

        if let Some(cached) = self.load_cached(path, hash) {
            tracing::debug!(path = %path.display(), hash, "using cached analysis");
            return Ok((cached, true));
        }

        let analysed = self.analyse_content(path, &content)?.summary();
        if let Some(dir) = &self.prebuild {
            self.store(dir, &analysed)?;
        }
        tracing::info!(
            path = %path.display(),
            defs = analysed.symbol_defs.len(),
            deps = analysed.symbol_deps.len(),
            "analysed"
        );
        Ok((analysed, false))
    }

    /// Summarise many files in parallel.
    ///
    /// A failing file is reported and does not stop the others.
    pub fn summarise_all(&self, paths: &[PathBuf]) -> Result<BatchReport> {
        let run = || -> Vec<(PathBuf, Result<(AnalysedC, bool)>)> {
            paths
                .par_iter()
                .map(|path| (path.clone(), self.summarise_file(path)))
                .collect()
        };

        let results = match self.jobs {
            Some(jobs) => rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .into_diagnostic()
                .wrap_err("Failed to start worker pool")?
                .install(run),
            None => run(),
        };

        let mut report = BatchReport::default();
        for (path, result) in results {
            match result {
                Ok((analysed, cached)) => {
                    report.cache_hits += usize::from(cached);
                    report.analysed.push(analysed);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "analysis failed");
                    report.failures.push((path, err));
                }
            }
        }
        Ok(report)
    }

    /// Write the pragma'd copy of `path` next to it.
    pub fn inject_pragmas_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        linkscan_build::inject_pragmas_file(path.as_ref(), self.analyser.markers()).into_diagnostic()
    }

    fn load_cached(&self, path: &Path, hash: u64) -> Option<AnalysedC> {
        let dir = self.prebuild.as_ref()?;
        let cache_path = dir.join(AnalysedC::cache_file_name(path, hash));
        let text = std::fs::read_to_string(&cache_path).ok()?;
        match serde_json::from_str::<AnalysedC>(&text) {
            Ok(mut analysed) => {
                analysed.fpath = path.to_path_buf();
                Some(analysed)
            }
            Err(err) => {
                tracing::warn!(cache = %cache_path.display(), %err, "ignoring unreadable cache file");
                None
            }
        }
    }

    fn store(&self, dir: &Path, analysed: &AnalysedC) -> Result<()> {
        std::fs::create_dir_all(dir)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;

        let target = dir.join(AnalysedC::cache_file_name(&analysed.fpath, analysed.file_hash));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).into_diagnostic()?;
        serde_json::to_writer_pretty(&mut tmp, analysed).into_diagnostic()?;
        tmp.flush().into_diagnostic()?;
        tmp.persist(&target)
            .map_err(|e| miette::miette!("Failed to write {}: {}", target.display(), e))?;
        Ok(())
    }

    /// Get a reference to the source map.
    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkscan_analyser::Region;
    use miette::Diagnostic;
    use tempfile::NamedTempFile;

    const UNIT: &str = "#pragma FAB UsrIncludeStart\n\
                        int helper(int);\n\
                        #pragma FAB UsrIncludeEnd\n\
                        static int counter;\n\
                        int api(void) { return helper(counter); }\n";

    fn c_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_analyse_c_file() {
        let mut file = NamedTempFile::with_suffix(".c").unwrap();
        write!(file, "{UNIT}").unwrap();

        let driver = Driver::new();
        let result = driver.analyse_file(file.path()).unwrap();

        assert_eq!(result.analysis.table.len(), 3);
        assert_eq!(result.analysis.table.get("helper").unwrap().region, Region::User);
        assert_eq!(result.file_hash, file_hash(UNIT));
        assert_eq!(driver.source_map().len(), 1);

        let summary = result.summary();
        assert!(summary.symbol_defs.contains("api"));
        assert!(summary.symbol_deps.contains("helper"));
    }

    #[test]
    fn test_non_c_file_rejected() {
        let mut file = NamedTempFile::with_suffix(".rs").unwrap();
        writeln!(file, "fn main() {{}}").unwrap();
        assert!(Driver::new().analyse_file(file.path()).is_err());
    }

    #[test]
    fn test_malformed_marker_is_reported() {
        let mut file = NamedTempFile::with_suffix(".c").unwrap();
        writeln!(file, "#pragma FAB UsrIncludeEnd").unwrap();

        let err = Driver::new().analyse_file(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("malformed region marker on line 1"));
        assert_eq!(
            err.code().map(|code| code.to_string()),
            Some("linkscan::malformed_region_marker".to_string())
        );
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let prebuild = dir.path().join("_prebuild");
        let path = c_file(dir.path(), "unit.c", UNIT);
        let driver = Driver::new().with_prebuild(&prebuild);

        let (first, cached) = driver.summarise_file(&path).unwrap();
        assert!(!cached);
        let cache_file = prebuild.join(AnalysedC::cache_file_name(&path, file_hash(UNIT)));
        assert!(cache_file.exists());

        let (second, cached) = driver.summarise_file(&path).unwrap();
        assert!(cached);
        assert_eq!(first, second);
    }

    #[test]
    fn test_changed_content_misses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let prebuild = dir.path().join("_prebuild");
        let path = c_file(dir.path(), "unit.c", UNIT);
        let driver = Driver::new().with_prebuild(&prebuild);
        driver.summarise_file(&path).unwrap();

        std::fs::write(&path, "int api(void) { return 0; }\n").unwrap();
        let (analysed, cached) = driver.summarise_file(&path).unwrap();
        assert!(!cached);
        assert!(analysed.symbol_deps.is_empty());
        assert_eq!(std::fs::read_dir(&prebuild).unwrap().count(), 2);
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let prebuild = dir.path().join("_prebuild");
        std::fs::create_dir_all(&prebuild).unwrap();
        let path = c_file(dir.path(), "unit.c", UNIT);
        let cache_file = prebuild.join(AnalysedC::cache_file_name(&path, file_hash(UNIT)));
        std::fs::write(&cache_file, "{ not json").unwrap();

        let (analysed, cached) = Driver::new()
            .with_prebuild(&prebuild)
            .summarise_file(&path)
            .unwrap();
        assert!(!cached);
        assert!(analysed.symbol_defs.contains("api"));
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = c_file(dir.path(), "good.c", UNIT);
        let bad = c_file(dir.path(), "bad.c", "#pragma FAB SysIncludeStart\nint x;\n");
        let missing = dir.path().join("missing.c");

        let report = Driver::new()
            .with_jobs(2)
            .summarise_all(&[good.clone(), bad.clone(), missing.clone()])
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.analysed.len(), 1);
        assert_eq!(report.analysed[0].fpath, good);
        let failed: Vec<_> = report.failures.iter().map(|(path, _)| path.clone()).collect();
        assert_eq!(failed, vec![bad, missing]);
    }

    #[test]
    fn test_injected_pragmas_assign_regions() {
        let dir = tempfile::tempdir().unwrap();
        let header = "#include <stdio.h>\n#include \"util.h\"\nint main(void) { return 0; }\n";
        let path = c_file(dir.path(), "main.c", header);

        let driver = Driver::new().with_injected_pragmas(true);
        let result = driver.analyse_file(&path).unwrap();

        assert_eq!(result.analysis.boundaries.len(), 4);
        assert!(result.source.path.ends_with("main.prag"));
        assert_eq!(result.file_hash, file_hash(header));
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = c_file(
            dir.path(),
            "linkscan.toml",
            "[project]\nname = \"p\"\n[markers]\nnamespace = \"DEPS\"\n[analysis]\nprebuild = \"_prebuild\"\n",
        );
        let config = LinkscanConfig::from_file(&config_path).unwrap();
        let driver = Driver::from_config(&config);

        assert_eq!(driver.prebuild, Some(dir.path().join("_prebuild")));
        let path = c_file(dir.path(), "d.c", "#pragma DEPS UsrIncludeStart\nint d;\n#pragma DEPS UsrIncludeEnd\n");
        let result = driver.analyse_file(&path).unwrap();
        assert_eq!(result.analysis.table.get("d").unwrap().region, Region::User);
    }

    #[test]
    fn test_write_prag_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = c_file(dir.path(), "io.c", "#include <stdio.h>\n");
        let output = Driver::new().inject_pragmas_file(&path).unwrap();
        assert_eq!(output, dir.path().join("io.prag"));
    }
}
