use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Unique identifier for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u32);

impl SourceId {
    /// Id used for text that was never registered in a [`SourceMap`].
    pub const ANONYMOUS: SourceId = SourceId(u32::MAX);

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// File extensions the analyser accepts as C translation units.
///
/// `.prag` is the output of the pragma injector.
pub fn is_c_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("c" | "h" | "prag")
    )
}

/// A source file with its contents.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: SourceId,
    pub path: PathBuf,
    pub content: String,
    line_starts: Vec<u32>,
}

impl SourceFile {
    pub fn new(id: SourceId, path: PathBuf, content: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i as u32 + 1))
            .collect();

        Self {
            id,
            path,
            content,
            line_starts,
        }
    }

    /// A file that is not backed by anything on disk.
    pub fn anonymous(content: impl Into<String>) -> Self {
        Self::new(SourceId::ANONYMOUS, PathBuf::from("<input>"), content.into())
    }

    /// Get line and column (0-indexed) from byte offset.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let col = offset - self.line_starts[line];
        (line as u32, col)
    }

    /// 1-indexed line number, as compilers print it.
    pub fn line_number(&self, offset: u32) -> u32 {
        self.line_col(offset).0 + 1
    }
}

/// Registry of all source files seen by one driver.
///
/// Workers analysing files in parallel register their inputs here; each file
/// gets its own id and is never mutated afterwards.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: RwLock<Vec<SourceFile>>,
    path_to_id: RwLock<FxHashMap<PathBuf, SourceId>>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: String) -> miette::Result<SourceId> {
        let path = path.as_ref().to_path_buf();

        if !is_c_source(&path) {
            return Err(miette::miette!("Not a C source file: {:?}", path));
        }

        let mut files = self
            .files
            .write()
            .map_err(|_| miette::miette!("source map lock poisoned"))?;
        let mut path_to_id = self
            .path_to_id
            .write()
            .map_err(|_| miette::miette!("source map lock poisoned"))?;

        let id = SourceId(files.len() as u32);
        let file = SourceFile::new(id, path.clone(), content);
        files.push(file);
        path_to_id.insert(path, id);

        Ok(id)
    }

    pub fn get(&self, id: SourceId) -> Option<SourceFile> {
        let files = self.files.read().ok()?;
        files.get(id.0 as usize).cloned()
    }

    pub fn get_by_path(&self, path: impl AsRef<Path>) -> Option<SourceFile> {
        let id = {
            let path_to_id = self.path_to_id.read().ok()?;
            *path_to_id.get(path.as_ref())?
        };
        self.get(id)
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let file = SourceFile::anonymous("int a;\nint b;\n\nint c;");
        assert_eq!(file.line_col(0), (0, 0));
        assert_eq!(file.line_col(11), (1, 4));
        assert_eq!(file.line_number(15), 4);
    }

    #[test]
    fn test_source_map_rejects_non_c() {
        let map = SourceMap::new();
        assert!(map.add_file("model.f90", String::new()).is_err());

        let id = map.add_file("util.c", "int x;".to_string()).unwrap();
        assert_eq!(map.get(id).unwrap().content, "int x;");
        assert_eq!(map.get_by_path("util.c").unwrap().id, id);
        assert_eq!(map.len(), 1);
    }
}
