//! Figure source discovery for figbuild-core

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::error::BuildError;

/// Default extension of TikZ fragment files.
pub const DEFAULT_EXTENSION: &str = "tex";

/// A TikZ fragment waiting to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureSource {
    pub path: PathBuf,
    /// Base name shared with every derived artifact.
    pub name: String,
}

impl FigureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

/// Trait for enumerating figure sources from some backing store.
pub trait FigureDiscovery {
    fn discover(&self) -> Result<Vec<FigureSource>, BuildError>;
}

/// Lists fragments sitting directly inside one figures directory.
#[derive(Debug, Clone)]
pub struct DirDiscovery {
    root: PathBuf,
    extension: String,
    follow_symlinks: bool,
    name_patterns: Vec<Regex>,
}

impl DirDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            follow_symlinks: false,
            name_patterns: Vec::new(),
        }
    }

    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Keep only figures whose base name matches at least one pattern.
    pub fn name_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.name_patterns = patterns;
        self
    }

    fn is_fragment(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext == self.extension)
    }

    fn is_selected(&self, source: &FigureSource) -> bool {
        self.name_patterns.is_empty()
            || self
                .name_patterns
                .iter()
                .any(|re| re.is_match(&source.name))
    }
}

impl FigureDiscovery for DirDiscovery {
    fn discover(&self) -> Result<Vec<FigureSource>, BuildError> {
        let meta = std::fs::metadata(&self.root).map_err(|source| BuildError::SourceDir {
            path: self.root.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(BuildError::SourceDir {
                path: self.root.clone(),
                source: std::io::Error::other("not a directory"),
            });
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_symlinks);

        for entry in walker {
            let entry = entry.map_err(|source| BuildError::Walk {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() || !self.is_fragment(entry.path()) {
                continue;
            }

            let source = FigureSource::new(entry.path());
            if self.is_selected(&source) {
                found.push(source);
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }
}
