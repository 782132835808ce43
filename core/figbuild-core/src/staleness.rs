//! Timestamp-driven rebuild decisions

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::discovery::FigureSource;
use crate::error::BuildError;

/// Kinds of artifacts derived from one fragment, in build order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Eps,
    Pdf,
    Png,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Eps => "eps",
            ArtifactKind::Pdf => "pdf",
            ArtifactKind::Png => "png",
        }
    }

    /// Vector artifacts are typeset from the wrapper document.
    pub fn needs_wrapper(self) -> bool {
        matches!(self, ArtifactKind::Eps | ArtifactKind::Pdf)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// An artifact is stale when missing or strictly older than its source.
pub fn is_stale(source: SystemTime, artifact: Option<SystemTime>) -> bool {
    match artifact {
        Some(artifact) => source > artifact,
        None => true,
    }
}

/// Modification time of `path`, or `None` when it does not exist.
pub fn modified(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => meta.modified().map(Some),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDecision {
    pub kind: ArtifactKind,
    pub artifact: PathBuf,
    pub rebuild: bool,
}

/// Decisions for every requested artifact of one source.
#[derive(Debug, Clone)]
pub struct FigurePlan {
    pub source: FigureSource,
    pub decisions: Vec<BuildDecision>,
}

impl FigurePlan {
    pub fn decision(&self, kind: ArtifactKind) -> Option<&BuildDecision> {
        self.decisions.iter().find(|d| d.kind == kind)
    }

    pub fn needs(&self, kind: ArtifactKind) -> bool {
        self.decision(kind).is_some_and(|d| d.rebuild)
    }

    pub fn needs_wrapper(&self) -> bool {
        self.decisions
            .iter()
            .any(|d| d.rebuild && d.kind.needs_wrapper())
    }

    pub fn is_up_to_date(&self) -> bool {
        self.decisions.iter().all(|d| !d.rebuild)
    }
}

/// Where a source's artifact of `kind` lives.
///
/// EPS and PDF sit next to the fragment; PNG goes to the preview directory.
pub fn artifact_path(
    source: &FigureSource,
    kind: ArtifactKind,
    preview_dir: Option<&Path>,
) -> PathBuf {
    let file_name = format!("{}.{}", source.name, kind.extension());
    match (kind, preview_dir) {
        (ArtifactKind::Png, Some(dir)) => dir.join(file_name),
        _ => source.path.with_file_name(file_name),
    }
}

/// Compare `source` with its EPS, PDF and (with a preview directory) PNG.
pub fn plan_figure(
    source: &FigureSource,
    preview_dir: Option<&Path>,
    force: bool,
) -> Result<FigurePlan, BuildError> {
    let source_mtime = fs::metadata(&source.path)
        .and_then(|meta| meta.modified())
        .map_err(|err| BuildError::io("reading", &source.path, err))?;

    let mut kinds = vec![ArtifactKind::Eps, ArtifactKind::Pdf];
    if preview_dir.is_some() {
        kinds.push(ArtifactKind::Png);
    }

    let mut decisions = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let artifact = artifact_path(source, kind, preview_dir);
        let artifact_mtime =
            modified(&artifact).map_err(|err| BuildError::io("reading", &artifact, err))?;
        let rebuild = force || is_stale(source_mtime, artifact_mtime);
        debug!(
            "{}: {kind} {}",
            source.name,
            if rebuild { "stale" } else { "up to date" }
        );
        decisions.push(BuildDecision {
            kind,
            artifact,
            rebuild,
        });
    }

    Ok(FigurePlan {
        source: source.clone(),
        decisions,
    })
}
