//! Error types for figbuild-core

use std::env::JoinPathsError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single external tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {tool} (is it installed and on PATH?)")]
    NotFound { tool: String },

    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} {}{}", describe_exit(*code), describe_output(output))]
    Failed {
        tool: String,
        code: Option<i32>,
        output: String,
    },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::NotFound { tool }
            | ToolError::Spawn { tool, .. }
            | ToolError::Failed { tool, .. } => tool,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

fn describe_output(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!(":\n{}", output.trim_end())
    }
}

/// Everything that can go wrong while planning or building figures.
///
/// Some variants end the whole run (see [`BuildError::is_fatal`]); the rest
/// are recorded against a single artifact in the build report.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read figures directory {}: {source}", path.display())]
    SourceDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot list figures in {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("cannot create scratch workspace: {0}")]
    Workspace(#[source] io::Error),

    #[error("cannot prepare preview directory {}: {source}", path.display())]
    PreviewDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot build TEXINPUTS search path: {0}")]
    SearchPath(#[from] JoinPathsError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{tool} did not produce {}", path.display())]
    MissingOutput { tool: String, path: PathBuf },

    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not attempted: {reason}")]
    NotAttempted { reason: String },
}

impl BuildError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the run instead of failing one artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BuildError::SourceDir { .. }
                | BuildError::Walk { .. }
                | BuildError::Workspace(_)
                | BuildError::PreviewDir { .. }
                | BuildError::SearchPath(_)
                | BuildError::Tool(ToolError::NotFound { .. })
        )
    }
}
