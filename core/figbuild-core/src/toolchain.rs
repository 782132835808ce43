//! External tool invocation

use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{BuildError, ToolError};

/// Lines of captured tool output kept in a failure message.
const OUTPUT_TAIL_LINES: usize = 20;

/// One step of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Latex,
    Dvips,
    Epstool,
    Pdflatex,
    Pdfcrop,
    Convert,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Latex,
        Stage::Dvips,
        Stage::Epstool,
        Stage::Pdflatex,
        Stage::Pdfcrop,
        Stage::Convert,
    ];

    pub fn default_program(self) -> &'static str {
        match self {
            Stage::Latex => "latex",
            Stage::Dvips => "dvips",
            Stage::Epstool => "epstool",
            Stage::Pdflatex => "pdflatex",
            Stage::Pdfcrop => "pdfcrop",
            Stage::Convert => "convert",
        }
    }

    /// Environment variable that overrides this stage's program.
    pub fn env_var(self) -> &'static str {
        match self {
            Stage::Latex => "FIGBUILD_LATEX",
            Stage::Dvips => "FIGBUILD_DVIPS",
            Stage::Epstool => "FIGBUILD_EPSTOOL",
            Stage::Pdflatex => "FIGBUILD_PDFLATEX",
            Stage::Pdfcrop => "FIGBUILD_PDFCROP",
            Stage::Convert => "FIGBUILD_CONVERT",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_program())
    }
}

/// Program names for every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    programs: [String; 6],
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            programs: Stage::ALL.map(|stage| stage.default_program().to_string()),
        }
    }
}

impl Toolchain {
    /// Defaults, overridden by any non-empty `FIGBUILD_<STAGE>` variable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut chain = Self::default();
        for stage in Stage::ALL {
            if let Some(program) = lookup(stage.env_var()).filter(|p| !p.trim().is_empty()) {
                chain = chain.with_program(stage, program.trim());
            }
        }
        chain
    }

    pub fn with_program(mut self, stage: Stage, program: impl Into<String>) -> Self {
        self.programs[stage_index(stage)] = program.into();
        self
    }

    pub fn program(&self, stage: Stage) -> &str {
        &self.programs[stage_index(stage)]
    }
}

fn stage_index(stage: Stage) -> usize {
    stage as usize
}

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub stage: Stage,
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    pub env: Vec<(OsString, OsString)>,
    /// File the command is expected to leave behind.
    pub produces: PathBuf,
}

impl Invocation {
    pub fn new(toolchain: &Toolchain, stage: Stage, cwd: &Path, produces: PathBuf) -> Self {
        Self {
            stage,
            program: toolchain.program(stage).to_string(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
            produces,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Runs external commands to completion.
pub trait ToolRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<(), ToolError>;
}

impl<R: ToolRunner + ?Sized> ToolRunner for &mut R {
    fn run(&mut self, invocation: &Invocation) -> Result<(), ToolError> {
        (**self).run(invocation)
    }
}

/// Spawns real processes and waits for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<(), ToolError> {
        debug!("running `{invocation}` in {}", invocation.cwd.display());

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .output()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => ToolError::NotFound {
                    tool: invocation.program.clone(),
                },
                _ => ToolError::Spawn {
                    tool: invocation.program.clone(),
                    source: err,
                },
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!("{} output:\n{combined}", invocation.program);

        if output.status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                tool: invocation.program.clone(),
                code: output.status.code(),
                output: tail_lines(&combined, OUTPUT_TAIL_LINES),
            })
        }
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// `TEXINPUTS` value: the given directories followed by TeX's defaults.
pub fn texinputs(dirs: &[&Path]) -> Result<OsString, BuildError> {
    let mut paths: Vec<PathBuf> = dirs.iter().map(|d| d.to_path_buf()).collect();
    // An empty trailing entry tells kpathsea to append its default path.
    paths.push(PathBuf::new());
    Ok(env::join_paths(paths)?)
}
