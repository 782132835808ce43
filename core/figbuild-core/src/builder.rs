//! Incremental figure builder

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use regex::Regex;

use crate::discovery::{DirDiscovery, FigureDiscovery, FigureSource, DEFAULT_EXTENSION};
use crate::error::BuildError;
use crate::render::{render_eps, render_pdf, render_png, RenderContext, DEFAULT_DENSITY};
use crate::report::{ArtifactReport, ArtifactState, BuildReport, FigureReport};
use crate::staleness::{plan_figure, ArtifactKind, BuildDecision, FigurePlan};
use crate::toolchain::{texinputs, ToolRunner, Toolchain};
use crate::workspace::ScratchWorkspace;
use crate::wrapper::WrapperTemplate;

/// Everything that shapes one build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory holding the fragments; EPS and PDF are written here too.
    pub figures_dir: PathBuf,
    /// PNG previews are only produced when this is set.
    pub preview_dir: Option<PathBuf>,
    pub extension: String,
    pub name_patterns: Vec<Regex>,
    /// Rebuild every artifact regardless of timestamps.
    pub force: bool,
    /// Plan only; no workspace, no tools.
    pub dry_run: bool,
    pub follow_symlinks: bool,
    pub template: WrapperTemplate,
    /// PNG raster resolution in DPI.
    pub density: u32,
    /// Directory searched by TeX before the figures directory.
    /// Defaults to the process working directory.
    pub search_dir: Option<PathBuf>,
    /// Parent of the scratch workspace. Defaults to the system temp dir.
    pub scratch_parent: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            figures_dir: PathBuf::from("figures"),
            preview_dir: None,
            extension: DEFAULT_EXTENSION.to_string(),
            name_patterns: Vec::new(),
            force: false,
            dry_run: false,
            follow_symlinks: false,
            template: WrapperTemplate::default(),
            density: DEFAULT_DENSITY,
            search_dir: None,
            scratch_parent: None,
        }
    }
}

impl BuildOptions {
    pub fn new(figures_dir: impl Into<PathBuf>) -> Self {
        Self {
            figures_dir: figures_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = Some(dir.into());
        self
    }
}

/// Resolved directories plus one planning outcome per discovered source.
struct Survey {
    figures_dir: PathBuf,
    preview_dir: Option<PathBuf>,
    plans: Vec<(FigureSource, Result<FigurePlan, BuildError>)>,
}

/// Rebuilds stale figure artifacts, one figure at a time.
#[derive(Debug)]
pub struct Builder<R> {
    options: BuildOptions,
    toolchain: Toolchain,
    runner: R,
}

impl<R: ToolRunner> Builder<R> {
    pub fn new(options: BuildOptions, toolchain: Toolchain, runner: R) -> Self {
        Self {
            options,
            toolchain,
            runner,
        }
    }

    /// Discover fragments and decide what is stale, without building.
    pub fn plan(&self) -> Result<Vec<FigurePlan>, BuildError> {
        self.survey()?
            .plans
            .into_iter()
            .map(|(_, plan)| plan)
            .collect()
    }

    /// Build every stale artifact and report what happened.
    ///
    /// Fatal problems (unreadable figures directory, missing tool, no
    /// scratch space) abort with `Err`; anything else is recorded against
    /// the artifact it broke and the run carries on. A scratch cleanup
    /// failure ends up in [`BuildReport::warnings`].
    pub fn run(&mut self) -> Result<BuildReport, BuildError> {
        let survey = self.survey()?;
        let mut report = BuildReport::default();

        if self.options.dry_run {
            report.figures = survey
                .plans
                .iter()
                .map(|(source, plan)| match plan {
                    Ok(plan) => FigureReport::planned(plan),
                    Err(err) => FigureReport::unplanned(source, err.to_string()),
                })
                .collect();
            return Ok(report);
        }

        if let Some(dir) = &survey.preview_dir {
            fs::create_dir_all(dir).map_err(|source| BuildError::PreviewDir {
                path: dir.clone(),
                source,
            })?;
        }

        let search_dir = match &self.options.search_dir {
            Some(dir) => absolute(dir)?,
            None => env::current_dir().map_err(|err| BuildError::io("resolving", ".", err))?,
        };
        let search_path = texinputs(&[search_dir.as_path(), survey.figures_dir.as_path()])?;

        let workspace = match &self.options.scratch_parent {
            Some(parent) => ScratchWorkspace::create_in(parent)?,
            None => ScratchWorkspace::create()?,
        };

        for (source, plan) in &survey.plans {
            let plan = match plan {
                Ok(plan) => plan,
                Err(err) => {
                    warn!("{}: {err}", source.name);
                    report
                        .figures
                        .push(FigureReport::unplanned(source, err.to_string()));
                    continue;
                }
            };
            report
                .figures
                .push(self.build_figure(&workspace, &search_path, plan)?);
        }

        if let Err(err) = workspace.close() {
            warn!("{err}");
            report.warnings.push(err.to_string());
        }

        info!(
            "{} built, {} fresh, {} failed",
            report.count(ArtifactState::Built),
            report.count(ArtifactState::Fresh),
            report.count(ArtifactState::Failed)
        );
        Ok(report)
    }

    fn build_figure(
        &mut self,
        workspace: &ScratchWorkspace,
        search_path: &OsStr,
        plan: &FigurePlan,
    ) -> Result<FigureReport, BuildError> {
        let source = &plan.source;
        let mut figure = FigureReport::new(source);

        if plan.is_up_to_date() {
            debug!("{}: up to date", source.name);
            figure.artifacts = plan
                .decisions
                .iter()
                .map(|d| ArtifactReport::new(d, ArtifactState::Fresh))
                .collect();
            return Ok(figure);
        }

        let scratch = if plan.needs_wrapper() {
            Some(self.prepare_wrapper(workspace, source).map_err(|err| err.to_string()))
        } else {
            None
        };
        let mut pdf_failure: Option<String> = None;

        for decision in &plan.decisions {
            if !decision.rebuild {
                figure
                    .artifacts
                    .push(ArtifactReport::new(decision, ArtifactState::Fresh));
                continue;
            }

            let result = match (decision.kind, &scratch) {
                (ArtifactKind::Png, _) => match &pdf_failure {
                    Some(reason) => Err(BuildError::NotAttempted {
                        reason: format!("PDF build failed: {reason}"),
                    }),
                    None => self.build_png(workspace.path(), plan, decision),
                },
                (kind, Some(Ok(dir))) => {
                    let ctx = RenderContext {
                        toolchain: &self.toolchain,
                        dir,
                        name: &source.name,
                        texinputs: search_path,
                    };
                    let rendered = match kind {
                        ArtifactKind::Eps => render_eps(&ctx, &mut self.runner),
                        _ => render_pdf(&ctx, &mut self.runner),
                    };
                    rendered.and_then(|out| copy_artifact(&out, &decision.artifact))
                }
                (_, Some(Err(reason))) => Err(BuildError::NotAttempted {
                    reason: reason.clone(),
                }),
                (_, None) => Err(BuildError::NotAttempted {
                    reason: "no wrapper document".to_string(),
                }),
            };

            match result {
                Ok(()) => {
                    info!("built {}", decision.artifact.display());
                    figure
                        .artifacts
                        .push(ArtifactReport::new(decision, ArtifactState::Built));
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("{}: {} failed: {err}", source.name, decision.kind);
                    if decision.kind == ArtifactKind::Pdf {
                        pdf_failure = Some(err.to_string());
                    }
                    figure
                        .artifacts
                        .push(ArtifactReport::failed(decision, err.to_string()));
                }
            }
        }

        Ok(figure)
    }

    fn prepare_wrapper(
        &self,
        workspace: &ScratchWorkspace,
        source: &FigureSource,
    ) -> Result<PathBuf, BuildError> {
        let dir = workspace.figure_dir(&source.name)?;
        let wrapper = dir.join(format!("{}.tex", source.name));
        self.options.template.write(&source.path, &wrapper)?;
        Ok(dir)
    }

    fn build_png(
        &mut self,
        cwd: &Path,
        plan: &FigurePlan,
        decision: &BuildDecision,
    ) -> Result<(), BuildError> {
        let pdf = plan
            .decision(ArtifactKind::Pdf)
            .map(|d| d.artifact.clone())
            .ok_or_else(|| BuildError::NotAttempted {
                reason: "no PDF planned".to_string(),
            })?;
        render_png(
            &self.toolchain,
            cwd,
            &pdf,
            &decision.artifact,
            self.options.density,
            &mut self.runner,
        )
    }

    fn figures_dir(&self) -> Result<PathBuf, BuildError> {
        let dir = &self.options.figures_dir;
        fs::canonicalize(dir).map_err(|source| BuildError::SourceDir {
            path: dir.clone(),
            source,
        })
    }

    fn survey(&self) -> Result<Survey, BuildError> {
        let figures_dir = self.figures_dir()?;
        let preview_dir = self.preview_dir()?;
        let plans = self
            .discover(&figures_dir)?
            .into_iter()
            .map(|source| {
                let plan = plan_figure(&source, preview_dir.as_deref(), self.options.force);
                (source, plan)
            })
            .collect();
        Ok(Survey {
            figures_dir,
            preview_dir,
            plans,
        })
    }

    fn preview_dir(&self) -> Result<Option<PathBuf>, BuildError> {
        self.options.preview_dir.as_deref().map(absolute).transpose()
    }

    fn discover(&self, figures_dir: &Path) -> Result<Vec<FigureSource>, BuildError> {
        let sources = DirDiscovery::new(figures_dir)
            .extension(self.options.extension.as_str())
            .follow_symlinks(self.options.follow_symlinks)
            .name_patterns(self.options.name_patterns.clone())
            .discover()?;
        debug!(
            "found {} figure(s) in {}",
            sources.len(),
            figures_dir.display()
        );
        Ok(sources)
    }
}

fn copy_artifact(from: &Path, to: &Path) -> Result<(), BuildError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|err| BuildError::io("copying to", to, err))
}

fn absolute(path: &Path) -> Result<PathBuf, BuildError> {
    std::path::absolute(path).map_err(|err| BuildError::io("resolving", path, err))
}
