//! EPS, PDF and PNG render pipelines

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::toolchain::{Invocation, Stage, ToolRunner, Toolchain};

/// Raster resolution used for previews unless configured otherwise.
pub const DEFAULT_DENSITY: u32 = 125;

const NONSTOP: &str = "-interaction=nonstopmode";

/// Everything a pipeline needs to run inside one figure's scratch directory.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub toolchain: &'a Toolchain,
    /// Per-figure scratch directory holding `<name>.tex`.
    pub dir: &'a Path,
    pub name: &'a str,
    pub texinputs: &'a OsStr,
}

impl RenderContext<'_> {
    pub fn wrapper(&self) -> PathBuf {
        self.scratch("tex")
    }

    fn scratch(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{suffix}", self.name))
    }

    fn invocation(&self, stage: Stage, produces: PathBuf) -> Invocation {
        Invocation::new(self.toolchain, stage, self.dir, produces)
            .env("TEXINPUTS", self.texinputs)
    }
}

/// `latex` → `dvips -E` → `epstool --bbox`; returns the final scratch EPS.
pub fn render_eps(
    ctx: &RenderContext<'_>,
    runner: &mut impl ToolRunner,
) -> Result<PathBuf, BuildError> {
    let dvi = ctx.scratch("dvi");
    let raw = ctx.dir.join(format!("{}-raw.eps", ctx.name));
    let eps = ctx.scratch("eps");

    run(
        runner,
        ctx.invocation(Stage::Latex, dvi.clone())
            .arg(NONSTOP)
            .arg(file_name(&ctx.wrapper())),
    )?;
    run(
        runner,
        ctx.invocation(Stage::Dvips, raw.clone())
            .arg("-E")
            .arg("-o")
            .arg(file_name(&raw))
            .arg(file_name(&dvi)),
    )?;
    run(
        runner,
        ctx.invocation(Stage::Epstool, eps.clone())
            .arg("--copy")
            .arg("--bbox")
            .arg(file_name(&raw))
            .arg(file_name(&eps)),
    )?;

    Ok(eps)
}

/// `pdflatex` → `pdfcrop`; returns the cropped scratch PDF.
pub fn render_pdf(
    ctx: &RenderContext<'_>,
    runner: &mut impl ToolRunner,
) -> Result<PathBuf, BuildError> {
    let pdf = ctx.scratch("pdf");
    let cropped = ctx.dir.join(format!("{}-crop.pdf", ctx.name));

    run(
        runner,
        ctx.invocation(Stage::Pdflatex, pdf.clone())
            .arg(NONSTOP)
            .arg(file_name(&ctx.wrapper())),
    )?;
    run(
        runner,
        ctx.invocation(Stage::Pdfcrop, cropped.clone())
            .arg(file_name(&pdf))
            .arg(file_name(&cropped)),
    )?;

    Ok(cropped)
}

/// Rasterize `pdf` into `png` at `density` DPI.
pub fn render_png(
    toolchain: &Toolchain,
    cwd: &Path,
    pdf: &Path,
    png: &Path,
    density: u32,
    runner: &mut impl ToolRunner,
) -> Result<(), BuildError> {
    if !pdf.exists() {
        return Err(BuildError::NotAttempted {
            reason: format!("{} does not exist", pdf.display()),
        });
    }

    run(
        runner,
        Invocation::new(toolchain, Stage::Convert, cwd, png.to_path_buf())
            .arg("-density")
            .arg(density.to_string())
            .arg(pdf)
            .arg(png),
    )
}

fn run(runner: &mut impl ToolRunner, invocation: Invocation) -> Result<(), BuildError> {
    runner.run(&invocation)?;
    if invocation.produces.is_file() {
        Ok(())
    } else {
        Err(BuildError::MissingOutput {
            tool: invocation.program,
            path: invocation.produces,
        })
    }
}

fn file_name(path: &Path) -> &OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}
