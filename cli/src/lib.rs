//! figbuild CLI

use std::env;
use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::LevelFilter;
use regex::Regex;

use figbuild_core::builder::{BuildOptions, Builder};
use figbuild_core::output::{write_json_pretty, write_ndjson};
use figbuild_core::render::DEFAULT_DENSITY;
use figbuild_core::report::{ArtifactState, BuildReport};
use figbuild_core::toolchain::{SystemRunner, Toolchain};
use figbuild_core::wrapper::{DocumentStyle, WrapperTemplate, DEFAULT_LIBRARIES};

/// Environment fallback for `--preview-dir`.
const PREVIEW_DIR_ENV: &str = "FIGBUILD_PREVIEW_DIR";

/// CLI entrypoint for figbuild.
#[derive(Debug, Parser)]
#[command(
    name = "figbuild",
    about = "Incrementally rebuild EPS, PDF and PNG figures from TikZ fragments"
)]
pub struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        global = true,
        conflicts_with = "verbose"
    )]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild every stale EPS, PDF and PNG artifact
    Build(BuildArgs),
    /// Show which artifacts are stale without running any tool
    Status(BuildArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Directory holding the TikZ fragments
    #[arg(long = "figures", default_value = "figures", value_hint = ValueHint::DirPath)]
    figures: PathBuf,

    /// Also rasterize figures to PNG in this directory [env: FIGBUILD_PREVIEW_DIR]
    #[arg(long = "preview-dir", value_hint = ValueHint::DirPath)]
    preview_dir: Option<PathBuf>,

    /// Fragment file extension
    #[arg(long = "ext", default_value = "tex")]
    extension: String,

    /// Regex patterns; only figures whose base name matches one are built
    #[arg(short = 'n', long = "name", value_hint = ValueHint::Other)]
    name_patterns: Vec<String>,

    /// Rebuild artifacts even when they are up to date
    #[arg(long = "force", action = ArgAction::SetTrue)]
    force: bool,

    /// Document class wrapped around each fragment
    #[arg(long = "style", default_value_t = StyleChoice::Article, value_enum)]
    style: StyleChoice,

    /// TikZ libraries to load (replaces the default shapes,snakes)
    #[arg(long = "tikz-library", value_delimiter = ',', value_hint = ValueHint::Other)]
    tikz_libraries: Vec<String>,

    /// PNG resolution in DPI
    #[arg(
        long = "density",
        default_value_t = DEFAULT_DENSITY,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    density: u32,

    /// Follow symlinked fragments
    #[arg(long = "follow-symlinks", action = ArgAction::SetTrue)]
    follow_symlinks: bool,

    /// Emit the report as a single JSON object
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "ndjson")]
    json: bool,

    /// Emit one JSON object per figure
    #[arg(long = "ndjson", action = ArgAction::SetTrue)]
    ndjson: bool,

    /// Control colorized output (auto|always|never)
    #[arg(long = "color", default_value_t = ColorChoice::Auto, value_enum)]
    color: ColorChoice,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum StyleChoice {
    Article,
    Beamer,
}

impl From<StyleChoice> for DocumentStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Article => DocumentStyle::Article,
            StyleChoice::Beamer => DocumentStyle::Beamer,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// Parse CLI args and execute the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(log_level(cli.verbose, cli.quiet));

    match cli.command {
        Command::Build(args) => run_build(args, false),
        Command::Status(args) => run_build(args, true),
    }
}

fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(level: LevelFilter) {
    // RUST_LOG, when set, wins over the flags.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

fn run_build(args: BuildArgs, dry_run: bool) -> Result<()> {
    let options = build_options(&args, dry_run, env::var_os(PREVIEW_DIR_ENV))?;
    let figures = options.figures_dir.clone();

    let mut builder = Builder::new(options, Toolchain::from_env(), SystemRunner);
    let report = builder
        .run()
        .with_context(|| format!("building figures in {}", figures.display()))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let use_color = match args.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => handle.is_terminal(),
    };

    if args.ndjson {
        write_ndjson(&report, &mut handle)?;
        // NDJSON has no slot for run-level warnings.
        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
    } else if args.json {
        write_json_pretty(&report, &mut handle)?;
    } else {
        write_plain(&report, &mut handle, use_color)?;
    }

    let failed = failure_count(&report);
    if failed > 0 {
        return Err(anyhow!("{failed} figure artifact(s) failed to build"));
    }
    if report.has_warnings() {
        return Err(anyhow!(
            "build finished with {} warning(s)",
            report.warnings.len()
        ));
    }
    Ok(())
}

fn build_options(
    args: &BuildArgs,
    dry_run: bool,
    preview_env: Option<OsString>,
) -> Result<BuildOptions> {
    let libraries = if args.tikz_libraries.is_empty() {
        DEFAULT_LIBRARIES.iter().map(|s| s.to_string()).collect()
    } else {
        args.tikz_libraries
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    Ok(BuildOptions {
        figures_dir: args.figures.clone(),
        preview_dir: resolve_preview_dir(args.preview_dir.clone(), preview_env),
        extension: args.extension.clone(),
        name_patterns: compile_patterns(&args.name_patterns)?,
        force: args.force,
        dry_run,
        follow_symlinks: args.follow_symlinks,
        template: WrapperTemplate::new(args.style.into()).with_libraries(libraries),
        density: args.density,
        ..BuildOptions::default()
    })
}

/// The flag wins; otherwise a non-empty environment value enables previews.
fn resolve_preview_dir(flag: Option<PathBuf>, env_value: Option<OsString>) -> Option<PathBuf> {
    flag.or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("invalid regex: {p}")))
        .collect()
}

fn failure_count(report: &BuildReport) -> usize {
    let unplanned = report.figures.iter().filter(|f| f.error.is_some()).count();
    report.count(ArtifactState::Failed) + unplanned
}

fn write_plain(report: &BuildReport, mut w: impl Write, color: bool) -> Result<()> {
    let path_width = report
        .figures
        .iter()
        .map(|f| f.source.display().to_string().len())
        .max()
        .unwrap_or(0)
        .clamp(0, 120);

    for figure in &report.figures {
        let path = figure.source.display().to_string();
        let path = format!("{path:<path_width$}");
        let mut line = apply_color(&path, color, AnsiColor::Cyan);

        if let Some(error) = &figure.error {
            line.push_str("  ");
            line.push_str(&apply_color(error, color, AnsiColor::Red));
        }
        for artifact in &figure.artifacts {
            let state = format!("{}:{}", artifact.kind, artifact.state.as_str());
            line.push_str("  ");
            line.push_str(&apply_color(&state, color, state_color(artifact.state)));
        }
        writeln!(w, "{}", line.trim_end())?;

        for artifact in &figure.artifacts {
            if let Some(reason) = &artifact.reason {
                for (i, text) in reason.lines().enumerate() {
                    if i == 0 {
                        writeln!(w, "    {}: {text}", artifact.kind)?;
                    } else {
                        writeln!(w, "      {text}")?;
                    }
                }
            }
        }
    }

    for warning in &report.warnings {
        let label = apply_color("warning:", color, AnsiColor::Yellow);
        writeln!(w, "{label} {warning}")?;
    }

    Ok(())
}

#[derive(Copy, Clone)]
enum AnsiColor {
    Cyan,
    Green,
    Yellow,
    Red,
    Plain,
}

fn state_color(state: ArtifactState) -> AnsiColor {
    match state {
        ArtifactState::Built => AnsiColor::Green,
        ArtifactState::Pending => AnsiColor::Yellow,
        ArtifactState::Failed => AnsiColor::Red,
        ArtifactState::Fresh => AnsiColor::Plain,
    }
}

fn apply_color(text: &str, color: bool, code: AnsiColor) -> String {
    let code_str = match code {
        AnsiColor::Cyan => "36",
        AnsiColor::Green => "32",
        AnsiColor::Yellow => "33",
        AnsiColor::Red => "31",
        AnsiColor::Plain => return text.to_string(),
    };

    if !color {
        return text.to_string();
    }

    format!("\u{1b}[{}m{}\u{1b}[0m", code_str, text)
}
