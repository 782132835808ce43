//! figbuild-core: incremental TikZ figure building
//!
//! Scans a figures directory for TikZ fragments and keeps their derived
//! artifacts up to date by driving an external LaTeX toolchain:
//!
//! - **EPS**: `latex` → `dvips -E` → `epstool --bbox`
//! - **PDF**: `pdflatex` → `pdfcrop`
//! - **PNG** (only with a preview directory): `convert -density 125`
//!
//! An artifact is rebuilt when it is missing or older than its fragment.
//! Intermediate files live in a scratch workspace that is removed when the
//! run ends. Figures are processed strictly one after another.
//!
//! ```rust,no_run
//! use figbuild_core::builder::{BuildOptions, Builder};
//! use figbuild_core::toolchain::{SystemRunner, Toolchain};
//!
//! let options = BuildOptions::new("figures").with_preview_dir("html/figures");
//! let mut builder = Builder::new(options, Toolchain::from_env(), SystemRunner);
//! let report = builder.run()?;
//!
//! for figure in &report.figures {
//!     println!("{}: {} artifact(s)", figure.name, figure.artifacts.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod discovery;
pub mod error;
pub mod output;
pub mod render;
pub mod report;
pub mod staleness;
pub mod toolchain;
pub mod workspace;
pub mod wrapper;
