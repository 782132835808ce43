//! Drives the `figbuild` binary with shell-script stand-ins for the LaTeX tools.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tempfile::{tempdir, TempDir};

/// Each script appends its command line to `$FIGBUILD_TEST_LOG` and then
/// leaves behind the file the real tool would have written.
const TOOLS: &[(&str, &str)] = &[
    ("FIGBUILD_LATEX", "for last; do :; done\ntouch \"${last%.tex}.dvi\""),
    ("FIGBUILD_DVIPS", "touch \"$3\""),
    ("FIGBUILD_EPSTOOL", "cp \"$3\" \"$4\""),
    ("FIGBUILD_PDFLATEX", "for last; do :; done\ntouch \"${last%.tex}.pdf\""),
    ("FIGBUILD_PDFCROP", "cp \"$1\" \"$2\""),
    ("FIGBUILD_CONVERT", "cp \"$3\" \"$4\""),
];

struct Project {
    dir: TempDir,
}

impl Project {
    fn new(figures: &[&str]) -> Self {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        for sub in ["figures", "bin", "tmp"] {
            fs::create_dir_all(root.join(sub)).expect("mkdir");
        }

        for (var, body) in TOOLS {
            let name = var.trim_start_matches("FIGBUILD_").to_ascii_lowercase();
            write_script(&root.join("bin").join(name), body);
        }

        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        for name in figures {
            let path = root.join("figures").join(format!("{name}.tex"));
            fs::write(&path, "\\node {hello};\n").expect("fragment");
            fs::File::options()
                .write(true)
                .open(&path)
                .and_then(|f| f.set_modified(hour_ago))
                .expect("set mtime");
        }

        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    fn figbuild(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_figbuild"));
        cmd.args(args)
            .current_dir(self.root())
            .env("FIGBUILD_TEST_LOG", self.path("calls.log"))
            .env("TMPDIR", self.path("tmp"))
            .env_remove("FIGBUILD_PREVIEW_DIR")
            .env_remove("RUST_LOG");
        for (var, _) in TOOLS {
            let name = var.trim_start_matches("FIGBUILD_").to_ascii_lowercase();
            cmd.env(var, self.path("bin").join(name));
        }
        cmd
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.path("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.path("tmp")).expect("read tmp").count() == 0
    }
}

fn write_script(path: &Path, body: &str) {
    let name = path.file_name().expect("name").to_string_lossy().into_owned();
    let script = format!("#!/bin/sh\necho \"{name} $*\" >> \"$FIGBUILD_TEST_LOG\"\n{body}\n");
    fs::write(path, script).expect("write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("run figbuild")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn build_produces_artifacts_and_rerun_is_a_no_op() {
    let project = Project::new(&["diagram"]);

    let output = run(&mut project.figbuild(&["build", "--preview-dir", "html", "--color", "never"]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    for rel in ["figures/diagram.eps", "figures/diagram.pdf", "html/diagram.png"] {
        assert!(project.path(rel).is_file(), "{rel} missing");
    }
    let calls = project.calls();
    assert_eq!(calls.len(), 6, "calls: {calls:?}");
    assert!(calls[0].starts_with("latex -interaction=nonstopmode diagram.tex"));
    assert!(calls[5].starts_with("convert -density 125"));
    assert!(project.scratch_is_empty());

    let output = run(&mut project.figbuild(&["build", "--preview-dir", "html", "--color", "never"]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(project.calls().len(), 6);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("eps:fresh  pdf:fresh  png:fresh"), "stdout: {stdout}");
}

#[test]
fn status_json_reports_pending_without_building() {
    let project = Project::new(&["a", "b"]);

    let output = run(&mut project.figbuild(&["status", "--json"]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: Value = serde_json::from_slice(&output.stdout).expect("json report");
    let figures = report["figures"].as_array().expect("figures");
    assert_eq!(figures.len(), 2);
    assert_eq!(figures[0]["name"], "a");
    assert_eq!(figures[0]["artifacts"][1]["kind"], "pdf");
    assert_eq!(figures[0]["artifacts"][1]["state"], "pending");

    assert!(project.calls().is_empty());
    assert!(!project.path("figures/a.pdf").exists());
}

#[test]
fn failing_tool_exits_non_zero_but_builds_the_rest() {
    let project = Project::new(&["diagram"]);
    write_script(&project.path("bin/pdflatex"), "echo '! Emergency stop.'\nexit 1");

    let output = run(&mut project.figbuild(&["build", "--color", "never"]));

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error: 1 figure artifact(s) failed to build"));
    assert!(project.path("figures/diagram.eps").is_file());
    assert!(!project.path("figures/diagram.pdf").exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pdf:failed"), "stdout: {stdout}");
    assert!(stdout.contains("Emergency stop"), "stdout: {stdout}");
    assert!(project.scratch_is_empty());
}

#[test]
fn missing_tool_names_the_tool() {
    let project = Project::new(&["diagram"]);

    let output = run(project
        .figbuild(&["build"])
        .env("FIGBUILD_LATEX", "figbuild-test-no-such-latex"));

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("tool not found: figbuild-test-no-such-latex"), "stderr: {err}");
    assert!(project.scratch_is_empty());
}

#[test]
fn missing_figures_directory_is_reported() {
    let project = Project::new(&[]);

    let output = run(&mut project.figbuild(&["build", "--figures", "nope"]));

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("cannot read figures directory nope"));
}

#[test]
fn cleanup_failure_exits_non_zero() {
    let project = Project::new(&["diagram"]);
    // convert runs in the scratch root; take it away underneath the builder.
    write_script(&project.path("bin/convert"), "cp \"$3\" \"$4\"\nrm -rf \"$PWD\"");

    let output = run(&mut project.figbuild(&[
        "-q",
        "build",
        "--preview-dir",
        "html",
        "--color",
        "never",
    ]));

    assert_eq!(output.status.code(), Some(1));
    assert!(project.path("html/diagram.png").is_file());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("warning: removing scratch workspace"), "stdout: {stdout}");
    assert!(stderr(&output).contains("error: build finished with 1 warning(s)"));
}
