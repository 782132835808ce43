/// Finding fragments in a figures directory
use std::fs;
use std::path::PathBuf;

use figbuild_core::discovery::{DirDiscovery, FigureDiscovery};
use figbuild_core::error::BuildError;
use regex::Regex;

#[test]
fn finds_fragments_sorted_and_ignores_outputs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    for file in ["zeta.tex", "alpha.tex", "alpha.eps", "alpha.pdf", "notes.txt"] {
        fs::write(root.join(file), "").expect("write");
    }

    let figures = DirDiscovery::new(root).discover().expect("discover");

    let names: Vec<&str> = figures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(figures[0].path, root.join("alpha.tex"));
}

#[test]
fn directory_named_like_fragment_is_skipped() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir(temp.path().join("odd.tex")).expect("mkdir");

    let figures = DirDiscovery::new(temp.path()).discover().expect("discover");

    assert!(figures.is_empty());
}

#[test]
fn name_patterns_filter_by_base_name() {
    let temp = tempfile::tempdir().expect("tempdir");
    for file in ["ipc-send.tex", "ipc-recv.tex", "boot.tex"] {
        fs::write(temp.path().join(file), "").expect("write");
    }

    let figures = DirDiscovery::new(temp.path())
        .name_patterns(vec![Regex::new("recv$").expect("re"), Regex::new("^boot").expect("re")])
        .discover()
        .expect("discover");

    let names: Vec<&str> = figures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["boot", "ipc-recv"]);
}

#[test]
fn returns_error_for_missing_root() {
    let missing = PathBuf::from("/nonexistent/figbuild-figures");
    let result = DirDiscovery::new(missing).discover();

    assert!(matches!(result, Err(BuildError::SourceDir { .. })));
}

#[test]
fn returns_error_when_root_is_a_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = temp.path().join("figures");
    fs::write(&file, "").expect("write");

    let result = DirDiscovery::new(file).discover();

    assert!(result.is_err());
}
