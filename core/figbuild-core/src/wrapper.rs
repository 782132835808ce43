//! Standalone documents that host a single TikZ fragment

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// TikZ libraries loaded when none are configured.
pub const DEFAULT_LIBRARIES: &[&str] = &["shapes", "snakes"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStyle {
    /// Plain `article` page.
    #[default]
    Article,
    /// One `beamer` frame, so figures pick up slide fonts and sizes.
    Beamer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperTemplate {
    pub style: DocumentStyle,
    pub libraries: Vec<String>,
}

impl Default for WrapperTemplate {
    fn default() -> Self {
        Self {
            style: DocumentStyle::default(),
            libraries: DEFAULT_LIBRARIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl WrapperTemplate {
    pub fn new(style: DocumentStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    pub fn with_libraries(mut self, libraries: Vec<String>) -> Self {
        self.libraries = libraries;
        self
    }

    /// Render a document that `\input`s `fragment` inside a `tikzpicture`.
    pub fn render(&self, fragment: &Path) -> String {
        let input = input_name(fragment);
        let mut doc = String::new();

        match self.style {
            DocumentStyle::Article => doc.push_str("\\documentclass{article}\n"),
            DocumentStyle::Beamer => doc.push_str("\\documentclass[trans]{beamer}\n"),
        }
        doc.push_str("\\usepackage{tikz}\n");
        for lib in &self.libraries {
            doc.push_str(&format!("\\usetikzlibrary{{{lib}}}\n"));
        }
        if self.style == DocumentStyle::Beamer {
            doc.push_str("\\beamertemplatenavigationsymbolsempty\n");
        }
        doc.push_str("\\begin{document}\n\\pagestyle{empty}\n");

        let picture = format!("\\begin{{tikzpicture}}\n\\input{{{input}}}\n\\end{{tikzpicture}}\n");
        match self.style {
            DocumentStyle::Article => doc.push_str(&picture),
            DocumentStyle::Beamer => {
                doc.push_str("\\begin{frame}\n");
                doc.push_str(&picture);
                doc.push_str("\\end{frame}\n");
            }
        }

        doc.push_str("\\end{document}\n");
        doc
    }

    pub fn write(&self, fragment: &Path, dest: &Path) -> Result<(), BuildError> {
        fs::write(dest, self.render(fragment)).map_err(|err| BuildError::io("writing", dest, err))
    }
}

/// TeX appends `.tex` itself, so only that extension is dropped.
fn input_name(fragment: &Path) -> String {
    let is_tex = fragment
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "tex");
    let path = if is_tex {
        fragment.with_extension("")
    } else {
        fragment.to_path_buf()
    };
    path.to_string_lossy().replace('\\', "/")
}
