//! Per-figure outcome of a build run

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::discovery::FigureSource;
use crate::staleness::{ArtifactKind, BuildDecision, FigurePlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactState {
    /// Already newer than its source; nothing was run.
    Fresh,
    Built,
    /// Stale, but the run was a dry run.
    Pending,
    Failed,
}

impl ArtifactState {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactState::Fresh => "fresh",
            ArtifactState::Built => "built",
            ArtifactState::Pending => "pending",
            ArtifactState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub state: ArtifactState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ArtifactReport {
    pub fn new(decision: &BuildDecision, state: ArtifactState) -> Self {
        Self {
            kind: decision.kind,
            path: decision.artifact.clone(),
            state,
            reason: None,
        }
    }

    pub fn failed(decision: &BuildDecision, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(decision, ArtifactState::Failed)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureReport {
    pub name: String,
    pub source: PathBuf,
    pub artifacts: Vec<ArtifactReport>,
    /// Set when the figure could not even be planned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FigureReport {
    pub fn new(source: &FigureSource) -> Self {
        Self {
            name: source.name.clone(),
            source: source.path.clone(),
            artifacts: Vec::new(),
            error: None,
        }
    }

    /// Report for a dry run: stale artifacts stay `pending`.
    pub fn planned(plan: &FigurePlan) -> Self {
        let mut report = Self::new(&plan.source);
        report.artifacts = plan
            .decisions
            .iter()
            .map(|d| {
                let state = if d.rebuild {
                    ArtifactState::Pending
                } else {
                    ArtifactState::Fresh
                };
                ArtifactReport::new(d, state)
            })
            .collect();
        report
    }

    pub fn unplanned(source: &FigureSource, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(source)
        }
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactReport> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    pub fn has_failures(&self) -> bool {
        self.error.is_some()
            || self
                .artifacts
                .iter()
                .any(|a| a.state == ArtifactState::Failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub figures: Vec<FigureReport>,
    /// Problems that did not fail any artifact, such as cleanup errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl BuildReport {
    pub fn figure(&self, name: &str) -> Option<&FigureReport> {
        self.figures.iter().find(|f| f.name == name)
    }

    pub fn has_failures(&self) -> bool {
        self.figures.iter().any(FigureReport::has_failures)
    }

    /// Problems outside any single artifact, such as a failed cleanup.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Number of artifacts across all figures in `state`.
    pub fn count(&self, state: ArtifactState) -> usize {
        self.figures
            .iter()
            .flat_map(|f| &f.artifacts)
            .filter(|a| a.state == state)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(kind: ArtifactKind, rebuild: bool) -> BuildDecision {
        BuildDecision {
            kind,
            artifact: PathBuf::from(format!("/figs/a.{kind}")),
            rebuild,
        }
    }

    #[test]
    fn planned_marks_stale_artifacts_pending() {
        let plan = FigurePlan {
            source: FigureSource::new("/figs/a.tex"),
            decisions: vec![
                decision(ArtifactKind::Eps, false),
                decision(ArtifactKind::Pdf, true),
            ],
        };

        let report = FigureReport::planned(&plan);

        assert_eq!(
            report.artifact(ArtifactKind::Eps).map(|a| a.state),
            Some(ArtifactState::Fresh)
        );
        assert_eq!(
            report.artifact(ArtifactKind::Pdf).map(|a| a.state),
            Some(ArtifactState::Pending)
        );
        assert!(!report.has_failures());
    }

    #[test]
    fn counts_and_failures_roll_up() {
        let mut ok = FigureReport::new(&FigureSource::new("/figs/a.tex"));
        ok.artifacts.push(ArtifactReport::new(
            &decision(ArtifactKind::Eps, true),
            ArtifactState::Built,
        ));
        let mut bad = FigureReport::new(&FigureSource::new("/figs/b.tex"));
        bad.artifacts.push(ArtifactReport::failed(
            &decision(ArtifactKind::Pdf, true),
            "pdflatex exited with status 1",
        ));

        let report = BuildReport {
            figures: vec![ok, bad],
            warnings: Vec::new(),
        };

        assert_eq!(report.count(ArtifactState::Built), 1);
        assert_eq!(report.count(ArtifactState::Failed), 1);
        assert!(report.has_failures());
        assert!(!report.has_warnings());
        assert!(!report.figure("a").expect("a").has_failures());
    }

    #[test]
    fn serializes_states_in_lowercase() {
        let artifact =
            ArtifactReport::new(&decision(ArtifactKind::Png, true), ArtifactState::Built);
        let json = serde_json::to_value(&artifact).expect("json");

        assert_eq!(json["kind"], "png");
        assert_eq!(json["state"], "built");
        assert!(json.get("reason").is_none());
    }
}
