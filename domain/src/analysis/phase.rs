use serde::{Deserialize, Serialize};

/// Phases of one analysis run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPhase {
    Embedding,
    Clustering,
    Consolidation,
    Consensus,
}

impl AnalysisPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPhase::Embedding => "embedding",
            AnalysisPhase::Clustering => "clustering",
            AnalysisPhase::Consolidation => "consolidation",
            AnalysisPhase::Consensus => "consensus",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AnalysisPhase::Embedding => "Embedding responses",
            AnalysisPhase::Clustering => "Clustering",
            AnalysisPhase::Consolidation => "Consolidating clusters",
            AnalysisPhase::Consensus => "Computing consensus",
        }
    }
}

impl std::fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
