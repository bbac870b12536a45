//! Pipeline states and the snapshot published to user-facing surfaces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the controller currently is in a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PipelineState {
    #[default]
    Idle,
    FileSelected,
    Validating,
    Encoding,
    AwaitingConversion,
    AwaitingPresentation,
    Succeeded,
    Failed,
}

impl PipelineState {
    /// True while a selection is being validated or a run is in flight.
    ///
    /// New selections and new runs are refused in these states.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            PipelineState::Validating
                | PipelineState::Encoding
                | PipelineState::AwaitingConversion
                | PipelineState::AwaitingPresentation
        )
    }

    /// States from which `generate` may start a run.
    pub fn can_generate(self) -> bool {
        matches!(self, PipelineState::FileSelected | PipelineState::Failed)
    }

    /// Progress percentage associated with entering this state.
    pub fn progress(self) -> u8 {
        match self {
            PipelineState::Encoding => 10,
            PipelineState::AwaitingConversion => 30,
            PipelineState::AwaitingPresentation => 85,
            PipelineState::Succeeded => 100,
            _ => 0,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::FileSelected => "file-selected",
            PipelineState::Validating => "validating",
            PipelineState::Encoding => "encoding",
            PipelineState::AwaitingConversion => "awaiting-conversion",
            PipelineState::AwaitingPresentation => "awaiting-presentation",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Name and size of the selected document, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub size: u64,
}

/// Everything a presentation layer needs to render the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: PipelineState,
    /// Empty when there is nothing to say (Idle).
    pub status: String,
    /// 0–100.
    pub progress: u8,
    pub in_progress: bool,
    pub document: Option<DocumentSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_states_block_generation() {
        for s in [
            PipelineState::Validating,
            PipelineState::Encoding,
            PipelineState::AwaitingConversion,
            PipelineState::AwaitingPresentation,
        ] {
            assert!(s.is_busy());
            assert!(!s.can_generate());
        }
        assert!(PipelineState::Failed.can_generate());
        assert!(PipelineState::FileSelected.can_generate());
        assert!(!PipelineState::Idle.can_generate());
        assert!(!PipelineState::Succeeded.can_generate());
    }

    #[test]
    fn progress_increases_along_the_happy_path() {
        let path = [
            PipelineState::Encoding,
            PipelineState::AwaitingConversion,
            PipelineState::AwaitingPresentation,
            PipelineState::Succeeded,
        ];
        assert!(path.windows(2).all(|w| w[0].progress() < w[1].progress()));
    }

    #[test]
    fn default_snapshot_is_idle_and_blank() {
        let snap = StatusSnapshot::default();
        assert_eq!(snap.state, PipelineState::Idle);
        assert!(snap.status.is_empty());
        assert!(!snap.in_progress);
    }
}
