//! Stages of the feedback pipeline, in the order they run.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingStep {
    InitialAnalysis,
    PlanCreation,
    ImageGeneration,
    AudioGeneration,
    Suggestions,
}

impl ProcessingStep {
    /// Every stage in execution order.
    pub const SEQUENCE: [ProcessingStep; 5] = [
        ProcessingStep::InitialAnalysis,
        ProcessingStep::PlanCreation,
        ProcessingStep::ImageGeneration,
        ProcessingStep::AudioGeneration,
        ProcessingStep::Suggestions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStep::InitialAnalysis => "initial-analysis",
            ProcessingStep::PlanCreation => "plan-creation",
            ProcessingStep::ImageGeneration => "image-generation",
            ProcessingStep::AudioGeneration => "audio-generation",
            ProcessingStep::Suggestions => "suggestions",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ProcessingStep::InitialAnalysis => "Analyzing Request",
            ProcessingStep::PlanCreation => "Creating Workout Plan",
            ProcessingStep::ImageGeneration => "Generating Visuals",
            ProcessingStep::AudioGeneration => "Preparing Audio",
            ProcessingStep::Suggestions => "Finalizing Response",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ProcessingStep::InitialAnalysis => "Processing your fitness query",
            ProcessingStep::PlanCreation => "Designing your exercise routine",
            ProcessingStep::ImageGeneration => "Creating exercise demonstrations",
            ProcessingStep::AudioGeneration => "Creating vocal form cues",
            ProcessingStep::Suggestions => "Preparing follow-up suggestions",
        }
    }

    /// Zero-based position in [`ProcessingStep::SEQUENCE`].
    pub fn index(self) -> usize {
        match self {
            ProcessingStep::InitialAnalysis => 0,
            ProcessingStep::PlanCreation => 1,
            ProcessingStep::ImageGeneration => 2,
            ProcessingStep::AudioGeneration => 3,
            ProcessingStep::Suggestions => 4,
        }
    }
}

impl fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProcessingStep {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ProcessingStep::SEQUENCE
            .into_iter()
            .find(|step| step.as_str() == value)
            .ok_or_else(|| format!("invalid processing step: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_indices_match_positions() {
        for (position, step) in ProcessingStep::SEQUENCE.iter().enumerate() {
            assert_eq!(step.index(), position);
        }
    }

    #[test]
    fn steps_round_trip_through_wire_names() {
        assert_eq!(
            ProcessingStep::try_from("image-generation"),
            Ok(ProcessingStep::ImageGeneration)
        );
        assert_eq!(
            serde_json::to_string(&ProcessingStep::InitialAnalysis).unwrap(),
            "\"initial-analysis\""
        );
        assert!(ProcessingStep::try_from("rendering").is_err());
    }
}
