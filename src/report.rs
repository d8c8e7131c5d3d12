//! Values the session hands back to its caller

use field_locator::{DetectionResult, StrategyKind};
use formpilot_core_types::SemanticFieldType;
use serde::{Serialize, Serializer};
use step_tracker::{AdvanceOutcome, CompletionSignal, TrackerState};
use value_injector::{FillOutcome, Technique};

use crate::errors::FieldFailure;

/// Result of filling one field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldOutcome {
    pub field: SemanticFieldType,
    pub success: bool,
    /// Injection technique that produced the verified value.
    pub strategy_used: Option<Technique>,
    pub verified: bool,
    pub detected_by: Option<StrategyKind>,
    pub confidence: Option<u8>,
    #[serde(serialize_with = "display_opt")]
    pub error: Option<FieldFailure>,
    pub validation_message: Option<String>,
}

impl FieldOutcome {
    pub fn not_found(field: SemanticFieldType) -> Self {
        Self {
            field,
            success: false,
            strategy_used: None,
            verified: false,
            detected_by: None,
            confidence: None,
            error: Some(FieldFailure::NotFound),
            validation_message: None,
        }
    }

    pub fn from_injection(
        field: SemanticFieldType,
        detection: DetectionResult,
        outcome: FillOutcome,
    ) -> Self {
        Self {
            field,
            success: outcome.success,
            strategy_used: outcome.strategy_used,
            verified: outcome.verified,
            detected_by: Some(detection.strategy_used),
            confidence: Some(detection.confidence),
            error: outcome.error.map(FieldFailure::Injection),
            validation_message: outcome.validation_message,
        }
    }
}

/// Fill counters across the whole session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FillStats {
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    pub not_found: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Progress {
    pub platform: String,
    pub state: TrackerState,
    pub current_step: u32,
    pub total_steps: Option<u32>,
    /// Fields filled on the current step.
    pub filled_count: usize,
    /// Fields detected on the current step.
    pub total_detected_fields: usize,
    pub transitions: u32,
    pub stuck: bool,
    pub completed: bool,
    pub incomplete: bool,
    pub stats: FillStats,
}

/// One pass over the active step.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StepReport {
    pub step: u32,
    pub fields: Vec<FieldOutcome>,
    /// Field types the profile had no answer for.
    pub unanswered: Vec<SemanticFieldType>,
}

impl StepReport {
    pub fn filled(&self) -> usize {
        self.fields.iter().filter(|f| f.success).count()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub completed: bool,
    pub completion: Option<CompletionSignal>,
    pub steps: Vec<StepReport>,
    pub advances: Vec<AdvanceOutcome>,
    /// Required fields left empty when the session stopped.
    pub blocked_by: Vec<String>,
    pub cancelled: bool,
    #[serde(serialize_with = "display_opt")]
    pub error: Option<String>,
    pub progress: Progress,
}

fn display_opt<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: Serializer,
{
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_none(),
    }
}
