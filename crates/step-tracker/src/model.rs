//! Tracker states and the values reported to callers.

use std::collections::BTreeSet;

use formpilot_core_types::SemanticFieldType;
use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    SingleStep,
    #[default]
    AwaitingStepDetection,
    StepActive,
    Transitioning,
    Completed,
}

impl TrackerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerState::Completed)
    }
}

/// Per-step bookkeeping. Reset on every detected transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    /// 1-based.
    pub current_step_index: u32,
    pub total_steps_known: Option<u32>,
    pub filled_field_types: BTreeSet<SemanticFieldType>,
    pub has_advance_control: bool,
    pub has_submit_control: bool,
    pub stuck: bool,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            current_step_index: 1,
            total_steps_known: None,
            filled_field_types: BTreeSet::new(),
            has_advance_control: false,
            has_submit_control: false,
            stuck: false,
        }
    }
}

impl FormState {
    /// Fresh state for the step after `self`.
    pub fn next_step(&self) -> Self {
        Self {
            current_step_index: self.current_step_index + 1,
            total_steps_known: self.total_steps_known,
            ..Self::default()
        }
    }
}

/// Where a step indicator was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSource {
    /// "Step N of M" style text.
    Text,
    /// Repeated sibling markers.
    Markers,
    /// Advance control present without a submit control.
    Controls,
}

/// Position within the wizard as the page reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    pub current: Option<u32>,
    pub total: Option<u32>,
    pub source: StepSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Next,
    Submit,
}

/// Evidence that the application was submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CompletionSignal {
    SuccessPath(String),
    SuccessPhrase(String),
    ConfirmationUrl(String),
}

/// Result of one advance attempt.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AdvanceOutcome {
    /// A new step became active or the application completed.
    pub advanced: bool,
    pub new_step_index: u32,
    pub activated: Option<ControlKind>,
    pub completed: bool,
    /// Direct activation was needed after the pointer sequence.
    pub used_fallback: bool,
    pub timed_out: bool,
    pub stuck: bool,
    /// Missing required fields kept the tracker from advancing.
    pub blocked_by: Vec<String>,
    #[serde(skip)]
    pub error: Option<TrackerError>,
}
