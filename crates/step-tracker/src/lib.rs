//! Multi-step application tracking.
//!
//! [`StepTracker`] decides whether a page is a wizard, presses advance
//! controls with a pointer sequence (direct activation as fallback), waits
//! for new content and watches for submission acknowledgments. A hard cap
//! on activations keeps a dead advance control from looping forever.

pub mod completeness;
pub mod completion;
pub mod controls;
pub mod errors;
pub mod indicators;
pub mod model;
pub mod policy;
pub mod tracker;

pub use completeness::missing_required;
pub use completion::detect_completion;
pub use controls::{locate_controls, ControlSet};
pub use errors::TrackerError;
pub use indicators::StepIndicatorScanner;
pub use model::{
    AdvanceOutcome, CompletionSignal, ControlKind, FormState, StepInfo, StepSource, TrackerState,
};
pub use policy::TrackerConfig;
pub use tracker::StepTracker;
