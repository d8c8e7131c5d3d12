//! formpilot library
//!
//! Fill sessions over the detection, injection and navigation crates, plus
//! the engine configuration and the command-line front end.

pub mod cli;
pub mod config;
pub mod errors;
pub mod report;
pub mod session;

pub use config::{load_config, EngineConfig, LoadedConfig};
pub use errors::{ConfigError, FieldFailure, SessionError, SessionResult};
pub use report::{FieldOutcome, FillStats, Progress, SessionReport, StepReport};
pub use session::FillSession;

pub use field_locator::{DetectionResult, StrategyKind};
pub use formpilot_core_types::{FillValue, SemanticFieldType};
pub use platform_registry::PatternLibrary;
pub use profile_cache::{ProfileCache, UserProfileSnapshot};
pub use step_tracker::{AdvanceOutcome, TrackerState};
