//! Field detection for unknown application forms.
//!
//! A detection runs an ordered cascade of strategies (declared platform
//! rules, generic rules, attribute scoring, label context, fuzzy matching)
//! over the eligible elements of the current step and keeps the most
//! confident candidate. Results are cached per page load.

pub mod cache;
pub mod eligibility;
pub mod errors;
pub mod locator;
pub mod strategies;
pub mod types;

pub use cache::DetectionCache;
pub use eligibility::{find_container, is_eligible, is_marked_active, renders_with_ancestors, ScanScope, SectionMap};
pub use errors::LocatorError;
pub use locator::FieldLocator;
pub use strategies::{
    attribute_score, default_strategies, fits_field, fuzzy_matches, levenshtein, LocateContext,
    Strategy,
};
pub use types::{AttributeWeights, Candidate, DetectionResult, LocatorConfig, StrategyKind};
