//! Value injection with post-write verification.
//!
//! Text controls go through a cascade of techniques until the value reads
//! back exactly; selects, checkboxes, radios, file inputs and editable
//! regions each have a dedicated path.

pub mod editable;
pub mod errors;
pub mod injector;
pub mod model;
pub mod select;
pub mod text;
pub mod toggle;

pub use errors::InjectError;
pub use injector::ValueInjector;
pub use model::{FillOutcome, InjectorConfig, Technique};
pub use select::{match_option, OptionMatch};
pub use text::plan_for;
