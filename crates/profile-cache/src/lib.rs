//! Local replica of the user's application profile.
//!
//! [`ProfileCache`] pulls the profile from the remote service, normalizes it
//! into a [`UserProfileSnapshot`] and persists it through a
//! [`ProfileStore`]. Snapshots stay fresh for a configurable window (a day by
//! default); a failed refresh falls back to the last good snapshot.

pub mod cache;
pub mod errors;
pub mod model;
pub mod policy;
pub mod source;
pub mod store;
mod values;

pub use cache::ProfileCache;
pub use errors::{ProfileError, ProfileResult};
pub use model::{
    years_from_history, ApplicationAnswers, Education, ResumeAttachment, Skill,
    UserProfileSnapshot, WorkExperience,
};
pub use policy::ProfileConfig;
pub use source::{HttpProfileSource, ProfileSource};
pub use store::{FileStore, MemoryStore, ProfileStore};
