//! Page port for the formpilot engine.
//!
//! The engine never touches a browser directly: every read goes through
//! [`PageQuery`] and every write through [`PageInput`]. [`MemoryPage`] is an
//! in-process implementation over a parsed document with CSS and XPath
//! subsets, scripted click reactions and simulated framework inputs.

pub mod css;
pub mod dom;
pub mod errors;
pub mod html;
pub mod memory;
pub mod model;
pub mod ports;
pub mod xpath;

pub use errors::PageError;
pub use memory::{DomEditor, EventRecord, InputBehavior, MemoryPage, Trigger};
pub use model::{
    BindingProbe, BoundingBox, ComputedStyle, DomEvent, ElementInfo, EventKind, HandlerRef,
    OptionInfo, SyntheticEvent,
};
pub use ports::{PageDriver, PageInput, PageQuery, PageResult};

pub use formpilot_core_types::{ElementHandle, FilePayload, PageLoadId};
