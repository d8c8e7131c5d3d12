//! Ports the engine drives the host page through.
//!
//! `PageQuery` covers every read the detectors need; `PageInput` covers the
//! writes and event dispatch the injector and tracker perform. A driver for a
//! live browser implements both; `MemoryPage` implements both in-process.

use async_trait::async_trait;
use formpilot_core_types::{ElementHandle, FilePayload, PageLoadId};

use crate::errors::PageError;
use crate::model::{
    BindingProbe, BoundingBox, ComputedStyle, DomEvent, ElementInfo, HandlerRef, OptionInfo,
    SyntheticEvent,
};

pub type PageResult<T> = Result<T, PageError>;

#[async_trait]
pub trait PageQuery: Send + Sync {
    /// Identity of the current document; changes on navigation.
    async fn load_id(&self) -> PageLoadId;

    async fn url(&self) -> String;

    /// CSS selector query in document order, optionally below `scope`.
    async fn query_css(
        &self,
        selector: &str,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>>;

    /// Path-expression query in document order, element results only.
    async fn query_path(
        &self,
        expr: &str,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>>;

    /// `input` (minus hidden/button-like types), `select`, `textarea` and
    /// `contenteditable` elements in document order.
    async fn input_like_elements(
        &self,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>>;

    /// Buttons, submit/button inputs and `role="button"` elements.
    async fn button_like_elements(
        &self,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>>;

    async fn describe(&self, handle: ElementHandle) -> PageResult<ElementInfo>;

    async fn computed_style(&self, handle: ElementHandle) -> PageResult<ComputedStyle>;

    async fn bounding_box(&self, handle: ElementHandle) -> PageResult<BoundingBox>;

    async fn parent(&self, handle: ElementHandle) -> PageResult<Option<ElementHandle>>;

    async fn children(&self, handle: ElementHandle) -> PageResult<Vec<ElementHandle>>;

    /// Text of the label associated with a control: explicit `for` linkage,
    /// `aria-labelledby`, a wrapping label, or a preceding label/span sibling.
    async fn label_text(&self, handle: ElementHandle) -> PageResult<Option<String>>;

    async fn text_content(&self, handle: ElementHandle) -> PageResult<String>;

    /// Text of every rendered node of the document.
    async fn visible_text(&self) -> PageResult<String>;

    /// Current value as the page's own getter reports it; the text content
    /// of an editable region.
    async fn read_value(&self, handle: ElementHandle) -> PageResult<String>;

    async fn is_checked(&self, handle: ElementHandle) -> PageResult<bool>;

    async fn options(&self, handle: ElementHandle) -> PageResult<Vec<OptionInfo>>;

    async fn file_count(&self, handle: ElementHandle) -> PageResult<usize>;

    /// Validation message the page currently shows for the control.
    async fn validation_message(&self, handle: ElementHandle) -> PageResult<Option<String>>;

    /// Capability probe for a framework value binding.
    async fn probe_binding(&self, handle: ElementHandle) -> PageResult<BindingProbe>;
}

#[async_trait]
pub trait PageInput: Send + Sync {
    /// Write through the element prototype's original value setter.
    async fn set_value_native(&self, handle: ElementHandle, value: &str) -> PageResult<()>;

    /// Plain `element.value = ...`; honours instance-level setter overrides.
    async fn assign_value(&self, handle: ElementHandle, value: &str) -> PageResult<()>;

    /// Call a framework change handler with a synthetic event.
    async fn invoke_framework_handler(
        &self,
        handler: &HandlerRef,
        event: SyntheticEvent,
    ) -> PageResult<()>;

    /// Redefine the instance value accessor to always return `value`.
    async fn override_value_accessor(&self, handle: ElementHandle, value: &str)
        -> PageResult<()>;

    async fn dispatch(&self, handle: ElementHandle, event: DomEvent) -> PageResult<()>;

    async fn focus(&self, handle: ElementHandle) -> PageResult<()>;

    async fn blur(&self, handle: ElementHandle) -> PageResult<()>;

    async fn scroll_into_view(&self, handle: ElementHandle) -> PageResult<()>;

    /// Direct activation (`element.click()`).
    async fn activate(&self, handle: ElementHandle) -> PageResult<()>;

    /// Mark the option at `index` selected.
    async fn select_option(&self, handle: ElementHandle, index: usize) -> PageResult<()>;

    /// Replace the content of an editable region with a single text node.
    async fn set_text_content(&self, handle: ElementHandle, text: &str) -> PageResult<()>;

    /// Assign a synthetic file-transfer payload to a file control.
    async fn set_files(&self, handle: ElementHandle, files: Vec<FilePayload>) -> PageResult<()>;
}

/// A page reachable for both reads and writes.
pub trait PageDriver: PageQuery + PageInput {}

impl<T: PageQuery + PageInput + ?Sized> PageDriver for T {}
