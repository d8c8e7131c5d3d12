//! Value types exchanged over the page port

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Static description of an element, read in one round trip.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Lowercase tag name
    pub tag: String,

    /// Lowercase `type` attribute for inputs/buttons
    pub input_type: Option<String>,

    pub name: Option<String>,
    pub id: Option<String>,
    pub placeholder: Option<String>,
    pub aria_label: Option<String>,
    pub autocomplete: Option<String>,
    pub classes: Vec<String>,

    /// All attributes, lowercase keys
    pub attributes: BTreeMap<String, String>,

    pub disabled: bool,
    pub readonly: bool,
    pub aria_disabled: bool,
    pub required: bool,
}

impl ElementInfo {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    pub fn is_textarea(&self) -> bool {
        self.tag == "textarea"
    }

    pub fn is_checkbox(&self) -> bool {
        self.tag == "input" && self.input_type.as_deref() == Some("checkbox")
    }

    pub fn is_radio(&self) -> bool {
        self.tag == "input" && self.input_type.as_deref() == Some("radio")
    }

    pub fn is_file(&self) -> bool {
        self.tag == "input" && self.input_type.as_deref() == Some("file")
    }

    /// `contenteditable` present and not `"false"`.
    pub fn is_content_editable(&self) -> bool {
        self.attr("contenteditable")
            .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
    }

    /// Controls the user types into: text-like inputs, textareas and
    /// editable regions.
    pub fn is_text_like(&self) -> bool {
        if self.is_textarea() || self.is_content_editable() {
            return true;
        }
        if self.tag != "input" {
            return false;
        }
        !matches!(
            self.input_type.as_deref(),
            Some("checkbox" | "radio" | "file" | "submit" | "button" | "reset" | "image" | "hidden")
        )
    }

    /// name, id, placeholder and aria-label joined, lowercase.
    pub fn combined_attributes(&self) -> String {
        [
            self.name.as_deref(),
            self.id.as_deref(),
            self.placeholder.as_deref(),
            self.aria_label.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}

/// Subset of the computed style that decides rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    pub fn renders(&self) -> bool {
        self.display != "none"
            && self.visibility != "hidden"
            && self.visibility != "collapse"
            && self.opacity > 0.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// One `<option>` of a select control.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionInfo {
    pub index: usize,
    pub value: String,
    pub text: String,
    pub selected: bool,
    pub disabled: bool,
}

/// Opaque reference to the change handler a UI framework attached to an
/// element. Only meaningful to the page that minted it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerRef(pub String);

/// Result of probing an element for a framework value binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingProbe {
    /// Plain element; prototype setters apply directly.
    NativeElement,

    /// A framework marker was found together with its change handler.
    FrameworkBound(HandlerRef),

    /// Host objects cannot be reflected into from this context.
    Unavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Input,
    Change,
    Focus,
    Blur,
    FocusOut,
    KeyDown,
    KeyPress,
    KeyUp,
    PointerDown,
    MouseDown,
    PointerUp,
    MouseUp,
    Click,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::FocusOut => "focusout",
            EventKind::KeyDown => "keydown",
            EventKind::KeyPress => "keypress",
            EventKind::KeyUp => "keyup",
            EventKind::PointerDown => "pointerdown",
            EventKind::MouseDown => "mousedown",
            EventKind::PointerUp => "pointerup",
            EventKind::MouseUp => "mouseup",
            EventKind::Click => "click",
        }
    }

    /// Full pointer sequence a user click produces.
    pub fn click_sequence() -> [EventKind; 5] {
        [
            EventKind::PointerDown,
            EventKind::MouseDown,
            EventKind::PointerUp,
            EventKind::MouseUp,
            EventKind::Click,
        ]
    }
}

/// Synthetic event dispatched to an element. Always bubbles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomEvent {
    pub kind: EventKind,
    pub key: Option<String>,
    pub data: Option<String>,
}

impl DomEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            key: None,
            data: None,
        }
    }

    pub fn key(kind: EventKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: Some(key.into()),
            data: None,
        }
    }

    pub fn input_data(data: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Input,
            key: None,
            data: Some(data.into()),
        }
    }
}

/// Event object handed to a framework change handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticEvent {
    pub kind: EventKind,
    pub target: formpilot_core_types::ElementHandle,
}
