//! In-memory page implementing both page ports.
//!
//! Holds a parsed [`Document`] plus the per-control state a browser keeps
//! outside the markup (dirty values, checkedness, selection, file lists).
//! Page scripts are modelled as *reactions*: closures fired by clicks or
//! native activation, optionally after a delay, that edit the document
//! through a [`DomEditor`]. Input behaviours simulate controls owned by a UI
//! framework or driven purely by key events.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use formpilot_core_types::{ElementHandle, FilePayload, PageLoadId};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::css::{ElementStates, SelectorList};
use crate::dom::{collapse_whitespace, Document, NodeId, ROOT};
use crate::errors::PageError;
use crate::html::{parse_document, parse_fragment};
use crate::model::{
    BindingProbe, BoundingBox, ComputedStyle, DomEvent, ElementInfo, EventKind, HandlerRef,
    OptionInfo, SyntheticEvent,
};
use crate::ports::{PageInput, PageQuery, PageResult};
use crate::xpath::XPath;

const DEFAULT_WIDTH: f64 = 120.0;
const DEFAULT_HEIGHT: f64 = 24.0;
const REQUIRED_MESSAGE: &str = "This field is required";
const EMAIL_MESSAGE: &str = "Please enter a valid email address";

/// How a text control reacts to writes and events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputBehavior {
    /// Browser default: every setter writes the value.
    #[default]
    Plain,

    /// Controlled component: the framework model is the source of truth and
    /// is re-rendered into the DOM on input/change/blur. Only the framework
    /// change handler updates the model.
    FrameworkControlled,

    /// Value is built from keydown events; instance assignment is ignored.
    KeystrokeDriven,

    /// Host objects are not reachable for reflection.
    Opaque,
}

/// What fires a reaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Any click event, dispatched or produced by activation.
    Click,

    /// Only direct activation (`element.click()`).
    NativeActivation,
}

type ReactionFn = Arc<dyn Fn(&mut DomEditor<'_>) -> PageResult<()> + Send + Sync>;

struct Reaction {
    selector: SelectorList,
    trigger: Trigger,
    delay: Duration,
    action: ReactionFn,
}

struct Pending {
    due: Instant,
    action: ReactionFn,
}

#[derive(Clone, Debug, Default)]
struct ControlState {
    value: Option<String>,
    checked: Option<bool>,
    selected: Option<usize>,
    files: Vec<FilePayload>,
    accessor_override: Option<String>,
    framework_model: String,
    key_model: String,
    validation: Option<String>,
}

/// One dispatched event, as recorded by the page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub target: ElementHandle,
    pub kind: EventKind,
    pub key: Option<String>,
}

struct PageState {
    doc: Document,
    load: PageLoadId,
    url: String,
    controls: HashMap<NodeId, ControlState>,
    behaviors: Vec<(SelectorList, InputBehavior)>,
    reactions: Vec<Reaction>,
    pending: Vec<Pending>,
    events: Vec<EventRecord>,
    focused: Option<NodeId>,
    activations: usize,
}

struct ControlView<'a>(&'a HashMap<NodeId, ControlState>);

impl ElementStates for ControlView<'_> {
    fn is_checked(&self, doc: &Document, node: NodeId) -> bool {
        self.0
            .get(&node)
            .and_then(|c| c.checked)
            .unwrap_or_else(|| doc.has_attr(node, "checked"))
    }
}

/// Mutable view of the page handed to reactions.
pub struct DomEditor<'a> {
    page: &'a mut PageState,
}

impl DomEditor<'_> {
    fn matches(&self, selector: &str) -> PageResult<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(list.select(&self.page.doc, ROOT, &ControlView(&self.page.controls)))
    }

    pub fn set_attr(&mut self, selector: &str, name: &str, value: &str) -> PageResult<usize> {
        let nodes = self.matches(selector)?;
        for node in &nodes {
            self.page.doc.set_attr(*node, name, value);
        }
        Ok(nodes.len())
    }

    pub fn remove_attr(&mut self, selector: &str, name: &str) -> PageResult<usize> {
        let nodes = self.matches(selector)?;
        for node in &nodes {
            self.page.doc.remove_attr(*node, name);
        }
        Ok(nodes.len())
    }

    pub fn set_style(&mut self, selector: &str, style: &str) -> PageResult<usize> {
        self.set_attr(selector, "style", style)
    }

    pub fn add_class(&mut self, selector: &str, class: &str) -> PageResult<usize> {
        let nodes = self.matches(selector)?;
        for node in &nodes {
            if !self.page.doc.has_class(*node, class) {
                let mut classes: Vec<String> = self
                    .page
                    .doc
                    .classes(*node)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                classes.push(class.to_string());
                self.page.doc.set_attr(*node, "class", &classes.join(" "));
            }
        }
        Ok(nodes.len())
    }

    pub fn remove_class(&mut self, selector: &str, class: &str) -> PageResult<usize> {
        let nodes = self.matches(selector)?;
        for node in &nodes {
            let classes: Vec<String> = self
                .page
                .doc
                .classes(*node)
                .into_iter()
                .filter(|c| *c != class)
                .map(str::to_string)
                .collect();
            self.page.doc.set_attr(*node, "class", &classes.join(" "));
        }
        Ok(nodes.len())
    }

    /// Append parsed markup to the first match.
    pub fn append_html(&mut self, selector: &str, markup: &str) -> PageResult<usize> {
        let Some(target) = self.matches(selector)?.first().copied() else {
            return Ok(0);
        };
        parse_fragment(&mut self.page.doc, target, markup)?;
        Ok(1)
    }

    /// Replace the children of the first match with parsed markup.
    pub fn set_inner_html(&mut self, selector: &str, markup: &str) -> PageResult<usize> {
        let Some(target) = self.matches(selector)?.first().copied() else {
            return Ok(0);
        };
        self.page.doc.clear_children(target);
        parse_fragment(&mut self.page.doc, target, markup)?;
        Ok(1)
    }

    pub fn remove(&mut self, selector: &str) -> PageResult<usize> {
        let nodes = self.matches(selector)?;
        for node in &nodes {
            self.page.doc.detach(*node);
        }
        Ok(nodes.len())
    }

    /// Full navigation: new document, new load id, control state dropped.
    pub fn navigate(&mut self, url: &str, markup: &str) -> PageResult<()> {
        self.page.replace_document(url, markup)
    }

    /// History-style URL change without a new load.
    pub fn set_url(&mut self, url: &str) {
        self.page.url = url.to_string();
    }

    pub fn url(&self) -> &str {
        &self.page.url
    }
}

impl PageState {
    fn replace_document(&mut self, url: &str, markup: &str) -> PageResult<()> {
        let doc = parse_document(markup)?;
        self.doc = doc;
        self.load = PageLoadId(self.load.0 + 1);
        self.url = url.to_string();
        self.controls.clear();
        self.pending.clear();
        self.focused = None;
        debug!(url = %url, load = %self.load, "page navigated");
        Ok(())
    }

    fn handle(&self, node: NodeId) -> ElementHandle {
        ElementHandle::new(self.load, node as u32)
    }

    fn resolve(&self, handle: ElementHandle) -> PageResult<NodeId> {
        if !handle.belongs_to(self.load) {
            return Err(PageError::StaleHandle(handle));
        }
        let node = handle.slot() as usize;
        if !self.doc.is_element(node) {
            return Err(PageError::UnknownHandle(handle));
        }
        Ok(node)
    }

    fn scope(&self, scope: Option<ElementHandle>) -> PageResult<NodeId> {
        scope.map(|h| self.resolve(h)).transpose().map(|s| s.unwrap_or(ROOT))
    }

    fn apply_due(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let now = Instant::now();
        let (mut due, rest): (Vec<Pending>, Vec<Pending>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| p.due <= now);
        self.pending = rest;
        due.sort_by_key(|p| p.due);
        for pending in due {
            self.run_action(&pending.action);
        }
    }

    fn run_action(&mut self, action: &ReactionFn) {
        let mut editor = DomEditor { page: self };
        if let Err(err) = action(&mut editor) {
            warn!(error = %err, "page reaction failed");
        }
    }

    fn behavior_of(&self, node: NodeId) -> InputBehavior {
        let view = ControlView(&self.controls);
        self.behaviors
            .iter()
            .rev()
            .find(|(selector, _)| selector.matches(&self.doc, node, &view))
            .map(|(_, behavior)| *behavior)
            .unwrap_or_default()
    }

    fn input_type(&self, node: NodeId) -> Option<String> {
        match self.doc.tag(node)? {
            "input" => Some(
                self.doc
                    .attr(node, "type")
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_else(|| "text".to_string()),
            ),
            "button" => Some(
                self.doc
                    .attr(node, "type")
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_else(|| "submit".to_string()),
            ),
            _ => None,
        }
    }

    fn is_content_editable(&self, node: NodeId) -> bool {
        self.doc
            .attr(node, "contenteditable")
            .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
    }

    fn is_input_like(&self, node: NodeId) -> bool {
        match self.doc.tag(node) {
            Some("select") | Some("textarea") => true,
            Some("input") => !matches!(
                self.input_type(node).as_deref(),
                Some("hidden" | "submit" | "button" | "reset" | "image")
            ),
            Some(_) => self.is_content_editable(node),
            None => false,
        }
    }

    fn is_text_control(&self, node: NodeId) -> bool {
        match self.doc.tag(node) {
            Some("textarea") => true,
            Some("input") => !matches!(
                self.input_type(node).as_deref(),
                Some(
                    "checkbox" | "radio" | "file" | "hidden" | "submit" | "button" | "reset"
                        | "image"
                )
            ),
            _ => false,
        }
    }

    fn is_button_like(&self, node: NodeId) -> bool {
        match self.doc.tag(node) {
            Some("button") => true,
            Some("input") => matches!(
                self.input_type(node).as_deref(),
                Some("submit" | "button" | "image")
            ),
            Some(_) => self
                .doc
                .attr(node, "role")
                .is_some_and(|r| r.eq_ignore_ascii_case("button")),
            None => false,
        }
    }

    fn option_nodes(&self, select: NodeId) -> Vec<NodeId> {
        self.doc
            .descendant_elements(select)
            .into_iter()
            .filter(|n| self.doc.tag(*n) == Some("option"))
            .collect()
    }

    fn option_value(&self, option: NodeId) -> String {
        self.doc
            .attr(option, "value")
            .map(str::to_string)
            .unwrap_or_else(|| self.doc.text_content(option))
    }

    fn selected_index(&self, select: NodeId) -> Option<usize> {
        let options = self.option_nodes(select);
        if options.is_empty() {
            return None;
        }
        if let Some(selected) = self.controls.get(&select).and_then(|c| c.selected) {
            return Some(selected);
        }
        Some(
            options
                .iter()
                .position(|o| self.doc.has_attr(*o, "selected"))
                .unwrap_or(0),
        )
    }

    fn checked(&self, node: NodeId) -> bool {
        ControlView(&self.controls).is_checked(&self.doc, node)
    }

    /// Value the DOM currently holds, ignoring accessor overrides.
    fn dom_value(&self, node: NodeId) -> String {
        if let Some(value) = self.controls.get(&node).and_then(|c| c.value.clone()) {
            return value;
        }
        if self.is_content_editable(node) {
            return self.doc.string_value(node);
        }
        match self.doc.tag(node) {
            Some("textarea") => self.doc.string_value(node),
            Some("select") => self
                .selected_index(node)
                .and_then(|idx| self.option_nodes(node).get(idx).copied())
                .map(|o| self.option_value(o))
                .unwrap_or_default(),
            _ => match self.input_type(node).as_deref() {
                Some("checkbox" | "radio") => {
                    self.doc.attr(node, "value").unwrap_or("on").to_string()
                }
                _ => self.doc.attr(node, "value").unwrap_or_default().to_string(),
            },
        }
    }

    fn read_value(&self, node: NodeId) -> String {
        match self.controls.get(&node).and_then(|c| c.accessor_override.clone()) {
            Some(value) => value,
            None => self.dom_value(node),
        }
    }

    fn write_dom_value(&mut self, node: NodeId, value: &str) {
        if self.doc.tag(node) == Some("select") {
            let position = self
                .option_nodes(node)
                .iter()
                .position(|o| self.option_value(*o) == value);
            let control = self.controls.entry(node).or_default();
            control.selected = position;
            control.value = None;
            return;
        }
        self.controls.entry(node).or_default().value = Some(value.to_string());
    }

    fn is_empty_control(&self, node: NodeId) -> bool {
        match self.input_type(node).as_deref() {
            Some("checkbox" | "radio") => !self.checked(node),
            Some("file") => self
                .controls
                .get(&node)
                .map(|c| c.files.is_empty())
                .unwrap_or(true),
            _ => self.read_value(node).trim().is_empty(),
        }
    }

    fn validate(&mut self, node: NodeId) {
        let required = self.doc.has_attr(node, "required")
            || self.doc.attr(node, "aria-required") == Some("true");
        let message = if required && self.is_empty_control(node) {
            Some(REQUIRED_MESSAGE.to_string())
        } else if self.input_type(node).as_deref() == Some("email") {
            let value = self.read_value(node);
            (!value.is_empty() && !value.contains('@')).then(|| EMAIL_MESSAGE.to_string())
        } else {
            None
        };
        self.controls.entry(node).or_default().validation = message;
    }

    fn record(&mut self, node: NodeId, event: &DomEvent) {
        let target = self.handle(node);
        self.events.push(EventRecord {
            target,
            kind: event.kind,
            key: event.key.clone(),
        });
    }

    fn dispatch(&mut self, node: NodeId, event: DomEvent) {
        self.record(node, &event);
        let behavior = self.behavior_of(node);
        match (behavior, event.kind) {
            (
                InputBehavior::FrameworkControlled,
                EventKind::Input | EventKind::Change | EventKind::Blur | EventKind::FocusOut,
            ) => {
                let model = self
                    .controls
                    .get(&node)
                    .map(|c| c.framework_model.clone())
                    .unwrap_or_default();
                self.controls.entry(node).or_default().value = Some(model);
            }
            (InputBehavior::KeystrokeDriven, EventKind::KeyDown) => {
                if let Some(key) = event.key.as_deref() {
                    let control = self.controls.entry(node).or_default();
                    if key == "Backspace" {
                        control.key_model.pop();
                    } else if key.chars().count() == 1 {
                        control.key_model.push_str(key);
                    }
                }
            }
            (InputBehavior::KeystrokeDriven, EventKind::Input | EventKind::Change) => {
                let control = self.controls.entry(node).or_default();
                control.value = Some(control.key_model.clone());
            }
            // Default key action of a native text control.
            (InputBehavior::Plain | InputBehavior::Opaque, EventKind::KeyDown)
                if self.is_text_control(node) =>
            {
                if let Some(key) = event.key.as_deref() {
                    let mut value = self.dom_value(node);
                    if key == "Backspace" {
                        value.pop();
                    } else if key.chars().count() == 1 {
                        value.push_str(key);
                    }
                    self.write_dom_value(node, &value);
                }
            }
            _ => {}
        }
        match event.kind {
            EventKind::Blur | EventKind::FocusOut => self.validate(node),
            EventKind::Click => self.fire_reactions(node, Trigger::Click),
            _ => {}
        }
    }

    fn fire_reactions(&mut self, node: NodeId, trigger: Trigger) {
        let mut path = vec![node];
        path.extend(self.doc.ancestors(node));
        let view = ControlView(&self.controls);
        let fired: Vec<(Duration, ReactionFn)> = self
            .reactions
            .iter()
            .filter(|r| r.trigger == trigger)
            .filter(|r| path.iter().any(|n| r.selector.matches(&self.doc, *n, &view)))
            .map(|r| (r.delay, Arc::clone(&r.action)))
            .collect();
        for (delay, action) in fired {
            if delay.is_zero() {
                debug!(?trigger, "page reaction fired");
                self.run_action(&action);
            } else {
                debug!(?trigger, delay_ms = delay.as_millis() as u64, "page reaction scheduled");
                self.pending.push(Pending {
                    due: Instant::now() + delay,
                    action,
                });
            }
        }
    }

    fn toggle(&mut self, node: NodeId) -> bool {
        match self.input_type(node).as_deref() {
            Some("checkbox") => {
                let next = !self.checked(node);
                self.controls.entry(node).or_default().checked = Some(next);
                true
            }
            Some("radio") => {
                if let Some(name) = self.doc.attr(node, "name").map(str::to_string) {
                    let group: Vec<NodeId> = self
                        .doc
                        .descendant_elements(ROOT)
                        .into_iter()
                        .filter(|n| {
                            *n != node
                                && self.input_type(*n).as_deref() == Some("radio")
                                && self.doc.attr(*n, "name") == Some(name.as_str())
                        })
                        .collect();
                    for other in group {
                        self.controls.entry(other).or_default().checked = Some(false);
                    }
                }
                self.controls.entry(node).or_default().checked = Some(true);
                true
            }
            _ => false,
        }
    }

    fn hidden_by_style(&self, node: NodeId) -> bool {
        let style = self.style_of(node);
        style.display == "none"
    }

    fn style_of(&self, node: NodeId) -> ComputedStyle {
        let mut style = ComputedStyle::default();
        let declarations = parse_style(self.doc.attr(node, "style").unwrap_or_default());
        if self.doc.has_attr(node, "hidden") || self.input_type(node).as_deref() == Some("hidden")
        {
            style.display = "none".to_string();
        }
        if let Some(display) = declarations.get("display") {
            style.display = display.clone();
        }
        if let Some(visibility) = declarations.get("visibility") {
            style.visibility = visibility.clone();
        }
        if let Some(opacity) = declarations.get("opacity").and_then(|o| o.parse().ok()) {
            style.opacity = opacity;
        }
        style
    }

    fn bounding_box(&self, node: NodeId) -> BoundingBox {
        if !self.doc.is_connected(node) {
            return BoundingBox::default();
        }
        let mut chain = vec![node];
        chain.extend(self.doc.ancestors(node));
        if chain
            .iter()
            .any(|n| self.doc.is_element(*n) && self.hidden_by_style(*n))
        {
            return BoundingBox::default();
        }
        let declarations = parse_style(self.doc.attr(node, "style").unwrap_or_default());
        let dimension = |key: &str, default: f64| {
            declarations
                .get(key)
                .and_then(|v| parse_length(v))
                .unwrap_or(default)
        };
        let order = self.doc.order_map().get(&node).copied().unwrap_or(0);
        BoundingBox {
            x: 0.0,
            y: order as f64 * DEFAULT_HEIGHT,
            width: dimension("width", DEFAULT_WIDTH),
            height: dimension("height", DEFAULT_HEIGHT),
        }
    }

    fn renders_subtree_root(&self, node: NodeId) -> bool {
        if !self.doc.is_element(node) {
            return true;
        }
        self.style_of(node).renders()
    }

    fn visible_text(&self) -> String {
        let mut out = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            if !self.renders_subtree_root(node) {
                continue;
            }
            if let Some(text) = self.doc.text(node) {
                out.push(text.to_string());
            }
            stack.extend(self.doc.children(node).iter().rev().copied());
        }
        collapse_whitespace(&out.join(" "))
    }

    fn label_text(&self, node: NodeId) -> Option<String> {
        let doc = &self.doc;
        let non_empty = |text: String| (!text.is_empty()).then_some(text);

        if let Some(id) = doc.attr(node, "id").filter(|id| !id.is_empty()) {
            let explicit = doc.descendant_elements(ROOT).into_iter().find(|n| {
                doc.tag(*n) == Some("label") && doc.attr(*n, "for") == Some(id)
            });
            if let Some(text) = explicit.and_then(|l| non_empty(doc.text_content(l))) {
                return Some(text);
            }
        }
        if let Some(ids) = doc.attr(node, "aria-labelledby") {
            let joined = ids
                .split_whitespace()
                .filter_map(|id| doc.find_by_id(id))
                .map(|n| doc.text_content(n))
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(text) = non_empty(collapse_whitespace(&joined)) {
                return Some(text);
            }
        }
        let wrapping = doc
            .ancestors(node)
            .into_iter()
            .find(|n| doc.tag(*n) == Some("label"));
        if let Some(text) = wrapping.and_then(|l| non_empty(doc.text_content(l))) {
            return Some(text);
        }
        doc.preceding_siblings(node)
            .into_iter()
            .find(|n| doc.is_element(*n))
            .filter(|n| matches!(doc.tag(*n), Some("label" | "span")))
            .and_then(|n| non_empty(doc.text_content(n)))
    }

    fn describe(&self, node: NodeId) -> ElementInfo {
        let doc = &self.doc;
        let attr = |name: &str| doc.attr(node, name).map(str::to_string);
        ElementInfo {
            tag: doc.tag(node).unwrap_or_default().to_string(),
            input_type: self.input_type(node),
            name: attr("name"),
            id: attr("id"),
            placeholder: attr("placeholder"),
            aria_label: attr("aria-label"),
            autocomplete: attr("autocomplete"),
            classes: doc.classes(node).into_iter().map(str::to_string).collect(),
            attributes: doc
                .attrs(node)
                .iter()
                .cloned()
                .collect::<BTreeMap<String, String>>(),
            disabled: doc.has_attr(node, "disabled"),
            readonly: doc.has_attr(node, "readonly"),
            aria_disabled: doc
                .attr(node, "aria-disabled")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            required: doc.has_attr(node, "required")
                || doc
                    .attr(node, "aria-required")
                    .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }
}

fn parse_style(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            Some((
                key.trim().to_ascii_lowercase(),
                value.trim().trim_end_matches("!important").trim().to_ascii_lowercase(),
            ))
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn parse_length(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    digits.parse().ok()
}

/// In-memory page. Cheap to share behind an `Arc`.
pub struct MemoryPage {
    state: Mutex<PageState>,
}

impl MemoryPage {
    pub fn new(url: &str, markup: &str) -> PageResult<Self> {
        Ok(Self {
            state: Mutex::new(PageState {
                doc: parse_document(markup)?,
                load: PageLoadId(1),
                url: url.to_string(),
                controls: HashMap::new(),
                behaviors: Vec::new(),
                reactions: Vec::new(),
                pending: Vec::new(),
                events: Vec::new(),
                focused: None,
                activations: 0,
            }),
        })
    }

    /// Give every control matching `selector` the given behaviour. Later
    /// registrations win; rules survive navigation.
    pub fn set_behavior(&self, selector: &str, behavior: InputBehavior) -> PageResult<()> {
        let selector = SelectorList::parse(selector)?;
        self.state.lock().behaviors.push((selector, behavior));
        Ok(())
    }

    fn add_reaction<F>(
        &self,
        selector: &str,
        trigger: Trigger,
        delay: Duration,
        action: F,
    ) -> PageResult<()>
    where
        F: Fn(&mut DomEditor<'_>) -> PageResult<()> + Send + Sync + 'static,
    {
        let selector = SelectorList::parse(selector)?;
        self.state.lock().reactions.push(Reaction {
            selector,
            trigger,
            delay,
            action: Arc::new(action),
        });
        Ok(())
    }

    /// Run `action` whenever an element matching `selector` (or inside one)
    /// receives a click.
    pub fn on_click<F>(&self, selector: &str, action: F) -> PageResult<()>
    where
        F: Fn(&mut DomEditor<'_>) -> PageResult<()> + Send + Sync + 'static,
    {
        self.add_reaction(selector, Trigger::Click, Duration::ZERO, action)
    }

    /// Like [`MemoryPage::on_click`], applied `delay` after the click.
    pub fn on_click_after<F>(&self, selector: &str, delay: Duration, action: F) -> PageResult<()>
    where
        F: Fn(&mut DomEditor<'_>) -> PageResult<()> + Send + Sync + 'static,
    {
        self.add_reaction(selector, Trigger::Click, delay, action)
    }

    /// Run `action` only on direct activation; dispatched pointer events
    /// are ignored.
    pub fn on_activation<F>(&self, selector: &str, action: F) -> PageResult<()>
    where
        F: Fn(&mut DomEditor<'_>) -> PageResult<()> + Send + Sync + 'static,
    {
        self.add_reaction(selector, Trigger::NativeActivation, Duration::ZERO, action)
    }

    /// Edit the page directly, as a page script would.
    pub fn edit<R>(&self, f: impl FnOnce(&mut DomEditor<'_>) -> R) -> R {
        let mut state = self.state.lock();
        let mut editor = DomEditor { page: &mut state };
        f(&mut editor)
    }

    pub fn navigate(&self, url: &str, markup: &str) -> PageResult<()> {
        self.state.lock().replace_document(url, markup)
    }

    /// First element matching a CSS selector.
    pub fn find(&self, selector: &str) -> PageResult<Option<ElementHandle>> {
        Ok(self.find_all(selector)?.into_iter().next())
    }

    pub fn find_all(&self, selector: &str) -> PageResult<Vec<ElementHandle>> {
        let mut state = self.state.lock();
        state.apply_due();
        let list = SelectorList::parse(selector)?;
        let nodes = list.select(&state.doc, ROOT, &ControlView(&state.controls));
        Ok(nodes.into_iter().map(|n| state.handle(n)).collect())
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.state.lock().events.clone()
    }

    pub fn events_for(&self, target: ElementHandle) -> Vec<EventKind> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| e.target == target)
            .map(|e| e.kind)
            .collect()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Number of direct activations performed so far.
    pub fn activation_count(&self) -> usize {
        self.state.lock().activations
    }

    pub fn focused(&self) -> Option<ElementHandle> {
        let state = self.state.lock();
        state.focused.map(|n| state.handle(n))
    }
}

#[async_trait]
impl PageQuery for MemoryPage {
    async fn load_id(&self) -> PageLoadId {
        let mut state = self.state.lock();
        state.apply_due();
        state.load
    }

    async fn url(&self) -> String {
        let mut state = self.state.lock();
        state.apply_due();
        state.url.clone()
    }

    async fn query_css(
        &self,
        selector: &str,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        let mut state = self.state.lock();
        state.apply_due();
        let root = state.scope(scope)?;
        let list = SelectorList::parse(selector)?;
        let nodes = list.select(&state.doc, root, &ControlView(&state.controls));
        Ok(nodes.into_iter().map(|n| state.handle(n)).collect())
    }

    async fn query_path(
        &self,
        expr: &str,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        let mut state = self.state.lock();
        state.apply_due();
        let root = state.scope(scope)?;
        let path = XPath::parse(expr)?;
        let nodes = path.select_elements(&state.doc, root)?;
        Ok(nodes
            .into_iter()
            .filter(|n| root == ROOT || state.doc.contains(root, *n))
            .map(|n| state.handle(n))
            .collect())
    }

    async fn input_like_elements(
        &self,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        let mut state = self.state.lock();
        state.apply_due();
        let root = state.scope(scope)?;
        Ok(state
            .doc
            .descendant_elements(root)
            .into_iter()
            .filter(|n| state.is_input_like(*n))
            .map(|n| state.handle(n))
            .collect())
    }

    async fn button_like_elements(
        &self,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        let mut state = self.state.lock();
        state.apply_due();
        let root = state.scope(scope)?;
        Ok(state
            .doc
            .descendant_elements(root)
            .into_iter()
            .filter(|n| state.is_button_like(*n))
            .map(|n| state.handle(n))
            .collect())
    }

    async fn describe(&self, handle: ElementHandle) -> PageResult<ElementInfo> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.describe(node))
    }

    async fn computed_style(&self, handle: ElementHandle) -> PageResult<ComputedStyle> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.style_of(node))
    }

    async fn bounding_box(&self, handle: ElementHandle) -> PageResult<BoundingBox> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.bounding_box(node))
    }

    async fn parent(&self, handle: ElementHandle) -> PageResult<Option<ElementHandle>> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state
            .doc
            .parent(node)
            .filter(|p| state.doc.is_element(*p))
            .map(|p| state.handle(p)))
    }

    async fn children(&self, handle: ElementHandle) -> PageResult<Vec<ElementHandle>> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state
            .doc
            .element_children(node)
            .into_iter()
            .map(|c| state.handle(c))
            .collect())
    }

    async fn label_text(&self, handle: ElementHandle) -> PageResult<Option<String>> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.label_text(node))
    }

    async fn text_content(&self, handle: ElementHandle) -> PageResult<String> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.doc.text_content(node))
    }

    async fn visible_text(&self) -> PageResult<String> {
        let mut state = self.state.lock();
        state.apply_due();
        Ok(state.visible_text())
    }

    async fn read_value(&self, handle: ElementHandle) -> PageResult<String> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.read_value(node))
    }

    async fn is_checked(&self, handle: ElementHandle) -> PageResult<bool> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.checked(node))
    }

    async fn options(&self, handle: ElementHandle) -> PageResult<Vec<OptionInfo>> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        if state.doc.tag(node) != Some("select") {
            return Err(PageError::Unsupported(format!("{handle} is not a select")));
        }
        let selected = state.selected_index(node);
        Ok(state
            .option_nodes(node)
            .into_iter()
            .enumerate()
            .map(|(index, option)| OptionInfo {
                index,
                value: state.option_value(option),
                text: state.doc.text_content(option),
                selected: selected == Some(index),
                disabled: state.doc.has_attr(option, "disabled"),
            })
            .collect())
    }

    async fn file_count(&self, handle: ElementHandle) -> PageResult<usize> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.controls.get(&node).map(|c| c.files.len()).unwrap_or(0))
    }

    async fn validation_message(&self, handle: ElementHandle) -> PageResult<Option<String>> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(state.controls.get(&node).and_then(|c| c.validation.clone()))
    }

    async fn probe_binding(&self, handle: ElementHandle) -> PageResult<BindingProbe> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        Ok(match state.behavior_of(node) {
            InputBehavior::FrameworkControlled => {
                BindingProbe::FrameworkBound(handler_for(handle))
            }
            InputBehavior::Opaque => BindingProbe::Unavailable,
            InputBehavior::Plain | InputBehavior::KeystrokeDriven => BindingProbe::NativeElement,
        })
    }
}

fn handler_for(handle: ElementHandle) -> HandlerRef {
    HandlerRef(format!("onChange@{handle}"))
}

#[async_trait]
impl PageInput for MemoryPage {
    async fn set_value_native(&self, handle: ElementHandle, value: &str) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        state.write_dom_value(node, value);
        Ok(())
    }

    async fn assign_value(&self, handle: ElementHandle, value: &str) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        let overridden = state
            .controls
            .get(&node)
            .is_some_and(|c| c.accessor_override.is_some());
        if overridden || state.behavior_of(node) == InputBehavior::KeystrokeDriven {
            return Ok(());
        }
        state.write_dom_value(node, value);
        Ok(())
    }

    async fn invoke_framework_handler(
        &self,
        handler: &HandlerRef,
        event: SyntheticEvent,
    ) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(event.target)?;
        if state.behavior_of(node) != InputBehavior::FrameworkControlled
            || *handler != handler_for(event.target)
        {
            return Err(PageError::Unsupported(format!(
                "handler {} is not bound to {}",
                handler.0, event.target
            )));
        }
        let value = state.dom_value(node);
        let control = state.controls.entry(node).or_default();
        control.framework_model = value.clone();
        control.value = Some(value);
        Ok(())
    }

    async fn override_value_accessor(
        &self,
        handle: ElementHandle,
        value: &str,
    ) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        if state.behavior_of(node) == InputBehavior::Opaque {
            return Err(PageError::Unsupported(format!(
                "value accessor of {handle} is not reachable"
            )));
        }
        state.controls.entry(node).or_default().accessor_override = Some(value.to_string());
        Ok(())
    }

    async fn dispatch(&self, handle: ElementHandle, event: DomEvent) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        state.dispatch(node, event);
        Ok(())
    }

    async fn focus(&self, handle: ElementHandle) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        state.focused = Some(node);
        state.dispatch(node, DomEvent::new(EventKind::Focus));
        Ok(())
    }

    async fn blur(&self, handle: ElementHandle) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        if state.focused == Some(node) {
            state.focused = None;
        }
        state.dispatch(node, DomEvent::new(EventKind::Blur));
        Ok(())
    }

    async fn scroll_into_view(&self, handle: ElementHandle) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        state.resolve(handle)?;
        Ok(())
    }

    async fn activate(&self, handle: ElementHandle) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        state.activations += 1;
        let toggled = state.toggle(node);
        let load = state.load;
        state.dispatch(node, DomEvent::new(EventKind::Click));
        // A click reaction may have navigated away.
        if state.load != load {
            return Ok(());
        }
        if toggled {
            state.dispatch(node, DomEvent::new(EventKind::Input));
            state.dispatch(node, DomEvent::new(EventKind::Change));
        }
        state.fire_reactions(node, Trigger::NativeActivation);
        Ok(())
    }

    async fn select_option(&self, handle: ElementHandle, index: usize) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        if state.doc.tag(node) != Some("select") {
            return Err(PageError::Unsupported(format!("{handle} is not a select")));
        }
        if index >= state.option_nodes(node).len() {
            return Err(PageError::Unsupported(format!(
                "option {index} out of range for {handle}"
            )));
        }
        let control = state.controls.entry(node).or_default();
        control.selected = Some(index);
        control.value = None;
        Ok(())
    }

    async fn set_text_content(&self, handle: ElementHandle, text: &str) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        if !state.is_content_editable(node) {
            return Err(PageError::Unsupported(format!("{handle} is not editable")));
        }
        state.doc.clear_children(node);
        let text = state.doc.create_text(text);
        state.doc.append_child(node, text);
        Ok(())
    }

    async fn set_files(&self, handle: ElementHandle, files: Vec<FilePayload>) -> PageResult<()> {
        let mut state = self.state.lock();
        state.apply_due();
        let node = state.resolve(handle)?;
        if state.input_type(node).as_deref() != Some("file") {
            return Err(PageError::Unsupported(format!("{handle} is not a file input")));
        }
        state.controls.entry(node).or_default().files = files;
        Ok(())
    }
}
