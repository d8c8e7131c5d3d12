//! [`PageQuery`]/[`PageInput`] over one DevTools target.
//!
//! Element handles are slots in the page-side table of the page runtime.
//! The table token identifies the document: when a reply carries a token we
//! have not seen, the load id moves on and every older handle goes stale.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use formpilot_core_types::{ElementHandle, FilePayload, PageLoadId};
use page_model::{
    BindingProbe, BoundingBox, ComputedStyle, DomEvent, ElementInfo, HandlerRef, OptionInfo,
    PageError, PageInput, PageQuery, PageResult, SyntheticEvent,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

use crate::config::CdpConfig;
use crate::errors::DriverError;
use crate::script::{ScriptFailure, ScriptReply, ScriptRequest};
use crate::transport::{CdpTransport, CommandTarget};

const CONTEXT_RETRIES: usize = 3;
const READY_POLL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct LoadState {
    id: u64,
    token: Option<String>,
    url: String,
}

/// One browser tab attached in flat session mode.
pub struct CdpPage {
    transport: Arc<dyn CdpTransport>,
    target_id: String,
    session: String,
    navigation_timeout: Duration,
    state: Mutex<LoadState>,
}

impl CdpPage {
    /// Create a blank tab and attach to it.
    pub async fn open(transport: Arc<dyn CdpTransport>, cfg: &CdpConfig) -> Result<Self, DriverError> {
        let created = transport
            .send_command(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank" }),
            )
            .await?;
        let target_id = string_field(&created, "targetId")?;
        let attached = transport
            .send_command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session = string_field(&attached, "sessionId")?;
        debug!(target: "cdp-driver", %target_id, %session, "page attached");

        Ok(Self {
            transport,
            target_id,
            session,
            navigation_timeout: Duration::from_millis(cfg.navigation_timeout_ms),
            state: Mutex::new(LoadState {
                id: 1,
                token: None,
                url: "about:blank".to_string(),
            }),
        })
    }

    /// Navigate and wait for the document to finish loading.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let reply = self
            .session_command("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error) = reply.get("errorText").and_then(Value::as_str) {
            return Err(DriverError::Connection(format!("navigation to {url} failed: {error}")));
        }
        self.wait_until_ready().await
    }

    /// Navigate to `url` and answer the document request with `html`.
    ///
    /// Lets locally stored markup run under the origin it was captured from,
    /// which platform identification depends on.
    #[instrument(skip_all, fields(url = %url, bytes = html.len()))]
    pub async fn load_html(&self, url: &str, html: &str) -> Result<(), DriverError> {
        self.session_command(
            "Fetch.enable",
            json!({ "patterns": [{ "urlPattern": url, "requestStage": "Request" }] }),
        )
        .await?;

        let navigation = self.session_command("Page.navigate", json!({ "url": url }));
        let interception = self.fulfill_document(html);
        let (navigated, fulfilled) = tokio::join!(navigation, interception);

        let disabled = self.session_command("Fetch.disable", json!({})).await;
        fulfilled?;
        navigated?;
        disabled?;
        self.wait_until_ready().await
    }

    pub async fn close(&self) -> Result<(), DriverError> {
        self.transport
            .send_command(
                CommandTarget::Browser,
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
            )
            .await
            .map(|_| ())
    }

    async fn fulfill_document(&self, html: &str) -> Result<(), DriverError> {
        let deadline = Instant::now() + self.navigation_timeout;
        loop {
            let event = tokio::time::timeout_at(deadline, self.transport.next_event())
                .await
                .map_err(|_| DriverError::Timeout("Fetch.requestPaused".into()))?
                .ok_or_else(|| DriverError::Connection("event stream closed".into()))?;
            if event.method != "Fetch.requestPaused"
                || event.session_id.as_deref() != Some(self.session.as_str())
            {
                continue;
            }
            let request_id = string_field(&event.params, "requestId")?;
            self.session_command(
                "Fetch.fulfillRequest",
                json!({
                    "requestId": request_id,
                    "responseCode": 200,
                    "responseHeaders": [{ "name": "Content-Type", "value": "text/html; charset=utf-8" }],
                    "body": STANDARD.encode(html.as_bytes()),
                }),
            )
            .await?;
            return Ok(());
        }
    }

    async fn wait_until_ready(&self) -> Result<(), DriverError> {
        let deadline = Instant::now() + self.navigation_timeout;
        loop {
            match self.evaluate("document.readyState").await {
                Ok(reply) if reply.pointer("/result/value") == Some(&json!("complete")) => {
                    return Ok(())
                }
                Ok(_) => {}
                Err(err) if err.is_context_lost() => {}
                Err(err) => return Err(err),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout("document.readyState".into()));
            }
            sleep(READY_POLL).await;
        }
    }

    async fn session_command(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        self.transport
            .send_command(CommandTarget::Session(self.session.clone()), method, params)
            .await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        self.session_command(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": false,
                "userGesture": true,
            }),
        )
        .await
    }

    fn current(&self) -> (PageLoadId, Option<String>) {
        let state = self.state.lock();
        (PageLoadId(state.id), state.token.clone())
    }

    /// Record the document a reply came from.
    fn observe(&self, reply: &ScriptReply) -> PageLoadId {
        let mut state = self.state.lock();
        if state.token.as_deref() != Some(reply.token.as_str()) {
            if state.token.is_some() {
                state.id += 1;
                debug!(target: "cdp-driver", load = state.id, url = %reply.url, "new document");
            }
            state.token = Some(reply.token.clone());
        }
        state.url = reply.url.clone();
        PageLoadId(state.id)
    }

    /// Run one operation of the page runtime.
    async fn call(
        &self,
        op: &str,
        handle: Option<ElementHandle>,
        args: Value,
    ) -> PageResult<(PageLoadId, Value)> {
        let (load, token) = self.current();
        if let Some(handle) = handle {
            if !handle.belongs_to(load) {
                return Err(PageError::StaleHandle(handle));
            }
        }
        let request = ScriptRequest {
            op,
            token: handle.and(token.as_deref()),
            slot: handle.map(|h| h.slot()),
            args,
        };
        let expression = request.expression()?;

        let mut attempt = 0;
        let reply = loop {
            attempt += 1;
            match self.evaluate(&expression).await.and_then(|raw| ScriptReply::from_evaluate(&raw)) {
                Ok(reply) => break reply,
                Err(err) if err.is_context_lost() && attempt < CONTEXT_RETRIES => {
                    warn!(target: "cdp-driver", op, attempt, "execution context lost, retrying");
                    sleep(READY_POLL).await;
                }
                Err(err) => return Err(err.into()),
            }
        };

        let load = self.observe(&reply);
        match (reply.status.as_str(), reply.error) {
            ("ok", _) => Ok((load, reply.value)),
            (_, Some(failure)) => Err(page_error(failure, handle, &request.args)),
            (status, None) => Err(DriverError::Decode(format!("reply status {status}")).into()),
        }
    }

    async fn run(&self, op: &str, handle: ElementHandle, args: Value) -> PageResult<()> {
        self.call(op, Some(handle), args).await.map(|_| ())
    }

    async fn read<T: DeserializeOwned>(&self, op: &str, handle: ElementHandle) -> PageResult<T> {
        let (_, value) = self.call(op, Some(handle), json!({})).await?;
        decode(value)
    }

    async fn handles(
        &self,
        op: &str,
        scope: Option<ElementHandle>,
        args: Value,
    ) -> PageResult<Vec<ElementHandle>> {
        let (load, value) = self.call(op, scope, args).await?;
        let slots: Vec<u32> = decode(value)?;
        Ok(slots.into_iter().map(|slot| ElementHandle::new(load, slot)).collect())
    }

    /// Session id of the attached target.
    pub fn session_id(&self) -> &str {
        &self.session
    }
}

fn page_error(failure: ScriptFailure, handle: Option<ElementHandle>, args: &Value) -> PageError {
    let subject = |key: &str| args.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    match (failure.kind.as_str(), handle) {
        ("stale", Some(handle)) => PageError::StaleHandle(handle),
        ("unknown", Some(handle)) => PageError::UnknownHandle(handle),
        ("selector", _) => PageError::InvalidSelector {
            selector: subject("selector"),
            reason: failure.message,
        },
        ("path", _) => PageError::InvalidPath {
            expr: subject("expr"),
            reason: failure.message,
        },
        ("unsupported", _) => PageError::Unsupported(failure.message),
        (kind, _) => PageError::Driver(format!("{kind}: {}", failure.message)),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> PageResult<T> {
    serde_json::from_value(value).map_err(|err| DriverError::Decode(err.to_string()).into())
}

fn string_field(value: &Value, key: &str) -> Result<String, DriverError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DriverError::Decode(format!("missing {key}")))
}

#[derive(Deserialize)]
struct BindingReply {
    kind: String,
    #[serde(default)]
    handler: Option<String>,
}

#[async_trait]
impl PageQuery for CdpPage {
    async fn load_id(&self) -> PageLoadId {
        match self.call("ping", None, json!({})).await {
            Ok((load, _)) => load,
            Err(err) => {
                debug!(target: "cdp-driver", error = %err, "ping failed, keeping last load id");
                self.current().0
            }
        }
    }

    async fn url(&self) -> String {
        if let Err(err) = self.call("ping", None, json!({})).await {
            debug!(target: "cdp-driver", error = %err, "ping failed, keeping last url");
        }
        self.state.lock().url.clone()
    }

    async fn query_css(
        &self,
        selector: &str,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        self.handles("query_css", scope, json!({ "selector": selector }))
            .await
    }

    async fn query_path(
        &self,
        expr: &str,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        self.handles("query_path", scope, json!({ "expr": expr })).await
    }

    async fn input_like_elements(
        &self,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        self.handles("input_like", scope, json!({})).await
    }

    async fn button_like_elements(
        &self,
        scope: Option<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        self.handles("button_like", scope, json!({})).await
    }

    async fn describe(&self, handle: ElementHandle) -> PageResult<ElementInfo> {
        self.read("describe", handle).await
    }

    async fn computed_style(&self, handle: ElementHandle) -> PageResult<ComputedStyle> {
        self.read("computed_style", handle).await
    }

    async fn bounding_box(&self, handle: ElementHandle) -> PageResult<BoundingBox> {
        self.read("bounding_box", handle).await
    }

    async fn parent(&self, handle: ElementHandle) -> PageResult<Option<ElementHandle>> {
        let slot: Option<u32> = self.read("parent", handle).await?;
        Ok(slot.map(|slot| ElementHandle::new(handle.load(), slot)))
    }

    async fn children(&self, handle: ElementHandle) -> PageResult<Vec<ElementHandle>> {
        let slots: Vec<u32> = self.read("children", handle).await?;
        Ok(slots
            .into_iter()
            .map(|slot| ElementHandle::new(handle.load(), slot))
            .collect())
    }

    async fn label_text(&self, handle: ElementHandle) -> PageResult<Option<String>> {
        self.read("label_text", handle).await
    }

    async fn text_content(&self, handle: ElementHandle) -> PageResult<String> {
        self.read("text_content", handle).await
    }

    async fn visible_text(&self) -> PageResult<String> {
        let (_, value) = self.call("visible_text", None, json!({})).await?;
        decode(value)
    }

    async fn read_value(&self, handle: ElementHandle) -> PageResult<String> {
        self.read("read_value", handle).await
    }

    async fn is_checked(&self, handle: ElementHandle) -> PageResult<bool> {
        self.read("is_checked", handle).await
    }

    async fn options(&self, handle: ElementHandle) -> PageResult<Vec<OptionInfo>> {
        self.read("options", handle).await
    }

    async fn file_count(&self, handle: ElementHandle) -> PageResult<usize> {
        self.read("file_count", handle).await
    }

    async fn validation_message(&self, handle: ElementHandle) -> PageResult<Option<String>> {
        self.read("validation_message", handle).await
    }

    async fn probe_binding(&self, handle: ElementHandle) -> PageResult<BindingProbe> {
        let reply: BindingReply = self.read("binding", handle).await?;
        Ok(match (reply.kind.as_str(), reply.handler) {
            ("framework", Some(handler)) => BindingProbe::FrameworkBound(HandlerRef(handler)),
            ("native", _) => BindingProbe::NativeElement,
            _ => BindingProbe::Unavailable,
        })
    }
}

#[async_trait]
impl PageInput for CdpPage {
    async fn set_value_native(&self, handle: ElementHandle, value: &str) -> PageResult<()> {
        self.run("set_value_native", handle, json!({ "value": value }))
            .await
    }

    async fn assign_value(&self, handle: ElementHandle, value: &str) -> PageResult<()> {
        self.run("assign_value", handle, json!({ "value": value })).await
    }

    async fn invoke_framework_handler(
        &self,
        handler: &HandlerRef,
        event: SyntheticEvent,
    ) -> PageResult<()> {
        let prop = handler
            .0
            .strip_prefix("react:")
            .ok_or_else(|| PageError::Unsupported(format!("foreign handler {}", handler.0)))?;
        self.run(
            "framework_handler",
            event.target,
            json!({ "prop": prop, "kind": event.kind.name() }),
        )
        .await
    }

    async fn override_value_accessor(
        &self,
        handle: ElementHandle,
        value: &str,
    ) -> PageResult<()> {
        self.run("override_value", handle, json!({ "value": value }))
            .await
    }

    async fn dispatch(&self, handle: ElementHandle, event: DomEvent) -> PageResult<()> {
        self.run(
            "dispatch",
            handle,
            json!({ "kind": event.kind.name(), "key": event.key, "data": event.data }),
        )
        .await
    }

    async fn focus(&self, handle: ElementHandle) -> PageResult<()> {
        self.run("focus", handle, json!({})).await
    }

    async fn blur(&self, handle: ElementHandle) -> PageResult<()> {
        self.run("blur", handle, json!({})).await
    }

    async fn scroll_into_view(&self, handle: ElementHandle) -> PageResult<()> {
        self.run("scroll_into_view", handle, json!({})).await
    }

    async fn activate(&self, handle: ElementHandle) -> PageResult<()> {
        self.run("activate", handle, json!({})).await
    }

    async fn select_option(&self, handle: ElementHandle, index: usize) -> PageResult<()> {
        self.run("select_option", handle, json!({ "index": index }))
            .await
    }

    async fn set_text_content(&self, handle: ElementHandle, text: &str) -> PageResult<()> {
        self.run("set_text_content", handle, json!({ "text": text }))
            .await
    }

    async fn set_files(&self, handle: ElementHandle, files: Vec<FilePayload>) -> PageResult<()> {
        let files: Vec<Value> = files
            .iter()
            .map(|file| {
                json!({
                    "name": file.name,
                    "mime": file.mime,
                    "content": STANDARD.encode(&file.bytes),
                })
            })
            .collect();
        self.run("set_files", handle, json!({ "files": files })).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::TransportEvent;

    /// Answers commands from per-method queues; unscripted methods get `{}`.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<HashMap<String, VecDeque<Result<Value, DriverError>>>>,
        events: Mutex<VecDeque<TransportEvent>>,
        sent: Mutex<Vec<(CommandTarget, String, Value)>>,
    }

    impl ScriptedTransport {
        fn reply(&self, method: &str, reply: Result<Value, DriverError>) {
            self.replies
                .lock()
                .entry(method.to_string())
                .or_default()
                .push_back(reply);
        }

        fn page_reply(&self, token: &str, value: Value) {
            self.reply(
                "Runtime.evaluate",
                Ok(json!({ "result": { "type": "object", "value": {
                    "status": "ok", "token": token, "url": "https://jobs.test/apply", "value": value
                }}})),
            );
        }

        fn page_failure(&self, token: &str, kind: &str, message: &str) {
            self.reply(
                "Runtime.evaluate",
                Ok(json!({ "result": { "value": {
                    "status": "error", "token": token, "url": "https://jobs.test/apply",
                    "error": { "kind": kind, "message": message }
                }}})),
            );
        }

        fn sent(&self, method: &str) -> Vec<Value> {
            self.sent
                .lock()
                .iter()
                .filter(|(_, m, _)| m == method)
                .map(|(_, _, params)| params.clone())
                .collect()
        }
    }

    #[async_trait]
    impl CdpTransport for ScriptedTransport {
        async fn send_command(
            &self,
            target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, DriverError> {
            self.sent.lock().push((target, method.to_string(), params));
            self.replies
                .lock()
                .get_mut(method)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(json!({})))
        }

        async fn next_event(&self) -> Option<TransportEvent> {
            self.events.lock().pop_front()
        }
    }

    async fn page(transport: &Arc<ScriptedTransport>) -> CdpPage {
        transport.reply("Target.createTarget", Ok(json!({ "targetId": "T1" })));
        transport.reply("Target.attachToTarget", Ok(json!({ "sessionId": "S1" })));
        CdpPage::open(transport.clone(), &CdpConfig::default())
            .await
            .unwrap()
    }

    fn expression(params: &Value) -> &str {
        params["expression"].as_str().unwrap()
    }

    #[tokio::test]
    async fn handles_are_slots_of_the_current_document() {
        let transport = Arc::new(ScriptedTransport::default());
        let page = page(&transport).await;
        assert_eq!(page.session_id(), "S1");

        transport.page_reply("tok-a", json!([0, 3]));
        transport.page_reply(
            "tok-a",
            json!({
                "tag": "input", "input_type": "email", "name": "email", "id": "email",
                "placeholder": null, "aria_label": null, "autocomplete": "email",
                "classes": ["field"], "attributes": {"name": "email", "type": "email"},
                "disabled": false, "readonly": false, "aria_disabled": false, "required": true
            }),
        );

        let found = page.query_css("input", None).await.unwrap();
        assert_eq!(found.iter().map(|h| h.slot()).collect::<Vec<_>>(), vec![0, 3]);
        assert!(found[0].belongs_to(found[1].load()));

        let info = page.describe(found[1]).await.unwrap();
        assert_eq!(info.input_type.as_deref(), Some("email"));
        assert!(info.required && info.has_class("field"));

        let calls = transport.sent("Runtime.evaluate");
        assert!(expression(&calls[0]).contains(r#""op":"query_css","token":null,"slot":null"#));
        assert!(expression(&calls[1]).contains(r#""op":"describe","token":"tok-a","slot":3"#));
        assert_eq!(calls[1]["returnByValue"], json!(true));
        assert!(transport
            .sent
            .lock()
            .iter()
            .all(|(target, method, _)| method.starts_with("Target.")
                || *target == CommandTarget::Session("S1".into())));
    }

    #[tokio::test]
    async fn a_new_document_makes_old_handles_stale() {
        let transport = Arc::new(ScriptedTransport::default());
        let page = page(&transport).await;

        transport.page_reply("tok-a", json!([1]));
        let old = page.input_like_elements(None).await.unwrap()[0];
        transport.page_reply("tok-a", Value::Null);
        let first_load = page.load_id().await;
        assert!(old.belongs_to(first_load));

        transport.page_reply("tok-b", Value::Null);
        let second_load = page.load_id().await;
        assert_ne!(first_load, second_load);

        let before = transport.sent("Runtime.evaluate").len();
        assert_eq!(page.read_value(old).await, Err(PageError::StaleHandle(old)));
        assert_eq!(transport.sent("Runtime.evaluate").len(), before);

        // The page reports the swap itself when it happens mid-call.
        transport.page_reply("tok-b", json!([2]));
        let current = page.input_like_elements(None).await.unwrap()[0];
        transport.page_failure("tok-c", "stale", "document replaced");
        assert_eq!(page.focus(current).await, Err(PageError::StaleHandle(current)));
        assert_ne!(page.current().0, second_load);
    }

    #[tokio::test]
    async fn page_failures_keep_their_kind() {
        let transport = Arc::new(ScriptedTransport::default());
        let page = page(&transport).await;

        transport.page_failure("tok-a", "selector", "'input[' is not a valid selector");
        assert!(matches!(
            page.query_css("input[", None).await,
            Err(PageError::InvalidSelector { selector, .. }) if selector == "input["
        ));

        transport.page_failure("tok-a", "path", "not a valid XPath expression");
        assert!(matches!(
            page.query_path("//input[", None).await,
            Err(PageError::InvalidPath { expr, .. }) if expr == "//input["
        ));

        transport.page_reply("tok-a", json!([4]));
        let select = page.query_css("select", None).await.unwrap()[0];
        transport.page_failure("tok-a", "unsupported", "option 9 out of range");
        assert_eq!(
            page.select_option(select, 9).await,
            Err(PageError::Unsupported("option 9 out of range".into()))
        );
        transport.page_failure("tok-a", "unknown", "no element in slot 4");
        assert_eq!(page.blur(select).await, Err(PageError::UnknownHandle(select)));
    }

    #[tokio::test(start_paused = true)]
    async fn lost_execution_context_is_retried() {
        let transport = Arc::new(ScriptedTransport::default());
        let page = page(&transport).await;

        transport.reply(
            "Runtime.evaluate",
            Err(DriverError::Protocol {
                code: -32000,
                message: "Execution context was destroyed.".into(),
            }),
        );
        transport.page_reply("tok-a", json!([0]));
        transport.page_reply("tok-a", json!("Jane"));

        let handle = page.query_css("#first", None).await.unwrap()[0];
        assert_eq!(transport.sent("Runtime.evaluate").len(), 2);
        assert_eq!(handle.slot(), 0);

        let value = page.read_value(handle).await;
        assert_eq!(value, Ok("Jane".to_string()));
    }

    #[tokio::test]
    async fn framework_handlers_and_files_are_forwarded() {
        let transport = Arc::new(ScriptedTransport::default());
        let page = page(&transport).await;

        transport.page_reply("tok-a", json!([0, 1]));
        let found = page.input_like_elements(None).await.unwrap();
        transport.page_reply("tok-a", json!({ "kind": "framework", "handler": "react:onChange" }));
        let binding = page.probe_binding(found[0]).await.unwrap();
        let BindingProbe::FrameworkBound(handler) = binding else {
            panic!("expected a framework binding, got {binding:?}");
        };

        transport.page_reply("tok-a", Value::Null);
        page.invoke_framework_handler(
            &handler,
            SyntheticEvent {
                kind: page_model::EventKind::Change,
                target: found[0],
            },
        )
        .await
        .unwrap();

        transport.page_reply("tok-a", Value::Null);
        page.set_files(
            found[1],
            vec![FilePayload::new("cv.pdf", "application/pdf", b"%PDF".to_vec())],
        )
        .await
        .unwrap();

        let calls = transport.sent("Runtime.evaluate");
        assert!(expression(&calls[2]).contains(r#""op":"framework_handler","token":"tok-a","slot":0"#));
        assert!(expression(&calls[2]).contains(r#""prop":"onChange""#));
        assert!(expression(&calls[3]).contains(&STANDARD.encode(b"%PDF")));
        assert_eq!(
            page.invoke_framework_handler(
                &HandlerRef("vue:update".into()),
                SyntheticEvent {
                    kind: page_model::EventKind::Input,
                    target: found[0],
                },
            )
            .await,
            Err(PageError::Unsupported("foreign handler vue:update".into()))
        );
    }

    #[tokio::test]
    async fn stored_markup_is_served_under_its_origin() {
        let transport = Arc::new(ScriptedTransport::default());
        let page = page(&transport).await;
        transport.events.lock().extend([
            TransportEvent {
                method: "Fetch.requestPaused".into(),
                params: json!({ "requestId": "elsewhere" }),
                session_id: Some("S9".into()),
            },
            TransportEvent {
                method: "Fetch.requestPaused".into(),
                params: json!({ "requestId": "R1" }),
                session_id: Some("S1".into()),
            },
        ]);
        transport.reply(
            "Runtime.evaluate",
            Ok(json!({ "result": { "type": "string", "value": "complete" } })),
        );

        let html = "<form><input name=email></form>";
        page.load_html("https://boards.greenhouse.io/acme/jobs/1", html)
            .await
            .unwrap();

        let enabled = transport.sent("Fetch.enable");
        assert_eq!(
            enabled[0]["patterns"][0]["urlPattern"],
            json!("https://boards.greenhouse.io/acme/jobs/1")
        );
        let fulfilled = transport.sent("Fetch.fulfillRequest");
        assert_eq!(fulfilled.len(), 1);
        assert_eq!(fulfilled[0]["requestId"], json!("R1"));
        assert_eq!(fulfilled[0]["responseCode"], json!(200));
        let body = STANDARD
            .decode(fulfilled[0]["body"].as_str().unwrap())
            .unwrap();
        assert_eq!(body, html.as_bytes());
        assert_eq!(transport.sent("Fetch.disable").len(), 1);
    }
}
