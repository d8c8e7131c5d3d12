//! Advance/submit control discovery and safe activation.

use std::time::Duration;

use field_locator::is_eligible;
use formpilot_core_types::ElementHandle;
use page_model::{DomEvent, EventKind, PageDriver, PageQuery, PageResult};
use platform_registry::{ControlPatterns, NavigationControls};
use tracing::{debug, warn};

use crate::model::ControlKind;

const POINTER_SEQUENCE: [EventKind; 5] = [
    EventKind::PointerDown,
    EventKind::MouseDown,
    EventKind::PointerUp,
    EventKind::MouseUp,
    EventKind::Click,
];

/// Eligible next and submit controls of the current page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlSet {
    pub next: Option<ElementHandle>,
    pub submit: Option<ElementHandle>,
}

impl ControlSet {
    /// Control to activate when advancing: next beats submit.
    pub fn advance(&self) -> Option<(ControlKind, ElementHandle)> {
        self.next
            .map(|h| (ControlKind::Next, h))
            .or_else(|| self.submit.map(|h| (ControlKind::Submit, h)))
    }

    /// A next control without a submit control suggests more steps.
    pub fn suggests_wizard(&self) -> bool {
        self.next.is_some() && self.submit.is_none()
    }
}

/// Next first; a control matching both patterns counts as next.
pub async fn locate_controls<P: PageQuery + ?Sized>(
    page: &P,
    controls: &NavigationControls,
) -> PageResult<ControlSet> {
    let next = find_control(page, &controls.next, None).await?;
    let submit = find_control(page, &controls.submit, next).await?;
    Ok(ControlSet { next, submit })
}

/// First eligible element matching path expressions, then CSS, then
/// visible-text keywords over button-like elements.
pub async fn find_control<P: PageQuery + ?Sized>(
    page: &P,
    patterns: &ControlPatterns,
    exclude: Option<ElementHandle>,
) -> PageResult<Option<ElementHandle>> {
    for expr in &patterns.paths {
        match page.query_path(expr, None).await {
            Ok(found) => {
                if let Some(hit) = first_eligible(page, found, exclude).await? {
                    return Ok(Some(hit));
                }
            }
            Err(err) if err.is_stale() => return Err(err),
            Err(err) => warn!(expr = %expr, error = %err, "control path rejected"),
        }
    }
    for selector in &patterns.css {
        match page.query_css(selector, None).await {
            Ok(found) => {
                if let Some(hit) = first_eligible(page, found, exclude).await? {
                    return Ok(Some(hit));
                }
            }
            Err(err) if err.is_stale() => return Err(err),
            Err(err) => warn!(selector = %selector, error = %err, "control selector rejected"),
        }
    }
    if patterns.keywords.is_empty() {
        return Ok(None);
    }
    for button in page.button_like_elements(None).await? {
        if Some(button) == exclude {
            continue;
        }
        let caption = caption(page, button).await?;
        if patterns.keywords.iter().any(|k| caption.contains(&k.to_lowercase()))
            && is_eligible(page, button).await?
        {
            return Ok(Some(button));
        }
    }
    Ok(None)
}

async fn first_eligible<P: PageQuery + ?Sized>(
    page: &P,
    found: Vec<ElementHandle>,
    exclude: Option<ElementHandle>,
) -> PageResult<Option<ElementHandle>> {
    for handle in found {
        if Some(handle) != exclude && is_eligible(page, handle).await? {
            return Ok(Some(handle));
        }
    }
    Ok(None)
}

/// Text content, `value` and `aria-label`, lowercase.
async fn caption<P: PageQuery + ?Sized>(page: &P, handle: ElementHandle) -> PageResult<String> {
    let info = page.describe(handle).await?;
    let mut parts = vec![page.text_content(handle).await?];
    parts.extend(info.attr("value").map(str::to_string));
    parts.extend(info.aria_label.clone());
    Ok(parts.join(" ").to_lowercase())
}

/// Scroll the control into view and run the full pointer sequence.
pub async fn press(page: &dyn PageDriver, control: ElementHandle) -> PageResult<()> {
    page.scroll_into_view(control).await?;
    for kind in POINTER_SEQUENCE {
        page.dispatch(control, DomEvent::new(kind)).await?;
    }
    debug!(control = %control, "pointer sequence dispatched");
    Ok(())
}

/// Poll `probe` every `interval` until it yields a value or `limit`
/// elapses. The probe runs once more at the deadline.
pub async fn poll_until<T, F, Fut>(limit: Duration, interval: Duration, mut probe: F) -> PageResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = PageResult<Option<T>>>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if let Some(found) = probe().await? {
            return Ok(Some(found));
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_model::MemoryPage;

    fn patterns(css: &[&str], keywords: &[&str]) -> ControlPatterns {
        ControlPatterns {
            paths: Vec::new(),
            css: css.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn hidden_and_disabled_controls_are_ignored() {
        let page = MemoryPage::new(
            "https://apply.example.com",
            r#"<button id="hidden" class="next" style="display:none">Next</button>
               <button id="off" class="next" disabled>Next</button>
               <button id="go" type="button">Continue</button>
               <input id="send" type="submit" value="Submit application">"#,
        )
        .unwrap();
        let controls = NavigationControls {
            next: patterns(&["button.next"], &["continue"]),
            submit: patterns(&[], &["submit"]),
        };
        let set = locate_controls(&page, &controls).await.unwrap();
        assert_eq!(set.next, page.find("#go").unwrap());
        assert_eq!(set.submit, page.find("#send").unwrap());
        assert!(!set.suggests_wizard());
        assert_eq!(set.advance().map(|(k, _)| k), Some(ControlKind::Next));
    }

    #[tokio::test]
    async fn shared_control_counts_as_next() {
        let page = MemoryPage::new(
            "https://apply.example.com",
            r#"<form><input name="q"><button type="submit">Next</button></form>"#,
        )
        .unwrap();
        let controls = NavigationControls {
            next: patterns(&[], &["next"]),
            submit: patterns(&["button[type=\"submit\"]"], &[]),
        };
        let set = locate_controls(&page, &controls).await.unwrap();
        assert!(set.next.is_some());
        assert_eq!(set.submit, None);
        assert!(set.suggests_wizard());
    }

    #[tokio::test(start_paused = true)]
    async fn polling_stops_at_the_deadline() {
        let started = tokio::time::Instant::now();
        let mut calls = 0;
        let found: Option<()> = poll_until(Duration::from_millis(300), Duration::from_millis(100), || {
            calls += 1;
            async { Ok(None) }
        })
        .await
        .unwrap();
        assert_eq!(found, None);
        assert_eq!(calls, 4);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }
}
