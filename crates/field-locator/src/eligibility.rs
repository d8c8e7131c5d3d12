//! Visibility and eligibility filtering, active-section handling and scan
//! scoping.

use std::collections::{HashMap, HashSet};

use formpilot_core_types::ElementHandle;
use page_model::{ElementInfo, PageQuery, PageResult};
use platform_registry::{PlatformProfile, StepMarkers};
use tracing::{debug, warn};

/// Attribute keys that mark wizard sections independently of classes.
const SECTION_ATTRS: &[&str] = &["data-step", "data-page", "data-section", "data-stage"];

/// An element can receive input: enabled, writable, rendered along its
/// whole ancestor chain and occupying a non-empty box.
pub async fn is_eligible<P: PageQuery + ?Sized>(page: &P, handle: ElementHandle) -> PageResult<bool> {
    let info = page.describe(handle).await?;
    if info.disabled || info.readonly || info.aria_disabled {
        return Ok(false);
    }
    if !renders_with_ancestors(page, handle).await? {
        return Ok(false);
    }
    Ok(page.bounding_box(handle).await?.area() > 0.0)
}

/// The element and every ancestor up to the root render.
pub async fn renders_with_ancestors<P: PageQuery + ?Sized>(
    page: &P,
    handle: ElementHandle,
) -> PageResult<bool> {
    let mut current = Some(handle);
    while let Some(node) = current {
        if !page.computed_style(node).await?.renders() {
            return Ok(false);
        }
        current = page.parent(node).await?;
    }
    Ok(true)
}

async fn ancestors<P: PageQuery + ?Sized>(
    page: &P,
    handle: ElementHandle,
) -> PageResult<Vec<ElementHandle>> {
    let mut out = Vec::new();
    let mut current = page.parent(handle).await?;
    while let Some(node) = current {
        out.push(node);
        current = page.parent(node).await?;
    }
    Ok(out)
}

/// Whether `info` carries an active-section marker.
pub fn is_marked_active(info: &ElementInfo, active_tokens: &[String]) -> bool {
    let by_class = info
        .classes
        .iter()
        .any(|class| active_tokens.iter().any(|t| class.eq_ignore_ascii_case(t)));
    let by_aria = info
        .attr("aria-current")
        .is_some_and(|v| !v.eq_ignore_ascii_case("false"));
    let by_data = info
        .attr("data-active")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    by_class || by_aria || by_data
}

/// Active wizard section and the inactive sibling sections next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    pub active: Option<ElementHandle>,
    pub inactive: Vec<ElementHandle>,
}

impl SectionMap {
    /// First marked-active element under `root` that holds input-like
    /// elements becomes the active section; its same-kind siblings are the
    /// inactive ones.
    pub async fn discover<P: PageQuery + ?Sized>(
        page: &P,
        root: Option<ElementHandle>,
        markers: &StepMarkers,
    ) -> PageResult<Self> {
        let mut selector: Vec<String> = markers
            .active_tokens
            .iter()
            .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .map(|t| format!("[class~=\"{t}\" i]"))
            .collect();
        selector.push("[aria-current]:not([aria-current=\"false\" i])".to_string());
        selector.push("[data-active=\"true\" i]".to_string());

        for candidate in page.query_css(&selector.join(", "), root).await? {
            if page.input_like_elements(Some(candidate)).await?.is_empty() {
                continue;
            }
            let info = page.describe(candidate).await?;
            let signature = section_signature(&info, &markers.active_tokens);
            let mut inactive = Vec::new();
            if let Some(parent) = page.parent(candidate).await? {
                for sibling in page.children(parent).await? {
                    if sibling == candidate {
                        continue;
                    }
                    let sibling_info = page.describe(sibling).await?;
                    if sibling_info.tag != info.tag
                        || is_marked_active(&sibling_info, &markers.active_tokens)
                    {
                        continue;
                    }
                    let sibling_signature = section_signature(&sibling_info, &markers.active_tokens);
                    if !signature.is_disjoint(&sibling_signature) {
                        inactive.push(sibling);
                    }
                }
            }
            debug!(active = %candidate, inactive = inactive.len(), "active section found");
            return Ok(Self {
                active: Some(candidate),
                inactive,
            });
        }
        Ok(Self::default())
    }
}

/// Class tokens (minus active markers) and section attribute keys.
fn section_signature(info: &ElementInfo, active_tokens: &[String]) -> HashSet<String> {
    let mut signature: HashSet<String> = info
        .classes
        .iter()
        .filter(|c| !active_tokens.iter().any(|t| c.eq_ignore_ascii_case(t)))
        .map(|c| c.to_ascii_lowercase())
        .collect();
    for attr in SECTION_ATTRS {
        if info.attr(attr).is_some() {
            signature.insert(format!("@{attr}"));
        }
    }
    signature
}

/// Root bounding a field scan: the platform's container when it resolves,
/// else the first `form` holding input-like elements, else the document.
pub async fn find_container<P: PageQuery + ?Sized>(
    page: &P,
    platform: Option<&PlatformProfile>,
) -> PageResult<Option<ElementHandle>> {
    if let Some(path) = platform.and_then(|p| p.container_path.as_deref()) {
        match page.query_path(path, None).await {
            Ok(found) => {
                if let Some(first) = found.first() {
                    return Ok(Some(*first));
                }
            }
            Err(err) if err.is_stale() => return Err(err),
            Err(err) => warn!(error = %err, "container expression rejected"),
        }
    }
    for form in page.query_css("form", None).await? {
        if !page.input_like_elements(Some(form)).await?.is_empty() {
            return Ok(Some(form));
        }
    }
    Ok(None)
}

/// Eligible input-like elements of one scan, ranked: active-section
/// members first, then document order. Members of inactive sibling
/// sections are dropped.
#[derive(Debug, Clone, Default)]
pub struct ScanScope {
    pub root: Option<ElementHandle>,
    pub sections: SectionMap,
    ranked: Vec<ElementHandle>,
    rank: HashMap<ElementHandle, usize>,
    preferred: usize,
}

impl ScanScope {
    pub async fn discover<P: PageQuery + ?Sized>(
        page: &P,
        platform: Option<&PlatformProfile>,
        markers: &StepMarkers,
    ) -> PageResult<Self> {
        let root = find_container(page, platform).await?;
        let sections = SectionMap::discover(page, root, markers).await?;

        let mut preferred = Vec::new();
        let mut rest = Vec::new();
        for handle in page.input_like_elements(root).await? {
            if !is_eligible(page, handle).await? {
                continue;
            }
            let chain = ancestors(page, handle).await?;
            if chain.iter().any(|a| sections.inactive.contains(a)) {
                continue;
            }
            match sections.active {
                Some(active) if chain.contains(&active) => preferred.push(handle),
                _ => rest.push(handle),
            }
        }
        let active_count = preferred.len();
        preferred.extend(rest);
        let rank = preferred.iter().enumerate().map(|(i, h)| (*h, i)).collect();
        Ok(Self {
            root,
            sections,
            ranked: preferred,
            rank,
            preferred: active_count,
        })
    }

    /// Eligible elements in preference order.
    pub fn ranked(&self) -> &[ElementHandle] {
        &self.ranked
    }

    /// Members of the active section, or every eligible element when no
    /// section is marked active.
    pub fn active_members(&self) -> &[ElementHandle] {
        if self.sections.active.is_some() {
            &self.ranked[..self.preferred]
        } else {
            &self.ranked
        }
    }

    pub fn contains(&self, handle: ElementHandle) -> bool {
        self.rank.contains_key(&handle)
    }

    /// Keep the admissible handles of `found`, best-ranked first.
    pub fn order(&self, found: impl IntoIterator<Item = ElementHandle>) -> Vec<ElementHandle> {
        let mut kept: Vec<(usize, ElementHandle)> = found
            .into_iter()
            .filter_map(|h| self.rank.get(&h).map(|r| (*r, h)))
            .collect();
        kept.sort_by_key(|(r, _)| *r);
        kept.dedup_by_key(|(r, _)| *r);
        kept.into_iter().map(|(_, h)| h).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_model::MemoryPage;

    const WIZARD: &str = r#"
<form>
  <div class="step" data-step="1"><input id="a" name="a"></div>
  <div class="step current" data-step="2"><input id="b" name="b"></div>
  <div class="step" data-step="3" ><input id="c" name="c"></div>
  <div class="footer"><input id="d" name="d"></div>
  <input id="e" name="e" disabled>
  <div style="visibility:hidden"><input id="f" name="f"></div>
</form>"#;

    async fn handle(page: &MemoryPage, selector: &str) -> ElementHandle {
        page.find(selector).unwrap().unwrap()
    }

    #[tokio::test]
    async fn active_section_is_preferred_and_siblings_dropped() {
        let page = MemoryPage::new("https://example.com/apply", WIZARD).unwrap();
        let scope = ScanScope::discover(&page, None, &StepMarkers::default())
            .await
            .unwrap();
        let b = handle(&page, "#b").await;
        let d = handle(&page, "#d").await;
        assert_eq!(scope.ranked(), &[b, d]);
        assert_eq!(scope.active_members(), &[b]);
        assert!(!scope.contains(handle(&page, "#a").await));
        assert!(!scope.contains(handle(&page, "#e").await));
        assert!(!scope.contains(handle(&page, "#f").await));
    }

    #[tokio::test]
    async fn flat_forms_keep_document_order() {
        let page = MemoryPage::new(
            "https://example.com",
            r#"<div><input id="x"></div><form><input id="y"><input id="z"></form>"#,
        )
        .unwrap();
        let scope = ScanScope::discover(&page, None, &StepMarkers::default())
            .await
            .unwrap();
        let y = handle(&page, "#y").await;
        let z = handle(&page, "#z").await;
        assert_eq!(scope.ranked(), &[y, z]);
        assert_eq!(scope.active_members(), &[y, z]);
        assert_eq!(scope.order([z, y, z]), vec![y, z]);
    }

    #[tokio::test]
    async fn zero_sized_and_readonly_inputs_are_ineligible() {
        let page = MemoryPage::new(
            "https://example.com",
            r#"<input id="w" style="width:0"><input id="r" readonly><input id="o" style="opacity:0"><input id="ok">"#,
        )
        .unwrap();
        assert!(!is_eligible(&page, handle(&page, "#w").await).await.unwrap());
        assert!(!is_eligible(&page, handle(&page, "#r").await).await.unwrap());
        assert!(!is_eligible(&page, handle(&page, "#o").await).await.unwrap());
        assert!(is_eligible(&page, handle(&page, "#ok").await).await.unwrap());
    }
}
