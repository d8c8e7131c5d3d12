//! Step indicator scanning.

use std::collections::{HashMap, HashSet};

use field_locator::{is_marked_active, renders_with_ancestors};
use formpilot_core_types::ElementHandle;
use page_model::{ElementInfo, PageQuery, PageResult};
use platform_registry::StepMarkers;
use regex::Regex;
use tracing::debug;

use crate::errors::TrackerError;
use crate::model::{StepInfo, StepSource};

/// Tags never counted as step markers even when their classes match.
const CONTROL_TAGS: &[&str] = &["input", "select", "textarea", "button", "option", "label", "a"];

/// Reads wizard position from step text and repeated marker elements.
#[derive(Clone, Debug)]
pub struct StepIndicatorScanner {
    text_pattern: Regex,
    markers: StepMarkers,
}

impl StepIndicatorScanner {
    pub fn new(markers: &StepMarkers) -> Result<Self, TrackerError> {
        let text_pattern = Regex::new(&markers.step_text_pattern)
            .map_err(|err| TrackerError::InvalidMarker(err.to_string()))?;
        Ok(Self {
            text_pattern,
            markers: markers.clone(),
        })
    }

    pub fn markers(&self) -> &StepMarkers {
        &self.markers
    }

    /// `(current, total)` from text such as "Step 2 of 5" or "page 1/3".
    pub fn parse_step_text(&self, text: &str) -> Option<(u32, u32)> {
        let caps = self.text_pattern.captures(text)?;
        let current = caps.get(1)?.as_str().parse().ok()?;
        let total = caps.get(2)?.as_str().parse().ok()?;
        (current >= 1 && total >= current).then_some((current, total))
    }

    /// Step text first, then groups of at least two rendered sibling
    /// markers sharing a tag and a marker token.
    pub async fn scan<P: PageQuery + ?Sized>(&self, page: &P) -> PageResult<Option<StepInfo>> {
        if let Some((current, total)) = self.parse_step_text(&page.visible_text().await?) {
            debug!(current, total, "step text found");
            return Ok(Some(StepInfo {
                current: Some(current),
                total: Some(total),
                source: StepSource::Text,
            }));
        }

        let selector = self.marker_selector();
        if selector.is_empty() {
            return Ok(None);
        }
        let mut order: Vec<(ElementHandle, String)> = Vec::new();
        let mut groups: HashMap<(ElementHandle, String), Vec<(ElementHandle, ElementInfo)>> =
            HashMap::new();
        for marker in page.query_css(&selector, None).await? {
            let info = page.describe(marker).await?;
            if CONTROL_TAGS.contains(&info.tag.as_str()) {
                continue;
            }
            let Some(parent) = page.parent(marker).await? else {
                continue;
            };
            let key = (parent, info.tag.clone());
            let group = groups.entry(key.clone()).or_default();
            if group.is_empty() {
                order.push(key);
            }
            group.push((marker, info));
        }

        // Repeated markers share a marker token; a group with an active
        // member beats the first qualifying one.
        let mut best: Option<StepInfo> = None;
        for key in order {
            let members = &groups[&key];
            if members.len() < 2 || !self.share_marker(members.iter().map(|(_, i)| i)) {
                continue;
            }
            if !renders_with_ancestors(page, key.0).await? {
                continue;
            }
            let current = members
                .iter()
                .position(|(_, info)| is_marked_active(info, &self.markers.active_tokens))
                .map(|p| p as u32 + 1);
            let info = StepInfo {
                current,
                total: Some(members.len() as u32),
                source: StepSource::Markers,
            };
            if current.is_some() {
                debug!(total = members.len(), ?current, "step markers found");
                return Ok(Some(info));
            }
            best.get_or_insert(info);
        }
        Ok(best)
    }

    /// Marker tokens every member carries: keyword-bearing class tokens
    /// and `data-step`.
    fn share_marker<'a>(&self, mut members: impl Iterator<Item = &'a ElementInfo>) -> bool {
        let Some(first) = members.next() else {
            return false;
        };
        let mut shared = self.marker_tokens(first);
        for info in members {
            let tokens = self.marker_tokens(info);
            shared.retain(|t| tokens.contains(t));
        }
        !shared.is_empty()
    }

    fn marker_tokens(&self, info: &ElementInfo) -> HashSet<String> {
        let mut tokens: HashSet<String> = info
            .classes
            .iter()
            .map(|c| c.to_ascii_lowercase())
            .filter(|c| self.markers.indicator_keywords.iter().any(|k| c.contains(k.as_str())))
            .collect();
        if info.attr("data-step").is_some() {
            tokens.insert("@data-step".to_string());
        }
        tokens
    }

    fn marker_selector(&self) -> String {
        let mut parts: Vec<String> = self
            .markers
            .indicator_keywords
            .iter()
            .filter(|k| {
                !k.is_empty()
                    && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            })
            .map(|k| format!("[class*=\"{k}\" i]"))
            .collect();
        if !parts.is_empty() {
            parts.push("[data-step]".to_string());
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_model::MemoryPage;
    use pretty_assertions::assert_eq;

    fn scanner() -> StepIndicatorScanner {
        StepIndicatorScanner::new(&StepMarkers::default()).unwrap()
    }

    #[test]
    fn step_text_variants() {
        let scanner = scanner();
        assert_eq!(scanner.parse_step_text("Step 2 of 5: Experience"), Some((2, 5)));
        assert_eq!(scanner.parse_step_text("PAGE 1 / 3"), Some((1, 3)));
        assert_eq!(scanner.parse_step_text("Step 4 of 2"), None);
        assert_eq!(scanner.parse_step_text("5 steps remaining"), None);
    }

    #[test]
    fn broken_pattern_is_reported() {
        let markers = StepMarkers {
            step_text_pattern: "(".into(),
            ..StepMarkers::default()
        };
        assert!(matches!(
            StepIndicatorScanner::new(&markers),
            Err(TrackerError::InvalidMarker(_))
        ));
    }

    #[tokio::test]
    async fn sibling_markers_give_total_and_current() {
        let page = MemoryPage::new(
            "https://apply.example.com",
            r#"<div class="progress-steps">
                 <li class="step">Contact</li>
                 <li class="step active">Resume</li>
                 <li class="step">Review</li>
               </div>
               <div class="page-wrapper"><input name="a"></div>"#,
        )
        .unwrap();
        let info = scanner().scan(&page).await.unwrap().unwrap();
        assert_eq!(info.total, Some(3));
        assert_eq!(info.current, Some(2));
        assert_eq!(info.source, StepSource::Markers);
    }

    #[tokio::test]
    async fn lone_markers_and_buttons_do_not_count() {
        let page = MemoryPage::new(
            "https://apply.example.com",
            r#"<div class="page-wrapper"><input name="a">
                 <button class="prev-step">Back</button><button class="next-step">Next</button>
               </div>"#,
        )
        .unwrap();
        assert_eq!(scanner().scan(&page).await.unwrap(), None);
    }
}
