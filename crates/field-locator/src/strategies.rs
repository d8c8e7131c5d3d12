//! Detection strategies
//!
//! Each strategy inspects the eligible elements of the current scan scope
//! and proposes at most one candidate. The locator runs them in
//! [`StrategyKind::cascade`] order.

use std::collections::HashSet;

use async_trait::async_trait;
use formpilot_core_types::{ElementHandle, SemanticFieldType};
use page_model::{ElementInfo, PageDriver, PageError};
use platform_registry::{FieldPattern, PatternLibrary, PlatformProfile};
use tracing::{debug, warn};

use crate::eligibility::ScanScope;
use crate::errors::LocatorError;
use crate::types::{Candidate, LocatorConfig, StrategyKind};

/// Everything a strategy may consult for one detection.
pub struct LocateContext<'a> {
    pub page: &'a dyn PageDriver,
    pub field: SemanticFieldType,
    pub platform: Option<&'a PlatformProfile>,
    pub library: &'a PatternLibrary,
    pub config: &'a LocatorConfig,
    pub scope: &'a ScanScope,
    /// Elements already claimed by other fields
    pub skip: &'a HashSet<ElementHandle>,
}

impl LocateContext<'_> {
    /// Keywords for the field, lowercase.
    pub fn keywords(&self) -> Vec<String> {
        self.library.keywords(self.platform, self.field)
    }

    /// Ranked handles of `found` that are admissible for this field.
    async fn admissible(
        &self,
        found: impl IntoIterator<Item = ElementHandle> + Send,
    ) -> Result<Vec<(ElementHandle, ElementInfo)>, LocatorError> {
        let mut out = Vec::new();
        for handle in self.scope.order(found) {
            if self.skip.contains(&handle) {
                continue;
            }
            let info = self.page.describe(handle).await?;
            if fits_field(self.field, &info) {
                out.push((handle, info));
            }
        }
        Ok(out)
    }

    /// Every admissible input-like element of the scope, ranked.
    async fn inputs(&self) -> Result<Vec<(ElementHandle, ElementInfo)>, LocatorError> {
        self.admissible(self.scope.ranked().to_vec()).await
    }
}

/// Strategy trait for field resolution
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn locate(&self, ctx: &LocateContext<'_>) -> Result<Option<Candidate>, LocatorError>;

    fn kind(&self) -> StrategyKind;
}

/// File fields only take file inputs; file inputs only take file fields
/// (cover letters may be either).
pub fn fits_field(field: SemanticFieldType, info: &ElementInfo) -> bool {
    if field.is_file() {
        return info.is_file();
    }
    if info.is_file() {
        return field == SemanticFieldType::CoverLetter;
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Path,
    Css,
}

/// Declared expression rules, from the platform or the generic set.
pub struct ExpressionStrategy {
    kind: StrategyKind,
    platform_rules: bool,
    syntax: Syntax,
}

impl ExpressionStrategy {
    pub fn platform_path() -> Self {
        Self {
            kind: StrategyKind::PlatformPath,
            platform_rules: true,
            syntax: Syntax::Path,
        }
    }

    pub fn platform_css() -> Self {
        Self {
            kind: StrategyKind::PlatformCss,
            platform_rules: true,
            syntax: Syntax::Css,
        }
    }

    pub fn generic_path() -> Self {
        Self {
            kind: StrategyKind::GenericPath,
            platform_rules: false,
            syntax: Syntax::Path,
        }
    }

    pub fn generic_css() -> Self {
        Self {
            kind: StrategyKind::GenericCss,
            platform_rules: false,
            syntax: Syntax::Css,
        }
    }

    fn pattern<'a>(&self, ctx: &LocateContext<'a>) -> Option<&'a FieldPattern> {
        if self.platform_rules {
            ctx.platform.and_then(|p| p.pattern(ctx.field))
        } else {
            ctx.library.generic_pattern(ctx.field)
        }
    }
}

#[async_trait]
impl Strategy for ExpressionStrategy {
    async fn locate(&self, ctx: &LocateContext<'_>) -> Result<Option<Candidate>, LocatorError> {
        let Some(pattern) = self.pattern(ctx) else {
            return Ok(None);
        };
        let expressions = match self.syntax {
            Syntax::Path => &pattern.path_expressions,
            Syntax::Css => &pattern.css_expressions,
        };

        let mut found = Vec::new();
        for expr in expressions {
            let result = match self.syntax {
                Syntax::Path => ctx.page.query_path(expr, ctx.scope.root).await,
                Syntax::Css => ctx.page.query_css(expr, ctx.scope.root).await,
            };
            match result {
                Ok(handles) => found.extend(handles),
                Err(err @ PageError::StaleHandle(_)) => return Err(err.into()),
                Err(err) => {
                    warn!(strategy = %self.kind, expr = %expr, error = %err, "skipping rule");
                }
            }
        }

        let best = ctx.admissible(found).await?.into_iter().next();
        Ok(best.map(|(element, _)| Candidate {
            element,
            confidence: ctx.config.confidence_of(self.kind),
        }))
    }

    fn kind(&self) -> StrategyKind {
        self.kind
    }
}

/// Summed per-keyword weights over name, id, placeholder and accessible
/// label.
pub fn attribute_score(
    info: &ElementInfo,
    label: Option<&str>,
    keywords: &[String],
    config: &LocatorConfig,
) -> u32 {
    let lower = |s: Option<&str>| s.map(str::to_lowercase).unwrap_or_default();
    let name = lower(info.name.as_deref());
    let id = lower(info.id.as_deref());
    let placeholder = lower(info.placeholder.as_deref());
    let accessible = lower(info.aria_label.as_deref().or(label));
    let weights = &config.attribute_weights;

    keywords
        .iter()
        .map(|kw| {
            let mut score = 0;
            if name.contains(kw.as_str()) {
                score += weights.name;
            }
            if id.contains(kw.as_str()) {
                score += weights.id;
            }
            if placeholder.contains(kw.as_str()) {
                score += weights.placeholder;
            }
            if accessible.contains(kw.as_str()) {
                score += weights.label;
            }
            score
        })
        .sum()
}

pub struct AttributeScoreStrategy;

#[async_trait]
impl Strategy for AttributeScoreStrategy {
    async fn locate(&self, ctx: &LocateContext<'_>) -> Result<Option<Candidate>, LocatorError> {
        let keywords = ctx.keywords();
        if keywords.is_empty() {
            return Ok(None);
        }
        for (element, info) in ctx.inputs().await? {
            let label = ctx.page.label_text(element).await?;
            let score = attribute_score(&info, label.as_deref(), &keywords, ctx.config);
            if score >= ctx.config.attribute_threshold {
                debug!(element = %element, score, "attribute score accepted");
                let capped = score.min(u32::from(ctx.config.attribute_cap)) as u8;
                return Ok(Some(Candidate {
                    element,
                    confidence: capped,
                }));
            }
        }
        Ok(None)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::AttributeScore
    }
}

pub struct LabelContextStrategy;

#[async_trait]
impl Strategy for LabelContextStrategy {
    async fn locate(&self, ctx: &LocateContext<'_>) -> Result<Option<Candidate>, LocatorError> {
        let keywords = ctx.keywords();
        for (element, _) in ctx.inputs().await? {
            let Some(label) = ctx.page.label_text(element).await? else {
                continue;
            };
            let label = label.to_lowercase();
            if keywords.iter().any(|kw| label.contains(kw.as_str())) {
                return Ok(Some(Candidate {
                    element,
                    confidence: ctx.config.label_confidence,
                }));
            }
        }
        Ok(None)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::LabelContext
    }
}

/// Character-level edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Whether the combined attributes, or one of their tokens, lie within
/// `max_distance` edits of `keyword`.
pub fn fuzzy_matches(combined: &str, keyword: &str, max_distance: usize) -> bool {
    if combined.is_empty() {
        return false;
    }
    if levenshtein(combined, keyword) <= max_distance {
        return true;
    }
    combined
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .any(|token| levenshtein(token, keyword) <= max_distance)
}

pub struct FuzzyStrategy;

#[async_trait]
impl Strategy for FuzzyStrategy {
    async fn locate(&self, ctx: &LocateContext<'_>) -> Result<Option<Candidate>, LocatorError> {
        let keywords: Vec<String> = ctx
            .keywords()
            .into_iter()
            .filter(|kw| kw.chars().count() >= ctx.config.fuzzy_min_keyword_len)
            .collect();
        if keywords.is_empty() {
            return Ok(None);
        }
        for (element, info) in ctx.inputs().await? {
            let combined = info.combined_attributes();
            if keywords
                .iter()
                .any(|kw| fuzzy_matches(&combined, kw, ctx.config.fuzzy_max_distance))
            {
                return Ok(Some(Candidate {
                    element,
                    confidence: ctx.config.fuzzy_confidence,
                }));
            }
        }
        Ok(None)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Fuzzy
    }
}

/// The full cascade in order.
pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(ExpressionStrategy::platform_path()),
        Box::new(ExpressionStrategy::platform_css()),
        Box::new(ExpressionStrategy::generic_path()),
        Box::new(ExpressionStrategy::generic_css()),
        Box::new(AttributeScoreStrategy),
        Box::new(LabelContextStrategy),
        Box::new(FuzzyStrategy),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, id: &str, placeholder: Option<&str>) -> ElementInfo {
        ElementInfo {
            tag: "input".to_string(),
            input_type: Some("text".to_string()),
            name: Some(name.to_string()),
            id: Some(id.to_string()),
            placeholder: placeholder.map(str::to_string),
            ..ElementInfo::default()
        }
    }

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scores_sum_per_keyword() {
        let config = LocatorConfig::default();
        let email = info("candidate_email", "candidate_email", None);
        assert_eq!(
            attribute_score(&email, None, &keywords(&["email", "mail", "e-mail"]), &config),
            110
        );
        let phone = info("contact", "x1", Some("Mobile phone"));
        assert_eq!(
            attribute_score(&phone, Some("Phone"), &keywords(&["phone"]), &config),
            35
        );
    }

    #[test]
    fn aria_label_takes_precedence_over_label_text() {
        let config = LocatorConfig::default();
        let mut element = info("q", "q", None);
        element.aria_label = Some("City".to_string());
        assert_eq!(
            attribute_score(&element, Some("Street"), &keywords(&["street"]), &config),
            0
        );
    }

    #[test]
    fn edit_distance() {
        assert_eq!(levenshtein("emial", "email"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("phone", "phone"), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn fuzzy_checks_tokens() {
        assert!(fuzzy_matches("applicant emial", "email", 2));
        assert!(fuzzy_matches("phon", "phone", 2));
        assert!(!fuzzy_matches("company_name", "email", 2));
        assert!(!fuzzy_matches("", "mail", 2));
    }

    #[test]
    fn file_fields_require_file_inputs() {
        let mut upload = info("resume", "resume", None);
        upload.input_type = Some("file".to_string());
        assert!(fits_field(SemanticFieldType::ResumeFile, &upload));
        assert!(fits_field(SemanticFieldType::CoverLetter, &upload));
        assert!(!fits_field(SemanticFieldType::FirstName, &upload));
        assert!(!fits_field(
            SemanticFieldType::ResumeFile,
            &info("resume", "resume", None)
        ));
    }
}
