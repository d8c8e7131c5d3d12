//! Catalog document types.

use std::collections::BTreeMap;

use formpilot_core_types::SemanticFieldType;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Matching rules for one semantic field type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPattern {
    #[serde(default)]
    pub path_expressions: Vec<String>,
    #[serde(default)]
    pub css_expressions: Vec<String>,
    #[serde(default)]
    pub keyword_list: Vec<String>,
}

impl FieldPattern {
    pub fn is_empty(&self) -> bool {
        self.path_expressions.is_empty()
            && self.css_expressions.is_empty()
            && self.keyword_list.is_empty()
    }
}

/// Expressions that locate one kind of navigation control.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPatterns {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub css: Vec<String>,
    /// Visible-text keywords, lowercase.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ControlPatterns {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.css.is_empty() && self.keywords.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationControls {
    #[serde(default)]
    pub next: ControlPatterns,
    #[serde(default)]
    pub submit: ControlPatterns,
}

pub type FieldPatternMap = BTreeMap<SemanticFieldType, FieldPattern>;

/// Rules for one applicant-tracking platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformProfile {
    pub identifier: String,
    #[serde(default)]
    pub url_patterns: Vec<String>,
    #[serde(default, deserialize_with = "field_patterns")]
    pub field_patterns: FieldPatternMap,
    #[serde(default)]
    pub container_path: Option<String>,
    #[serde(default)]
    pub success_patterns: Vec<String>,
    #[serde(default)]
    pub navigation_controls: NavigationControls,
}

impl PlatformProfile {
    pub fn pattern(&self, field: SemanticFieldType) -> Option<&FieldPattern> {
        self.field_patterns.get(&field)
    }
}

/// Step-indicator heuristics for wizard detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMarkers {
    /// Class/attribute fragments that mark step or progress elements.
    pub indicator_keywords: Vec<String>,
    /// Class tokens that mark the active step.
    pub active_tokens: Vec<String>,
    /// Regex with two capture groups: current step and total.
    pub step_text_pattern: String,
}

impl Default for StepMarkers {
    fn default() -> Self {
        Self {
            indicator_keywords: ["step", "page", "progress", "stage"]
                .map(String::from)
                .to_vec(),
            active_tokens: ["active", "current"].map(String::from).to_vec(),
            step_text_pattern: r"(?i)(?:page|step)\s+(\d+)\s+(?:of|/)\s+(\d+)".to_string(),
        }
    }
}

/// Platform-independent rules used when no platform matches, and as the
/// second tier of the cascade when one does.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericProfile {
    #[serde(default, deserialize_with = "field_patterns")]
    pub field_patterns: FieldPatternMap,
    #[serde(default)]
    pub success_phrases: Vec<String>,
    #[serde(default)]
    pub confirmation_url_patterns: Vec<String>,
    #[serde(default)]
    pub navigation_controls: NavigationControls,
    #[serde(default)]
    pub step_markers: StepMarkers,
}

impl GenericProfile {
    pub fn pattern(&self, field: SemanticFieldType) -> Option<&FieldPattern> {
        self.field_patterns.get(&field)
    }
}

/// Top-level catalog document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub platforms: Vec<PlatformProfile>,
    #[serde(default)]
    pub generic: GenericProfile,
}

fn default_version() -> u32 {
    1
}

/// Field-type keys accept every spelling `SemanticFieldType::from_str`
/// does; unknown keys are skipped with a warning.
fn field_patterns<'de, D>(deserializer: D) -> Result<FieldPatternMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, FieldPattern> = BTreeMap::deserialize(deserializer)?;
    let mut out = FieldPatternMap::new();
    for (key, pattern) in raw {
        match key.parse::<SemanticFieldType>() {
            Ok(field) => {
                out.insert(field, pattern);
            }
            Err(err) => warn!(key = %key, error = %err, "skipping unknown field pattern"),
        }
    }
    Ok(out)
}
