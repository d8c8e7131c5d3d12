//! Core types for field detection

use formpilot_core_types::ElementHandle;
use serde::{Deserialize, Serialize};

/// Detection strategies in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Platform-declared path expressions
    PlatformPath,

    /// Platform-declared CSS selectors
    PlatformCss,

    /// Generic path expressions
    GenericPath,

    /// Generic CSS selectors
    GenericCss,

    /// Keyword scoring over name/id/placeholder/label
    AttributeScore,

    /// Keyword containment in the associated label
    LabelContext,

    /// Small edit distance between attributes and a keyword
    Fuzzy,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::PlatformPath => "platform_path",
            StrategyKind::PlatformCss => "platform_css",
            StrategyKind::GenericPath => "generic_path",
            StrategyKind::GenericCss => "generic_css",
            StrategyKind::AttributeScore => "attribute_score",
            StrategyKind::LabelContext => "label_context",
            StrategyKind::Fuzzy => "fuzzy",
        }
    }

    /// All strategies in cascade order
    pub fn cascade() -> [StrategyKind; 7] {
        [
            StrategyKind::PlatformPath,
            StrategyKind::PlatformCss,
            StrategyKind::GenericPath,
            StrategyKind::GenericCss,
            StrategyKind::AttributeScore,
            StrategyKind::LabelContext,
            StrategyKind::Fuzzy,
        ]
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Element proposed by one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub element: ElementHandle,
    /// 0-100
    pub confidence: u8,
}

/// Winning candidate of a cascade run.
///
/// The element handle is only valid for the page load it was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionResult {
    pub element: ElementHandle,
    pub confidence: u8,
    pub strategy_used: StrategyKind,
}

impl DetectionResult {
    pub fn new(candidate: Candidate, strategy_used: StrategyKind) -> Self {
        Self {
            element: candidate.element,
            confidence: candidate.confidence,
            strategy_used,
        }
    }
}

/// Per-keyword weights of the attribute scoring strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeWeights {
    pub name: u32,
    pub id: u32,
    pub placeholder: u32,
    pub label: u32,
}

impl Default for AttributeWeights {
    fn default() -> Self {
        Self {
            name: 30,
            id: 25,
            placeholder: 15,
            label: 20,
        }
    }
}

/// Locator tuning. Every confidence is on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub platform_path_confidence: u8,
    pub platform_css_confidence: u8,
    pub generic_path_confidence: u8,
    pub generic_css_confidence: u8,
    pub attribute_weights: AttributeWeights,
    /// Minimum summed score for the attribute strategy to accept an element
    pub attribute_threshold: u32,
    /// Ceiling on the attribute strategy's confidence
    pub attribute_cap: u8,
    pub label_confidence: u8,
    pub fuzzy_confidence: u8,
    pub fuzzy_max_distance: usize,
    /// Keywords shorter than this never take part in fuzzy matching
    pub fuzzy_min_keyword_len: usize,
    /// Stop the cascade once the best confidence reaches this value
    pub short_circuit: u8,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            platform_path_confidence: 95,
            platform_css_confidence: 90,
            generic_path_confidence: 85,
            generic_css_confidence: 80,
            attribute_weights: AttributeWeights::default(),
            attribute_threshold: 70,
            attribute_cap: 85,
            label_confidence: 75,
            fuzzy_confidence: 60,
            fuzzy_max_distance: 2,
            fuzzy_min_keyword_len: 4,
            short_circuit: 90,
        }
    }
}

impl LocatorConfig {
    /// Fixed confidence of an expression or label strategy.
    pub fn confidence_of(&self, kind: StrategyKind) -> u8 {
        match kind {
            StrategyKind::PlatformPath => self.platform_path_confidence,
            StrategyKind::PlatformCss => self.platform_css_confidence,
            StrategyKind::GenericPath => self.generic_path_confidence,
            StrategyKind::GenericCss => self.generic_css_confidence,
            StrategyKind::AttributeScore => self.attribute_cap,
            StrategyKind::LabelContext => self.label_confidence,
            StrategyKind::Fuzzy => self.fuzzy_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_confidences_are_non_increasing_through_expressions() {
        let config = LocatorConfig::default();
        let confidences: Vec<u8> = StrategyKind::cascade()[..4]
            .iter()
            .map(|k| config.confidence_of(*k))
            .collect();
        assert_eq!(confidences, vec![95, 90, 85, 80]);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: LocatorConfig = serde_json::from_str(r#"{"short_circuit": 80}"#).unwrap();
        assert_eq!(config.short_circuit, 80);
        assert_eq!(config.attribute_weights.name, 30);
    }
}
