//! Pattern library for applicant-tracking platforms.
//!
//! The library is loaded once, is immutable afterwards and is shared as an
//! `Arc` by every concurrent fill session.

pub mod builtin;
pub mod errors;
pub mod identify;
pub mod loader;
pub mod model;

use std::path::Path;
use std::sync::Arc;

use formpilot_core_types::SemanticFieldType;
use tracing::debug;

pub use builtin::{default_keywords, fallback_generic, BUNDLED_CATALOG};
pub use errors::RegistryError;
pub use identify::glob_match;
pub use loader::{
    load_catalog_from_path, load_catalog_from_reader, parse_catalog_str, resolve_catalog,
    resolve_from_str, CatalogOrigin,
};
pub use model::{
    CatalogDocument, ControlPatterns, FieldPattern, FieldPatternMap, GenericProfile,
    NavigationControls, PlatformProfile, StepMarkers,
};

/// Identifier reported when no platform matches a URL.
pub const GENERIC_PLATFORM: &str = "generic";

#[derive(Debug)]
pub struct PatternLibrary {
    platforms: Vec<PlatformProfile>,
    generic: GenericProfile,
    origin: CatalogOrigin,
}

impl PatternLibrary {
    /// Library backed by the catalog compiled into the binary.
    pub fn bundled() -> Result<Arc<Self>, RegistryError> {
        Self::load(None)
    }

    /// Load from `override_path` when given, degrading to the bundled
    /// catalog and then to keyword-only generic rules.
    pub fn load(override_path: Option<&Path>) -> Result<Arc<Self>, RegistryError> {
        let (document, origin) = resolve_catalog(override_path)?;
        Ok(Arc::new(Self::from_document(document, origin)))
    }

    pub fn from_document(document: CatalogDocument, origin: CatalogOrigin) -> Self {
        Self {
            platforms: document.platforms,
            generic: document.generic,
            origin,
        }
    }

    pub fn origin(&self) -> &CatalogOrigin {
        &self.origin
    }

    /// True when platform-specific rules could not be loaded.
    pub fn is_degraded(&self) -> bool {
        self.origin == CatalogOrigin::Fallback
    }

    pub fn platforms(&self) -> &[PlatformProfile] {
        &self.platforms
    }

    pub fn platform(&self, identifier: &str) -> Option<&PlatformProfile> {
        self.platforms
            .iter()
            .find(|p| p.identifier.eq_ignore_ascii_case(identifier))
    }

    pub fn generic(&self) -> &GenericProfile {
        &self.generic
    }

    /// First platform, in declaration order, with a URL pattern matching `url`.
    pub fn identify(&self, url: &str) -> Option<&PlatformProfile> {
        let found = self.platforms.iter().find(|platform| {
            platform
                .url_patterns
                .iter()
                .any(|pattern| glob_match(pattern, url))
        });
        debug!(url, platform = found.map(|p| p.identifier.as_str()).unwrap_or(GENERIC_PLATFORM), "platform identified");
        found
    }

    /// Identifier of the matching platform, or `"generic"`.
    pub fn identify_name(&self, url: &str) -> String {
        self.identify(url)
            .map(|p| p.identifier.clone())
            .unwrap_or_else(|| GENERIC_PLATFORM.to_string())
    }

    pub fn generic_pattern(&self, field: SemanticFieldType) -> Option<&FieldPattern> {
        self.generic.pattern(field)
    }

    /// Keywords for `field`: platform list, then generic list, then the
    /// compiled-in defaults. Lowercased, deduplicated, order kept.
    pub fn keywords(&self, platform: Option<&PlatformProfile>, field: SemanticFieldType) -> Vec<String> {
        let platform_kw = platform
            .and_then(|p| p.pattern(field))
            .map(|p| p.keyword_list.as_slice())
            .unwrap_or(&[]);
        let generic_kw = self
            .generic_pattern(field)
            .map(|p| p.keyword_list.as_slice())
            .unwrap_or(&[]);

        let mut out: Vec<String> = Vec::new();
        let candidates = platform_kw
            .iter()
            .map(String::as_str)
            .chain(generic_kw.iter().map(String::as_str))
            .chain(default_keywords(field).iter().copied());
        for keyword in candidates {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !out.contains(&keyword) {
                out.push(keyword);
            }
        }
        out
    }

    /// Lowercased confirmation phrases searched in visible page text.
    pub fn success_phrases(&self) -> Vec<String> {
        let mut phrases: Vec<String> = Vec::new();
        for phrase in &self.generic.success_phrases {
            let phrase = phrase.trim().to_lowercase();
            if !phrase.is_empty() && !phrases.contains(&phrase) {
                phrases.push(phrase);
            }
        }
        phrases
    }

    /// Next/submit controls, platform first then generic.
    pub fn navigation_controls(&self, platform: Option<&PlatformProfile>) -> NavigationControls {
        let mut merged = NavigationControls::default();
        for source in platform
            .map(|p| &p.navigation_controls)
            .into_iter()
            .chain(std::iter::once(&self.generic.navigation_controls))
        {
            extend(&mut merged.next, &source.next);
            extend(&mut merged.submit, &source.submit);
        }
        merged
    }
}

fn extend(into: &mut ControlPatterns, from: &ControlPatterns) {
    for (dst, src) in [
        (&mut into.paths, &from.paths),
        (&mut into.css, &from.css),
        (&mut into.keywords, &from.keywords),
    ] {
        for item in src {
            if !dst.contains(item) {
                dst.push(item.clone());
            }
        }
    }
}
