//! Cascade orchestration with per-page caching

use std::collections::HashSet;
use std::sync::Arc;

use formpilot_core_types::{ElementHandle, SemanticFieldType};
use page_model::PageDriver;
use platform_registry::{PatternLibrary, PlatformProfile, GENERIC_PLATFORM};
use tracing::{debug, info, instrument, warn};

use crate::cache::DetectionCache;
use crate::eligibility::{is_eligible, ScanScope};
use crate::errors::LocatorError;
use crate::strategies::{default_strategies, LocateContext, Strategy};
use crate::types::{Candidate, DetectionResult, LocatorConfig, StrategyKind};

/// Runs the detection cascade against a page.
pub struct FieldLocator {
    library: Arc<PatternLibrary>,
    config: LocatorConfig,
    strategies: Vec<Box<dyn Strategy>>,
    cache: DetectionCache,
}

impl FieldLocator {
    pub fn new(library: Arc<PatternLibrary>, config: LocatorConfig) -> Self {
        Self {
            library,
            config,
            strategies: default_strategies(),
            cache: DetectionCache::new(),
        }
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Drop every cached detection; called on step transitions.
    pub fn invalidate(&self) {
        debug!(entries = self.cache.len(), "detection cache invalidated");
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Best detection for `field`, or `None` when no strategy matches.
    pub async fn locate(
        &self,
        page: &dyn PageDriver,
        field: SemanticFieldType,
    ) -> Result<Option<DetectionResult>, LocatorError> {
        self.locate_excluding(page, field, &HashSet::new()).await
    }

    /// Like [`FieldLocator::locate`], never proposing an element in `skip`.
    #[instrument(skip_all, fields(field = %field))]
    pub async fn locate_excluding(
        &self,
        page: &dyn PageDriver,
        field: SemanticFieldType,
        skip: &HashSet<ElementHandle>,
    ) -> Result<Option<DetectionResult>, LocatorError> {
        let load = page.load_id().await;
        let url = page.url().await;
        let platform = self.library.identify(&url);
        let platform_id = platform
            .map(|p| p.identifier.as_str())
            .unwrap_or(GENERIC_PLATFORM);

        if let Some(hit) = self.cache.get(platform_id, field, load) {
            if !skip.contains(&hit.element) && is_eligible(page, hit.element).await? {
                debug!(element = %hit.element, "detection cache hit");
                return Ok(Some(hit));
            }
            self.cache.remove(platform_id, field);
        }

        let scope = ScanScope::discover(page, platform, &self.library.generic().step_markers).await?;
        let ctx = self.context(page, field, platform, &scope, skip);

        let mut best: Option<DetectionResult> = None;
        for strategy in &self.strategies {
            match strategy.locate(&ctx).await {
                Ok(Some(candidate)) => {
                    debug!(
                        strategy = %strategy.kind(),
                        element = %candidate.element,
                        confidence = candidate.confidence,
                        "candidate found"
                    );
                    if best.map_or(true, |b| candidate.confidence > b.confidence) {
                        best = Some(DetectionResult::new(candidate, strategy.kind()));
                    }
                }
                Ok(None) => debug!(strategy = %strategy.kind(), "no candidate"),
                Err(err) if err.is_stale() => return Err(err),
                Err(err) => warn!(strategy = %strategy.kind(), error = %err, "strategy failed"),
            }
            if best.is_some_and(|b| b.confidence >= self.config.short_circuit) {
                break;
            }
        }

        match best {
            Some(result) => {
                info!(
                    platform = platform_id,
                    element = %result.element,
                    strategy = %result.strategy_used,
                    confidence = result.confidence,
                    "field detected"
                );
                self.cache.put(platform_id, field, result);
            }
            None => debug!(platform = platform_id, "field not found"),
        }
        Ok(best)
    }

    /// Run a single strategy, bypassing the cascade and the cache.
    pub async fn evaluate(
        &self,
        page: &dyn PageDriver,
        field: SemanticFieldType,
        kind: StrategyKind,
    ) -> Result<Option<Candidate>, LocatorError> {
        let Some(strategy) = self.strategies.iter().find(|s| s.kind() == kind) else {
            return Ok(None);
        };
        let url = page.url().await;
        let platform = self.library.identify(&url);
        let scope = ScanScope::discover(page, platform, &self.library.generic().step_markers).await?;
        let skip = HashSet::new();
        let ctx = self.context(page, field, platform, &scope, &skip);
        strategy.locate(&ctx).await
    }

    fn context<'a>(
        &'a self,
        page: &'a dyn PageDriver,
        field: SemanticFieldType,
        platform: Option<&'a PlatformProfile>,
        scope: &'a ScanScope,
        skip: &'a HashSet<ElementHandle>,
    ) -> LocateContext<'a> {
        LocateContext {
            page,
            field,
            platform,
            library: &self.library,
            config: &self.config,
            scope,
            skip,
        }
    }
}
