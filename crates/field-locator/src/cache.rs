use formpilot_core_types::{PageLoadId, SemanticFieldType};

use dashmap::DashMap;

use crate::types::DetectionResult;

type CacheKey = (String, SemanticFieldType);

/// Detection results per (platform, field) for the current page load.
#[derive(Default)]
pub struct DetectionCache {
    entries: DashMap<CacheKey, DetectionResult>,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, platform: &str, field: SemanticFieldType, result: DetectionResult) {
        self.entries.insert((platform.to_string(), field), result);
    }

    /// Entries minted for another page load are dropped on read.
    pub fn get(
        &self,
        platform: &str,
        field: SemanticFieldType,
        load: PageLoadId,
    ) -> Option<DetectionResult> {
        let key = (platform.to_string(), field);
        if let Some(entry) = self.entries.get(&key) {
            if entry.element.belongs_to(load) {
                return Some(*entry);
            }
        }
        self.entries.remove(&key);
        None
    }

    pub fn remove(&self, platform: &str, field: SemanticFieldType) {
        self.entries.remove(&(platform.to_string(), field));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyKind;
    use formpilot_core_types::ElementHandle;

    #[test]
    fn entries_from_an_older_load_are_evicted() {
        let cache = DetectionCache::new();
        let result = DetectionResult {
            element: ElementHandle::new(PageLoadId(1), 4),
            confidence: 85,
            strategy_used: StrategyKind::GenericPath,
        };
        cache.put("generic", SemanticFieldType::Email, result);
        assert_eq!(
            cache.get("generic", SemanticFieldType::Email, PageLoadId(1)),
            Some(result)
        );
        assert_eq!(cache.get("generic", SemanticFieldType::Email, PageLoadId(2)), None);
        assert!(cache.is_empty());
    }
}
