//! Submission acknowledgment detection.

use field_locator::renders_with_ancestors;
use page_model::{PageQuery, PageResult};
use platform_registry::{glob_match, PatternLibrary, PlatformProfile};
use tracing::{debug, warn};

use crate::model::CompletionSignal;

/// Platform success paths, then confirmation URL patterns, then success
/// phrases in the visible text.
pub async fn detect_completion<P: PageQuery + ?Sized>(
    page: &P,
    library: &PatternLibrary,
    platform: Option<&PlatformProfile>,
) -> PageResult<Option<CompletionSignal>> {
    for expr in platform.map(|p| p.success_patterns.as_slice()).unwrap_or(&[]) {
        match page.query_path(expr, None).await {
            Ok(found) => {
                for handle in found {
                    if renders_with_ancestors(page, handle).await? {
                        debug!(expr = %expr, "success path matched");
                        return Ok(Some(CompletionSignal::SuccessPath(expr.clone())));
                    }
                }
            }
            Err(err) if err.is_stale() => return Err(err),
            Err(err) => warn!(expr = %expr, error = %err, "success path rejected"),
        }
    }

    let url = page.url().await;
    if let Some(pattern) = library
        .generic()
        .confirmation_url_patterns
        .iter()
        .find(|p| glob_match(p, &url))
    {
        debug!(pattern = %pattern, "confirmation url matched");
        return Ok(Some(CompletionSignal::ConfirmationUrl(pattern.clone())));
    }

    let text = page.visible_text().await?.to_lowercase();
    if let Some(phrase) = library
        .success_phrases()
        .into_iter()
        .find(|p| text.contains(p.as_str()))
    {
        debug!(phrase = %phrase, "success phrase matched");
        return Ok(Some(CompletionSignal::SuccessPhrase(phrase)));
    }
    Ok(None)
}
