//! Editable regions (`contenteditable`) have no value to set: their text
//! content is replaced and the usual input events are fired by hand.

use formpilot_core_types::ElementHandle;
use page_model::{DomEvent, EventKind, PageDriver};
use tracing::debug;

use crate::errors::InjectError;
use crate::model::{pause, FillOutcome, InjectorConfig, Technique};

pub async fn fill_editable(
    page: &dyn PageDriver,
    element: ElementHandle,
    value: &str,
    config: &InjectorConfig,
) -> Result<FillOutcome, InjectError> {
    page.focus(element).await?;
    page.set_text_content(element, value).await?;
    for kind in [EventKind::Input, EventKind::Change] {
        page.dispatch(element, DomEvent::new(kind)).await?;
    }
    page.blur(element).await?;

    pause(config.verify_settle()).await;
    let actual = page.text_content(element).await?;
    if actual.trim() == value.trim() {
        return Ok(FillOutcome::verified(Technique::TextContent));
    }
    debug!(actual = %actual, "editable region read back differently");
    Ok(FillOutcome::failed(InjectError::VerificationFailed {
        attempted: vec![Technique::TextContent],
    }))
}
