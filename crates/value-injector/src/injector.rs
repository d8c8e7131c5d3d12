use formpilot_core_types::{ElementHandle, FilePayload, FillValue, SemanticFieldType};
use page_model::{DomEvent, EventKind, PageDriver};
use tracing::{debug, info, instrument};

use crate::editable::fill_editable;
use crate::errors::InjectError;
use crate::model::{pause, FillOutcome, InjectorConfig, Technique};
use crate::select::fill_select;
use crate::text::fill_text;
use crate::toggle::{fill_checkbox, fill_radio};

/// Writes values into detected controls and verifies them.
#[derive(Clone, Debug, Default)]
pub struct ValueInjector {
    config: InjectorConfig,
}

impl ValueInjector {
    pub fn new(config: InjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// Fill `element` with `value`. Per-field failures come back inside the
    /// outcome; only page-level failures (stale handles) are errors.
    #[instrument(skip_all, fields(field = %field, element = %element))]
    pub async fn inject(
        &self,
        page: &dyn PageDriver,
        element: ElementHandle,
        field: SemanticFieldType,
        value: &FillValue,
    ) -> Result<FillOutcome, InjectError> {
        let info = page.describe(element).await?;
        page.scroll_into_view(element).await?;

        let mut outcome = if info.is_file() {
            match value {
                FillValue::File(payload) => self.fill_file(page, element, payload.clone()).await?,
                other => unsupported("file", other),
            }
        } else if info.is_select() {
            match value.as_text() {
                Some(text) => fill_select(page, element, &text, &self.config).await?,
                None => unsupported("select", value),
            }
        } else if info.is_checkbox() {
            fill_checkbox(page, element, value, &self.config).await?
        } else if info.is_radio() {
            fill_radio(page, element, &info, value, &self.config).await?
        } else if info.is_content_editable() {
            match value.as_text() {
                Some(text) => fill_editable(page, element, &text, &self.config).await?,
                None => unsupported("editable", value),
            }
        } else if info.is_text_like() {
            match value.as_text() {
                Some(text) => fill_text(page, element, &text, &self.config).await?,
                None => unsupported("text", value),
            }
        } else {
            unsupported(&info.tag, value)
        };

        let wrote = outcome.success
            || matches!(outcome.error, Some(InjectError::VerificationFailed { .. }));
        if self.config.validation_pass && wrote {
            outcome.validation_message = self.validation_pass(page, element).await?;
        }

        info!(
            success = outcome.success,
            technique = outcome.strategy_used.map(|t| t.name()).unwrap_or("none"),
            "field filled"
        );
        Ok(outcome)
    }

    async fn fill_file(
        &self,
        page: &dyn PageDriver,
        element: ElementHandle,
        payload: FilePayload,
    ) -> Result<FillOutcome, InjectError> {
        debug!(name = %payload.name, bytes = payload.bytes.len(), "assigning file");
        page.set_files(element, vec![payload]).await?;
        page.dispatch(element, DomEvent::new(EventKind::Input)).await?;
        page.dispatch(element, DomEvent::new(EventKind::Change)).await?;
        pause(self.config.verify_settle()).await;
        if page.file_count(element).await? > 0 {
            Ok(FillOutcome::verified(Technique::FileTransfer))
        } else {
            Ok(FillOutcome::failed(InjectError::VerificationFailed {
                attempted: vec![Technique::FileTransfer],
            }))
        }
    }

    /// Blur, focus, blur after a pause and report whatever the page flags.
    async fn validation_pass(
        &self,
        page: &dyn PageDriver,
        element: ElementHandle,
    ) -> Result<Option<String>, InjectError> {
        pause(self.config.validation_delay()).await;
        page.blur(element).await?;
        page.focus(element).await?;
        page.blur(element).await?;
        let message = page.validation_message(element).await?;
        if let Some(message) = &message {
            debug!(message = %message, "page flagged the field");
        }
        Ok(message)
    }
}

fn unsupported(kind: &str, value: &FillValue) -> FillOutcome {
    let value = match value {
        FillValue::Text(_) => "text",
        FillValue::Flag(_) => "a flag",
        FillValue::File(_) => "a file",
    };
    FillOutcome::failed(InjectError::UnsupportedValue {
        kind: kind.to_string(),
        value: value.to_string(),
    })
}
