//! Text cascade: framework state, native setter, keystrokes, descriptor
//! override. The first technique whose read-back matches wins.

use formpilot_core_types::ElementHandle;
use page_model::{BindingProbe, DomEvent, EventKind, HandlerRef, PageDriver, PageError, SyntheticEvent};
use tracing::{debug, warn};

use crate::errors::InjectError;
use crate::model::{pause, FillOutcome, InjectorConfig, Technique};

/// Techniques to try for a probe result, in order.
pub fn plan_for(probe: &BindingProbe) -> Vec<Technique> {
    match probe {
        BindingProbe::FrameworkBound(_) => vec![
            Technique::FrameworkState,
            Technique::NativeSetter,
            Technique::Keystrokes,
            Technique::DescriptorOverride,
        ],
        BindingProbe::NativeElement => vec![
            Technique::NativeSetter,
            Technique::Keystrokes,
            Technique::DescriptorOverride,
        ],
        BindingProbe::Unavailable => vec![Technique::Keystrokes],
    }
}

pub async fn fill_text(
    page: &dyn PageDriver,
    element: ElementHandle,
    value: &str,
    config: &InjectorConfig,
) -> Result<FillOutcome, InjectError> {
    let probe = page.probe_binding(element).await?;
    let plan = plan_for(&probe);
    let mut attempted = Vec::with_capacity(plan.len());

    for technique in plan {
        attempted.push(technique);
        let written = match technique {
            Technique::FrameworkState => match &probe {
                BindingProbe::FrameworkBound(handler) => {
                    framework_state(page, element, handler, value).await
                }
                _ => continue,
            },
            Technique::NativeSetter => native_setter(page, element, value).await,
            Technique::Keystrokes => keystrokes(page, element, value, config).await,
            Technique::DescriptorOverride => descriptor_override(page, element, value).await,
            _ => continue,
        };
        match written {
            Ok(()) => {}
            Err(err @ PageError::StaleHandle(_)) => return Err(err.into()),
            Err(err) => {
                warn!(technique = %technique, error = %err, "technique rejected");
                continue;
            }
        }

        pause(config.verify_settle()).await;
        let actual = page.read_value(element).await?;
        if actual == value {
            debug!(technique = %technique, "value verified");
            return Ok(FillOutcome::verified(technique));
        }
        debug!(technique = %technique, actual = %actual, "read-back mismatch");
    }

    Ok(FillOutcome::failed(InjectError::VerificationFailed { attempted }))
}

async fn framework_state(
    page: &dyn PageDriver,
    element: ElementHandle,
    handler: &HandlerRef,
    value: &str,
) -> Result<(), PageError> {
    page.set_value_native(element, value).await?;
    page.invoke_framework_handler(
        handler,
        SyntheticEvent {
            kind: EventKind::Input,
            target: element,
        },
    )
    .await?;
    page.dispatch(element, DomEvent::input_data(value)).await?;
    page.dispatch(element, DomEvent::new(EventKind::Change)).await
}

async fn native_setter(
    page: &dyn PageDriver,
    element: ElementHandle,
    value: &str,
) -> Result<(), PageError> {
    page.set_value_native(element, value).await?;
    page.dispatch(element, DomEvent::input_data(value)).await?;
    page.dispatch(element, DomEvent::new(EventKind::Change)).await
}

async fn keystrokes(
    page: &dyn PageDriver,
    element: ElementHandle,
    value: &str,
    config: &InjectorConfig,
) -> Result<(), PageError> {
    page.focus(element).await?;

    let existing = page.read_value(element).await?.chars().count();
    for _ in 0..existing {
        page.dispatch(element, DomEvent::key(EventKind::KeyDown, "Backspace"))
            .await?;
        page.dispatch(element, DomEvent::new(EventKind::Input)).await?;
        page.dispatch(element, DomEvent::key(EventKind::KeyUp, "Backspace"))
            .await?;
    }

    for ch in value.chars() {
        let key = ch.to_string();
        page.dispatch(element, DomEvent::key(EventKind::KeyDown, key.as_str()))
            .await?;
        page.dispatch(element, DomEvent::key(EventKind::KeyPress, key.as_str()))
            .await?;
        page.dispatch(element, DomEvent::input_data(key.as_str())).await?;
        page.dispatch(element, DomEvent::key(EventKind::KeyUp, key.as_str()))
            .await?;
        pause(config.keystroke_delay()).await;
    }

    page.dispatch(element, DomEvent::new(EventKind::Change)).await?;
    page.blur(element).await
}

async fn descriptor_override(
    page: &dyn PageDriver,
    element: ElementHandle,
    value: &str,
) -> Result<(), PageError> {
    page.override_value_accessor(element, value).await?;
    page.dispatch(element, DomEvent::input_data(value)).await?;
    page.dispatch(element, DomEvent::new(EventKind::Change)).await
}
