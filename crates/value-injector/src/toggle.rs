//! Checkbox and radio controls.

use formpilot_core_types::{ElementHandle, FillValue};
use page_model::{ElementInfo, PageDriver};
use tracing::debug;

use crate::errors::InjectError;
use crate::model::{pause, FillOutcome, InjectorConfig, Technique};

const FALSY_ANSWERS: &[&str] = &["no", "false", "0"];

pub async fn fill_checkbox(
    page: &dyn PageDriver,
    element: ElementHandle,
    value: &FillValue,
    config: &InjectorConfig,
) -> Result<FillOutcome, InjectError> {
    let desired = value.is_truthy();
    if page.is_checked(element).await? != desired {
        page.activate(element).await?;
        pause(config.verify_settle()).await;
    }
    verify_checked(page, element, desired).await
}

/// Pick the radio of `element`'s group that answers `value`: exact value
/// match, then case-insensitive value or label match, then the detected
/// radio itself for truthy answers.
pub async fn fill_radio(
    page: &dyn PageDriver,
    element: ElementHandle,
    info: &ElementInfo,
    value: &FillValue,
    config: &InjectorConfig,
) -> Result<FillOutcome, InjectError> {
    let group = radio_group(page, element, info).await?;
    let wanted = value.as_text().unwrap_or_default();
    let wanted_lower = wanted.trim().to_lowercase();

    let mut target = group
        .iter()
        .find(|(_, value, _)| !wanted.is_empty() && *value == wanted)
        .map(|(h, _, _)| *h);
    if target.is_none() && !wanted_lower.is_empty() {
        target = group
            .iter()
            .find(|(_, value, label)| value.to_lowercase() == wanted_lower || *label == wanted_lower)
            .map(|(h, _, _)| *h);
    }
    if target.is_none() && value.is_truthy() {
        target = Some(element);
    }
    if target.is_none() && FALSY_ANSWERS.contains(&wanted_lower.as_str()) {
        // A lone radio answering "no" stays unchecked.
        return verify_checked(page, element, false).await;
    }

    let Some(target) = target else {
        return Ok(FillOutcome::failed(InjectError::OptionNotFound {
            wanted,
            available: group.into_iter().map(|(_, value, _)| value).collect(),
        }));
    };
    debug!(radio = %target, "radio chosen");
    if !page.is_checked(target).await? {
        page.activate(target).await?;
        pause(config.verify_settle()).await;
    }
    verify_checked(page, target, true).await
}

/// (handle, value attribute, lowercase label) of every radio sharing the
/// element's name.
async fn radio_group(
    page: &dyn PageDriver,
    element: ElementHandle,
    info: &ElementInfo,
) -> Result<Vec<(ElementHandle, String, String)>, InjectError> {
    let members = match info.name.as_deref() {
        Some(name) if !name.is_empty() => {
            let mut members = Vec::new();
            for handle in page.input_like_elements(None).await? {
                let other = page.describe(handle).await?;
                if other.is_radio() && other.name.as_deref() == Some(name) {
                    members.push((handle, other));
                }
            }
            members
        }
        _ => vec![(element, info.clone())],
    };

    let mut group = Vec::with_capacity(members.len());
    for (handle, member) in members {
        let label = page
            .label_text(handle)
            .await?
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let value = member.attr("value").unwrap_or("on").to_string();
        group.push((handle, value, label));
    }
    Ok(group)
}

async fn verify_checked(
    page: &dyn PageDriver,
    element: ElementHandle,
    desired: bool,
) -> Result<FillOutcome, InjectError> {
    if page.is_checked(element).await? == desired {
        Ok(FillOutcome::verified(Technique::Toggle))
    } else {
        Ok(FillOutcome::failed(InjectError::VerificationFailed {
            attempted: vec![Technique::Toggle],
        }))
    }
}
