//! Option matching for select controls.

use formpilot_core_types::ElementHandle;
use page_model::{DomEvent, EventKind, OptionInfo, PageDriver};
use tracing::debug;

use crate::errors::InjectError;
use crate::model::{pause, FillOutcome, InjectorConfig, Technique};

/// Rule an option satisfied, strongest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionMatch {
    ExactValue,
    ExactText,
    TextContains,
    ValueContains,
}

/// First enabled option satisfying the strongest rule any option satisfies.
pub fn match_option(options: &[OptionInfo], wanted: &str) -> Option<(usize, OptionMatch)> {
    let wanted_trimmed = wanted.trim();
    if wanted_trimmed.is_empty() {
        return None;
    }
    let wanted_lower = wanted_trimmed.to_lowercase();
    let enabled = || options.iter().filter(|o| !o.disabled);

    let rules: [(OptionMatch, Box<dyn Fn(&OptionInfo) -> bool + '_>); 4] = [
        (
            OptionMatch::ExactValue,
            Box::new(|o: &OptionInfo| o.value == wanted || o.value == wanted_trimmed),
        ),
        (
            OptionMatch::ExactText,
            Box::new(|o: &OptionInfo| o.text.trim().to_lowercase() == wanted_lower),
        ),
        (
            OptionMatch::TextContains,
            Box::new(|o: &OptionInfo| o.text.to_lowercase().contains(&wanted_lower)),
        ),
        (
            OptionMatch::ValueContains,
            Box::new(|o: &OptionInfo| o.value.to_lowercase().contains(&wanted_lower)),
        ),
    ];
    rules.iter().find_map(|(kind, rule)| {
        enabled()
            .find(|o| rule(o))
            .map(|o| (o.index, *kind))
    })
}

pub async fn fill_select(
    page: &dyn PageDriver,
    element: ElementHandle,
    wanted: &str,
    config: &InjectorConfig,
) -> Result<FillOutcome, InjectError> {
    let options = page.options(element).await?;
    let Some((index, how)) = match_option(&options, wanted) else {
        return Ok(FillOutcome::failed(InjectError::OptionNotFound {
            wanted: wanted.to_string(),
            available: options.iter().map(|o| o.text.clone()).collect(),
        }));
    };
    debug!(index, rule = ?how, "option matched");

    page.select_option(element, index).await?;
    page.dispatch(element, DomEvent::new(EventKind::Input)).await?;
    page.dispatch(element, DomEvent::new(EventKind::Change)).await?;
    pause(config.verify_settle()).await;

    let expected = &options[index].value;
    if page.read_value(element).await? == *expected {
        Ok(FillOutcome::verified(Technique::OptionSelect))
    } else {
        Ok(FillOutcome::failed(InjectError::VerificationFailed {
            attempted: vec![Technique::OptionSelect],
        }))
    }
}
