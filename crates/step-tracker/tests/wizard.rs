use std::sync::Arc;
use std::time::Duration;

use page_model::{MemoryPage, PageInput};
use platform_registry::PatternLibrary;
use pretty_assertions::assert_eq;
use step_tracker::{
    CompletionSignal, ControlKind, StepTracker, TrackerConfig, TrackerError, TrackerState,
};

const WIZARD: &str = r#"
<form id="apply">
  <ol class="progress">
    <li class="step active" id="m1">Contact</li>
    <li class="step" id="m2">Experience</li>
    <li class="step" id="m3">Location</li>
  </ol>
  <section class="panel current" id="s1">
    <input name="first_name" required>
    <input name="email" required>
    <button type="button" id="next1">Next</button>
  </section>
  <section class="panel" id="s2" style="display:none">
    <input name="current_company" required>
    <input name="current_title" required>
    <button type="button" id="next2">Continue</button>
  </section>
  <section class="panel" id="s3" style="display:none">
    <input name="city" required>
    <input name="phone">
    <button type="submit" id="send">Submit application</button>
  </section>
</form>"#;

fn tracker() -> StepTracker {
    StepTracker::new(PatternLibrary::bundled().unwrap(), None, TrackerConfig::default()).unwrap()
}

fn wizard_page() -> MemoryPage {
    let page = MemoryPage::new("https://apply.example.com/jobs/42", WIZARD).unwrap();
    for (button, from, to) in [("#next1", 1, 2), ("#next2", 2, 3)] {
        page.on_click(button, move |dom| {
            dom.set_style(&format!("#s{from}"), "display:none")?;
            dom.remove_class(&format!("#s{from}"), "current")?;
            dom.set_style(&format!("#s{to}"), "")?;
            dom.add_class(&format!("#s{to}"), "current")?;
            dom.remove_class(&format!("#m{from}"), "active")?;
            dom.add_class(&format!("#m{to}"), "active")?;
            Ok(())
        })
        .unwrap();
    }
    page.on_click("#send", |dom| {
        dom.navigate(
            "https://apply.example.com/jobs/42/done",
            "<main><h1>Thank you for applying!</h1></main>",
        )
    })
    .unwrap();
    page
}

async fn fill(page: &MemoryPage, names: &[&str]) {
    for name in names {
        let handle = page
            .find(&format!("input[name=\"{name}\"]"))
            .unwrap()
            .unwrap();
        page.set_value_native(handle, "x").await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn three_step_wizard_completes_in_three_transitions() {
    let page = wizard_page();
    let mut tracker = tracker();

    assert_eq!(tracker.detect_steps(&page).await.unwrap(), TrackerState::StepActive);
    assert_eq!(tracker.form_state().current_step_index, 1);
    assert_eq!(tracker.form_state().total_steps_known, Some(3));
    assert!(tracker.form_state().has_advance_control);
    assert!(!tracker.form_state().has_submit_control);

    let blocked = tracker.advance_if_complete(&page).await.unwrap();
    assert!(!blocked.advanced);
    assert_eq!(blocked.blocked_by, vec!["first_name", "email"]);
    assert_eq!(tracker.transitions(), 0);

    fill(&page, &["first_name", "email"]).await;
    let outcome = tracker.advance_if_complete(&page).await.unwrap();
    assert!(outcome.advanced);
    assert_eq!(outcome.activated, Some(ControlKind::Next));
    assert_eq!(outcome.new_step_index, 2);
    assert!(!outcome.used_fallback);
    assert!(tracker.form_state().filled_field_types.is_empty());

    fill(&page, &["current_company", "current_title"]).await;
    let outcome = tracker.advance_if_complete(&page).await.unwrap();
    assert_eq!(outcome.new_step_index, 3);
    assert_eq!(tracker.form_state().current_step_index, 3);
    assert!(tracker.form_state().has_submit_control);

    fill(&page, &["city"]).await;
    let outcome = tracker.advance_if_complete(&page).await.unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.activated, Some(ControlKind::Submit));
    assert_eq!(outcome.new_step_index, 3);

    assert_eq!(tracker.transitions(), 3);
    assert_eq!(tracker.state(), TrackerState::Completed);
    assert!(!tracker.is_incomplete());
    assert_eq!(
        tracker.completion(),
        Some(&CompletionSignal::SuccessPhrase("thank you for applying".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn dead_advance_control_hits_the_cap_exactly() {
    let page = MemoryPage::new(
        "https://apply.example.com/jobs/7",
        r#"<form><input name="first_name"><button type="button">Next</button></form>"#,
    )
    .unwrap();
    let mut tracker = tracker();

    for attempt in 1..10 {
        let outcome = tracker.advance(&page).await.unwrap();
        assert!(outcome.timed_out, "attempt {attempt}");
        assert!(outcome.used_fallback);
        assert!(!outcome.advanced);
        assert_eq!(outcome.stuck, attempt >= 2);
        assert!(matches!(outcome.error, Some(TrackerError::NavigationTimeout { .. })));
        assert_eq!(tracker.state(), TrackerState::StepActive);
    }
    assert_eq!(tracker.transitions(), 9);

    let err = tracker.advance(&page).await.unwrap_err();
    assert_eq!(err, TrackerError::StepLoopExceeded { cap: 10 });
    assert!(err.is_terminal());
    assert_eq!(tracker.transitions(), 10);
    assert_eq!(page.activation_count(), 10);
    assert_eq!(tracker.state(), TrackerState::Completed);
    assert!(tracker.is_incomplete());

    // Terminal: no further activations.
    assert!(tracker.advance(&page).await.is_err());
    assert_eq!(page.activation_count(), 10);
}

#[tokio::test(start_paused = true)]
async fn direct_activation_is_the_fallback() {
    let page = MemoryPage::new(
        "https://apply.example.com/jobs/7",
        r#"<form><div id="body"><input name="first_name"></div><button type="button" id="go">Next</button></form>"#,
    )
    .unwrap();
    page.on_activation("#go", |dom| {
        dom.set_inner_html("#body", r#"<input name="city">"#)?;
        Ok(())
    })
    .unwrap();

    let mut tracker = tracker();
    let started = tokio::time::Instant::now();
    let outcome = tracker.advance(&page).await.unwrap();
    assert!(outcome.advanced);
    assert!(outcome.used_fallback);
    assert_eq!(outcome.new_step_index, 2);
    assert_eq!(started.elapsed(), tracker.config().click_settle());
}

#[tokio::test(start_paused = true)]
async fn missing_control_is_rescanned_a_bounded_number_of_times() {
    let page = MemoryPage::new(
        "https://apply.example.com/jobs/7",
        r#"<form><input name="first_name"></form>"#,
    )
    .unwrap();
    let config = TrackerConfig {
        advance_rescans: 3,
        rescan_delay_ms: 200,
        ..TrackerConfig::default()
    };
    let mut tracker = StepTracker::new(PatternLibrary::bundled().unwrap(), None, config).unwrap();
    assert_eq!(tracker.detect_steps(&page).await.unwrap(), TrackerState::SingleStep);

    let started = tokio::time::Instant::now();
    let outcome = tracker.advance(&page).await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_millis(600));
    assert!(!outcome.advanced);
    assert_eq!(outcome.error, Some(TrackerError::NoAdvanceControl { rescans: 3 }));
    assert_eq!(tracker.transitions(), 0);
    assert_eq!(tracker.state(), TrackerState::SingleStep);
}

#[tokio::test(start_paused = true)]
async fn single_step_form_submits_to_a_confirmation_url() {
    let page = MemoryPage::new(
        "https://apply.example.com/jobs/7",
        r#"<form><input name="email" required><button type="submit">Submit</button></form>"#,
    )
    .unwrap();
    page.on_click("button", |dom| {
        dom.navigate("https://apply.example.com/jobs/7/confirmation", "<p>Done.</p>")
    })
    .unwrap();

    let mut tracker = tracker();
    assert_eq!(tracker.detect_steps(&page).await.unwrap(), TrackerState::SingleStep);
    fill(&page, &["email"]).await;
    let outcome = tracker.advance_if_complete(&page).await.unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.activated, Some(ControlKind::Submit));
    assert!(matches!(
        tracker.completion(),
        Some(CompletionSignal::ConfirmationUrl(_))
    ));
}

#[tokio::test]
async fn acknowledgment_pages_complete_without_activation() {
    let page = MemoryPage::new(
        "https://apply.example.com/jobs/7",
        "<h2>Your application submitted successfully</h2>",
    )
    .unwrap();
    let library: Arc<PatternLibrary> = PatternLibrary::bundled().unwrap();
    let mut tracker = StepTracker::new(library, Some("greenhouse"), TrackerConfig::default()).unwrap();
    assert_eq!(tracker.detect_steps(&page).await.unwrap(), TrackerState::Completed);
    let outcome = tracker.advance(&page).await.unwrap();
    assert!(outcome.completed);
    assert!(!outcome.advanced);
    assert_eq!(tracker.transitions(), 0);
}
