use formpilot_core_types::{ElementHandle, FilePayload, FillValue, SemanticFieldType};
use page_model::{EventKind, InputBehavior, MemoryPage, PageQuery};
use pretty_assertions::assert_eq;
use value_injector::{InjectError, InjectorConfig, Technique, ValueInjector};

const FORM: &str = r#"
<form>
  <input id="first" name="first_name" required>
  <input id="email" name="email" type="email">
  <textarea id="cover" name="cover"></textarea>
  <select id="country" name="country">
    <option value="">Choose</option>
    <option value="United States">United States</option>
    <option value="Canada">Canada</option>
  </select>
  <input type="checkbox" id="terms" name="terms" checked>
  <input type="checkbox" id="news" name="news">
  <label><input type="radio" name="sponsor" id="sp-yes" value="Yes"> Yes</label>
  <label><input type="radio" name="sponsor" id="sp-no" value="No"> No</label>
  <input type="file" id="resume" name="resume">
</form>"#;

fn setup() -> (MemoryPage, ValueInjector) {
    (
        MemoryPage::new("https://careers.example.org/apply", FORM).unwrap(),
        ValueInjector::new(InjectorConfig::immediate()),
    )
}

fn find(page: &MemoryPage, selector: &str) -> ElementHandle {
    page.find(selector).unwrap().unwrap()
}

#[tokio::test]
async fn text_fill_is_idempotent() {
    let (page, injector) = setup();
    let first = find(&page, "#first");
    for _ in 0..2 {
        let outcome = injector
            .inject(&page, first, SemanticFieldType::FirstName, &"Ada".into())
            .await
            .unwrap();
        assert!(outcome.success && outcome.verified);
        assert_eq!(outcome.strategy_used, Some(Technique::NativeSetter));
        assert_eq!(outcome.validation_message, None);
    }
    assert_eq!(page.read_value(first).await.unwrap(), "Ada");
}

#[tokio::test]
async fn framework_bound_inputs_use_the_handler() {
    let (page, injector) = setup();
    page.set_behavior("#first", InputBehavior::FrameworkControlled).unwrap();
    let first = find(&page, "#first");
    let outcome = injector
        .inject(&page, first, SemanticFieldType::FirstName, &"Grace".into())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.strategy_used, Some(Technique::FrameworkState));
    assert_eq!(page.read_value(first).await.unwrap(), "Grace");
}

#[tokio::test]
async fn keystroke_driven_inputs_fall_through_to_typing() {
    let (page, injector) = setup();
    page.set_behavior("#cover", InputBehavior::KeystrokeDriven).unwrap();
    let cover = find(&page, "#cover");
    for text in ["Hello there", "Hi"] {
        let outcome = injector
            .inject(&page, cover, SemanticFieldType::CoverLetter, &text.into())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.strategy_used, Some(Technique::Keystrokes));
        assert_eq!(page.read_value(cover).await.unwrap(), text);
    }
}

#[tokio::test]
async fn unreflectable_inputs_go_straight_to_typing() {
    let (page, injector) = setup();
    page.set_behavior("#first", InputBehavior::Opaque).unwrap();
    let first = find(&page, "#first");
    let outcome = injector
        .inject(&page, first, SemanticFieldType::FirstName, &"Linus".into())
        .await
        .unwrap();
    assert_eq!(outcome.strategy_used, Some(Technique::Keystrokes));
    assert_eq!(page.read_value(first).await.unwrap(), "Linus");
}

#[tokio::test]
async fn select_without_matching_option_fails_cleanly() {
    let (page, injector) = setup();
    let country = find(&page, "#country");
    let outcome = injector
        .inject(&page, country, SemanticFieldType::Country, &"us".into())
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(matches!(outcome.error, Some(InjectError::OptionNotFound { .. })));
    assert_eq!(page.read_value(country).await.unwrap(), "");

    let outcome = injector
        .inject(&page, country, SemanticFieldType::Country, &"canada".into())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.strategy_used, Some(Technique::OptionSelect));
    assert_eq!(page.read_value(country).await.unwrap(), "Canada");
}

#[tokio::test]
async fn checkboxes_toggle_only_when_state_differs() {
    let (page, injector) = setup();
    let terms = find(&page, "#terms");
    let news = find(&page, "#news");

    let outcome = injector
        .inject(&page, terms, SemanticFieldType::WorkAuthorization, &FillValue::Flag(true))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(page.activation_count(), 0);

    injector
        .inject(&page, news, SemanticFieldType::WorkAuthorization, &"Yes".into())
        .await
        .unwrap();
    assert!(page.is_checked(news).await.unwrap());
    assert_eq!(page.activation_count(), 1);
}

#[tokio::test]
async fn radio_answers_pick_the_matching_member() {
    let (page, injector) = setup();
    let yes = find(&page, "#sp-yes");
    let no = find(&page, "#sp-no");

    let outcome = injector
        .inject(&page, yes, SemanticFieldType::Sponsorship, &FillValue::Flag(false))
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(page.is_checked(no).await.unwrap());
    assert!(!page.is_checked(yes).await.unwrap());

    injector
        .inject(&page, yes, SemanticFieldType::Sponsorship, &"Yes".into())
        .await
        .unwrap();
    assert!(page.is_checked(yes).await.unwrap());
    assert!(!page.is_checked(no).await.unwrap());
}

#[tokio::test]
async fn files_are_verified_by_count() {
    let (page, injector) = setup();
    let resume = find(&page, "#resume");
    let payload = FilePayload::new("cv.pdf", "application/pdf", b"%PDF-1.4".to_vec());
    let outcome = injector
        .inject(&page, resume, SemanticFieldType::ResumeFile, &payload.into())
        .await
        .unwrap();
    assert_eq!(outcome.strategy_used, Some(Technique::FileTransfer));
    assert_eq!(page.file_count(resume).await.unwrap(), 1);

    let first = find(&page, "#first");
    let file = FilePayload::new("cv.pdf", "application/pdf", Vec::new());
    let outcome = injector
        .inject(&page, first, SemanticFieldType::FirstName, &file.into())
        .await
        .unwrap();
    assert!(matches!(outcome.error, Some(InjectError::UnsupportedValue { .. })));
}

#[tokio::test]
async fn editable_regions_are_filled_through_text_content() {
    let page = MemoryPage::new(
        "https://careers.example.org/apply",
        r#"<form><div id="letter" contenteditable="true" aria-label="Cover letter"><br></div></form>"#,
    )
    .unwrap();
    let injector = ValueInjector::new(InjectorConfig::immediate());
    let letter = find(&page, "#letter");

    let outcome = injector
        .inject(&page, letter, SemanticFieldType::CoverLetter, &"I build engines.".into())
        .await
        .unwrap();
    assert!(outcome.success && outcome.verified);
    assert_eq!(outcome.strategy_used, Some(Technique::TextContent));
    assert_eq!(page.read_value(letter).await.unwrap(), "I build engines.");
    assert!(page.events_for(letter).starts_with(&[
        EventKind::Focus,
        EventKind::Input,
        EventKind::Change,
        EventKind::Blur,
    ]));

    let file = FilePayload::new("letter.pdf", "application/pdf", b"%PDF-1.4".to_vec());
    let outcome = injector
        .inject(&page, letter, SemanticFieldType::CoverLetter, &file.into())
        .await
        .unwrap();
    assert!(matches!(outcome.error, Some(InjectError::UnsupportedValue { .. })));
}

#[tokio::test]
async fn validation_messages_are_reported_not_corrected() {
    let (page, injector) = setup();
    let email = find(&page, "#email");
    let outcome = injector
        .inject(&page, email, SemanticFieldType::Email, &"not-an-address".into())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(
        outcome.validation_message.as_deref(),
        Some("Please enter a valid email address")
    );
    assert_eq!(page.read_value(email).await.unwrap(), "not-an-address");
}

#[tokio::test(start_paused = true)]
async fn default_pauses_are_bounded_sleeps() {
    let page = MemoryPage::new("https://careers.example.org/apply", FORM).unwrap();
    let injector = ValueInjector::new(InjectorConfig::default());
    let first = find(&page, "#first");
    let started = tokio::time::Instant::now();
    injector
        .inject(&page, first, SemanticFieldType::FirstName, &"Ada".into())
        .await
        .unwrap();
    let elapsed = started.elapsed();
    let config = InjectorConfig::default();
    assert_eq!(elapsed, config.verify_settle() + config.validation_delay());
}
