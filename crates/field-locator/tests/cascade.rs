use std::collections::HashSet;
use std::sync::Arc;

use field_locator::{FieldLocator, LocatorConfig, StrategyKind};
use formpilot_core_types::SemanticFieldType;
use page_model::MemoryPage;
use platform_registry::PatternLibrary;
use pretty_assertions::assert_eq;

fn locator() -> FieldLocator {
    FieldLocator::new(PatternLibrary::bundled().unwrap(), LocatorConfig::default())
}

fn page(url: &str, markup: &str) -> Arc<MemoryPage> {
    Arc::new(MemoryPage::new(url, markup).unwrap())
}

#[tokio::test]
async fn platform_rule_wins_with_high_confidence() {
    let page = page(
        "https://boards.greenhouse.io/acme/jobs/4012",
        r#"<form id="application_form">
             <input id="first_name" name="job_application[first_name]" type="text">
             <input id="last_name" name="job_application[last_name]" type="text">
           </form>"#,
    );
    let result = locator()
        .locate(page.as_ref(), SemanticFieldType::FirstName)
        .await
        .unwrap()
        .unwrap();
    assert!(result.confidence >= 90);
    assert_eq!(result.strategy_used, StrategyKind::PlatformPath);
    assert_eq!(Some(result.element), page.find("#first_name").unwrap());
}

#[tokio::test]
async fn generic_keyword_markup_lands_between_seventy_and_eighty_five() {
    let page = page(
        "https://careers.example.org/apply",
        r#"<form><input name="applicant_phone_number" type="text"></form>"#,
    );
    let result = locator()
        .locate(page.as_ref(), SemanticFieldType::Phone)
        .await
        .unwrap()
        .unwrap();
    assert!((70..=85).contains(&result.confidence), "{}", result.confidence);
}

#[tokio::test]
async fn candidate_email_is_reported_as_a_generic_path_match() {
    let page = page(
        "https://careers.example.org/apply",
        r#"<form><input name="candidate_email" id="candidate_email" type="text"></form>"#,
    );
    let locator = locator();
    let email = page.find("#candidate_email").unwrap();

    // Attribute scoring alone would also accept the element...
    let scored = locator
        .evaluate(page.as_ref(), SemanticFieldType::Email, StrategyKind::AttributeScore)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Some(scored.element), email);
    assert_eq!(scored.confidence, 85);

    // ...but the generic email path matches first and later ties never replace it.
    let cascade = locator
        .locate(page.as_ref(), SemanticFieldType::Email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Some(cascade.element), email);
    assert_eq!(cascade.strategy_used, StrategyKind::GenericPath);
    assert_eq!(cascade.confidence, 85);
}

#[tokio::test]
async fn ties_resolve_to_document_order() {
    let page = page(
        "https://careers.example.org/apply",
        r#"<form>
             <input id="primary" name="email_primary">
             <input id="secondary" name="email">
           </form>"#,
    );
    let result = locator()
        .locate(page.as_ref(), SemanticFieldType::Email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Some(result.element), page.find("#primary").unwrap());
}

#[tokio::test]
async fn label_context_and_fuzzy_are_last_resorts() {
    let page = page(
        "https://careers.example.org/apply",
        r#"<form>
             <label for="q1">Your electronic mail</label><input id="q1" name="q1">
             <input id="q2" name="telephone_nmbr">
             <input id="q3" name="employr">
           </form>"#,
    );
    let locator = locator();

    let email = locator
        .locate(page.as_ref(), SemanticFieldType::Email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(email.strategy_used, StrategyKind::LabelContext);
    assert_eq!(email.confidence, 75);

    let company = locator
        .locate(page.as_ref(), SemanticFieldType::CurrentCompany)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(company.strategy_used, StrategyKind::Fuzzy);
    assert_eq!(company.confidence, 60);
    assert_eq!(Some(company.element), page.find("#q3").unwrap());
}

#[tokio::test]
async fn hidden_disabled_and_inactive_candidates_are_skipped() {
    let page = page(
        "https://careers.example.org/apply",
        r#"<form>
             <section class="step active"><input name="phone"></section>
             <section class="step"><input name="email" id="inactive"></section>
             <input name="email_hidden" style="display:none">
             <input name="email_disabled" disabled>
           </form>"#,
    );
    let locator = locator();
    assert_eq!(
        locator.locate(page.as_ref(), SemanticFieldType::Email).await.unwrap(),
        None
    );
    assert!(locator
        .locate(page.as_ref(), SemanticFieldType::Phone)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn file_fields_only_match_file_inputs() {
    let page = page(
        "https://careers.example.org/apply",
        r#"<form>
             <input name="resume_link" id="link">
             <input type="file" name="resume" id="upload">
           </form>"#,
    );
    let result = locator()
        .locate(page.as_ref(), SemanticFieldType::ResumeFile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Some(result.element), page.find("#upload").unwrap());
}

#[tokio::test]
async fn claimed_elements_are_skipped() {
    let page = page(
        "https://careers.example.org/apply",
        r#"<form><input id="a" name="email"><input id="b" name="email_confirm"></form>"#,
    );
    let a = page.find("#a").unwrap().unwrap();
    let skip: HashSet<_> = [a].into_iter().collect();
    let result = locator()
        .locate_excluding(page.as_ref(), SemanticFieldType::Email, &skip)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Some(result.element), page.find("#b").unwrap());
}

#[tokio::test]
async fn cache_survives_until_invalidated_or_navigated() {
    let page = page(
        "https://careers.example.org/apply",
        r#"<form><input id="a" name="email"></form>"#,
    );
    let locator = locator();
    let first = locator
        .locate(page.as_ref(), SemanticFieldType::Email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locator.cached_entries(), 1);

    page.edit(|dom| dom.append_html("form", r#"<input id="z" name="email_main">"#))
        .unwrap();
    let again = locator
        .locate(page.as_ref(), SemanticFieldType::Email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, again);

    locator.invalidate();
    assert_eq!(locator.cached_entries(), 0);

    page.navigate(
        "https://careers.example.org/apply/2",
        r#"<form><input id="n" name="email"></form>"#,
    )
    .unwrap();
    let after = locator
        .locate(page.as_ref(), SemanticFieldType::Email)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(after.element, first.element);
    assert_eq!(Some(after.element), page.find("#n").unwrap());
}
