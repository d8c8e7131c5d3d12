use std::io::Write;

use formpilot_core_types::SemanticFieldType;
use platform_registry::{CatalogOrigin, PatternLibrary};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

#[test]
fn yaml_override_replaces_bundled_platforms() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r##"
version: 1
platforms:
  - identifier: acme
    urlPatterns: ["*://apply.acme.test/*"]
    containerPath: "//form[@id='acme']"
    fieldPatterns:
      first_name:
        pathExpressions: ["//input[@id='acme-first']"]
      favouriteColour:
        cssExpressions: ["#colour"]
generic:
  fieldPatterns:
    email:
      keywordList: [email]
  successPhrases: ["all done"]
"##
    )
    .unwrap();

    let library = PatternLibrary::load(Some(file.path())).unwrap();
    assert_eq!(library.origin(), &CatalogOrigin::File(file.path().to_path_buf()));
    assert_eq!(library.identify_name("https://apply.acme.test/jobs/9"), "acme");
    assert_eq!(library.identify_name("https://boards.greenhouse.io/x"), "generic");

    let acme = library.platform("acme").unwrap();
    // Unknown field keys are dropped, known ones survive.
    assert_eq!(acme.field_patterns.len(), 1);
    assert!(acme.pattern(SemanticFieldType::FirstName).is_some());
    assert_eq!(library.success_phrases(), vec!["all done".to_string()]);
}

#[test]
fn unreadable_override_falls_back_to_bundled() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "platforms: [this is: not: valid").unwrap();

    let library = PatternLibrary::load(Some(file.path())).unwrap();
    assert_eq!(library.origin(), &CatalogOrigin::Bundled);
    assert!(!library.is_degraded());
    assert_eq!(
        library.identify_name("https://jobs.lever.co/acme/1"),
        "lever"
    );
}

#[test]
fn missing_override_falls_back_to_bundled() {
    let dir = tempfile::tempdir().unwrap();
    let library = PatternLibrary::load(Some(&dir.path().join("absent.json"))).unwrap();
    assert_eq!(library.origin(), &CatalogOrigin::Bundled);
    assert_eq!(library.platforms().len(), 8);
}

#[test]
fn first_declared_platform_wins() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"platforms":[
            {{"identifier":"first","urlPatterns":["*://shared.test/*"]}},
            {{"identifier":"second","urlPatterns":["*://shared.test/*"]}}
        ]}}"#
    )
    .unwrap();
    let library = PatternLibrary::load(Some(file.path())).unwrap();
    assert_eq!(library.identify_name("https://shared.test/a"), "first");
    // No generic rules in the document: compiled-in ones are merged in.
    assert!(library.generic_pattern(SemanticFieldType::Email).is_some());
}
