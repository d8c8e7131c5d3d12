//! Compiled-in rules: the bundled catalog and a last-resort generic set.

use formpilot_core_types::SemanticFieldType;

use crate::model::{ControlPatterns, FieldPattern, GenericProfile, NavigationControls, StepMarkers};

/// Catalog shipped with the engine.
pub const BUNDLED_CATALOG: &str = include_str!("../config/platforms.json");

const FIELD_KEYWORDS: &[(SemanticFieldType, &[&str])] = &[
    (SemanticFieldType::FirstName, &["first", "fname", "given", "forename"]),
    (SemanticFieldType::LastName, &["last", "lname", "surname", "family"]),
    (SemanticFieldType::FullName, &["full name", "fullname", "full_name"]),
    (SemanticFieldType::Email, &["email", "mail", "e-mail"]),
    (SemanticFieldType::Phone, &["phone", "mobile", "tel", "cell"]),
    (SemanticFieldType::Address, &["address", "street"]),
    (SemanticFieldType::City, &["city", "town"]),
    (SemanticFieldType::State, &["state", "province", "region"]),
    (SemanticFieldType::ZipCode, &["zip", "postal", "postcode"]),
    (SemanticFieldType::Country, &["country"]),
    (SemanticFieldType::Linkedin, &["linkedin"]),
    (SemanticFieldType::Github, &["github"]),
    (SemanticFieldType::Portfolio, &["portfolio", "website"]),
    (SemanticFieldType::CurrentCompany, &["company", "employer"]),
    (SemanticFieldType::CurrentTitle, &["title", "position"]),
    (SemanticFieldType::YearsExperience, &["experience", "years"]),
    (SemanticFieldType::School, &["school", "university", "college"]),
    (SemanticFieldType::Degree, &["degree"]),
    (SemanticFieldType::Major, &["major", "field of study"]),
    (SemanticFieldType::GraduationYear, &["graduation"]),
    (SemanticFieldType::ResumeFile, &["resume", "cv"]),
    (SemanticFieldType::CoverLetter, &["cover"]),
    (SemanticFieldType::WorkAuthorization, &["authorized", "authorization"]),
    (SemanticFieldType::Sponsorship, &["sponsor", "visa"]),
    (SemanticFieldType::Gender, &["gender"]),
    (SemanticFieldType::Ethnicity, &["ethnicity", "race"]),
    (SemanticFieldType::VeteranStatus, &["veteran"]),
    (SemanticFieldType::DisabilityStatus, &["disability"]),
    (SemanticFieldType::SalaryExpectation, &["salary", "compensation"]),
    (SemanticFieldType::StartDate, &["start date", "availability"]),
];

const SUCCESS_PHRASES: &[&str] = &[
    "application submitted",
    "thank you for applying",
    "application received",
    "successfully submitted",
    "application sent",
    "we got your application",
    "application complete",
];

const CONFIRMATION_URLS: &[&str] = &[
    "*confirmation*",
    "*thank-you*",
    "*/submitted*",
    "*application-complete*",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Keyword-only generic rules used when no catalog document can be read.
pub fn fallback_generic() -> GenericProfile {
    let field_patterns = FIELD_KEYWORDS
        .iter()
        .map(|(field, keywords)| {
            let css = keywords
                .iter()
                .filter(|k| !k.contains(' '))
                .flat_map(|k| [format!("input[name*=\"{k}\" i]"), format!("input[id*=\"{k}\" i]")])
                .collect();
            (
                *field,
                FieldPattern {
                    path_expressions: Vec::new(),
                    css_expressions: css,
                    keyword_list: strings(keywords),
                },
            )
        })
        .collect();
    GenericProfile {
        field_patterns,
        success_phrases: strings(SUCCESS_PHRASES),
        confirmation_url_patterns: strings(CONFIRMATION_URLS),
        navigation_controls: NavigationControls {
            next: ControlPatterns {
                keywords: strings(&["next", "continue", "proceed"]),
                ..ControlPatterns::default()
            },
            submit: ControlPatterns {
                css: strings(&["button[type=\"submit\"]", "input[type=\"submit\"]"]),
                keywords: strings(&["submit", "apply now", "send application"]),
                ..ControlPatterns::default()
            },
        },
        step_markers: StepMarkers::default(),
    }
}

/// Keywords for a field when the catalog carries none.
pub fn default_keywords(field: SemanticFieldType) -> &'static [&'static str] {
    FIELD_KEYWORDS
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_covers_every_field_type() {
        let generic = fallback_generic();
        for field in SemanticFieldType::ALL {
            let pattern = generic.pattern(field).expect("pattern");
            assert!(!pattern.keyword_list.is_empty(), "{field} has no keywords");
        }
    }
}
