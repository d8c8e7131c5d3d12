//! Field-type to profile-value mapping.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use formpilot_core_types::{FilePayload, FillValue, SemanticFieldType};
use tracing::warn;

use crate::model::UserProfileSnapshot;

const DEFAULT_COUNTRY: &str = "United States";
const DEFAULT_WORK_AUTHORIZATION: &str = "yes";

impl UserProfileSnapshot {
    /// Value to inject for `field`, or `None` when the profile has no answer.
    pub fn value_for(&self, field: SemanticFieldType) -> Option<FillValue> {
        use SemanticFieldType as F;

        let text = match field {
            F::FirstName => self.first_name.clone(),
            F::LastName => self.last_name.clone(),
            F::FullName => self.full_name(),
            F::Email => self.email.clone(),
            F::Phone => self.phone.clone(),
            F::Address => self.address.clone(),
            F::City => self.city.clone(),
            F::State => self.state.clone(),
            F::ZipCode => self.zip_code.clone(),
            F::Country => Some(
                self.country
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            ),
            F::Linkedin => self.linkedin_url.clone(),
            F::Github => self.github_url.clone(),
            F::Portfolio => self.portfolio_url.clone(),
            F::CurrentCompany => self.latest_experience().map(|exp| exp.company.clone()),
            F::CurrentTitle => self
                .professional_title
                .clone()
                .or_else(|| self.latest_experience().map(|exp| exp.title.clone())),
            F::YearsExperience => {
                (self.years_experience > 0.0).then(|| format_years(self.years_experience))
            }
            F::School => self.highest_education().map(|edu| edu.institution.clone()),
            F::Degree => self.highest_education().map(|edu| edu.degree.clone()),
            F::Major => self.highest_education().map(|edu| edu.field.clone()),
            F::GraduationYear => self.highest_education().map(|edu| edu.graduation_year.clone()),
            F::ResumeFile => return self.resume_payload().map(FillValue::File),
            F::CoverLetter => self.answers.cover_letter.clone(),
            F::WorkAuthorization => Some(
                self.answers
                    .work_authorization
                    .clone()
                    .unwrap_or_else(|| DEFAULT_WORK_AUTHORIZATION.to_string()),
            ),
            F::Sponsorship => self
                .answers
                .requires_sponsorship
                .map(|needed| if needed { "Yes" } else { "No" }.to_string()),
            F::Gender => self.answers.gender.clone(),
            F::Ethnicity => self.answers.ethnicity.clone(),
            F::VeteranStatus => self.answers.veteran_status.clone(),
            F::DisabilityStatus => self.answers.disability_status.clone(),
            F::SalaryExpectation => self.answers.salary_expectation.clone(),
            F::StartDate => self.answers.available_start_date.clone(),
        };
        text.filter(|t| !t.trim().is_empty()).map(FillValue::Text)
    }

    fn resume_payload(&self) -> Option<FilePayload> {
        let resume = self.resume.as_ref()?;
        match STANDARD.decode(resume.content_base64.trim()) {
            Ok(bytes) if !bytes.is_empty() => Some(FilePayload::new(
                resume.file_name.clone(),
                resume.mime_type.clone(),
                bytes,
            )),
            Ok(_) => None,
            Err(err) => {
                warn!(file = %resume.file_name, error = %err, "resume attachment is not valid base64");
                None
            }
        }
    }
}

fn format_years(years: f64) -> String {
    if years.fract() == 0.0 {
        format!("{}", years as i64)
    } else {
        format!("{years:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn profile(raw: serde_json::Value) -> UserProfileSnapshot {
        UserProfileSnapshot::from_raw(&raw, Utc::now()).unwrap()
    }

    #[test]
    fn composed_and_defaulted_answers() {
        let snapshot = profile(json!({
            "firstName": " Ada ",
            "lastName": "Lovelace",
            "requiresSponsorship": false,
            "yearsExperience": 7,
            "workExperience": [
                {"title": "Analyst", "company": "Old Co", "startDate": "2010-01-01", "endDate": "2012-01-01"},
                {"title": "Engineer", "company": "Engines Ltd", "startDate": "2012-02-01", "isCurrent": true}
            ]
        }));
        let text = |field| snapshot.value_for(field);

        assert_eq!(text(SemanticFieldType::FullName), Some("Ada Lovelace".into()));
        assert_eq!(text(SemanticFieldType::Country), Some("United States".into()));
        assert_eq!(text(SemanticFieldType::WorkAuthorization), Some("yes".into()));
        assert_eq!(text(SemanticFieldType::Sponsorship), Some("No".into()));
        assert_eq!(text(SemanticFieldType::CurrentCompany), Some("Engines Ltd".into()));
        assert_eq!(text(SemanticFieldType::CurrentTitle), Some("Engineer".into()));
        assert_eq!(text(SemanticFieldType::YearsExperience), Some("7".into()));
        assert_eq!(text(SemanticFieldType::Email), None);
        assert_eq!(text(SemanticFieldType::ResumeFile), None);
    }

    #[test]
    fn resume_is_decoded_into_a_file_payload() {
        let snapshot = profile(json!({
            "resume": {"fileName": "cv.pdf", "content": STANDARD.encode(b"%PDF-1.4")}
        }));
        assert_eq!(
            snapshot.value_for(SemanticFieldType::ResumeFile),
            Some(FillValue::File(FilePayload::new(
                "cv.pdf",
                "application/pdf",
                b"%PDF-1.4".to_vec()
            )))
        );

        let broken = profile(json!({"resume": {"content": "@@not base64@@"}}));
        assert_eq!(broken.value_for(SemanticFieldType::ResumeFile), None);
    }

    #[test]
    fn education_answers_come_from_the_highest_degree() {
        let snapshot = profile(json!({
            "education": [
                {"degree": "Certificate in Data Analysis", "field": "Analytics", "institution": "Online Academy", "graduationYear": "2021"},
                {"degree": "Bachelor of Science", "field": "Mathematics", "institution": "State University", "graduationYear": "2012"},
                {"degree": "Master of Science", "field": "Computer Science", "institution": "Tech Institute", "graduationYear": "2015"},
                {"degree": "Associate of Arts", "field": "General Studies", "institution": "City College", "graduationYear": "2010"}
            ]
        }));
        let text = |field| snapshot.value_for(field);

        assert_eq!(text(SemanticFieldType::Degree), Some("Master of Science".into()));
        assert_eq!(text(SemanticFieldType::School), Some("Tech Institute".into()));
        assert_eq!(text(SemanticFieldType::Major), Some("Computer Science".into()));
        assert_eq!(text(SemanticFieldType::GraduationYear), Some("2015".into()));

        let unranked = profile(json!({
            "education": [
                {"degree": "Bootcamp", "institution": "Code School"},
                {"degree": "Diploma", "institution": "Central High"}
            ]
        }));
        assert_eq!(
            unranked.value_for(SemanticFieldType::School),
            Some("Central High".into())
        );
    }

    #[test]
    fn fractional_years_keep_one_decimal() {
        assert_eq!(format_years(3.0), "3");
        assert_eq!(format_years(3.14), "3.1");
    }
}
