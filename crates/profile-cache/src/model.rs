//! Normalized profile snapshot.
//!
//! The profile service has gone through several payload shapes; everything
//! here accepts the known aliases (`jobTitle` for `title`, `school` for
//! `institution`, bare skill strings, ...) and settles on one layout.
//! Derived structures (keyword index, years of experience) are keyed by
//! [`UserProfileSnapshot::content_hash`], never by sync time.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::errors::{ProfileError, ProfileResult};

const DEFAULT_PROFICIENCY: &str = "intermediate";
const DEFAULT_RESUME_MIME: &str = "application/pdf";
const PRESENT: &str = "Present";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    pub proficiency: String,
    pub years_used: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkExperience {
    pub title: String,
    pub company: String,
    pub start_date: String,
    /// `Present` for current positions.
    pub end_date: String,
    pub description: String,
    pub is_current: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub degree: String,
    pub field: String,
    pub institution: String,
    pub graduation_year: String,
    pub gpa: String,
}

/// Answers to the screening questions most applications ask.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationAnswers {
    pub work_authorization: Option<String>,
    pub requires_sponsorship: Option<bool>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub veteran_status: Option<String>,
    pub disability_status: Option<String>,
    pub salary_expectation: Option<String>,
    pub available_start_date: Option<String>,
    pub cover_letter: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub content_base64: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfileSnapshot {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub professional_title: Option<String>,
    pub skills: Vec<Skill>,
    pub work_experience: Vec<WorkExperience>,
    pub education: Vec<Education>,
    pub preferred_roles: Vec<String>,
    pub preferred_locations: Vec<String>,
    pub certifications: Vec<String>,
    pub tools: Vec<String>,
    pub languages: Vec<String>,
    pub answers: ApplicationAnswers,
    pub resume: Option<ResumeAttachment>,
    /// Years of experience as reported by the service, if any.
    pub declared_years_experience: Option<f64>,
    pub keyword_index: Vec<String>,
    pub years_experience: f64,
    pub content_hash: String,
    pub last_synced_at: DateTime<Utc>,
    pub derived_at: DateTime<Utc>,
}

impl UserProfileSnapshot {
    /// Normalize a raw service payload and compute its derived structures.
    pub fn from_raw(raw: &Value, now: DateTime<Utc>) -> ProfileResult<Self> {
        let mut snapshot = Self::normalize(raw, now)?;
        snapshot.derive(now);
        Ok(snapshot)
    }

    /// Normalize without deriving; `content_hash` is filled in.
    pub(crate) fn normalize(raw: &Value, now: DateTime<Utc>) -> ProfileResult<Self> {
        let Some(object) = raw.as_object() else {
            return Err(ProfileError::Decode("profile payload is not an object".into()));
        };
        if object.get("authenticated").and_then(Value::as_bool) == Some(false) {
            return Err(ProfileError::NotAuthenticated);
        }

        let mut snapshot = Self {
            user_id: text(object, &["userId", "id"]),
            email: text(object, &["email"]),
            first_name: text(object, &["firstName"]),
            last_name: text(object, &["lastName"]),
            phone: text(object, &["phone", "phoneNumber"]),
            address: text(object, &["address", "streetAddress"]),
            city: text(object, &["city"]),
            state: text(object, &["state", "region"]),
            zip_code: text(object, &["zipCode", "postalCode", "zip"]),
            country: text(object, &["country"]),
            linkedin_url: text(object, &["linkedinUrl", "linkedin"]),
            github_url: text(object, &["githubUrl", "github"]),
            portfolio_url: text(object, &["portfolioUrl", "website"]),
            professional_title: text(object, &["professionalTitle", "currentTitle"]),
            skills: skills(object),
            work_experience: work_experience(object),
            education: education(object),
            preferred_roles: strings(object, "preferredRoles"),
            preferred_locations: strings(object, "preferredLocations"),
            certifications: strings(object, "certifications"),
            tools: strings(object, "tools"),
            languages: strings(object, "languages"),
            answers: answers(object),
            resume: resume(object),
            declared_years_experience: number(object, &["yearsExperience", "totalExperience"])
                .filter(|years| *years > 0.0),
            last_synced_at: now,
            ..Self::default()
        };
        snapshot.content_hash = snapshot.compute_hash();
        Ok(snapshot)
    }

    /// Recompute the keyword index and years of experience.
    pub(crate) fn derive(&mut self, now: DateTime<Utc>) {
        self.keyword_index = self.build_keyword_index();
        self.years_experience = self
            .declared_years_experience
            .unwrap_or_else(|| years_from_history(&self.work_experience, now));
        self.derived_at = now;
    }

    /// Take the derived structures of `previous` when its content hash
    /// matches; returns whether they were taken.
    pub(crate) fn adopt_derived(&mut self, previous: &UserProfileSnapshot) -> bool {
        if previous.content_hash != self.content_hash || previous.content_hash.is_empty() {
            return false;
        }
        self.keyword_index = previous.keyword_index.clone();
        self.years_experience = previous.years_experience;
        self.derived_at = previous.derived_at;
        true
    }

    /// SHA-256 over the sections the derived structures depend on.
    pub fn compute_hash(&self) -> String {
        let canonical = serde_json::json!({
            "skills": self.skills,
            "workExperience": self.work_experience,
            "education": self.education,
            "yearsExperience": self.declared_years_experience,
            "professionalTitle": self.professional_title,
            "tools": self.tools,
            "certifications": self.certifications,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn full_name(&self) -> Option<String> {
        let joined = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Current position if one is flagged, else the first listed.
    pub fn latest_experience(&self) -> Option<&WorkExperience> {
        self.work_experience
            .iter()
            .find(|exp| exp.is_current)
            .or_else(|| self.work_experience.first())
    }

    /// Highest-ranked degree on file. Unranked entries lose to any ranked one
    /// and ties keep the earlier entry.
    pub fn highest_education(&self) -> Option<&Education> {
        let mut best: Option<(&Education, u8)> = None;
        for edu in &self.education {
            let rank = degree_rank(&edu.degree);
            if best.map_or(true, |(_, top)| rank > top) {
                best = Some((edu, rank));
            }
        }
        best.map(|(edu, _)| edu)
    }

    fn build_keyword_index(&self) -> Vec<String> {
        let mut keywords = BTreeSet::new();
        let listed = self
            .skills
            .iter()
            .map(|skill| skill.name.as_str())
            .chain(self.tools.iter().map(String::as_str))
            .chain(self.certifications.iter().map(String::as_str));
        for keyword in listed {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() {
                keywords.insert(keyword);
            }
        }
        for exp in &self.work_experience {
            for word in exp.title.to_lowercase().split_whitespace() {
                if word.chars().count() > 3 {
                    keywords.insert(word.to_string());
                }
            }
        }
        keywords.into_iter().collect()
    }
}

/// Sum of position durations in years, one decimal.
pub fn years_from_history(history: &[WorkExperience], now: DateTime<Utc>) -> f64 {
    let months: i64 = history
        .iter()
        .map(|exp| duration_months(exp, now.date_naive()))
        .sum();
    (months as f64 / 12.0 * 10.0).round() / 10.0
}

/// Whole 30-day months between start and end, rounded up.
fn duration_months(exp: &WorkExperience, today: NaiveDate) -> i64 {
    let Some(start) = parse_date(&exp.start_date) else {
        return 0;
    };
    let end = if exp.is_current || exp.end_date.trim().is_empty() {
        Some(today)
    } else {
        parse_date(&exp.end_date)
    };
    let Some(end) = end else {
        return 0;
    };
    let days = (end - start).num_days().abs();
    (days + 29) / 30
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case(PRESENT) {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("01/{text}"), "%d/%m/%Y") {
        return Some(date);
    }
    if text.len() == 4 {
        if let Ok(year) = text.parse::<i32>() {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }
    None
}

fn text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn flag(object: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Some(true),
            "no" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn entries<'a>(object: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn strings(object: &Map<String, Value>, key: &str) -> Vec<String> {
    entries(object, key)
        .iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(inner) => text(inner, &["name"]),
            _ => None,
        })
        .collect()
}

fn skills(object: &Map<String, Value>) -> Vec<Skill> {
    entries(object, "skills")
        .iter()
        .filter_map(|item| match item {
            Value::String(name) if !name.trim().is_empty() => Some(Skill {
                name: name.trim().to_string(),
                proficiency: DEFAULT_PROFICIENCY.to_string(),
                years_used: 1.0,
            }),
            Value::Object(inner) => Some(Skill {
                name: text(inner, &["name", "skillName"])?,
                proficiency: text(inner, &["proficiency", "level"])
                    .unwrap_or_else(|| DEFAULT_PROFICIENCY.to_string()),
                years_used: number(inner, &["yearsUsed", "years"]).unwrap_or(1.0),
            }),
            _ => None,
        })
        .collect()
}

fn work_experience(object: &Map<String, Value>) -> Vec<WorkExperience> {
    entries(object, "workExperience")
        .iter()
        .filter_map(Value::as_object)
        .map(|inner| {
            let end_date = text(inner, &["endDate", "to"]);
            let is_current = flag(inner, &["isCurrent", "current"]).unwrap_or(false)
                || end_date
                    .as_deref()
                    .is_some_and(|end| end.eq_ignore_ascii_case(PRESENT));
            WorkExperience {
                title: text(inner, &["title", "jobTitle", "position"]).unwrap_or_default(),
                company: text(inner, &["company", "companyName", "employer"]).unwrap_or_default(),
                start_date: text(inner, &["startDate", "from"]).unwrap_or_default(),
                end_date: match end_date {
                    Some(end) if !is_current => end,
                    _ if is_current => PRESENT.to_string(),
                    _ => String::new(),
                },
                description: text(inner, &["description", "responsibilities"]).unwrap_or_default(),
                is_current,
            }
        })
        .filter(|exp| !exp.title.is_empty() || !exp.company.is_empty())
        .collect()
}

fn education(object: &Map<String, Value>) -> Vec<Education> {
    entries(object, "education")
        .iter()
        .filter_map(Value::as_object)
        .map(|inner| Education {
            degree: text(inner, &["degree", "degreeType"]).unwrap_or_default(),
            field: text(inner, &["field", "major", "fieldOfStudy"]).unwrap_or_default(),
            institution: text(inner, &["institution", "school", "university"]).unwrap_or_default(),
            graduation_year: text(inner, &["graduationYear", "year"]).unwrap_or_default(),
            gpa: text(inner, &["gpa"]).unwrap_or_default(),
        })
        .filter(|edu| !edu.institution.is_empty() || !edu.degree.is_empty())
        .collect()
}

fn answers(object: &Map<String, Value>) -> ApplicationAnswers {
    ApplicationAnswers {
        work_authorization: text(object, &["workAuthorization", "workAuthorizationStatus"]),
        requires_sponsorship: flag(object, &["requiresSponsorship", "needsSponsorship"]),
        gender: text(object, &["gender"]),
        ethnicity: text(object, &["ethnicity"]),
        veteran_status: text(object, &["veteranStatus"]),
        disability_status: text(object, &["disabilityStatus"]),
        salary_expectation: text(object, &["salaryExpectation", "expectedSalary"]),
        available_start_date: text(object, &["availableStartDate", "startDate"]),
        cover_letter: text(object, &["coverLetter"]),
    }
}

fn resume(object: &Map<String, Value>) -> Option<ResumeAttachment> {
    let inner = object.get("resume")?.as_object()?;
    Some(ResumeAttachment {
        file_name: text(inner, &["fileName", "name"]).unwrap_or_else(|| "resume.pdf".to_string()),
        mime_type: text(inner, &["mimeType", "type"])
            .unwrap_or_else(|| DEFAULT_RESUME_MIME.to_string()),
        content_base64: text(inner, &["content", "data", "base64"])?,
    })
}

fn degree_rank(degree: &str) -> u8 {
    let degree = degree.to_ascii_lowercase();
    const RANKS: &[(&str, u8)] = &[
        ("phd", 6),
        ("ph.d", 6),
        ("doctor", 6),
        ("master", 5),
        ("mba", 5),
        ("bachelor", 4),
        ("associate", 3),
        ("high school", 2),
        ("diploma", 2),
        ("certificate", 1),
    ];
    RANKS
        .iter()
        .filter(|(needle, _)| degree.contains(needle))
        .map(|(_, rank)| *rank)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn aliases_settle_on_one_layout() {
        let raw = json!({
            "id": 7,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "currentTitle": "Staff Engineer",
            "skills": ["Rust", {"skillName": "Go", "level": "expert", "years": 4}, {"level": "x"}],
            "workExperience": [
                {"jobTitle": "Senior Platform Engineer", "companyName": "Acme", "from": "2020-01-01", "to": "2022-01-01"},
                {"title": "", "company": ""}
            ],
            "education": [{"school": "MIT", "degreeType": "BSc", "fieldOfStudy": "Mathematics", "year": 2015}],
            "requiresSponsorship": "no",
            "expectedSalary": 150000
        });
        let snapshot = UserProfileSnapshot::from_raw(&raw, now()).unwrap();

        assert_eq!(snapshot.user_id.as_deref(), Some("7"));
        assert_eq!(snapshot.professional_title.as_deref(), Some("Staff Engineer"));
        assert_eq!(
            snapshot.skills,
            vec![
                Skill { name: "Rust".into(), proficiency: "intermediate".into(), years_used: 1.0 },
                Skill { name: "Go".into(), proficiency: "expert".into(), years_used: 4.0 },
            ]
        );
        assert_eq!(snapshot.work_experience.len(), 1);
        assert_eq!(snapshot.work_experience[0].company, "Acme");
        assert_eq!(snapshot.education[0].institution, "MIT");
        assert_eq!(snapshot.education[0].field, "Mathematics");
        assert_eq!(snapshot.education[0].graduation_year, "2015");
        assert_eq!(snapshot.answers.requires_sponsorship, Some(false));
        assert_eq!(snapshot.answers.salary_expectation.as_deref(), Some("150000"));
        assert_eq!(snapshot.content_hash.len(), 64);
    }

    #[test]
    fn keyword_index_and_years_are_derived() {
        let raw = json!({
            "skills": ["Rust", "rust"],
            "tools": ["Docker"],
            "certifications": ["CKA"],
            "workExperience": [
                {"title": "Senior Platform Engineer", "company": "Acme", "startDate": "2020-01-01", "endDate": "2022-01-01"},
                {"title": "Dev", "company": "Initech", "startDate": "2023-06", "isCurrent": true}
            ]
        });
        let snapshot = UserProfileSnapshot::from_raw(&raw, now()).unwrap();
        assert_eq!(
            snapshot.keyword_index,
            vec!["cka", "docker", "engineer", "platform", "rust", "senior"]
        );
        // 731 days -> 25 months; 366 days -> 13 months.
        assert_eq!(snapshot.years_experience, 3.2);
        assert_eq!(snapshot.work_experience[1].end_date, "Present");
    }

    #[test]
    fn declared_years_win_over_history() {
        let raw = json!({"yearsExperience": "6.5", "workExperience": []});
        let snapshot = UserProfileSnapshot::from_raw(&raw, now()).unwrap();
        assert_eq!(snapshot.years_experience, 6.5);
    }

    #[test]
    fn hash_ignores_contact_details() {
        let a = UserProfileSnapshot::from_raw(&json!({"email": "a@x.io", "skills": ["Rust"]}), now())
            .unwrap();
        let b = UserProfileSnapshot::from_raw(&json!({"email": "b@x.io", "skills": ["Rust"]}), now())
            .unwrap();
        let c = UserProfileSnapshot::from_raw(&json!({"email": "a@x.io", "skills": ["Go"]}), now())
            .unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
    }

    #[test]
    fn signed_out_payloads_are_rejected() {
        let err = UserProfileSnapshot::from_raw(&json!({"authenticated": false}), now()).unwrap_err();
        assert!(matches!(err, ProfileError::NotAuthenticated));
        assert!(UserProfileSnapshot::from_raw(&json!([1, 2]), now()).is_err());
    }
}
