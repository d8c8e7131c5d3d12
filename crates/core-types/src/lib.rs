//! Shared primitives for the formpilot engine crates.
//!
//! Everything here is deliberately small: field-type tags, the page-scoped
//! element handle and the value payloads handed to the injector.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Error raised when a field-type tag cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown field type: {0}")]
pub struct UnknownFieldType(pub String);

/// Semantic meaning of a form input, independent of its markup.
#[cfg_attr(
    feature = "serde-full",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum SemanticFieldType {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    Address,
    City,
    State,
    ZipCode,
    Country,
    Linkedin,
    Github,
    Portfolio,
    CurrentCompany,
    CurrentTitle,
    YearsExperience,
    School,
    Degree,
    Major,
    GraduationYear,
    ResumeFile,
    CoverLetter,
    WorkAuthorization,
    Sponsorship,
    Gender,
    Ethnicity,
    VeteranStatus,
    DisabilityStatus,
    SalaryExpectation,
    StartDate,
}

impl SemanticFieldType {
    /// Every field type, in the order a fill pass visits them.
    pub const ALL: [SemanticFieldType; 30] = [
        SemanticFieldType::FirstName,
        SemanticFieldType::LastName,
        SemanticFieldType::FullName,
        SemanticFieldType::Email,
        SemanticFieldType::Phone,
        SemanticFieldType::Address,
        SemanticFieldType::City,
        SemanticFieldType::State,
        SemanticFieldType::ZipCode,
        SemanticFieldType::Country,
        SemanticFieldType::Linkedin,
        SemanticFieldType::Github,
        SemanticFieldType::Portfolio,
        SemanticFieldType::CurrentCompany,
        SemanticFieldType::CurrentTitle,
        SemanticFieldType::YearsExperience,
        SemanticFieldType::School,
        SemanticFieldType::Degree,
        SemanticFieldType::Major,
        SemanticFieldType::GraduationYear,
        SemanticFieldType::ResumeFile,
        SemanticFieldType::CoverLetter,
        SemanticFieldType::WorkAuthorization,
        SemanticFieldType::Sponsorship,
        SemanticFieldType::Gender,
        SemanticFieldType::Ethnicity,
        SemanticFieldType::VeteranStatus,
        SemanticFieldType::DisabilityStatus,
        SemanticFieldType::SalaryExpectation,
        SemanticFieldType::StartDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticFieldType::FirstName => "first_name",
            SemanticFieldType::LastName => "last_name",
            SemanticFieldType::FullName => "full_name",
            SemanticFieldType::Email => "email",
            SemanticFieldType::Phone => "phone",
            SemanticFieldType::Address => "address",
            SemanticFieldType::City => "city",
            SemanticFieldType::State => "state",
            SemanticFieldType::ZipCode => "zip_code",
            SemanticFieldType::Country => "country",
            SemanticFieldType::Linkedin => "linkedin",
            SemanticFieldType::Github => "github",
            SemanticFieldType::Portfolio => "portfolio",
            SemanticFieldType::CurrentCompany => "current_company",
            SemanticFieldType::CurrentTitle => "current_title",
            SemanticFieldType::YearsExperience => "years_experience",
            SemanticFieldType::School => "school",
            SemanticFieldType::Degree => "degree",
            SemanticFieldType::Major => "major",
            SemanticFieldType::GraduationYear => "graduation_year",
            SemanticFieldType::ResumeFile => "resume_file",
            SemanticFieldType::CoverLetter => "cover_letter",
            SemanticFieldType::WorkAuthorization => "work_authorization",
            SemanticFieldType::Sponsorship => "sponsorship",
            SemanticFieldType::Gender => "gender",
            SemanticFieldType::Ethnicity => "ethnicity",
            SemanticFieldType::VeteranStatus => "veteran_status",
            SemanticFieldType::DisabilityStatus => "disability_status",
            SemanticFieldType::SalaryExpectation => "salary_expectation",
            SemanticFieldType::StartDate => "start_date",
        }
    }

    /// Whether the field expects a file attachment rather than text.
    pub fn is_file(&self) -> bool {
        matches!(self, SemanticFieldType::ResumeFile)
    }

    /// Yes/no style questions usually rendered as radios, checkboxes or selects.
    pub fn is_boolean_like(&self) -> bool {
        matches!(
            self,
            SemanticFieldType::WorkAuthorization
                | SemanticFieldType::Sponsorship
                | SemanticFieldType::VeteranStatus
                | SemanticFieldType::DisabilityStatus
        )
    }
}

impl fmt::Display for SemanticFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticFieldType {
    type Err = UnknownFieldType;

    /// Accepts the snake_case tag as well as the camelCase spelling used by
    /// most ATS configuration documents (`firstName`, `zipCode`, ...).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-' && *ch != ' ')
            .flat_map(char::to_lowercase)
            .collect();
        let found = SemanticFieldType::ALL.iter().find(|field| {
            field.as_str().replace('_', "") == normalized
        });
        if let Some(field) = found {
            return Ok(*field);
        }
        let alias = match normalized.as_str() {
            "name" | "fullname" => Some(SemanticFieldType::FullName),
            "resume" | "cv" => Some(SemanticFieldType::ResumeFile),
            "zip" | "postalcode" | "zipcode" => Some(SemanticFieldType::ZipCode),
            "company" => Some(SemanticFieldType::CurrentCompany),
            "title" | "jobtitle" => Some(SemanticFieldType::CurrentTitle),
            "authorized" | "workauth" => Some(SemanticFieldType::WorkAuthorization),
            "veteran" => Some(SemanticFieldType::VeteranStatus),
            "disability" => Some(SemanticFieldType::DisabilityStatus),
            "website" => Some(SemanticFieldType::Portfolio),
            "university" => Some(SemanticFieldType::School),
            _ => None,
        };
        alias.ok_or_else(|| UnknownFieldType(raw.to_string()))
    }
}

/// Identity of one page load. A navigation that replaces the document gets a
/// fresh id, which invalidates every handle minted for the previous one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PageLoadId(pub u64);

impl fmt::Display for PageLoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load-{}", self.0)
    }
}

/// Non-owning reference to an element of the current page load.
///
/// This is an index into a page-scoped table, not the element itself; it is
/// intentionally not serializable and must not outlive the load it came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ElementHandle {
    load: u64,
    slot: u32,
}

impl ElementHandle {
    pub fn new(load: PageLoadId, slot: u32) -> Self {
        Self { load: load.0, slot }
    }

    pub fn load(&self) -> PageLoadId {
        PageLoadId(self.load)
    }

    /// Position in the page table.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn belongs_to(&self, load: PageLoadId) -> bool {
        self.load == load.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load-{}#{}", self.load, self.slot)
    }
}

/// File payload assigned to `<input type="file">` controls.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilePayload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }
}

/// Value handed to the injector for one field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FillValue {
    Text(String),
    Flag(bool),
    File(FilePayload),
}

impl FillValue {
    /// Textual view used for text inputs, option matching and radio values.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FillValue::Text(text) => Some(text.clone()),
            FillValue::Flag(flag) => Some(if *flag { "yes" } else { "no" }.to_string()),
            FillValue::File(_) => None,
        }
    }

    /// Boolean reading: `true`, or a case-insensitive "yes"/"true"/"1".
    pub fn is_truthy(&self) -> bool {
        match self {
            FillValue::Flag(flag) => *flag,
            FillValue::Text(text) => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "yes" | "true" | "1"
            ),
            FillValue::File(_) => false,
        }
    }
}

impl From<&str> for FillValue {
    fn from(value: &str) -> Self {
        FillValue::Text(value.to_string())
    }
}

impl From<String> for FillValue {
    fn from(value: String) -> Self {
        FillValue::Text(value)
    }
}

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        FillValue::Flag(value)
    }
}

impl From<FilePayload> for FillValue {
    fn from(value: FilePayload) -> Self {
        FillValue::File(value)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_parses_snake_and_camel_case() {
        assert_eq!(
            "first_name".parse::<SemanticFieldType>().unwrap(),
            SemanticFieldType::FirstName
        );
        assert_eq!(
            "firstName".parse::<SemanticFieldType>().unwrap(),
            SemanticFieldType::FirstName
        );
        assert_eq!(
            "resume".parse::<SemanticFieldType>().unwrap(),
            SemanticFieldType::ResumeFile
        );
        assert!("favourite_colour".parse::<SemanticFieldType>().is_err());
    }

    #[test]
    fn every_tag_round_trips_through_from_str() {
        for field in SemanticFieldType::ALL {
            assert_eq!(field.as_str().parse::<SemanticFieldType>().unwrap(), field);
        }
    }

    #[test]
    fn handle_is_scoped_to_its_load() {
        let handle = ElementHandle::new(PageLoadId(3), 7);
        assert!(handle.belongs_to(PageLoadId(3)));
        assert!(!handle.belongs_to(PageLoadId(4)));
        assert_eq!(handle.slot(), 7);
    }

    #[test]
    fn truthiness_follows_yes_true_one() {
        assert!(FillValue::from("Yes").is_truthy());
        assert!(FillValue::from("TRUE").is_truthy());
        assert!(FillValue::from(true).is_truthy());
        assert!(!FillValue::from("no").is_truthy());
        assert!(!FillValue::from("maybe").is_truthy());
    }
}
