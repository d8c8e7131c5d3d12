//! Catalog loading with graceful degradation.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::builtin::{fallback_generic, BUNDLED_CATALOG};
use crate::errors::RegistryError;
use crate::model::CatalogDocument;

/// Where the active catalog came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogOrigin {
    Bundled,
    File(PathBuf),
    /// Nothing could be read; keyword-only generic rules are in use.
    Fallback,
}

pub fn parse_catalog_str(raw: &str) -> Result<CatalogDocument, RegistryError> {
    let document: CatalogDocument = match serde_json::from_str(raw) {
        Ok(document) => document,
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            RegistryError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        })?,
    };
    validate(&document)?;
    Ok(document)
}

pub fn load_catalog_from_reader<R: Read>(mut reader: R) -> Result<CatalogDocument, RegistryError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    parse_catalog_str(&buf)
}

pub fn load_catalog_from_path(path: impl AsRef<Path>) -> Result<CatalogDocument, RegistryError> {
    let file = File::open(path.as_ref())?;
    load_catalog_from_reader(file)
}

fn validate(document: &CatalogDocument) -> Result<(), RegistryError> {
    for (idx, platform) in document.platforms.iter().enumerate() {
        if platform.identifier.trim().is_empty() {
            return Err(RegistryError::Invalid(format!(
                "platform #{idx} has an empty identifier"
            )));
        }
        if platform.identifier.eq_ignore_ascii_case("generic") {
            return Err(RegistryError::Invalid(
                "'generic' is reserved for the fallback rule set".to_string(),
            ));
        }
    }
    Ok(())
}

/// Resolve the catalog: explicit override file, else the bundled document,
/// else the compiled-in generic set. Each failure degrades one level.
pub fn resolve_catalog(
    override_path: Option<&Path>,
) -> Result<(CatalogDocument, CatalogOrigin), RegistryError> {
    if let Some(path) = override_path {
        match load_catalog_from_path(path) {
            Ok(document) => {
                info!(path = %path.display(), platforms = document.platforms.len(), "catalog loaded");
                return Ok((document, CatalogOrigin::File(path.to_path_buf())));
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "catalog override unreadable; using bundled catalog");
            }
        }
    }
    resolve_from_str(BUNDLED_CATALOG, CatalogOrigin::Bundled)
}

/// Parse `raw`, degrading to the fallback generic set on failure.
pub fn resolve_from_str(
    raw: &str,
    origin: CatalogOrigin,
) -> Result<(CatalogDocument, CatalogOrigin), RegistryError> {
    match parse_catalog_str(raw) {
        Ok(document) if !document.generic.field_patterns.is_empty() => Ok((document, origin)),
        Ok(mut document) => {
            warn!("catalog carries no generic rules; merging fallback generic set");
            document.generic.field_patterns = fallback_generic().field_patterns;
            Ok((document, origin))
        }
        Err(err) => {
            warn!(error = %err, "catalog unreadable; degrading to generic detection");
            let generic = fallback_generic();
            if generic.field_patterns.is_empty() {
                return Err(RegistryError::ConfigurationUnavailable(err.to_string()));
            }
            Ok((
                CatalogDocument {
                    version: 1,
                    platforms: Vec::new(),
                    generic,
                },
                CatalogOrigin::Fallback,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_parses() {
        let document = parse_catalog_str(BUNDLED_CATALOG).unwrap();
        let ids: Vec<_> = document.platforms.iter().map(|p| p.identifier.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "greenhouse",
                "workday",
                "lever",
                "ashby",
                "smartrecruiters",
                "icims",
                "jobvite",
                "linkedin"
            ]
        );
        assert!(document.generic.success_phrases.len() >= 7);
    }

    #[test]
    fn yaml_documents_are_accepted() {
        let raw = r##"
platforms:
  - identifier: acme
    urlPatterns: ["*://careers.acme.test/*"]
    fieldPatterns:
      firstName:
        cssExpressions: ["#fn"]
generic:
  fieldPatterns:
    email:
      keywordList: [email]
"##;
        let document = parse_catalog_str(raw).unwrap();
        let acme = &document.platforms[0];
        assert_eq!(
            acme.pattern(formpilot_core_types::SemanticFieldType::FirstName)
                .unwrap()
                .css_expressions,
            vec!["#fn"]
        );
    }

    #[test]
    fn garbage_degrades_to_fallback() {
        let (document, origin) = resolve_from_str("{not json", CatalogOrigin::Bundled).unwrap();
        assert_eq!(origin, CatalogOrigin::Fallback);
        assert!(document.platforms.is_empty());
        assert!(!document.generic.field_patterns.is_empty());
    }

    #[test]
    fn reserved_identifier_is_rejected() {
        let err = parse_catalog_str(r#"{"platforms":[{"identifier":"generic"}]}"#).unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)));
    }
}
