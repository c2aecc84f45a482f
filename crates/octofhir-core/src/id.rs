//! FHIR resource identifiers (`Type/id/_history/version`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

const HISTORY_SEGMENT: &str = "_history";

static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").expect("static id pattern is valid")
});

/// Validates a logical id against the FHIR `id` datatype syntax.
pub fn validate_id(id: &str) -> Result<()> {
    if ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(CoreError::invalid_id(id))
    }
}

/// A resource identifier made of an optional type, logical id and version.
///
/// Any part may be absent: a freshly built resource has no id at all, a
/// client-supplied id usually has no version, and every identifier returned
/// by the store carries all three.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdType {
    #[serde(rename = "resourceType", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(rename = "idPart", skip_serializing_if = "Option::is_none")]
    pub id_part: Option<String>,
    #[serde(rename = "versionIdPart", skip_serializing_if = "Option::is_none")]
    pub version_id_part: Option<String>,
}

impl IdType {
    pub fn new(
        resource_type: impl Into<String>,
        id_part: impl Into<String>,
        version_id_part: Option<String>,
    ) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            id_part: Some(id_part.into()),
            version_id_part,
        }
    }

    /// Builds a fully qualified identifier with a numeric version.
    pub fn versioned(resource_type: impl Into<String>, id_part: impl Into<String>, version: i64) -> Self {
        Self::new(resource_type, id_part, Some(version.to_string()))
    }

    /// Parses `id`, `Type/id`, `Type/id/_history/v` or an absolute URL ending in those.
    pub fn parse(value: &str) -> Self {
        let segments: Vec<&str> = value
            .trim()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let (path, version_id_part) = match segments.iter().rposition(|s| *s == HISTORY_SEGMENT) {
            Some(pos) => (&segments[..pos], segments.get(pos + 1).map(|v| v.to_string())),
            None => (&segments[..], None),
        };

        let id_part = path.last().map(|s| s.to_string());
        let resource_type = if path.len() >= 2 {
            Some(path[path.len() - 2].to_string())
        } else {
            None
        };

        Self {
            resource_type,
            id_part,
            version_id_part,
        }
    }

    pub fn id_part(&self) -> Option<&str> {
        self.id_part.as_deref().filter(|s| !s.is_empty())
    }

    pub fn version_id_part(&self) -> Option<&str> {
        self.version_id_part.as_deref().filter(|s| !s.is_empty())
    }

    pub fn has_id_part(&self) -> bool {
        self.id_part().is_some()
    }

    pub fn has_version_id_part(&self) -> bool {
        self.version_id_part().is_some()
    }

    pub fn version_id_part_as_long(&self) -> Result<i64> {
        let version = self
            .version_id_part()
            .ok_or_else(|| CoreError::invalid_id(format!("{self} has no version")))?;
        version
            .parse::<i64>()
            .map_err(|_| CoreError::invalid_id(format!("{self}: version '{version}' is not numeric")))
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version_id_part: Some(version.into()),
            ..self.clone()
        }
    }

    pub fn with_resource_type(&self, resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            ..self.clone()
        }
    }

    pub fn to_versionless(&self) -> Self {
        Self {
            version_id_part: None,
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.has_id_part() && !self.has_version_id_part()
    }

    /// Renders the identifier the same way [`fmt::Display`] does.
    pub fn value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut part = |f: &mut fmt::Formatter<'_>, value: &str| -> fmt::Result {
            if !first {
                f.write_str("/")?;
            }
            first = false;
            f.write_str(value)
        };

        if let Some(resource_type) = self.resource_type.as_deref().filter(|s| !s.is_empty()) {
            part(f, resource_type)?;
        }
        if let Some(id) = self.id_part() {
            part(f, id)?;
        }
        if let Some(version) = self.version_id_part() {
            part(f, HISTORY_SEGMENT)?;
            part(f, version)?;
        }
        Ok(())
    }
}

impl FromStr for IdType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let id = IdType::parse(s);
        if let Some(id_part) = id.id_part() {
            validate_id(id_part)?;
        }
        Ok(id)
    }
}
