use std::fmt;

use octofhir_core::{CoreError, IdType};

/// Key of the history map: one version of one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionedKey {
    id_part: String,
    version: i64,
}

impl VersionedKey {
    pub fn new(id_part: impl Into<String>, version: i64) -> Self {
        Self {
            id_part: id_part.into(),
            version,
        }
    }

    pub fn id_part(&self) -> &str {
        &self.id_part
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn to_id(&self, resource_type: &str) -> IdType {
        IdType::versioned(resource_type, &self.id_part, self.version)
    }
}

impl TryFrom<&IdType> for VersionedKey {
    type Error = CoreError;

    fn try_from(id: &IdType) -> Result<Self, Self::Error> {
        let id_part = id
            .id_part()
            .ok_or_else(|| CoreError::invalid_id(format!("{id} has no id part")))?;
        let version = id.version_id_part_as_long()?;
        Ok(Self::new(id_part, version))
    }
}

impl fmt::Display for VersionedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/_history/{}", self.id_part, self.version)
    }
}
