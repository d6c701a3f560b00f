//! Schema-version parsing and the compatibility gate.
//!
//! Mapping documents carry a `"major.minor"` version string. Only the major
//! component gates loading: a new minor may add mappings, but a new major may
//! change the meaning of existing ones, so code and documents upgrade majors
//! together.

use std::fmt;
use std::str::FromStr;

use crate::error::MappingError;

/// The mapping-document major version this build consumes.
pub const SUPPORTED_SCHEMA_MAJOR: u32 = 1;

/// Parsed `"major.minor"` version of a mapping document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    #[must_use]
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Fail unless this version's major equals [`SUPPORTED_SCHEMA_MAJOR`].
    ///
    /// # Errors
    ///
    /// Returns `MappingError::IncompatibleVersion` for any other major,
    /// below or above the supported one.
    pub fn ensure_supported(self) -> Result<(), MappingError> {
        if self.major == SUPPORTED_SCHEMA_MAJOR {
            Ok(())
        } else {
            Err(MappingError::IncompatibleVersion {
                found: self,
                supported: SUPPORTED_SCHEMA_MAJOR,
            })
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for SchemaVersion {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((major, minor)) = s.split_once('.') else {
            return Err(MappingError::invalid(format!(
                "schemaVersion `{s}` is not in major.minor form"
            )));
        };
        let major = major.parse().map_err(|_| {
            MappingError::invalid(format!("schemaVersion `{s}` has a non-numeric major"))
        })?;
        let minor = minor.parse().map_err(|_| {
            MappingError::invalid(format!("schemaVersion `{s}` has a non-numeric minor"))
        })?;
        Ok(Self { major, minor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor() {
        let version: SchemaVersion = "1.0".parse().unwrap();
        assert_eq!(version, SchemaVersion::new(1, 0));
        assert_eq!(version.to_string(), "1.0");
    }

    #[test]
    fn rejects_missing_separator() {
        assert!("1".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn rejects_extra_components() {
        // "1.2.3" splits into major "1" and minor "2.3"; the minor fails to parse.
        assert!("1.2.3".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn rejects_non_numeric_parts() {
        assert!("one.0".parse::<SchemaVersion>().is_err());
        assert!("1.zero".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn same_major_any_minor_is_supported() {
        assert!(SchemaVersion::new(SUPPORTED_SCHEMA_MAJOR, 0).ensure_supported().is_ok());
        assert!(SchemaVersion::new(SUPPORTED_SCHEMA_MAJOR, 42).ensure_supported().is_ok());
    }

    #[test]
    fn other_majors_are_rejected() {
        let above = SchemaVersion::new(SUPPORTED_SCHEMA_MAJOR + 1, 0);
        let below = SchemaVersion::new(SUPPORTED_SCHEMA_MAJOR.wrapping_sub(1), 9);
        assert!(matches!(
            above.ensure_supported(),
            Err(MappingError::IncompatibleVersion { .. })
        ));
        assert!(matches!(
            below.ensure_supported(),
            Err(MappingError::IncompatibleVersion { .. })
        ));
    }
}
