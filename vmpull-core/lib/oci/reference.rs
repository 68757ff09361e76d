//! Parsing and representation of `repository:tag` image references.

use core::fmt;
use std::str::FromStr;

use crate::VmPullError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A reference to a VM image in a registry, e.g. `org/alpine-vm:latest`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct ImageReference {
    repository: String,
    tag: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageReference {
    /// The repository part of the reference, e.g. `org/alpine-vm`.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// The tag part of the reference, e.g. `latest`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The organization (first path segment) of the repository.
    pub fn organization(&self) -> &str {
        self.repository.split('/').next().unwrap_or(&self.repository)
    }

    fn parse(s: &str) -> Result<Self, VmPullError> {
        let mut parts = s.splitn(2, ':');
        let repository = parts.next().unwrap_or_default();
        let tag = parts.next();

        match tag {
            Some(tag) if !repository.is_empty() && !tag.is_empty() => Ok(ImageReference {
                repository: repository.to_string(),
                tag: tag.to_string(),
            }),
            _ => Err(VmPullError::InvalidImageFormat(s.to_string())),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for ImageReference {
    type Err = VmPullError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageReference::parse(s)
    }
}

impl TryFrom<String> for ImageReference {
    type Error = VmPullError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ImageReference::parse(&value)
    }
}

impl From<ImageReference> for String {
    fn from(reference: ImageReference) -> Self {
        format!("{}:{}", reference.repository, reference.tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repository_and_tag() {
        let reference: ImageReference = "org/alpine-vm:latest".parse().unwrap();
        assert_eq!(reference.repository(), "org/alpine-vm");
        assert_eq!(reference.tag(), "latest");
        assert_eq!(reference.organization(), "org");
    }

    #[test]
    fn rejects_missing_tag() {
        let err = "org/alpine-vm".parse::<ImageReference>().unwrap_err();
        assert!(matches!(err, VmPullError::InvalidImageFormat(_)));
    }

    #[test]
    fn rejects_empty_tag() {
        let err = "org/alpine-vm:".parse::<ImageReference>().unwrap_err();
        assert!(matches!(err, VmPullError::InvalidImageFormat(_)));
    }

    #[test]
    fn rejects_empty_repository() {
        let err = ":latest".parse::<ImageReference>().unwrap_err();
        assert!(matches!(err, VmPullError::InvalidImageFormat(_)));
    }

    #[test]
    fn splits_only_on_first_colon() {
        let reference: ImageReference = "org/app:1.0:extra".parse().unwrap();
        assert_eq!(reference.tag(), "1.0:extra");
    }

    #[test]
    fn display_round_trips_through_string() {
        let reference: ImageReference = "org/app:1.0".parse().unwrap();
        assert_eq!(reference.to_string(), "org/app:1.0");
    }
}
