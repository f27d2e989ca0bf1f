// ABOUTME: Validated container name or ID as accepted by Docker and Podman.
// ABOUTME: Derives artifact, image, and compose project names from it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerNameError {
    #[error("container name cannot be empty")]
    Empty,

    #[error("container name exceeds maximum length of 253 characters")]
    TooLong,

    #[error("container name must start with a letter or digit")]
    InvalidStart,

    #[error("invalid character in container name: '{0}'")]
    InvalidChar(char),
}

/// A container reference: either a name (`[a-zA-Z0-9][a-zA-Z0-9_.-]*`) or
/// a hexadecimal ID, which satisfies the same grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn new(value: &str) -> Result<Self, ContainerNameError> {
        // Runtimes report names with a leading slash
        let value = value.strip_prefix('/').unwrap_or(value);

        let first = value.chars().next().ok_or(ContainerNameError::Empty)?;

        if value.len() > 253 {
            return Err(ContainerNameError::TooLong);
        }

        if !first.is_ascii_alphanumeric() {
            return Err(ContainerNameError::InvalidStart);
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '.' && c != '-' {
                return Err(ContainerNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the volume archive, `<container>-volumes.tar.gz`.
    pub fn archive_file(&self) -> String {
        format!("{}-volumes.tar.gz", self.0)
    }

    /// File name of the compose document, `<container>.compose.yml`.
    pub fn compose_file(&self) -> String {
        format!("{}.compose.yml", self.0)
    }

    /// File name of the null-delimited volume path list handed to the helper.
    pub fn volume_list_file(&self) -> String {
        format!("{}-volumes.list", self.0)
    }

    /// File name of the confirmation checkpoint.
    pub fn checkpoint_file(&self) -> String {
        format!("{}.checkpoint.json", self.0)
    }

    /// Repository name usable in an image reference (lowercase only).
    pub fn as_image_name(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Compose project name: lowercase letters, digits, `-` and `_`.
    pub fn compose_project(&self) -> String {
        self.0
            .chars()
            .map(|c| match c {
                '.' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect()
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ContainerName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContainerName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContainerName::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_runtime_slash_prefix() {
        let name = ContainerName::new("/web").unwrap();
        assert_eq!(name.as_str(), "web");
    }

    #[test]
    fn artifact_names_follow_container() {
        let name = ContainerName::new("web").unwrap();
        assert_eq!(name.archive_file(), "web-volumes.tar.gz");
        assert_eq!(name.compose_file(), "web.compose.yml");
        assert_eq!(name.checkpoint_file(), "web.checkpoint.json");
    }

    #[test]
    fn compose_project_is_lowercase_without_dots() {
        let name = ContainerName::new("My.App_1").unwrap();
        assert_eq!(name.compose_project(), "my-app_1");
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert!(matches!(
            ContainerName::new("web;rm"),
            Err(ContainerNameError::InvalidChar(';'))
        ));
        assert!(matches!(
            ContainerName::new("-web"),
            Err(ContainerNameError::InvalidStart)
        ));
        assert!(matches!(ContainerName::new(""), Err(ContainerNameError::Empty)));
    }
}
