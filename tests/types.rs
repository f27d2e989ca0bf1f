// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests parsing, validation, commit naming and derived artifact names.

use ferry::types::*;
use proptest::prelude::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_simple_name() {
        let img = ImageRef::parse("nginx").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("latest"));
        assert!(img.registry().is_none());
        assert!(img.digest().is_none());
    }

    #[test]
    fn parse_name_with_tag() {
        let img = ImageRef::parse("nginx:1.25").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("1.25"));
    }

    #[test]
    fn parse_with_registry() {
        let img = ImageRef::parse("registry.example.com/myapp:v1.2.3").unwrap();
        assert_eq!(img.registry(), Some("registry.example.com"));
        assert_eq!(img.name(), "myapp");
        assert_eq!(img.tag(), Some("v1.2.3"));
    }

    #[test]
    fn parse_with_org() {
        let img = ImageRef::parse("ghcr.io/org/repo:latest").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "org/repo");
        assert_eq!(img.tag(), Some("latest"));
    }

    #[test]
    fn parse_with_digest() {
        let digest = "sha256:abc123def456";
        let img = ImageRef::parse(&format!("nginx@{}", digest)).unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.digest(), Some(digest));
        assert!(img.tag().is_none());
    }

    #[test]
    fn parse_full_reference() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1@sha256:abc123").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "org/repo");
        assert_eq!(img.tag(), Some("v1"));
        assert_eq!(img.digest(), Some("sha256:abc123"));
    }

    #[test]
    fn parse_empty_returns_error() {
        assert!(ImageRef::parse("").is_err());
    }

    #[test]
    fn parse_invalid_chars_returns_error() {
        assert!(ImageRef::parse("invalid image!").is_err());
    }

    #[test]
    fn display_formats_correctly() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1").unwrap();
        assert_eq!(img.to_string(), "ghcr.io/org/repo:v1");
    }
}

mod commit_target_tests {
    use super::*;

    fn web() -> ContainerName {
        ContainerName::new("web").unwrap()
    }

    #[test]
    fn untagged_image_gets_latest() {
        assert_eq!(ImageRef::commit_target("web", &web()).to_string(), "web:latest");
    }

    #[test]
    fn tag_and_registry_are_kept() {
        let target = ImageRef::commit_target("registry.example.com/team/web:2.1", &web());
        assert_eq!(target.to_string(), "registry.example.com/team/web:2.1");
    }

    #[test]
    fn digest_pin_is_dropped() {
        let target = ImageRef::commit_target("nginx@sha256:abc123", &web());
        assert_eq!(target.to_string(), "nginx:latest");
        assert!(target.digest().is_none());
    }

    #[test]
    fn bare_image_id_falls_back_to_container_name() {
        let name = ContainerName::new("Web_1").unwrap();
        let target = ImageRef::commit_target("sha256:4f2a9c1d7e3b", &name);
        assert_eq!(target.to_string(), "web_1:latest");
    }
}

mod container_name_tests {
    use super::*;

    #[test]
    fn accepts_dots_underscores_and_hex_ids() {
        assert!(ContainerName::new("my_app.v2-blue").is_ok());
        assert!(ContainerName::new("4f2a9c1d7e3b").is_ok());
    }

    #[test]
    fn too_long_returns_error() {
        let long = "a".repeat(254);
        assert!(matches!(
            ContainerName::new(&long),
            Err(ContainerNameError::TooLong)
        ));
    }

    #[test]
    fn serde_round_trip_validates() {
        let name: ContainerName = serde_json::from_str("\"web\"").unwrap();
        assert_eq!(name.as_str(), "web");
        assert!(serde_json::from_str::<ContainerName>("\"web db\"").is_err());
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn container_id_stores_value() {
        let id = ContainerId::new("abc123".to_string());
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn image_id_stores_value() {
        let id = ImageId::new("sha256:abc".to_string());
        assert_eq!(id.as_str(), "sha256:abc");
    }

    #[test]
    fn short_form_is_twelve_chars() {
        let id = ContainerId::new("4f2a9c1d7e3b55667788");
        assert_eq!(id.short(), "4f2a9c1d7e3b");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }
}

proptest! {
    #[test]
    fn valid_names_yield_safe_artifact_names(name in "[a-zA-Z0-9][a-zA-Z0-9_.-]{0,40}") {
        let container = ContainerName::new(&name).unwrap();
        for file in [container.archive_file(), container.compose_file(), container.checkpoint_file()] {
            prop_assert!(file.starts_with(&name));
            prop_assert!(!file.contains('/'));
        }
        let project = container.compose_project();
        prop_assert!(project.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
    }

    #[test]
    fn commit_target_always_has_a_tag(name in "[a-z][a-z0-9]{0,15}", tag in proptest::option::of("[a-z0-9][a-z0-9.]{0,8}")) {
        let configured = match &tag {
            Some(t) => format!("{name}:{t}"),
            None => name.clone(),
        };
        let container = ContainerName::new("web").unwrap();
        let target = ImageRef::commit_target(&configured, &container);
        prop_assert_eq!(target.name(), name.as_str());
        prop_assert_eq!(target.tag(), Some(tag.as_deref().unwrap_or("latest")));
    }
}
