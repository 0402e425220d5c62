// ABOUTME: Integration tests for validated domain types.
// ABOUTME: Tests image reference parsing, digests, artifact aliases and name rules.

use hoist::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_simple_name() {
        let img = ImageRef::parse("nginx").unwrap();
        assert_eq!(img.name(), "nginx");
        assert!(img.tag().is_none());
        assert!(img.registry().is_none());
        assert_eq!(img.tagged(), "nginx:latest");
    }

    #[test]
    fn parse_with_registry_and_org() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1.2.3").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "org/repo");
        assert_eq!(img.tag(), Some("v1.2.3"));
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let img = ImageRef::parse("localhost:5000/web").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "web");
        assert!(img.tag().is_none());
    }

    #[test]
    fn parse_full_reference() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1@sha256:abc123").unwrap();
        assert_eq!(img.tag(), Some("v1"));
        assert_eq!(img.digest().map(Digest::as_str), Some("sha256:abc123"));
        assert_eq!(img.to_string(), "ghcr.io/org/repo:v1@sha256:abc123");
    }

    #[test]
    fn with_digest_drops_the_tag() {
        let img = ImageRef::parse("registry.example.com/web:v1").unwrap();
        let pinned = img.with_digest(Digest::parse("sha:abc123").unwrap());
        assert_eq!(pinned.to_string(), "registry.example.com/web@sha:abc123");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ImageRef::parse("").is_err());
        assert!(ImageRef::parse("invalid image!").is_err());
        assert!(ImageRef::parse("web:-bad").is_err());
        assert!(ImageRef::parse("web@nocolon").is_err());
    }
}

mod digest_tests {
    use super::*;

    #[test]
    fn splits_algorithm_and_encoding() {
        let digest = Digest::parse("sha:abc123").unwrap();
        assert_eq!(digest.algorithm(), "sha");
        assert_eq!(digest.encoded(), "abc123");
    }

    #[test]
    fn rejects_malformed_digests() {
        assert_eq!(Digest::parse(""), Err(DigestError::Empty));
        assert!(matches!(Digest::parse("abc123"), Err(DigestError::MissingSeparator(_))));
        assert!(matches!(Digest::parse("SHA:abc"), Err(DigestError::InvalidAlgorithm(_))));
        assert!(matches!(Digest::parse("sha:"), Err(DigestError::InvalidEncoding(_))));
    }
}

mod artifact_tests {
    use super::*;

    fn artifact() -> ArtifactReference {
        let image = ImageRef::parse("registry.example.com/acme/web:ignored").unwrap();
        ArtifactReference::new(&image, "20240101", Digest::parse("sha:abc123").unwrap())
    }

    #[test]
    fn pinned_goes_by_digest() {
        assert_eq!(
            artifact().pinned().to_string(),
            "registry.example.com/acme/web@sha:abc123"
        );
    }

    #[test]
    fn tagged_goes_by_alias() {
        assert_eq!(
            artifact().tagged().to_string(),
            "registry.example.com/acme/web:20240101"
        );
    }

    #[test]
    fn retagging_keeps_the_digest() {
        let latest = artifact().retagged("latest");
        assert_eq!(latest.tag(), "latest");
        assert_eq!(latest.digest(), artifact().digest());
    }
}

mod name_tests {
    use super::*;

    #[test]
    fn service_names_follow_dns_label_rules() {
        assert!(ServiceName::new("my-service").is_ok());
        assert!(ServiceName::new(&"a".repeat(63)).is_ok());
        assert!(ServiceName::new("").is_err());
        assert!(ServiceName::new(&"a".repeat(64)).is_err());
        assert!(ServiceName::new("-service").is_err());
        assert!(ServiceName::new("MyService").is_err());
    }

    #[test]
    fn job_ids_allow_underscores() {
        assert!(JobId::new("deploy_staging").is_ok());
        assert_eq!(JobId::new("Deploy"), Err(JobIdError::InvalidChar('D')));
        assert_eq!(JobId::new(""), Err(JobIdError::Empty));
    }

    #[test]
    fn container_id_short_form() {
        let id = ContainerId::new("0123456789abcdef");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(id.noun(), "container");
    }
}
