// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, env var interpolation, discovery and job graph checks.

use hoist::config::*;
use hoist::error::Error;
use hoist::pipeline::{DefinitionError, JobKind};
use hoist::runtime::{PortMapping, RuntimeType};
use std::time::Duration;

const FULL: &str = r#"
service: web
image: registry.example.com/acme/web
build:
  context: site
  recipe: docker/Dockerfile
  tool: podman
  args:
    VERSION: "1.2"
    TOKEN: { env: HOIST_TEST_BUILD_TOKEN, default: none }
  timeout: 10m
registry:
  host: registry.example.com
  username: { env: HOIST_TEST_REGISTRY_USER }
  password: { env: HOIST_TEST_REGISTRY_TOKEN }
target:
  kind: remote
  server: deploy@web1.example.com:2222
  runtime: podman
  socket: /run/podman/podman.sock
ports: ["8080:80", 443]
verify:
  path: /healthz
  port: 8080
  timeout: 30s
  interval: 500ms
retry:
  attempts: 5
  base_delay: 1s
  max_delay: 10s
promote: latest
trigger:
  branches: [main, release/*]
"#;

mod parsing {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = Config::from_yaml(FULL).unwrap();

        assert_eq!(config.service.as_str(), "web");
        assert_eq!(config.build.tool, "podman");
        assert_eq!(config.build.timeout, Duration::from_secs(600));
        assert_eq!(config.target.kind, TargetKind::Remote);

        let server = config.target.server.as_ref().unwrap();
        assert_eq!(server.host, "web1.example.com");
        assert_eq!(server.port, 2222);
        assert_eq!(server.user.as_deref(), Some("deploy"));

        let runtime = config.target.runtime_config().unwrap();
        assert_eq!(runtime.runtime, Some(RuntimeType::Podman));

        assert_eq!(
            config.ports,
            vec![PortMapping::tcp(8080, 80), PortMapping::tcp(443, 443)]
        );
        assert_eq!(config.verify.interval, Duration::from_millis(500));
        assert_eq!(config.retry.policy().attempts, 5);
        assert_eq!(config.promote.as_deref(), Some("latest"));
    }

    #[test]
    fn standard_graph_includes_promote() {
        let config = Config::from_yaml(FULL).unwrap();
        let kinds: Vec<JobKind> = config.graph().unwrap().jobs().iter().map(|j| j.kind).collect();
        assert_eq!(
            kinds,
            [
                JobKind::Build,
                JobKind::Publish,
                JobKind::Promote,
                JobKind::Deploy,
                JobKind::Verify
            ]
        );
    }

    #[test]
    fn triggers_match_prefix_patterns() {
        let config = Config::from_yaml(FULL).unwrap();
        assert!(config.triggered_by(Some("main")));
        assert!(config.triggered_by(Some("release/2.0")));
        assert!(!config.triggered_by(Some("feature/x")));
    }

    #[test]
    fn empty_branch_list_is_rejected() {
        let yaml = "service: web\nimage: web\nports: [80]\ntrigger: { branches: [] }\n";
        assert!(matches!(Config::from_yaml(yaml), Err(Error::Yaml(_))));
    }

    #[test]
    fn invalid_service_name_is_rejected() {
        let yaml = "service: Web_App\nimage: web\n";
        assert!(Config::from_yaml(yaml).is_err());
    }
}

mod secrets {
    use super::*;

    #[test]
    fn credential_reads_from_environment() {
        temp_env::with_vars(
            [
                ("HOIST_TEST_REGISTRY_USER", Some("ci")),
                ("HOIST_TEST_REGISTRY_TOKEN", Some("s3cret")),
            ],
            || {
                let config = Config::from_yaml(FULL).unwrap();
                let credential = config.registry.credential(&config.image).unwrap();
                assert_eq!(credential.host(), "registry.example.com");
                assert_eq!(credential.username(), Some("ci"));
                assert!(!format!("{:?}", credential).contains("s3cret"));
            },
        );
    }

    #[test]
    fn missing_secret_fails_a_real_run() {
        temp_env::with_vars_unset(["HOIST_TEST_REGISTRY_USER", "HOIST_TEST_REGISTRY_TOKEN"], || {
            let config = Config::from_yaml(FULL).unwrap();
            assert!(matches!(
                config.registry.credential(&config.image),
                Err(Error::MissingEnvVar(var)) if var == "HOIST_TEST_REGISTRY_USER"
            ));

            let (credential, warning) = config
                .registry
                .credential_or_anonymous(&config.image)
                .unwrap();
            assert!(credential.is_anonymous());
            assert!(warning.is_some());
        });
    }

    #[test]
    fn build_args_fall_back_to_defaults() {
        temp_env::with_var_unset("HOIST_TEST_BUILD_TOKEN", || {
            let config = Config::from_yaml(FULL).unwrap();
            let args = resolve_env_map(&config.build.args).unwrap();
            assert_eq!(args["TOKEN"], "none");
            assert_eq!(args["VERSION"], "1.2");
        });
    }
}

mod jobs {
    use super::*;

    const BASE: &str = "service: web\nimage: registry.example.com/web\nports: ['80:80']\n";

    fn definition_error(jobs: &str) -> DefinitionError {
        match Config::from_yaml(&format!("{BASE}jobs:\n{jobs}")) {
            Err(Error::Definition(e)) => e,
            other => panic!("expected a definition error, got {other:?}"),
        }
    }

    #[test]
    fn custom_jobs_keep_declaration_order() {
        let yaml = format!(
            "{BASE}jobs:\n  image: {{ uses: build }}\n  ship: {{ uses: publish, needs: [image] }}\n  \
             run: {{ uses: deploy, needs: [ship] }}\n"
        );
        let config = Config::from_yaml(&yaml).unwrap();
        let ids: Vec<String> = config
            .graph()
            .unwrap()
            .jobs()
            .iter()
            .map(|j| j.id.to_string())
            .collect();
        assert_eq!(ids, ["image", "ship", "run"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let err = definition_error(
            "  a: { uses: build, needs: [b] }\n  b: { uses: build, needs: [a] }\n",
        );
        assert!(matches!(err, DefinitionError::Cycle(_)));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = definition_error("  a: { uses: lint }\n");
        assert!(matches!(err, DefinitionError::UnknownKind { .. }));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = definition_error("  a: { uses: build, needs: [ghost] }\n");
        assert!(matches!(err, DefinitionError::UnknownDependency { .. }));
    }

    #[test]
    fn verify_without_deploy_upstream_is_rejected() {
        let err = definition_error("  b: { uses: build }\n  v: { uses: verify, needs: [b] }\n");
        assert!(matches!(err, DefinitionError::MissingInput { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = definition_error("  a: { uses: build }\n  a: { uses: build }\n");
        assert!(matches!(err, DefinitionError::Duplicate(_)));
    }
}

mod discovery {
    use super::*;

    const MINIMAL: &str = "service: web\nimage: web\nports: [80]\n";

    #[test]
    fn prefers_hoist_yml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hoist.yaml"), MINIMAL).unwrap();
        std::fs::write(dir.path().join("hoist.yml"), MINIMAL).unwrap();
        assert_eq!(
            Config::locate(dir.path()).unwrap(),
            dir.path().join("hoist.yml")
        );
    }

    #[test]
    fn falls_back_to_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".hoist")).unwrap();
        std::fs::write(dir.path().join(".hoist/config.yml"), MINIMAL).unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.service.as_str(), "web");
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }
}
