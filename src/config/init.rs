// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates hoist.yml template files.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{ImageRef, ServiceName};

use super::{CONFIG_FILENAME, Config};

/// Write a starter `hoist.yml` into `dir`. Returns the path written.
pub fn init_config(
    dir: &Path,
    service: Option<&str>,
    image: Option<&str>,
    force: bool,
) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(s) = service {
        config.service = ServiceName::new(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    if let Some(i) = image {
        config.image = ImageRef::parse(i).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(config_path)
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"service: {service}
image: {image}
build:
  context: .
  recipe: Dockerfile
  tool: docker
registry:
  username: {{ env: REGISTRY_USER }}
  password: {{ env: REGISTRY_TOKEN }}
target:
  kind: local
  # kind: remote
  # server: deploy@server.example.com:22
ports: ["80:80"]
verify:
  path: /
  timeout: 10s
  interval: 1s
# promote: latest
# trigger:
#   branches: [main]
"#,
        service = config.service,
        image = config.image,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), Some("web"), Some("ghcr.io/acme/web"), false).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.service.as_str(), "web");
        assert_eq!(config.image.registry(), Some("ghcr.io"));
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, None, false).unwrap();
        assert!(matches!(
            init_config(dir.path(), None, None, false),
            Err(Error::AlreadyExists(_))
        ));
        init_config(dir.path(), None, None, true).unwrap();
    }
}
