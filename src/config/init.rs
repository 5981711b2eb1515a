// ABOUTME: Manifest scaffolding for new projects.
// ABOUTME: Creates a convoy.yml template file.

use std::path::Path;

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

const TEMPLATE: &str = r#"settings:
  # Serialize configuration init and read-back across units
  serialize_config: true
  digest_retry:
    attempts: 5
    delay: 2s

commands:
  status: ./scripts/status.sh {unit}
  build: docker build -t {image} {path}
  push: docker push {image}
  login: docker login {registry}
  apply: terraform -chdir={path} apply -auto-approve
  destroy: terraform -chdir={path} destroy -auto-approve

units:
  - id: network
    path: infra/network
    modules: [stack]
  - id: api
    path: services/api
    image: registry.example.com/acme/api
    depends_on: [network]
"#;

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    Ok(())
}
