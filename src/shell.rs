// ABOUTME: Collaborators backed by manifest command templates run through `sh -c`.
// ABOUTME: Renders {placeholders} per unit and interprets exit codes and output.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::collaborators::{
    BuildRequest, CollaboratorError, Collaborators, CommandOutput, CommandRunner, ConfigScope,
    ConfigStore, ImageClient, InfraClient, PushOutput, StackInputs, StatusProbe,
};
use crate::config::CommandTemplates;
use crate::hooks::shell_quote;
use crate::pipeline::Phase;
use crate::status::EnvironmentStatus;
use crate::types::{Digest, ImageRef};
use crate::unit::Unit;

/// Values substituted into a command template.
#[derive(Debug, Default)]
struct Placeholders {
    values: BTreeMap<&'static str, String>,
}

impl Placeholders {
    fn for_unit(unit: &Unit) -> Self {
        let mut values = BTreeMap::new();
        values.insert("unit", unit.id.to_string());
        values.insert("path", unit.path.to_string_lossy().into_owned());
        values.insert("version", unit.version.clone());
        if let Some(spec) = &unit.image {
            values.insert("image", spec.repository.with_tag(&unit.version).to_string());
        }
        Self { values }
    }

    fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Replace every known `{key}` with its shell-quoted value in a single
    /// scan. Substituted values are never scanned again; unknown keys stay as-is.
    fn render(&self, template: &str) -> String {
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let known = after
                .find('}')
                .and_then(|close| self.values.get(&after[..close]).map(|value| (close, value)));
            match known {
                Some((close, value)) => {
                    rendered.push_str(&shell_quote(value));
                    rest = &after[close + 1..];
                }
                None => {
                    rendered.push('{');
                    rest = after;
                }
            }
        }
        rendered.push_str(rest);
        rendered
    }
}

/// Implements every collaborator interface with command templates.
pub struct ShellCollaborators {
    templates: CommandTemplates,
    runner: Arc<dyn CommandRunner>,
}

impl ShellCollaborators {
    pub fn new(templates: CommandTemplates, runner: Arc<dyn CommandRunner>) -> Self {
        Self { templates, runner }
    }

    /// Bundle into the collaborator set a scheduler runs with.
    pub fn into_collaborators(self) -> Collaborators {
        let runner = self.runner.clone();
        let shell = Arc::new(self);
        Collaborators {
            probe: shell.clone(),
            config: shell.clone(),
            images: shell.clone(),
            infra: shell,
            runner,
        }
    }

    /// Run `template` for `unit`. A missing template succeeds without running anything.
    async fn exec(
        &self,
        template: Option<&str>,
        unit: &Unit,
        placeholders: Placeholders,
        env: &HashMap<String, String>,
    ) -> Result<Option<CommandOutput>, CollaboratorError> {
        let Some(template) = template else {
            return Ok(None);
        };
        let command = placeholders.render(template);
        self.runner.run(&unit.path, &command, env).await.map(Some)
    }

    /// Run a template whose only result is success or failure.
    async fn exec_checked(
        &self,
        operation: &'static str,
        template: Option<&str>,
        unit: &Unit,
        placeholders: Placeholders,
    ) -> Result<(), CollaboratorError> {
        match self.exec(template, unit, placeholders, &HashMap::new()).await? {
            Some(output) if !output.is_success() => Err(rejection(operation, &output)),
            _ => Ok(()),
        }
    }

    async fn exec_output(
        &self,
        template: Option<&str>,
        unit: &Unit,
        placeholders: Placeholders,
    ) -> Result<CommandOutput, CollaboratorError> {
        Ok(self
            .exec(template, unit, placeholders, &HashMap::new())
            .await?
            .unwrap_or_else(CommandOutput::success))
    }
}

fn rejection(operation: &'static str, output: &CommandOutput) -> CollaboratorError {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        CollaboratorError::rejected(operation, format!("exit code {}", output.exit_code))
    } else {
        CollaboratorError::rejected(operation, stderr)
    }
}

/// Parse `KEY=VALUE` lines, ignoring blanks and `#` comments.
fn parse_key_values(output: &str) -> Result<BTreeMap<String, String>, CollaboratorError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| CollaboratorError::InvalidOutput {
                    operation: "config read",
                    output: line.to_string(),
                })
        })
        .collect()
}

#[async_trait]
impl StatusProbe for ShellCollaborators {
    async fn check_status(&self, unit: &Unit) -> Result<EnvironmentStatus, CollaboratorError> {
        let placeholders = Placeholders::for_unit(unit);
        let template = self.templates.status.as_deref();
        let Some(output) = self.exec(template, unit, placeholders, &HashMap::new()).await? else {
            return Ok(EnvironmentStatus::None);
        };
        if !output.is_success() {
            return Err(rejection("status", &output));
        }

        let word = output.stdout.split_whitespace().next().unwrap_or_default();
        word.parse().map_err(|_| CollaboratorError::InvalidOutput {
            operation: "status",
            output: output.stdout.trim().to_string(),
        })
    }

    async fn phase_up_to_date(&self, unit: &Unit, phase: Phase) -> Result<bool, CollaboratorError> {
        let placeholders = Placeholders::for_unit(unit).with("phase", phase.to_string());
        let template = self.templates.up_to_date.as_deref();
        let output = self.exec(template, unit, placeholders, &HashMap::new()).await?;
        Ok(output.is_some_and(|o| o.is_success()))
    }
}

#[async_trait]
impl ConfigStore for ShellCollaborators {
    async fn init_config(&self, unit: &Unit) -> Result<(), CollaboratorError> {
        let template = self.templates.config_init.as_deref();
        self.exec_checked("config init", template, unit, Placeholders::for_unit(unit))
            .await
    }

    async fn materialize_config(&self, unit: &Unit) -> Result<(), CollaboratorError> {
        let template = self.templates.config_materialize.as_deref();
        self.exec_checked("config materialize", template, unit, Placeholders::for_unit(unit))
            .await
    }

    async fn read_deployed_config(
        &self,
        unit: &Unit,
    ) -> Result<BTreeMap<String, String>, CollaboratorError> {
        let template = self.templates.config_read.as_deref();
        let placeholders = Placeholders::for_unit(unit);
        match self.exec(template, unit, placeholders, &HashMap::new()).await? {
            None => Ok(BTreeMap::new()),
            Some(output) if !output.is_success() => Err(rejection("config read", &output)),
            Some(output) => parse_key_values(&output.stdout),
        }
    }

    async fn delete_config(&self, unit: &Unit, scope: ConfigScope) -> Result<(), CollaboratorError> {
        let template = self.templates.config_delete.as_deref();
        let placeholders = Placeholders::for_unit(unit).with("scope", scope.to_string());
        self.exec_checked("config delete", template, unit, placeholders)
            .await
    }
}

#[async_trait]
impl ImageClient for ShellCollaborators {
    async fn build_image(
        &self,
        unit: &Unit,
        request: &BuildRequest,
    ) -> Result<CommandOutput, CollaboratorError> {
        let mut placeholders = Placeholders::for_unit(unit).with("image", request.image.to_string());
        if let Some(base) = &request.base {
            placeholders = placeholders.with("base", base.to_string());
        }
        let mut env = HashMap::new();
        if request.force {
            env.insert("CONVOY_NO_CACHE".to_string(), "1".to_string());
        }
        let template = self.templates.build.as_deref();
        Ok(self
            .exec(template, unit, placeholders, &env)
            .await?
            .unwrap_or_else(CommandOutput::success))
    }

    async fn push_image(
        &self,
        unit: &Unit,
        image: &ImageRef,
    ) -> Result<PushOutput, CollaboratorError> {
        let placeholders = Placeholders::for_unit(unit).with("image", image.to_string());
        let template = self.templates.push.as_deref();
        let Some(output) = self.exec(template, unit, placeholders, &HashMap::new()).await? else {
            return Ok(PushOutput {
                output: CommandOutput::success(),
                digest: None,
            });
        };
        let digest = Digest::find_in(&output.stdout);
        Ok(PushOutput { output, digest })
    }

    async fn login(&self, registry: &str) -> Result<(), CollaboratorError> {
        let Some(template) = self.templates.login.as_deref() else {
            return Ok(());
        };
        let command = Placeholders::default().with("registry", registry).render(template);
        let output = self
            .runner
            .run(Path::new("."), &command, &HashMap::new())
            .await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(rejection("login", &output))
        }
    }

    async fn verify_digest_visible(
        &self,
        unit: &Unit,
        image: &ImageRef,
        digest: &Digest,
    ) -> Result<bool, CollaboratorError> {
        let placeholders = Placeholders::for_unit(unit)
            .with("image", image.to_string())
            .with("digest", digest.to_string());
        let template = self.templates.verify_digest.as_deref();
        let output = self.exec(template, unit, placeholders, &HashMap::new()).await?;
        Ok(output.is_none_or(|o| o.is_success()))
    }

    async fn sync_base_image(
        &self,
        unit: &Unit,
        base: &ImageRef,
    ) -> Result<CommandOutput, CollaboratorError> {
        let mut placeholders = Placeholders::for_unit(unit).with("base", base.to_string());
        if let Some(registry) = unit.image.as_ref().and_then(|spec| spec.repository.registry()) {
            placeholders = placeholders.with("registry", registry);
        }
        self.exec_output(self.templates.sync_base.as_deref(), unit, placeholders)
            .await
    }

    async fn delete_repository(
        &self,
        unit: &Unit,
        repository: &ImageRef,
    ) -> Result<CommandOutput, CollaboratorError> {
        let mut placeholders = Placeholders::for_unit(unit).with("image", repository.to_string());
        if let Some(registry) = repository.registry() {
            placeholders = placeholders.with("registry", registry);
        }
        self.exec_output(self.templates.delete_repository.as_deref(), unit, placeholders)
            .await
    }
}

#[async_trait]
impl InfraClient for ShellCollaborators {
    async fn apply(
        &self,
        unit: &Unit,
        inputs: &StackInputs,
    ) -> Result<CommandOutput, CollaboratorError> {
        let mut placeholders = Placeholders::for_unit(unit);
        if let Some(image) = inputs.get("image") {
            placeholders = placeholders.with("image", image);
        }
        if let Some(digest) = inputs.get("image_digest") {
            placeholders = placeholders.with("digest", digest);
        }
        let env: HashMap<String, String> = inputs
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(self
            .exec(self.templates.apply.as_deref(), unit, placeholders, &env)
            .await?
            .unwrap_or_else(CommandOutput::success))
    }

    async fn destroy(&self, unit: &Unit) -> Result<CommandOutput, CollaboratorError> {
        self.exec_output(
            self.templates.destroy.as_deref(),
            unit,
            Placeholders::for_unit(unit),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ProcessRunner;
    use crate::types::UnitId;

    fn shell(templates: CommandTemplates) -> ShellCollaborators {
        ShellCollaborators::new(templates, Arc::new(ProcessRunner))
    }

    fn unit(dir: &std::path::Path) -> Unit {
        let mut unit = Unit::new(UnitId::new("api").unwrap(), dir);
        unit.version = "1.2.0".to_string();
        unit
    }

    #[test]
    fn placeholders_are_quoted() {
        let rendered = Placeholders::default()
            .with("unit", "api")
            .with("registry", "ghcr.io")
            .render("login {registry} for {unit} {unknown}");
        assert_eq!(rendered, "login 'ghcr.io' for 'api' {unknown}");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let rendered = Placeholders::default()
            .with("path", "/srv/{version}")
            .with("version", "1 0")
            .render("ls {path}");
        assert_eq!(rendered, "ls '/srv/{version}'");

        let rendered = Placeholders::default()
            .with("unit", "api")
            .render("{{unit}} {unit");
        assert_eq!(rendered, "{'api'} {unit");
    }

    #[test]
    fn key_value_lines_parse() {
        let parsed = parse_key_values("# deployed\nREGION=eu-west-1\n\nSIZE = small\n").unwrap();
        assert_eq!(parsed.get("REGION").map(String::as_str), Some("eu-west-1"));
        assert_eq!(parsed.get("SIZE").map(String::as_str), Some("small"));
        assert!(parse_key_values("garbage").is_err());
    }

    #[tokio::test]
    async fn missing_templates_are_no_ops() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(CommandTemplates::default());
        let unit = unit(dir.path());

        assert_eq!(shell.check_status(&unit).await.unwrap(), EnvironmentStatus::None);
        assert!(shell.destroy(&unit).await.unwrap().is_success());
        shell.init_config(&unit).await.unwrap();
        assert!(shell.read_deployed_config(&unit).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_parses_first_word() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(CommandTemplates {
            status: Some("echo needs-update {unit}".to_string()),
            ..Default::default()
        });
        let status = shell.check_status(&unit(dir.path())).await.unwrap();
        assert_eq!(status, EnvironmentStatus::NeedsUpdate);
    }

    #[tokio::test]
    async fn push_reports_digest_from_output() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(CommandTemplates {
            push: Some("echo pushing {image}; echo 'latest: digest: sha256:abc123 size: 1'".to_string()),
            ..Default::default()
        });
        let image = ImageRef::parse("ghcr.io/acme/api:1.2.0").unwrap();
        let pushed = shell.push_image(&unit(dir.path()), &image).await.unwrap();
        assert!(pushed.output.is_success());
        assert_eq!(pushed.digest.map(|d| d.to_string()), Some("sha256:abc123".to_string()));
    }

    #[tokio::test]
    async fn failing_config_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(CommandTemplates {
            config_delete: Some("echo nope >&2; exit 4".to_string()),
            ..Default::default()
        });
        let result = shell.delete_config(&unit(dir.path()), ConfigScope::Shared).await;
        assert!(matches!(
            result,
            Err(CollaboratorError::Rejected { message, .. }) if message == "nope"
        ));
    }

    #[tokio::test]
    async fn apply_receives_inputs_as_environment() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(CommandTemplates {
            apply: Some("echo \"$version/$region\"".to_string()),
            ..Default::default()
        });
        let mut inputs = StackInputs::default();
        inputs.set("version", "1.2.0");
        inputs.set("region", "eu-west-1");

        let output = shell.apply(&unit(dir.path()), &inputs).await.unwrap();
        assert_eq!(output.stdout.trim(), "1.2.0/eu-west-1");
    }

    #[tokio::test]
    async fn phase_and_base_placeholders_render() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(CommandTemplates {
            up_to_date: Some("test {phase} = stack".to_string()),
            sync_base: Some("echo mirror {base}".to_string()),
            ..Default::default()
        });
        let unit = unit(dir.path());

        assert!(shell.phase_up_to_date(&unit, Phase::Stack).await.unwrap());
        assert!(!shell.phase_up_to_date(&unit, Phase::Image).await.unwrap());

        let base = ImageRef::parse("ghcr.io/acme/base:3").unwrap();
        let output = shell.sync_base_image(&unit, &base).await.unwrap();
        assert_eq!(output.stdout.trim(), "mirror ghcr.io/acme/base:3");
    }
}
