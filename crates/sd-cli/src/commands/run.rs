//! Run command implementation

use anyhow::{bail, Context, Result};

use sd_compose::validation::{validate_port_mapping, validate_volume_mapping};
use sd_compose::{Command, Defaults, Environment, ServiceDescriptor, TranslateContext};
use sd_core::config::{ClientConfig, PullPolicy};
use sd_deploy::{DeployOptions, Engine};
use sd_remote::{CommandChannel, Detached};

use super::connect;
use crate::output::{print_info, print_success};

/// Arguments of `syno-deploy run`
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub image: String,
    pub name: Option<String>,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub env: Vec<String>,
    pub restart: Option<String>,
    pub network: Option<String>,
    pub workdir: Option<String>,
    pub user: Option<String>,
    pub command: Vec<String>,
    pub pull: Option<PullPolicy>,
    pub dry_run: bool,
}

impl RunArgs {
    /// Check port and volume mappings and build the service to run
    pub fn to_service(&self) -> Result<ServiceDescriptor> {
        for port in &self.ports {
            if let Err(e) = validate_port_mapping(port) {
                bail!(e);
            }
        }
        for volume in &self.volumes {
            if let Err(e) = validate_volume_mapping(volume) {
                bail!(e);
            }
        }

        let mut service = ServiceDescriptor::new("run", self.image.clone());
        service.container_name = self.name.clone();
        service.ports = self.ports.clone();
        service.volumes = self.volumes.clone();
        service.environment = Environment::List(self.env.clone());
        service.restart = self.restart.clone();
        service.network = self.network.clone();
        service.working_dir = self.workdir.clone();
        service.user = self.user.clone();
        if !self.command.is_empty() {
            service.command = Some(Command::Tokens(self.command.clone()));
        }
        Ok(service)
    }
}

/// Deploy a single container
pub async fn run_command(config: &ClientConfig, args: RunArgs) -> Result<()> {
    let service = args.to_service()?;
    let ctx = TranslateContext::new(None, Defaults::from(&config.defaults));
    let options = DeployOptions {
        pull: args.pull.unwrap_or(config.defaults.pull),
        dry_run: args.dry_run,
        ..DeployOptions::from(&config.defaults)
    };
    let docker = config.defaults.docker_binary.clone();

    if args.dry_run {
        let mut channel = Detached;
        let deployed = Engine::new(&mut channel, docker)
            .run_container(&service, &ctx, options)
            .await
            .context("Deployment failed")?;
        print_info(&format!("Dry run; container would be named '{}'", deployed.container));
        return Ok(());
    }

    let mut channel = connect(config).await?;
    let result = Engine::new(&mut channel, docker)
        .run_container(&service, &ctx, options)
        .await;
    channel.close().await;

    let deployed = result.context("Deployment failed")?;
    print_success("Container deployed successfully");
    if let Some(id) = &deployed.container_id {
        println!("Container ID:   {}", id.chars().take(12).collect::<String>());
    }
    println!("Container Name: {}", deployed.container);
    println!();
    print_info("You can check the status with: syno-deploy ps");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_service() {
        let args = RunArgs {
            image: "nginx:latest".to_string(),
            ports: vec!["8080:80".to_string()],
            volumes: vec!["./html:/usr/share/nginx/html".to_string()],
            env: vec!["TZ=UTC".to_string()],
            command: vec!["nginx".to_string(), "-g".to_string(), "daemon off;".to_string()],
            ..Default::default()
        };
        let service = args.to_service().unwrap();
        assert_eq!(service.image, "nginx:latest");
        assert_eq!(service.environment.entries(), vec!["TZ=UTC"]);
        assert!(service.container_name.is_none());
        assert_eq!(service.command.unwrap().tokens().len(), 3);
    }

    #[test]
    fn test_to_service_rejects_bad_port() {
        let args = RunArgs {
            image: "nginx".to_string(),
            ports: vec!["80".to_string()],
            ..Default::default()
        };
        let err = args.to_service().unwrap_err();
        assert!(err.to_string().contains("invalid port mapping"));
    }

    #[test]
    fn test_to_service_rejects_relative_container_path() {
        let args = RunArgs {
            image: "nginx".to_string(),
            volumes: vec!["./html:html".to_string()],
            ..Default::default()
        };
        assert!(args.to_service().is_err());
    }
}
