//! Deploy command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use sd_compose::{
    load_variable_file_path, parse_descriptor_file, project_name_from_path, Defaults,
    TranslateContext, VariableSet,
};
use sd_core::config::{ClientConfig, PullPolicy};
use sd_deploy::{DeployOptions, DeployReport, Deployer};
use sd_remote::{CommandChannel, Detached};

use super::connect;
use crate::output::{print_info, print_success, print_warning};

/// Arguments of `syno-deploy deploy`
#[derive(Debug, Clone)]
pub struct DeployArgs {
    pub file: PathBuf,
    pub project: Option<String>,
    pub env_file: Option<PathBuf>,
    pub pull: Option<PullPolicy>,
    pub dry_run: bool,
    pub json: bool,
}

/// Deploy every service of a compose file
pub async fn deploy_command(config: &ClientConfig, args: DeployArgs) -> Result<()> {
    let file = if args.file.is_absolute() {
        args.file.clone()
    } else {
        std::env::current_dir()
            .context("Failed to resolve compose file path")?
            .join(&args.file)
    };

    let descriptor = parse_descriptor_file(&file)
        .with_context(|| format!("Failed to parse {:?}", file))?;
    if descriptor.is_empty() {
        print_warning("No services defined; nothing to deploy");
        return Ok(());
    }

    let vars = load_vars(args.env_file.as_deref())?;
    let project = args
        .project
        .clone()
        .unwrap_or_else(|| project_name_from_path(&file));
    debug!(file = %file.display(), project = %project, vars = vars.len(), "Loaded compose file");
    let ctx = TranslateContext::new(Some(project.clone()), Defaults::from(&config.defaults));

    let options = DeployOptions {
        pull: args.pull.unwrap_or(config.defaults.pull),
        dry_run: args.dry_run,
        ..DeployOptions::from(&config.defaults)
    };

    if !args.json {
        print_info(&format!(
            "Deploying project '{}': {}",
            project,
            descriptor.service_names().join(", ")
        ));
    }

    let result = if args.dry_run {
        Deployer::new(Detached, options)
            .deploy(&descriptor, &ctx, &vars)
            .await
    } else {
        let mut channel = connect(config).await?;
        let result = Deployer::new(&mut channel, options)
            .deploy(&descriptor, &ctx, &vars)
            .await;
        channel.close().await;
        result
    };

    let report = result.context("Deployment failed")?;
    print_report(&report, args.json)
}

fn load_vars(env_file: Option<&Path>) -> Result<VariableSet> {
    match env_file {
        Some(path) => load_variable_file_path(path)
            .with_context(|| format!("Failed to load environment file {:?}", path)),
        None => Ok(VariableSet::new()),
    }
}

fn print_report(report: &DeployReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if report.dry_run {
        print_info("Dry run; commands that would be sent:");
        for command in &report.commands {
            println!("  {}", command);
        }
        return Ok(());
    }

    for service in &report.services {
        let id: String = match &service.container_id {
            Some(id) => id.chars().take(12).collect(),
            None => "-".to_string(),
        };
        print_success(&format!(
            "{} -> {} ({})",
            service.service, service.container, id
        ));
    }
    println!();
    print_info("You can check the status with: syno-deploy ps");
    Ok(())
}
