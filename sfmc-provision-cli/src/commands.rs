//! Subcommand handlers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sfmc_provision::{
    available_options, compile, OrgSetup, ProvisionConfig, ProvisionError, Provisioner,
    ProvisioningSession, Template,
};
use tracing::debug;

/// Exit code for a Data Extension that was created but not loaded.
pub const EXIT_PARTIAL: i32 = 2;

/// Reads a template JSON file.
pub fn load_template(path: &Path) -> Result<Template> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse template {}", path.display()))
}

fn provisioner(config_path: Option<&Path>) -> Result<Provisioner> {
    let config = ProvisionConfig::load(config_path).map_err(ProvisionError::from)?;
    debug!(?config, "Using configuration");
    Ok(Provisioner::from_config(&config)?)
}

pub async fn run_provision(config_path: Option<&Path>, template_path: &Path) -> Result<()> {
    let template = load_template(template_path)?;
    let provisioner = provisioner(config_path)?;
    let mut session = ProvisioningSession::new();

    let report = provisioner.provision(&mut session, &template).await?;
    println!("{}", report.summary());
    Ok(())
}

/// Compiled create envelope for `template_path`, rendered with `token`.
pub fn compile_envelope(template_path: &Path, folder_id: &str, token: &str) -> Result<String> {
    let template = load_template(template_path)?;
    let document = compile(&template, folder_id)?;
    Ok(document.render(token)?)
}

pub fn run_compile(template_path: &Path, folder_id: &str, token: &str) -> Result<()> {
    println!("{}", compile_envelope(template_path, folder_id, token)?);
    Ok(())
}

pub async fn run_check_name(config_path: Option<&Path>, name: &str) -> Result<()> {
    provisioner(config_path)?.check_template_name(name).await?;
    println!("Template Name '{}' is available", name.trim());
    Ok(())
}

pub async fn run_org_setup(config_path: Option<&Path>, setup: OrgSetup) -> Result<()> {
    let response = provisioner(config_path)?.load_org_setup(&setup).await?;
    println!("Org setup loaded (HTTP {})", response.status);
    Ok(())
}

/// Dropdown options still available after `selected`, one per line.
pub fn catalog_lines(selected: &[String]) -> Vec<&'static str> {
    available_options(selected)
}

pub fn run_catalog(selected: &[String]) -> Result<()> {
    for label in catalog_lines(selected) {
        println!("{label}");
    }
    Ok(())
}

/// Prints the error and maps it to an exit code.
pub fn handle_result(result: Result<()>) -> i32 {
    let error = match result {
        Ok(()) => return 0,
        Err(error) => error,
    };

    match error.downcast_ref::<ProvisionError>() {
        Some(provision_error) => {
            eprintln!("Error ({}): {}", provision_error.stage(), provision_error);
            if let Some(raw) = provision_error.raw_body() {
                eprintln!("Platform response:\n{raw}");
            }
            if provision_error.is_partial_success() {
                EXIT_PARTIAL
            } else {
                1
            }
        }
        None => {
            eprintln!("Error: {error:#}");
            1
        }
    }
}
