//! sfmc-provision CLI - Data Extension provisioning for Salesforce Marketing Cloud.
//!
//! Commands:
//! - `sfmc-provision provision <template>`: Create a Data Extension and load its row
//! - `sfmc-provision compile <template> --folder-id <id>`: Print the create envelope offline
//! - `sfmc-provision check-name <name>`: Check that a template name is unused
//! - `sfmc-provision org-setup`: Load organization identifiers into the org-setup Data Extension
//! - `sfmc-provision catalog [--selected <label>]`: List the dropdown field labels
//!
//! Environment variables:
//! - SFMC_CLIENT_ID / SFMC_CLIENT_SECRET: Installed package credentials
//! - SFMC_AUTH_BASE_URL: Tenant authentication base URL
//! - SFMC_REFRESH_TOKEN: Use the refresh-token grant
//! - SFMC_ORG_SETUP_KEY: External key of the org-setup Data Extension
//! - RUST_LOG: Log filter when `--debug` is not given

mod cli;
mod commands;

use clap::Parser;
use sfmc_provision::OrgSetup;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("sfmc_provision=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Provision { template } => commands::run_provision(config, &template).await,
        Commands::Compile {
            template,
            folder_id,
            token,
        } => commands::run_compile(&template, &folder_id, &token),
        Commands::CheckName { name } => commands::run_check_name(config, &name).await,
        Commands::OrgSetup {
            org_id,
            reference_id,
            customer_unique_id,
        } => {
            let setup = OrgSetup {
                org_id,
                user_reference_id: reference_id,
                customer_unique_id,
            };
            commands::run_org_setup(config, setup).await
        }
        Commands::Catalog { selected } => commands::run_catalog(&selected),
    };

    std::process::exit(commands::handle_result(result));
}
