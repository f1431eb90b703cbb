//! CLI definition for the sfmc-provision command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Provision Salesforce Marketing Cloud Data Extensions from wizard templates.
///
/// Credentials and endpoints come from an optional config file and `SFMC_*`
/// environment variables.
#[derive(Parser, Debug)]
#[command(name = "sfmc-provision")]
#[command(version)]
#[command(about = "Provision Marketing Cloud Data Extensions from wizard templates")]
#[command(
    long_about = "Compiles a wizard template into a Data Extension definition, creates it in \
    the integration folder and loads the template values as its first row.\n\n\
    Environment variables:\n  \
    SFMC_CLIENT_ID           Installed package client id\n  \
    SFMC_CLIENT_SECRET       Installed package client secret\n  \
    SFMC_AUTH_BASE_URL       Tenant authentication base URL\n  \
    SFMC_ACCOUNT_ID          Business unit MID (optional)\n  \
    SFMC_REFRESH_TOKEN       Use the refresh-token grant instead of client credentials\n  \
    SFMC_FOLDER_NAME         Folder new Data Extensions are placed in\n  \
    SFMC_ORG_SETUP_KEY       External key of the org-setup Data Extension\n  \
    SFMC_HTTP__TIMEOUT_SECS  Per-request timeout"
)]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Config file (.toml, .yaml or .json)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a Data Extension from a template and load its row
    Provision {
        /// Template JSON file
        template: PathBuf,
    },

    /// Print the SOAP create envelope for a template without calling the platform
    Compile {
        /// Template JSON file
        template: PathBuf,
        /// Folder (category) id to place the Data Extension in
        #[arg(long, value_name = "ID")]
        folder_id: String,
        /// Token written into the envelope header
        #[arg(long, default_value = "ACCESS_TOKEN")]
        token: String,
    },

    /// Check that no Data Extension already uses a template name
    CheckName {
        /// Template name
        name: String,
    },

    /// Load organization identifiers into the org-setup Data Extension
    OrgSetup {
        #[arg(long)]
        org_id: String,
        #[arg(long)]
        reference_id: String,
        #[arg(long)]
        customer_unique_id: String,
    },

    /// List the field labels offered in the template dropdowns
    Catalog {
        /// Labels already chosen in other dropdowns
        #[arg(long = "selected", value_name = "LABEL")]
        selected: Vec<String>,
    },
}
