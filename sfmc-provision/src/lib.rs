//! Data Extension provisioning for Salesforce Marketing Cloud.
//!
//! This crate takes the flat template produced by the organization-preferences
//! wizard and turns it into a new Data Extension inside the platform, then
//! loads the template values into it as a single row.
//!
//! # Pipeline
//!
//! 1. **Authenticate** - client-credentials (or refresh-token) exchange plus a
//!    user-info call that yields the REST and SOAP base URLs
//! 2. **Name check** - SOAP `Retrieve` making sure no Data Extension already
//!    uses the template name
//! 3. **Folder** - find the integration folder, creating it under the
//!    "Data Extensions" root when it does not exist yet
//! 4. **Create** - compile the template into a SOAP `CreateRequest` and issue it
//! 5. **Load** - post the template values to the REST rowset endpoint
//!
//! Every stage failure is terminal for the run and is reported as a
//! [`ProvisionError`] carrying the [`Stage`] and the raw platform response.
//!
//! # Quick Start
//!
//! ```no_run
//! use sfmc_provision::{ProvisionConfig, Provisioner, ProvisioningSession, Template};
//!
//! # async fn run() -> Result<(), sfmc_provision::ProvisionError> {
//! let config = ProvisionConfig::load(None)?;
//! let provisioner = Provisioner::from_config(&config)?;
//! let mut session = ProvisioningSession::new();
//!
//! let template = Template::from_pairs([
//!     ("Template Name", "Org42"),
//!     ("Customer Unique ID", "x@y.com"),
//!     ("option 1", "Birth Date"),
//! ]);
//!
//! let report = provisioner.provision(&mut session, &template).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod catalog;
pub mod client;
pub mod compiler;
pub mod config;
pub mod error;
pub mod folder;
pub mod sequencer;
pub mod soap;
pub mod template;

pub use auth::{AuthContext, Credentials, TokenResult, UserInfo};
pub use catalog::{available_options, resolve, FieldSpec, WireType};
pub use client::{HttpPlatformClient, PlatformApi, RestResponse};
pub use compiler::{compile, SoapCreateDocument};
pub use config::{ConfigError, HttpConfig, ProvisionConfig};
pub use error::{PlatformError, ProvisionError, Stage};
pub use folder::FolderRef;
pub use sequencer::{OrgSetup, Provisioner, ProvisioningReport, ProvisioningSession};
pub use template::Template;
