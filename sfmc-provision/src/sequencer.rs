//! Provisioning sequencer.
//!
//! A run moves through typed stage values, each holding only what the next
//! step needs:
//!
//! ```text
//! Provisioner::authenticate -> Authenticated
//!     .ensure_name_available
//!     .resolve_folder         -> FolderResolved
//!     .create                 -> Created
//!     .load                   -> ProvisioningReport
//! ```
//!
//! Every failure ends the run. A Data Extension that was created but could
//! not be loaded is left in place and reported as [`ProvisionError::Load`].

use crate::auth::{self, AuthContext, Credentials};
use crate::client::{HttpPlatformClient, PlatformApi, RestResponse};
use crate::compiler::{self, SoapCreateDocument};
use crate::config::{self, ProvisionConfig, DEFAULT_FOLDER_NAME, DEFAULT_PARENT_FOLDER_NAME};
use crate::error::{PlatformError, ProvisionError, Stage};
use crate::folder::{self, FolderNames, FolderRef};
use crate::soap::{
    CreateResult, Filter, RetrieveRequest, RetrieveResult, SoapRequest, SoapResponse,
};
use crate::template::{Template, CUSTOMER_UNIQUE_ID, ORG_ID, USER_REFERENCE_ID};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// State shared by consecutive runs of one caller.
///
/// Holds the resolved integration folder so later runs skip the lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningSession {
    folder: Option<FolderRef>,
}

impl ProvisioningSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session with a folder already known.
    pub fn with_folder(folder: FolderRef) -> Self {
        Self {
            folder: Some(folder),
        }
    }

    pub fn folder(&self) -> Option<&FolderRef> {
        self.folder.as_ref()
    }

    /// Forgets the cached folder.
    pub fn clear(&mut self) {
        self.folder = None;
    }
}

/// Organization identifiers submitted on the first wizard page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgSetup {
    pub org_id: String,
    pub user_reference_id: String,
    pub customer_unique_id: String,
}

impl OrgSetup {
    /// The identifiers as one flat row. All three are required.
    pub fn to_row(&self) -> Result<Value, ProvisionError> {
        let mut row = Map::new();
        for (field, value) in [
            (ORG_ID, &self.org_id),
            (USER_REFERENCE_ID, &self.user_reference_id),
            (CUSTOMER_UNIQUE_ID, &self.customer_unique_id),
        ] {
            let value = value.trim();
            if value.is_empty() {
                return Err(ProvisionError::MissingValue {
                    field: field.to_string(),
                });
            }
            row.insert(field.to_string(), Value::String(value.to_string()));
        }
        Ok(Value::Object(row))
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub data_extension_key: String,
    pub folder: FolderRef,
    /// The integration folder was created during this run
    pub folder_created: bool,
    pub new_id: Option<String>,
    pub field_count: usize,
    /// HTTP status of the row load
    pub load_status: u16,
}

impl ProvisioningReport {
    /// One-line description for operators.
    pub fn summary(&self) -> String {
        let folder = if self.folder_created {
            format!("new folder {}", self.folder)
        } else {
            format!("folder {}", self.folder)
        };
        format!(
            "Data Extension '{}' created in {} with {} fields; row loaded (HTTP {})",
            self.data_extension_key, folder, self.field_count, self.load_status
        )
    }
}

impl fmt::Display for ProvisioningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Runs provisioning against one platform account.
#[derive(Clone)]
pub struct Provisioner {
    api: Arc<dyn PlatformApi>,
    credentials: Credentials,
    folders: FolderNames,
    org_setup_key: Option<String>,
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("credentials", &self.credentials)
            .field("folders", &self.folders)
            .field("org_setup_key", &self.org_setup_key)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    pub fn new(api: Arc<dyn PlatformApi>, credentials: Credentials) -> Self {
        Self {
            api,
            credentials,
            folders: FolderNames {
                folder: DEFAULT_FOLDER_NAME.to_string(),
                parent: DEFAULT_PARENT_FOLDER_NAME.to_string(),
            },
            org_setup_key: None,
        }
    }

    /// Builds an HTTP-backed provisioner from validated configuration.
    pub fn from_config(config: &ProvisionConfig) -> Result<Self, ProvisionError> {
        let api = HttpPlatformClient::with_config(&config.http, &config.auth_base_url)?;
        let mut provisioner = Self::new(Arc::new(api), config.credentials()?)
            .with_folder_names(&config.folder_name, &config.parent_folder_name);
        provisioner.org_setup_key = config.org_setup_key.clone();
        Ok(provisioner)
    }

    pub fn with_folder_names(mut self, folder: &str, parent: &str) -> Self {
        self.folders = FolderNames {
            folder: folder.to_string(),
            parent: parent.to_string(),
        };
        self
    }

    pub fn with_org_setup_key(mut self, key: impl Into<String>) -> Self {
        self.org_setup_key = Some(key.into());
        self
    }

    pub fn folder_names(&self) -> &FolderNames {
        &self.folders
    }

    pub async fn authenticate(&self) -> Result<Authenticated, ProvisionError> {
        let auth = auth::authenticate(&*self.api, &self.credentials).await?;
        Ok(Authenticated { auth })
    }

    /// Fails with [`ProvisionError::DuplicateName`] when a Data Extension
    /// named `name` already exists.
    #[instrument(skip(self))]
    pub async fn check_template_name(&self, name: &str) -> Result<(), ProvisionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProvisionError::MissingTemplateName);
        }
        self.authenticate()
            .await?
            .ensure_name_available(&*self.api, name)
            .await
    }

    /// Provisions a Data Extension for `template` and loads its row.
    ///
    /// The template is validated before any network call. The folder cached
    /// in `session` is reused; a newly resolved one is stored there.
    #[instrument(
        skip_all,
        fields(template = template.get(crate::template::TEMPLATE_NAME).unwrap_or_default())
    )]
    pub async fn provision(
        &self,
        session: &mut ProvisioningSession,
        template: &Template,
    ) -> Result<ProvisioningReport, ProvisionError> {
        let name = template.template_name()?;
        compiler::collect_fields(template)?;

        let api = &*self.api;
        let authenticated = self.authenticate().await?;
        authenticated.ensure_name_available(api, name).await?;
        let resolved = authenticated
            .resolve_folder(api, session, &self.folders)
            .await?;
        let created = resolved.create(api, template).await?;
        let report = created.load(api, template).await?;

        info!(summary = %report.summary(), "Provisioning complete");
        Ok(report)
    }

    /// Loads the organization identifiers into the org-setup Data Extension.
    #[instrument(skip_all)]
    pub async fn load_org_setup(&self, setup: &OrgSetup) -> Result<RestResponse, ProvisionError> {
        let key = config::require("org_setup_key", &self.org_setup_key)?;
        let row = setup.to_row()?;

        let authenticated = self.authenticate().await?;
        let auth = &authenticated.auth;
        let response = self
            .api
            .post_rowset(&auth.rowset_endpoint(key), auth.access_token(), &row)
            .await
            .map_err(|source| ProvisionError::Load {
                key: key.to_string(),
                source,
            })?;
        info!(key, status = response.status, "Loaded org setup row");
        Ok(response)
    }
}

/// Request listing Data Extensions named `name`.
pub fn name_check_request(name: &str) -> SoapRequest {
    RetrieveRequest::new("DataExtension")
        .property("CustomerKey")
        .property("Name")
        .filter(Filter::equals("Name", name))
        .into_request()
}

/// Stage after a successful token exchange.
#[derive(Debug, Clone)]
pub struct Authenticated {
    auth: AuthContext,
}

impl Authenticated {
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub async fn ensure_name_available(
        &self,
        api: &dyn PlatformApi,
        name: &str,
    ) -> Result<(), ProvisionError> {
        debug!(name, "Checking that the template name is unused");
        let request = name_check_request(name);
        let envelope = request
            .render(self.auth.access_token())
            .map_err(|e| ProvisionError::NameCheck {
                message: e.to_string(),
                raw_body: None,
            })?;
        let response = api
            .post_soap(&self.auth.soap_endpoint(), request.action, envelope)
            .await
            .map_err(|e| {
                e.at_stage(Stage::NameCheck, |source| ProvisionError::NameCheck {
                    message: source.to_string(),
                    raw_body: source.raw_body().map(str::to_string),
                })
            })?;

        let result = RetrieveResult::from_response(&response)
            .map_err(|e| parse_failure(Stage::NameCheck, &response, e.to_string()))?;
        if !result.is_ok() {
            return Err(ProvisionError::NameCheck {
                message: format!("name lookup returned {}", result.overall_status),
                raw_body: Some(response.raw().to_string()),
            });
        }
        if !result.results.is_empty() {
            warn!(name, "Template name already in use");
            return Err(ProvisionError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Uses the session's folder, or resolves it and stores it in the session.
    pub async fn resolve_folder(
        self,
        api: &dyn PlatformApi,
        session: &mut ProvisioningSession,
        names: &FolderNames,
    ) -> Result<FolderResolved, ProvisionError> {
        if let Some(folder) = session.folder() {
            debug!(id = %folder, "Using folder cached in session");
            return Ok(FolderResolved {
                auth: self.auth,
                folder: folder.clone(),
                folder_created: false,
            });
        }

        let resolution = folder::resolve_folder(api, &self.auth, names).await?;
        session.folder = Some(resolution.folder.clone());
        Ok(FolderResolved {
            auth: self.auth,
            folder: resolution.folder,
            folder_created: resolution.created,
        })
    }
}

/// Stage once the target folder is known.
#[derive(Debug, Clone)]
pub struct FolderResolved {
    auth: AuthContext,
    folder: FolderRef,
    folder_created: bool,
}

impl FolderResolved {
    pub fn folder(&self) -> &FolderRef {
        &self.folder
    }

    /// Compiles `template` and issues the `CreateRequest`.
    pub async fn create(
        self,
        api: &dyn PlatformApi,
        template: &Template,
    ) -> Result<Created, ProvisionError> {
        let document = compiler::compile(template, &self.folder.id)?;
        let envelope = document
            .render(self.auth.access_token())
            .map_err(|e| ProvisionError::Create {
                message: e.to_string(),
                raw_body: None,
            })?;

        debug!(key = document.customer_key(), folder = %self.folder, "Creating Data Extension");
        let response = api
            .post_soap(&self.auth.soap_endpoint(), document.request().action, envelope)
            .await
            .map_err(create_error)?;

        let result = CreateResult::from_response(&response)
            .map_err(|e| parse_failure(Stage::Create, &response, e.to_string()))?;
        if !result.is_ok() {
            warn!(
                key = document.customer_key(),
                status = %result.overall_status,
                "Create rejected"
            );
            return Err(ProvisionError::Create {
                message: result.status_message(),
                raw_body: Some(response.raw().to_string()),
            });
        }

        info!(key = document.customer_key(), "Created Data Extension");
        Ok(Created {
            auth: self.auth,
            folder: self.folder,
            folder_created: self.folder_created,
            new_id: result.new_id().map(str::to_string),
            document,
        })
    }
}

/// Stage once the Data Extension exists.
#[derive(Debug, Clone)]
pub struct Created {
    auth: AuthContext,
    folder: FolderRef,
    folder_created: bool,
    new_id: Option<String>,
    document: SoapCreateDocument,
}

impl Created {
    pub fn document(&self) -> &SoapCreateDocument {
        &self.document
    }

    /// Posts the template values as one row of the new Data Extension.
    pub async fn load(
        self,
        api: &dyn PlatformApi,
        template: &Template,
    ) -> Result<ProvisioningReport, ProvisionError> {
        let key = self.document.customer_key().to_string();
        let url = self.auth.rowset_endpoint(&key);
        let response = api
            .post_rowset(&url, self.auth.access_token(), &template.to_row())
            .await
            .map_err(|source| ProvisionError::Load {
                key: key.clone(),
                source,
            })?;

        Ok(ProvisioningReport {
            data_extension_key: key,
            folder: self.folder,
            folder_created: self.folder_created,
            new_id: self.new_id,
            field_count: self.document.fields().len(),
            load_status: response.status,
        })
    }
}

fn create_error(error: PlatformError) -> ProvisionError {
    error.at_stage(Stage::Create, |source| ProvisionError::Create {
        message: source.to_string(),
        raw_body: source.raw_body().map(str::to_string),
    })
}

fn parse_failure(stage: Stage, response: &SoapResponse, message: String) -> ProvisionError {
    ProvisionError::Parse {
        stage,
        message,
        raw_body: response.raw().to_string(),
    }
}
