//! Integration folder lookup and creation.

use crate::auth::AuthContext;
use crate::client::PlatformApi;
use crate::error::{PlatformError, ProvisionError, Stage};
use crate::soap::{
    document::Element, envelope::create_request, CreateResult, Filter, RetrieveRequest,
    RetrieveResult, SoapRequest, SoapResponse,
};
use std::fmt;
use tracing::{debug, info, warn};

/// Folders of this content type hold Data Extensions.
pub const DATA_EXTENSION_CONTENT_TYPE: &str = "dataextension";

/// A resolved folder (category) id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderRef {
    pub id: String,
}

impl FolderRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for FolderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Names of the integration folder and the root it is created under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNames {
    pub folder: String,
    pub parent: String,
}

/// Result of [`resolve_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderResolution {
    pub folder: FolderRef,
    /// True when the folder did not exist and was created by this call
    pub created: bool,
}

/// Finds the integration folder, creating it under the parent when missing.
///
/// Issues one `Retrieve` for the folder; when it is absent, one `Retrieve`
/// for the parent followed by one `Create`.
pub async fn resolve_folder(
    api: &dyn PlatformApi,
    auth: &AuthContext,
    names: &FolderNames,
) -> Result<FolderResolution, ProvisionError> {
    if let Some(folder) = find_folder(api, auth, &names.folder).await? {
        debug!(folder = %names.folder, id = %folder, "Found integration folder");
        return Ok(FolderResolution {
            folder,
            created: false,
        });
    }

    info!(
        folder = %names.folder,
        parent = %names.parent,
        "Integration folder missing, creating it"
    );
    let parent = find_folder(api, auth, &names.parent)
        .await?
        .ok_or_else(|| ProvisionError::FolderResolution {
            message: format!("parent folder '{}' not found", names.parent),
            raw_body: None,
        })?;

    let folder = create_folder(api, auth, &names.folder, &parent).await?;
    info!(id = %folder, "Created integration folder");
    Ok(FolderResolution {
        folder,
        created: true,
    })
}

/// Request retrieving a Data Extension folder by name.
pub fn find_folder_request(name: &str) -> SoapRequest {
    RetrieveRequest::new("DataFolder")
        .property("ID")
        .property("Name")
        .property("ContentType")
        .filter(
            Filter::equals("Name", name)
                .and(Filter::equals("ContentType", DATA_EXTENSION_CONTENT_TYPE)),
        )
        .into_request()
}

/// Request creating folder `name` under `parent`.
pub fn create_folder_request(name: &str, parent: &FolderRef) -> SoapRequest {
    create_request(
        Element::new("Objects")
            .attr("xsi:type", "DataFolder")
            .text_child("CustomerKey", name)
            .text_child("Name", name)
            .text_child("Description", name)
            .text_child("ContentType", DATA_EXTENSION_CONTENT_TYPE)
            .text_child("IsActive", "true")
            .text_child("IsEditable", "true")
            .text_child("AllowChildren", "true")
            .child(Element::new("ParentFolder").text_child("ID", parent.id.as_str())),
    )
}

/// Looks a folder up by name. `Ok(None)` when the platform has no such folder.
pub async fn find_folder(
    api: &dyn PlatformApi,
    auth: &AuthContext,
    name: &str,
) -> Result<Option<FolderRef>, ProvisionError> {
    let response = post(api, auth, find_folder_request(name)).await?;
    let result = RetrieveResult::from_response(&response)
        .map_err(|e| parse_failure(&response, e.to_string()))?;

    if !result.is_ok() {
        warn!(folder = name, status = %result.overall_status, "Folder retrieve was not OK");
        return Err(ProvisionError::FolderResolution {
            message: format!(
                "retrieving folder '{name}' returned {}",
                result.overall_status
            ),
            raw_body: Some(response.raw().to_string()),
        });
    }

    match result.results.first() {
        None => Ok(None),
        Some(found) => match found.child_text("ID") {
            Some(id) => Ok(Some(FolderRef::new(id))),
            None => Err(parse_failure(&response, "folder result has no ID")),
        },
    }
}

/// Creates folder `name` under `parent` and returns the new id.
pub async fn create_folder(
    api: &dyn PlatformApi,
    auth: &AuthContext,
    name: &str,
    parent: &FolderRef,
) -> Result<FolderRef, ProvisionError> {
    let response = post(api, auth, create_folder_request(name, parent)).await?;
    let result = CreateResult::from_response(&response)
        .map_err(|e| parse_failure(&response, e.to_string()))?;

    if !result.is_ok() {
        return Err(ProvisionError::FolderResolution {
            message: format!("creating folder '{name}' failed: {}", result.status_message()),
            raw_body: Some(response.raw().to_string()),
        });
    }
    result
        .new_id()
        .map(FolderRef::new)
        .ok_or_else(|| parse_failure(&response, "folder create returned no NewID"))
}

async fn post(
    api: &dyn PlatformApi,
    auth: &AuthContext,
    request: SoapRequest,
) -> Result<SoapResponse, ProvisionError> {
    let envelope = request
        .render(auth.access_token())
        .map_err(|e| ProvisionError::FolderResolution {
            message: e.to_string(),
            raw_body: None,
        })?;
    api.post_soap(&auth.soap_endpoint(), request.action, envelope)
        .await
        .map_err(folder_error)
}

fn folder_error(error: PlatformError) -> ProvisionError {
    error.at_stage(Stage::FolderResolution, |source| {
        ProvisionError::FolderResolution {
            message: source.to_string(),
            raw_body: source.raw_body().map(str::to_string),
        }
    })
}

fn parse_failure(response: &SoapResponse, message: impl Into<String>) -> ProvisionError {
    ProvisionError::Parse {
        stage: Stage::FolderResolution,
        message: message.into(),
        raw_body: response.raw().to_string(),
    }
}
