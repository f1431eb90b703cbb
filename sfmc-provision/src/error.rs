//! Error types for the provisioning pipeline

use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

/// Pipeline stage a run was in when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Configuration,
    Compile,
    Authenticate,
    NameCheck,
    FolderResolution,
    Create,
    Load,
}

impl Stage {
    /// Stable name used in status text shown to operators.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Configuration => "configuration",
            Stage::Compile => "compile",
            Stage::Authenticate => "authenticate",
            Stage::NameCheck => "name-check",
            Stage::FolderResolution => "folder-resolution",
            Stage::Create => "create",
            Stage::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single outbound platform call.
///
/// Transport failures and non-2xx responses are reported uniformly so callers
/// can always show a status, a message and the raw body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform answered with a non-success status
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
        raw_body: String,
    },

    /// The request never produced a response (connect, timeout, TLS...)
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The response arrived but could not be understood
    #[error("failed to parse response from {url}: {message}")]
    Parse {
        url: String,
        message: String,
        raw_body: String,
    },
}

impl PlatformError {
    /// HTTP status, when the platform answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message without the URL prefix.
    pub fn message(&self) -> &str {
        match self {
            PlatformError::Http { message, .. }
            | PlatformError::Transport { message, .. }
            | PlatformError::Parse { message, .. } => message,
        }
    }

    /// Raw response body, when one was received.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            PlatformError::Http { raw_body, .. } | PlatformError::Parse { raw_body, .. } => {
                Some(raw_body)
            }
            PlatformError::Transport { .. } => None,
        }
    }

    /// Converts into a [`ProvisionError`] for `stage`.
    ///
    /// Parse failures always become [`ProvisionError::Parse`]; everything else
    /// goes through `wrap`.
    pub(crate) fn at_stage(
        self,
        stage: Stage,
        wrap: impl FnOnce(PlatformError) -> ProvisionError,
    ) -> ProvisionError {
        match self {
            PlatformError::Parse {
                message, raw_body, ..
            } => ProvisionError::Parse {
                stage,
                message,
                raw_body,
            },
            other => wrap(other),
        }
    }
}

/// Terminal failure of a provisioning run.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// `Template Name` is absent or blank
    #[error("Template Name is required")]
    MissingTemplateName,

    /// A custom field selected a type the platform does not know
    #[error("custom field {slot} has unsupported field type '{value}'")]
    UnresolvedFieldType { slot: usize, value: String },

    /// A custom field length is not a positive integer
    #[error("custom field {slot} has invalid length '{value}'")]
    InvalidFieldLength { slot: usize, value: String },

    /// A required input value is absent or blank
    #[error("{field} is required")]
    MissingValue { field: String },

    /// Two template entries produce the same field name
    #[error("field '{name}' appears more than once in the template")]
    DuplicateField { name: String },

    /// Token or user-info exchange failed
    #[error("authentication failed: {source}")]
    Auth {
        #[source]
        source: PlatformError,
    },

    /// The pre-flight name lookup could not be completed
    #[error("template name check failed: {message}")]
    NameCheck {
        message: String,
        raw_body: Option<String>,
    },

    /// A Data Extension with the template name already exists
    #[error("Template Name '{name}' already exists")]
    DuplicateName { name: String },

    /// Neither the integration folder nor its parent could be resolved
    #[error("folder resolution failed: {message}")]
    FolderResolution {
        message: String,
        raw_body: Option<String>,
    },

    /// The platform rejected or never answered the `CreateRequest`
    #[error("Data Extension creation failed: {message}")]
    Create {
        message: String,
        raw_body: Option<String>,
    },

    /// The record type exists but the row load failed
    #[error("loading rows into Data Extension '{key}' failed: {source}")]
    Load {
        key: String,
        #[source]
        source: PlatformError,
    },

    /// A platform response could not be parsed
    #[error("unexpected platform response during {stage}: {message}")]
    Parse {
        stage: Stage,
        message: String,
        raw_body: String,
    },

    /// Configuration is missing or invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ProvisionError {
    /// Stage the run failed at.
    pub fn stage(&self) -> Stage {
        match self {
            ProvisionError::MissingTemplateName
            | ProvisionError::UnresolvedFieldType { .. }
            | ProvisionError::InvalidFieldLength { .. }
            | ProvisionError::MissingValue { .. }
            | ProvisionError::DuplicateField { .. } => Stage::Compile,
            ProvisionError::Auth { .. } => Stage::Authenticate,
            ProvisionError::NameCheck { .. } | ProvisionError::DuplicateName { .. } => {
                Stage::NameCheck
            }
            ProvisionError::FolderResolution { .. } => Stage::FolderResolution,
            ProvisionError::Create { .. } => Stage::Create,
            ProvisionError::Load { .. } => Stage::Load,
            ProvisionError::Parse { stage, .. } => *stage,
            ProvisionError::Config(_) => Stage::Configuration,
        }
    }

    /// Raw platform response attached for diagnostics.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            ProvisionError::Auth { source } | ProvisionError::Load { source, .. } => {
                source.raw_body()
            }
            ProvisionError::NameCheck { raw_body, .. }
            | ProvisionError::FolderResolution { raw_body, .. }
            | ProvisionError::Create { raw_body, .. } => raw_body.as_deref(),
            ProvisionError::Parse { raw_body, .. } => Some(raw_body),
            _ => None,
        }
    }

    /// True when the Data Extension was created but the row was not loaded.
    pub fn is_partial_success(&self) -> bool {
        matches!(self, ProvisionError::Load { .. })
    }
}
