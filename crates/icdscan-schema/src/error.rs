use crate::issues::Issues;
use thiserror::Error;

pub const IO_ERROR_DOMAIN: &str = "icdscan-io-error";
pub const JSON_ERROR_DOMAIN: &str = "icdscan-json-error";
pub const MANIFEST_ERROR_DOMAIN: &str = "icdscan-manifest-error";

pub const MANIFEST_ERROR_INVALID: i32 = 1;
pub const MANIFEST_ERROR_UNSUPPORTED: i32 = 2;
const JSON_ERROR_SYNTAX: i32 = 1;

/// Why a single manifest (or a single layer entry within one) could not be loaded.
///
/// Every variant maps onto a `(domain, code, message)` triple so that the error
/// survives a round trip through a system report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadableError {
    #[error("unable to read \"{path}\": {message}")]
    Io {
        path: String,
        message: String,
        errno: Option<i32>,
    },
    #[error("unable to parse \"{path}\" as JSON: {message}")]
    Json { path: String, message: String },
    #[error("invalid manifest \"{path}\": {message}")]
    Invalid { path: String, message: String },
    #[error("file_format_version \"{version}\" in \"{path}\" is not supported")]
    UnsupportedVersion { path: String, version: String },
    /// An error carried verbatim from a previously written report.
    #[error("{message}")]
    Reported {
        domain: String,
        code: i32,
        message: String,
    },
}

impl LoadableError {
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            errno: err.raw_os_error(),
        }
    }

    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn domain(&self) -> &str {
        match self {
            Self::Io { .. } => IO_ERROR_DOMAIN,
            Self::Json { .. } => JSON_ERROR_DOMAIN,
            Self::Invalid { .. } | Self::UnsupportedVersion { .. } => MANIFEST_ERROR_DOMAIN,
            Self::Reported { domain, .. } => domain,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Io { errno, .. } => errno.unwrap_or(0),
            Self::Json { .. } => JSON_ERROR_SYNTAX,
            Self::Invalid { .. } => MANIFEST_ERROR_INVALID,
            Self::UnsupportedVersion { .. } => MANIFEST_ERROR_UNSUPPORTED,
            Self::Reported { code, .. } => *code,
        }
    }

    /// The issue flags a freshly parsed record with this error carries.
    pub fn issues(&self) -> Issues {
        match self {
            Self::UnsupportedVersion { .. } => Issues::UNSUPPORTED,
            Self::Reported { domain, code, .. }
                if domain == MANIFEST_ERROR_DOMAIN && *code == MANIFEST_ERROR_UNSUPPORTED =>
            {
                Issues::UNSUPPORTED
            }
            _ => Issues::CANNOT_LOAD,
        }
    }
}
