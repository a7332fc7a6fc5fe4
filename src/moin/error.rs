use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of [`MoinError`], used by callers that need to
/// branch on the failure category rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Validation,
    MissingCredential,
    TransportFailure,
    Io,
}

/// Why a config file could not be read as TOML.
#[derive(Error, Debug)]
pub enum ParseFailure {
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("file is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Error, Debug)]
pub enum MoinError {
    #[error("Config file not found at {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Server '{alias}' not found. Available: {}", format_available(.available))]
    ServerNotFound {
        alias: String,
        available: Vec<String>,
    },

    #[error("Could not determine the home directory")]
    NoHomeDirectory,

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseFailure,
    },

    #[error("{0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("No access token configured for server '{alias}'. Run `moin auth` first")]
    MissingCredential { alias: String },

    #[error("The wiki returned an empty token; check the username and password")]
    EmptyToken,

    #[error("Failed to update {page}: the wiki rejected the write")]
    WriteRejected { page: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("Unexpected response to {method}: expected {expected}")]
    UnexpectedResponse {
        method: String,
        expected: &'static str,
    },

    #[error("Malformed XML-RPC document: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MoinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MoinError::ConfigNotFound(_)
            | MoinError::ServerNotFound { .. }
            | MoinError::NoHomeDirectory => ErrorKind::NotFound,
            MoinError::Parse { .. } => ErrorKind::Parse,
            MoinError::Validation(_) | MoinError::Serialization(_) => ErrorKind::Validation,
            MoinError::MissingCredential { .. } | MoinError::EmptyToken => {
                ErrorKind::MissingCredential
            }
            MoinError::Transport(_)
            | MoinError::WriteRejected { .. }
            | MoinError::Fault { .. }
            | MoinError::UnexpectedResponse { .. }
            | MoinError::Xml(_) => ErrorKind::TransportFailure,
            MoinError::Io(_) => ErrorKind::Io,
        }
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "(none)".to_string()
    } else {
        available.join(", ")
    }
}

impl From<reqwest::Error> for MoinError {
    fn from(err: reqwest::Error) -> Self {
        MoinError::Transport(err.to_string())
    }
}

impl From<quick_xml::Error> for MoinError {
    fn from(err: quick_xml::Error) -> Self {
        MoinError::Xml(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MoinError>;
