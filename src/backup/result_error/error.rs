use crate::backup::result_error::{AddFunctionName, AddMsg};
use std::path::PathBuf;
use thiserror::Error;
use thiserror_ext::Construct;

#[derive(Error, Debug, Construct)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
    #[error("Missing required flag ({flag}) for provider {provider}")]
    MissingFlag { flag: String, provider: String },
    #[error("Failed to execute {program:?}: {error}")]
    ProcessSpawn {
        program: String,
        error: std::io::Error,
    },
    #[error("{:?} exited with {}:\n{}", program, status, indent::indent_all_with("  ", output.to_string()))]
    ProcessFailed {
        program: String,
        status: String,
        output: String,
    },
    #[error("Device discovery failed: {0}")]
    DeviceDiscovery(String),
    #[error("Invalid device id {0:?}")]
    InvalidDeviceId(String),
    #[error("Backup directory {0:?} is missing or empty")]
    EmptyBackupDirectory(PathBuf),
    #[error("Unexpected response from {url}: {status} - {body}")]
    UnexpectedResponse {
        url: String,
        status: String,
        body: String,
    },
    #[error("Upload to {0} returned no result")]
    NoUploadResult(String),
    #[error("Invalid endpoint {0:?}")]
    InvalidEndpoint(String),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFnName { fn_name: String, error: Box<Error> },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Self::WithFnName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(|e| e.into_iter())),
            e => Box::new(std::iter::once(e)),
        }
    }

    /// Peels off context wrappers and returns the error that caused them.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } | Error::WithFnName { error, .. } => error.root(),
            e => e,
        }
    }
}
