use crate::clients::{HttpStatusCode, StatusCode};
use snafu::Snafu;

/// The `Result` type returned by `clients`.
pub type Result<T> = std::result::Result<T, Error>;

/// The public error type returned by `clients`.
#[derive(Debug, Snafu)]
pub struct Error(InnerError);

/// The private error type returned by `clients`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum InnerError {
    #[snafu(display("Error serializing object '{}': {}", what, source))]
    Serde {
        what: String,
        source: serde_json::Error,
    },

    #[snafu(display("{}", source))]
    Conversion { source: crate::Error },

    #[snafu(display("Unable to {} {}: {}", method, what, source))]
    KubeApiCall {
        method: String,
        what: String,
        source: kube::Error,
    },

    #[snafu(display("Object '{}' has no apiVersion and kind", name))]
    MissingTypeMeta { name: String },

    #[snafu(display("{} object has no name", kind))]
    MissingName { kind: String },
}

impl From<crate::Error> for Error {
    fn from(e: crate::Error) -> Self {
        Error(InnerError::Conversion { source: e })
    }
}

impl HttpStatusCode for InnerError {
    fn status_code(&self) -> Option<StatusCode> {
        match self {
            InnerError::Serde { .. }
            | InnerError::Conversion { .. }
            | InnerError::MissingTypeMeta { .. }
            | InnerError::MissingName { .. } => None,
            InnerError::KubeApiCall { source: e, .. } => e.status_code(),
        }
    }
}

impl HttpStatusCode for Error {
    fn status_code(&self) -> Option<StatusCode> {
        self.0.status_code()
    }
}
