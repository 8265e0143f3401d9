use std::fmt;

use serde::Serialize;

use crate::loader::LoaderError;

/// Terminal failure of a route load. Everything recoverable is reported through
/// the diagnostics sink instead; only these variants abort the load.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum RouteError {
    /// No dialect recognises the file.
    UnrecognizedFormat { file: String },
    IoError { message: String },
    /// A collaborator failed in a way the interpreter cannot recover from.
    /// Carries the collaborator's own error value.
    Loader(LoaderError),
    SettingsError { message: String },
    /// The whole file was processed but no command established any track.
    NoTrackGeometry { file: String },
    Cancelled,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::UnrecognizedFormat { file } => {
                write!(f, "No route parser recognises {file}")
            }
            RouteError::IoError { message } => write!(f, "I/O error: {message}"),
            RouteError::Loader(e) => write!(f, "Loader failure: {e}"),
            RouteError::SettingsError { message } => {
                write!(f, "Failed to load settings: {message}")
            }
            RouteError::NoTrackGeometry { file } => {
                write!(f, "{file} does not define any track")
            }
            RouteError::Cancelled => write!(f, "Route loading was cancelled"),
        }
    }
}

impl std::error::Error for RouteError {}

impl From<std::io::Error> for RouteError {
    fn from(e: std::io::Error) -> Self {
        RouteError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<LoaderError> for RouteError {
    fn from(e: LoaderError) -> Self {
        RouteError::Loader(e)
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(e: serde_json::Error) -> Self {
        RouteError::SettingsError {
            message: e.to_string(),
        }
    }
}
