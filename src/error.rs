use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KptagError {
    #[error("Error: Output {} exists (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),
    #[error("Error: keepassxc-cli output did not contain an XML document")]
    NoXmlMarker,
    #[error("Error: No entries tagged with {0:?} were found")]
    NothingExported(Vec<String>),
    #[error("Error: Malformed database export: {0}")]
    MalformedDocument(String),
    #[error("Error: User aborted")]
    UserAbort,
    #[error("Error: Temporary directory {} does not exist", .0.display())]
    TempDirMissing(PathBuf),
    #[error("Error: {0} exited with {1}")]
    CommandFailed(String, ExitStatus),
}
