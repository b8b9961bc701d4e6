use std::path::PathBuf;

use natter_upload::UploadError;
use snafu::Snafu;

/// Reasons a picked file is refused before it reaches the draft.
///
/// Display strings are shown to the user verbatim.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AttachmentError {
    #[snafu(display("File size should be less than {limit_label}"))]
    TooLarge {
        stage: &'static str,
        size: u64,
        limit: u64,
        limit_label: String,
    },
    #[snafu(display("Please select an image file"))]
    NotAnImage {
        stage: &'static str,
        declared_type: String,
    },
    #[snafu(display("failed to read attachment at {path:?}: {source}"))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SendError {
    #[snafu(display("{}", source.user_message()))]
    Upload {
        stage: &'static str,
        source: UploadError,
    },
}

impl SendError {
    pub fn upload_error(&self) -> &UploadError {
        match self {
            Self::Upload { source, .. } => source,
        }
    }
}
