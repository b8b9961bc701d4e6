use snafu::Snafu;

/// Message shown when the service gave no usable explanation.
pub const GENERIC_UPLOAD_FAILURE: &str = "Failed to upload image";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum UploadError {
    #[snafu(display("failed to build upload http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("upload content type '{content_type}' is invalid: {source}"))]
    InvalidContentType {
        stage: &'static str,
        content_type: String,
        source: reqwest::Error,
    },
    #[snafu(display("upload request failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to read upload response body on `{stage}`: {source}"))]
    ReadBody {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("upload service returned status {status}"))]
    Status {
        stage: &'static str,
        status: u16,
        message: Option<String>,
    },
    #[snafu(display("upload service rejected the image"))]
    Rejected {
        stage: &'static str,
        message: Option<String>,
    },
    #[snafu(display("upload response is malformed: {details}"))]
    MalformedResponse {
        stage: &'static str,
        details: String,
        message: Option<String>,
    },
    #[snafu(display("upload service returned an invalid url '{raw}': {source}"))]
    InvalidUrl {
        stage: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[snafu(display("upload task was interrupted: {details}"))]
    Interrupted {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("no upload service is available: {details}"))]
    Unavailable {
        stage: &'static str,
        details: String,
    },
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    /// Explanation supplied by the upload service itself, if any.
    pub fn service_message(&self) -> Option<&str> {
        let message = match self {
            Self::Status { message, .. }
            | Self::Rejected { message, .. }
            | Self::MalformedResponse { message, .. } => message.as_deref(),
            _ => None,
        };

        message.map(str::trim).filter(|message| !message.is_empty())
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        self.service_message()
            .unwrap_or(GENERIC_UPLOAD_FAILURE)
            .to_string()
    }

    /// Stage tag recorded where the error was raised.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::BuildClient { stage, .. }
            | Self::InvalidContentType { stage, .. }
            | Self::Transport { stage, .. }
            | Self::ReadBody { stage, .. }
            | Self::Status { stage, .. }
            | Self::Rejected { stage, .. }
            | Self::MalformedResponse { stage, .. }
            | Self::InvalidUrl { stage, .. }
            | Self::Interrupted { stage, .. }
            | Self::Unavailable { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_service_text() {
        let error = UploadError::Rejected {
            stage: "test",
            message: Some("  Image too wide  ".to_string()),
        };

        assert_eq!(error.service_message(), Some("Image too wide"));
        assert_eq!(error.user_message(), "Image too wide");
    }

    #[test]
    fn user_message_falls_back_when_service_is_silent() {
        let blank = UploadError::Status {
            stage: "test",
            status: 502,
            message: Some("   ".to_string()),
        };
        let interrupted = UploadError::Interrupted {
            stage: "test",
            details: "runtime shut down".to_string(),
        };

        assert_eq!(blank.user_message(), GENERIC_UPLOAD_FAILURE);
        assert_eq!(interrupted.user_message(), GENERIC_UPLOAD_FAILURE);
        assert_eq!(interrupted.stage(), "test");
    }
}
