//! Client side of the image upload service used by the composer.
//!
//! The service answers with a JSON envelope that is never trusted as-is; see
//! [`UploadEnvelope`] for the rules applied before a URL is adopted.
pub mod envelope;
pub mod error;
pub mod http;
pub mod types;

pub use envelope::{UploadEnvelope, service_message_from_body};
pub use error::{GENERIC_UPLOAD_FAILURE, UploadError, UploadResult};
pub use http::{
    DEFAULT_UPLOAD_FIELD, DEFAULT_UPLOAD_TIMEOUT, HttpImageUploader, HttpUploaderConfig,
    interpret_response,
};
pub use types::{ImageUploader, UploadRequest, UploadedImage};
