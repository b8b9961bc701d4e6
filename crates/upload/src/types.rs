use bytes::Bytes;
use futures::future::BoxFuture;
use url::Url;

use crate::error::UploadResult;

/// One image ready to be sent to the upload service.
///
/// `bytes` is reference counted, so cloning a request does not copy the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadRequest {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Remote location of an image the service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub url: Url,
}

pub trait ImageUploader: Send + Sync {
    fn upload_image(&self, request: UploadRequest) -> BoxFuture<'_, UploadResult<UploadedImage>>;
}
