use std::path::Path;

use bytes::Bytes;
use mime::Mime;
use natter_upload::UploadRequest;
use snafu::{ResultExt, ensure};

use crate::error::{AttachmentError, NotAnImageSnafu, ReadFileSnafu, TooLargeSnafu};
use crate::preview::PreviewHandle;

const MIB: u64 = 1024 * 1024;
const KIB: u64 = 1024;

pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 5 * MIB;

const FALLBACK_DECLARED_TYPE: &str = "application/octet-stream";

/// A file the user picked, as declared by the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    declared_type: String,
    bytes: Bytes,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, declaring its type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).context(ReadFileSnafu {
            stage: "read-attachment",
            path: path.to_path_buf(),
        })?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let declared_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(FALLBACK_DECLARED_TYPE);

        Ok(Self::new(name, declared_type, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn media_type(&self) -> Option<Mime> {
        self.declared_type.trim().parse().ok()
    }

    pub fn is_image(&self) -> bool {
        self.media_type()
            .is_some_and(|media_type| media_type.type_() == mime::IMAGE)
    }

    pub fn to_upload_request(&self) -> UploadRequest {
        UploadRequest::new(
            self.name.clone(),
            self.declared_type.clone(),
            self.bytes.clone(),
        )
    }
}

/// Limits applied to a picked file before it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_bytes: u64,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

impl AttachmentPolicy {
    pub fn new(max_bytes: u64) -> Self {
        if max_bytes == 0 {
            return Self::default();
        }

        Self { max_bytes }
    }

    /// Size is checked before type.
    pub fn validate(&self, file: &SelectedFile) -> Result<(), AttachmentError> {
        ensure!(
            file.size() <= self.max_bytes,
            TooLargeSnafu {
                stage: "validate-attachment-size",
                size: file.size(),
                limit: self.max_bytes,
                limit_label: self.limit_label(),
            }
        );
        ensure!(
            file.is_image(),
            NotAnImageSnafu {
                stage: "validate-attachment-type",
                declared_type: file.declared_type().to_string(),
            }
        );
        Ok(())
    }

    pub fn limit_label(&self) -> String {
        if self.max_bytes >= MIB && self.max_bytes % MIB == 0 {
            format!("{}MB", self.max_bytes / MIB)
        } else {
            format!("{}KB", self.max_bytes.div_ceil(KIB))
        }
    }
}

/// Accepted file together with its preview.
#[derive(Debug)]
pub struct Attachment {
    pub file: SelectedFile,
    pub preview: PreviewHandle,
}
