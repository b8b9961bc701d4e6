use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use snafu::ResultExt;
use url::Url;

use crate::envelope::{UploadEnvelope, service_message_from_body};
use crate::error::{
    BuildClientSnafu, InvalidContentTypeSnafu, ReadBodySnafu, StatusSnafu, TransportSnafu,
    UploadResult,
};
use crate::types::{ImageUploader, UploadRequest, UploadedImage};

/// Multipart field the service reads the file from.
pub const DEFAULT_UPLOAD_FIELD: &str = "image";
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpUploaderConfig {
    pub endpoint: Url,
    pub field_name: String,
    pub timeout: Duration,
}

impl HttpUploaderConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            field_name: DEFAULT_UPLOAD_FIELD.to_string(),
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        let field_name = field_name.into();
        if !field_name.trim().is_empty() {
            self.field_name = field_name.trim().to_string();
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }
}

/// Uploads images with a single multipart `POST` to the configured endpoint.
pub struct HttpImageUploader {
    client: reqwest::Client,
    config: HttpUploaderConfig,
}

impl HttpImageUploader {
    pub fn new(config: HttpUploaderConfig) -> UploadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-upload-client",
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpUploaderConfig {
        &self.config
    }

    fn build_form(&self, request: UploadRequest) -> UploadResult<Form> {
        let length = request.size();
        // The body shares the request's buffer instead of copying it.
        let part = Part::stream_with_length(Body::from(request.bytes), length)
            .file_name(request.file_name)
            .mime_str(&request.content_type)
            .context(InvalidContentTypeSnafu {
                stage: "build-upload-part",
                content_type: request.content_type.clone(),
            })?;

        Ok(Form::new().part(self.config.field_name.clone(), part))
    }

    async fn post(&self, request: UploadRequest) -> UploadResult<UploadedImage> {
        tracing::debug!(
            endpoint = %self.config.endpoint,
            file_name = %request.file_name,
            size = request.size(),
            "uploading image"
        );

        let form = self.build_form(request)?;
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .context(TransportSnafu {
                stage: "send-upload-request",
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.context(ReadBodySnafu {
            stage: "read-upload-response",
        })?;

        interpret_response(status, &body)
    }
}

impl ImageUploader for HttpImageUploader {
    fn upload_image(&self, request: UploadRequest) -> BoxFuture<'_, UploadResult<UploadedImage>> {
        self.post(request).boxed()
    }
}

/// Maps an HTTP status and body to the upload outcome.
///
/// Non-2xx answers surface the body's nested message when one exists; 2xx
/// answers still have to pass envelope validation.
pub fn interpret_response(status: u16, body: &[u8]) -> UploadResult<UploadedImage> {
    if !(200..300).contains(&status) {
        return StatusSnafu {
            stage: "check-upload-status",
            status,
            message: service_message_from_body(body),
        }
        .fail();
    }

    UploadEnvelope::from_slice(body)?.into_uploaded_image()
}
