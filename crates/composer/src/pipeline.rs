use natter_upload::{UploadError, UploadRequest, UploadResult, UploadedImage};

use crate::attachment::{Attachment, AttachmentPolicy, SelectedFile};
use crate::draft::Draft;
use crate::error::AttachmentError;
use crate::payload::{ConversationTarget, MessageDraftPayload, MessageMedia};
use crate::preview::PreviewRegistry;

/// Next thing the driver has to do after [`ComposerState::begin_send`].
#[derive(Debug)]
pub enum SendStep {
    /// Nothing to send; the request is dropped silently.
    Idle,
    /// An upload for an earlier send is still outstanding.
    Busy,
    /// Upload `request`, then hand the result to [`ComposerState::finish_upload`].
    Upload(PendingUpload),
    /// Deliver the payload, then call [`ComposerState::complete_delivery`].
    Deliver(MessageDraftPayload),
}

/// Send attempt parked on the upload call.
#[derive(Debug)]
pub struct PendingUpload {
    pub text: String,
    pub request: UploadRequest,
}

/// Draft and send-pipeline state for one composer.
///
/// The pipeline is split into steps so the caller owns the only suspension
/// point, the upload call. "Uploading" is set by `begin_send` and cleared by
/// `finish_upload` whatever the outcome.
#[derive(Debug)]
pub struct ComposerState {
    target: ConversationTarget,
    policy: AttachmentPolicy,
    previews: PreviewRegistry,
    draft: Draft,
    uploading: bool,
    picker_epoch: u64,
}

impl ComposerState {
    pub fn new(
        target: ConversationTarget,
        policy: AttachmentPolicy,
        previews: PreviewRegistry,
    ) -> Self {
        Self {
            target,
            policy,
            previews,
            draft: Draft::default(),
            uploading: false,
            picker_epoch: 0,
        }
    }

    pub fn target(&self) -> &ConversationTarget {
        &self.target
    }

    pub fn set_target(&mut self, target: ConversationTarget) {
        self.target = target;
    }

    pub fn policy(&self) -> AttachmentPolicy {
        self.policy
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn text(&self) -> &str {
        self.draft.text()
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        self.draft.set_text(text)
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.draft.attachment()
    }

    /// Validates and installs `file`. A rejected file leaves the draft as it was.
    pub fn attach(&mut self, file: SelectedFile) -> Result<&Attachment, AttachmentError> {
        if let Err(error) = self.policy.validate(&file) {
            tracing::debug!(
                file_name = %file.name(),
                size = file.size(),
                declared_type = %file.declared_type(),
                error = %error,
                "rejected attachment"
            );
            return Err(error);
        }

        // Release the old preview before acquiring the new one.
        self.draft.remove_attachment();
        let preview = self.previews.acquire(&file);
        Ok(self.draft.set_attachment(Attachment { file, preview }))
    }

    pub fn remove_attachment(&mut self) -> bool {
        self.draft.remove_attachment()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    /// Whether a submit control should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.uploading && self.draft.has_content()
    }

    /// Bumped on every delivery so pickers can reset themselves.
    pub fn picker_epoch(&self) -> u64 {
        self.picker_epoch
    }

    pub fn begin_send(&mut self, supplied_media: Option<MessageMedia>) -> SendStep {
        if self.uploading {
            return SendStep::Busy;
        }

        let text = self.draft.trimmed_text().to_string();

        if supplied_media.is_none()
            && let Some(attachment) = self.draft.attachment()
        {
            self.uploading = true;
            return SendStep::Upload(PendingUpload {
                text,
                request: attachment.file.to_upload_request(),
            });
        }

        self.finalize(text, supplied_media)
            .map_or(SendStep::Idle, SendStep::Deliver)
    }

    pub fn finish_upload(
        &mut self,
        pending: PendingUpload,
        result: UploadResult<UploadedImage>,
    ) -> Result<MessageDraftPayload, UploadError> {
        self.uploading = false;

        match result {
            Ok(image) => {
                tracing::debug!(url = %image.url, "image upload accepted");
                Ok(MessageDraftPayload {
                    target: self.target.clone(),
                    text: pending.text,
                    media: Some(MessageMedia::image(image.url)),
                })
            }
            Err(error) => {
                tracing::warn!(
                    stage = error.stage(),
                    file_name = %pending.request.file_name,
                    error = %error,
                    "image upload failed; draft kept for retry"
                );
                Err(error)
            }
        }
    }

    /// Clears "uploading" for an attempt whose upload was abandoned. The
    /// draft is kept so the user can retry.
    pub(crate) fn abort_upload(&mut self) {
        if self.uploading {
            tracing::debug!("image upload abandoned before it resolved");
            self.uploading = false;
        }
    }

    pub fn complete_delivery(&mut self) {
        self.draft.clear();
        self.picker_epoch = self.picker_epoch.wrapping_add(1);
    }

    fn finalize(&self, text: String, media: Option<MessageMedia>) -> Option<MessageDraftPayload> {
        if text.is_empty() && media.is_none() {
            return None;
        }

        Some(MessageDraftPayload {
            target: self.target.clone(),
            text,
            media,
        })
    }
}
