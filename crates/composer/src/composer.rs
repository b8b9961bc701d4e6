use std::sync::Arc;
use std::time::Duration;

use natter_upload::{ImageUploader, UploadError, UploadResult, UploadedImage};
use snafu::ResultExt;
use tokio::runtime::Handle;

use crate::attachment::{AttachmentPolicy, SelectedFile};
use crate::error::{AttachmentError, SendError, UploadSnafu};
use crate::payload::{ConversationTarget, MessageDraftPayload, MessageMedia};
use crate::pipeline::{ComposerState, PendingUpload, SendStep};
use crate::preview::PreviewRegistry;
use crate::typing::{DEFAULT_TYPING_IDLE, TypingListener, TypingNotifier};

/// Callbacks a [`Composer`] fires. All of them are fire-and-forget.
pub trait ComposerEvents: TypingListener {
    fn send_message(&self, payload: MessageDraftPayload);
    /// A user-visible failure the host should surface.
    fn alert(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerConfig {
    pub target: ConversationTarget,
    pub policy: AttachmentPolicy,
    pub typing_idle: Duration,
}

impl ComposerConfig {
    pub fn new(target: ConversationTarget) -> Self {
        Self {
            target,
            policy: AttachmentPolicy::default(),
            typing_idle: DEFAULT_TYPING_IDLE,
        }
    }

    pub fn with_policy(mut self, policy: AttachmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_typing_idle(mut self, typing_idle: Duration) -> Self {
        if !typing_idle.is_zero() {
            self.typing_idle = typing_idle;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// Neither text nor media; nothing was sent.
    Skipped,
}

/// Keeps "uploading" honest while the upload future is awaited. Dropping the
/// send future before the upload resolves abandons the attempt.
struct UploadInFlight<'a> {
    state: &'a mut ComposerState,
    armed: bool,
}

impl<'a> UploadInFlight<'a> {
    fn new(state: &'a mut ComposerState) -> Self {
        Self { state, armed: true }
    }

    fn finish(
        mut self,
        pending: PendingUpload,
        result: UploadResult<UploadedImage>,
    ) -> Result<MessageDraftPayload, UploadError> {
        self.armed = false;
        self.state.finish_upload(pending, result)
    }
}

impl Drop for UploadInFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.abort_upload();
        }
    }
}

/// Headless composer driven on a tokio runtime.
pub struct Composer {
    state: ComposerState,
    typing: TypingNotifier<dyn ComposerEvents>,
    uploader: Arc<dyn ImageUploader>,
    events: Arc<dyn ComposerEvents>,
}

impl Composer {
    pub fn new(
        config: ComposerConfig,
        uploader: Arc<dyn ImageUploader>,
        events: Arc<dyn ComposerEvents>,
        runtime: Handle,
    ) -> Self {
        Self::with_previews(config, uploader, events, runtime, PreviewRegistry::new())
    }

    pub fn with_previews(
        config: ComposerConfig,
        uploader: Arc<dyn ImageUploader>,
        events: Arc<dyn ComposerEvents>,
        runtime: Handle,
        previews: PreviewRegistry,
    ) -> Self {
        Self {
            state: ComposerState::new(config.target, config.policy, previews),
            typing: TypingNotifier::new(runtime, config.typing_idle, Arc::clone(&events)),
            uploader,
            events,
        }
    }

    pub fn state(&self) -> &ComposerState {
        &self.state
    }

    /// Updates the draft; typing notifications fire only when the text changed.
    pub fn update_text(&mut self, text: impl Into<String>) {
        if self.state.set_text(text) {
            self.typing.keystroke();
        }
    }

    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), AttachmentError> {
        self.state
            .attach(file)
            .map(|_| ())
            .inspect_err(|error| self.events.alert(&error.to_string()))
    }

    pub fn remove_file(&mut self) -> bool {
        self.state.remove_attachment()
    }

    pub async fn send(&mut self) -> Result<SendOutcome, SendError> {
        self.dispatch(None).await
    }

    /// Sends with media that is already hosted; the selected file, if any,
    /// is not uploaded.
    pub async fn send_with_media(&mut self, media: MessageMedia) -> Result<SendOutcome, SendError> {
        self.dispatch(Some(media)).await
    }

    async fn dispatch(&mut self, media: Option<MessageMedia>) -> Result<SendOutcome, SendError> {
        let payload = match self.state.begin_send(media) {
            SendStep::Idle | SendStep::Busy => return Ok(SendOutcome::Skipped),
            SendStep::Deliver(payload) => payload,
            SendStep::Upload(pending) => {
                let in_flight = UploadInFlight::new(&mut self.state);
                let result = self.uploader.upload_image(pending.request.clone()).await;
                in_flight
                    .finish(pending, result)
                    .context(UploadSnafu {
                        stage: "upload-attachment",
                    })
                    .inspect_err(|error| self.events.alert(&error.to_string()))?
            }
        };

        tracing::info!(
            chat_id = %payload.target.chat_id,
            has_media = payload.media.is_some(),
            "delivering composed message"
        );
        self.events.send_message(payload);
        self.state.complete_delivery();
        Ok(SendOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;
    use futures::future::BoxFuture;
    use natter_upload::{
        GENERIC_UPLOAD_FAILURE, UploadError, UploadRequest, UploadResult, UploadedImage,
    };
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use url::Url;

    use super::*;
    use crate::attachment::DEFAULT_MAX_ATTACHMENT_BYTES;

    #[derive(Default)]
    struct RecordingEvents {
        started: AtomicUsize,
        stopped: AtomicUsize,
        sent: Mutex<Vec<MessageDraftPayload>>,
        alerts: Mutex<Vec<String>>,
    }

    impl TypingListener for RecordingEvents {
        fn typing_started(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn typing_stopped(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ComposerEvents for RecordingEvents {
        fn send_message(&self, payload: MessageDraftPayload) {
            self.sent.lock().push(payload);
        }

        fn alert(&self, message: &str) {
            self.alerts.lock().push(message.to_string());
        }
    }

    enum Reply {
        Json(&'static str),
        Fail(Option<&'static str>),
        /// Never resolves.
        Hang,
    }

    struct ScriptedUploader {
        reply: Reply,
        requests: Mutex<Vec<UploadRequest>>,
    }

    impl ScriptedUploader {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().len()
        }
    }

    impl ImageUploader for ScriptedUploader {
        fn upload_image(
            &self,
            request: UploadRequest,
        ) -> BoxFuture<'_, UploadResult<UploadedImage>> {
            self.requests.lock().push(request);
            let result = match self.reply {
                Reply::Json(body) => natter_upload::interpret_response(200, body.as_bytes()),
                Reply::Fail(message) => Err(UploadError::Status {
                    stage: "scripted",
                    status: 500,
                    message: message.map(str::to_string),
                }),
                Reply::Hang => {
                    return futures::future::pending::<UploadResult<UploadedImage>>().boxed();
                }
            };
            async move { result }.boxed()
        }
    }

    struct Harness {
        composer: Composer,
        events: Arc<RecordingEvents>,
        uploader: Arc<ScriptedUploader>,
        previews: PreviewRegistry,
    }

    fn harness(reply: Reply) -> Harness {
        let events = Arc::new(RecordingEvents::default());
        let uploader = ScriptedUploader::new(reply);
        let previews = PreviewRegistry::new();
        let composer = Composer::with_previews(
            ComposerConfig::new(ConversationTarget::new("chat-9", "user-3")),
            uploader.clone(),
            events.clone(),
            Handle::current(),
            previews.clone(),
        );

        Harness {
            composer,
            events,
            uploader,
            previews,
        }
    }

    fn png(name: &str) -> SelectedFile {
        SelectedFile::new(name, "image/png", vec![3_u8; 64])
    }

    const ACCEPTED: &str = r#"{"success":true,"data":{"url":"http://x/y.png"}}"#;

    #[tokio::test]
    async fn empty_send_never_reaches_callback() {
        let mut h = harness(Reply::Json(ACCEPTED));

        assert_eq!(h.composer.send().await.expect("no error"), SendOutcome::Skipped);
        h.composer.update_text("   ");
        assert_eq!(h.composer.send().await.expect("no error"), SendOutcome::Skipped);

        assert!(h.events.sent.lock().is_empty());
        assert!(h.events.alerts.lock().is_empty());
        assert_eq!(h.uploader.calls(), 0);
    }

    #[tokio::test]
    async fn text_send_delivers_and_clears() {
        let mut h = harness(Reply::Json(ACCEPTED));
        h.composer.update_text(" hi ");

        assert_eq!(h.composer.send().await.expect("no error"), SendOutcome::Delivered);

        let sent = h.events.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hi");
        assert_eq!(sent[0].media_url(), "");
        assert_eq!(h.composer.state().text(), "");
        assert_eq!(h.uploader.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_file_is_refused_with_message() {
        let mut h = harness(Reply::Json(ACCEPTED));
        let big = SelectedFile::new(
            "big.png",
            "image/png",
            vec![0_u8; DEFAULT_MAX_ATTACHMENT_BYTES as usize + 1],
        );

        let error = h.composer.select_file(big).unwrap_err();

        assert!(matches!(error, AttachmentError::TooLarge { .. }));
        assert!(h.composer.state().attachment().is_none());
        assert_eq!(h.previews.live_count(), 0);
        assert_eq!(
            *h.events.alerts.lock(),
            vec!["File size should be less than 5MB".to_string()]
        );
    }

    #[tokio::test]
    async fn non_image_file_is_refused_with_message() {
        let mut h = harness(Reply::Json(ACCEPTED));

        let error = h
            .composer
            .select_file(SelectedFile::new("a.txt", "text/plain", b"hello".to_vec()))
            .unwrap_err();

        assert!(matches!(error, AttachmentError::NotAnImage { .. }));
        assert!(h.composer.state().attachment().is_none());
        assert_eq!(
            *h.events.alerts.lock(),
            vec!["Please select an image file".to_string()]
        );
    }

    #[tokio::test]
    async fn reselecting_keeps_only_latest_file_and_teardown_releases_it() {
        let mut h = harness(Reply::Json(ACCEPTED));

        h.composer.select_file(png("a.png")).expect("accepted");
        h.composer.select_file(png("b.png")).expect("accepted");

        assert_eq!(
            h.composer
                .state()
                .attachment()
                .map(|attachment| attachment.file.name()),
            Some("b.png")
        );
        assert_eq!(h.previews.live_count(), 1);

        drop(h.composer);
        assert_eq!(h.previews.live_count(), 0);
    }

    #[tokio::test]
    async fn successful_upload_sends_image_payload_and_clears_draft() {
        let mut h = harness(Reply::Json(ACCEPTED));
        h.composer.select_file(png("y.png")).expect("accepted");

        assert_eq!(h.composer.send().await.expect("upload ok"), SendOutcome::Delivered);

        {
            let sent = h.events.sent.lock();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].media_url(), "http://x/y.png");
            assert_eq!(sent[0].media_type(), "image");
            assert_eq!(sent[0].text, "");
        }
        assert_eq!(h.uploader.calls(), 1);
        assert!(h.composer.state().attachment().is_none());
        assert!(!h.composer.state().is_uploading());
        assert_eq!(h.composer.state().picker_epoch(), 1);
        assert_eq!(h.previews.live_count(), 0);
    }

    #[tokio::test]
    async fn failed_upload_keeps_file_and_alerts() {
        let mut h = harness(Reply::Fail(Some("Storage quota exceeded")));
        h.composer.update_text("look at this");
        h.composer.select_file(png("y.png")).expect("accepted");

        let error = h.composer.send().await.unwrap_err();

        assert_eq!(error.to_string(), "Storage quota exceeded");
        assert!(h.events.sent.lock().is_empty());
        assert_eq!(
            *h.events.alerts.lock(),
            vec!["Storage quota exceeded".to_string()]
        );
        assert!(h.composer.state().attachment().is_some());
        assert_eq!(h.composer.state().text(), "look at this");
        assert!(!h.composer.state().is_uploading());
    }

    #[tokio::test]
    async fn malformed_success_uses_generic_message() {
        let mut h = harness(Reply::Json(r#"{"success":true,"data":{}}"#));
        h.composer.select_file(png("y.png")).expect("accepted");

        let error = h.composer.send().await.unwrap_err();

        assert_eq!(error.to_string(), GENERIC_UPLOAD_FAILURE);
        assert!(matches!(
            error.upload_error(),
            UploadError::MalformedResponse { .. }
        ));
        assert!(h.events.sent.lock().is_empty());
        assert!(h.composer.state().attachment().is_some());
    }

    #[tokio::test]
    async fn retry_after_failure_uploads_again() {
        let mut h = harness(Reply::Fail(None));
        h.composer.select_file(png("y.png")).expect("accepted");

        assert!(h.composer.send().await.is_err());
        assert!(h.composer.send().await.is_err());

        assert_eq!(h.uploader.calls(), 2);
        assert_eq!(
            *h.events.alerts.lock(),
            vec![GENERIC_UPLOAD_FAILURE.to_string(); 2]
        );
    }

    #[tokio::test]
    async fn supplied_media_is_sent_without_upload() {
        let mut h = harness(Reply::Fail(None));
        h.composer.select_file(png("y.png")).expect("accepted");
        let media = MessageMedia::image(Url::parse("https://cdn/already.png").expect("static url"));

        let outcome = h.composer.send_with_media(media).await.expect("no upload");

        assert_eq!(outcome, SendOutcome::Delivered);
        assert_eq!(h.uploader.calls(), 0);
        assert_eq!(h.events.sent.lock()[0].media_url(), "https://cdn/already.png");
        assert!(h.composer.state().attachment().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn typing_notifications_follow_text_updates() {
        let mut h = harness(Reply::Json(ACCEPTED));

        h.composer.update_text("h");
        h.composer.update_text("he");
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.composer.update_text("hey");
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert_eq!(h.events.started.load(Ordering::SeqCst), 3);
        assert_eq!(h.events.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(h.composer.state().text(), "hey");
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_text_does_not_restart_typing() {
        let mut h = harness(Reply::Json(ACCEPTED));

        h.composer.update_text("same");
        h.composer.update_text("same");
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert_eq!(h.events.started.load(Ordering::SeqCst), 1);
        assert_eq!(h.events.stopped.load(Ordering::SeqCst), 1);

        h.composer.update_text("same");
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert_eq!(h.events.started.load(Ordering::SeqCst), 1);
        assert_eq!(h.events.stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_send_does_not_leave_composer_uploading() {
        let mut h = harness(Reply::Hang);
        h.composer.select_file(png("y.png")).expect("accepted");

        let timed_out = tokio::time::timeout(Duration::from_secs(5), h.composer.send()).await;

        assert!(timed_out.is_err());
        assert_eq!(h.uploader.calls(), 1);
        assert!(!h.composer.state().is_uploading());
        assert!(h.composer.state().attachment().is_some());
        assert!(h.composer.state().can_submit());

        h.composer.remove_file();
        h.composer.update_text("hello");

        assert_eq!(h.composer.send().await.expect("text only"), SendOutcome::Delivered);
        assert_eq!(h.events.sent.lock()[0].text, "hello");
        assert!(h.events.alerts.lock().is_empty());
    }

    #[test]
    fn zero_typing_idle_keeps_default() {
        let config = ComposerConfig::new(ConversationTarget::new("c", "r"))
            .with_typing_idle(Duration::ZERO);

        assert_eq!(config.typing_idle, DEFAULT_TYPING_IDLE);
    }
}
