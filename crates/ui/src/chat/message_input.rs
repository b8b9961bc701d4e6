use std::sync::Arc;
use std::time::Duration;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use natter_composer::{
    Attachment, ComposerState, MessageDraftPayload, MessageMedia, PendingUpload, PreviewUrl,
    SelectedFile, SendStep, TypingDebounce,
};
use natter_upload::{ImageUploader, UploadError, UploadResult, UploadedImage};

use crate::chat::events::{ComposerAlert, SendMessage, TypingStarted, TypingStopped};

const PREVIEW_SIZE: f32 = 64.0;

/// Chat composer: text input, single image attachment and send control.
///
/// Text edits drive the typing notifications. Sending walks the
/// [`ComposerState`] pipeline, uploading the attachment on the tokio runtime
/// before a [`SendMessage`] is emitted.
pub struct MessageInput {
    input_state: Entity<InputState>,
    composer: ComposerState,
    uploader: Option<Arc<dyn ImageUploader>>,
    typing_idle: Duration,
    typing: TypingDebounce,
    typing_task: Option<Task<()>>,
    upload_task: Option<Task<()>>,
    picker_task: Option<Task<()>>,
    preview_image: Option<(PreviewUrl, Arc<Image>)>,
    pending_newline: bool,
}

impl EventEmitter<SendMessage> for MessageInput {}
impl EventEmitter<TypingStarted> for MessageInput {}
impl EventEmitter<TypingStopped> for MessageInput {}
impl EventEmitter<ComposerAlert> for MessageInput {}

impl MessageInput {
    pub fn new(
        composer: ComposerState,
        uploader: Option<Arc<dyn ImageUploader>>,
        typing_idle: Duration,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Type your message...")
                .clean_on_escape()
                .auto_grow(3, 10)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| match event {
                InputEvent::PressEnter { secondary } => {
                    if *secondary {
                        this.pending_newline = false;
                        return;
                    }

                    if this.pending_newline {
                        // Shift+Enter inserts the newline itself and still emits PressEnter.
                        this.pending_newline = false;
                    } else {
                        this.trim_trailing_newline(window, cx);
                        this.submit(window, cx);
                    }
                }
                _ => this.sync_text(cx),
            },
        )
        .detach();

        Self {
            input_state,
            composer,
            uploader,
            typing_idle,
            typing: TypingDebounce::default(),
            typing_task: None,
            upload_task: None,
            picker_task: None,
            preview_image: None,
            pending_newline: false,
        }
    }

    pub fn composer(&self) -> &ComposerState {
        &self.composer
    }

    /// Sends the draft using the attachment if there is one.
    pub fn submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.sync_text(cx);
        let step = self.composer.begin_send(None);
        self.run_step(step, window, cx);
    }

    /// Sends the draft with media that was already uploaded elsewhere.
    pub fn submit_with_media(
        &mut self,
        media: MessageMedia,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.sync_text(cx);
        let step = self.composer.begin_send(Some(media));
        self.run_step(step, window, cx);
    }

    pub fn select_file(&mut self, file: SelectedFile, cx: &mut Context<Self>) {
        match self.composer.attach(file) {
            Ok(attachment) => {
                let preview = decode_preview(attachment);
                self.preview_image = preview;
            }
            Err(error) => cx.emit(ComposerAlert::new(error.to_string())),
        }
        cx.notify();
    }

    pub fn remove_file(&mut self, cx: &mut Context<Self>) {
        if self.composer.remove_attachment() {
            self.preview_image = None;
            cx.notify();
        }
    }

    fn sync_text(&mut self, cx: &mut Context<Self>) {
        let value = self.input_state.read(cx).value().to_string();
        if !self.composer.set_text(value) {
            return;
        }

        cx.emit(TypingStarted);
        let ticket = self.typing.keystroke();
        let idle = self.typing_idle;

        // Replacing the task drops the previous timer.
        self.typing_task = Some(cx.spawn(async move |this, cx| {
            cx.background_executor().timer(idle).await;

            let _ = this.update(cx, |this, cx| {
                this.typing_task = None;
                if this.typing.elapsed(ticket) {
                    cx.emit(TypingStopped);
                }
            });
        }));
    }

    fn run_step(&mut self, step: SendStep, window: &mut Window, cx: &mut Context<Self>) {
        match step {
            SendStep::Idle | SendStep::Busy => {}
            SendStep::Deliver(payload) => self.deliver(payload, window, cx),
            SendStep::Upload(pending) => self.spawn_upload(pending, window, cx),
        }
        cx.notify();
    }

    fn spawn_upload(
        &mut self,
        pending: PendingUpload,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let Some(uploader) = self.uploader.clone() else {
            let error = UploadError::Unavailable {
                stage: "resolve-uploader",
                details: "upload endpoint is not configured".to_string(),
            };
            self.finish_upload(pending, Err(error), window, cx);
            return;
        };

        let request = pending.request.clone();
        let upload = Tokio::spawn(cx, async move { uploader.upload_image(request).await });

        self.upload_task = Some(cx.spawn_in(window, async move |this, cx| {
            let result = match upload.await {
                Ok(result) => result,
                Err(error) => Err(UploadError::Interrupted {
                    stage: "join-upload-task",
                    details: error.to_string(),
                }),
            };

            let _ = this.update_in(cx, |this, window, cx| {
                this.upload_task = None;
                this.finish_upload(pending, result, window, cx);
            });
        }));
    }

    fn finish_upload(
        &mut self,
        pending: PendingUpload,
        result: UploadResult<UploadedImage>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        match self.composer.finish_upload(pending, result) {
            Ok(payload) => self.deliver(payload, window, cx),
            Err(error) => cx.emit(ComposerAlert::new(error.user_message())),
        }
        cx.notify();
    }

    fn deliver(
        &mut self,
        payload: MessageDraftPayload,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        tracing::info!(
            chat_id = %payload.target.chat_id,
            receiver_id = %payload.target.receiver_id,
            has_media = payload.media.is_some(),
            "message handed to send callback"
        );
        cx.emit(SendMessage::new(payload));

        self.composer.complete_delivery();
        self.preview_image = None;
        self.picker_task = None;
        self.clear_input(window, cx);
    }

    fn open_picker(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let epoch = self.composer.picker_epoch();
        let paths = cx.prompt_for_paths(PathPromptOptions {
            files: true,
            directories: false,
            multiple: false,
            prompt: Some("Attach image".into()),
        });

        self.picker_task = Some(cx.spawn_in(window, async move |this, cx| {
            let path = match paths.await {
                Ok(Ok(Some(paths))) => paths.into_iter().next(),
                Ok(Ok(None)) | Err(_) => None,
                Ok(Err(error)) => {
                    tracing::warn!(error = %error, "file picker failed");
                    None
                }
            };
            let Some(path) = path else {
                return;
            };

            let selected = cx
                .background_executor()
                .spawn(async move { SelectedFile::from_path(path) })
                .await;

            let _ = this.update_in(cx, |this, _window, cx| {
                this.picker_task = None;
                // A send completed while the picker was open.
                if this.composer.picker_epoch() != epoch {
                    return;
                }

                match selected {
                    Ok(file) => this.select_file(file, cx),
                    Err(error) => {
                        tracing::warn!(error = %error, "failed to read selected file");
                        cx.emit(ComposerAlert::new(error.to_string()));
                    }
                }
            });
        }));
    }

    fn clear_input(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
        self.pending_newline = false;
    }

    fn handle_shift_enter(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.pending_newline = true;
        self.input_state.update(cx, |state, cx| {
            state.insert("\n", window, cx);
        });
        cx.notify();
    }

    fn trim_trailing_newline(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            let value = state.value().to_string();
            if let Some(trimmed) = value.strip_suffix('\n') {
                state.set_value(trimmed.to_string(), window, cx);
            }
        });
    }

    fn render_attachment(&self, attachment: &Attachment, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let preview = self
            .preview_image
            .as_ref()
            .filter(|(url, _)| url == attachment.preview.url())
            .map(|(_, image)| image.clone());
        let uploading = self.composer.is_uploading();

        h_flex()
            .id("message-input-attachment")
            .gap_2()
            .items_center()
            .child(
                div()
                    .size(px(PREVIEW_SIZE))
                    .flex_shrink_0()
                    .rounded_md()
                    .overflow_hidden()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .when_some(preview, |el, image| {
                        el.child(img(image).size_full().object_fit(ObjectFit::Cover))
                    }),
            )
            .child(
                div()
                    .flex_1()
                    .min_w_0()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .truncate()
                    .child(attachment.file.name().to_string()),
            )
            .child(
                Button::new("remove-attachment")
                    .ghost()
                    .small()
                    .icon(IconName::Close)
                    .disabled(uploading)
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.remove_file(cx);
                    })),
            )
            .into_any_element()
    }
}

/// Decodes the attachment bytes for display. Formats gpui cannot draw get a
/// blank placeholder.
fn decode_preview(attachment: &Attachment) -> Option<(PreviewUrl, Arc<Image>)> {
    let source = attachment.preview.source()?;
    let format = preview_format(&source.media_type)?;
    let image = Image::from_bytes(format, source.bytes.to_vec());
    Some((attachment.preview.url().clone(), Arc::new(image)))
}

fn preview_format(media_type: &str) -> Option<ImageFormat> {
    ImageFormat::from_mime_type(&media_type.trim().to_ascii_lowercase())
}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let uploading = self.composer.is_uploading();
        let can_submit = self.composer.can_submit();
        let attachment = self
            .composer
            .attachment()
            .map(|attachment| self.render_attachment(attachment, cx));

        v_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .when_some(attachment, |el, attachment| el.child(attachment))
            .child(
                div()
                    .w_full()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        if event.keystroke.key == "enter" && event.keystroke.modifiers.shift {
                            this.handle_shift_enter(window, cx);
                        }
                    }))
                    .child(Input::new(&self.input_state).w_full()),
            )
            .child(
                h_flex()
                    .w_full()
                    .justify_between()
                    .items_center()
                    .child(
                        Button::new("attach-image")
                            .ghost()
                            .small()
                            .icon(IconName::Plus)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.open_picker(window, cx);
                            })),
                    )
                    .child(
                        Button::new("send")
                            .small()
                            .primary()
                            .icon(IconName::ArrowUp)
                            .child(if uploading { "Uploading..." } else { "Send" })
                            .loading(uploading)
                            .disabled(!can_submit)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.submit(window, cx);
                            })),
                    ),
            )
    }
}
