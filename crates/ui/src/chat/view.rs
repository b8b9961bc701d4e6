use std::sync::Arc;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use natter_composer::{
    ComposerState, ConversationTarget, MessageDraftPayload, PreviewRegistry,
};
use natter_upload::{HttpImageUploader, ImageUploader};

use crate::chat::MessageInput;
use crate::chat::events::{ComposerAlert, SendMessage, TypingStarted, TypingStopped};
use crate::settings::{ComposerSettings, SettingsStore};

/// Conversation pane: the messages sent from this window above the composer.
///
/// Delivery to the chat backend happens outside this crate; sent payloads are
/// kept here so the user sees what left the composer.
pub struct ChatView {
    message_input: Entity<MessageInput>,
    target: ConversationTarget,
    sent: Vec<MessageDraftPayload>,
    typing: bool,
    uploader_error: Option<String>,
}

impl EventEmitter<ComposerAlert> for ChatView {}
impl EventEmitter<SendMessage> for ChatView {}

impl ChatView {
    pub fn new(
        settings_store: &SettingsStore,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let settings = settings_store.settings();
        let target = settings.conversation_target();
        let (uploader, uploader_error) = match Self::initialize_uploader(&settings) {
            Ok(uploader) => (Some(uploader), None),
            Err(error) => (None, Some(error)),
        };

        let composer = ComposerState::new(
            target.clone(),
            settings.attachment_policy(),
            PreviewRegistry::new(),
        );
        let typing_idle = settings.typing_idle();
        let message_input =
            cx.new(|cx| MessageInput::new(composer, uploader, typing_idle, window, cx));

        cx.subscribe(&message_input, |this, _, event: &SendMessage, cx| {
            this.handle_send(event.clone(), cx);
        })
        .detach();

        cx.subscribe(&message_input, |this, _, _event: &TypingStarted, cx| {
            this.set_typing(true, cx);
        })
        .detach();

        cx.subscribe(&message_input, |this, _, _event: &TypingStopped, cx| {
            this.set_typing(false, cx);
        })
        .detach();

        cx.subscribe(&message_input, |_, _, event: &ComposerAlert, cx| {
            cx.emit(event.clone());
        })
        .detach();

        Self {
            message_input,
            target,
            sent: Vec::new(),
            typing: false,
            uploader_error,
        }
    }

    fn initialize_uploader(
        settings: &ComposerSettings,
    ) -> Result<Arc<dyn ImageUploader>, String> {
        let config = settings.uploader_config().map_err(|error| {
            tracing::warn!(error = %error, "upload endpoint rejected, attachments disabled");
            error.to_string()
        })?;

        let uploader = HttpImageUploader::new(config).map_err(|error| {
            tracing::warn!(error = %error, "failed to build upload client, attachments disabled");
            error.to_string()
        })?;

        tracing::info!(endpoint = %uploader.config().endpoint, "image uploader ready");
        Ok(Arc::new(uploader))
    }

    pub fn target(&self) -> &ConversationTarget {
        &self.target
    }

    fn handle_send(&mut self, event: SendMessage, cx: &mut Context<Self>) {
        self.typing = false;
        self.sent.push(event.payload.clone());
        cx.emit(event);
        cx.notify();
    }

    fn set_typing(&mut self, typing: bool, cx: &mut Context<Self>) {
        if self.typing != typing {
            self.typing = typing;
            cx.notify();
        }
    }

    fn render_sent(
        &self,
        index: usize,
        payload: &MessageDraftPayload,
        cx: &Context<Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let media_url = payload.media_url().to_string();

        v_flex()
            .id(("sent-message", index))
            .self_end()
            .max_w(relative(0.75))
            .gap_1()
            .px_3()
            .py_2()
            .rounded_lg()
            .bg(theme.secondary)
            .text_color(theme.secondary_foreground)
            .when(!payload.text.is_empty(), |el| el.child(payload.text.clone()))
            .when(!media_url.is_empty(), |el| {
                el.child(
                    div()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .truncate()
                        .child(media_url),
                )
            })
            .into_any_element()
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let sent = self
            .sent
            .iter()
            .enumerate()
            .map(|(index, payload)| self.render_sent(index, payload, cx))
            .collect::<Vec<_>>();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                v_flex()
                    .id("chat-view-message-list")
                    .flex_1()
                    .min_h_0()
                    .gap_2()
                    .p_3()
                    .overflow_y_scroll()
                    .children(sent),
            )
            .when_some(self.uploader_error.clone(), |el, error| {
                el.child(
                    div()
                        .id("chat-view-uploader-error")
                        .px_3()
                        .text_xs()
                        .text_color(theme.danger)
                        .child(format!("Image upload unavailable: {error}")),
                )
            })
            .when(self.typing, |el| {
                el.child(
                    div()
                        .id("chat-view-typing")
                        .px_3()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child("Typing..."),
                )
            })
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.message_input.clone()),
            )
    }
}
