use gpui::SharedString;
use natter_composer::MessageDraftPayload;

/// Emitted once per delivered message, after any attachment has been uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub payload: MessageDraftPayload,
}

/// Emitted on every draft edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypingStarted;

/// Emitted once the draft has been idle for the configured interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypingStopped;

/// A user-facing failure: a rejected attachment or a failed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerAlert {
    pub message: SharedString,
}

impl SendMessage {
    pub fn new(payload: MessageDraftPayload) -> Self {
        Self { payload }
    }
}

impl ComposerAlert {
    pub fn new(message: impl Into<SharedString>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
