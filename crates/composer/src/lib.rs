#![deny(unsafe_code)]

//! Runtime-agnostic core of the chat message composer.
//!
//! [`ComposerState`] holds the draft and walks the send pipeline one step at a
//! time so any UI runtime can drive it. [`Composer`] is the headless driver
//! built on tokio.
pub mod attachment;
pub mod composer;
pub mod draft;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod preview;
pub mod typing;

pub use attachment::{Attachment, AttachmentPolicy, DEFAULT_MAX_ATTACHMENT_BYTES, SelectedFile};
pub use composer::{Composer, ComposerConfig, ComposerEvents, SendOutcome};
pub use draft::Draft;
pub use error::{AttachmentError, SendError};
pub use payload::{
    ChatId, ConversationTarget, MediaKind, MessageDraftPayload, MessageMedia, ReceiverId,
};
pub use pipeline::{ComposerState, PendingUpload, SendStep};
pub use preview::{PREVIEW_SCHEME, PreviewHandle, PreviewRegistry, PreviewSource, PreviewUrl};
pub use typing::{
    DEFAULT_TYPING_IDLE, TypingDebounce, TypingListener, TypingNotifier, TypingTicket,
};
