/// Event contracts emitted by the composer widget.
pub mod events;
pub mod message_input;
pub mod view;

pub use events::{ComposerAlert, SendMessage, TypingStarted, TypingStopped};
pub use message_input::MessageInput;
pub use view::ChatView;
