#![deny(unsafe_code)]

/// Desktop chat composer built with GPUI and gpui-component.
///
/// The composing logic lives in `natter-composer`; this crate wires it to a
/// window, settings on disk and the upload service.
pub mod app;
/// Chat pane and the message composer widget.
pub mod chat;
/// Settings persistence.
pub mod settings;
