use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use url::Url;

// Conversation identifiers are opaque strings owned by the chat backend.
macro_rules! define_target_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_target_id!(ChatId);
define_target_id!(ReceiverId);

/// Conversation a composer sends into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationTarget {
    pub chat_id: ChatId,
    pub receiver_id: ReceiverId,
}

impl ConversationTarget {
    pub fn new(chat_id: impl Into<ChatId>, receiver_id: impl Into<ReceiverId>) -> Self {
        Self {
            chat_id: chat_id.into(),
            receiver_id: receiver_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMedia {
    pub url: Url,
    pub kind: MediaKind,
}

impl MessageMedia {
    pub fn image(url: Url) -> Self {
        Self {
            url,
            kind: MediaKind::Image,
        }
    }
}

/// Finished message handed to the send callback.
///
/// Text is already trimmed. A payload always carries text, media, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraftPayload {
    pub target: ConversationTarget,
    pub text: String,
    pub media: Option<MessageMedia>,
}

impl MessageDraftPayload {
    /// Media URL, or an empty string when the message has no media.
    pub fn media_url(&self) -> &str {
        self.media
            .as_ref()
            .map(|media| media.url.as_str())
            .unwrap_or_default()
    }

    /// Media type tag, or an empty string when the message has no media.
    pub fn media_type(&self) -> &str {
        self.media
            .as_ref()
            .map(|media| media.kind.as_str())
            .unwrap_or_default()
    }
}

impl Serialize for MessageDraftPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("MessageDraftPayload", 5)?;
        state.serialize_field("chatId", &self.target.chat_id)?;
        state.serialize_field("receiverId", &self.target.receiver_id)?;
        state.serialize_field("text", &self.text)?;
        state.serialize_field("mediaURL", self.media_url())?;
        state.serialize_field("mediaType", self.media_type())?;
        state.end()
    }
}
