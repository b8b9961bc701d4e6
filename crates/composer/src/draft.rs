use crate::attachment::Attachment;

/// Unsent message state: text plus at most one attachment.
#[derive(Debug, Default)]
pub struct Draft {
    text: String,
    attachment: Option<Attachment>,
}

impl Draft {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Returns whether the text actually changed.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.text {
            return false;
        }

        self.text = text;
        true
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Installs `attachment`, dropping any previous one first.
    pub(crate) fn set_attachment(&mut self, attachment: Attachment) -> &Attachment {
        self.attachment = None;
        self.attachment.insert(attachment)
    }

    pub fn remove_attachment(&mut self) -> bool {
        self.attachment.take().is_some()
    }

    pub fn has_content(&self) -> bool {
        !self.trimmed_text().is_empty() || self.attachment.is_some()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.attachment = None;
    }
}
