use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::attachment::SelectedFile;

pub const PREVIEW_SCHEME: &str = "preview";

/// Locally generated address of a not-yet-uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    fn generate() -> Self {
        Self(format!("{PREVIEW_SCHEME}://{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewUrl {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Data a renderer needs to display a preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSource {
    pub media_type: String,
    pub bytes: Bytes,
}

/// Table of live preview handles.
///
/// Clones share one table. An entry exists exactly as long as its
/// [`PreviewHandle`] does.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<Mutex<HashMap<PreviewUrl, PreviewSource>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, file: &SelectedFile) -> PreviewHandle {
        let url = PreviewUrl::generate();
        self.entries.lock().insert(
            url.clone(),
            PreviewSource {
                media_type: file.declared_type().to_string(),
                bytes: file.bytes().clone(),
            },
        );
        tracing::trace!(preview = %url, "acquired preview handle");

        PreviewHandle {
            url,
            registry: self.clone(),
        }
    }

    pub fn resolve(&self, url: &PreviewUrl) -> Option<PreviewSource> {
        self.entries.lock().get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.entries.lock().len()
    }

    fn release(&self, url: &PreviewUrl) {
        if self.entries.lock().remove(url).is_some() {
            tracing::trace!(preview = %url, "released preview handle");
        }
    }
}

/// Owned preview entry; dropping it revokes the URL.
#[derive(Debug)]
pub struct PreviewHandle {
    url: PreviewUrl,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn url(&self) -> &PreviewUrl {
        &self.url
    }

    pub fn source(&self) -> Option<PreviewSource> {
        self.registry.resolve(&self.url)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(&self.url);
    }
}
