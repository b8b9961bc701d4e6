pub mod state;

pub use state::{ComposerSettings, SettingsError, SettingsStore};
