use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use natter_composer::{
    AttachmentPolicy, ConversationTarget, DEFAULT_MAX_ATTACHMENT_BYTES, DEFAULT_TYPING_IDLE,
};
use natter_upload::{DEFAULT_UPLOAD_FIELD, DEFAULT_UPLOAD_TIMEOUT, HttpUploaderConfig};
use serde::{Deserialize, Deserializer, Serialize};
use snafu::{ResultExt, Snafu};
use url::Url;

pub const DEFAULT_UPLOAD_ENDPOINT: &str = "http://localhost:5000/api/upload/image";
pub const DEFAULT_CHAT_ID: &str = "general";
pub const DEFAULT_RECEIVER_ID: &str = "everyone";
pub const SETTINGS_DIRECTORY_NAME: &str = "natter";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Environment overrides, e.g. `NATTER_UPLOAD_ENDPOINT`.
pub const SETTINGS_ENV_PREFIX: &str = "NATTER_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerSettings {
    #[serde(default = "default_upload_endpoint")]
    pub upload_endpoint: String,
    #[serde(default = "default_upload_field")]
    pub upload_field: String,
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
    #[serde(default = "default_typing_idle_ms")]
    pub typing_idle_ms: u64,
    #[serde(default = "default_chat_id", deserialize_with = "deserialize_id")]
    pub chat_id: String,
    #[serde(default = "default_receiver_id", deserialize_with = "deserialize_id")]
    pub receiver_id: String,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            upload_endpoint: default_upload_endpoint(),
            upload_field: default_upload_field(),
            upload_timeout_secs: default_upload_timeout_secs(),
            max_attachment_bytes: default_max_attachment_bytes(),
            typing_idle_ms: default_typing_idle_ms(),
            chat_id: default_chat_id(),
            receiver_id: default_receiver_id(),
        }
    }
}

impl ComposerSettings {
    pub fn normalized(mut self) -> Self {
        self.upload_endpoint = non_blank_or(self.upload_endpoint, default_upload_endpoint);
        self.upload_field = non_blank_or(self.upload_field, default_upload_field);
        self.chat_id = non_blank_or(self.chat_id, default_chat_id);
        self.receiver_id = non_blank_or(self.receiver_id, default_receiver_id);

        // Zero limits would reject every file or fire "stopped" immediately.
        if self.upload_timeout_secs == 0 {
            self.upload_timeout_secs = default_upload_timeout_secs();
        }
        if self.max_attachment_bytes == 0 {
            self.max_attachment_bytes = default_max_attachment_bytes();
        }
        if self.typing_idle_ms == 0 {
            self.typing_idle_ms = default_typing_idle_ms();
        }

        self
    }

    pub fn uploader_config(&self) -> Result<HttpUploaderConfig, SettingsError> {
        let endpoint = Url::parse(&self.upload_endpoint).context(InvalidEndpointSnafu {
            stage: "parse-upload-endpoint",
            raw: self.upload_endpoint.clone(),
        })?;

        Ok(HttpUploaderConfig::new(endpoint)
            .with_field_name(self.upload_field.as_str())
            .with_timeout(Duration::from_secs(self.upload_timeout_secs)))
    }

    pub fn attachment_policy(&self) -> AttachmentPolicy {
        AttachmentPolicy::new(self.max_attachment_bytes)
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }

    pub fn conversation_target(&self) -> ConversationTarget {
        ConversationTarget::new(self.chat_id.as_str(), self.receiver_id.as_str())
    }
}

pub struct SettingsStore {
    settings: Arc<ComposerSettings>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".natter"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(settings),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ComposerSettings> {
        Arc::clone(&self.settings)
    }

    /// Writes the current settings out when no file exists yet, so there is
    /// something to edit.
    pub fn write_if_missing(&self) -> Result<bool, SettingsError> {
        if self.config_path.exists() {
            return Ok(false);
        }

        self.persist(&self.settings())?;
        Ok(true)
    }

    fn load_from_disk(path: &PathBuf) -> ComposerSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let figment = Figment::from(Serialized::defaults(ComposerSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(SETTINGS_ENV_PREFIX));

        match figment.extract::<ComposerSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                ComposerSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ComposerSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("upload endpoint '{raw}' is not a valid URL on `{stage}`: {source}"))]
    InvalidEndpoint {
        stage: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Accepts ids written as numbers, as `NATTER_CHAT_ID=1234` arrives from the
/// environment.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Unsigned(number) => number.to_string(),
        RawId::Signed(number) => number.to_string(),
    })
}

fn non_blank_or(value: String, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn default_upload_endpoint() -> String {
    DEFAULT_UPLOAD_ENDPOINT.to_string()
}

fn default_upload_field() -> String {
    DEFAULT_UPLOAD_FIELD.to_string()
}

fn default_upload_timeout_secs() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT.as_secs()
}

fn default_max_attachment_bytes() -> u64 {
    DEFAULT_MAX_ATTACHMENT_BYTES
}

fn default_typing_idle_ms() -> u64 {
    DEFAULT_TYPING_IDLE.as_millis() as u64
}

fn default_chat_id() -> String {
    DEFAULT_CHAT_ID.to_string()
}

fn default_receiver_id() -> String {
    DEFAULT_RECEIVER_ID.to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[::core::prelude::v1::test]
    fn normalization_restores_blank_and_zero_fields() {
        let settings = ComposerSettings {
            upload_endpoint: "  ".to_string(),
            upload_field: " file ".to_string(),
            upload_timeout_secs: 0,
            max_attachment_bytes: 0,
            typing_idle_ms: 0,
            chat_id: " room-1 ".to_string(),
            receiver_id: String::new(),
        }
        .normalized();

        assert_eq!(
            settings,
            ComposerSettings {
                upload_field: "file".to_string(),
                chat_id: "room-1".to_string(),
                ..ComposerSettings::default()
            }
        );
        assert_eq!(settings.typing_idle(), Duration::from_secs(1));
        assert_eq!(settings.attachment_policy(), AttachmentPolicy::default());
    }

    #[::core::prelude::v1::test]
    fn uploader_config_rejects_invalid_endpoint() {
        let settings = ComposerSettings {
            upload_endpoint: "not a url".to_string(),
            ..ComposerSettings::default()
        };

        let error = settings.uploader_config().unwrap_err();

        assert!(matches!(error, SettingsError::InvalidEndpoint { .. }));
    }

    #[::core::prelude::v1::test]
    fn uploader_config_carries_field_and_timeout() {
        let settings = ComposerSettings {
            upload_field: "file".to_string(),
            upload_timeout_secs: 12,
            ..ComposerSettings::default()
        };

        let config = settings.uploader_config().expect("default endpoint parses");

        assert_eq!(config.endpoint.as_str(), DEFAULT_UPLOAD_ENDPOINT);
        assert_eq!(config.field_name, "file");
        assert_eq!(config.timeout, Duration::from_secs(12));
    }

    #[::core::prelude::v1::test]
    fn file_and_env_layers_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "chat_id": "from-file", "typing_idle_ms": 250 }"#,
            )?;
            jail.set_env("NATTER_RECEIVER_ID", "from-env");

            let store = SettingsStore::new(PathBuf::from(SETTINGS_FILE_NAME));
            let settings = store.settings();

            assert_eq!(settings.chat_id, "from-file");
            assert_eq!(settings.receiver_id, "from-env");
            assert_eq!(settings.typing_idle(), Duration::from_millis(250));
            assert_eq!(settings.upload_endpoint, DEFAULT_UPLOAD_ENDPOINT);
            Ok(())
        });
    }

    #[::core::prelude::v1::test]
    fn malformed_file_falls_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(SETTINGS_FILE_NAME, "{ not json")?;

            let store = SettingsStore::new(PathBuf::from(SETTINGS_FILE_NAME));

            assert_eq!(*store.settings(), ComposerSettings::default());
            Ok(())
        });
    }

    #[::core::prelude::v1::test]
    fn numeric_ids_from_env_keep_file_layer() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "receiver_id": 42, "typing_idle_ms": 250 }"#,
            )?;
            jail.set_env("NATTER_CHAT_ID", "1234");

            let store = SettingsStore::new(PathBuf::from(SETTINGS_FILE_NAME));
            let settings = store.settings();

            assert_eq!(settings.chat_id, "1234");
            assert_eq!(settings.receiver_id, "42");
            assert_eq!(settings.typing_idle(), Duration::from_millis(250));
            Ok(())
        });
    }

    #[::core::prelude::v1::test]
    fn defaults_are_written_once_and_reload() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("nested").join(SETTINGS_FILE_NAME);
        let store = SettingsStore::new(path.clone());

        assert!(store.write_if_missing().expect("defaults written"));
        assert!(!store.write_if_missing().expect("file exists"));
        assert!(!path.with_extension("json.tmp").exists());

        assert_eq!(*SettingsStore::new(path).settings(), ComposerSettings::default());
    }
}
