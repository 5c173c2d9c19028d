use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use plantae_transport::{
    CsrfTokenProvider, DEFAULT_BASE_URL, DEFAULT_CSRF_HEADER, DEFAULT_REQUEST_TIMEOUT, Endpoints,
    StaticCsrfToken, TransportConfig,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::icons::IconSet;

pub const DEFAULT_FIRST_NAME: &str = "User";
pub const SETTINGS_DIRECTORY_NAME: &str = "plantae";
pub const SETTINGS_FILE_NAME: &str = "widget.json";
/// Environment overrides, e.g. `PLANTAE_BASE_URL` or `PLANTAE_ENDPOINTS__ASK`.
pub const ENV_PREFIX: &str = "PLANTAE_";

/// Which endpoint answers a submitted variation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeRoute {
    /// `resume_data` multipart field on the ask endpoint.
    #[default]
    Ask,
    /// JSON `{variations}` body on the dedicated variation endpoint.
    VariationSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSettings {
    pub user_first_name: String,
    pub base_url: String,
    pub endpoints: Endpoints,
    pub icons: IconSet,
    pub csrf_token: String,
    pub csrf_header: String,
    /// Login session as `name=value`, e.g. `sessionid=...`.
    pub session_cookie: String,
    pub request_timeout_secs: u64,
    pub resume_route: ResumeRoute,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            user_first_name: DEFAULT_FIRST_NAME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: Endpoints::default(),
            icons: IconSet::default(),
            csrf_token: String::new(),
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            session_cookie: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            resume_route: ResumeRoute::default(),
        }
    }
}

impl WidgetSettings {
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        self.user_first_name = non_blank(self.user_first_name, defaults.user_first_name);
        self.base_url = non_blank(self.base_url, defaults.base_url);
        self.csrf_header = non_blank(self.csrf_header, defaults.csrf_header);
        self.csrf_token = self.csrf_token.trim().to_string();
        self.session_cookie = self.session_cookie.trim().to_string();
        self.endpoints = self.endpoints.normalized();
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = defaults.request_timeout_secs;
        }

        self
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.base_url.clone())
            .with_endpoints(self.endpoints.clone())
            .with_csrf_header(self.csrf_header.clone())
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_session_cookie(self.session_cookie.clone())
    }

    pub fn csrf_provider(&self) -> Arc<dyn CsrfTokenProvider> {
        Arc::new(StaticCsrfToken::new(self.csrf_token.clone()))
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<WidgetSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".plantae"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<WidgetSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: WidgetSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from_disk(path: &Path) -> WidgetSettings {
        if !path.exists() {
            tracing::info!(path = ?path, "settings file not found, using defaults");
        }

        let figment = Figment::from(Serialized::defaults(WidgetSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        match figment.extract::<WidgetSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(path = ?path, %error, "failed to parse settings, using defaults");
                WidgetSettings::default()
            }
        }
    }

    fn persist(&self, settings: &WidgetSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-widget-config-dir",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "encode-widget-settings",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-widget-settings-temp",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "swap-widget-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = ?self.config_path, "saved widget settings");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot create widget config directory {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot encode widget settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("cannot write widget settings to {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "cannot move widget settings {from:?} into place at {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn non_blank(value: String, fallback: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("absent.json"));

        assert_eq!(store.settings().endpoints, Endpoints::default());
        assert_eq!(store.settings().resume_route, ResumeRoute::Ask);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(
            &path,
            r#"{
                "user_first_name": "  Ada ",
                "endpoints": {"ask": "/api/ask/", "tts": "  "},
                "resume_route": "variation_selection"
            }"#,
        )
        .expect("write settings");

        let settings = SettingsStore::new(path).settings();

        assert_eq!(settings.user_first_name, "Ada");
        assert_eq!(settings.endpoints.ask, "/api/ask/");
        assert_eq!(settings.endpoints.tts, Endpoints::default().tts);
        assert_eq!(settings.endpoints.history, Endpoints::default().history);
        assert_eq!(settings.resume_route, ResumeRoute::VariationSelection);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ not json").expect("write settings");

        let settings = SettingsStore::new(path).settings();

        assert_eq!(settings.user_first_name, DEFAULT_FIRST_NAME);
    }

    #[test]
    fn update_persists_normalized_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);
        let store = SettingsStore::new(path.clone());

        store
            .update(WidgetSettings {
                csrf_token: " abc ".to_string(),
                request_timeout_secs: 0,
                ..WidgetSettings::default()
            })
            .expect("persist settings");

        let reloaded = SettingsStore::new(path).settings();
        assert_eq!(reloaded.csrf_token, "abc");
        assert_eq!(
            reloaded.request_timeout_secs,
            DEFAULT_REQUEST_TIMEOUT.as_secs()
        );
        assert_eq!(store.settings().csrf_token, "abc");
    }

    #[test]
    fn transport_config_reflects_settings() {
        let settings = WidgetSettings {
            base_url: "https://shop.example/".to_string(),
            csrf_header: "X-Token".to_string(),
            request_timeout_secs: 5,
            session_cookie: "sessionid=abc".to_string(),
            ..WidgetSettings::default()
        };

        let config = settings.transport_config();

        assert_eq!(config.base_url, "https://shop.example/");
        assert_eq!(config.csrf_header, "X-Token");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.session_cookie.as_deref(), Some("sessionid=abc"));
        assert_eq!(WidgetSettings::default().transport_config().session_cookie, None);
        assert_eq!(settings.csrf_provider().token(), None);
    }
}
