//! WebDAV sync target.
//!
//! There is no wire protocol yet: every call validates its input, waits for
//! the configured delay and reports what it would have done. Connection
//! settings are kept in `webdav.toml` as plain text.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::datastore::DataStore;
use crate::event::Event;
use crate::notice::Notice;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebDavSettings {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl WebDavSettings {
    pub fn validate(&self) -> Result<(), WebDavError> {
        let url = self.url.trim().to_ascii_lowercase();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(WebDavError::InvalidUrl(self.url.clone()));
        }
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(WebDavError::MissingCredentials);
        }
        Ok(())
    }

    #[tracing::instrument(skip(store))]
    pub fn load(store: &DataStore) -> anyhow::Result<Option<Self>> {
        store.load_toml(&store.webdav_path)
    }

    #[tracing::instrument(skip_all, fields(url = %self.url))]
    pub fn save(&self, store: &DataStore) -> anyhow::Result<()> {
        store.save_toml(&store.webdav_path, self)
    }

    pub fn forget(store: &DataStore) -> anyhow::Result<bool> {
        store.remove(&store.webdav_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebDavError {
    #[error("not a WebDAV URL: {0}")]
    InvalidUrl(String),

    #[error("username and password are required")]
    MissingCredentials,

    #[error("no WebDAV connection is configured")]
    NotConnected,
}

impl WebDavError {
    pub fn notice(&self) -> Notice {
        match self {
            WebDavError::InvalidUrl(url) => Notice::error(
                "Invalid server URL",
                format!("\"{url}\" must start with http:// or https://."),
            ),
            WebDavError::MissingCredentials => Notice::error(
                "Missing credentials",
                "Enter both a username and a password for the WebDAV server.",
            ),
            WebDavError::NotConnected => Notice::error(
                "Not connected",
                "Run `lifeline webdav connect <url> <username>` first.",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub events: usize,
}

#[derive(Debug, Clone)]
pub struct WebDavSync {
    settings: Option<WebDavSettings>,
    delay: Duration,
}

impl WebDavSync {
    pub fn new(settings: Option<WebDavSettings>, delay: Duration) -> Self {
        Self { settings, delay }
    }

    pub fn from_config(cfg: &Config, settings: Option<WebDavSettings>) -> anyhow::Result<Self> {
        let delay = cfg
            .get_u64("webdav.delay_ms")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DELAY);
        Ok(Self::new(settings, delay))
    }

    fn settings(&self) -> Result<&WebDavSettings, WebDavError> {
        let settings = self.settings.as_ref().ok_or(WebDavError::NotConnected)?;
        settings.validate()?;
        Ok(settings)
    }

    async fn round_trip(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn test_connection(&self) -> Result<Notice, WebDavError> {
        let settings = self.settings()?;
        self.round_trip().await;
        info!(url = %settings.url, "webdav connection ok");
        Ok(Notice::success(
            "Connection successful",
            format!("Connected to {} as {}.", settings.url, settings.username),
        ))
    }

    #[tracing::instrument(skip_all, fields(events = events.len()))]
    pub async fn save(&self, events: &[Event]) -> Result<SyncReport, WebDavError> {
        let settings = self.settings()?;
        self.round_trip().await;
        debug!(url = %settings.url, "webdav save finished");
        Ok(SyncReport {
            events: events.len(),
        })
    }

    /// Remote events. The server side is not implemented, so this is always
    /// empty.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Result<Vec<Event>, WebDavError> {
        let settings = self.settings()?;
        self.round_trip().await;
        debug!(url = %settings.url, "webdav load finished");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn settings() -> WebDavSettings {
        WebDavSettings {
            url: "https://dav.example.com/lifeline".to_string(),
            username: "me".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn validates_url_and_credentials() {
        assert!(settings().validate().is_ok());

        let mut bad_url = settings();
        bad_url.url = "ftp://dav.example.com".to_string();
        assert!(matches!(
            bad_url.validate(),
            Err(WebDavError::InvalidUrl(_))
        ));

        let mut no_password = settings();
        no_password.password.clear();
        assert_eq!(
            no_password.validate(),
            Err(WebDavError::MissingCredentials)
        );
    }

    #[test]
    fn settings_persist_and_forget() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");

        assert_eq!(WebDavSettings::load(&store).expect("load"), None);
        settings().save(&store).expect("save");
        assert_eq!(
            WebDavSettings::load(&store).expect("load"),
            Some(settings())
        );
        assert!(WebDavSettings::forget(&store).expect("forget"));
        assert!(!WebDavSettings::forget(&store).expect("forget again"));
    }

    #[tokio::test]
    async fn calls_require_a_connection() {
        let sync = WebDavSync::new(None, Duration::ZERO);
        assert_eq!(
            sync.test_connection().await,
            Err(WebDavError::NotConnected)
        );
        assert_eq!(sync.save(&[]).await, Err(WebDavError::NotConnected));
    }

    #[tokio::test]
    async fn simulated_calls_succeed_with_valid_settings() {
        let sync = WebDavSync::new(Some(settings()), Duration::ZERO);
        let notice = sync.test_connection().await.expect("test");
        assert!(!notice.is_failure());
        assert_eq!(
            sync.save(&[]).await.expect("save"),
            SyncReport { events: 0 }
        );
        assert!(sync.load().await.expect("load").is_empty());
    }

    #[test]
    fn delay_comes_from_config() {
        let mut cfg = Config::default();
        cfg.set("webdav.delay_ms", "0");
        let sync = WebDavSync::from_config(&cfg, None).expect("sync");
        assert!(sync.delay.is_zero());

        cfg.set("webdav.delay_ms", "soon");
        assert!(WebDavSync::from_config(&cfg, None).is_err());
    }
}
