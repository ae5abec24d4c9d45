//! API config.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use bb_core::store::Collections;
use color_eyre::Result;
use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use url::Url;

/// Secret used when none is configured. Tokens signed with it are forgeable.
pub const INSECURE_JWT_SECRET: &str = "change-me";

/// API config.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Config {
    /// Bind address for API server.
    pub bind: SocketAddr,
    /// Url the server is reachable at. Blob urls are built below it.
    pub public_url: Url,
    /// Deployment project, only logged.
    pub project_id: Option<String>,
    /// Application id. Tokens must carry it as audience.
    pub app_id: String,
    /// MongoDB connection string.
    pub mongo_uri: String,
    /// MongoDB database name.
    pub mongo_db: String,
    /// Collection of current settings.
    pub settings_collection: String,
    /// Collection of saved settings.
    pub saved_collection: String,
    /// Collection holding branding profiles.
    pub app_settings_collection: String,
    /// Directory uploaded blobs are kept in.
    pub blob_dir: PathBuf,
    /// Secret for bearer tokens and signed urls.
    pub jwt_secret: String,
    /// Lifetime of minted bearer tokens.
    #[serde(with = "humantime_serde")]
    pub token_timeout: Duration,
    /// Lifetime of signed blob urls.
    #[serde(with = "humantime_serde")]
    pub signed_url_ttl: Duration,
    /// Maximum size of a multipart body in bytes.
    pub max_upload_size: usize,
}

impl Config {
    /// Load config from environment variables.
    ///
    /// # Errors
    /// Returns error if part of the config is invalid.
    pub fn from_env() -> Result<Self> {
        Ok(Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("BRANDBOARD_"))
            .extract()?)
    }

    #[must_use]
    pub fn collections(&self) -> Collections {
        Collections {
            settings: self.settings_collection.clone(),
            saved: self.saved_collection.clone(),
            app_settings: self.app_settings_collection.clone(),
        }
    }

    #[must_use]
    pub fn has_insecure_secret(&self) -> bool {
        self.jwt_secret == INSECURE_JWT_SECRET
    }
}

impl Default for Config {
    fn default() -> Self {
        let Collections {
            settings,
            saved,
            app_settings,
        } = Collections::default();

        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            public_url: Url::parse("http://127.0.0.1:8000/").expect("Static url is valid"),
            project_id: None,
            app_id: String::from("brandboard-default-app-id"),
            mongo_uri: String::from("mongodb://localhost:27017"),
            mongo_db: String::from("brandboard-db"),
            settings_collection: settings,
            saved_collection: saved,
            app_settings_collection: app_settings,
            blob_dir: PathBuf::from("blobs"),
            jwt_secret: String::from(INSECURE_JWT_SECRET),
            token_timeout: Duration::from_secs(24 * 60 * 60),
            signed_url_ttl: Duration::from_secs(15 * 60),
            max_upload_size: 10 * 1024 * 1024,
        }
    }
}
