//! Context of the server. Contains the configuration, token keys and the storage backends.
use std::sync::Arc;

use bb_core::{
    blob::{BlobStore, BlobUrls, FsBlobStore, UrlSigner},
    store::{MongoStore, SettingsStore},
};
use color_eyre::Result;

use crate::{
    model::{ApiError, ApiResult},
    server::{config::Config, Claims, JWTContext},
};

/// Context being shared between handlers. This will be cloned every time a handler is called.
/// So all underlying data is wrapped in [`Arc`].
#[must_use]
#[derive(Clone)]
pub struct Context {
    /// Config.
    pub(crate) config: Arc<Config>,
    /// JWT
    jwt: Arc<JWTContext>,
    /// Settings documents.
    store: Arc<dyn SettingsStore>,
    /// Uploaded logos.
    blobs: Arc<dyn BlobStore>,
}

impl Context {
    /// Connect to MongoDB and open the blob directory.
    ///
    /// # Errors
    /// Fail on invalid database url or unusable blob directory.
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let store = MongoStore::connect(
            &config.mongo_uri,
            &config.mongo_db,
            &config.collections(),
        )
        .await?;
        let blobs = FsBlobStore::new(&config.blob_dir, Self::blob_urls(&config)).await?;

        Ok(Self::with_backends(config, Arc::new(store), Arc::new(blobs)))
    }

    /// Construct self with prebuilt backends.
    pub fn with_backends(
        config: Arc<Config>,
        store: Arc<dyn SettingsStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let jwt = Arc::new(JWTContext::new(&config));
        Self {
            config,
            jwt,
            store,
            blobs,
        }
    }

    /// Urls of blobs served by this server.
    #[must_use]
    pub fn blob_urls(config: &Config) -> BlobUrls {
        BlobUrls::new(
            config.public_url.clone(),
            UrlSigner::new(config.jwt_secret.as_bytes(), config.signed_url_ttl),
        )
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn jwt(&self) -> &JWTContext {
        &self.jwt
    }

    #[must_use]
    pub fn store(&self) -> &dyn SettingsStore {
        &*self.store
    }

    #[must_use]
    pub fn blobs(&self) -> &dyn BlobStore {
        &*self.blobs
    }

    /// Encode the user id into a JWT token.
    ///
    /// # Errors
    /// Fails when encoding failed. This is unlikely to happen, but if it does, it's a bug.
    pub fn encode(&self, user_id: &str) -> ApiResult<(String, Claims)> {
        self.jwt.encode(user_id).map_err(|e| {
            tracing::error!(e = ?e, "Failed to encode JWT token");
            ApiError::internal()
        })
    }
}
