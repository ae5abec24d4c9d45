//! Mock implementations.
//!
//! In-memory collaborators for tests. Both can be switched into a failing mode
//! to exercise error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use url::Url;

use crate::blob::{validate_path, Blob, BlobStore, BlobUrls, Visibility};
use crate::error::{Error, Result};
use crate::models::{BrandingProfile, BrandingUpdate, SavedSetting, UserSettings};
use crate::store::SettingsStore;
use crate::utils::new_id;

fn unavailable(what: &str) -> Error {
    Error::Backend(format!("{what} unavailable"))
}

#[derive(Debug, Default)]
struct Tables {
    settings: HashMap<String, UserSettings>,
    saved: HashMap<String, Vec<SavedSetting>>,
    branding: HashMap<String, BrandingProfile>,
}

/// A mock settings store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable("Settings store"))
        } else {
            Ok(())
        }
    }

    /// Number of distinct users having any record.
    pub async fn user_count(&self) -> usize {
        let tables = self.tables.read().await;
        let mut users: Vec<&String> = tables
            .settings
            .keys()
            .chain(tables.saved.keys())
            .chain(tables.branding.keys())
            .collect();
        users.sort();
        users.dedup();
        users.len()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        self.check()?;
        Ok(self.tables.read().await.settings.get(user_id).cloned())
    }

    async fn set_settings(&self, user_id: &str, settings: &UserSettings) -> Result<()> {
        self.check()?;
        self.tables
            .write()
            .await
            .settings
            .insert(user_id.to_owned(), settings.clone());
        Ok(())
    }

    async fn init_settings(&self, user_id: &str, defaults: &UserSettings) -> Result<UserSettings> {
        self.check()?;
        Ok(self
            .tables
            .write()
            .await
            .settings
            .entry(user_id.to_owned())
            .or_insert_with(|| defaults.clone())
            .clone())
    }

    async fn list_saved(&self, user_id: &str) -> Result<Vec<SavedSetting>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .saved
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_saved(&self, user_id: &str, settings: &UserSettings) -> Result<SavedSetting> {
        self.check()?;
        let saved = SavedSetting {
            setting_id: new_id(),
            settings: settings.clone(),
            created_at: SystemTime::now(),
        };
        self.tables
            .write()
            .await
            .saved
            .entry(user_id.to_owned())
            .or_default()
            .push(saved.clone());
        Ok(saved)
    }

    async fn get_saved(&self, user_id: &str, setting_id: &str) -> Result<Option<SavedSetting>> {
        self.check()?;
        Ok(self.tables.read().await.saved.get(user_id).and_then(|list| {
            list.iter()
                .find(|saved| saved.setting_id == setting_id)
                .cloned()
        }))
    }

    async fn delete_saved(&self, user_id: &str, setting_id: &str) -> Result<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        Ok(tables.saved.get_mut(user_id).map_or(false, |list| {
            let before = list.len();
            list.retain(|saved| saved.setting_id != setting_id);
            list.len() != before
        }))
    }

    async fn put_branding(
        &self,
        user_id: &str,
        update: &BrandingUpdate,
    ) -> Result<BrandingProfile> {
        self.check()?;
        let profile = BrandingProfile {
            brand_name: update.brand_name.clone(),
            logo_url: update.logo_url.clone(),
            color: update.color.clone(),
            last_updated: SystemTime::now(),
        };
        self.tables
            .write()
            .await
            .branding
            .insert(user_id.to_owned(), profile.clone());
        Ok(profile)
    }

    async fn get_branding(&self, user_id: &str) -> Result<Option<BrandingProfile>> {
        self.check()?;
        Ok(self.tables.read().await.branding.get(user_id).cloned())
    }
}

/// A mock blob store. Urls are built like the real store's.
#[derive(Debug)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, (Blob, Visibility)>>,
    urls: BlobUrls,
    failing: AtomicBool,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(urls: BlobUrls) -> Self {
        Self {
            objects: RwLock::default(),
            urls,
            failing: AtomicBool::new(false),
        }
    }

    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable("Blob store"))
        } else {
            Ok(())
        }
    }

    /// Paths of all stored objects, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Visibility an object was stored with.
    pub async fn visibility(&self, path: &str) -> Option<Visibility> {
        self.objects.read().await.get(path).map(|(_, v)| *v)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, blob: Blob, visibility: Visibility) -> Result<Url> {
        self.check()?;
        let path = validate_path(path)?;
        self.objects
            .write()
            .await
            .insert(path.to_owned(), (blob, visibility));
        self.urls.object_url(path)
    }

    async fn signed_url(&self, path: &str) -> Result<Url> {
        self.check()?;
        self.urls.signed_url(path)
    }

    async fn fetch(&self, path: &str, token: Option<&str>) -> Result<Option<Blob>> {
        self.check()?;
        let path = validate_path(path)?;
        if let Some(token) = token {
            self.urls.verify(path, token)?;
        }
        Ok(self
            .objects
            .read()
            .await
            .get(path)
            .filter(|(_, visibility)| token.is_some() || *visibility == Visibility::Public)
            .map(|(blob, _)| blob.clone()))
    }
}
