//! Settings document store.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, DateTime},
    options::{
        FindOneAndUpdateOptions, FindOptions, IndexOptions, ReplaceOptions, ReturnDocument,
    },
    Client, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{
    BrandingProfile, BrandingUpdate, SavedSetting, UserSettings, BRANDING_PROFILE_ID,
};
use crate::utils::new_id;

/// Interface of the per-user settings store.
///
/// Every record is scoped to one user id. Writes overwrite whole documents and
/// concurrent writers race with last-writer-wins semantics.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the settings of a user.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>>;

    /// Replace the settings of a user.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn set_settings(&self, user_id: &str, settings: &UserSettings) -> Result<()>;

    /// Store `defaults` unless the user already has settings, then return what is stored.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn init_settings(&self, user_id: &str, defaults: &UserSettings) -> Result<UserSettings>;

    /// All saved settings of a user, oldest first.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn list_saved(&self, user_id: &str) -> Result<Vec<SavedSetting>>;

    /// Save a snapshot under a freshly generated id.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn insert_saved(&self, user_id: &str, settings: &UserSettings) -> Result<SavedSetting>;

    /// Fetch one saved snapshot.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn get_saved(&self, user_id: &str, setting_id: &str) -> Result<Option<SavedSetting>>;

    /// Delete one saved snapshot. Returns whether something was deleted.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn delete_saved(&self, user_id: &str, setting_id: &str) -> Result<bool>;

    /// Overwrite the branding profile and stamp it with the store's time.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn put_branding(&self, user_id: &str, update: &BrandingUpdate)
        -> Result<BrandingProfile>;

    /// Fetch the branding profile of a user.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    async fn get_branding(&self, user_id: &str) -> Result<Option<BrandingProfile>>;
}

/// Collection names used by [`MongoStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    /// Current settings, one document per user.
    pub settings: String,
    /// Saved snapshots.
    pub saved: String,
    /// Per-user app settings holding the branding profile.
    pub app_settings: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            settings: String::from("user_settings"),
            saved: String::from("saved_settings"),
            app_settings: String::from("app_settings"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsDoc {
    user_id: String,
    settings: UserSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedDoc {
    user_id: String,
    setting_id: String,
    settings: UserSettings,
    created_at: DateTime,
}

impl From<SavedDoc> for SavedSetting {
    fn from(doc: SavedDoc) -> Self {
        Self {
            setting_id: doc.setting_id,
            settings: doc.settings,
            created_at: doc.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BrandingDoc {
    user_id: String,
    doc_id: String,
    brand_name: String,
    logo_url: String,
    color: String,
    last_updated: DateTime,
}

impl From<BrandingDoc> for BrandingProfile {
    fn from(doc: BrandingDoc) -> Self {
        Self {
            brand_name: doc.brand_name,
            logo_url: doc.logo_url,
            color: doc.color,
            last_updated: doc.last_updated.to_system_time(),
        }
    }
}

/// Make sure a payload converts to BSON before it's written.
fn storable(settings: &UserSettings) -> Result<()> {
    to_bson(settings)
        .map(drop)
        .map_err(|e| Error::Unstorable(e.to_string()))
}

/// Settings store backed by `MongoDB`.
#[derive(Debug, Clone)]
pub struct MongoStore {
    settings: Collection<SettingsDoc>,
    saved: Collection<SavedDoc>,
    app_settings: Collection<BrandingDoc>,
}

impl MongoStore {
    /// Connect to a `MongoDB` server and make sure indexes exist.
    ///
    /// # Errors
    /// Returns an error if the connection string is invalid or indexes can't be created.
    pub async fn connect(uri: &str, db: &str, collections: &Collections) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let store = Self::new(&client.database(db), collections);
        store.ensure_indexes().await?;

        info!(db, "Connected to MongoDB");
        Ok(store)
    }

    /// Construct self with a preconnected database.
    #[must_use]
    pub fn new(db: &Database, collections: &Collections) -> Self {
        Self {
            settings: db.collection(&collections.settings),
            saved: db.collection(&collections.saved),
            app_settings: db.collection(&collections.app_settings),
        }
    }

    /// Create the unique indexes documents are looked up by.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.settings
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.saved
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "setting_id": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.app_settings
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "doc_id": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;

        debug!("Indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MongoStore {
    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        Ok(self
            .settings
            .find_one(doc! { "user_id": user_id }, None)
            .await?
            .map(|doc| doc.settings))
    }

    async fn set_settings(&self, user_id: &str, settings: &UserSettings) -> Result<()> {
        storable(settings)?;
        let doc = SettingsDoc {
            user_id: user_id.to_owned(),
            settings: settings.clone(),
        };
        self.settings
            .replace_one(
                doc! { "user_id": user_id },
                doc,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn init_settings(&self, user_id: &str, defaults: &UserSettings) -> Result<UserSettings> {
        let defaults = to_bson(defaults)?;
        self.settings
            .find_one_and_update(
                doc! { "user_id": user_id },
                doc! { "$setOnInsert": { "settings": defaults } },
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .map(|doc| doc.settings)
            .ok_or_else(|| Error::Backend(format!("Upsert of settings for `{user_id}` returned nothing")))
    }

    async fn list_saved(&self, user_id: &str) -> Result<Vec<SavedSetting>> {
        let docs: Vec<SavedDoc> = self
            .saved
            .find(
                doc! { "user_id": user_id },
                FindOptions::builder()
                    .sort(doc! { "created_at": 1, "setting_id": 1 })
                    .build(),
            )
            .await?
            .try_collect()
            .await?;

        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn insert_saved(&self, user_id: &str, settings: &UserSettings) -> Result<SavedSetting> {
        storable(settings)?;
        let doc = SavedDoc {
            user_id: user_id.to_owned(),
            setting_id: new_id(),
            settings: settings.clone(),
            created_at: DateTime::now(),
        };
        self.saved.insert_one(&doc, None).await?;

        debug!(user_id, setting_id = %doc.setting_id, "Saved setting inserted");
        Ok(doc.into())
    }

    async fn get_saved(&self, user_id: &str, setting_id: &str) -> Result<Option<SavedSetting>> {
        Ok(self
            .saved
            .find_one(doc! { "user_id": user_id, "setting_id": setting_id }, None)
            .await?
            .map(Into::into))
    }

    async fn delete_saved(&self, user_id: &str, setting_id: &str) -> Result<bool> {
        let res = self
            .saved
            .delete_one(doc! { "user_id": user_id, "setting_id": setting_id }, None)
            .await?;
        Ok(res.deleted_count > 0)
    }

    async fn put_branding(
        &self,
        user_id: &str,
        update: &BrandingUpdate,
    ) -> Result<BrandingProfile> {
        self.app_settings
            .find_one_and_update(
                doc! { "user_id": user_id, "doc_id": BRANDING_PROFILE_ID },
                doc! {
                    "$set": {
                        "brand_name": update.brand_name.as_str(),
                        "logo_url": update.logo_url.as_str(),
                        "color": update.color.as_str(),
                    },
                    "$currentDate": { "last_updated": true },
                },
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .map(Into::into)
            .ok_or_else(|| Error::Backend(format!("Upsert of branding for `{user_id}` returned nothing")))
    }

    async fn get_branding(&self, user_id: &str) -> Result<Option<BrandingProfile>> {
        Ok(self
            .app_settings
            .find_one(
                doc! { "user_id": user_id, "doc_id": BRANDING_PROFILE_ID },
                None,
            )
            .await?
            .map(Into::into))
    }
}
