//! Models for user settings, saved presets and branding profiles.
use std::ops::{Deref, DerefMut};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Colour used when a user has never chosen one.
pub const DEFAULT_PRIMARY_COLOR: &str = "#1976d2";

/// Fixed document id of the branding profile inside a user's app settings.
pub const BRANDING_PROFILE_ID: &str = "branding_profile";

/// Branding settings of a user.
///
/// The payload is kept as an arbitrary JSON object so that whatever the client
/// writes is read back verbatim. `brandName`, `logoUrl` and `primaryColor` are
/// the keys the UI understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserSettings(pub Map<String, Value>);

impl UserSettings {
    /// Settings a user starts with.
    #[must_use]
    pub fn defaults() -> Self {
        let mut map = Map::new();
        map.insert("brandName".to_owned(), Value::String(String::new()));
        map.insert("logoUrl".to_owned(), Value::String(String::new()));
        map.insert(
            "primaryColor".to_owned(),
            Value::String(DEFAULT_PRIMARY_COLOR.to_owned()),
        );
        Self(map)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Brand name, if present and a string.
    #[must_use]
    pub fn brand_name(&self) -> Option<&str> {
        self.str_field("brandName")
    }

    /// Logo url, if present and a string.
    #[must_use]
    pub fn logo_url(&self) -> Option<&str> {
        self.str_field("logoUrl")
    }

    /// Primary colour, if present and a string.
    #[must_use]
    pub fn primary_color(&self) -> Option<&str> {
        self.str_field("primaryColor")
    }
}

impl Deref for UserSettings {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for UserSettings {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for UserSettings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A named snapshot of settings owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSetting {
    /// Opaque identifier generated on creation.
    pub setting_id: String,
    /// The stored payload.
    pub settings: UserSettings,
    /// Time the snapshot was taken.
    #[serde(with = "humantime_serde")]
    pub created_at: SystemTime,
}

/// Branding written by the legacy `ui_settings` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandingProfile {
    /// Display name of the brand.
    pub brand_name: String,
    /// Signed url of the uploaded logo, empty when none was sent.
    pub logo_url: String,
    /// Brand colour.
    pub color: String,
    /// Assigned by the store on every write.
    #[serde(with = "humantime_serde")]
    pub last_updated: SystemTime,
}

/// Values of a branding profile write. The store assigns `last_updated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandingUpdate {
    /// Display name of the brand.
    pub brand_name: String,
    /// Url of the logo.
    pub logo_url: String,
    /// Brand colour.
    pub color: String,
}
