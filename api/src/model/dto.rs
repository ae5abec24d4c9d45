use serde::{Deserialize, Serialize};
use url::Url;

/// Acknowledgement of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    #[must_use]
    pub const fn ok() -> Self {
        Self { success: true }
    }
}

/// Response of saving a setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingCreated {
    pub setting_id: String,
}

/// Response of a logo upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoUploaded {
    pub logo_url: Url,
}

/// Response of the legacy branding form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandingUpdated {
    pub message: String,
    /// Signed url of the logo, empty when none was sent.
    pub logo_url: String,
    pub brand_name: String,
    pub color: String,
    pub user_id: String,
}
