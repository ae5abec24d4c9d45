use reqwest::{
    multipart::{Form, Part},
    IntoUrl, Method, RequestBuilder, Url,
};
use serde::de::DeserializeOwned;

use crate::{
    client::Result,
    model::{
        ApiError, BrandingProfile, BrandingUpdated, LogoUploaded, SavedSetting, SettingCreated,
        Success, UserSettings,
    },
};

/// A file to upload as logo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl LogoFile {
    fn into_part(self) -> Result<Part> {
        let part = Part::bytes(self.data).file_name(self.file_name);
        Ok(match self.content_type {
            Some(content_type) => part.mime_str(&content_type)?,
            None => part,
        })
    }
}

/// Fields of the legacy branding form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandingForm {
    pub brand_name: String,
    pub color: String,
    /// Must be the caller's own id when set.
    pub user_id: Option<String>,
    pub logo: Option<LogoFile>,
}

#[derive(Clone, Debug)]
pub struct Client {
    client: reqwest::Client,
    url: Url,
    token: Option<String>,
}

impl Client {
    /// Creates new client instance.
    ///
    /// # Errors
    /// Fails on invalid URL.
    pub fn new(url: impl IntoUrl) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Creates new client instance with given reqwest client.
    ///
    /// # Errors
    /// Fails on invalid URL.
    pub fn with_client(client: reqwest::Client, url: impl IntoUrl) -> Result<Self> {
        Ok(Self {
            client,
            token: None,
            url: url.into_url()?,
        })
    }

    pub fn set_token(&mut self, token: impl Into<String>) -> Option<String> {
        self.token.replace(token.into())
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let req = self.client.request(method, self.endpoint(segments)?);
        Ok(match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }

    /// Send a request and decode either the payload or the [`ApiError`].
    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }

        let err = serde_json::from_slice::<ApiError>(&body)
            .unwrap_or_else(|_| ApiError::new(status).explain(String::from_utf8_lossy(&body)));
        Err(err.with_status(status).into())
    }

    /// Settings of a user, seeded with defaults on first access.
    ///
    /// # Errors
    /// Fails on network issue, bad response or api error.
    pub async fn get_settings(&self, user_id: &str) -> Result<UserSettings> {
        Self::send(self.request(Method::GET, &["settings", user_id])?).await
    }

    /// Replace the settings of a user.
    ///
    /// # Errors
    /// Fails on network issue, bad response or api error.
    pub async fn set_settings(&self, user_id: &str, settings: &UserSettings) -> Result<()> {
        let req = self
            .request(Method::POST, &["settings", user_id])?
            .json(settings);
        Self::send::<Success>(req).await.map(drop)
    }

    /// Store the defaults unless settings exist.
    ///
    /// # Errors
    /// Fails on network issue, bad response or api error.
    pub async fn init_settings(&self, user_id: &str) -> Result<UserSettings> {
        Self::send(self.request(Method::POST, &["settings", user_id, "init"])?).await
    }

    /// All saved settings of a user.
    ///
    /// # Errors
    /// Fails on network issue, bad response or api error.
    pub async fn saved_settings(&self, user_id: &str) -> Result<Vec<SavedSetting>> {
        Self::send(self.request(Method::GET, &["saved-settings", user_id])?).await
    }

    /// Save a snapshot and return its id.
    ///
    /// # Errors
    /// Fails on network issue, bad response or api error.
    pub async fn save_setting(&self, user_id: &str, settings: &UserSettings) -> Result<String> {
        let req = self
            .request(Method::POST, &["saved-settings", user_id])?
            .json(settings);
        Ok(Self::send::<SettingCreated>(req).await?.setting_id)
    }

    /// # Errors
    /// Fails on network issue, bad response or api error, including 404.
    pub async fn saved_setting(&self, user_id: &str, setting_id: &str) -> Result<SavedSetting> {
        Self::send(self.request(Method::GET, &["saved-settings", user_id, setting_id])?).await
    }

    /// # Errors
    /// Fails on network issue, bad response or api error.
    pub async fn delete_saved_setting(&self, user_id: &str, setting_id: &str) -> Result<()> {
        let req = self.request(Method::DELETE, &["saved-settings", user_id, setting_id])?;
        Self::send::<Success>(req).await.map(drop)
    }

    /// Upload a public logo and return its url.
    ///
    /// # Errors
    /// Fails on network issue, bad response or api error.
    pub async fn upload_logo(&self, user_id: &str, logo: LogoFile) -> Result<Url> {
        let form = Form::new().part("file", logo.into_part()?);
        let req = self
            .request(Method::POST, &["upload-logo", user_id])?
            .multipart(form);
        Ok(Self::send::<LogoUploaded>(req).await?.logo_url)
    }

    /// Submit the legacy branding form.
    ///
    /// # Errors
    /// Fails on network issue, bad response or api error.
    pub async fn update_branding(&self, branding: BrandingForm) -> Result<BrandingUpdated> {
        let BrandingForm {
            brand_name,
            color,
            user_id,
            logo,
        } = branding;

        let mut form = Form::new()
            .text("brand_name", brand_name)
            .text("color", color);
        if let Some(user_id) = user_id {
            form = form.text("user_id", user_id);
        }
        if let Some(logo) = logo {
            form = form.part("logo_file", logo.into_part()?);
        }

        let req = self
            .request(Method::POST, &["ui_settings", "update_settings"])?
            .multipart(form);
        Self::send(req).await
    }

    /// Branding profile of the caller.
    ///
    /// # Errors
    /// Fails on network issue, bad response or api error, including 404.
    pub async fn branding_profile(&self) -> Result<BrandingProfile> {
        Self::send(self.request(Method::GET, &["ui_settings", "settings"])?).await
    }
}
