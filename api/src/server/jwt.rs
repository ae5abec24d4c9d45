use std::{
    fmt::Debug,
    time::{Duration, SystemTime},
};

use color_eyre::{eyre::Context, Result};
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};

use crate::{
    model::{ApiError, ApiResult},
    server::Config,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The JWT claim. Contains the user id, the application and the expiry time.
pub struct Claims {
    /// Id of the user the token was issued to.
    sub: String,
    /// Application id the token is valid for.
    aud: String,
    /// Expiration time represented in Unix timestamp.
    exp: u64,
}

impl Claims {
    /// The `exp` of the token in [`SystemTime`].
    #[must_use]
    pub fn valid_until(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(self.exp)
    }

    /// Expiration time of the token in Unix timestamp.
    #[must_use]
    pub const fn exp(&self) -> u64 {
        self.exp
    }

    /// Verified id of the caller.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    /// Make sure the caller acts on its own records.
    ///
    /// # Errors
    /// Returns 403 if `user_id` belongs to someone else.
    pub fn ensure_user(&self, user_id: &str) -> ApiResult<()> {
        if self.sub == user_id {
            Ok(())
        } else {
            tracing::warn!(caller = %self.sub, target = user_id, "Access to foreign settings");
            Err(ApiError::forbidden(user_id))
        }
    }
}

#[derive(Clone)]
pub struct JWTContext {
    timeout: Duration,
    app_id: String,
    encode_key: EncodingKey,
    decode_key: DecodingKey,
    pub(crate) header: Header,
    pub(crate) val: Validation,
}

impl JWTContext {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let bytes = config.jwt_secret.as_bytes();
        let encode_key = EncodingKey::from_secret(bytes);
        let decode_key = DecodingKey::from_secret(bytes);

        let mut val = Validation::default();
        val.set_audience(&[&config.app_id]);

        Self {
            encode_key,
            decode_key,
            timeout: config.token_timeout,
            app_id: config.app_id.clone(),
            val,
            header: Header::default(),
        }
    }

    fn valid_until(&self) -> u64 {
        (SystemTime::now() + self.timeout)
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }

    /// Issue a token for `user_id`.
    ///
    /// # Errors
    /// Fails when encoding failed.
    pub fn encode(&self, user_id: &str) -> Result<(String, Claims)> {
        let claim = Claims {
            sub: user_id.to_owned(),
            aud: self.app_id.clone(),
            exp: self.valid_until(),
        };
        let token = jsonwebtoken::encode(&self.header, &claim, &self.encode_key)
            .wrap_err("Failed to encode JWT")?;

        Ok((token, claim))
    }

    /// Decode and verify a token.
    ///
    /// # Errors
    /// Fails on bad signature, wrong audience or expired token.
    pub fn decode(&self, token: impl AsRef<str>) -> JwtResult<TokenData<Claims>> {
        jsonwebtoken::decode::<Claims>(token.as_ref(), &self.decode_key, &self.val)
    }

    /// Verified claims of a token.
    ///
    /// # Errors
    /// Fails on bad signature, wrong audience or expired token.
    pub fn validate(&self, token: impl AsRef<str>) -> JwtResult<Claims> {
        Ok(self.decode(token)?.claims)
    }
}

impl Debug for JWTContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JWTContext")
            .field("timeout", &self.timeout)
            .field("app_id", &self.app_id)
            .field("encode_key", &"*")
            .field("decode_key", &"*")
            .field("header", &self.header)
            .field("val", &self.val)
            .finish()
    }
}
