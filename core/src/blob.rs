//! Object storage for uploaded logos.
//!
//! Objects are addressed by a `/` separated path. Public objects are reachable
//! by their plain url, private ones only through a signed, time-limited url
//! produced by [`BlobStore::signed_url`].

use std::fmt::{Debug, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

/// Who may read an object without a signed url.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Anyone holding the plain url.
    Public,
    /// Only holders of a signed url.
    Private,
}

impl Visibility {
    const fn dir(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// Content of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Raw bytes.
    pub data: Bytes,
    /// Mime type, if known.
    pub content_type: Option<String>,
}

/// Interface of an object store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store an object and return its plain url.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or the backend fails.
    async fn put(&self, path: &str, blob: Blob, visibility: Visibility) -> Result<Url>;

    /// Produce a signed, time-limited url for an object.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or signing fails.
    async fn signed_url(&self, path: &str) -> Result<Url>;

    /// Read an object.
    ///
    /// Without a token only public objects are visible. A token must be a valid
    /// signature for exactly `path`.
    ///
    /// # Errors
    /// Returns an error if the path is invalid, the token is rejected or the backend fails.
    async fn fetch(&self, path: &str, token: Option<&str>) -> Result<Option<Blob>>;
}

/// Check an object path and return it unchanged.
///
/// # Errors
/// Returns [`Error::InvalidPath`] for empty, absolute or escaping paths.
pub fn validate_path(path: &str) -> Result<&str> {
    let bad = path.is_empty()
        || path.contains('\\')
        || path.contains('\0')
        || path
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(Error::InvalidPath(path.to_owned()))
    } else {
        Ok(path)
    }
}

/// Audience of signed url tokens. Bearer tokens never carry it.
pub const BLOB_URL_AUDIENCE: &str = "brandboard-blob-url";

#[derive(Debug, Serialize, Deserialize)]
struct UrlClaims {
    /// Object path the signature is valid for.
    sub: String,
    aud: String,
    /// Expiration time represented in Unix timestamp.
    exp: u64,
}

/// Signs object paths with an HMAC secret.
///
/// Tokens are scoped to [`BLOB_URL_AUDIENCE`], so the secret can be shared
/// with bearer tokens without one passing for the other.
#[derive(Clone)]
pub struct UrlSigner {
    ttl: Duration,
    encode_key: EncodingKey,
    decode_key: DecodingKey,
    header: Header,
    val: Validation,
}

impl UrlSigner {
    /// Create a signer whose signatures stay valid for `ttl`.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut val = Validation::default();
        val.leeway = 0;
        val.set_audience(&[BLOB_URL_AUDIENCE]);
        val.set_required_spec_claims(&["exp", "sub", "aud"]);

        Self {
            ttl,
            encode_key: EncodingKey::from_secret(secret),
            decode_key: DecodingKey::from_secret(secret),
            header: Header::default(),
            val,
        }
    }

    /// Sign `path` until now + ttl.
    ///
    /// # Errors
    /// Fails when encoding failed.
    pub fn sign(&self, path: &str) -> Result<String> {
        let exp = (SystemTime::now() + self.ttl)
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|e| Error::Backend(e.to_string()))?
            .as_secs();
        self.sign_until(path, exp)
    }

    fn sign_until(&self, path: &str, exp: u64) -> Result<String> {
        let claims = UrlClaims {
            sub: path.to_owned(),
            aud: BLOB_URL_AUDIENCE.to_owned(),
            exp,
        };
        Ok(jsonwebtoken::encode(&self.header, &claims, &self.encode_key)?)
    }

    /// Check that `token` signs `path` and has not expired.
    ///
    /// # Errors
    /// Returns [`Error::Signature`] otherwise.
    pub fn verify(&self, path: &str, token: &str) -> Result<()> {
        let mut val = self.val.clone();
        val.sub = Some(path.to_owned());
        jsonwebtoken::decode::<UrlClaims>(token, &self.decode_key, &val)?;
        Ok(())
    }
}

impl Debug for UrlSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("ttl", &self.ttl)
            .field("encode_key", &"*")
            .field("decode_key", &"*")
            .finish()
    }
}

/// Builds plain and signed urls of objects below `{public_url}/blobs/`.
#[derive(Debug, Clone)]
pub struct BlobUrls {
    base: Url,
    signer: UrlSigner,
}

impl BlobUrls {
    /// Urls served by the api at `public_url`.
    #[must_use]
    pub const fn new(public_url: Url, signer: UrlSigner) -> Self {
        Self {
            base: public_url,
            signer,
        }
    }

    /// Plain url of an object.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or the base url can't hold a path.
    pub fn object_url(&self, path: &str) -> Result<Url> {
        let path = validate_path(path)?;
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Backend(format!("`{}` cannot be a base url", self.base)))?
            .pop_if_empty()
            .push("blobs")
            .extend(path.split('/'));
        Ok(url)
    }

    /// Signed, time-limited url of an object.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or signing fails.
    pub fn signed_url(&self, path: &str) -> Result<Url> {
        let mut url = self.object_url(path)?;
        let token = self.signer.sign(path)?;
        url.query_pairs_mut().append_pair("token", &token);
        Ok(url)
    }

    /// Check a token received with a signed url.
    ///
    /// # Errors
    /// Returns [`Error::Signature`] if the token is not valid for `path`.
    pub fn verify(&self, path: &str, token: &str) -> Result<()> {
        self.signer.verify(path, token)
    }
}

/// Blob store keeping objects on the local filesystem.
///
/// Content types are guessed from the file extension on read.
#[derive(Debug)]
pub struct FsBlobStore {
    root: Box<Path>,
    urls: BlobUrls,
}

impl FsBlobStore {
    /// Create the store, making sure its directories exist.
    ///
    /// # Errors
    /// Returns an error if the directories can't be created.
    pub async fn new(root: impl Into<PathBuf>, urls: BlobUrls) -> Result<Self> {
        let root = root.into().into_boxed_path();
        for visibility in [Visibility::Public, Visibility::Private] {
            create_dir_all(root.join(visibility.dir())).await?;
        }
        info!(root = %root.display(), "Filesystem blob store ready");
        Ok(Self { root, urls })
    }

    fn file_path(&self, path: &str, visibility: Visibility) -> PathBuf {
        path.split('/')
            .fold(self.root.join(visibility.dir()), |acc, seg| acc.join(seg))
    }

    async fn read(&self, path: &str, visibility: Visibility) -> Result<Option<Blob>> {
        match tokio::fs::read(self.file_path(path, visibility)).await {
            Ok(data) => Ok(Some(Blob {
                data: data.into(),
                content_type: mime_guess::from_path(path)
                    .first()
                    .map(|mime| mime.to_string()),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, blob: Blob, visibility: Visibility) -> Result<Url> {
        let path = validate_path(path)?;
        let file_path = self.file_path(path, visibility);
        if let Some(dir) = file_path.parent() {
            create_dir_all(dir).await?;
        }

        let mut file = File::create(&file_path).await?;
        file.write_all(&blob.data).await?;
        file.sync_all().await?;

        debug!(
            path,
            ?visibility,
            content_type = ?blob.content_type,
            size = blob.data.len(),
            "Blob stored"
        );
        self.urls.object_url(path)
    }

    async fn signed_url(&self, path: &str) -> Result<Url> {
        self.urls.signed_url(path)
    }

    async fn fetch(&self, path: &str, token: Option<&str>) -> Result<Option<Blob>> {
        let path = validate_path(path)?;
        if let Some(token) = token {
            self.urls.verify(path, token)?;
            if let Some(blob) = self.read(path, Visibility::Private).await? {
                return Ok(Some(blob));
            }
        }
        self.read(path, Visibility::Public).await
    }
}
