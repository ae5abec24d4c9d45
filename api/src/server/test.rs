mod prep {
    use std::sync::{Arc, Once};

    use axum::{
        body::Body,
        http::{header, HeaderMap, Method, Request, StatusCode},
        Router,
    };
    use bb_core::mock::{MemoryBlobStore, MemoryStore};
    use bytes::Bytes;
    use serde::de::DeserializeOwned;
    use serde_json::Value;
    use tower::ServiceExt;
    use tracing::metadata::LevelFilter;

    use crate::server::{router, Config, Context};

    static INIT: Once = Once::new();

    const BOUNDARY: &str = "BrandboardTestBoundary";

    pub struct Harness {
        pub app: Router,
        pub ctx: Context,
        pub store: Arc<MemoryStore>,
        pub blobs: Arc<MemoryBlobStore>,
    }

    pub struct Reply {
        pub status: StatusCode,
        pub headers: HeaderMap,
        pub body: Bytes,
    }

    impl Reply {
        pub fn json<T: DeserializeOwned>(&self) -> T {
            serde_json::from_slice(&self.body).unwrap()
        }

        pub fn errors(&self) -> Vec<String> {
            let value: Value = self.json();
            serde_json::from_value(value["error"].clone()).unwrap()
        }
    }

    /// A multipart field: name, optional file name and content.
    pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

    pub fn prep() -> Harness {
        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_max_level(LevelFilter::INFO)
                .with_test_writer()
                .init();
        });

        let config = Arc::new(Config {
            jwt_secret: "test-secret".to_owned(),
            max_upload_size: 1024,
            ..Default::default()
        });
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(MemoryBlobStore::new(Context::blob_urls(&config)));
        let ctx = Context::with_backends(config, store.clone(), blobs.clone());

        Harness {
            app: router(ctx.clone()),
            ctx,
            store,
            blobs,
        }
    }

    pub fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    impl Harness {
        pub fn token(&self, user_id: &str) -> String {
            self.ctx.encode(user_id).unwrap().0
        }

        pub async fn send(&self, req: Request<Body>) -> Reply {
            let res = self.app.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let headers = res.headers().clone();
            let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
            Reply {
                status,
                headers,
                body,
            }
        }

        pub async fn call(&self, method: Method, uri: &str, as_user: Option<&str>) -> Reply {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(user) = as_user {
                req = req.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
            }
            self.send(req.body(Body::empty()).unwrap()).await
        }

        pub async fn call_json(
            &self,
            method: Method,
            uri: &str,
            as_user: &str,
            json: &Value,
        ) -> Reply {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token(as_user)))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(json).unwrap()))
                .unwrap();
            self.send(req).await
        }

        pub async fn call_multipart(&self, uri: &str, as_user: &str, parts: &[Part<'_>]) -> Reply {
            let req = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token(as_user)))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart(parts)))
                .unwrap();
            self.send(req).await
        }
    }

    /// Path and query of a url, as the router sees it.
    pub fn local(url: &str) -> String {
        let url = url::Url::parse(url).unwrap();
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_owned(),
        }
    }
}

use axum::http::{Method, StatusCode};
use bb_core::{
    models::{BrandingProfile, SavedSetting, UserSettings},
    store::SettingsStore,
};
use serde_json::{json, Value};

use crate::model::{BrandingUpdated, LogoUploaded, SettingCreated, Success};
use prep::{local, prep};

#[tokio::test]
async fn test_fresh_user_gets_defaults() {
    let h = prep();

    let first = h.call(Method::GET, "/settings/alice", Some("alice")).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json::<UserSettings>(), UserSettings::defaults());

    let second = h.call(Method::GET, "/settings/alice", Some("alice")).await;
    assert_eq!(second.json::<Value>(), first.json::<Value>());

    // Defaults were persisted
    assert_eq!(
        h.store.get_settings("alice").await.unwrap(),
        Some(UserSettings::defaults())
    );
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let h = prep();
    let payload = json!({"brandName": "Acme", "primaryColor": "#000000"});

    let set = h
        .call_json(Method::POST, "/settings/alice", "alice", &payload)
        .await;
    assert_eq!(set.json::<Success>(), Success::ok());

    let init = h.call(Method::POST, "/settings/alice/init", Some("alice")).await;
    assert_eq!(init.status, StatusCode::OK);
    assert_eq!(init.json::<Value>(), payload);

    let fresh = h.call(Method::POST, "/settings/bob/init", Some("bob")).await;
    assert_eq!(fresh.json::<UserSettings>(), UserSettings::defaults());
}

#[tokio::test]
async fn test_set_then_get_round_trips() {
    let h = prep();
    let payload = json!({
        "brandName": "Acme",
        "logoUrl": "https://cdn.example.com/acme.png",
        "primaryColor": "#ff0000",
        "layout": {"dense": true, "columns": [1, 2, 3]},
        "beta": null
    });

    let set = h
        .call_json(Method::POST, "/settings/alice", "alice", &payload)
        .await;
    assert_eq!(set.status, StatusCode::OK);
    assert_eq!(set.json::<Value>(), json!({"success": true}));

    let get = h.call(Method::GET, "/settings/alice", Some("alice")).await;
    assert_eq!(get.json::<Value>(), payload);
}

#[tokio::test]
async fn test_saved_settings_lifecycle() {
    let h = prep();
    let payload = json!({"brandName": "Preset", "extra": 1});

    let created = h
        .call_json(Method::POST, "/saved-settings/alice", "alice", &payload)
        .await;
    assert_eq!(created.status, StatusCode::OK);
    let SettingCreated { setting_id } = created.json();
    let uri = format!("/saved-settings/alice/{setting_id}");

    let fetched = h.call(Method::GET, &uri, Some("alice")).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let saved: SavedSetting = fetched.json();
    assert_eq!(saved.setting_id, setting_id);
    assert_eq!(serde_json::to_value(&saved.settings).unwrap(), payload);

    let listed = h.call(Method::GET, "/saved-settings/alice", Some("alice")).await;
    assert_eq!(listed.json::<Vec<SavedSetting>>(), vec![saved]);

    let deleted = h.call(Method::DELETE, &uri, Some("alice")).await;
    assert_eq!(deleted.json::<Success>(), Success::ok());

    let gone = h.call(Method::GET, &uri, Some("alice")).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert!(gone.errors().iter().any(|e| e.contains(&setting_id)));

    let again = h.call(Method::DELETE, &uri, Some("alice")).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.json::<Success>(), Success::ok());
}

#[tokio::test]
async fn test_saved_settings_are_ordered() {
    let h = prep();
    let mut ids = Vec::new();
    for n in 0..3 {
        let created = h
            .call_json(Method::POST, "/saved-settings/alice", "alice", &json!({ "n": n }))
            .await;
        ids.push(created.json::<SettingCreated>().setting_id);
    }

    let listed: Vec<SavedSetting> = h
        .call(Method::GET, "/saved-settings/alice", Some("alice"))
        .await
        .json();
    let listed_ids: Vec<_> = listed.into_iter().map(|s| s.setting_id).collect();
    assert_eq!(listed_ids, ids);
}

#[tokio::test]
async fn test_foreign_user_is_forbidden() {
    let h = prep();

    let res = h
        .call_json(
            Method::POST,
            "/settings/alice",
            "mallory",
            &json!({"brandName": "pwned"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.errors().iter().any(|e| e.contains("alice")));

    let res = h
        .call_json(Method::POST, "/saved-settings/alice", "mallory", &json!({}))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    for (method, uri) in [
        (Method::GET, "/settings/alice"),
        (Method::POST, "/settings/alice/init"),
        (Method::GET, "/saved-settings/alice"),
        (Method::GET, "/saved-settings/alice/some-id"),
        (Method::DELETE, "/saved-settings/alice/some-id"),
    ] {
        let res = h.call(method, uri, Some("mallory")).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "{uri}");
    }

    let res = h
        .call_multipart("/upload-logo/alice", "mallory", &[("file", Some("a.png"), b"png")])
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    assert_eq!(h.store.user_count().await, 0);
    assert!(h.blobs.paths().await.is_empty());
}

#[tokio::test]
async fn test_token_is_required() {
    let h = prep();

    let missing = h.call(Method::GET, "/settings/alice", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert!(missing.errors().iter().any(|e| e == "Token is missing"));

    let req = axum::http::Request::builder()
        .uri("/settings/alice")
        .header("Authorization", "Bearer garbage")
        .body(axum::body::Body::empty())
        .unwrap();
    let bad = h.send(req).await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);

    let req = axum::http::Request::builder()
        .uri("/settings/alice")
        .header("Authorization", format!("Basic {}", h.token("alice")))
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(h.send(req).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_logo() {
    let h = prep();
    let before = h
        .call_json(Method::POST, "/settings/alice", "alice", &json!({"brandName": "Acme"}))
        .await;
    assert_eq!(before.status, StatusCode::OK);

    let res = h
        .call_multipart(
            "/upload-logo/alice",
            "alice",
            &[("file", Some("../../a.png"), b"\x89PNG")],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let LogoUploaded { logo_url } = res.json();
    assert!(logo_url.as_str().contains("logos/alice/"), "{logo_url}");
    assert!(logo_url.as_str().ends_with("_a.png"), "{logo_url}");

    // Settings are untouched
    let settings = h.call(Method::GET, "/settings/alice", Some("alice")).await;
    assert_eq!(settings.json::<Value>(), json!({"brandName": "Acme"}));

    // Publicly readable
    let blob = h.call(Method::GET, &local(logo_url.as_str()), None).await;
    assert_eq!(blob.status, StatusCode::OK);
    assert_eq!(&blob.body[..], b"\x89PNG");
    assert_eq!(blob.headers["content-type"], "image/png");
}

#[tokio::test]
async fn test_upload_logo_rejects_bad_forms() {
    let h = prep();

    let missing = h
        .call_multipart("/upload-logo/alice", "alice", &[("other", Some("a.png"), b"x")])
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert!(missing.errors().iter().any(|e| e.contains("`file`")));

    let big = vec![0_u8; 2048];
    let too_large = h
        .call_multipart("/upload-logo/alice", "alice", &[("file", Some("a.png"), &big)])
        .await;
    assert_eq!(too_large.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(h.blobs.paths().await.is_empty());
}

#[tokio::test]
async fn test_update_branding_overwrites() {
    let h = prep();

    for name in ["First", "Second"] {
        let res = h
            .call_multipart(
                "/ui_settings/update_settings",
                "alice",
                &[("brand_name", None, name.as_bytes()), ("color", None, b"#123456")],
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.headers["deprecation"], "true");
        assert_eq!(
            res.json::<BrandingUpdated>(),
            BrandingUpdated {
                message: "Settings updated successfully".to_owned(),
                logo_url: String::new(),
                brand_name: name.to_owned(),
                color: "#123456".to_owned(),
                user_id: "alice".to_owned(),
            }
        );
    }

    let profile = h.call(Method::GET, "/ui_settings/settings", Some("alice")).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.headers["deprecation"], "true");
    let profile: BrandingProfile = profile.json();
    assert_eq!(profile.brand_name, "Second");
    assert_eq!(profile.logo_url, "");

    // Canonical settings are a separate document
    assert_eq!(h.store.get_settings("alice").await.unwrap(), None);
}

#[tokio::test]
async fn test_branding_profile_absent() {
    let h = prep();
    let res = h.call(Method::GET, "/ui_settings/settings", Some("alice")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.headers["deprecation"], "true");
}

#[tokio::test]
async fn test_update_branding_checks_user_field() {
    let h = prep();

    let res = h
        .call_multipart(
            "/ui_settings/update_settings",
            "mallory",
            &[
                ("user_id", None, b"alice"),
                ("brand_name", None, b"pwned"),
                ("color", None, b"#000000"),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(h.store.user_count().await, 0);

    let res = h
        .call_multipart(
            "/ui_settings/update_settings",
            "alice",
            &[("user_id", None, b"alice"), ("brand_name", None, b"Acme")],
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.errors().iter().any(|e| e.contains("`color`")));
}

#[tokio::test]
async fn test_branding_logo_is_signed() {
    let h = prep();

    let res = h
        .call_multipart(
            "/ui_settings/update_settings",
            "alice",
            &[
                ("user_id", None, b"alice"),
                ("brand_name", None, b"Acme"),
                ("color", None, b"#ff0000"),
                ("logo_file", Some("brand.png"), b"\x89PNG-private"),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let updated: BrandingUpdated = res.json();
    assert!(updated.logo_url.contains("/blobs/user_logos/alice/logo_"));
    assert!(updated.logo_url.contains(".png?token="));

    let paths = h.blobs.paths().await;
    assert_eq!(paths.len(), 1);
    let path = &paths[0];
    let hex = path
        .strip_prefix("user_logos/alice/logo_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .unwrap();
    assert_eq!(hex.len(), 16);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));

    let signed = h.call(Method::GET, &local(&updated.logo_url), None).await;
    assert_eq!(signed.status, StatusCode::OK);
    assert_eq!(&signed.body[..], b"\x89PNG-private");

    let unsigned = h.call(Method::GET, &format!("/blobs/{path}"), None).await;
    assert_eq!(unsigned.status, StatusCode::NOT_FOUND);

    let token = url::Url::parse(&updated.logo_url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "token")
        .unwrap()
        .1
        .into_owned();
    let elsewhere = h
        .call(
            Method::GET,
            &format!("/blobs/user_logos/alice/other.png?token={token}"),
            None,
        )
        .await;
    assert_eq!(elsewhere.status, StatusCode::UNAUTHORIZED);

    let profile: BrandingProfile = h
        .call(Method::GET, "/ui_settings/settings", Some("alice"))
        .await
        .json();
    assert_eq!(profile.logo_url, updated.logo_url);
}

#[tokio::test]
async fn test_empty_logo_is_ignored() {
    let h = prep();
    let res = h
        .call_multipart(
            "/ui_settings/update_settings",
            "alice",
            &[
                ("brand_name", None, b"Acme"),
                ("color", None, b"#ff0000"),
                ("logo_file", Some("empty.png"), b""),
            ],
        )
        .await;
    assert_eq!(res.json::<BrandingUpdated>().logo_url, "");
    assert!(h.blobs.paths().await.is_empty());
}

#[tokio::test]
async fn test_backend_failures_are_explained() {
    let h = prep();
    let form: &[prep::Part<'_>] = &[
        ("brand_name", None, b"Acme"),
        ("color", None, b"#ff0000"),
        ("logo_file", Some("brand.png"), b"png"),
    ];

    h.blobs.set_failing(true);
    let res = h
        .call_multipart("/ui_settings/update_settings", "alice", form)
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res
        .errors()
        .iter()
        .any(|e| e.starts_with("Failed to process logo: ")));
    assert_eq!(h.store.user_count().await, 0);
    h.blobs.set_failing(false);

    h.store.set_failing(true);
    let res = h
        .call_multipart("/ui_settings/update_settings", "alice", form)
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res
        .errors()
        .iter()
        .any(|e| e.starts_with("Failed to save settings to database: ")));
    // No rollback, the logo stays behind
    assert_eq!(h.blobs.paths().await.len(), 1);

    let res = h.call(Method::GET, "/settings/alice", Some("alice")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.errors().iter().any(|e| e.contains("unavailable")));
}

#[tokio::test]
async fn test_blob_paths_are_checked() {
    let h = prep();

    let res = h.call(Method::GET, "/blobs/logos/../secret.png", None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = h.call(Method::GET, "/blobs/logos/alice/none.png", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = h
        .call(Method::GET, "/blobs/logos/alice/none.png?token=forged", None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejected_requests_are_explained() {
    use axum::{body::Body, http::Request};

    let h = prep();
    let bearer = format!("Bearer {}", h.token("alice"));
    let json_post = |uri: &str, body: &'static str| {
        Request::post(uri)
            .header("Authorization", bearer.as_str())
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap()
    };

    let not_object = h.send(json_post("/settings/alice", "[1,2]")).await;
    assert_eq!(not_object.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(not_object.headers["content-type"], "application/json");
    assert!(not_object
        .errors()
        .iter()
        .any(|e| e.starts_with("Failed to deserialize the JSON body")));

    let broken = h.send(json_post("/saved-settings/alice", "{")).await;
    assert_eq!(broken.status, StatusCode::BAD_REQUEST);
    assert!(broken.errors().iter().any(|e| e.contains("as JSON")));

    let req = Request::post("/upload-logo/alice")
        .header("Authorization", bearer.as_str())
        .body(Body::empty())
        .unwrap();
    let no_boundary = h.send(req).await;
    assert_eq!(no_boundary.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_boundary.headers["content-type"], "application/json");
    assert!(no_boundary.errors().iter().any(|e| e.contains("boundary")));

    let twice = h
        .call(Method::GET, "/blobs/logos/alice/a.png?token=a&token=b", None)
        .await;
    assert_eq!(twice.status, StatusCode::BAD_REQUEST);
    assert!(twice.errors().iter().any(|e| e.contains("duplicate field")));

    assert_eq!(h.store.user_count().await, 0);
}

#[tokio::test]
async fn test_bearer_scheme_is_case_insensitive() {
    let h = prep();

    let req = axum::http::Request::builder()
        .uri("/settings/alice")
        .header("Authorization", format!("bearer {}", h.token("alice")))
        .body(axum::body::Body::empty())
        .unwrap();
    let res = h.send(req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json::<UserSettings>(), UserSettings::defaults());
}

#[tokio::test]
async fn test_blobs_are_not_sniffed() {
    use bb_core::blob::{Blob, BlobStore, Visibility};

    let h = prep();

    let res = h
        .call_multipart(
            "/upload-logo/alice",
            "alice",
            &[("file", Some("a.png"), b"\x89PNG")],
        )
        .await;
    let LogoUploaded { logo_url } = res.json();
    let image = h.call(Method::GET, &local(logo_url.as_str()), None).await;
    assert_eq!(image.status, StatusCode::OK);
    assert_eq!(image.headers["x-content-type-options"], "nosniff");
    assert!(image.headers["content-security-policy"]
        .to_str()
        .unwrap()
        .contains("sandbox"));
    assert!(image.headers["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("inline; filename=\""));

    h.blobs
        .put(
            "logos/alice/page.html",
            Blob {
                data: "<script>alert(1)</script>".into(),
                content_type: Some("text/html".to_owned()),
            },
            Visibility::Public,
        )
        .await
        .unwrap();
    let page = h.call(Method::GET, "/blobs/logos/alice/page.html", None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.headers["x-content-type-options"], "nosniff");
    assert_eq!(
        page.headers["content-disposition"],
        "attachment; filename=\"page.html\""
    );
}
