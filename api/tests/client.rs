use std::{net::TcpListener, sync::Arc};

use bb_core::mock::{MemoryBlobStore, MemoryStore};
use brandboard_api::{
    client::{BrandingForm, Client, LogoFile},
    model::UserSettings,
    server::{serve_with_listener, Config, Context},
};
use http::StatusCode;
use serde_json::json;

async fn spawn(user_id: &str) -> Client {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Arc::new(Config {
        public_url: format!("http://{addr}/").parse().unwrap(),
        jwt_secret: "integration-secret".to_owned(),
        ..Default::default()
    });
    let blobs = Arc::new(MemoryBlobStore::new(Context::blob_urls(&config)));
    let ctx = Context::with_backends(config, Arc::new(MemoryStore::default()), blobs);
    let token = ctx.encode(user_id).unwrap().0;

    tokio::spawn(serve_with_listener(listener, ctx, std::future::pending()));

    let mut client = Client::new(format!("http://{addr}/")).unwrap();
    client.set_token(token);
    client
}

fn settings(value: serde_json::Value) -> UserSettings {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_settings_over_http() {
    let c = spawn("alice").await;

    assert_eq!(c.get_settings("alice").await.unwrap(), UserSettings::defaults());

    let acme = settings(json!({"brandName": "Acme", "custom": [1, 2]}));
    c.set_settings("alice", &acme).await.unwrap();
    assert_eq!(c.get_settings("alice").await.unwrap(), acme);
    assert_eq!(c.init_settings("alice").await.unwrap(), acme);

    let err = c.get_settings("bob").await.unwrap_err();
    assert!(err.is_forbidden());
    assert!(err.explains("bob"));
}

#[tokio::test]
async fn test_saved_settings_over_http() {
    let c = spawn("alice").await;
    let preset = settings(json!({"primaryColor": "#00ff00"}));

    let id = c.save_setting("alice", &preset).await.unwrap();
    assert_eq!(c.saved_setting("alice", &id).await.unwrap().settings, preset);
    assert_eq!(c.saved_settings("alice").await.unwrap().len(), 1);

    c.delete_saved_setting("alice", &id).await.unwrap();
    c.delete_saved_setting("alice", &id).await.unwrap();
    let err = c.saved_setting("alice", &id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_logos_over_http() {
    let c = spawn("alice").await;

    let url = c
        .upload_logo(
            "alice",
            LogoFile {
                file_name: "a.png".to_owned(),
                content_type: Some("image/png".to_owned()),
                data: b"public-logo".to_vec(),
            },
        )
        .await
        .unwrap();
    assert!(url.path().starts_with("/blobs/logos/alice/"));
    let body = reqwest::get(url).await.unwrap().bytes().await.unwrap();
    assert_eq!(&body[..], b"public-logo");

    let updated = c
        .update_branding(BrandingForm {
            brand_name: "Acme".to_owned(),
            color: "#ff0000".to_owned(),
            user_id: None,
            logo: Some(LogoFile {
                file_name: "brand.svg".to_owned(),
                content_type: None,
                data: b"<svg/>".to_vec(),
            }),
        })
        .await
        .unwrap();
    assert_eq!(updated.user_id, "alice");
    assert_eq!(updated.message, "Settings updated successfully");

    let signed = reqwest::get(&updated.logo_url).await.unwrap();
    assert_eq!(signed.status(), StatusCode::OK);
    assert_eq!(&signed.bytes().await.unwrap()[..], b"<svg/>");

    let mut unsigned: url::Url = updated.logo_url.parse().unwrap();
    unsigned.set_query(None);
    assert_eq!(
        reqwest::get(unsigned).await.unwrap().status(),
        StatusCode::NOT_FOUND
    );

    let profile = c.branding_profile().await.unwrap();
    assert_eq!(profile.brand_name, "Acme");
    assert_eq!(profile.logo_url, updated.logo_url);

    let err = c
        .update_branding(BrandingForm {
            brand_name: "Evil".to_owned(),
            color: "#000000".to_owned(),
            user_id: Some("bob".to_owned()),
            logo: None,
        })
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
}
