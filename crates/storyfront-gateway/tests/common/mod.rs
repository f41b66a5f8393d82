#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use storyfront_core::{Creator, CreatorTier, Story};
use storyfront_currency::RateTable;
use storyfront_gateway::{
    AppState, AuthSettings, build_router,
    middleware::authenticity::{SIGNATURE_HEADER, TIMESTAMP_HEADER, sign_payload},
};
use storyfront_memstore::InMemoryStore;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
}

pub async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let joined = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("date");

    store
        .insert_creator(Creator {
            id: "c-gold".to_string(),
            handle: "ava".to_string(),
            display_name: "Ava".to_string(),
            tier: CreatorTier::Gold,
            created_at: joined,
        })
        .await;
    store
        .insert_creator(Creator {
            id: "c-new".to_string(),
            handle: "ben".to_string(),
            display_name: "Ben".to_string(),
            tier: CreatorTier::Unverified,
            created_at: joined,
        })
        .await;

    for (offset, (id, creator_id)) in [("s1", "c-gold"), ("s2", "c-new"), ("s3", "c-gold")]
        .into_iter()
        .enumerate()
    {
        store
            .insert_story(Story {
                id: id.to_string(),
                creator_id: creator_id.to_string(),
                title: format!("Story {id}"),
                media_url: None,
                created_at: joined + Duration::minutes(offset as i64),
            })
            .await
            .expect("seed story");
    }

    store
}

pub async fn app(auth: AuthSettings) -> TestApp {
    let store = seeded_store().await;
    let state = AppState::new(store.clone(), RateTable::default(), auth, "memory");

    TestApp {
        router: build_router(state),
        store,
    }
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, String)],
    body: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }

    let request = builder
        .body(Body::from(body.unwrap_or_default().to_string()))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn post_json(router: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    send(router, "POST", uri, &[], Some(&body.to_string())).await
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, "GET", uri, &[], None).await
}

pub fn signature_headers(timestamp: i64, body: &str) -> Vec<(&'static str, String)> {
    let signature = sign_payload(SECRET, timestamp, body.as_bytes()).expect("signature");
    vec![
        (SIGNATURE_HEADER, format!("sha256={signature}")),
        (TIMESTAMP_HEADER, timestamp.to_string()),
    ]
}
