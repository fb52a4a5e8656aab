//! End-to-end API tests, run against both storage backends.
//!
//! The backend behind the engine is supposed to be invisible to API
//! consumers, so every scenario here loops over a file-backed app and a
//! database-backed app and expects identical outcomes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lodge_server::app;
use lodge_store::{Database, FileStore, StorageEngine};
use serde_json::{json, Value};
use tower::util::ServiceExt;

async fn backends(dir: &tempfile::TempDir) -> Vec<Router> {
    let file = FileStore::new(dir.path().join("lodge.json"));
    file.reload().await.unwrap();

    let db = Database::new(dir.path().join("lodge.db")).await.unwrap();
    db.reload().await.unwrap();

    vec![app(Arc::new(file)), app(Arc::new(db))]
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(app: &Router, uri: &str, body: Value) -> Value {
    let (status, value) = send(app, Method::POST, uri, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "POST {uri} -> {value}");
    value
}

#[tokio::test]
async fn state_city_lifecycle_is_identical_across_backends() {
    let dir = tempfile::tempdir().unwrap();
    for app in backends(&dir).await {
        let state = create(&app, "/api/v1/states", json!({"name": "California"})).await;
        let state_id = state["id"].as_str().unwrap().to_string();
        assert_eq!(state["kind"], "State");

        let city = create(
            &app,
            &format!("/api/v1/states/{state_id}/cities"),
            json!({"name": "San Francisco"}),
        )
        .await;
        let city_id = city["id"].as_str().unwrap().to_string();

        let (status, listed) =
            send(&app, Method::GET, &format!("/api/v1/states/{state_id}/cities"), None).await;
        assert_eq!(status, StatusCode::OK);
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["id"], Value::from(city_id.clone()));

        let (status, body) =
            send(&app, Method::DELETE, &format!("/api/v1/states/{state_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));

        // The cascade reached the city.
        let (status, body) =
            send(&app, Method::GET, &format!("/api/v1/cities/{city_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Not found"}));
    }
}

#[tokio::test]
async fn malformed_and_incomplete_bodies_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    for app in backends(&dir).await {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/states")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("definitely not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "Not a JSON"}));

        let (status, body) = send(&app, Method::POST, "/api/v1/states", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing name"}));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/users",
            Some(json!({"email": "a@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing password"}));
    }
}

#[tokio::test]
async fn updates_go_through_the_allow_list() {
    let dir = tempfile::tempdir().unwrap();
    for app in backends(&dir).await {
        let state = create(&app, "/api/v1/states", json!({"name": "Oregon"})).await;
        let state_id = state["id"].as_str().unwrap();

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/states/{state_id}"),
            Some(json!({"name": "Old Oregon"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Old Oregon");
        assert_eq!(updated["id"], state["id"]);
        assert_eq!(updated["created_at"], state["created_at"]);

        // Unknown and immutable keys are rejected, not ignored.
        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/states/{state_id}"),
            Some(json!({"population": 4})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/states/{state_id}"),
            Some(json!({"id": "forged"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn user_passwords_never_surface() {
    let dir = tempfile::tempdir().unwrap();
    for app in backends(&dir).await {
        let user = create(
            &app,
            "/api/v1/users",
            json!({"email": "guest@example.com", "password": "secret123", "first_name": "Kay"}),
        )
        .await;
        assert!(user.get("password").is_none());
        assert!(user.get("password_digest").is_none());
        assert!(!user.to_string().contains("secret123"));

        let user_id = user["id"].as_str().unwrap();
        let (status, fetched) =
            send(&app, Method::GET, &format!("/api/v1/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["first_name"], "Kay");
        assert!(!fetched.to_string().contains("secret123"));
    }
}

/// Seed state -> city -> user -> place through the API; returns (place, user).
async fn seed_place(app: &Router) -> (Value, Value) {
    let state = create(app, "/api/v1/states", json!({"name": "Nevada"})).await;
    let state_id = state["id"].as_str().unwrap();
    let city = create(
        app,
        &format!("/api/v1/states/{state_id}/cities"),
        json!({"name": "Reno"}),
    )
    .await;
    let city_id = city["id"].as_str().unwrap();
    let user = create(
        app,
        "/api/v1/users",
        json!({"email": "host@example.com", "password": "pw"}),
    )
    .await;
    let place = create(
        app,
        &format!("/api/v1/cities/{city_id}/places"),
        json!({
            "user_id": user["id"],
            "name": "Cabin",
            "number_rooms": 2,
            "price_by_night": 95
        }),
    )
    .await;
    (place, user)
}

#[tokio::test]
async fn place_amenity_links_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    for app in backends(&dir).await {
        let (place, _) = seed_place(&app).await;
        let place_id = place["id"].as_str().unwrap();
        assert_eq!(place["number_rooms"], 2);

        let amenity = create(&app, "/api/v1/amenities", json!({"name": "wifi"})).await;
        let amenity_id = amenity["id"].as_str().unwrap();

        let uri = format!("/api/v1/places/{place_id}/amenities/{amenity_id}");
        let (status, body) = send(&app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], amenity["id"]);

        // Linking again is a no-op that reports the existing association.
        let (status, _) = send(&app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, linked) = send(
            &app,
            Method::GET,
            &format!("/api/v1/places/{place_id}/amenities"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(linked.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        // Unlinking an amenity that is no longer linked is not found.
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn review_creation_verifies_parents_before_fields() {
    let dir = tempfile::tempdir().unwrap();
    for app in backends(&dir).await {
        let (place, user) = seed_place(&app).await;
        let place_id = place["id"].as_str().unwrap();
        let reviews_uri = format!("/api/v1/places/{place_id}/reviews");

        // Missing place is a 404 before any field validation.
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/places/no-such-place/reviews",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Field presence is checked before the referenced user is resolved.
        let (status, body) = send(&app, Method::POST, &reviews_uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing user_id"}));

        let (status, _) = send(
            &app,
            Method::POST,
            &reviews_uri,
            Some(json!({"user_id": "no-such-user", "text": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            Method::POST,
            &reviews_uri,
            Some(json!({"user_id": user["id"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing text"}));

        let review = create(
            &app,
            &reviews_uri,
            json!({"user_id": user["id"], "text": "Great stay"}),
        )
        .await;
        assert_eq!(review["place_id"], place["id"]);

        let (status, listed) = send(&app, Method::GET, &reviews_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn status_and_stats_report_the_store() {
    let dir = tempfile::tempdir().unwrap();
    for app in backends(&dir).await {
        let (status, body) = send(&app, Method::GET, "/api/v1/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "OK"}));

        seed_place(&app).await;
        let (status, stats) = send(&app, Method::GET, "/api/v1/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["states"], 1);
        assert_eq!(stats["cities"], 1);
        assert_eq!(stats["users"], 1);
        assert_eq!(stats["places"], 1);
        assert_eq!(stats["reviews"], 0);
    }
}

#[tokio::test]
async fn unknown_routes_are_json_404s() {
    let dir = tempfile::tempdir().unwrap();
    for app in backends(&dir).await {
        let (status, body) = send(&app, Method::GET, "/api/v1/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Not found"}));
    }
}
