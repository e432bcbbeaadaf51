mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};

use common::{PNG, TestApp};

/// In-process AI Layer answering the endpoints the backend calls. While
/// `online` is false lost-item registrations are refused.
#[derive(Clone)]
struct FakeAiLayer {
    online: Arc<AtomicBool>,
}

async fn add_found_item(mut multipart: Multipart) -> Json<Value> {
    let mut files = 0;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        field.bytes().await.unwrap();
        if name == "files" {
            files += 1;
        }
    }
    let additional: Vec<String> = (1..files)
        .map(|i| format!("https://cdn.ai.test/fs1/{}.png", i))
        .collect();
    Json(json!({
        "item_id": "fs1",
        "image_url": "https://cdn.ai.test/fs1/0.png",
        "additional_images": additional,
    }))
}

async fn text_search() -> Json<Value> {
    Json(json!({
        "matches": [
            { "id": "fs1", "score": 0.9, "match_type": "text" },
            { "id": "nope", "score": 0.7, "match_type": "text" },
        ]
    }))
}

async fn add_lost_item_text(State(ai): State<FakeAiLayer>, Json(body): Json<Value>) -> impl IntoResponse {
    if !ai.online.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "detail": "index offline" })));
    }
    let local_id = body["mysql_id"].as_str().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "item_id": format!("L{}", local_id),
            "matches": [{ "id": "fs1", "score": 0.8, "match_type": "hybrid" }],
        })),
    )
}

/// Serves the fake AI Layer on an ephemeral port and returns its base URL.
async fn spawn_ai_layer(online: bool) -> (String, FakeAiLayer) {
    let ai = FakeAiLayer { online: Arc::new(AtomicBool::new(online)) };
    let app = Router::new()
        .route("/image-matcher/add-found-item", post(add_found_item))
        .route("/text-matcher/search", get(text_search))
        .route("/lost-items/add-text", post(add_lost_item_text))
        .with_state(ai.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), ai)
}

fn lost_item_body(name: &str, category: i64) -> Value {
    json!({
        "item_name": name,
        "category_id": category,
        "description": "Dompet kulit coklat",
        "last_seen_location": "Masjid Mujahidin",
        "lost_date": "2024-05-01",
    })
}

#[tokio::test]
async fn test_found_item_registered_with_remote_images() {
    let (url, _) = spawn_ai_layer(true).await;
    let app = TestApp::with_ai_layer(&url).await;
    let admin = app.admin_token().await;
    let category = app.category(&admin, "Elektronik").await;
    let (_, owner) = app.user("remote@uny.ac.id").await;
    let category_text = category.to_string();

    let (status, body) = app
        .multipart(
            "/api/found-items",
            &owner,
            &[
                ("item_name", None, b"Headset"),
                ("category_id", None, category_text.as_bytes()),
                ("location", None, b"Kantin"),
                ("found_date", None, b"2024-04-10"),
                ("images", Some("a.png"), PNG),
                ("images", Some("b.png"), PNG),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["firestore_id"], "fs1");
    let item = &body["item"];
    assert_eq!(item["firestore_id"], "fs1");
    assert_eq!(item["image_url"], "https://cdn.ai.test/fs1/0.png");

    let images = item["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["image_url"], "https://cdn.ai.test/fs1/0.png");
    assert_eq!(images[0]["is_primary"], true);
    assert_eq!(images[1]["image_url"], "https://cdn.ai.test/fs1/1.png");
    assert_eq!(images[1]["is_primary"], false);

    let leftovers = std::fs::read_dir(&app.upload_dir).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_find_matches_resolves_known_items_only() {
    let (url, _) = spawn_ai_layer(true).await;
    let app = TestApp::with_ai_layer(&url).await;
    let admin = app.admin_token().await;
    let category = app.category(&admin, "Dompet").await;
    let (_, reporter) = app.user("reporter@uny.ac.id").await;
    let (_, seeker) = app.user("seeker@uny.ac.id").await;

    let id = app.found_item(&reporter, category, "Dompet hitam").await;
    app.state.db.set_found_item_firestore_id(id, "fs1").unwrap();

    let (status, body) = app
        .post(
            "/api/found-items/find-matches",
            Some(&seeker),
            json!({ "description": "dompet hitam" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["total_matches"], 1);
    let hit = &body["matches"][0];
    assert_eq!(hit["id"], id);
    assert_eq!(hit["firestore_id"], "fs1");
    assert_eq!(hit["item_name"], "Dompet hitam");
    assert_eq!(hit["match_score"], 0.9);
    assert_eq!(hit["match_type"], "text");
}

#[tokio::test]
async fn test_lost_item_registration_returns_potential_matches() {
    let (url, _) = spawn_ai_layer(true).await;
    let app = TestApp::with_ai_layer(&url).await;
    let admin = app.admin_token().await;
    let category = app.category(&admin, "Dompet").await;
    let (_, owner) = app.user("owner@uny.ac.id").await;

    let (status, body) = app
        .post("/api/lost-items", Some(&owner), lost_item_body("Dompet coklat", category))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["message"], "Lost item created successfully");
    assert!(body.get("warning").is_none());

    let item = &body["item"];
    let id = item["id"].as_i64().unwrap();
    assert_eq!(item["firestore_id"], format!("L{}", id));
    assert_eq!(item["needs_sync"], false);
    assert!(item["sync_error"].is_null());

    let matches = body["potential_matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["id"], "fs1");
    assert_eq!(matches[0]["match_type"], "hybrid");
}

#[tokio::test]
async fn test_sync_registers_items_once_ai_layer_recovers() {
    let (url, ai) = spawn_ai_layer(false).await;
    let app = TestApp::with_ai_layer(&url).await;
    let admin = app.admin_token().await;
    let category = app.category(&admin, "Buku").await;
    let (_, owner) = app.user("later@uny.ac.id").await;

    let (status, body) = app
        .post("/api/lost-items", Some(&owner), lost_item_body("Buku kalkulus", category))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["warning"].is_string());
    assert_eq!(body["item"]["needs_sync"], true);
    assert!(body["item"]["sync_error"].is_string());
    let id = body["item"]["id"].as_i64().unwrap();

    ai.online.store(true, Ordering::SeqCst);

    let (status, body) = app.post("/api/admin/sync-lost-items", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["synchronized"], 1);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["details"][0]["status"], "success");
    assert_eq!(body["details"][0]["firestore_id"], format!("L{}", id));

    let (status, body) = app.get(&format!("/api/lost-items/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let item = &body["item"];
    assert_eq!(item["firestore_id"], format!("L{}", id));
    assert_eq!(item["needs_sync"], false);
    assert!(item["sync_error"].is_null());
    assert!(item["last_sync_attempt"].is_string());

    let (_, body) = app.post("/api/admin/sync-lost-items", Some(&admin), json!({})).await;
    assert_eq!(body["synchronized"], 0);
}
