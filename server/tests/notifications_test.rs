//! Integration tests for the notification REST API.

use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use herbal_server::auth::jwt::issue_access_token;
use herbal_server::config::{NotificationsConfig, RealtimeConfig};
use herbal_server::db::models::{Role, UserStatus};
use herbal_server::db::users::{create_user, set_user_status, NewUser};
use herbal_server::db::DbPool;

struct TestServer {
    base_url: String,
    db: DbPool,
    jwt_secret: Vec<u8>,
    client: reqwest::Client,
}

impl TestServer {
    /// Create a user and return (user_id, access_token).
    fn user(&self, name: &str, role: Role, status: UserStatus) -> (String, String) {
        let user = create_user(
            &self.db,
            NewUser {
                name: name.to_string(),
                email: format!("{}@herbal.example", name.to_lowercase()),
                role,
                status,
            },
        )
        .expect("Failed to create user");
        let token = issue_access_token(&self.jwt_secret, &user.id, role, chrono::Duration::hours(1))
            .expect("Failed to issue token");
        (user.id, token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn put(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn send(&self, token: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/notifications/send"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn unread(&self, token: &str) -> u64 {
        let body: serde_json::Value = self
            .get("/api/notifications/unread-count", token)
            .await
            .json()
            .await
            .unwrap();
        body["count"].as_u64().unwrap()
    }
}

/// Helper: start the server on a random port.
async fn start_test_server() -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = herbal_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = herbal_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = herbal_server::state::AppState::new(
        db.clone(),
        jwt_secret.clone(),
        NotificationsConfig::default(),
        RealtimeConfig::default(),
    );

    let app = herbal_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    TestServer {
        base_url: format!("http://{}", addr),
        db,
        jwt_secret,
        client: reqwest::Client::new(),
    }
}

fn maintenance(target: serde_json::Value) -> serde_json::Value {
    let mut body = json!({
        "type": "system",
        "title": "Maintenance",
        "message": "Down at 10pm",
    });
    body.as_object_mut()
        .unwrap()
        .extend(target.as_object().unwrap().clone());
    body
}

#[tokio::test]
async fn test_health_check() {
    let server = start_test_server().await;
    let resp = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let server = start_test_server().await;
    let resp = server
        .client
        .get(server.url("/api/notifications"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server.get("/api/notifications", "not-a-jwt").await;
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Token is invalid");
}

#[tokio::test]
async fn test_inactive_user_is_rejected() {
    let server = start_test_server().await;
    let (user_id, token) = server.user("Ada", Role::User, UserStatus::Active);
    assert_eq!(server.get("/api/notifications", &token).await.status(), 200);

    assert!(set_user_status(&server.db, &user_id, UserStatus::Inactive).unwrap());

    let resp = server.get("/api/notifications", &token).await;
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Account is inactive");
}

#[tokio::test]
async fn test_admin_send_to_all_then_user_reads() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);
    let (_, ada) = server.user("Ada", Role::User, UserStatus::Active);
    let (_, bo) = server.user("Bo", Role::User, UserStatus::Active);
    server.user("Cy", Role::User, UserStatus::Inactive);

    let resp = server.send(&admin, maintenance(json!({ "target": "all" }))).await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Notification sent successfully");
    // Admin + Ada + Bo; Cy is inactive
    assert_eq!(body["count"], 3);
    assert_eq!(body["createdCount"], 3);
    assert_eq!(body["failedCount"], 0);
    assert!(body["batchId"].is_string());

    let list: serde_json::Value = server
        .get("/api/notifications", &ada)
        .await
        .json()
        .await
        .unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Maintenance");
    assert_eq!(list[0]["type"], "system");
    assert_eq!(list[0]["isRead"], false);
    assert_eq!(server.unread(&ada).await, 1);

    let id = list[0]["id"].as_str().unwrap();
    let resp = server.put(&format!("/api/notifications/{}/read", id), &ada).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["notification"]["isRead"], true);
    assert_eq!(server.unread(&ada).await, 0);

    // Bo's copy is untouched
    assert_eq!(server.unread(&bo).await, 1);
}

#[tokio::test]
async fn test_mark_read_on_foreign_notification_is_not_found() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);
    let (ada_id, ada) = server.user("Ada", Role::User, UserStatus::Active);
    let (_, bo) = server.user("Bo", Role::User, UserStatus::Active);

    server
        .send(&admin, maintenance(json!({ "target": "specific", "users": [ada_id] })))
        .await;

    let list: serde_json::Value = server
        .get("/api/notifications", &ada)
        .await
        .json()
        .await
        .unwrap();
    let id = list[0]["id"].as_str().unwrap();

    let resp = server.put(&format!("/api/notifications/{}/read", id), &bo).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Notification not found");
    assert_eq!(server.unread(&ada).await, 1);

    let resp = server.put("/api/notifications/does-not-exist/read", &ada).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_mark_all_read() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);
    let (ada_id, ada) = server.user("Ada", Role::User, UserStatus::Active);

    for _ in 0..3 {
        server
            .send(&admin, maintenance(json!({ "target": "single", "user": ada_id })))
            .await;
    }
    assert_eq!(server.unread(&ada).await, 3);

    let resp = server.put("/api/notifications/mark-all-read", &ada).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["modifiedCount"], 3);
    assert_eq!(server.unread(&ada).await, 0);

    // Second call has nothing left to change
    let body: serde_json::Value = server
        .put("/api/notifications/mark-all-read", &ada)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["modifiedCount"], 0);
}

#[tokio::test]
async fn test_list_respects_limit() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);
    let (ada_id, ada) = server.user("Ada", Role::User, UserStatus::Active);

    for i in 0..12 {
        server
            .send(
                &admin,
                json!({
                    "type": "order",
                    "title": format!("Order #{}", i),
                    "message": "Your order shipped",
                    "target": "single",
                    "user": ada_id,
                }),
            )
            .await;
    }

    let list: serde_json::Value = server
        .get("/api/notifications", &ada)
        .await
        .json()
        .await
        .unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 10);
    assert_eq!(list[0]["title"], "Order #11");

    let list: serde_json::Value = server
        .get("/api/notifications?limit=3", &ada)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_send_by_role() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);
    let (_, other_admin) = server.user("Ops", Role::Admin, UserStatus::Active);
    let (_, ada) = server.user("Ada", Role::User, UserStatus::Active);

    let body: serde_json::Value = server
        .send(&admin, maintenance(json!({ "target": "role", "role": "admin" })))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(server.unread(&other_admin).await, 1);
    assert_eq!(server.unread(&ada).await, 0);
}

#[tokio::test]
async fn test_send_by_conditions() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);
    let (_, ada) = server.user("Ada", Role::User, UserStatus::Active);
    let (_, bo) = server.user("Bo", Role::User, UserStatus::Active);

    let body: serde_json::Value = server
        .send(
            &admin,
            maintenance(json!({
                "target": "conditions",
                "conditions": { "role": "user", "nameContains": "ad" }
            })),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(server.unread(&ada).await, 1);
    assert_eq!(server.unread(&bo).await, 0);
}

#[tokio::test]
async fn test_send_with_no_matching_users() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);

    let resp = server
        .send(&admin, maintenance(json!({ "target": "role", "role": "user" })))
        .await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 0);
    assert_eq!(body["message"], "No matching users, nothing sent");
}

#[tokio::test]
async fn test_send_rejects_bad_requests() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);

    let resp = server
        .send(&admin, json!({ "type": "system", "message": "No title", "target": "all" }))
        .await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Type, title and message are required");

    let resp = server.send(&admin, maintenance(json!({ "target": "role" }))).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid target parameters");

    let resp = server
        .send(&admin, maintenance(json!({ "target": "specific", "users": [] })))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = server
        .send(
            &admin,
            maintenance(json!({
                "target": "conditions",
                "conditions": { "activeSince": "yesterday" }
            })),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid target parameters");
}

#[tokio::test]
async fn test_non_admin_cannot_send() {
    let server = start_test_server().await;
    let (_, ada) = server.user("Ada", Role::User, UserStatus::Active);

    let resp = server.send(&ada, maintenance(json!({ "target": "all" }))).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(server.unread(&ada).await, 0);

    let resp = server.get("/api/notifications/admin/recent", &ada).await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_public_notifications_listed_separately() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);
    let (_, ada) = server.user("Ada", Role::User, UserStatus::Active);

    let resp = server
        .send(
            &admin,
            json!({
                "type": "product",
                "title": "New Product Added",
                "message": "Chamomile has been added to our store!",
                "link": "/product-detail.html?id=p1",
                "target": "single",
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let own: serde_json::Value = server
        .get("/api/notifications", &ada)
        .await
        .json()
        .await
        .unwrap();
    assert!(own.as_array().unwrap().is_empty());
    assert_eq!(server.unread(&ada).await, 0);

    let public: serde_json::Value = server
        .get("/api/notifications/public", &ada)
        .await
        .json()
        .await
        .unwrap();
    let public = public.as_array().unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0]["type"], "product");
    assert!(public[0]["user"].is_null());
}

#[tokio::test]
async fn test_recent_view_collapses_fanout() {
    let server = start_test_server().await;
    let (_, admin) = server.user("Root", Role::Admin, UserStatus::Active);
    server.user("Ada", Role::User, UserStatus::Active);
    server.user("Bo", Role::User, UserStatus::Active);

    server.send(&admin, maintenance(json!({ "target": "all" }))).await;
    server
        .send(
            &admin,
            json!({
                "type": "order",
                "title": "Sale",
                "message": "Everything 10% off",
                "target": "all",
            }),
        )
        .await;

    let recent: serde_json::Value = server
        .get("/api/notifications/admin/recent", &admin)
        .await
        .json()
        .await
        .unwrap();
    let recent = recent.as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["title"], "Sale");
    assert_eq!(recent[1]["title"], "Maintenance");
}
