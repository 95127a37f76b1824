//! Integration tests for the session client

use futures::future::join_all;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tutora_core::{Role, StoredSession};
use tutora_http::types::LoginRequest;
use tutora_http::{
    ClientError, MemoryTokenStore, Notice, ResetReason, SessionClient, SessionListener, TokenStore,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

#[derive(Default)]
struct RecordingListener {
    notices: Mutex<Vec<Notice>>,
    resets: Mutex<Vec<ResetReason>>,
    renewals: Mutex<Vec<StoredSession>>,
}

impl RecordingListener {
    fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }

    fn resets(&self) -> Vec<ResetReason> {
        self.resets.lock().unwrap().clone()
    }

    fn renewals(&self) -> Vec<StoredSession> {
        self.renewals.lock().unwrap().clone()
    }
}

impl SessionListener for RecordingListener {
    fn on_notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }

    fn on_session_renewed(&self, session: &StoredSession) {
        self.renewals.lock().unwrap().push(session.clone());
    }

    fn on_session_reset(&self, reason: ResetReason) {
        self.resets.lock().unwrap().push(reason);
    }
}

struct NoAuthorization;

impl Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

struct Harness {
    server: MockServer,
    client: SessionClient,
    store: Arc<MemoryTokenStore>,
    listener: Arc<RecordingListener>,
}

async fn harness(stored: Option<StoredSession>) -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(stored.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_session));
    let listener = Arc::new(RecordingListener::default());

    let client = SessionClient::builder()
        .base_url(server.uri())
        .token_store(store.clone())
        .listener(listener.clone())
        .build()
        .unwrap();

    Harness {
        server,
        client,
        store,
        listener,
    }
}

fn student(token: &str) -> Option<StoredSession> {
    Some(StoredSession::new(token, Some(Role::Student)))
}

#[tokio::test]
async fn bearer_token_attached_on_every_request() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(path("/courses"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "c1" }])))
        .expect(3)
        .mount(&h.server)
        .await;

    for _ in 0..3 {
        let courses: Value = h.client.get("/courses").await.unwrap();
        assert_eq!(courses[0]["id"], "c1");
    }
}

#[tokio::test]
async fn unauthenticated_requests_carry_no_header() {
    let h = harness(None).await;

    Mock::given(method("GET"))
        .and(path("/courses/public"))
        .and(NoAuthorization)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let courses: Vec<Value> = h.client.get("/courses/public").await.unwrap();
    assert!(courses.is_empty());
}

#[tokio::test]
async fn token_is_read_at_dispatch_time() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer T9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "u1" })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.store.save("T9", Some(Role::Student)).await.unwrap();
    let user = h.client.current_user().await.unwrap();
    assert_eq!(user.id, "u1");
}

#[tokio::test]
async fn unauthorized_then_refresh_retries_once_with_new_token() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(path("/courses/mine"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .and(NoAuthorization)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "T2" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/mine"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 2 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let body: Value = h.client.get("/courses/mine").await.unwrap();
    assert_eq!(body["count"], 2);

    let stored = h.store.read().await.unwrap().unwrap();
    assert_eq!(stored.token, "T2");
    assert_eq!(stored.role, Some(Role::Student));
    assert!(h.listener.notices().is_empty());
    assert!(h.listener.resets().is_empty());
}

#[tokio::test]
async fn failed_refresh_clears_the_session() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&h.server)
        .await;

    let result: Result<Value, _> = h.client.get("/cart").await;

    assert!(matches!(result, Err(ClientError::SessionExpired)));
    assert_eq!(h.store.read().await.unwrap(), None);
    assert_eq!(h.listener.resets(), vec![ResetReason::SessionExpired]);
    assert_eq!(h.listener.notices(), vec![Notice::SESSION_EXPIRED.to_string()]);
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "T2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/a"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "a" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/b"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "b" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let (a, b) = tokio::join!(
        h.client.get::<Value>("/courses/a"),
        h.client.get::<Value>("/courses/b"),
    );

    assert_eq!(a.unwrap()["id"], "a");
    assert_eq!(b.unwrap()["id"], "b");
    assert_eq!(h.store.read().await.unwrap().unwrap().token, "T2");
}

#[tokio::test]
async fn burst_of_expired_requests_refreshes_once() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(5)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "T2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(5)
        .mount(&h.server)
        .await;

    let paths: Vec<String> = (0..5).map(|i| format!("/lessons/{i}")).collect();
    let results = join_all(paths.iter().map(|p| h.client.get::<Value>(p))).await;

    assert!(results.iter().all(Result::is_ok));
    assert!(h.listener.resets().is_empty());
    assert_eq!(
        h.listener.renewals(),
        vec![StoredSession::new("T2", Some(Role::Student))]
    );
}

#[tokio::test]
async fn concurrent_requests_after_failed_refresh_do_not_refresh_again() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&h.server)
        .await;

    let (a, b) = tokio::join!(
        h.client.get::<Value>("/courses/a"),
        h.client.get::<Value>("/courses/b"),
    );

    assert!(matches!(a, Err(ClientError::SessionExpired)));
    assert!(matches!(b, Err(ClientError::SessionExpired)));
    assert_eq!(h.listener.resets(), vec![ResetReason::SessionExpired]);
}

#[tokio::test]
async fn forbidden_always_clears_the_session() {
    let h = harness(Some(StoredSession::new("T1", Some(Role::Tutor)))).await;

    Mock::given(method("DELETE"))
        .and(path("/admin/courses/c1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "Admins only" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let result: Result<Value, _> = h.client.delete("/admin/courses/c1").await;

    match result {
        Err(ClientError::Forbidden(message)) => assert_eq!(message, "Admins only"),
        other => panic!("expected forbidden, got {other:?}"),
    }
    assert_eq!(h.store.read().await.unwrap(), None);
    assert_eq!(h.listener.resets(), vec![ResetReason::AccessDenied]);
    assert_eq!(h.listener.notices(), vec![Notice::ACCESS_DENIED.to_string()]);
}

#[tokio::test]
async fn forbidden_after_refresh_still_clears_the_session() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "T2" })))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&h.server)
        .await;

    let result: Result<Value, _> = h.client.get("/admin/users").await;

    assert!(matches!(result, Err(ClientError::Forbidden(_))));
    assert_eq!(h.store.read().await.unwrap(), None);
}

#[tokio::test]
async fn other_errors_surface_message_and_keep_session() {
    let h = harness(student("T1")).await;

    Mock::given(method("POST"))
        .and(path("/courses/c1/reviews"))
        .and(body_json(json!({ "rating": 9 })))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "success": false, "message": "Rating must be 1-5" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let result: Result<Value, _> = h
        .client
        .post("/courses/c1/reviews", &json!({ "rating": 9 }))
        .await;

    match result {
        Err(ClientError::ServerError { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message, "Rating must be 1-5");
        }
        other => panic!("expected server error, got {other:?}"),
    }
    assert_eq!(h.listener.notices(), vec!["Rating must be 1-5".to_string()]);
    assert!(h.listener.resets().is_empty());
    assert_eq!(h.store.read().await.unwrap(), student("T1"));
}

#[tokio::test]
async fn retried_request_is_not_refreshed_twice() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(path("/tutor/earnings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("still unauthorized"))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "T2" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let result: Result<Value, _> = h.client.get("/tutor/earnings").await;

    match result {
        Err(ClientError::Unauthorized(message)) => assert_eq!(message, "still unauthorized"),
        other => panic!("expected unauthorized, got {other:?}"),
    }
    assert_eq!(h.store.read().await.unwrap().unwrap().token, "T2");
    assert!(h.listener.resets().is_empty());
}

#[tokio::test]
async fn transport_failure_surfaces_generic_notice() {
    let listener = Arc::new(RecordingListener::default());
    let client = SessionClient::builder()
        .base_url("http://127.0.0.1:1")
        .listener(listener.clone())
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let result: Result<Value, _> = client.get("/courses").await;

    assert!(matches!(result, Err(ClientError::Request(_))));
    assert_eq!(listener.notices(), vec![Notice::NETWORK_FAILURE.to_string()]);
}

#[tokio::test]
async fn sign_in_is_not_intercepted() {
    let h = harness(None).await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({
            "email": "ada@example.com",
            "password": "wrong",
            "role": "tutor"
        })))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let result = h
        .client
        .sign_in(&LoginRequest {
            email: "ada@example.com".into(),
            password: "wrong".into(),
            role: Role::Tutor,
        })
        .await;

    assert!(matches!(result, Err(ClientError::Unauthorized(_))));
    assert_eq!(h.listener.notices(), vec!["Invalid credentials".to_string()]);
    assert!(h.listener.resets().is_empty());
}

#[tokio::test]
async fn refresh_sends_cookies_from_sign_in() {
    let h = harness(None).await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refreshToken=R1; Path=/; HttpOnly")
                .set_body_json(json!({ "token": "T1", "role": "student" })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .and(header("cookie", "refreshToken=R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "T2" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "s1", "role": "student" })))
        .mount(&h.server)
        .await;

    let login = h
        .client
        .sign_in(&LoginRequest {
            email: "s@example.com".into(),
            password: "secret".into(),
            role: Role::Student,
        })
        .await
        .unwrap();
    h.store.save(&login.token, Some(login.role)).await.unwrap();

    let user = h.client.current_user().await.unwrap();
    assert_eq!(user.id, "s1");
}

#[tokio::test]
async fn logout_notification_uses_token_without_refresh() {
    let h = harness(student("T1")).await;

    Mock::given(method("GET"))
        .and(path("/logout"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "message": "Bye" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h.client.notify_logout().await.unwrap();
    assert!(response.success);
    assert_eq!(response.message.as_deref(), Some("Bye"));
}
