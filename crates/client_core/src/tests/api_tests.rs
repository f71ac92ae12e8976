use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Clone, Default)]
struct BackendState {
    sent: Arc<Mutex<Vec<(String, Value)>>>,
}

fn user_json(id: &str) -> Value {
    json!({
        "_id": id,
        "email": format!("{id}@example.com"),
        "firstName": "Ada",
        "lastName": "Lovelace",
        "profilePic": "",
        "createdAt": "2024-01-01T00:00:00Z"
    })
}

async fn handle_login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] != "secret1" {
        return (
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            Json(json!({ "message": "Invalid credentials" })),
        );
    }
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        "jwt=token-1; Path=/; HttpOnly".parse().expect("cookie"),
    );
    (
        StatusCode::OK,
        headers,
        Json(json!({ "data": user_json("me"), "message": "logged in" })),
    )
}

async fn handle_check_auth(headers: HeaderMap) -> impl IntoResponse {
    let authed = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|cookie| cookie.contains("jwt=token-1"));
    if authed {
        (StatusCode::OK, Json(json!({ "data": user_json("me") })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized - No Token Provided" })),
        )
    }
}

async fn handle_list_messages(Path(user_id): Path<String>) -> Json<Value> {
    Json(json!({
        "data": [{
            "_id": "m1",
            "senderId": user_id,
            "receiverId": "me",
            "text": "hi",
            "createdAt": "2024-01-01T10:00:00Z"
        }]
    }))
}

async fn handle_send(
    State(state): State<BackendState>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.sent.lock().await.push((user_id.clone(), body.clone()));
    Json(json!({
        "data": {
            "_id": "m2",
            "senderId": "me",
            "receiverId": user_id,
            "text": body["text"],
            "createdAt": "2024-01-01T10:01:00Z"
        }
    }))
}

async fn handle_update_profile(Json(body): Json<Value>) -> Json<Value> {
    let mut user = user_json("me");
    user["profilePic"] = body["profilePic"].clone();
    Json(json!({ "data": user }))
}

async fn spawn_backend() -> (HttpChatApi, BackendState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = BackendState::default();
    let app = Router::new()
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/check-auth", get(handle_check_auth))
        .route("/api/auth/logout", post(|| async { StatusCode::OK }))
        .route(
            "/api/users/all",
            get(|| async { Json(json!({ "data": [user_json("u1"), user_json("u2")] })) }),
        )
        .route("/api/users/user/update-profile", patch(handle_update_profile))
        .route("/api/messages/all/:user_id", get(handle_list_messages))
        .route("/api/messages/send/:user_id", post(handle_send))
        .route(
            "/api/broken",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let settings = ClientSettings {
        api_base_url: format!("http://{addr}/api"),
        ..ClientSettings::default()
    };
    (HttpChatApi::new(&settings).expect("client"), state)
}

#[tokio::test]
async fn login_cookie_authenticates_later_requests() {
    let (api, _) = spawn_backend().await;

    let err = api.check_auth().await.expect_err("no cookie yet");
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.user_message(), "Unauthorized - No Token Provided");
    assert!(err.requires_reauth());

    let user = api
        .login(&LoginRequest {
            email: "me@example.com".into(),
            password: "secret1".into(),
        })
        .await
        .expect("login");
    assert_eq!(user.id, UserId::from("me"));

    let checked = api.check_auth().await.expect("check auth");
    assert_eq!(checked, user);
}

#[tokio::test]
async fn backend_error_message_is_surfaced_verbatim() {
    let (api, _) = spawn_backend().await;
    let err = api
        .login(&LoginRequest {
            email: "me@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .expect_err("must fail");
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_status_reason() {
    let (api, _) = spawn_backend().await;
    let response = api
        .http
        .get(api.endpoint(&["broken"]))
        .send()
        .await
        .expect("send");
    let err = read_data::<Value>(response).await.expect_err("must fail");
    assert_eq!(err.user_message(), "Bad Gateway");
}

#[tokio::test]
async fn history_and_send_are_scoped_to_contact_path() {
    let (api, state) = spawn_backend().await;
    let contact = UserId::from("u42");

    let history = api.list_messages(&contact).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sender_id, contact);

    let sent = api
        .send_message(
            &contact,
            &SendMessageRequest {
                text: Some("hello".into()),
                image: None,
            },
        )
        .await
        .expect("send");
    assert_eq!(sent.receiver_id, contact);
    assert_eq!(sent.text(), Some("hello"));

    let recorded = state.sent.lock().await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, "u42");
    assert_eq!(recorded[0].1, json!({ "text": "hello" }));
}

#[tokio::test]
async fn lists_users_and_updates_profile_and_logs_out() {
    let (api, _) = spawn_backend().await;

    let users = api.list_users().await.expect("users");
    let ids: Vec<_> = users.iter().map(|user| user.id.as_str()).collect();
    assert_eq!(ids, ["u1", "u2"]);

    let updated = api
        .update_profile(&UpdateProfileRequest {
            profile_pic: "data:image/png;base64,AAAA".into(),
        })
        .await
        .expect("update");
    assert_eq!(updated.avatar(), Some("data:image/png;base64,AAAA"));

    api.logout().await.expect("logout");
}

#[test]
fn endpoint_appends_segments_to_base_path() {
    let settings = ClientSettings {
        api_base_url: "http://localhost:5001/api".into(),
        ..ClientSettings::default()
    };
    let api = HttpChatApi::new(&settings).expect("client");
    assert_eq!(
        api.endpoint(&["messages", "all", "u 1"]).as_str(),
        "http://localhost:5001/api/messages/all/u%201"
    );
}
