use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, SESSION_COOKIE};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(http::header::COOKIE, cookie);
    }
    builder.body(body.to_string()).unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(http::header::COOKIE, cookie);
    }
    builder.body(String::new()).unwrap()
}

/// Register a user and return the `name=value` session cookie.
async fn sign_up(app: &Router, email: &str, role: &str) -> String {
    let body = format!(r#"{{"email":"{email}","password":"password123","name":"Test User","role":"{role}"}}"#);
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/sign-up/email", None, &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get(http::header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .to_string();
    set_cookie.split(';').next().unwrap().to_string()
}

// --- auth ---

#[tokio::test]
async fn sign_up_sets_session_cookie() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "teacher").await;
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));

    let resp = app.clone().oneshot(get_request("/api/auth/get-session", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let session = body_json(resp).await;
    assert_eq!(session["user"]["email"], "ada@school.test");
    assert_eq!(session["user"]["role"], "teacher");
}

#[tokio::test]
async fn get_session_without_cookie_is_null() {
    let resp = app().oneshot(get_request("/api/auth/get-session", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, Value::Null);
}

#[tokio::test]
async fn duplicate_sign_up_is_rejected() {
    let app = app();
    sign_up(&app, "dup@school.test", "student").await;
    let body = r#"{"email":"dup@school.test","password":"password123","name":"Again"}"#;
    let resp = app
        .oneshot(json_request("POST", "/api/auth/sign-up/email", None, body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(resp).await["message"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn sign_in_with_wrong_password_returns_401() {
    let app = app();
    sign_up(&app, "ada@school.test", "admin").await;
    let resp = app
        .oneshot(json_request(
            "POST",
            "/api/auth/sign-in/email",
            None,
            r#"{"email":"ada@school.test","password":"nope"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Invalid email or password");
}

#[tokio::test]
async fn update_user_changes_session_user() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "teacher").await;
    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/update-user",
            Some(&cookie),
            r#"{"name":"Ada L.","imageCldPubId":"avatars/ada"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], true);

    let resp = app.clone().oneshot(get_request("/api/auth/get-session", Some(&cookie))).await.unwrap();
    let user = body_json(resp).await["user"].clone();
    assert_eq!(user["name"], "Ada L.");
    assert_eq!(user["imageCldPubId"], "avatars/ada");
    assert_eq!(user["role"], "teacher");

    let resp = app
        .oneshot(json_request(
            "POST",
            "/api/auth/update-user",
            Some(&cookie),
            r#"{"email":"other@school.test"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["message"], "Email can not be updated");
}

#[tokio::test]
async fn update_user_requires_session() {
    let resp = app()
        .oneshot(json_request("POST", "/api/auth/update-user", None, r#"{"name":"X"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_out_ends_session() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "admin").await;
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/sign-out", Some(&cookie), "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get_request("/api/subjects", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- resources ---

#[tokio::test]
async fn list_requires_session() {
    let resp = app().oneshot(get_request("/api/subjects", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Unauthorized");
}

#[tokio::test]
async fn list_paginates_and_reports_total() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "admin").await;
    let resp = app
        .oneshot(get_request("/api/subjects?page=2&limit=2", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 2);
}

#[tokio::test]
async fn list_with_huge_page_is_empty() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "admin").await;
    let uri = format!("/api/subjects?page={}&limit={}", usize::MAX, usize::MAX);
    let resp = app.oneshot(get_request(&uri, Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["pagination"]["total"], 3);
}

#[tokio::test]
async fn list_filters_by_search_and_ids() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "admin").await;

    let resp = app
        .clone()
        .oneshot(get_request("/api/subjects?search=calc", Some(&cookie)))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["code"], "MATH201");

    let resp = app
        .oneshot(get_request("/api/classes?subject=4&teacher=t-1", Some(&cookie)))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["name"], "CS101 - Morning");
}

#[tokio::test]
async fn unknown_resource_returns_404() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "admin").await;
    let resp = app.oneshot(get_request("/api/parking", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_get_and_update_record() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "admin").await;

    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/departments",
            Some(&cookie),
            r#"{"code":"PHY","name":"Physics"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await["data"].clone();
    let id = created["id"].as_i64().unwrap();

    let resp = app
        .clone()
        .oneshot(get_request(&format!("/api/departments/{id}"), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["name"], "Physics");

    let resp = app
        .oneshot(json_request(
            "PATCH",
            &format!("/api/departments/{id}"),
            Some(&cookie),
            r#"{"name":"Applied Physics","id":999}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = body_json(resp).await["data"].clone();
    assert_eq!(updated["name"], "Applied Physics");
    assert_eq!(updated["id"], id);
}

#[tokio::test]
async fn create_rejects_non_object() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "admin").await;
    let resp = app
        .oneshot(json_request("POST", "/api/subjects", Some(&cookie), "[1,2]"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_missing_record_returns_json_404() {
    let app = app();
    let cookie = sign_up(&app, "ada@school.test", "admin").await;
    let resp = app.oneshot(get_request("/api/classes/9999", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["message"], "Not found");
}

// --- diagnostics ---

#[tokio::test]
async fn html_diagnostic_is_200_html() {
    let resp = app().oneshot(get_request("/api/diagnostics/html", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[http::header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    assert!(body_bytes(resp).await.starts_with(b"<!doctype html>"));
}

#[tokio::test]
async fn rate_limited_diagnostic_is_429() {
    let resp = app().oneshot(get_request("/api/diagnostics/rate-limited", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}
