//! In-memory stand-in for the campus backend.
//!
//! Implements the REST contract the client core expects: resource routes
//! with `{ data, pagination }` envelopes, and cookie-session auth routes
//! under `/api/auth`. Resource routes require a session cookie. Two
//! diagnostic routes answer with an HTML page and a 429 so clients can be
//! exercised against awkward responses.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "better-auth.session_token";

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 10;

/// Fields a `search` parameter matches against.
const SEARCH_FIELDS: &[&str] = &["name", "code", "email"];

pub const RESOURCES: &[&str] = &["subjects", "departments", "classes", "users", "enrollments"];

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    email: String,
    password: String,
}

#[derive(Debug, Default)]
pub struct Store {
    records: HashMap<String, Vec<Value>>,
    next_id: i64,
    accounts: Vec<Account>,
    sessions: HashMap<String, String>,
}

pub type Db = Arc<RwLock<Store>>;

impl Store {
    /// A store preloaded with a few departments, subjects and classes.
    pub fn seeded() -> Self {
        let mut store = Store {
            next_id: 1,
            ..Store::default()
        };
        for resource in RESOURCES {
            store.records.insert(resource.to_string(), Vec::new());
        }
        for (code, name) in [("CS", "Computer Science"), ("MATH", "Mathematics"), ("ENG", "English")] {
            store.insert("departments", json!({ "code": code, "name": name }));
        }
        for (code, name, department) in [
            ("CS101", "Introduction to Computer Science", "CS"),
            ("MATH201", "Calculus II", "Math"),
            ("ENG102", "English Composition", "English"),
        ] {
            store.insert("subjects", json!({ "code": code, "name": name, "department": department }));
        }
        for (name, subject, teacher) in [("CS101 - Morning", 4, "t-1"), ("CS101 - Evening", 4, "t-2"), ("Calculus A", 5, "t-1")] {
            store.insert(
                "classes",
                json!({ "name": name, "subjectId": subject, "teacherId": teacher, "capacity": 30 }),
            );
        }
        store
    }

    fn insert(&mut self, resource: &str, mut record: Value) -> Value {
        if let Value::Object(fields) = &mut record {
            if !fields.contains_key("id") {
                fields.insert("id".to_string(), json!(self.next_id));
                self.next_id += 1;
            }
        }
        self.records.entry(resource.to_string()).or_default().push(record.clone());
        record
    }

    fn user_for(&self, jar: &CookieJar) -> Option<Value> {
        let token = jar.get(SESSION_COOKIE)?.value().to_string();
        let user_id = self.sessions.get(&token)?;
        self.records
            .get("users")?
            .iter()
            .find(|user| id_string(&user["id"]) == *user_id)
            .cloned()
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn app() -> Router {
    app_with(Arc::new(RwLock::new(Store::seeded())))
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/api/auth/sign-up/email", post(sign_up))
        .route("/api/auth/sign-in/email", post(sign_in))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/get-session", get(get_session))
        .route("/api/auth/update-user", post(update_user))
        .route("/api/diagnostics/html", get(html_page))
        .route("/api/diagnostics/rate-limited", get(rate_limited))
        .route("/api/{resource}", get(list_records).post(create_record))
        .route("/api/{resource}/{id}", get(get_record).patch(update_record))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// JSON error body `{ "message": ... }` with a status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn require_resource(store: &Store, resource: &str) -> ApiResult<()> {
    if store.records.contains_key(resource) {
        Ok(())
    } else {
        Err(ApiError::new(StatusCode::NOT_FOUND, format!("Unknown resource '{resource}'")))
    }
}

fn require_session(store: &Store, jar: &CookieJar) -> ApiResult<Value> {
    store
        .user_for(jar)
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized"))
}

// --- auth ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_cld_pub_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<i64>,
}

fn default_role() -> String {
    "student".to_string()
}

#[derive(Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_cld_pub_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

fn start_session(store: &mut Store, jar: CookieJar, user_id: &str) -> (CookieJar, String) {
    let token = Uuid::new_v4().simple().to_string();
    store.sessions.insert(token.clone(), user_id.to_string());
    let cookie = Cookie::build((SESSION_COOKIE, token.clone())).path("/").http_only(true);
    (jar.add(cookie), token)
}

async fn sign_up(State(db): State<Db>, jar: CookieJar, Json(input): Json<SignUp>) -> ApiResult<(CookieJar, Json<Value>)> {
    if !["admin", "teacher", "student"].contains(&input.role.as_str()) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid role"));
    }
    if input.password.len() < 8 {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Password too short"));
    }

    let mut store = db.write().await;
    if store.accounts.iter().any(|a| a.email.eq_ignore_ascii_case(&input.email)) {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "User already exists. Use another email.",
        ));
    }

    let user_id = Uuid::new_v4().to_string();
    let user = json!({
        "id": user_id,
        "name": input.name,
        "email": input.email,
        "image": input.image,
        "role": input.role,
        "departmentId": input.department_id,
        "imageCldPubId": input.image_cld_pub_id,
        "emailVerified": false,
    });
    store.insert("users", user.clone());
    store.accounts.push(Account {
        user_id: user_id.clone(),
        email: input.email,
        password: input.password,
    });
    let (jar, token) = start_session(&mut store, jar, &user_id);
    Ok((jar, Json(json!({ "token": token, "user": user }))))
}

async fn sign_in(State(db): State<Db>, jar: CookieJar, Json(input): Json<SignIn>) -> ApiResult<(CookieJar, Json<Value>)> {
    let mut store = db.write().await;
    let account = store
        .accounts
        .iter()
        .find(|a| a.email.eq_ignore_ascii_case(&input.email) && a.password == input.password)
        .cloned()
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;
    let (jar, token) = start_session(&mut store, jar, &account.user_id);
    let user = store.user_for(&jar).unwrap_or(Value::Null);
    Ok((jar, Json(json!({ "redirect": false, "token": token, "user": user }))))
}

async fn sign_out(State(db): State<Db>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        db.write().await.sessions.remove(cookie.value());
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(json!({ "success": true })))
}

async fn get_session(State(db): State<Db>, jar: CookieJar) -> Json<Value> {
    let store = db.read().await;
    match store.user_for(&jar) {
        Some(user) => Json(json!({
            "session": { "userId": user["id"].clone(), "expiresAt": "2099-01-01T00:00:00.000Z" },
            "user": user,
        })),
        None => Json(Value::Null),
    }
}

async fn update_user(State(db): State<Db>, jar: CookieJar, Json(input): Json<UpdateUser>) -> ApiResult<Json<Value>> {
    if input.email.is_some() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Email can not be updated"));
    }
    let mut store = db.write().await;
    let user_id = id_string(&require_session(&store, &jar)?["id"]);
    let user = store
        .records
        .get_mut("users")
        .and_then(|users| users.iter_mut().find(|user| id_string(&user["id"]) == user_id))
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized"))?;
    if let Value::Object(fields) = &mut *user {
        let changes = [
            ("name", input.name),
            ("image", input.image),
            ("imageCldPubId", input.image_cld_pub_id),
        ];
        for (key, value) in changes {
            if let Some(value) = value {
                fields.insert(key.to_string(), Value::String(value));
            }
        }
    }
    Ok(Json(json!({ "status": true })))
}

// --- diagnostics ---

async fn html_page() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<!doctype html><html><head><title>Maintenance</title></head><body>Back soon</body></html>",
    )
}

async fn rate_limited() -> ApiError {
    ApiError::new(StatusCode::TOO_MANY_REQUESTS, "Too many requests. Please slow down.")
}

// --- resources ---

fn matches(record: &Value, key: &str, wanted: &str) -> bool {
    if key == "search" {
        let needle = wanted.to_lowercase();
        return SEARCH_FIELDS
            .iter()
            .filter_map(|field| record[*field].as_str())
            .any(|text| text.to_lowercase().contains(&needle));
    }
    let id_key = format!("{key}Id");
    [key, id_key.as_str()]
        .iter()
        .filter(|field| !record[**field].is_null())
        .any(|field| id_string(&record[*field]).eq_ignore_ascii_case(wanted))
}

async fn list_records(
    State(db): State<Db>,
    jar: CookieJar,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let store = db.read().await;
    require_resource(&store, &resource)?;
    require_session(&store, &jar)?;

    let page = params.get("page").and_then(|p| p.parse().ok()).filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE);
    let limit = params.get("limit").and_then(|l| l.parse().ok()).filter(|l| *l >= 1).unwrap_or(DEFAULT_LIMIT);

    let filtered: Vec<&Value> = store.records[&resource]
        .iter()
        .filter(|record| {
            params
                .iter()
                .filter(|(key, _)| key.as_str() != "page" && key.as_str() != "limit")
                .all(|(key, wanted)| matches(record, key, wanted))
        })
        .collect();

    let total = filtered.len();
    let offset = page.saturating_sub(1).saturating_mul(limit);
    let data: Vec<Value> = filtered.into_iter().skip(offset).take(limit).cloned().collect();
    Ok(Json(json!({
        "data": data,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": total.div_ceil(limit),
        }
    })))
}

async fn create_record(
    State(db): State<Db>,
    jar: CookieJar,
    Path(resource): Path<String>,
    Json(input): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut store = db.write().await;
    require_resource(&store, &resource)?;
    require_session(&store, &jar)?;

    let Value::Object(mut fields) = input else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Expected a JSON object"));
    };
    fields.remove("id");
    let record = store.insert(&resource, Value::Object(fields));
    Ok((StatusCode::CREATED, Json(json!({ "data": record }))))
}

async fn get_record(
    State(db): State<Db>,
    jar: CookieJar,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let store = db.read().await;
    require_resource(&store, &resource)?;
    require_session(&store, &jar)?;

    store.records[&resource]
        .iter()
        .find(|record| id_string(&record["id"]) == id)
        .map(|record| Json(json!({ "data": record })))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Not found"))
}

async fn update_record(
    State(db): State<Db>,
    jar: CookieJar,
    Path((resource, id)): Path<(String, String)>,
    Json(input): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    let mut store = db.write().await;
    require_resource(&store, &resource)?;
    require_session(&store, &jar)?;

    let record = store
        .records
        .get_mut(&resource)
        .and_then(|records| records.iter_mut().find(|record| id_string(&record["id"]) == id))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Not found"))?;
    if let Value::Object(fields) = &mut *record {
        for (key, value) in input {
            if key != "id" {
                fields.insert(key, value);
            }
        }
    }
    Ok(Json(json!({ "data": record.clone() })))
}
