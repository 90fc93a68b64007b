//! Session and authentication gateway.
//!
//! # Design
//! The backend owns the session; the gateway keeps no local copy of it. The
//! only state that outlives a call is the session cookie held by the
//! transport's cookie store. Each operation is one round-trip to the auth
//! endpoints, split into `build_*` / `parse_*` halves like the data adapter.
//!
//! Failure policy:
//! - login / register / logout / update_user report an [`AuthFailure`] with a fixed name
//!   and the backend's message when it gave one.
//! - check / identity / permissions never fail: unreachable backends and
//!   missing sessions both resolve to "logged out" (`CheckResponse`,
//!   `None`). `check` only asks whether a session exists; the user record is
//!   decoded into an [`Identity`] by `get_identity` alone, so an unexpected
//!   role cannot log a live session out. A transport failure during `check` is told apart only by the
//!   `"Network Error"` error name.
//! - [`SessionGateway::on_error`] turns a 401 into a logout signal. 429 is
//!   rate limiting, not an auth failure, and passes through untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::error::{backend_message, DataError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

pub const HOME_ROUTE: &str = "/";
pub const LOGIN_ROUTE: &str = "/login";

const SIGN_UP_ENDPOINT: &str = "sign-up/email";
const SIGN_IN_ENDPOINT: &str = "sign-in/email";
const SIGN_OUT_ENDPOINT: &str = "sign-out";
const SESSION_ENDPOINT: &str = "get-session";
const UPDATE_USER_ENDPOINT: &str = "update-user";

const REGISTRATION_FAILED: &str = "Registration failed";
const REGISTRATION_FALLBACK: &str = "Unable to create account. Please try again.";
const LOGIN_FAILED: &str = "Login failed";
const LOGIN_FALLBACK: &str = "Please try again later.";
const LOGOUT_FAILED: &str = "Logout failed";
const LOGOUT_MESSAGE: &str = "Unable to log out. Please try again.";
const PROFILE_UPDATE_FAILED: &str = "Profile update failed";
const PROFILE_UPDATE_FALLBACK: &str = "Failed to update auth profile";

pub const UNAUTHORIZED: &str = "Unauthorized";
pub const NETWORK_ERROR: &str = "Network Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    #[default]
    Student,
}

/// The signed-in user as reported by the session endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub image: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default)]
    pub image_cld_pub_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpPayload {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_cld_pub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<i64>,
}

#[derive(Serialize)]
struct SignInPayload<'a> {
    email: &'a str,
    password: &'a str,
}

/// Profile fields the signed-in user may change on their own session.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_cld_pub_id: Option<String>,
}

/// `/get-session` body, kept loose: the user record is only decoded on demand.
#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    #[serde(default)]
    session: Option<Value>,
    #[serde(default)]
    user: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct AuthFailure {
    pub name: String,
    pub message: String,
}

impl AuthFailure {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    pub redirect_to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No check has resolved yet.
    #[default]
    Unknown,
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResponse {
    pub authenticated: bool,
    pub logout: bool,
    pub redirect_to: Option<String>,
    pub error: Option<AuthFailure>,
}

impl CheckResponse {
    fn authenticated() -> Self {
        Self {
            authenticated: true,
            logout: false,
            redirect_to: None,
            error: None,
        }
    }

    fn logged_out(error: AuthFailure) -> Self {
        Self {
            authenticated: false,
            logout: true,
            redirect_to: Some(LOGIN_ROUTE.to_string()),
            error: Some(error),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.authenticated {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// True when the check failed because the backend could not be reached.
    pub fn is_network_error(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.name == NETWORK_ERROR)
    }
}

/// Outcome of [`SessionGateway::on_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnErrorResponse {
    /// The session is gone; the host should log out and redirect.
    Logout,
    /// Not an auth failure; the caller handles it.
    Error(DataError),
}

pub struct SessionGateway<T: ?Sized> {
    config: ClientConfig,
    transport: Arc<T>,
}

impl<T: ?Sized> Clone for SessionGateway<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

fn json_post<B: Serialize>(url: String, body: &B) -> Option<HttpRequest> {
    serde_json::to_string(body)
        .map_err(|err| tracing::error!(error = %err, "failed to encode auth payload"))
        .ok()
        .map(|body| HttpRequest::json(HttpMethod::Post, url, body))
}

fn expect_success(response: &HttpResponse, name: &str, fallback: &str) -> Result<(), AuthFailure> {
    if response.is_success() {
        return Ok(());
    }
    let message = backend_message(response).unwrap_or_else(|| fallback.to_string());
    tracing::error!(status = response.status, %message, "{name}");
    Err(AuthFailure::new(name, message))
}

fn parse_action(response: &HttpResponse, name: &str, fallback: &str, redirect: &str) -> Result<AuthSuccess, AuthFailure> {
    expect_success(response, name, fallback)?;
    Ok(AuthSuccess {
        redirect_to: redirect.to_string(),
    })
}

fn parse_session(response: &HttpResponse) -> Option<SessionEnvelope> {
    if !response.is_success() {
        tracing::debug!(status = response.status, "session lookup rejected");
        return None;
    }
    match serde_json::from_str::<Option<SessionEnvelope>>(&response.body) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(error = %err, "undecodable session payload");
            None
        }
    }
}

fn parse_identity(response: &HttpResponse) -> Option<Identity> {
    let user = parse_session(response)?.user?;
    serde_json::from_value(user)
        .map_err(|err| tracing::warn!(error = %err, "session user does not match the identity shape"))
        .ok()
}

impl<T: Transport + ?Sized> SessionGateway<T> {
    pub fn new(config: ClientConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    pub fn build_register(&self, payload: &SignUpPayload) -> Option<HttpRequest> {
        json_post(self.config.auth_url(SIGN_UP_ENDPOINT), payload)
    }

    pub fn build_login(&self, email: &str, password: &str) -> Option<HttpRequest> {
        json_post(self.config.auth_url(SIGN_IN_ENDPOINT), &SignInPayload { email, password })
    }

    pub fn build_logout(&self) -> HttpRequest {
        HttpRequest::json(HttpMethod::Post, self.config.auth_url(SIGN_OUT_ENDPOINT), "{}".to_string())
    }

    pub fn build_session(&self) -> HttpRequest {
        HttpRequest::get(self.config.auth_url(SESSION_ENDPOINT))
    }

    pub fn build_update_user(&self, update: &ProfileUpdate) -> Option<HttpRequest> {
        json_post(self.config.auth_url(UPDATE_USER_ENDPOINT), update)
    }

    pub fn parse_register(&self, response: &HttpResponse) -> Result<AuthSuccess, AuthFailure> {
        parse_action(response, REGISTRATION_FAILED, REGISTRATION_FALLBACK, HOME_ROUTE)
    }

    pub fn parse_login(&self, response: &HttpResponse) -> Result<AuthSuccess, AuthFailure> {
        parse_action(response, LOGIN_FAILED, LOGIN_FALLBACK, HOME_ROUTE)
    }

    pub fn parse_logout(&self, response: &HttpResponse) -> Result<AuthSuccess, AuthFailure> {
        parse_action(response, LOGOUT_FAILED, LOGOUT_MESSAGE, LOGIN_ROUTE)
            .map_err(|_| AuthFailure::new(LOGOUT_FAILED, LOGOUT_MESSAGE))
    }

    pub fn parse_update_user(&self, response: &HttpResponse) -> Result<(), AuthFailure> {
        expect_success(response, PROFILE_UPDATE_FAILED, PROFILE_UPDATE_FALLBACK)
    }

    /// Authenticated whenever the backend reports a session object.
    pub fn parse_check(&self, response: &HttpResponse) -> CheckResponse {
        match parse_session(response).and_then(|envelope| envelope.session) {
            Some(_) => CheckResponse::authenticated(),
            None => CheckResponse::logged_out(AuthFailure::new(UNAUTHORIZED, "Check failed")),
        }
    }

    pub fn parse_identity(&self, response: &HttpResponse) -> Option<Identity> {
        parse_identity(response)
    }

    pub async fn register(&self, payload: &SignUpPayload) -> Result<AuthSuccess, AuthFailure> {
        let failure = || AuthFailure::new(REGISTRATION_FAILED, REGISTRATION_FALLBACK);
        let request = self.build_register(payload).ok_or_else(failure)?;
        match self.transport.execute(request).await {
            Ok(response) => self.parse_register(&response),
            Err(err) => {
                tracing::error!(error = %err, "register error");
                Err(failure())
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSuccess, AuthFailure> {
        let failure = || AuthFailure::new(LOGIN_FAILED, LOGIN_FALLBACK);
        let request = self.build_login(email, password).ok_or_else(failure)?;
        match self.transport.execute(request).await {
            Ok(response) => self.parse_login(&response),
            Err(err) => {
                tracing::error!(error = %err, "login exception");
                Err(failure())
            }
        }
    }

    /// Always calls sign-out. A failure is informational: the host should
    /// treat its UI as logged out regardless.
    pub async fn logout(&self) -> Result<AuthSuccess, AuthFailure> {
        match self.transport.execute(self.build_logout()).await {
            Ok(response) => self.parse_logout(&response),
            Err(err) => {
                tracing::error!(error = %err, "logout error");
                Err(AuthFailure::new(LOGOUT_FAILED, LOGOUT_MESSAGE))
            }
        }
    }

    /// Changes the signed-in user's profile through the auth backend, so the
    /// session's own copy of the user stays current.
    pub async fn update_user(&self, update: &ProfileUpdate) -> Result<(), AuthFailure> {
        let failure = || AuthFailure::new(PROFILE_UPDATE_FAILED, PROFILE_UPDATE_FALLBACK);
        let request = self.build_update_user(update).ok_or_else(failure)?;
        match self.transport.execute(request).await {
            Ok(response) => self.parse_update_user(&response),
            Err(err) => {
                tracing::error!(error = %err, "profile update error");
                Err(failure())
            }
        }
    }

    pub async fn check(&self) -> CheckResponse {
        match self.transport.execute(self.build_session()).await {
            Ok(response) => self.parse_check(&response),
            Err(err) => {
                tracing::warn!(error = %err, "session check could not reach the backend");
                CheckResponse::logged_out(AuthFailure::new(NETWORK_ERROR, "Unable to reach the server."))
            }
        }
    }

    pub async fn get_identity(&self) -> Option<Identity> {
        match self.transport.execute(self.build_session()).await {
            Ok(response) => parse_identity(&response),
            Err(err) => {
                tracing::warn!(error = %err, "identity lookup failed");
                None
            }
        }
    }

    pub async fn get_permissions(&self) -> Option<Permissions> {
        self.get_identity().await.map(|identity| Permissions { role: identity.role })
    }

    pub fn on_error(&self, error: DataError) -> OnErrorResponse {
        match error.status_code() {
            Some(401) => OnErrorResponse::Logout,
            _ => OnErrorResponse::Error(error),
        }
    }
}
