//! axum adapter: cookie extraction, the session middleware and the auth
//! routes.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::crypto::UserId;
use crate::error::ErrorResponse;
use crate::login::{DirectoryError, LoginError, LoginGrant, LoginService, PasswordVerifier, UserDirectory};
use crate::session::{AuthOutcome, CookieDirective, SessionArtifacts, SessionGate};

/// Header carrying a caller-supplied correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Identity of the caller, inserted by [`require_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl SessionArtifacts {
    /// Collect artifacts from every `Cookie` header of a request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let joined = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        Self::from_cookie_header(&joined)
    }
}

/// Append one `Set-Cookie` header per directive.
pub fn apply_directives(headers: &mut HeaderMap, directives: &[CookieDirective]) {
    for directive in directives {
        match HeaderValue::from_str(&directive.to_header_value()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(_) => warn!(cookie = directive.name, "Dropping unrenderable cookie"),
        }
    }
}

/// Put `directive` ahead of every `Set-Cookie` the handler wrote, so a
/// handler that clears the same cookie has the last word.
fn prepend_directive(headers: &mut HeaderMap, directive: &CookieDirective) {
    let written: Vec<HeaderValue> = headers.get_all(header::SET_COOKIE).iter().cloned().collect();
    headers.remove(header::SET_COOKIE);
    apply_directives(headers, std::slice::from_ref(directive));
    for value in written {
        headers.append(header::SET_COOKIE, value);
    }
}

/// Middleware admitting only requests with a valid session.
///
/// Admitted requests get an [`AuthenticatedUser`] extension; a rotated
/// access cookie is written ahead of the handler's own cookies. Everything
/// else gets 401.
pub async fn require_session(State(gate): State<SessionGate>, mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
    let span = info_span!("session", request_id = %request_id, path = %request.uri().path());

    async move {
        let artifacts = SessionArtifacts::from_headers(request.headers());
        match gate.authenticate(&artifacts) {
            AuthOutcome::Admitted(admission) => {
                request.extensions_mut().insert(AuthenticatedUser(admission.user_id));
                let mut response = next.run(request).await;
                if let Some(directive) = &admission.renewed_access {
                    prepend_directive(response.headers_mut(), directive);
                }
                response
            }
            AuthOutcome::Rejected(rejection) => {
                info!(reason = rejection.reason(), "Request rejected");
                unauthorized()
            }
        }
    }
    .instrument(span)
    .await
}

/// 401 with the standard body.
#[must_use]
pub fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::unauthorized())).into_response()
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, ErrorResponse::error(&self.to_string())),
            Self::PasswordMismatch => (StatusCode::BAD_REQUEST, ErrorResponse::error(&self.to_string())),
            Self::Directory(DirectoryError::AccountExists) => {
                (StatusCode::CONFLICT, ErrorResponse::error(&self.to_string()))
            }
            Self::Directory(DirectoryError::Unavailable(_)) | Self::Password(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::internal())
            }
            Self::Internal(e) => (
                StatusCode::from_u16(e.code().http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                ErrorResponse::from(e),
            ),
        };
        if status.is_server_error() {
            error!(error = %self, "Credential request failed");
        }
        (status, Json(body)).into_response()
    }
}

fn bad_request(rejection: &JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::error(&rejection.body_text())),
    )
        .into_response()
}

/// Body of `POST /auth/login`.
#[derive(Deserialize)]
pub struct LoginRequest {
    /// Login email
    pub email: String,
    /// Plaintext password
    pub password: String,
    /// Select the long refresh lifetime
    #[serde(default)]
    pub remember_me: bool,
}

/// Body of `POST /auth/register`.
#[derive(Deserialize)]
pub struct RegisterRequest {
    /// Display name
    pub display_name: String,
    /// Login email
    pub email: String,
    /// Plaintext password
    pub password: String,
    /// Must equal `password`
    pub password_confirmation: String,
}

/// Body identifying the session's user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// Authenticated user
    pub id: UserId,
}

fn granted(status: StatusCode, grant: &LoginGrant) -> Response {
    let mut response = (status, Json(MeResponse { id: grant.user_id })).into_response();
    apply_directives(response.headers_mut(), &grant.directives);
    response
}

/// Authenticate credentials and set both session cookies.
pub async fn login<D, P>(
    State(service): State<Arc<LoginService<D, P>>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response
where
    D: UserDirectory + 'static,
    P: PasswordVerifier + 'static,
{
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(&rejection),
    };

    match service.login(&req.email, &req.password, req.remember_me).await {
        Ok(grant) => granted(StatusCode::OK, &grant),
        Err(e) => e.into_response(),
    }
}

/// Create an account and set both session cookies.
pub async fn register<D, P>(
    State(service): State<Arc<LoginService<D, P>>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response
where
    D: UserDirectory + 'static,
    P: PasswordVerifier + 'static,
{
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(&rejection),
    };

    match service
        .sign_up(&req.display_name, &req.email, &req.password, &req.password_confirmation)
        .await
    {
        Ok(grant) => granted(StatusCode::CREATED, &grant),
        Err(e) => e.into_response(),
    }
}

/// Clear both session cookies.
pub async fn logout(State(gate): State<SessionGate>) -> Response {
    let mut response = Json(ErrorResponse::success("Logged out successfully")).into_response();
    apply_directives(response.headers_mut(), &gate.issuer().build_logout_directives());
    info!("User logged out");
    response
}

/// Echo the authenticated user.
pub async fn me(Extension(AuthenticatedUser(id)): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse { id })
}

/// Auth routes: `login` and `register` are public, `me` and `logout`
/// require a session.
pub fn router<D, P>(gate: SessionGate, service: Arc<LoginService<D, P>>) -> Router
where
    D: UserDirectory + 'static,
    P: PasswordVerifier + 'static,
{
    let gated = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(gate.clone(), require_session))
        .with_state(gate);

    Router::new()
        .route("/auth/login", post(login::<D, P>))
        .route("/auth/register", post(register::<D, P>))
        .with_state(service)
        .merge(gated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IdentifierCodec;
    use crate::error::SessionError;
    use crate::jwt::{Lifetimes, TokenClass, TokenCodec};
    use crate::login::{Argon2Passwords, MemoryDirectory, Role};
    use crate::session::{CookieSettings, CredentialIssuer};
    use axum::body::{to_bytes, Body};
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    fn gate() -> SessionGate {
        SessionGate::new(Arc::new(CredentialIssuer::new(
            TokenCodec::new(b"access-secret", b"refresh-secret").unwrap(),
            IdentifierCodec::new(b"0123456789abcdef0123456789abcdef").unwrap(),
            Lifetimes::default(),
            CookieSettings::default(),
        )))
    }

    fn app(gate: SessionGate) -> Router {
        let directory = MemoryDirectory::new(Role {
            id: 3,
            name: "user".to_string(),
        });
        let service = LoginService::new(directory, Argon2Passwords, Arc::clone(gate.issuer()));
        router(gate, Arc::new(service))
    }

    fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_request(uri: &str, body: &serde_json::Value) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_from_headers_joins_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("access=a"));
        headers.append(header::COOKIE, HeaderValue::from_static("refresh=r"));

        let artifacts = SessionArtifacts::from_headers(&headers);
        assert_eq!(artifacts.get(TokenClass::Access), Some("a"));
        assert_eq!(artifacts.get(TokenClass::Refresh), Some("r"));
    }

    #[tokio::test]
    async fn test_missing_cookies_rejected() {
        let response = app(gate()).oneshot(request("GET", "/auth/me", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = body_json(response).await;
        assert_eq!(body["title"], "Unauthorized");
        assert_eq!(body["message"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_login_pair_admits() {
        let gate = gate();
        let pair = gate.issuer().issue_login_pair(UserId::new(31), false).unwrap();
        let cookie = format!("access={}", pair.access.token.as_str());

        let response = app(gate).oneshot(request("GET", "/auth/me", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_json(response).await["id"], 31);
    }

    #[tokio::test]
    async fn test_refresh_only_rotates_access_cookie() {
        let gate = gate();
        let pair = gate.issuer().issue_login_pair(UserId::new(8), false).unwrap();
        let cookie = format!("refresh={}", pair.refresh.token.as_str());

        let response = app(gate).oneshot(request("GET", "/auth/me", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("access="));
        assert!(cookies[0].contains("Max-Age=600"));
    }

    #[tokio::test]
    async fn test_logout_clears_both_cookies() {
        let gate = gate();
        let pair = gate.issuer().issue_login_pair(UserId::new(3), true).unwrap();
        let cookie = format!(
            "access={}; refresh={}",
            pair.access.token.as_str(),
            pair.refresh.token.as_str()
        );

        let response = app(gate)
            .oneshot(request("POST", "/auth/logout", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("access=;"));
        assert!(cookies[1].starts_with("refresh=;"));
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

        let body = body_json(response).await;
        assert_eq!(body["title"], "Success");
        assert_eq!(body["message"], "Logged out successfully");
    }

    #[tokio::test]
    async fn test_logout_with_rotation_still_clears_access() {
        let gate = gate();
        let uid = gate.issuer().identifiers().encode(UserId::new(12)).unwrap();
        let expired = gate
            .issuer()
            .tokens()
            .issue(TokenClass::Access, &uid, Utc::now() - Duration::seconds(30))
            .unwrap();
        let pair = gate.issuer().issue_login_pair(UserId::new(12), false).unwrap();
        let cookie = format!(
            "access={}; refresh={}",
            expired.as_str(),
            pair.refresh.token.as_str()
        );

        let response = app(gate)
            .oneshot(request("POST", "/auth/logout", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 3);
        let last_access = cookies.iter().rev().find(|c| c.starts_with("access=")).unwrap();
        assert!(last_access.starts_with("access=;"));
        assert!(last_access.contains("Max-Age=0"));
        let last_refresh = cookies.iter().rev().find(|c| c.starts_with("refresh=")).unwrap();
        assert!(last_refresh.starts_with("refresh=;"));
    }

    #[tokio::test]
    async fn test_logout_requires_session() {
        let response = app(gate())
            .oneshot(request("POST", "/auth/logout", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_then_login_sets_cookies() {
        let app = app(gate());
        let registered = app
            .clone()
            .oneshot(json_request(
                "/auth/register",
                &serde_json::json!({
                    "display_name": "Ada",
                    "email": "ada@example.com",
                    "password": "hunter22",
                    "password_confirmation": "hunter22",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(registered.status(), StatusCode::CREATED);
        let cookies = set_cookies(&registered);
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("access="));
        assert!(cookies[1].starts_with("refresh="));
        assert!(cookies[1].contains("Max-Age=86400"));
        assert_eq!(body_json(registered).await["id"], 1);

        let logged_in = app
            .clone()
            .oneshot(json_request(
                "/auth/login",
                &serde_json::json!({
                    "email": "ada@example.com",
                    "password": "hunter22",
                    "remember_me": true,
                }),
            ))
            .await
            .unwrap();

        assert_eq!(logged_in.status(), StatusCode::OK);
        let cookies = set_cookies(&logged_in);
        assert!(cookies[1].contains("Max-Age=604800"));

        let access = cookies[0].split(';').next().unwrap().to_string();
        let me = app.oneshot(request("GET", "/auth/me", Some(&access))).await.unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(body_json(me).await["id"], 1);
    }

    #[tokio::test]
    async fn test_login_wrong_password_unauthorized() {
        let app = app(gate());
        app.clone()
            .oneshot(json_request(
                "/auth/register",
                &serde_json::json!({
                    "display_name": "Ada",
                    "email": "ada@example.com",
                    "password": "hunter22",
                    "password_confirmation": "hunter22",
                }),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(json_request(
                "/auth/login",
                &serde_json::json!({"email": "ada@example.com", "password": "nope"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = body_json(response).await;
        assert_eq!(body["title"], "Error");
        assert_eq!(body["message"], "invalid email or password");
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let app = app(gate());
        let mismatch = app
            .clone()
            .oneshot(json_request(
                "/auth/register",
                &serde_json::json!({
                    "display_name": "Bob",
                    "email": "bob@example.com",
                    "password": "one",
                    "password_confirmation": "two",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(mismatch).await["message"], "passwords do not match");

        let malformed = app
            .oneshot(json_request("/auth/login", &serde_json::json!({"email": 5})))
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(malformed).await["title"], "Error");
    }

    #[tokio::test]
    async fn test_login_error_statuses() {
        let internal = LoginError::Internal(SessionError::config("JWT_ACCESS_SECRET empty")).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(internal).await;
        assert_eq!(body["message"], "Internal error");

        let down = LoginError::Directory(DirectoryError::Unavailable("db at 10.0.0.1".to_string())).into_response();
        assert_eq!(down.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(down).await["message"], "Internal error");

        let taken = LoginError::Directory(DirectoryError::AccountExists).into_response();
        assert_eq!(taken.status(), StatusCode::CONFLICT);
    }
}
