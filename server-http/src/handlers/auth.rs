use crate::api::{LoginRequest, LoginResponse, LogoutResponse, MeResponse};
use crate::cookies::{SESSION_COOKIE, TOKEN_COOKIE, removal, session_cookie, token_cookie};
use crate::error::ApiError;
use crate::middleware::{AuthContext, extract_bearer_token};
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, header},
};
use axum_extra::extract::SignedCookieJar;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::time::Duration;
use tracing::{debug, info};

/// POST /auth/login
///
/// Credentials come from a JSON body `{"username", "password"}` or, failing
/// that, a Basic `Authorization` header. On success the token is returned in
/// the body and set as the signed `token` cookie, and a fresh session is
/// started for the caller.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(SignedCookieJar, Json<LoginResponse>), ApiError> {
    let (username, password) = match body {
        Ok(Json(request)) => (request.username, request.password),
        Err(_) => headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(extract_basic_auth)
            .ok_or_else(|| {
                ApiError::Validation(
                    "Provide credentials as a JSON body or a Basic Authorization header"
                        .to_string(),
                )
            })?,
    };

    let user = state.auth_service.authenticate(&username, &password).await?;
    let identity = user.identity();
    let token_ttl = state.config.token_ttl;
    let token = state.codec.issue(&identity, token_ttl)?;

    // Never carry a pre-login session id across the login.
    if let Some(old) = jar.get(SESSION_COOKIE) {
        state.session_store.destroy(&old.value().to_string()).await?;
    }
    let session = state
        .session_store
        .create_session(Some(identity.clone()))
        .await?;

    let secure = state.config.secure_cookies;
    let jar = jar
        .add(token_cookie(token.clone(), token_ttl, secure))
        .add(session_cookie(
            session.id,
            Duration::from_millis(state.session_store.ttl_ms()),
            secure,
        ));

    info!("User {} logged in", identity.username);

    Ok((
        jar,
        Json(LoginResponse {
            token,
            token_type: "Bearer",
            expires_in: token_ttl.as_secs(),
            user: identity,
        }),
    ))
}

/// POST /auth/logout
///
/// Destroys the caller's session and clears both cookies. A bearer token the
/// client kept stays valid until it expires unless revocation on logout is
/// enabled, in which case every token presented here is refused from now on.
pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
) -> Result<(SignedCookieJar, Json<LogoutResponse>), ApiError> {
    if let Some(sid) = jar.get(SESSION_COOKIE) {
        let destroyed = state.session_store.destroy(&sid.value().to_string()).await?;
        debug!("Session destroyed on logout: {}", destroyed);
    }

    if state.config.revoke_on_logout {
        let cookie_token = jar.get(TOKEN_COOKIE).map(|c| c.value().to_string());
        let presented = cookie_token
            .as_deref()
            .into_iter()
            .chain(extract_bearer_token(&headers));

        for token in presented {
            // Tokens that no longer verify need no entry.
            if let Ok(verified) = state.codec.verify(token) {
                state.resolver.revoke(token, verified.remaining);
                info!("Revoked token of {}", verified.identity.username);
            }
        }
    }

    let jar = jar.remove(removal(TOKEN_COOKIE)).remove(removal(SESSION_COOKIE));

    Ok((
        jar,
        Json(LogoutResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

/// GET /auth/me
pub async fn me(Extension(context): Extension<AuthContext>) -> Json<MeResponse> {
    Json(MeResponse::new(context.identity, context.source))
}

/// Credentials from `Authorization: Basic base64(username:password)`.
fn extract_basic_auth(auth_header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = auth_header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    // Passwords may contain ':'; usernames may not.
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
