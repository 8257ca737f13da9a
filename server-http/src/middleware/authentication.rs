use crate::cookies::{SESSION_COOKIE, TOKEN_COOKIE, session_cookie};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::Cookie;
use quill::IdentityPayload;
use quill::auth::{CredentialSource, CredentialSources};
use std::time::Duration;
use tracing::{debug, warn};

/// Identity resolved for the current request, stored as a request extension.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: IdentityPayload,
    pub source: CredentialSource,
}

/// Token from `Authorization: Bearer <token>`, if the header has that shape.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty()).then_some(token)
}

/// Resolve the caller or answer 401.
///
/// Session first, then the signed `token` cookie, then the bearer header. A
/// token that resolves is remembered on the caller's session; a cookie client
/// without a session gets a new one.
pub async fn require_identity(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer_token = extract_bearer_token(request.headers()).map(str::to_string);
    let identified = identify(&state, &jar, bearer_token.as_deref())
        .await
        .inspect_err(|e| {
            debug!("Rejected {} {}: {:?}", request.method(), request.uri().path(), e);
        })?;

    Ok(run_identified(identified, jar, request, next).await)
}

/// Resolve the caller when it can be, without requiring it.
///
/// Handlers find an [`AuthContext`] only for callers that resolved; missing or
/// bad credentials pass through as anonymous.
pub async fn identify_if_present(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer_token = extract_bearer_token(request.headers()).map(str::to_string);

    match identify(&state, &jar, bearer_token.as_deref()).await {
        Ok(identified) => Ok(run_identified(identified, jar, request, next).await),
        Err(ApiError::Unauthorized) => Ok(next.run(request).await),
        Err(other) => Err(other),
    }
}

struct Identified {
    context: AuthContext,
    new_session_cookie: Option<Cookie<'static>>,
}

async fn identify(
    state: &AppState,
    jar: &SignedCookieJar,
    bearer_token: Option<&str>,
) -> Result<Identified, ApiError> {
    let session = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.session_store.load(&cookie.value().to_string()).await?,
        None => None,
    };

    let mut slot = session.as_ref().and_then(|s| s.identity.clone());
    let cookie_token = jar.get(TOKEN_COOKIE).map(|c| c.value().to_string());
    let sources = CredentialSources {
        cookie_token: cookie_token.as_deref(),
        bearer_token,
    };

    let resolved = state
        .resolver
        .resolve(&mut slot, sources)
        .inspect_err(|rejection| debug!("Credential rejected: {}", rejection))?;

    let mut new_session_cookie = None;
    if resolved.session_backfilled {
        match &session {
            Some(existing) => {
                state
                    .session_store
                    .attach_identity(&existing.id, resolved.identity.clone())
                    .await?;
            }
            None if resolved.source == CredentialSource::Cookie => {
                let created = state
                    .session_store
                    .create_session(Some(resolved.identity.clone()))
                    .await?;
                new_session_cookie = Some(session_cookie(
                    created.id,
                    Duration::from_millis(state.session_store.ttl_ms()),
                    state.config.secure_cookies,
                ));
            }
            // Bearer-only clients stay sessionless.
            None => {}
        }
    }

    Ok(Identified {
        context: AuthContext {
            identity: resolved.identity,
            source: resolved.source,
        },
        new_session_cookie,
    })
}

async fn run_identified(
    identified: Identified,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(identified.context);
    let response = next.run(request).await;

    match identified.new_session_cookie {
        Some(cookie) => (jar.add(cookie), response).into_response(),
        None => response,
    }
}

/// Identity already resolved by `require_identity`, or 401.
pub fn auth_context(request: &Request) -> Result<&AuthContext, ApiError> {
    request.extensions().get::<AuthContext>().ok_or_else(|| {
        warn!("Route expects an identity but none was resolved");
        ApiError::Unauthorized
    })
}
