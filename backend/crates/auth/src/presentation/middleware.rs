//! Auth Middleware
//!
//! Bearer authentication for protected routes, and the request metadata
//! extractor used for sessions and audit records.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::{Request, request::Parts};
use axum::middleware::Next;
use axum::response::Response;
use platform::client::{ClientInfo, extract_bearer_token, extract_client_info};

use crate::application::AuthenticateUseCase;
use crate::domain::entity::access_audit::RequestMeta;
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};
use crate::presentation::handlers::AuthAppState;

/// Middleware that requires a valid bearer access token.
/// On success the request carries an `AuthContext` extension.
pub async fn require_bearer<R>(
    State(state): State<AuthAppState<R>>,
    mut req: Request<Body>,
    next: Next,
) -> AuthResult<Response>
where
    R: AuthStore,
{
    let token = extract_bearer_token(req.headers())
        .ok_or(AuthError::InvalidCredential)?
        .to_string();

    let use_case = AuthenticateUseCase::new(state.repo.clone(), state.tokens.clone());
    let ctx = use_case.execute(&token).await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Middleware that authenticates when a bearer token is present but lets
/// the request through either way. Downstream decides what anonymous
/// callers get.
pub async fn optional_bearer<R>(
    State(state): State<AuthAppState<R>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    R: AuthStore,
{
    if let Some(token) = extract_bearer_token(req.headers()).map(str::to_string) {
        let use_case = AuthenticateUseCase::new(state.repo.clone(), state.tokens.clone());
        match use_case.execute(&token).await {
            Ok(ctx) => {
                req.extensions_mut().insert(ctx);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid bearer token");
            }
        }
    }

    next.run(req).await
}

/// Caller facts taken from headers and the socket address
#[derive(Debug, Clone)]
pub struct ClientMeta {
    pub client: ClientInfo,
    pub request: RequestMeta,
}

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // ConnectInfo is absent when the router is driven without a socket
        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        let client = extract_client_info(&parts.headers, direct_ip);
        let request = RequestMeta {
            http_method: Some(parts.method.to_string()),
            path: Some(parts.uri.path().to_string()),
            client_ip: client.ip_string(),
            user_agent: client.user_agent.clone(),
        };

        Ok(Self { client, request })
    }
}
