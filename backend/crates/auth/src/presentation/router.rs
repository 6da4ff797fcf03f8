//! Auth Router

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::token::TokenService;
use crate::domain::repository::AuthStore;
use crate::error::AuthResult;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{optional_bearer, require_bearer};

/// Create the Auth router for any store implementation.
/// Fails if the signing secret is unusable.
pub fn auth_router<R>(repo: R, config: AuthConfig) -> AuthResult<Router>
where
    R: AuthStore,
{
    let tokens = TokenService::new(&config)?;
    let state = AuthAppState {
        repo: Arc::new(repo),
        config: Arc::new(config),
        tokens: Arc::new(tokens),
    };

    let public = Router::new()
        .route("/auth/register", post(handlers::register::<R>))
        .route("/auth/login", post(handlers::login::<R>))
        .route("/auth/login/totp", post(handlers::login_totp::<R>))
        .route("/auth/refresh", post(handlers::refresh::<R>))
        .route("/auth/logout", post(handlers::logout::<R>));

    let protected = Router::new()
        .route("/auth/logout-all", post(handlers::logout_all::<R>))
        .route("/mfa/totp/enroll", post(handlers::totp_enroll::<R>))
        .route("/mfa/totp/confirm", post(handlers::totp_confirm::<R>))
        .route("/mfa/totp/disable", post(handlers::totp_disable::<R>))
        .route("/me/scope", get(handlers::my_scope))
        .route(
            "/me/profile",
            get(handlers::my_profile::<R>).put(handlers::update_my_profile::<R>),
        )
        .route("/me/sessions", get(handlers::my_sessions::<R>))
        .route(
            "/me/sessions/{session_id}/revoke",
            post(handlers::revoke_my_session::<R>),
        )
        .route("/me/password", post(handlers::change_password::<R>))
        .route("/admin/{user_id}/logout-all", post(handlers::admin_logout_all::<R>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer::<R>,
        ));

    let audited = Router::new()
        .route(
            "/merchants/{merchant_id}/scope-check",
            get(handlers::merchant_scope_check::<R>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_bearer::<R>,
        ));

    Ok(public.merge(protected).merge(audited).with_state(state))
}
