//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use crate::application::config::AuthConfig;
use crate::application::{
    AccessGuard, AuthContext, ChangePasswordInput, ChangePasswordUseCase, LoginOutcome,
    ManageSessionsUseCase, ProfileUseCase, RefreshUseCase, SessionAdminUseCase, SignInInput,
    SignInUseCase, SignOutUseCase, SignUpInput, SignUpUseCase, TokenService, TotpSignInInput,
    TotpUseCase,
};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::{MerchantId, SessionId, UserId};
use crate::error::AuthResult;
use crate::presentation::dto::{
    AdminLogoutAllResponse, ChangePasswordRequest, LoginRequest, LoginResponse, LoginStatus,
    OkResponse, ProfileResponse, ProfileUpdateRequest, RefreshRequest, RegisterRequest,
    RegisterResponse, ScopeCheckQuery, ScopeCheckResponse, ScopeResponse, SessionResponse,
    SessionsRevokedResponse, TokenResponse, TotpConfirmRequest, TotpDisableRequest,
    TotpEnrollResponse, TotpLoginRequest,
};
use crate::presentation::middleware::ClientMeta;

/// Shared state for auth handlers
#[derive(Clone)]
pub struct AuthAppState<R>
where
    R: AuthStore,
{
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub tokens: Arc<TokenService>,
}

// ============================================================================
// Credential lifecycle
// ============================================================================

/// POST /auth/register
pub async fn register<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<(StatusCode, Json<RegisterResponse>)>
where
    R: AuthStore,
{
    let use_case = SignUpUseCase::new(state.repo.clone(), state.config.clone());

    let input = SignUpInput {
        email: req.email,
        password: req.password,
        full_name: req.full_name,
    };

    let output = use_case.execute(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { id: output.user_id }),
    ))
}

/// POST /auth/login
pub async fn login<R>(
    State(state): State<AuthAppState<R>>,
    meta: ClientMeta,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    R: AuthStore,
{
    let use_case = SignInUseCase::new(
        state.repo.clone(),
        state.tokens.clone(),
        state.config.clone(),
    );

    let input = SignInInput {
        email: req.email,
        password: req.password,
        app_code: req.app_code,
    };

    let response = match use_case.login(input, &meta.client).await? {
        LoginOutcome::Authenticated(pair) => LoginResponse {
            login_status: LoginStatus::Ok,
            access_token: Some(pair.access_token),
            refresh_token: Some(pair.refresh_token),
            expires_in: Some(pair.expires_in),
            login_token: None,
        },
        LoginOutcome::MfaRequired { login_token } => LoginResponse {
            login_status: LoginStatus::NeedMfaTotp,
            access_token: None,
            refresh_token: None,
            expires_in: None,
            login_token: Some(login_token),
        },
    };

    Ok(Json(response))
}

/// POST /auth/login/totp
pub async fn login_totp<R>(
    State(state): State<AuthAppState<R>>,
    meta: ClientMeta,
    Json(req): Json<TotpLoginRequest>,
) -> AuthResult<Json<TokenResponse>>
where
    R: AuthStore,
{
    let use_case = SignInUseCase::new(
        state.repo.clone(),
        state.tokens.clone(),
        state.config.clone(),
    );

    let input = TotpSignInInput {
        login_token: req.login_token,
        code: req.code,
        app_code: req.app_code,
    };

    let pair = use_case.login_with_totp(input, &meta.client).await?;
    Ok(Json(pair.into()))
}

/// POST /auth/refresh
pub async fn refresh<R>(
    State(state): State<AuthAppState<R>>,
    meta: ClientMeta,
    Json(req): Json<RefreshRequest>,
) -> AuthResult<Json<TokenResponse>>
where
    R: AuthStore,
{
    let use_case = RefreshUseCase::new(
        state.repo.clone(),
        state.tokens.clone(),
        state.config.clone(),
    );

    let pair = use_case.execute(&req.refresh_token, &meta.client).await?;
    Ok(Json(pair.into()))
}

/// POST /auth/logout
pub async fn logout<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<RefreshRequest>,
) -> AuthResult<Json<OkResponse>>
where
    R: AuthStore,
{
    let use_case = SignOutUseCase::new(state.repo.clone());
    use_case.logout(&req.refresh_token).await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /auth/logout-all
pub async fn logout_all<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
) -> AuthResult<Json<SessionsRevokedResponse>>
where
    R: AuthStore,
{
    let use_case = SignOutUseCase::new(state.repo.clone());
    let revoked = use_case.logout_all(&ctx.user_id).await?;

    Ok(Json(SessionsRevokedResponse {
        ok: true,
        sessions_revoked: revoked,
    }))
}

// ============================================================================
// TOTP (requires authentication)
// ============================================================================

/// POST /mfa/totp/enroll
pub async fn totp_enroll<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
) -> AuthResult<Json<TotpEnrollResponse>>
where
    R: AuthStore,
{
    let use_case = TotpUseCase::new(state.repo.clone(), state.config.clone());
    let enrollment = use_case.enroll(&ctx.user_id).await?;

    Ok(Json(TotpEnrollResponse {
        credential_id: enrollment.credential_id,
        secret: enrollment.secret,
        otpauth_uri: enrollment.otpauth_uri,
    }))
}

/// POST /mfa/totp/confirm
pub async fn totp_confirm<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<TotpConfirmRequest>,
) -> AuthResult<Json<OkResponse>>
where
    R: AuthStore,
{
    let use_case = TotpUseCase::new(state.repo.clone(), state.config.clone());
    use_case
        .confirm(&ctx.user_id, &req.credential_id, &req.code)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /mfa/totp/disable
pub async fn totp_disable<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    req: Option<Json<TotpDisableRequest>>,
) -> AuthResult<Json<OkResponse>>
where
    R: AuthStore,
{
    let reason = req.and_then(|Json(req)| req.reason);

    let use_case = TotpUseCase::new(state.repo.clone(), state.config.clone());
    use_case.disable(&ctx.user_id, reason.as_deref()).await?;
    Ok(Json(OkResponse::ok()))
}

// ============================================================================
// Self-service (requires authentication)
// ============================================================================

/// GET /me/scope
pub async fn my_scope(Extension(ctx): Extension<AuthContext>) -> Json<ScopeResponse> {
    Json(ScopeResponse {
        user_id: ctx.user_id,
        email: ctx.email,
        permissions: ctx.permissions,
        merchant_ids: ctx.merchant_ids,
        app: ctx.app_code,
    })
}

/// GET /me/profile
pub async fn my_profile<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
) -> AuthResult<Json<ProfileResponse>>
where
    R: AuthStore,
{
    let use_case = ProfileUseCase::new(state.repo.clone());
    let user = use_case.get(&ctx.user_id).await?;
    Ok(Json(user.into()))
}

/// PUT /me/profile
pub async fn update_my_profile<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ProfileUpdateRequest>,
) -> AuthResult<Json<ProfileResponse>>
where
    R: AuthStore,
{
    let use_case = ProfileUseCase::new(state.repo.clone());
    let user = use_case.update(&ctx.user_id, req.full_name).await?;
    Ok(Json(user.into()))
}

/// GET /me/sessions
pub async fn my_sessions<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
) -> AuthResult<Json<Vec<SessionResponse>>>
where
    R: AuthStore,
{
    let use_case = ManageSessionsUseCase::new(state.repo.clone());
    let sessions = use_case.list(&ctx.user_id).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|session| SessionResponse::new(session, &ctx.session_id))
            .collect(),
    ))
}

/// POST /me/sessions/{session_id}/revoke
pub async fn revoke_my_session<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    Path(session_id): Path<SessionId>,
) -> AuthResult<Json<OkResponse>>
where
    R: AuthStore,
{
    let use_case = ManageSessionsUseCase::new(state.repo.clone());
    use_case.revoke(&ctx.user_id, &session_id).await?;
    Ok(Json(OkResponse::ok()))
}

/// POST /me/password
pub async fn change_password<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<Json<SessionsRevokedResponse>>
where
    R: AuthStore,
{
    let use_case = ChangePasswordUseCase::new(state.repo.clone(), state.config.clone());
    let revoked = use_case
        .execute(
            &ctx.user_id,
            ChangePasswordInput {
                current_password: req.current_password,
                new_password: req.new_password,
            },
        )
        .await?;

    Ok(Json(SessionsRevokedResponse {
        ok: true,
        sessions_revoked: revoked,
    }))
}

// ============================================================================
// Administration (requires authentication and `role.manage`)
// ============================================================================

/// POST /admin/{user_id}/logout-all
pub async fn admin_logout_all<R>(
    State(state): State<AuthAppState<R>>,
    Extension(ctx): Extension<AuthContext>,
    meta: ClientMeta,
    Path(user_id): Path<UserId>,
) -> AuthResult<Json<AdminLogoutAllResponse>>
where
    R: AuthStore,
{
    let use_case = SessionAdminUseCase::new(state.repo.clone());
    let revoked = use_case.logout_all(&ctx, &user_id, &meta.request).await?;

    Ok(Json(AdminLogoutAllResponse {
        user_id,
        status: "revoked_all",
        sessions_revoked: revoked,
    }))
}

// ============================================================================
// Merchant scope (authentication optional, always audited)
// ============================================================================

/// GET /merchants/{merchant_id}/scope-check?perm=
pub async fn merchant_scope_check<R>(
    State(state): State<AuthAppState<R>>,
    ctx: Option<Extension<AuthContext>>,
    meta: ClientMeta,
    Path(merchant_id): Path<MerchantId>,
    Query(query): Query<ScopeCheckQuery>,
) -> Json<ScopeCheckResponse>
where
    R: AuthStore,
{
    let guard = AccessGuard::new(state.repo.clone());
    let ctx = ctx.as_ref().map(|Extension(ctx)| ctx);

    let allowed = match query.perm.as_deref() {
        Some(permission) => {
            guard
                .check(ctx, permission, Some(merchant_id), &meta.request)
                .await
        }
        None => guard.has_merchant(ctx, merchant_id, &meta.request).await,
    };

    Json(ScopeCheckResponse { allowed })
}
