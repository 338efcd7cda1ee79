use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    AppState,
    auth::issue_access_token,
    confirmation::ConfirmationCodes,
    error::{AppError, AppResult},
    extract::Payload,
    mailer,
    models::{NewUser, Role, SignupRequest, SignupResponse, TokenRequest, TokenResponse, User},
    validation::{self, ValidationErrors},
};

/// Mails a fresh confirmation code for the user's current state.
async fn send_confirmation_code(state: &AppState, user: &User) -> AppResult<()> {
    let code = ConfirmationCodes::from_config(&state.config).make_code(user);
    state
        .mailer
        .send(mailer::confirmation_mail(&user.email, &code))
        .await?;
    tracing::debug!(user_id = user.id, "Confirmation code sent");
    Ok(())
}

/// signup
///
/// [Public Route] Registers an account and mails it a confirmation code.
///
/// Repeating the call with the exact (username, email) pair of an existing
/// account is accepted and re-sends a code. A pair where only one half is
/// taken is rejected on the conflicting field.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup/",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Code sent", body = SignupResponse),
        (status = 400, description = "Invalid or conflicting identity")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Payload(payload): Payload<SignupRequest>,
) -> AppResult<Json<SignupResponse>> {
    if let (Some(username), Some(email)) = (&payload.username, &payload.email) {
        let by_username = state.repo.get_user_by_username(username).await?;
        let by_email = state.repo.get_user_by_email(email).await?;

        let mut conflicts = ValidationErrors::new();
        match (by_username, by_email) {
            (Some(existing), Some(same)) if existing.id == same.id => {
                send_confirmation_code(&state, &existing).await?;
                return Ok(Json(SignupResponse {
                    email: existing.email,
                    username: existing.username,
                }));
            }
            (by_username, by_email) => {
                if by_username.is_some() {
                    conflicts.add("username", "A user with that username already exists.");
                }
                if by_email.is_some() {
                    conflicts.add("email", "A user with that email already exists.");
                }
            }
        }
        if !conflicts.is_empty() {
            return Err(conflicts.into());
        }
    }

    let (username, email) = validation::validate_signup(&payload.username, &payload.email)?;
    let user = state
        .repo
        .create_user(NewUser {
            username,
            email,
            role: Role::User,
            ..NewUser::default()
        })
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "User signed up");

    send_confirmation_code(&state, &user).await?;
    Ok(Json(SignupResponse {
        email: user.email,
        username: user.username,
    }))
}

/// obtain_token
///
/// [Public Route] Exchanges a confirmation code for an access token.
///
/// A wrong, stale or expired code yields 400 with an empty body. Issuing a
/// token stamps `last_login`, which invalidates the code just used.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token/",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Missing fields or invalid code"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    Payload(payload): Payload<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let (username, code) =
        validation::validate_token_request(&payload.username, &payload.confirmation_code)?;

    let user = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    if !ConfirmationCodes::from_config(&state.config).check_code(&user, &code) {
        tracing::debug!(user_id = user.id, "Confirmation code rejected");
        return Err(AppError::InvalidConfirmationCode);
    }

    state.repo.record_login(user.id, Utc::now()).await?;
    let token = issue_access_token(&user, &state.config)?;
    tracing::info!(user_id = user.id, "Access token issued");

    Ok(Json(TokenResponse { token }))
}
