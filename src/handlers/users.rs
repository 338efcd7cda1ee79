use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{Filters, Payload},
    models::{SearchParams, User, UserPayload, UserProfile},
    permissions,
    repository::RepositoryState,
    validation::{self, ValidationErrors},
};

// Every route in this module sits behind `auth_middleware`, so handlers take
// `AuthUser` directly and anonymous callers never get here.

/// Rejects a username or email already held by an account other than `exclude`.
async fn check_unique(
    repo: &RepositoryState,
    username: Option<&str>,
    email: Option<&str>,
    exclude: Option<i64>,
) -> AppResult<()> {
    let mut errors = ValidationErrors::new();
    if let Some(username) = username {
        if let Some(other) = repo.get_user_by_username(username).await? {
            if Some(other.id) != exclude {
                errors.add("username", "A user with that username already exists.");
            }
        }
    }
    if let Some(email) = email {
        if let Some(other) = repo.get_user_by_email(email).await? {
            if Some(other.id) != exclude {
                errors.add("email", "A user with that email already exists.");
            }
        }
    }
    Ok(errors.finish(())?)
}

async fn find_by_username(repo: &RepositoryState, username: &str) -> AppResult<User> {
    repo.get_user_by_username(username)
        .await?
        .ok_or(AppError::NotFound)
}

/// list_users
///
/// [Admin] Lists accounts; `?search=` matches a substring of the username.
#[utoipa::path(
    get,
    path = "/api/v1/users/",
    params(SearchParams),
    responses(
        (status = 200, description = "Users", body = [UserProfile]),
        (status = 401, description = "Anonymous"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    Filters(params): Filters<SearchParams>,
) -> AppResult<Json<Vec<UserProfile>>> {
    permissions::admin_only(Some(&user))?;
    let users = state.repo.list_users(params.search).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// create_user
///
/// [Admin] Creates an account directly, with any role. The new user still
/// obtains a token through the signup/confirmation-code flow.
#[utoipa::path(
    post,
    path = "/api/v1/users/",
    request_body = UserPayload,
    responses(
        (status = 201, description = "Created", body = UserProfile),
        (status = 400, description = "Invalid or taken username/email")
    )
)]
pub async fn create_user(
    user: AuthUser,
    State(state): State<AppState>,
    Payload(payload): Payload<UserPayload>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    permissions::admin_only(Some(&user))?;

    let new_user = validation::validate_new_user(&payload)?;
    check_unique(
        &state.repo,
        Some(&new_user.username),
        Some(&new_user.email),
        None,
    )
    .await?;

    let created = state.repo.create_user(new_user).await?;
    tracing::info!(
        user_id = created.id,
        role = created.role.as_str(),
        created_by = user.id,
        "User created by admin"
    );
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{username}/",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UserProfile>> {
    permissions::admin_only(Some(&user))?;
    let found = find_by_username(&state.repo, &username).await?;
    Ok(Json(found.into()))
}

/// update_user
///
/// [Admin] Partially updates any account, role included.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{username}/",
    params(("username" = String, Path, description = "Username")),
    request_body = UserPayload,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Invalid or taken username/email"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Payload(payload): Payload<UserPayload>,
) -> AppResult<Json<UserProfile>> {
    permissions::admin_only(Some(&user))?;
    let target = find_by_username(&state.repo, &username).await?;

    let changes = validation::validate_user_changes(&payload)?;
    check_unique(
        &state.repo,
        changes.username.as_deref(),
        changes.email.as_deref(),
        Some(target.id),
    )
    .await?;

    let updated = state
        .repo
        .update_user(target.id, changes)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{username}/",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<StatusCode> {
    permissions::admin_only(Some(&user))?;
    let target = find_by_username(&state.repo, &username).await?;

    state.repo.delete_user(target.id).await?;
    tracing::info!(user_id = target.id, deleted_by = user.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// get_me
///
/// [Authenticated] Returns the caller's own profile.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Anonymous")
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserProfile>> {
    let me = state.repo.get_user(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(me.into()))
}

/// update_me
///
/// [Authenticated] Partially updates the caller's own profile. A `role` in
/// the payload is validated but otherwise ignored: the caller keeps the role
/// they have.
#[utoipa::path(
    patch,
    path = "/api/v1/users/me/",
    request_body = UserPayload,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Invalid or taken username/email")
    )
)]
pub async fn update_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Payload(payload): Payload<UserPayload>,
) -> AppResult<Json<UserProfile>> {
    let mut changes = validation::validate_user_changes(&payload)?;
    changes.role = None;

    check_unique(
        &state.repo,
        changes.username.as_deref(),
        changes.email.as_deref(),
        Some(id),
    )
    .await?;

    let updated = state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated.into()))
}
