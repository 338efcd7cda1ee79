use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::Payload,
    models::{NewReview, Review, ReviewPayload, Title},
    permissions,
    repository::RepositoryState,
    validation::{self, NON_FIELD_ERRORS, ValidationErrors},
};

pub(crate) async fn find_title(repo: &RepositoryState, title_id: i64) -> AppResult<Title> {
    repo.get_title(title_id).await?.ok_or(AppError::NotFound)
}

/// Loads a review, requiring it to belong to the title in the path.
pub(crate) async fn find_review(
    repo: &RepositoryState,
    title_id: i64,
    review_id: i64,
) -> AppResult<Review> {
    repo.get_review(title_id, review_id)
        .await?
        .ok_or(AppError::NotFound)
}

/// list_reviews
///
/// [Public Route] Lists the reviews of a title, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/",
    params(("title_id" = i64, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Reviews", body = [Review]),
        (status = 404, description = "Unknown title")
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> AppResult<Json<Vec<Review>>> {
    let title = find_title(&state.repo, title_id).await?;
    Ok(Json(state.repo.list_reviews(title.id).await?))
}

/// create_review
///
/// [Authenticated] Reviews a title as the calling user.
///
/// Each user may review a title once; a second attempt is rejected with 400.
/// The database constraint on `(title_id, author_id)` covers concurrent
/// submissions that both pass the check below.
#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews/",
    params(("title_id" = i64, Path, description = "Title ID")),
    request_body = ReviewPayload,
    responses(
        (status = 201, description = "Created", body = Review),
        (status = 400, description = "Invalid score or duplicate review"),
        (status = 401, description = "Anonymous"),
        (status = 404, description = "Unknown title")
    )
)]
pub async fn create_review(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    Payload(payload): Payload<ReviewPayload>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let author = permissions::authenticated(user.as_ref())?;
    let title = find_title(&state.repo, title_id).await?;

    let fields = validation::validate_review(&payload, false)?;
    if state.repo.has_review(title.id, author.id).await? {
        return Err(ValidationErrors::single(
            NON_FIELD_ERRORS,
            "You have already reviewed this title.",
        )
        .into());
    }

    let review = state
        .repo
        .create_review(NewReview {
            title_id: title.id,
            author_id: author.id,
            text: fields.text.unwrap_or_default(),
            score: fields.score.unwrap_or_default(),
        })
        .await?;
    tracing::info!(review_id = review.id, title_id, author_id = author.id, "Review created");

    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    responses(
        (status = 200, description = "Found", body = Review),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> AppResult<Json<Review>> {
    Ok(Json(find_review(&state.repo, title_id, review_id).await?))
}

/// update_review
///
/// [Author, Moderator, Admin] Partially updates text and/or score.
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    request_body = ReviewPayload,
    responses(
        (status = 200, description = "Updated", body = Review),
        (status = 403, description = "Not the author, a moderator or an admin")
    )
)]
pub async fn update_review(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Payload(payload): Payload<ReviewPayload>,
) -> AppResult<Json<Review>> {
    let caller = permissions::authenticated(user.as_ref())?;
    let review = find_review(&state.repo, title_id, review_id).await?;
    permissions::author_moderator_or_admin(Some(caller), &method, review.author_id)?;

    let changes = validation::validate_review(&payload, true)?;
    let updated = state
        .repo
        .update_review(review.id, changes)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author, a moderator or an admin")
    )
)]
pub async fn delete_review(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    let caller = permissions::authenticated(user.as_ref())?;
    let review = find_review(&state.repo, title_id, review_id).await?;
    permissions::author_moderator_or_admin(Some(caller), &method, review.author_id)?;

    state.repo.delete_review(review.id).await?;
    tracing::info!(review_id, deleted_by = caller.id, "Review deleted");
    Ok(StatusCode::NO_CONTENT)
}
