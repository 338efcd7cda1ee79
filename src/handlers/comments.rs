use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};

use super::reviews::find_review;
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::Payload,
    models::{Comment, CommentPayload, NewComment},
    permissions,
    validation,
};

async fn find_comment(
    state: &AppState,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> AppResult<Comment> {
    let review = find_review(&state.repo, title_id, review_id).await?;
    state
        .repo
        .get_comment(review.id, comment_id)
        .await?
        .ok_or(AppError::NotFound)
}

/// list_comments
///
/// [Public Route] Lists the comments of a review. The review must belong to
/// the title in the path.
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "Unknown title or review")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> AppResult<Json<Vec<Comment>>> {
    let review = find_review(&state.repo, title_id, review_id).await?;
    Ok(Json(state.repo.list_comments(review.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    request_body = CommentPayload,
    responses(
        (status = 201, description = "Created", body = Comment),
        (status = 401, description = "Anonymous")
    )
)]
pub async fn create_comment(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Payload(payload): Payload<CommentPayload>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let author = permissions::authenticated(user.as_ref())?;
    let review = find_review(&state.repo, title_id, review_id).await?;
    let text = validation::validate_comment_text(&payload.text)?;

    let comment = state
        .repo
        .create_comment(NewComment {
            review_id: review.id,
            author_id: author.id,
            text,
        })
        .await?;
    tracing::info!(comment_id = comment.id, review_id, "Comment created");

    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses((status = 200, description = "Found", body = Comment))
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> AppResult<Json<Comment>> {
    Ok(Json(
        find_comment(&state, title_id, review_id, comment_id).await?,
    ))
}

/// update_comment
///
/// [Author, Moderator, Admin] Replaces the comment text.
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentPayload,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 403, description = "Not the author, a moderator or an admin")
    )
)]
pub async fn update_comment(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    Payload(payload): Payload<CommentPayload>,
) -> AppResult<Json<Comment>> {
    let caller = permissions::authenticated(user.as_ref())?;
    let comment = find_comment(&state, title_id, review_id, comment_id).await?;
    permissions::author_moderator_or_admin(Some(caller), &method, comment.author_id)?;

    // An omitted text leaves the comment as it is.
    if payload.text.is_none() {
        return Ok(Json(comment));
    }
    let text = validation::validate_comment_text(&payload.text)?;

    state
        .repo
        .update_comment(comment.id, text)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_comment(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> AppResult<StatusCode> {
    let caller = permissions::authenticated(user.as_ref())?;
    let comment = find_comment(&state, title_id, review_id, comment_id).await?;
    permissions::author_moderator_or_admin(Some(caller), &method, comment.author_id)?;

    state.repo.delete_comment(comment.id).await?;
    tracing::info!(comment_id, deleted_by = caller.id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
