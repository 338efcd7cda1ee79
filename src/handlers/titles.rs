use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{Filters, Payload},
    models::{NewTitle, Taxonomy, Title, TitleChanges, TitleFilter, TitlePayload, TitleWritten},
    permissions,
    repository::RepositoryState,
    validation::{self, ValidationErrors},
};

fn unknown_slug(slug: &str) -> String {
    format!("Object with slug={slug} does not exist.")
}

/// Validates a title payload and resolves its genre and category slugs to ids.
/// Every problem, including unknown slugs, lands in one error map.
async fn resolve_payload(
    repo: &RepositoryState,
    payload: TitlePayload,
    partial: bool,
) -> AppResult<TitleChanges> {
    let mut errors = ValidationErrors::new();
    validation::check_title(&mut errors, &payload, partial);

    let genre_ids = match &payload.genre {
        Some(slugs) => {
            let mut ids = Vec::with_capacity(slugs.len());
            for slug in slugs {
                match repo.get_taxonomy_entry(Taxonomy::Genre, slug).await? {
                    Some(genre) => ids.push(genre.id),
                    None => errors.add("genre", unknown_slug(slug)),
                }
            }
            Some(ids)
        }
        None => None,
    };

    let category_id = match &payload.category {
        Some(slug) => match repo.get_taxonomy_entry(Taxonomy::Category, slug).await? {
            Some(category) => Some(category.id),
            None => {
                errors.add("category", unknown_slug(slug));
                None
            }
        },
        None => None,
    };

    Ok(errors.finish(TitleChanges {
        name: payload.name,
        year: payload.year,
        description: payload.description,
        category_id,
        genre_ids,
    })?)
}

/// list_titles
///
/// [Public Route] Lists titles with nested genres, category and rating.
/// Filters: `genre` and `category` (slugs), `year`, `name` (substring).
#[utoipa::path(
    get,
    path = "/api/v1/titles/",
    params(TitleFilter),
    responses((status = 200, description = "Titles", body = [Title]))
)]
pub async fn list_titles(
    State(state): State<AppState>,
    Filters(filter): Filters<TitleFilter>,
) -> AppResult<Json<Vec<Title>>> {
    Ok(Json(state.repo.list_titles(filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/",
    params(("title_id" = i64, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Found", body = Title),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> AppResult<Json<Title>> {
    state
        .repo
        .get_title(title_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// create_title
///
/// [Admin] Creates a title. Genres and category are given as slugs and are
/// echoed back the same way.
#[utoipa::path(
    post,
    path = "/api/v1/titles/",
    request_body = TitlePayload,
    responses(
        (status = 201, description = "Created", body = TitleWritten),
        (status = 400, description = "Invalid payload or unknown slug"),
        (status = 401, description = "Anonymous"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_title(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Payload(payload): Payload<TitlePayload>,
) -> AppResult<(StatusCode, Json<TitleWritten>)> {
    permissions::admin_or_read_only(user.as_ref(), &method)?;

    let changes = resolve_payload(&state.repo, payload, false).await?;
    // Presence of name, year and genre was checked by `resolve_payload`.
    let title = state
        .repo
        .create_title(NewTitle {
            name: changes.name.unwrap_or_default(),
            year: changes.year.unwrap_or_default(),
            description: changes.description.flatten(),
            category_id: changes.category_id,
            genre_ids: changes.genre_ids.unwrap_or_default(),
        })
        .await?;
    tracing::info!(title_id = title.id, "Title created");

    Ok((StatusCode::CREATED, Json(title.into())))
}

/// update_title
///
/// [Admin] Partially updates a title. A supplied genre list replaces the
/// current one.
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/",
    params(("title_id" = i64, Path, description = "Title ID")),
    request_body = TitlePayload,
    responses(
        (status = 200, description = "Updated", body = TitleWritten),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_title(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    Payload(payload): Payload<TitlePayload>,
) -> AppResult<Json<TitleWritten>> {
    permissions::admin_or_read_only(user.as_ref(), &method)?;

    if state.repo.get_title(title_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let changes = resolve_payload(&state.repo, payload, true).await?;
    let title = state
        .repo
        .update_title(title_id, changes)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(title.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/",
    params(("title_id" = i64, Path, description = "Title ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_title(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> AppResult<StatusCode> {
    permissions::admin_or_read_only(user.as_ref(), &method)?;

    if state.repo.delete_title(title_id).await? {
        tracing::info!(title_id, "Title deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
