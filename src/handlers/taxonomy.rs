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
    models::{Category, Genre, SearchParams, Taxonomy, TaxonomyEntry, TaxonomyPayload},
    permissions,
    validation::{self, ValidationErrors},
};

// Categories and genres share one table shape; the public handlers below are
// thin wrappers that pin the `Taxonomy` kind.

async fn list(
    state: &AppState,
    kind: Taxonomy,
    search: Option<String>,
) -> AppResult<Json<Vec<TaxonomyEntry>>> {
    Ok(Json(state.repo.list_taxonomy(kind, search).await?))
}

async fn create(
    state: &AppState,
    kind: Taxonomy,
    user: Option<AuthUser>,
    method: &Method,
    payload: TaxonomyPayload,
) -> AppResult<(StatusCode, Json<TaxonomyEntry>)> {
    permissions::admin_or_read_only(user.as_ref(), method)?;

    let entry = validation::validate_taxonomy(&payload)?;
    if state
        .repo
        .get_taxonomy_entry(kind, &entry.slug)
        .await?
        .is_some()
    {
        return Err(ValidationErrors::single("slug", "This slug is already in use.").into());
    }

    let created = state.repo.create_taxonomy_entry(kind, entry).await?;
    tracing::info!(table = kind.table(), slug = %created.slug, "Taxonomy entry created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete(
    state: &AppState,
    kind: Taxonomy,
    user: Option<AuthUser>,
    method: &Method,
    slug: &str,
) -> AppResult<StatusCode> {
    permissions::admin_or_read_only(user.as_ref(), method)?;

    if state.repo.delete_taxonomy_entry(kind, slug).await? {
        tracing::info!(table = kind.table(), slug, "Taxonomy entry deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// list_categories
///
/// [Public Route] Lists categories; `?search=` matches a substring of the name.
#[utoipa::path(
    get,
    path = "/api/v1/categories/",
    params(SearchParams),
    responses((status = 200, description = "Categories", body = [TaxonomyEntry]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Filters(params): Filters<SearchParams>,
) -> AppResult<Json<Vec<Category>>> {
    list(&state, Taxonomy::Category, params.search).await
}

/// create_category
///
/// [Admin] Creates a category with a unique slug.
#[utoipa::path(
    post,
    path = "/api/v1/categories/",
    request_body = TaxonomyPayload,
    responses(
        (status = 201, description = "Created", body = TaxonomyEntry),
        (status = 400, description = "Invalid payload or slug taken"),
        (status = 401, description = "Anonymous"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_category(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Payload(payload): Payload<TaxonomyPayload>,
) -> AppResult<(StatusCode, Json<Category>)> {
    create(&state, Taxonomy::Category, user, &method, payload).await
}

/// delete_category
///
/// [Admin] Deletes a category. Its titles keep existing without a category.
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{slug}/",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    delete(&state, Taxonomy::Category, user, &method, &slug).await
}

#[utoipa::path(
    get,
    path = "/api/v1/genres/",
    params(SearchParams),
    responses((status = 200, description = "Genres", body = [TaxonomyEntry]))
)]
pub async fn list_genres(
    State(state): State<AppState>,
    Filters(params): Filters<SearchParams>,
) -> AppResult<Json<Vec<Genre>>> {
    list(&state, Taxonomy::Genre, params.search).await
}

#[utoipa::path(
    post,
    path = "/api/v1/genres/",
    request_body = TaxonomyPayload,
    responses(
        (status = 201, description = "Created", body = TaxonomyEntry),
        (status = 400, description = "Invalid payload or slug taken")
    )
)]
pub async fn create_genre(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Payload(payload): Payload<TaxonomyPayload>,
) -> AppResult<(StatusCode, Json<Genre>)> {
    create(&state, Taxonomy::Genre, user, &method, payload).await
}

/// delete_genre
///
/// [Admin] Deletes a genre and unlinks it from every title.
#[utoipa::path(
    delete,
    path = "/api/v1/genres/{slug}/",
    params(("slug" = String, Path, description = "Genre slug")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_genre(
    user: Option<AuthUser>,
    method: Method,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    delete(&state, Taxonomy::Genre, user, &method, &slug).await
}
