use crate::{
    AppState,
    handlers::{comments, reviews, taxonomy, titles},
};
use axum::{
    Router,
    routing::{delete, get},
};

/// Content Router Module
///
/// The catalog and the user feedback attached to it, mounted under `/api/v1`.
/// Reads are anonymous. Handlers take `Option<AuthUser>` and apply
/// admin-or-read-only (catalog) or author/moderator/admin (feedback) before
/// writing. Methods without a handler answer 405.
pub fn content_routes() -> Router<AppState> {
    Router::new()
        // --- Categories & Genres ---
        // Listed and created as collections, deleted by slug. No detail or update route.
        .route(
            "/categories/",
            get(taxonomy::list_categories).post(taxonomy::create_category),
        )
        .route("/categories/{slug}/", delete(taxonomy::delete_category))
        .route(
            "/genres/",
            get(taxonomy::list_genres).post(taxonomy::create_genre),
        )
        .route("/genres/{slug}/", delete(taxonomy::delete_genre))
        // --- Titles ---
        // GET supports ?genre=&category=&year=&name= filters.
        .route(
            "/titles/",
            get(titles::list_titles).post(titles::create_title),
        )
        .route(
            "/titles/{title_id}/",
            get(titles::get_title)
                .patch(titles::update_title)
                .delete(titles::delete_title),
        )
        // --- Reviews ---
        // One review per author and title; scores feed the title rating.
        .route(
            "/titles/{title_id}/reviews/",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        // --- Comments ---
        // The review must belong to the title in the path.
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
            get(comments::get_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        )
}
