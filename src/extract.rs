use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::request::Parts,
};

use crate::error::AppError;

/// Payload
///
/// JSON body extractor that reports malformed bodies as a 400 [`AppError`]
/// instead of axum's plain-text 415/422 rejections.
#[derive(Debug, Clone, Copy, Default)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(AppError::MalformedBody(rejection.body_text())),
        }
    }
}

/// Filters
///
/// Query-string extractor. An unparsable parameter (`?year=abc`) becomes a
/// 400 [`AppError`] with a `detail` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Filters<T>(pub T);

impl<S, T> FromRequestParts<S> for Filters<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Filters(value)),
            Err(rejection) => Err(AppError::MalformedQuery(rejection.body_text())),
        }
    }
}
