//! Request extractors.

use axum::extract::{FromRequest, Request};
use axum::extract::rejection::JsonRejection;

use crate::error::ApiError;

/// JSON request body whose rejections answer with the API error shape.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
