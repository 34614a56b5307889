//! A `Json` extractor whose rejection is [`HandlerError`] instead of
//! Axum's default plain-text `JsonRejection`, so malformed bodies and
//! schema mismatches answer with the same `{error:{...}}` envelope as
//! every other validation failure (spec §4.4 step 1 / §6 / §7).

use axum::extract::{FromRequest, Request};
use axum::Json;

use crate::error::HandlerError;

/// Drop-in replacement for [`axum::Json`] as a request extractor.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S>,
    <Json<T> as FromRequest<S>>::Rejection: std::fmt::Display,
    S: Send + Sync,
{
    type Rejection = HandlerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(HandlerError::InvalidRequest(rejection.to_string())),
        }
    }
}
