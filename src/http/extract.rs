use axum::extract::{FromRequest, FromRequestParts, Multipart, Path, Request};
use axum::http::request::Parts;

use crate::http::AppError;

/// `axum::Json` whose rejections render as `{message}` with status 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Numeric post id from the `:id` segment. Anything that is not a valid id
/// cannot name a post, so it is reported as not found.
#[derive(Debug, Clone, Copy)]
pub struct PostId(pub i32);

#[axum::async_trait]
impl<S> FromRequestParts<S> for PostId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state).await?;
        raw.parse()
            .map(PostId)
            .map_err(|_| AppError::not_found("post not found"))
    }
}

/// Multipart body; a missing or malformed `multipart/form-data` content type
/// is a 400.
pub struct Upload(pub Multipart);

#[axum::async_trait]
impl<S> FromRequest<S> for Upload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Ok(Upload(multipart))
    }
}
