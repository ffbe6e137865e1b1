use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use tracing::warn;

use crate::auth::jwt::{TokenService, VerifyError};
use crate::error::ApiError;

/// Route guard: validates the bearer access token and yields the user id.
#[derive(Debug)]
pub struct AuthUser(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("No token provided".into()))?;

        // Expected format: "Bearer <token>"; a missing token segment is the
        // same failure as a missing header.
        let token = header
            .strip_prefix("Bearer ")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("No token provided".into()))?;

        let tokens = TokenService::from_ref(state);
        match tokens.verify_access(token) {
            Ok(claims) => Ok(AuthUser(claims.id)),
            Err(VerifyError::Expired) => {
                warn!("expired access token");
                Err(ApiError::Unauthorized("Token expired".into()))
            }
            Err(VerifyError::Invalid) => {
                warn!("invalid access token");
                Err(ApiError::Unauthorized("Invalid token".into()))
            }
        }
    }
}

/// JSON body extractor that keeps rejections inside the response envelope;
/// axum's default would answer malformed bodies in plain text.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
