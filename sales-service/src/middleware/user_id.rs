use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Caller identity from the `X-User-ID` header, set by the gateway in front
/// of this service. Optional: intake falls back to the body's `createdBy` /
/// `collectedBy`, and an empty header counts as absent.
#[derive(Debug, Clone, Default)]
pub struct ActingUser(pub Option<String>);

impl ActingUser {
    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        if let Some(user_id) = user_id.as_deref() {
            tracing::Span::current().record("user_id", user_id);
        }

        Ok(ActingUser(user_id))
    }
}
