use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header},
};

use crate::{error::AppError, models::Role, state::AppState};

/// Caller identity decoded from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Legacy clients send the token in `Authentication` rather than `Authorization`.
const LEGACY_AUTH_HEADER: &str = "authentication";

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .or_else(|| headers.get(LEGACY_AUTH_HEADER))
        .ok_or_else(|| AppError::Unauthenticated("Missing Authorization header.".into()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Invalid Authorization header.".into()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            AppError::Unauthenticated("Invalid Authorization header format.".into())
        })?
        .trim();

    Ok(token)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(&parts.headers)?;
        let claims = state.tokens.verify(token)?;

        Ok(AuthUser {
            user_id: claims.user.id,
            email: claims.user.email,
            role: claims.user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_standard_and_legacy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");

        let mut headers = HeaderMap::new();
        headers.insert(LEGACY_AUTH_HEADER, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(bearer_token(&headers).unwrap(), "xyz");
    }

    #[test]
    fn missing_or_wrong_scheme_is_unauthenticated() {
        let headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AppError::Unauthenticated(_))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            bearer_token(&headers),
            Err(AppError::Unauthenticated(_))
        ));
    }
}
