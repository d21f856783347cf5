use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};

use crate::{
    dto::auth::{Claims, TokenUser},
    error::{AppError, AppResult},
};

/// Issues and verifies HS256 bearer tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // An expired token is rejected the second it expires.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            // Out-of-range TTLs saturate; issuing then fails instead of panicking.
            ttl: Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        }
    }

    pub fn issue(&self, user: TokenUser) -> AppResult<String> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: TokenUser, issued_at: DateTime<Utc>) -> AppResult<String> {
        let expiration = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

        let claims = Claims {
            iat: issued_at.timestamp(),
            exp: expiration.timestamp(),
            user,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        if token.is_empty() {
            return Err(AppError::Unauthenticated(
                "Missing authorization token.".into(),
            ));
        }

        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                let message = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token has expired. Please log in again.",
                    ErrorKind::InvalidSignature => "Invalid token signature. Please log in again.",
                    _ => "Invalid token.",
                };
                tracing::debug!(error = %err, "token rejected");
                AppError::Unauthenticated(message.into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn alice() -> TokenUser {
        TokenUser {
            id: 7,
            email: "a@x.com".into(),
            first_name: "Alice".into(),
            last_name: "Anders".into(),
            role: Role::User,
        }
    }

    #[test]
    fn issued_token_verifies_with_identity_and_role() {
        let tokens = TokenService::new("test-secret", 3600);
        let token = tokens.issue(alice()).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user, alice());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new("test-secret", 60);
        let token = tokens
            .issue_at(alice(), Utc::now() - Duration::hours(2))
            .unwrap();

        let err = tokens.verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(ref m) if m.contains("expired")));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = TokenService::new("one-secret", 3600);
        let verifier = TokenService::new("another-secret", 3600);
        let token = issuer.issue(alice()).unwrap();

        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn malformed_and_empty_tokens_are_rejected() {
        let tokens = TokenService::new("test-secret", 3600);
        assert!(matches!(
            tokens.verify("not-a-jwt"),
            Err(AppError::Unauthenticated(_))
        ));
        assert!(matches!(tokens.verify(""), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn out_of_range_ttl_fails_to_issue_without_panicking() {
        let tokens = TokenService::new("test-secret", 10_000_000_000_000_000);
        assert!(matches!(tokens.issue(alice()), Err(AppError::Internal(_))));
    }
}
