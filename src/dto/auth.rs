use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Role, User};

/// Registration payload. Missing fields deserialize as empty strings so the
/// service can report which one is required.
#[derive(Deserialize, Debug, Default, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub address: String,
    pub zip: String,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Identity embedded in every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct TokenUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl From<&User> for TokenUser {
    fn from(user: &User) -> Self {
        TokenUser {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub iat: i64,
    pub exp: i64,
    pub user: TokenUser,
}
