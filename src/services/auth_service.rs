use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;

use crate::{
    audit,
    dto::auth::{LoginRequest, LoginResponse, RegisterRequest, TokenUser},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    models::{Role, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Same message whether the email is unknown or the password is wrong.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    let required = [
        ("Email", &payload.email),
        ("Password", &payload.password),
        ("First name", &payload.first_name),
        ("Last name", &payload.last_name),
        ("City", &payload.city),
        ("Address", &payload.address),
        ("Zip", &payload.zip),
    ];
    for (label, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{label} is required.")));
        }
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("Email is not valid.".into()));
    }
    Ok(())
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    validate_registration(&payload)?;
    let email = normalize_email(&payload.email);

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Email already registered.".into()));
    }

    let password_hash = hash_password(&payload.password)?;

    // Role is always assigned here; registration never accepts one from the client.
    let user = UserActive {
        id: NotSet,
        email: Set(email),
        password_hash: Set(password_hash),
        first_name: Set(payload.first_name.trim().to_string()),
        last_name: Set(payload.last_name.trim().to_string()),
        city: Set(payload.city.trim().to_string()),
        address: Set(payload.address.trim().to_string()),
        zip: Set(payload.zip.trim().to_string()),
        role: Set(Role::User.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| AppError::from(err).on_conflict("Email already registered."))?;

    let user = User::try_from(user)?;
    tracing::info!(user_id = user.id, "user registered");
    audit::record(
        &state.pool,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User registered successfully.",
        user,
        None,
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required.".into(),
        ));
    }
    let email = normalize_email(&payload.email);

    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) if verify_password(&payload.password, &u.password_hash)? => u,
        _ => {
            tracing::info!("failed login attempt");
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }
    };

    let user = User::try_from(user)?;
    let token = state.tokens.issue(TokenUser::from(&user))?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse { token, user },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> RegisterRequest {
        RegisterRequest {
            email: "a@x.com".into(),
            password: "secret".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            city: "Sarajevo".into(),
            address: "Main 1".into(),
            zip: "71000".into(),
        }
    }

    #[test]
    fn complete_registration_is_valid() {
        assert!(validate_registration(&complete()).is_ok());
    }

    #[test]
    fn each_blank_field_is_reported() {
        let mut payload = complete();
        payload.city = "   ".into();
        let err = validate_registration(&payload).unwrap_err();
        assert_eq!(err.public_message(), "City is required.");

        let mut payload = complete();
        payload.first_name.clear();
        let err = validate_registration(&payload).unwrap_err();
        assert_eq!(err.public_message(), "First name is required.");
    }

    #[test]
    fn email_must_look_like_an_address() {
        let mut payload = complete();
        payload.email = "nobody".into();
        assert!(matches!(
            validate_registration(&payload),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn password_hash_verifies_only_the_original_password() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn emails_are_compared_case_insensitively() {
        assert_eq!(normalize_email("  A@X.com "), "a@x.com");
    }
}
