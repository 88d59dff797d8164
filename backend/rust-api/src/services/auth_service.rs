use anyhow::Context;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::password_reset::PasswordReset;
use crate::models::user::{
    AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, RegisterRequest,
    ResetPasswordRequest, User, UserProfile,
};
use crate::repositories::StoreError;
use crate::services::AppState;

const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists with this email, you will receive a password reset link";

pub struct AuthService<'a> {
    state: &'a AppState,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(hash(password, self.state.config.bcrypt_cost).context("Failed to hash password")?)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(verify(password, hash).context("Failed to verify password")?)
    }

    fn auth_response(&self, user: User) -> AppResult<AuthResponse> {
        let ttl = self.state.config.access_token_ttl_seconds;
        let access_token = self
            .state
            .jwt
            .issue_access_token(&user.id, &user.email, ttl)
            .context("Failed to issue access token")?;

        Ok(AuthResponse {
            access_token,
            token_type: "Bearer",
            expires_in: ttl,
            user: UserProfile::from(user),
        })
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&req.email);
        let password_hash = self.hash_password(&req.password)?;
        let user = User::new(
            Uuid::new_v4().to_string(),
            email,
            password_hash,
            req.name.trim().to_string(),
            Utc::now(),
        );

        match self.state.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(AppError::Conflict(
                    "User with this email already exists".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.id, "User registered");
        self.auth_response(user)
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&req.email);
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        let mut user = self
            .state
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        if !self.verify_password(&req.password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            return Err(invalid());
        }

        let now = Utc::now();
        self.state.store.record_login(&user.id, now).await?;
        user.last_login_at = Some(now);

        tracing::info!(user_id = %user.id, "User logged in");
        self.auth_response(user)
    }

    pub async fn me(&self, user_id: &str) -> AppResult<UserProfile> {
        Ok(UserProfile::from(self.state.load_user(user_id).await?))
    }

    /// Issues a one-hour reset token. The response is the same whether or not
    /// the account exists.
    pub async fn forgot_password(
        &self,
        req: ForgotPasswordRequest,
    ) -> AppResult<ForgotPasswordResponse> {
        let email = normalize_email(&req.email);
        let generic = || ForgotPasswordResponse {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
            reset_token: None,
        };

        if self.state.store.find_user_by_email(&email).await?.is_none() {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(generic());
        }

        let token = generate_reset_token();
        let reset = PasswordReset {
            token_hash: hash_token(&token),
            email,
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        };
        self.state.store.save_password_reset(&reset).await?;
        tracing::info!("Password reset token issued");

        let mut response = generic();
        if self.state.config.expose_reset_tokens {
            response.reset_token = Some(token);
        }
        Ok(response)
    }

    pub async fn reset_password(&self, req: ResetPasswordRequest) -> AppResult<()> {
        let invalid = || AppError::Validation("Invalid or expired reset token".to_string());

        let reset = self
            .state
            .store
            .take_password_reset(&hash_token(req.token.trim()))
            .await?
            .ok_or_else(invalid)?;
        if reset.is_expired(Utc::now()) {
            return Err(invalid());
        }

        let user = self
            .state
            .store
            .find_user_by_email(&reset.email)
            .await?
            .ok_or_else(invalid)?;

        let password_hash = self.hash_password(&req.new_password)?;
        self.state
            .store
            .update_password(&user.id, &password_hash)
            .await?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
