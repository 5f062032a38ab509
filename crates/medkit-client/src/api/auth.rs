//! Account endpoints under `/auth`

use medkit_auth::{LOGIN_PATH, REGISTER_PATH, TokenResponse};
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
    PasswordConfirmation, RegisterRequest, ResetPasswordRequest, UpdateProfileRequest, User,
};
use crate::request::ApiRequest;

pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Sign in and persist the returned credential pair.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenResponse> {
        let tokens: TokenResponse = self
            .client
            .execute_json(ApiRequest::post(LOGIN_PATH).json(request)?)
            .await?;
        self.client.store_tokens(&tokens).await?;
        info!(user_id = ?tokens.user_id, "logged in");
        Ok(tokens)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<MessageResponse> {
        self.client
            .execute_json(ApiRequest::post(REGISTER_PATH).json(request)?)
            .await
    }

    pub async fn verify_email(&self, token: &str) -> Result<MessageResponse> {
        self.client
            .execute_json(ApiRequest::get("/auth/verify-email").param("token", token))
            .await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<MessageResponse> {
        let body = serde_json::json!({ "email": email });
        self.client
            .execute_json(ApiRequest::post("/auth/resend-verification").json(&body)?)
            .await
    }

    /// Forget the stored credential pair. The server keeps no session.
    pub async fn logout(&self) -> Result<()> {
        self.client.clear_session().await?;
        info!("logged out");
        Ok(())
    }

    pub async fn profile(&self) -> Result<User> {
        self.client.execute_json(ApiRequest::get("/auth/me")).await
    }

    /// Resume a stored session by fetching the profile.
    ///
    /// Returns `None` when signed out. If the profile cannot be fetched the
    /// stored pair is discarded and `None` is returned.
    pub async fn restore_session(&self) -> Result<Option<User>> {
        if !self.client.is_authenticated().await {
            return Ok(None);
        }
        match self.profile().await {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "stored session is no longer valid");
                self.client.clear_session().await?;
                Ok(None)
            }
        }
    }

    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<MessageResponse> {
        self.client
            .execute_json(ApiRequest::post("/auth/forgot-password").json(request)?)
            .await
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<MessageResponse> {
        self.client
            .execute_json(ApiRequest::post("/auth/reset-password").json(request)?)
            .await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<MessageResponse> {
        self.client
            .execute_json(ApiRequest::post("/auth/change-password").json(request)?)
            .await
    }

    /// Delete the signed-in account, then forget its credentials.
    pub async fn delete_account(&self, password: &str) -> Result<()> {
        let body = PasswordConfirmation::new(password);
        self.client
            .execute(ApiRequest::delete("/auth/account").json(&body)?)
            .await?;
        self.client.clear_session().await?;
        info!("account deleted");
        Ok(())
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User> {
        self.client
            .execute_json(ApiRequest::put("/auth/profile").json(request)?)
            .await
    }
}
