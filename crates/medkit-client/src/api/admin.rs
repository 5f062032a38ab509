//! Administration endpoints under `/admin`

use bytes::Bytes;

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{BroadcastEmailRequest, MessageResponse, Page, PasswordConfirmation, UserSummary};
use crate::request::ApiRequest;

pub const DEFAULT_USERS_PAGE_SIZE: u32 = 20;
pub const DEFAULT_USERS_SORT: &str = "createdAt,desc";

pub struct AdminApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AdminApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn users(&self, page: u32, size: u32, sort: &str) -> Result<Page<UserSummary>> {
        let request = ApiRequest::get("/admin/users")
            .param("page", page)
            .param("size", size)
            .param("sort", sort);
        self.client.execute_json(request).await
    }

    /// Delete another user's account. The admin confirms with their own password.
    pub async fn delete_user(&self, user_id: i64, password: &str) -> Result<()> {
        let body = PasswordConfirmation::new(password);
        self.client
            .execute(ApiRequest::delete(format!("/admin/users/{user_id}")).json(&body)?)
            .await?;
        Ok(())
    }

    /// Email every user.
    pub async fn broadcast_email(&self, request: &BroadcastEmailRequest) -> Result<MessageResponse> {
        self.client
            .execute_json(ApiRequest::post("/admin/broadcast").json(request)?)
            .await
    }

    pub async fn send_email(
        &self,
        user_id: i64,
        request: &BroadcastEmailRequest,
    ) -> Result<MessageResponse> {
        self.client
            .execute_json(ApiRequest::post(format!("/admin/users/{user_id}/email")).json(request)?)
            .await
    }

    pub async fn export_emails_csv(&self) -> Result<Bytes> {
        let response = self
            .client
            .execute(ApiRequest::get("/admin/emails/csv"))
            .await?;
        Ok(response.bytes())
    }
}
