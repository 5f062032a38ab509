//! Medication endpoints under `/drugs`

use bytes::Bytes;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{
    DeleteAllResponse, Drug, DrugRequest, DrugSearchParams, DrugStatistics, FormOption,
    ImportFailure, ImportSummary, Page, PasswordConfirmation,
};
use crate::request::ApiRequest;

pub struct DrugsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> DrugsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: i64) -> Result<Drug> {
        self.client
            .execute_json(ApiRequest::get(format!("/drugs/{id}")))
            .await
    }

    pub async fn create(&self, request: &DrugRequest) -> Result<Drug> {
        self.client
            .execute_json(ApiRequest::post("/drugs").json(request)?)
            .await
    }

    /// Create `rows` one at a time, skipping drugs that expired before the
    /// current month. A refused row is counted and the import goes on; a
    /// lost session stops it with the error.
    pub async fn import(&self, rows: &[DrugRequest]) -> Result<ImportSummary> {
        self.import_as_of(rows, chrono::Local::now().date_naive()).await
    }

    /// `import` with an explicit reference day for the expiry check.
    pub async fn import_as_of(&self, rows: &[DrugRequest], today: NaiveDate) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for row in rows {
            if row.is_expired_on(today) {
                summary.skipped_expired += 1;
                continue;
            }
            match self.create(row).await {
                Ok(_) => summary.success += 1,
                Err(e) if e.is_session_expired() || e.is_unauthorized() => return Err(e),
                Err(e) => {
                    warn!(name = %row.name, error = %e, "import row rejected");
                    summary.failed += 1;
                    summary.failures.push(ImportFailure {
                        name: row.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(
            success = summary.success,
            failed = summary.failed,
            skipped_expired = summary.skipped_expired,
            "import finished"
        );
        Ok(summary)
    }

    pub async fn update(&self, id: i64, request: &DrugRequest) -> Result<()> {
        self.client
            .execute(ApiRequest::put(format!("/drugs/{id}")).json(request)?)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client
            .execute(ApiRequest::delete(format!("/drugs/{id}")))
            .await?;
        Ok(())
    }

    pub async fn search(&self, params: &DrugSearchParams) -> Result<Page<Drug>> {
        self.client
            .execute_json(ApiRequest::get("/drugs/search").params(params.search_query()))
            .await
    }

    /// Drug forms with their display labels, in the server's order.
    pub async fn forms(&self) -> Result<Vec<FormOption>> {
        self.client
            .execute_json(ApiRequest::get("/drugs/forms"))
            .await
    }

    pub async fn statistics(&self) -> Result<DrugStatistics> {
        self.client
            .execute_json(ApiRequest::get("/drugs/statistics"))
            .await
    }

    /// PDF report of the drugs matching `params`.
    pub async fn export_pdf(&self, params: &DrugSearchParams) -> Result<Bytes> {
        self.export("/drugs/export/pdf", params).await
    }

    /// CSV listing of the drugs matching `params`, as produced by the server.
    pub async fn export_csv(&self, params: &DrugSearchParams) -> Result<Bytes> {
        self.export("/drugs/export/csv", params).await
    }

    async fn export(&self, path: &str, params: &DrugSearchParams) -> Result<Bytes> {
        let response = self
            .client
            .execute(ApiRequest::get(path).params(params.export_query()))
            .await?;
        Ok(response.bytes())
    }

    /// Ask the server to email expiration alerts now. Returns how many were sent.
    pub async fn send_alerts(&self) -> Result<i64> {
        self.client
            .execute_json(ApiRequest::post("/email/alert"))
            .await
    }

    /// Remove every drug of the signed-in user.
    pub async fn delete_all(&self, password: &str) -> Result<DeleteAllResponse> {
        let body = PasswordConfirmation::new(password);
        self.client
            .execute_json(ApiRequest::post("/drugs/delete-all").json(&body)?)
            .await
    }
}
