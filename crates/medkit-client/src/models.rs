//! Request and response bodies of the medkit REST API

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use common::Secret;
use serde::{Deserialize, Serialize, Serializer};

use crate::expiration::{self, ExpirationStatus};

fn serialize_secret<S: Serializer>(secret: &Secret<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub alerts_enabled: Option<bool>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r == "ROLE_ADMIN" || r == "ADMIN")
    }
}

/// Row of the admin user listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: Secret<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: Secret<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(serialize_with = "serialize_secret")]
    pub new_password: Secret<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub confirm_password: Secret<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(serialize_with = "serialize_secret")]
    pub current_password: Secret<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub new_password: Secret<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub confirm_password: Secret<String>,
}

/// Body of requests that must be confirmed with the account password.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordConfirmation {
    #[serde(serialize_with = "serialize_secret")]
    pub password: Secret<String>,
}

impl PasswordConfirmation {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: Secret::new(password.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEmailRequest {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllResponse {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrugForm {
    Gel,
    Pills,
    Syrup,
    Drops,
    Suppositories,
    Sachets,
    Cream,
    Spray,
    Ointment,
    Liquid,
    Powder,
    Injection,
    Bandage,
    Inhaler,
    Patch,
    Solution,
    Other,
}

impl DrugForm {
    pub const ALL: [DrugForm; 17] = [
        DrugForm::Gel,
        DrugForm::Pills,
        DrugForm::Syrup,
        DrugForm::Drops,
        DrugForm::Suppositories,
        DrugForm::Sachets,
        DrugForm::Cream,
        DrugForm::Spray,
        DrugForm::Ointment,
        DrugForm::Liquid,
        DrugForm::Powder,
        DrugForm::Injection,
        DrugForm::Bandage,
        DrugForm::Inhaler,
        DrugForm::Patch,
        DrugForm::Solution,
        DrugForm::Other,
    ];

    /// Wire name, as the server spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            DrugForm::Gel => "GEL",
            DrugForm::Pills => "PILLS",
            DrugForm::Syrup => "SYRUP",
            DrugForm::Drops => "DROPS",
            DrugForm::Suppositories => "SUPPOSITORIES",
            DrugForm::Sachets => "SACHETS",
            DrugForm::Cream => "CREAM",
            DrugForm::Spray => "SPRAY",
            DrugForm::Ointment => "OINTMENT",
            DrugForm::Liquid => "LIQUID",
            DrugForm::Powder => "POWDER",
            DrugForm::Injection => "INJECTION",
            DrugForm::Bandage => "BANDAGE",
            DrugForm::Inhaler => "INHALER",
            DrugForm::Patch => "PATCH",
            DrugForm::Solution => "SOLUTION",
            DrugForm::Other => "OTHER",
        }
    }
}

impl fmt::Display for DrugForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrugForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DrugForm::ALL
            .into_iter()
            .find(|form| form.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown drug form {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drug {
    pub drug_id: i64,
    pub drug_name: String,
    pub drug_form: DrugForm,
    /// ISO date, optionally with a time part
    pub expiration_date: String,
    pub drug_description: Option<String>,
}

impl Drug {
    /// Expiration status relative to today's local date.
    pub fn expiration_status(&self) -> Option<ExpirationStatus> {
        let today = chrono::Local::now().date_naive();
        self.expiration_status_on(today)
    }

    /// Expiration status relative to `today`. `None` if the date is unreadable.
    pub fn expiration_status_on(&self, today: chrono::NaiveDate) -> Option<ExpirationStatus> {
        let expires = expiration::parse_date(&self.expiration_date)?;
        Some(ExpirationStatus::classify(expires, today))
    }
}

/// Body for creating or updating a drug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugRequest {
    pub name: String,
    pub form: DrugForm,
    pub expiration_year: i32,
    pub expiration_month: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DrugRequest {
    /// Whether the expiration month lies before the month of `today`.
    pub fn is_expired_on(&self, today: chrono::NaiveDate) -> bool {
        use chrono::Datelike;
        (self.expiration_year, self.expiration_month) < (today.year(), today.month())
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub success: usize,
    pub failed: usize,
    pub skipped_expired: usize,
    pub failures: Vec<ImportFailure>,
}

/// A row the server refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugStatistics {
    pub total_drugs: u64,
    pub expired_drugs: u64,
    pub active_drugs: u64,
    pub alert_sent_count: u64,
    #[serde(default)]
    pub drugs_by_form: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FormOption {
    pub value: String,
    pub label: String,
}

/// Page envelope returned by listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub size: u32,
    pub number: u32,
    pub first: bool,
    pub last: bool,
    pub empty: bool,
}

/// Filters for `/drugs/search` and the export endpoints. Unset fields are
/// left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrugSearchParams {
    pub name: Option<String>,
    pub form: Option<DrugForm>,
    pub expired: Option<bool>,
    pub expiring_soon: Option<bool>,
    pub expiration_until_year: Option<i32>,
    pub expiration_until_month: Option<u32>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

impl DrugSearchParams {
    /// Query pairs for `/drugs/search`.
    pub fn search_query(&self) -> Vec<(String, String)> {
        let mut pairs = self.export_query();
        // Keep the server's parameter order: filters first, paging last
        let paging_at = pairs
            .iter()
            .position(|(k, _)| k == "page" || k == "size" || k == "sort")
            .unwrap_or(pairs.len());
        let mut extra = Vec::new();
        push(&mut extra, "expiringSoon", self.expiring_soon);
        push(&mut extra, "expirationUntilYear", self.expiration_until_year);
        push(&mut extra, "expirationUntilMonth", self.expiration_until_month);
        pairs.splice(paging_at..paging_at, extra);
        pairs
    }

    /// Query pairs for the export endpoints, which only understand the
    /// basic filters and paging.
    pub fn export_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        push(&mut pairs, "name", self.name.as_deref().filter(|n| !n.is_empty()));
        push(&mut pairs, "form", self.form);
        push(&mut pairs, "expired", self.expired);
        push(&mut pairs, "page", self.page);
        push(&mut pairs, "size", self.size.filter(|s| *s > 0));
        push(&mut pairs, "sort", self.sort.as_deref().filter(|s| !s.is_empty()));
        pairs
    }
}

fn push<T: ToString>(pairs: &mut Vec<(String, String)>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        pairs.push((key.to_string(), value.to_string()));
    }
}
