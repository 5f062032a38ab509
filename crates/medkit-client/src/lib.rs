//! Client library for the medkit household medication service
//!
//! `ApiClient` sends authenticated requests to the REST API and recovers
//! from an expired access token by refreshing the session once per burst
//! of failures. Typed endpoint groups hang off the client:
//!
//! - `client.auth()`: login, profile, password and account management
//! - `client.drugs()`: medication CRUD, search, statistics and exports
//! - `client.admin()`: user management and broadcast email
//!
//! Credentials live in a `medkit_auth::TokenStore`; when the session cannot
//! be recovered the store is cleared and the registered `SessionObserver`
//! is notified.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod expiration;
pub mod metrics;
pub mod models;
pub mod refresh;
pub mod request;
pub mod session;

#[cfg(test)]
mod test_support;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ApiErrorBody, Error, FieldError, Result};
pub use expiration::ExpirationStatus;
pub use request::{ApiRequest, ApiResponse};
pub use session::SessionObserver;
