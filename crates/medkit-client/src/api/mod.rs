//! Typed wrappers over the medkit REST endpoints
//!
//! Each group borrows the client, so all calls share its credential store
//! and refresh state: `client.drugs().search(..)`, `client.admin().users(..)`.

pub mod admin;
pub mod auth;
pub mod drugs;

pub use admin::AdminApi;
pub use auth::AuthApi;
pub use drugs::DrugsApi;

use crate::client::ApiClient;

impl ApiClient {
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn drugs(&self) -> DrugsApi<'_> {
        DrugsApi::new(self)
    }

    pub fn admin(&self) -> AdminApi<'_> {
        AdminApi::new(self)
    }
}
